#![forbid(unsafe_code)]

//! Runtime configuration.
//!
//! The only knob is the [`Mode`]. Development mode allows a component name to
//! be redefined with a new descriptor map and live instances to be
//! reconciled; production mode rejects redefinition and never builds the
//! reconciler.
//!
//! The default mode follows the build: the `production` feature or a build
//! without `debug_assertions` selects [`Mode::Production`]. The
//! `TRELLIS_MODE` environment variable overrides it when read through
//! [`RuntimeConfig::from_env`].
//!
//! # Invariants
//!
//! With the `production` feature no configuration path yields
//! [`Mode::Development`]: requests for it are logged at `warn` and replaced by
//! [`Mode::Production`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Development,
    Production,
}

impl Mode {
    /// Mode selected by the build profile and features.
    #[must_use]
    pub const fn from_build() -> Self {
        if cfg!(feature = "production") || !cfg!(debug_assertions) {
            Self::Production
        } else {
            Self::Development
        }
    }

    /// Parse `development`/`dev` or `production`/`prod`, case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Whether a defined name may be rebound to a new descriptor map.
    #[must_use]
    pub const fn allows_redefinition(self) -> bool {
        matches!(self, Self::Development)
    }

    /// The mode the build actually runs in when `self` is requested.
    #[cfg(not(feature = "production"))]
    pub(crate) fn permitted(self) -> Self {
        self
    }

    /// The mode the build actually runs in when `self` is requested.
    #[cfg(feature = "production")]
    pub(crate) fn permitted(self) -> Self {
        if self == Self::Development {
            tracing::warn!(
                requested = %self,
                "development mode unavailable in a production build"
            );
        }
        Self::Production
    }
}

impl Default for Mode {
    fn default() -> Self {
        Self::from_build()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a [`Registry`](crate::registry::Registry).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub mode: Mode,
}

impl RuntimeConfig {
    /// Environment variable consulted by [`from_env`](Self::from_env).
    pub const ENV_MODE: &'static str = "TRELLIS_MODE";

    #[must_use]
    pub fn development() -> Self {
        Self {
            mode: Mode::Development.permitted(),
        }
    }

    #[must_use]
    pub fn production() -> Self {
        Self {
            mode: Mode::Production,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode.permitted();
        self
    }

    /// Build defaults, overridden by `TRELLIS_MODE` when it parses.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(Self::ENV_MODE) {
            match Mode::parse(&raw) {
                Some(mode) => config.mode = mode.permitted(),
                None => tracing::warn!(
                    value = %raw,
                    variable = Self::ENV_MODE,
                    "ignoring unrecognized mode"
                ),
            }
        }
        config
    }
}
