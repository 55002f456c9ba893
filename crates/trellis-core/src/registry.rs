#![forbid(unsafe_code)]

//! Element definition registry.
//!
//! Maps a custom element name to the [`ElementDefinition`] that constructs
//! and drives elements with that tag. This is the registration substrate the
//! runtime's definition registry builds on: it only stores, validates and
//! looks up; it never replaces a definition.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::node::Node;

/// Names the platform reserves even though they are syntactically valid.
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Construction and lifecycle protocol the host drives.
///
/// The host calls [`construct`](Self::construct) when it instantiates or
/// upgrades an element, [`connected`](Self::connected) when the element enters
/// the document and [`disconnected`](Self::disconnected) when it leaves.
pub trait ElementDefinition: Any {
    fn name(&self) -> &str;

    fn construct(&self, element: &Node) -> Result<()> {
        let _ = element;
        Ok(())
    }

    fn connected(&self, element: &Node) -> Result<()>;

    fn disconnected(&self, element: &Node) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Default)]
pub struct CustomElementRegistry {
    definitions: RefCell<AHashMap<Rc<str>, Rc<dyn ElementDefinition>>>,
}

impl std::fmt::Debug for CustomElementRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let definitions = self.definitions.borrow();
        let mut names: Vec<&str> = definitions.keys().map(|k| &**k).collect();
        names.sort_unstable();
        f.debug_struct("CustomElementRegistry")
            .field("names", &names)
            .finish()
    }
}

impl CustomElementRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<dyn ElementDefinition>> {
        self.definitions.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.borrow().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.borrow().is_empty()
    }

    /// Bind `name` to `definition`. Fails if the name is invalid or taken.
    pub fn define(&self, name: &str, definition: Rc<dyn ElementDefinition>) -> Result<()> {
        validate_name(name)?;
        let mut definitions = self.definitions.borrow_mut();
        if definitions.contains_key(name) {
            return Err(Error::DuplicateDefinition {
                name: name.to_owned(),
            });
        }
        definitions.insert(Rc::from(name), definition);
        Ok(())
    }
}

/// Check the custom element naming rules: starts with a lowercase ASCII
/// letter, contains a hyphen, has no uppercase ASCII letters and is not one of
/// the reserved names.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(Error::InvalidName {
            name: name.to_owned(),
            reason,
        })
    };
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return invalid("must start with a lowercase ASCII letter");
    }
    if !name.contains('-') {
        return invalid("must contain a hyphen");
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return invalid("must not contain uppercase ASCII letters");
    }
    if name
        .chars()
        .any(|c| c.is_ascii() && !(c.is_ascii_lowercase() || c.is_ascii_digit() || "-._".contains(c)))
    {
        return invalid("contains a disallowed character");
    }
    if RESERVED_NAMES.contains(&name) {
        return invalid("name is reserved");
    }
    Ok(())
}
