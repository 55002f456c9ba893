#![forbid(unsafe_code)]

//! Normalizer for plain-value entries.
//!
//! A plain value in a descriptor map declares a writable property whose
//! initial value is that default. The default's type picks how written values
//! are coerced:
//!
//! | default          | accepted writes                                    |
//! |------------------|----------------------------------------------------|
//! | string           | any primitive or list, stored as its string form   |
//! | int / float      | numbers, numeric strings, bools (0/1), null (0)    |
//! | bool             | anything, stored as its truthiness                 |
//! | list / object    | list, object or null, stored as is                 |
//! | unset / null     | anything, stored as is                             |

use std::rc::Rc;

use trellis_core::{Error, Result, Value};

use crate::descriptor::{Descriptor, Entry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coerce {
    Any,
    Str,
    Int,
    Float,
    Bool,
    Object,
}

impl Coerce {
    fn for_default(default: &Value) -> Self {
        match default {
            Value::Unset | Value::Null => Self::Any,
            Value::Str(_) => Self::Str,
            Value::Int(_) => Self::Int,
            Value::Float(_) => Self::Float,
            Value::Bool(_) => Self::Bool,
            Value::List(_) | Value::Object(_) => Self::Object,
        }
    }

    const fn expected(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Str => "string",
            Self::Int | Self::Float => "number",
            Self::Bool => "bool",
            Self::Object => "object",
        }
    }

    fn apply(self, key: &str, value: Value) -> Result<Value> {
        let mismatch = |value: &Value| Error::Coercion {
            key: key.to_owned(),
            expected: self.expected(),
            found: value.type_name(),
        };
        match self {
            Self::Any => Ok(value),
            Self::Bool => Ok(Value::Bool(value.is_truthy())),
            Self::Str => match value {
                Value::Str(_) => Ok(value),
                Value::Object(_) | Value::Unset => Err(mismatch(&value)),
                other => Ok(Value::from(other.to_string())),
            },
            Self::Int | Self::Float => {
                let number = match &value {
                    Value::Int(_) | Value::Float(_) => value.clone(),
                    Value::Bool(b) => Value::Int(i64::from(*b)),
                    Value::Null => Value::Int(0),
                    Value::Str(s) => parse_number(s).ok_or_else(|| mismatch(&value))?,
                    _ => return Err(mismatch(&value)),
                };
                Ok(number)
            }
            Self::Object => match value {
                Value::List(_) | Value::Object(_) | Value::Null => Ok(value),
                other => Err(mismatch(&other)),
            },
        }
    }
}

/// Blank strings read as zero.
fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Value::Int(0));
    }
    trimmed
        .parse::<i64>()
        .map(Value::Int)
        .or_else(|_| trimmed.parse::<f64>().map(Value::Float))
        .ok()
}

/// Descriptor for a writable property initialized to `default`.
///
/// Reads before the first write return `default`; writes are coerced
/// according to the default's type.
#[must_use]
pub fn property(key: &str, default: Value) -> Descriptor {
    let coerce = Coerce::for_default(&default);
    let key: Rc<str> = Rc::from(key);
    Descriptor::new()
        .with_get(move |_, last| {
            Ok(if last.is_unset() {
                default.clone()
            } else {
                last.clone()
            })
        })
        .with_set(move |_, _, value| coerce.apply(&key, value))
}

/// Normalize an entry that is neither a getter function nor a descriptor
/// declaring `get` or `set`.
pub fn normalize(key: &str, entry: &Entry) -> Result<Descriptor> {
    match entry {
        Entry::Value(default) => Ok(property(key, default.clone())),
        Entry::Getter(get) => Ok(Descriptor::from_getter(Rc::clone(get))),
        Entry::Descriptor(d) if d.get().is_some() || d.set().is_some() => Ok(d.clone()),
        Entry::Descriptor(_) => Err(Error::malformed(
            key,
            "descriptor must declare get or set",
        )),
    }
}
