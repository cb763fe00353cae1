use std::fmt;

use netkeep_sys::link;

/// Name of the network device under management.
///
/// Always non-empty and a syntactically valid device name. Existence in the device table is
/// checked by the resolver when the name is bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interface(String);

/// The name is not a valid device name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid interface name {0:?}")]
pub struct InvalidName(pub String);

impl Interface {
    /// Validates `name`.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidName> {
        let name = name.into();
        if link::is_valid_name(&name) {
            Ok(Self(name))
        } else {
            Err(InvalidName(name))
        }
    }

    /// The device name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Interface {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
