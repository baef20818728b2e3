use crate::error::{Error, Result};
use std::{fmt, path::Path};

/// Identity of a single piece of site content.
#[derive(Hash, PartialEq, Eq, Debug, Clone)]
pub struct Identifier(String);

impl Identifier {
    pub fn try_from_path<T: AsRef<Path>>(path: T) -> Result<Self> {
        let identifier = path
            .as_ref()
            .to_str()
            .ok_or_else(|| Error::InvalidIdentifier {
                path: path.as_ref().to_path_buf(),
            })?
            .to_owned();
        Ok(Self(identifier))
    }

    pub fn from_string(identifier: String) -> Self {
        Self(identifier)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&Path> for Identifier {
    type Error = Error;
    fn try_from(value: &Path) -> Result<Self> {
        Identifier::try_from_path(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::from_string(value)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::from_string(value.to_owned())
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
