//! Repository name validation.
//!
//! Valid repository names:
//! - Are between 2 and 255 characters long
//! - Consist of one or more components separated by `/`
//! - Each component is lowercase alphanumerics, optionally joined by single
//!   `.`, `_` or `-` separators (e.g. `library/ubuntu`, `my-org/base.image`)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 255;

/// Namespace scoping layer ownership and tombstones.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepositoryName(String);

impl RepositoryName {
    /// Validate and wrap a repository name.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata_types::RepositoryName;
    ///
    /// assert!(RepositoryName::new("library/ubuntu").is_ok());
    /// assert!(RepositoryName::new("a").is_err());
    /// assert!(RepositoryName::new("Upper/case").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path components of the name.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidRepositoryName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn validate(name: &str) -> Result<(), TypeError> {
    if name.len() < MIN_NAME_LEN || name.len() > MAX_NAME_LEN {
        return Err(invalid(
            name,
            format!("length must be between {MIN_NAME_LEN} and {MAX_NAME_LEN}"),
        ));
    }

    for component in name.split('/') {
        validate_component(name, component)?;
    }
    Ok(())
}

fn validate_component(name: &str, component: &str) -> Result<(), TypeError> {
    if component.is_empty() {
        return Err(invalid(name, "path components must not be empty"));
    }

    let mut prev_separator = true;
    for ch in component.chars() {
        match ch {
            'a'..='z' | '0'..='9' => prev_separator = false,
            '.' | '_' | '-' => {
                if prev_separator {
                    return Err(invalid(
                        name,
                        format!("separator {ch:?} must sit between alphanumerics in {component:?}"),
                    ));
                }
                prev_separator = true;
            }
            other => {
                return Err(invalid(
                    name,
                    format!("contains forbidden character: {other:?}"),
                ));
            }
        }
    }

    if prev_separator {
        return Err(invalid(
            name,
            format!("component must not end with a separator: {component:?}"),
        ));
    }
    Ok(())
}

impl fmt::Debug for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepositoryName({})", self.0)
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RepositoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepositoryName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RepositoryName> for String {
    fn from(name: RepositoryName) -> Self {
        name.0
    }
}
