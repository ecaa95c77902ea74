use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

pub const MAX_UPLOAD_ID_LEN: usize = 128;

/// Opaque token naming one resumable upload session.
///
/// Freshly generated ids are UUID v7 strings, so they sort by creation time.
/// Ids handed back by clients are only checked for being a safe, single
/// path component; the store itself decides whether the upload exists.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UploadId(String);

impl UploadId {
    /// Generate a new time-ordered upload id (UUID v7).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Validate a client-supplied upload id.
    pub fn parse(id: &str) -> Result<Self, TypeError> {
        if id.is_empty() {
            return Err(TypeError::InvalidUploadId {
                id: id.to_string(),
                reason: "upload id must not be empty".into(),
            });
        }
        if id.len() > MAX_UPLOAD_ID_LEN {
            return Err(TypeError::InvalidUploadId {
                id: id.to_string(),
                reason: format!("longer than {MAX_UPLOAD_ID_LEN} characters"),
            });
        }
        if let Some(ch) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(TypeError::InvalidUploadId {
                id: id.to_string(),
                reason: format!("contains forbidden character: {ch:?}"),
            });
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UploadId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UploadId> for String {
    fn from(id: UploadId) -> Self {
        id.0
    }
}
