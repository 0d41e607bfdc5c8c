//! Represents the metadata record kept for every uploaded image.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single image's metadata row.
///
/// The blob itself lives in the object store under `file_name`. Several
/// records may share one `file_name`; they all resolve to whatever blob was
/// written last under that key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageRecord {
    /// Server-generated UUID v4, primary key.
    pub id: String,

    /// Object store key supplied by the uploader.
    pub file_name: String,

    /// Free-form user metadata. Empty object when none was supplied.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// UTC calendar date of the upload, serialized as `YYYY-MM-DD`.
    pub created_at: NaiveDate,
}

/// Exact-match attribute filters for a table scan. All set fields must match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageFilter {
    pub file_name: Option<String>,
    pub created_at: Option<String>,
}

impl ImageFilter {
    pub fn is_empty(&self) -> bool {
        self.file_name.is_none() && self.created_at.is_none()
    }
}
