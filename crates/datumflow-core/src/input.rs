//! Datum inputs.

use serde::{Deserialize, Serialize};

/// One input object contributing to a datum.
///
/// A datum is a tuple of inputs; its identity is the fingerprint a
/// [`DatumHasher`](crate::hasher::DatumHasher) computes over the full
/// tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    /// Name of the input binding this object was matched by.
    pub name: String,
    /// Path of the object within its repository.
    pub path: String,
    /// Content hash of the object.
    pub hash: String,
}

impl Input {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        hash: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            hash: hash.into(),
        }
    }
}
