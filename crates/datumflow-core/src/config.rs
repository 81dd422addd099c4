//! Worker configuration types.

use serde::{Deserialize, Serialize};

/// Addressing configuration for a single-node deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressConfig {
    /// Address serving every shard.
    pub address: String,
}
