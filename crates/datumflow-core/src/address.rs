//! Shard addressing.

use crate::config::AddressConfig;
use crate::Result;

/// Resolves shards to the addresses serving them.
pub trait Addresser: Send + Sync {
    /// Address of the master serving `shard`.
    fn master_address(&self, shard: u32) -> Result<String>;

    /// Addresses of the slaves serving `shard`.
    fn slave_addresses(&self, shard: u32) -> Result<Vec<String>>;

    /// Address of the server fronting the cluster.
    fn server_address(&self) -> Result<String>;
}

/// Addresser that routes every shard to a single preconfigured address.
#[derive(Debug, Clone)]
pub struct SingleAddresser {
    address: String,
}

impl SingleAddresser {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn from_config(config: &AddressConfig) -> Self {
        Self::new(config.address.clone())
    }
}

impl Addresser for SingleAddresser {
    fn master_address(&self, _shard: u32) -> Result<String> {
        Ok(self.address.clone())
    }

    fn slave_addresses(&self, _shard: u32) -> Result<Vec<String>> {
        Ok(vec![self.address.clone()])
    }

    fn server_address(&self) -> Result<String> {
        Ok(self.address.clone())
    }
}
