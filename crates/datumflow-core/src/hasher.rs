//! Datum fingerprinting.

use sha2::{Digest, Sha256};

use crate::input::Input;

/// Maps a datum's input tuple to a stable string fingerprint.
///
/// Fingerprints decide whether two jobs touch the same datum, so an
/// implementation must be deterministic and stable for the lifetime of a
/// chain session.
pub trait DatumHasher: Send + Sync {
    fn hash(&self, inputs: &[Input]) -> String;
}

/// Default hasher: SHA-256 over a length-prefixed encoding of the tuple.
///
/// Every field is prefixed with its byte length so field and input
/// boundaries cannot collide.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl DatumHasher for Sha256Hasher {
    fn hash(&self, inputs: &[Input]) -> String {
        let mut digest = Sha256::new();
        for input in inputs {
            for field in [&input.name, &input.path, &input.hash] {
                digest.update((field.len() as u64).to_be_bytes());
                digest.update(field.as_bytes());
            }
        }
        digest
            .finalize()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }
}
