//! The job handle contract.

use crate::datum::DatumIterator;
use crate::Result;

/// Handle to a job submitted to the scheduler.
///
/// The scheduler treats the handle as opaque identity and only asks it
/// for the job's datum iterator. Jobs are looked up by pointer identity,
/// so the same `Arc` must be used for `start`, `succeed` and `fail`.
pub trait JobData: Send + Sync {
    /// Produce this job's datum iterator.
    fn iterator(&self) -> Result<Box<dyn DatumIterator>>;
}
