//! Job-chain scheduling for the datumflow worker.
//!
//! The chain sequences a stream of jobs over overlapping datum sets.
//! Every job enumerates its datums up front; a datum stays deferred while
//! any earlier unfinished job also covers it. Success, failure and
//! recovered datums propagate to descendants, and the finished prefix of
//! the chain is folded into a committed base snapshot.
//!
//! ```text
//! initialize(base)
//!     │
//! start(job) ──► JobDatumIterator ── next() ──► datum ... (drain)
//!     │                                  ▲
//! succeed / fail ────────────────────────┘ unblocks descendants,
//!                                           prunes the finished prefix
//! ```
//!
//! Jobs are strictly FIFO by submission; there is no priority and no
//! persistence. The chain hands out datums, an external worker processes
//! them, and the caller reports the terminal outcome.

mod chain;
mod iterator;

pub use chain::{DatumSet, JobChain};
pub use iterator::JobDatumIterator;
