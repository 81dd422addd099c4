//! The per-job datum iterator.

use std::sync::Arc;

use datumflow_core::datum::DatumIterator;
use datumflow_core::{Error, Input, JobId, Result};
use futures::future::select_all;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::chain::{recalculate, AncestorRef, ChainShared, ChainState, JobEntry};
use crate::DatumSet;

/// Yields a job's datums as they become safe to process.
///
/// Owned by the job's worker. [`next`](Self::next) is the only blocking
/// operation in the scheduler: it waits on ancestor completion signals or
/// the caller's shutdown token.
pub struct JobDatumIterator {
    shared: Arc<ChainShared>,
    id: JobId,
    dit: Box<dyn DatumIterator>,
}

impl JobDatumIterator {
    pub(crate) fn new(shared: Arc<ChainShared>, id: JobId, dit: Box<dyn DatumIterator>) -> Self {
        Self { shared, id, dit }
    }

    /// The job's chain identity, for log correlation.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Advance to the next safe datum.
    ///
    /// Returns `Ok(true)` with the datum available via
    /// [`datum`](Self::datum), or `Ok(false)` on clean exhaustion. Blocks
    /// while every remaining datum is deferred behind an unfinished
    /// ancestor. Cancelling `shutdown` aborts the wait with
    /// [`Error::Cancelled`]; the job stays in the chain and must still be
    /// reported through `succeed` or `fail` to release its descendants.
    pub async fn next(&mut self, shutdown: &CancellationToken) -> Result<bool> {
        loop {
            loop {
                // Decide under the lock whether to scan, finish, or wait.
                let mut watches: Vec<AncestorRef> = {
                    let state = self.shared.state.lock().await;
                    let Some(index) = state.position(self.id) else {
                        // Pruned after its terminal transition.
                        return Ok(false);
                    };
                    let entry = &state.jobs[index];
                    if !entry.yielding.is_empty() {
                        break;
                    }
                    if entry.ancestors.is_empty() {
                        if !entry.unyielded.is_empty() {
                            return Err(Error::DatumsStalled);
                        }
                        debug!(job = %self.id, "job fully iterated");
                        return Ok(false);
                    }
                    entry.ancestors.clone()
                };

                // Wait, without the lock, for an ancestor or shutdown.
                let mut waits: Vec<_> = watches
                    .iter()
                    .map(|watch| Box::pin(watch.done.clone().cancelled_owned()))
                    .collect();
                waits.push(Box::pin(shutdown.clone().cancelled_owned()));
                let (_, fired_index, _) = select_all(waits).await;
                if fired_index == watches.len() {
                    return Err(Error::Cancelled);
                }
                let fired = watches.swap_remove(fired_index);

                self.ancestor_finished(&fired).await?;
                self.dit.reset();
            }

            // Scan forward for a datum in the yielding set.
            {
                let mut state = self.shared.state.lock().await;
                let Some(index) = state.position(self.id) else {
                    return Ok(false);
                };
                let entry = &mut state.jobs[index];
                while self.dit.next() {
                    let hash = self.shared.hasher.hash(self.dit.datum());
                    if entry.yielding.remove(&hash) {
                        entry.yielded.insert(hash);
                        return Ok(true);
                    }
                }
                if !entry.yielding.is_empty() {
                    // The underlying iterator no longer produces datums
                    // the plan expects: hasher/iterator mismatch.
                    return Err(Error::DatumsUnhandled(entry.yielding.len()));
                }
            }
        }
    }

    /// Absorb one finished ancestor: drop it from the wait list, apply
    /// the additive-only inheritance or recalculation, and promote any
    /// datums no remaining ancestor still covers.
    async fn ancestor_finished(&mut self, fired: &AncestorRef) -> Result<()> {
        let mut guard = self.shared.state.lock().await;
        let ChainState { base_datums, jobs } = &mut *guard;
        let Some(index) = jobs.iter().position(|job| job.id == self.id) else {
            return Ok(());
        };
        let (prefix, rest) = jobs.split_at_mut(index);
        let entry = &mut rest[0];

        entry.ancestors.retain(|ancestor| ancestor.id != fired.id);
        debug!(
            job = %self.id,
            ancestor = %fired.id,
            remaining = entry.ancestors.len(),
            "finished waiting on ancestor"
        );

        if entry.additive_only {
            if !entry.ancestors.is_empty() {
                return Err(Error::MultipleAncestors);
            }
            let Some(outcome) = fired.outcome.get() else {
                return Err(Error::Internal(
                    "ancestor finished without recording an outcome".into(),
                ));
            };
            if outcome.success {
                // Take over the datums the parent declined to commit;
                // everything else the parent covered is inherited
                // implicitly. Fingerprints this job cannot produce are
                // ignored.
                if let Some(all_datums) = entry.all_datums.as_ref() {
                    for hash in &outcome.recovered {
                        if all_datums.contains(hash) && !entry.yielded.contains(hash) {
                            entry.yielding.insert(hash.clone());
                        }
                    }
                }
            } else {
                // The parent failed: rebuild the plan from scratch
                // against the new upstream state.
                let Some(base) = base_datums.as_ref() else {
                    return Err(Error::Internal("chain lost its base snapshot".into()));
                };
                recalculate(entry, base, prefix);
            }
        }

        release_safe_datums(entry, prefix);
        Ok(())
    }

    /// The input tuple of the most recent datum returned by
    /// [`next`](Self::next).
    pub fn datum(&self) -> &[Input] {
        self.dit.datum()
    }

    /// Number of datums currently eligible to be yielded.
    pub async fn num_available(&self) -> usize {
        let state = self.shared.state.lock().await;
        state
            .position(self.id)
            .map_or(0, |index| state.jobs[index].yielding.len())
    }

    /// The job's full fingerprint set. Empty once the job has failed or
    /// been pruned.
    pub async fn datum_set(&self) -> DatumSet {
        let state = self.shared.state.lock().await;
        state
            .position(self.id)
            .and_then(|index| state.jobs[index].all_datums.clone())
            .unwrap_or_default()
    }

    /// True when this job only adds datums relative to its parent.
    pub async fn additive_only(&self) -> bool {
        let state = self.shared.state.lock().await;
        state
            .position(self.id)
            .is_some_and(|index| state.jobs[index].additive_only)
    }
}

/// Move every unyielded datum that no remaining ancestor still covers
/// into the yielding set.
fn release_safe_datums(entry: &mut JobEntry, prefix: &[JobEntry]) {
    let released: Vec<String> = entry
        .unyielded
        .iter()
        .filter(|hash| safe_to_process(hash, &entry.ancestors, prefix))
        .cloned()
        .collect();
    for hash in released {
        entry.unyielded.remove(&hash);
        entry.yielding.insert(hash);
    }
}

/// A datum is safe once no remaining ancestor's datum set contains it.
/// Ancestors already pruned from the chain are committed history and
/// cannot hold a datum back.
fn safe_to_process(hash: &str, ancestors: &[AncestorRef], prefix: &[JobEntry]) -> bool {
    ancestors.iter().all(|ancestor| {
        prefix
            .iter()
            .find(|job| job.id == ancestor.id)
            .map_or(true, |job| !job.covers(hash))
    })
}
