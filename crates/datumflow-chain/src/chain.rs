//! The job chain: ordered live jobs over a committed base snapshot.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use datumflow_core::hasher::DatumHasher;
use datumflow_core::job::JobData;
use datumflow_core::{Error, JobId, Result};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::iterator::JobDatumIterator;

/// A set of datum fingerprints.
pub type DatumSet = HashSet<String>;

/// Terminal outcome of a finished job.
///
/// Shared through an `Arc` so descendants can still read it after the
/// job's entry has been pruned from the chain.
#[derive(Debug, Default)]
pub(crate) struct JobOutcome {
    pub(crate) success: bool,
    /// Fingerprints the job declined to commit; descendants redo them.
    pub(crate) recovered: DatumSet,
}

/// Non-owning reference to an ancestor job, valid across pruning.
#[derive(Clone)]
pub(crate) struct AncestorRef {
    pub(crate) id: JobId,
    pub(crate) done: CancellationToken,
    pub(crate) outcome: Arc<OnceLock<JobOutcome>>,
}

/// One job tracked by the chain.
pub(crate) struct JobEntry {
    pub(crate) id: JobId,
    pub(crate) data: Arc<dyn JobData>,
    started_at: DateTime<Utc>,

    /// Datums blocked on at least one unfinished ancestor.
    pub(crate) unyielded: DatumSet,
    /// Datums currently eligible to be yielded.
    pub(crate) yielding: DatumSet,
    /// Datums already returned by the iterator.
    pub(crate) yielded: DatumSet,
    /// Every fingerprint this job would process. None once failed, so the
    /// job contributes nothing downstream.
    pub(crate) all_datums: Option<DatumSet>,

    /// Earlier jobs this one must wait on before more datums become safe.
    pub(crate) ancestors: Vec<AncestorRef>,
    /// True when this job's datum set is a superset of its parent's.
    pub(crate) additive_only: bool,
    pub(crate) finished: bool,

    /// Fired exactly once, on the terminal transition.
    pub(crate) done: CancellationToken,
    pub(crate) outcome: Arc<OnceLock<JobOutcome>>,
}

impl JobEntry {
    fn new(data: Arc<dyn JobData>, all_datums: DatumSet) -> Self {
        Self {
            id: JobId::new(),
            data,
            started_at: Utc::now(),
            unyielded: DatumSet::new(),
            yielding: DatumSet::new(),
            yielded: DatumSet::new(),
            all_datums: Some(all_datums),
            ancestors: Vec::new(),
            additive_only: false,
            finished: false,
            done: CancellationToken::new(),
            outcome: Arc::new(OnceLock::new()),
        }
    }

    pub(crate) fn covers(&self, hash: &str) -> bool {
        self.all_datums
            .as_ref()
            .is_some_and(|all| all.contains(hash))
    }

    fn watch_ref(&self) -> AncestorRef {
        AncestorRef {
            id: self.id,
            done: self.done.clone(),
            outcome: Arc::clone(&self.outcome),
        }
    }
}

/// Rebuild `entry`'s plan against the base snapshot and the chain prefix
/// preceding it.
///
/// Splits the job's not-yet-yielded datums into safe (`yielding`) and
/// ancestor-blocked (`unyielded`), decides whether the job is
/// additive-only relative to its parent, and records the ancestors the
/// job must wait on. Runs at `start` and again when an additive-only
/// job's parent fails.
pub(crate) fn recalculate(
    entry: &mut JobEntry,
    base_datums: &DatumSet,
    ancestors: &[JobEntry],
) {
    let Some(all_datums) = entry.all_datums.take() else {
        return;
    };

    let mut yielding = DatumSet::new();
    let mut unyielded = DatumSet::new();
    let mut interesting: Vec<AncestorRef> = Vec::new();

    for hash in &all_datums {
        if entry.yielded.contains(hash) {
            continue;
        }
        // Interesting ancestors are all unfinished earlier jobs with any
        // datum overlap with this one.
        let mut safe = true;
        for ancestor in ancestors {
            if !ancestor.finished && ancestor.covers(hash) {
                if !interesting.iter().any(|watch| watch.id == ancestor.id) {
                    interesting.push(ancestor.watch_ref());
                }
                safe = false;
            }
        }
        if safe {
            yielding.insert(hash.clone());
        } else {
            unyielded.insert(hash.clone());
        }
    }

    // The parent is the nearest ancestor that still contributes datums;
    // failed jobs contribute nothing and are skipped. With no such
    // ancestor the parent state is the base snapshot.
    let parent = ancestors
        .iter()
        .rev()
        .find_map(|ancestor| ancestor.all_datums.as_ref().map(|all| (ancestor, all)));
    let parent_datums = parent.map_or(base_datums, |(_, all)| all);

    entry.additive_only = parent_datums.iter().all(|hash| all_datums.contains(hash));

    if entry.additive_only {
        // Only the datums new since the parent are processed here; the
        // rest are inherited on the parent's success. The plan is
        // re-evaluated once the parent finishes, to pick up recovered
        // datums or a failure.
        for hash in parent_datums {
            yielding.remove(hash);
            unyielded.remove(hash);
        }
        entry.ancestors = parent
            .map(|(ancestor, _)| ancestor.watch_ref())
            .into_iter()
            .collect();
    } else {
        entry.ancestors = interesting;
    }

    entry.yielding = yielding;
    entry.unyielded = unyielded;
    entry.all_datums = Some(all_datums);
}

pub(crate) struct ChainState {
    pub(crate) base_datums: Option<DatumSet>,
    pub(crate) jobs: Vec<JobEntry>,
}

impl ChainState {
    pub(crate) fn position(&self, id: JobId) -> Option<usize> {
        self.jobs.iter().position(|job| job.id == id)
    }

    fn position_of_data(&self, data: &Arc<dyn JobData>) -> Result<usize> {
        self.jobs
            .iter()
            .position(|job| Arc::ptr_eq(&job.data, data))
            .ok_or(Error::JobNotFound)
    }

    /// Drop the finished prefix of the chain and fold the datum set of
    /// the last dropped entry that still has one into the base snapshot.
    /// Failed entries contribute nothing; if every dropped entry failed,
    /// the previous base stands. No-op while the head is unfinished.
    pub(crate) fn prune_finished(&mut self) {
        let pruned = self.jobs.iter().take_while(|job| job.finished).count();
        if pruned == 0 {
            return;
        }

        let mut new_base = None;
        for job in self.jobs.drain(..pruned) {
            if let Some(all_datums) = job.all_datums {
                new_base = Some(all_datums);
            }
        }
        if let Some(base) = new_base {
            self.base_datums = Some(base);
        }

        debug!(pruned, remaining = self.jobs.len(), "pruned finished chain prefix");
    }
}

pub(crate) struct ChainShared {
    pub(crate) hasher: Arc<dyn DatumHasher>,
    pub(crate) state: Mutex<ChainState>,
}

/// Sequences a stream of jobs over overlapping datum sets, strictly in
/// submission order.
///
/// Cloning is cheap and shares the underlying chain.
#[derive(Clone)]
pub struct JobChain {
    shared: Arc<ChainShared>,
}

impl JobChain {
    pub fn new(hasher: Arc<dyn DatumHasher>) -> Self {
        Self {
            shared: Arc::new(ChainShared {
                hasher,
                state: Mutex::new(ChainState {
                    base_datums: None,
                    jobs: Vec::new(),
                }),
            }),
        }
    }

    /// True once a base snapshot has been registered.
    pub async fn initialized(&self) -> bool {
        self.shared.state.lock().await.base_datums.is_some()
    }

    /// Register the committed datum set preceding the first job.
    pub async fn initialize(&self, base_datums: DatumSet) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        if state.base_datums.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        state.base_datums = Some(base_datums);
        Ok(())
    }

    /// The committed datum set preceding the oldest live job.
    pub async fn base_datums(&self) -> Option<DatumSet> {
        self.shared.state.lock().await.base_datums.clone()
    }

    /// Append a job to the chain and return its datum iterator.
    ///
    /// The job's datums are enumerated up front to compute its full
    /// fingerprint set; the initial plan is then computed against a
    /// consistent snapshot of the chain.
    pub async fn start(&self, data: Arc<dyn JobData>) -> Result<JobDatumIterator> {
        if !self.initialized().await {
            return Err(Error::NotInitialized);
        }

        let mut dit = data.iterator()?;

        let mut all_datums = DatumSet::new();
        dit.reset();
        for n in 0..dit.len() {
            all_datums.insert(self.shared.hasher.hash(dit.datum_n(n)));
        }

        let mut state = self.shared.state.lock().await;
        let Some(base_datums) = state.base_datums.as_ref() else {
            return Err(Error::NotInitialized);
        };

        let mut entry = JobEntry::new(Arc::clone(&data), all_datums);
        recalculate(&mut entry, base_datums, &state.jobs);

        info!(
            job = %entry.id,
            datums = entry.all_datums.as_ref().map_or(0, DatumSet::len),
            dependencies = entry.ancestors.len(),
            additive_only = entry.additive_only,
            "starting job"
        );

        let id = entry.id;
        state.jobs.push(entry);

        Ok(JobDatumIterator::new(Arc::clone(&self.shared), id, dit))
    }

    /// Report a job as successful.
    ///
    /// Requires the job to be fully drained. `recovered` fingerprints are
    /// treated as not actually processed: they are removed from the job's
    /// datum set so that descendants redo them.
    pub async fn succeed(&self, data: &Arc<dyn JobData>, recovered: DatumSet) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        let index = state.position_of_data(data)?;
        let entry = &mut state.jobs[index];

        if !entry.yielding.is_empty() || !entry.unyielded.is_empty() {
            return Err(Error::DatumsRemaining {
                unyielded: entry.unyielded.len(),
                yielding: entry.yielding.len(),
                total: entry.unyielded.len() + entry.yielding.len() + entry.yielded.len(),
            });
        }

        if let Some(all_datums) = entry.all_datums.as_mut() {
            for hash in &recovered {
                all_datums.remove(hash);
            }
        }

        entry.finished = true;
        info!(
            job = %entry.id,
            recovered = recovered.len(),
            elapsed_ms = (Utc::now() - entry.started_at).num_milliseconds(),
            "job succeeded"
        );

        let _ = entry.outcome.set(JobOutcome {
            success: true,
            recovered,
        });
        let done = entry.done.clone();

        state.prune_finished();
        done.cancel();
        Ok(())
    }

    /// Report a job as failed. Its datums contribute nothing downstream.
    pub async fn fail(&self, data: &Arc<dyn JobData>) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        let index = state.position_of_data(data)?;
        let entry = &mut state.jobs[index];

        entry.all_datums = None;
        entry.finished = true;
        warn!(
            job = %entry.id,
            elapsed_ms = (Utc::now() - entry.started_at).num_milliseconds(),
            "job failed"
        );

        let _ = entry.outcome.set(JobOutcome {
            success: false,
            recovered: DatumSet::new(),
        });
        let done = entry.done.clone();

        state.prune_finished();
        done.cancel();
        Ok(())
    }
}
