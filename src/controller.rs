use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{CycleError, StoreError};
use crate::marks::{diff_with, merge_marks, DiffMode, Snapshot};
use crate::notify::{Notifier, NotifyOutcome};
use crate::provider::SnapshotProvider;
use crate::snapshot::StateStore;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    #[default]
    Fresh,
    Merged,
    /// Only the new entries. Older marks look unseen again on the next
    /// count increase and get announced a second time.
    DeltaOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOptions {
    pub diff_mode: DiffMode,
    pub persist_mode: PersistMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleReport {
    /// No prior state: the fetched snapshot became the baseline.
    Initialized { test_count: u64, entries: usize },
    NoChange { fetched: u64, stored: u64 },
    Updated {
        test_count: u64,
        outcomes: Vec<NotifyOutcome>,
    },
}

impl CycleReport {
    pub fn notifications(&self) -> usize {
        match self {
            Self::Updated { outcomes, .. } => outcomes.len(),
            _ => 0,
        }
    }
}

/// Runs fetch → compare → diff → notify → persist against one store.
/// Cycles must not overlap; `run_cycle` takes `&mut self` to keep it that way.
pub struct UpdateController {
    provider: Box<dyn SnapshotProvider>,
    store: Box<dyn StateStore>,
    notifier: Notifier,
    options: CycleOptions,
}

impl UpdateController {
    pub fn new(
        provider: Box<dyn SnapshotProvider>,
        store: Box<dyn StateStore>,
        notifier: Notifier,
        options: CycleOptions,
    ) -> Self {
        Self {
            provider,
            store,
            notifier,
            options,
        }
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        info!("checking for new marks");
        let fresh = self.provider.fetch().await?;

        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(StoreError::NotInitialized) => return self.initialize(fresh),
            Err(err) => return Err(CycleError::Load(err)),
        };

        if fresh.test_count <= stored.test_count {
            info!(
                "no new marks ({} tests published, {} known)",
                fresh.test_count, stored.test_count
            );
            return Ok(CycleReport::NoChange {
                fetched: fresh.test_count,
                stored: stored.test_count,
            });
        }

        info!(
            "test count went from {} to {}, looking for new marks",
            stored.test_count, fresh.test_count
        );
        let delta = diff_with(self.options.diff_mode, &fresh, &stored);
        if delta.is_empty() {
            warn!("test count increased but no unseen test was found on the page");
        }

        let mut outcomes = Vec::with_capacity(delta.len());
        for mark in delta.iter() {
            info!("new mark: {} / {}", mark.subject, mark.test);
            outcomes.push(self.notifier.notify(&mark).await);
        }
        let failures: usize = outcomes.iter().map(NotifyOutcome::failures).sum();
        if failures > 0 {
            warn!("{failures} notification(s) failed this cycle");
        }

        let test_count = fresh.test_count;
        let marks = match self.options.persist_mode {
            PersistMode::Fresh => fresh.marks,
            PersistMode::Merged => merge_marks(&stored.marks, &fresh.marks),
            PersistMode::DeltaOnly => delta.into_marks(),
        };
        self.persist(&Snapshot::new(test_count, marks))?;

        Ok(CycleReport::Updated {
            test_count,
            outcomes,
        })
    }

    fn initialize(&self, fresh: Snapshot) -> Result<CycleReport, CycleError> {
        info!(
            "no stored marks, recording baseline of {} tests",
            fresh.test_count
        );
        self.persist(&fresh)?;
        Ok(CycleReport::Initialized {
            test_count: fresh.test_count,
            entries: fresh.entry_count(),
        })
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), CycleError> {
        self.store.save(snapshot).map_err(|err| {
            error!("failed persisting snapshot: {err}");
            CycleError::Persist(err)
        })
    }
}
