//! Per-identity mutual exclusion and the archive of completed runs.
//!
//! At most one instance may be active for an identity. A claim is an RAII
//! guard: finishing it archives the report of a completed run and releases
//! any other outcome, dropping it unfinished (the run was cancelled or
//! panicked) releases the identity so it can be restarted.
//!
//! Only completed runs are kept, since they are the only ones that change
//! the outcome of a later claim. Failed and Invalid runs live on in their
//! metadata status record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::pipeline::state::PipelineState;
use crate::types::PipelineReport;

#[derive(Debug, Clone)]
enum Entry {
    Active,
    Completed(PipelineReport),
}

/// Why a start request was turned into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coalesced {
    /// An instance for this identity is running
    Active,
    /// This identity already completed successfully
    Completed,
}

/// Result of [`InstanceRegistry::claim`].
#[derive(Debug)]
pub enum Claim {
    Acquired(ClaimGuard),
    Coalesced(Coalesced),
}

/// Registry of identities keyed by image identity.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the single active instance for `identity`.
    ///
    /// Identities whose last run ended `Failed` or `Invalid` may be claimed
    /// again; active and completed ones are coalesced.
    pub fn claim(&self, identity: &str) -> Claim {
        let mut entries = self.lock();
        match entries.get(identity) {
            Some(Entry::Active) => return Claim::Coalesced(Coalesced::Active),
            Some(Entry::Completed(_)) => return Claim::Coalesced(Coalesced::Completed),
            None => {}
        }
        entries.insert(identity.to_string(), Entry::Active);
        Claim::Acquired(ClaimGuard {
            registry: self.clone(),
            identity: identity.to_string(),
            finished: false,
        })
    }

    /// Report of the completed run for `identity`, if there is one.
    pub fn report(&self, identity: &str) -> Option<PipelineReport> {
        match self.lock().get(identity) {
            Some(Entry::Completed(report)) => Some(report.clone()),
            _ => None,
        }
    }

    pub fn is_active(&self, identity: &str) -> bool {
        matches!(self.lock().get(identity), Some(Entry::Active))
    }

    pub fn active_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|e| matches!(e, Entry::Active))
            .count()
    }

    /// Reports of all completed runs, in no particular order.
    pub fn reports(&self) -> Vec<PipelineReport> {
        self.lock()
            .values()
            .filter_map(|e| match e {
                Entry::Completed(report) => Some(report.clone()),
                Entry::Active => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Exclusive right to run the pipeline for one identity.
#[derive(Debug)]
pub struct ClaimGuard {
    registry: InstanceRegistry,
    identity: String,
    finished: bool,
}

impl ClaimGuard {
    /// End the claim, archiving `report` if the run completed.
    pub fn finish(mut self, report: PipelineReport) {
        let mut entries = self.registry.lock();
        if report.state == PipelineState::Completed {
            entries.insert(self.identity.clone(), Entry::Completed(report));
        } else {
            entries.remove(&self.identity);
        }
        drop(entries);
        self.finished = true;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut entries = self.registry.lock();
        if matches!(entries.get(&self.identity), Some(Entry::Active)) {
            entries.remove(&self.identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::PipelineInstance;
    use crate::pipeline::state::PipelineEvent;
    use crate::types::ImageReference;

    fn report(key: &str, rejected: bool) -> PipelineReport {
        let mut instance = PipelineInstance::new(ImageReference::new("in", key));
        instance.apply(PipelineEvent::Start).unwrap();
        if rejected {
            instance
                .apply(PipelineEvent::ValidationRejected {
                    reason: "Invalid file type".to_string(),
                })
                .unwrap();
        } else {
            instance.apply(PipelineEvent::ValidationPassed).unwrap();
            instance
                .apply(PipelineEvent::TransformSucceeded {
                    destination: crate::types::Location::new("out", "resized/x"),
                })
                .unwrap();
            instance.apply(PipelineEvent::MetadataRecorded).unwrap();
        }
        instance.report(false)
    }

    #[test]
    fn test_second_claim_while_active_is_coalesced() {
        let registry = InstanceRegistry::new();
        let first = registry.claim("cat.jpg");
        assert!(matches!(first, Claim::Acquired(_)));
        assert!(matches!(
            registry.claim("cat.jpg"),
            Claim::Coalesced(Coalesced::Active)
        ));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn test_distinct_identities_do_not_block() {
        let registry = InstanceRegistry::new();
        let _a = registry.claim("a.jpg");
        assert!(matches!(registry.claim("b.jpg"), Claim::Acquired(_)));
    }

    #[test]
    fn test_completed_identity_is_coalesced() {
        let registry = InstanceRegistry::new();
        let Claim::Acquired(guard) = registry.claim("cat.jpg") else {
            panic!("expected claim");
        };
        guard.finish(report("cat.jpg", false));

        assert!(matches!(
            registry.claim("cat.jpg"),
            Claim::Coalesced(Coalesced::Completed)
        ));
        assert_eq!(
            registry.report("cat.jpg").unwrap().state,
            PipelineState::Completed
        );
    }

    #[test]
    fn test_unsuccessful_identity_can_restart() {
        let registry = InstanceRegistry::new();
        let Claim::Acquired(guard) = registry.claim("notes.txt") else {
            panic!("expected claim");
        };
        guard.finish(report("notes.txt", true));

        assert!(matches!(registry.claim("notes.txt"), Claim::Acquired(_)));
    }

    #[test]
    fn test_unsuccessful_runs_are_not_retained() {
        let registry = InstanceRegistry::new();
        for i in 0..100 {
            let key = format!("upload-{i}.txt");
            let Claim::Acquired(guard) = registry.claim(&key) else {
                panic!("expected claim");
            };
            guard.finish(report(&key, true));
        }
        let Claim::Acquired(guard) = registry.claim("cat.jpg") else {
            panic!("expected claim");
        };
        guard.finish(report("cat.jpg", false));

        assert!(registry.report("upload-0.txt").is_none());
        assert_eq!(registry.reports().len(), 1);
        assert_eq!(registry.lock().len(), 1);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn test_dropped_guard_releases_identity() {
        let registry = InstanceRegistry::new();
        {
            let _claim = registry.claim("cat.jpg");
            assert!(registry.is_active("cat.jpg"));
        }
        assert!(!registry.is_active("cat.jpg"));
        assert!(registry.report("cat.jpg").is_none());
        assert!(matches!(registry.claim("cat.jpg"), Claim::Acquired(_)));
    }
}
