use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use uuid::Uuid;

/// Tracks which projects are being integrated. At most one [`AdmissionToken`] exists per
/// project at any time.
#[derive(Debug, Clone, Default)]
pub struct IntegrationScheduler {
    integrating: Arc<Mutex<HashSet<Uuid>>>,
}

impl IntegrationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `project` for integration. `None` if another holder already has it.
    pub fn try_admit(&self, project: Uuid) -> Option<AdmissionToken> {
        let mut integrating = self.integrating.lock().unwrap_or_else(PoisonError::into_inner);
        if !integrating.insert(project) {
            return None;
        }
        debug!(project = %project, "Admitted project for integration");
        Some(AdmissionToken {
            project,
            integrating: Arc::clone(&self.integrating),
        })
    }

    pub fn is_integrating(&self, project: Uuid) -> bool {
        self.integrating.lock().unwrap_or_else(PoisonError::into_inner).contains(&project)
    }

    /// Projects to exclude when extracting new batches
    pub fn currently_integrating(&self) -> HashSet<Uuid> {
        self.integrating.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Exclusive claim on a project; released on drop
#[derive(Debug)]
pub struct AdmissionToken {
    project: Uuid,
    integrating: Arc<Mutex<HashSet<Uuid>>>,
}

impl AdmissionToken {
    pub fn project(&self) -> Uuid {
        self.project
    }
}

impl Drop for AdmissionToken {
    fn drop(&mut self) {
        self.integrating.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.project);
        debug!(project = %self.project, "Released project");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder_per_project() {
        let scheduler = IntegrationScheduler::new();
        let project = Uuid::new_v4();

        let token = scheduler.try_admit(project).unwrap();
        assert!(scheduler.try_admit(project).is_none());
        assert!(scheduler.try_admit(Uuid::new_v4()).is_some());
        assert!(scheduler.currently_integrating().contains(&project));

        drop(token);
        assert!(!scheduler.is_integrating(project));
        assert!(scheduler.try_admit(project).is_some());
    }
}
