use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{SwatheConfig, DEFAULT_CELL_SIZE};
use crate::error::{Error, Result};
use crate::storage::site_model::SiteModel;

pub type SharedSiteModel = Arc<RwLock<SiteModel>>;

/// Registry of site models by project id. Models are created on first reference and, when a
/// storage directory is configured, loaded from and saved to `<dir>/<project>.sitemodel`.
pub struct SiteModels {
    models: Arc<RwLock<HashMap<Uuid, SharedSiteModel>>>,
    cell_size: f64,
    storage_dir: Option<PathBuf>,
}

impl SiteModels {
    /// In-memory registry with the default cell size
    pub fn new() -> Self {
        SiteModels {
            models: Arc::new(RwLock::new(HashMap::new())),
            cell_size: DEFAULT_CELL_SIZE,
            storage_dir: None,
        }
    }

    pub fn with_config(config: &SwatheConfig) -> Self {
        SiteModels {
            models: Arc::new(RwLock::new(HashMap::new())),
            cell_size: config.cell_size,
            storage_dir: config.site_model_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn storage_dir(&self) -> Option<&PathBuf> {
        self.storage_dir.as_ref()
    }

    fn cached(&self, project: Uuid) -> Option<SharedSiteModel> {
        self.models.read().unwrap_or_else(PoisonError::into_inner).get(&project).cloned()
    }

    fn load(&self, project: Uuid) -> Result<Option<SiteModel>> {
        let Some(dir) = &self.storage_dir else { return Ok(None) };
        let path = SiteModel::storage_path(dir, project);
        if !path.exists() {
            return Ok(None);
        }
        let model = SiteModel::load_from_file(&path)?;
        debug!(site_model = %project, path = %path.display(), "Loaded site model");
        Ok(Some(model))
    }

    fn insert(&self, project: Uuid, model: SiteModel) -> SharedSiteModel {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        models.entry(project).or_insert_with(|| Arc::new(RwLock::new(model))).clone()
    }

    /// Read access for collaborators outside the aggregation engine. `None` if the project has
    /// never been ingested.
    pub fn get_site_model(&self, project: Uuid) -> Option<SharedSiteModel> {
        if let Some(model) = self.cached(project) {
            return Some(model);
        }
        match self.load(project) {
            Ok(Some(model)) => Some(self.insert(project, model)),
            Ok(None) => None,
            Err(e) => {
                warn!(site_model = %project, error = %e, "Site model could not be loaded");
                None
            }
        }
    }

    /// Existing model for `project`, or a new empty one
    pub fn get_or_create(&self, project: Uuid) -> Result<SharedSiteModel> {
        if project.is_nil() {
            return Err(Error::SiteModelUnavailable(project, "nil project id".to_string()));
        }
        if let Some(model) = self.cached(project) {
            return Ok(model);
        }

        let model = match self.load(project) {
            Ok(Some(model)) => model,
            Ok(None) => {
                info!(site_model = %project, cell_size = self.cell_size, "Creating site model");
                SiteModel::new(project, self.cell_size)
            }
            Err(e) => return Err(Error::SiteModelUnavailable(project, e.to_string())),
        };
        Ok(self.insert(project, model))
    }

    /// Save a model to the storage directory. Returns false when running in memory only.
    pub fn persist(&self, project: Uuid) -> Result<bool> {
        let Some(dir) = &self.storage_dir else { return Ok(false) };
        let model = self
            .cached(project)
            .ok_or_else(|| Error::SiteModelUnavailable(project, "not loaded".to_string()))?;

        std::fs::create_dir_all(dir)?;
        let path = SiteModel::storage_path(dir, project);
        model.read().unwrap_or_else(PoisonError::into_inner).save_to_file(&path)?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.models.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_site_model_before_creation() {
        let models = SiteModels::new();
        assert!(models.get_site_model(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_get_or_create_returns_same_model() {
        let models = SiteModels::new();
        let project = Uuid::new_v4();
        let first = models.get_or_create(project).unwrap();
        let second = models.get_or_create(project).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(models.len(), 1);
        assert!(models.get_site_model(project).is_some());
    }

    #[test]
    fn test_nil_project_is_unavailable() {
        let err = SiteModels::new().get_or_create(Uuid::nil()).unwrap_err();
        assert!(matches!(err, Error::SiteModelUnavailable(..)));
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let config = SwatheConfig {
            site_model_dir: Some(dir.path().to_string_lossy().into_owned()),
            ..SwatheConfig::default()
        };
        let project = Uuid::new_v4();

        let models = SiteModels::with_config(&config);
        models.get_or_create(project).unwrap().write().unwrap().designs.encode("Formation");
        assert!(models.persist(project).unwrap());

        let reopened = SiteModels::with_config(&config);
        let model = reopened.get_site_model(project).unwrap();
        assert_eq!(model.read().unwrap().designs.id_of("Formation"), Some(0));
    }

    #[test]
    fn test_corrupt_model_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let config = SwatheConfig {
            site_model_dir: Some(dir.path().to_string_lossy().into_owned()),
            ..SwatheConfig::default()
        };
        let project = Uuid::new_v4();
        std::fs::write(SiteModel::storage_path(dir.path(), project), b"not a site model").unwrap();

        let models = SiteModels::with_config(&config);
        assert!(models.get_site_model(project).is_none());
        assert!(matches!(models.get_or_create(project), Err(Error::SiteModelUnavailable(..))));
    }
}
