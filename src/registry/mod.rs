//! Registry of site models by project id

pub mod site_models;

pub use site_models::{SharedSiteModel, SiteModels};
