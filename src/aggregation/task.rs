use uuid::Uuid;

use crate::execution::converter::ConversionResult;

/// One converted file waiting to be merged into its target site model
#[derive(Debug, Clone)]
pub struct AggregationTask {
    pub file_name: String,
    pub target_project: Uuid,
    /// Asset the file was submitted for; `None` for JohnDoe submissions
    pub asset_id: Option<Uuid>,
    pub treat_as_john_doe: bool,
    pub originating_org_id: Option<String>,
    pub conversion: ConversionResult,
}

impl AggregationTask {
    pub fn new(target_project: Uuid, asset_id: Option<Uuid>, conversion: ConversionResult) -> Self {
        AggregationTask {
            file_name: conversion.file_name.clone(),
            target_project,
            treat_as_john_doe: asset_id.is_none(),
            asset_id,
            originating_org_id: None,
            conversion,
        }
    }

    /// Whether the machine is resolved by hardware id rather than asset id
    pub fn is_john_doe(&self) -> bool {
        self.treat_as_john_doe || self.asset_id.is_none()
    }
}
