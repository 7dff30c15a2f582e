use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::SwatheConfig;
use crate::execution::pre_scan::pre_scan;
use crate::ingest::buffer_queue::{BufferQueueEntry, BufferQueueKey};
use crate::ingest::pipeline::IngestionPipeline;
use crate::parsing::tag_file::ReadResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTagFileRequest {
    pub project_id: Uuid,
    pub asset_id: Option<Uuid>,
    pub file_name: String,
    pub content: Vec<u8>,
    pub originating_org_id: Option<String>,
    pub treat_as_john_doe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SubmitResultCode {
    Success = 0,
    InvalidRequest = 1,
    UnreadableFile = 2,
    RejectedByPolicy = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitTagFileResponse {
    pub code: SubmitResultCode,
    pub message: String,
}

impl SubmitTagFileResponse {
    fn new(code: SubmitResultCode, message: impl Into<String>) -> Self {
        SubmitTagFileResponse {
            code,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == SubmitResultCode::Success
    }
}

/// Validates submitted files and queues the accepted ones on an [`IngestionPipeline`]
pub struct TagFileSubmitter {
    config: SwatheConfig,
    pipeline: Arc<IngestionPipeline>,
}

impl TagFileSubmitter {
    pub fn new(config: SwatheConfig, pipeline: Arc<IngestionPipeline>) -> Self {
        TagFileSubmitter { config, pipeline }
    }

    pub fn submit(&self, request: SubmitTagFileRequest) -> SubmitTagFileResponse {
        let file = request.file_name.clone();
        let project = request.project_id;
        let org = request.originating_org_id.clone().unwrap_or_default();
        info!(file = %file, project = %project, org = %org, "TAG file submitted");

        let response = self.check_and_queue(request);

        if response.is_success() {
            info!(
                file = %file,
                project = %project,
                org = %org,
                code = response.code as u8,
                "TAG file accepted"
            );
        } else {
            warn!(
                file = %file,
                project = %project,
                org = %org,
                code = response.code as u8,
                reason = %response.message,
                "TAG file rejected"
            );
        }
        response
    }

    fn check_and_queue(&self, request: SubmitTagFileRequest) -> SubmitTagFileResponse {
        use SubmitResultCode::{InvalidRequest, RejectedByPolicy, Success, UnreadableFile};

        if request.file_name.trim().is_empty() {
            return SubmitTagFileResponse::new(InvalidRequest, "file name is empty");
        }
        if request.content.is_empty() {
            return SubmitTagFileResponse::new(InvalidRequest, "file content is empty");
        }
        if request.project_id.is_nil() {
            return SubmitTagFileResponse::new(InvalidRequest, "project id is nil");
        }

        let john_doe = request.treat_as_john_doe;
        if request.asset_id.is_none() && !john_doe {
            return SubmitTagFileResponse::new(
                RejectedByPolicy,
                "no asset id and not flagged as JohnDoe",
            );
        }
        if request.content.len() < self.config.min_tag_file_length {
            return SubmitTagFileResponse::new(
                RejectedByPolicy,
                format!(
                    "file is {} bytes, minimum is {}",
                    request.content.len(),
                    self.config.min_tag_file_length
                ),
            );
        }

        match pre_scan(&self.config, &request.content) {
            Ok(scan) if scan.read_result == ReadResult::NoError => {}
            Ok(scan) => {
                return SubmitTagFileResponse::new(UnreadableFile, scan.read_result.to_string());
            }
            Err(e) => return SubmitTagFileResponse::new(UnreadableFile, e.to_string()),
        }

        let asset = if john_doe { None } else { request.asset_id };
        let key = BufferQueueKey::new(&request.file_name, request.project_id, asset);
        let entry = BufferQueueEntry {
            originating_org_id: request.originating_org_id,
            treat_as_john_doe: john_doe,
            ..BufferQueueEntry::new(request.content)
        };
        if !self.pipeline.enqueue(key, entry) {
            return SubmitTagFileResponse::new(RejectedByPolicy, "file is already queued");
        }
        SubmitTagFileResponse::new(Success, "queued")
    }
}
