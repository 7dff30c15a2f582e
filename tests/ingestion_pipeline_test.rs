//! Submission and directory ingestion through the async pipeline

use std::sync::Arc;

use swathe::api::{SubmitResultCode, SubmitTagFileRequest, TagFileSubmitter};
use swathe::config::SwatheConfig;
use swathe::core::geometry::Xyz;
use swathe::ingest::{BufferQueueEntry, BufferQueueKey, IngestionPipeline};
use swathe::parsing::dictionary::FieldType;
use swathe::parsing::tag_file::TagFileWriter;
use swathe::parsing::value_names as names;
use swathe::registry::site_models::SiteModels;
use tempfile::TempDir;
use uuid::Uuid;

fn config(dir: &TempDir) -> SwatheConfig {
    SwatheConfig {
        cell_size: 1.0,
        max_grouped_tag_files: 2,
        site_model_dir: Some(dir.path().join("models").to_string_lossy().into_owned()),
        ..SwatheConfig::default()
    }
}

/// One blade epoch over 3 x 4 cells starting at `north`
fn tag_file(hardware_id: &str, north: f64) -> Vec<u8> {
    let mut writer = TagFileWriter::new();
    writer
        .write_ansi_string(names::MACHINE_ID, hardware_id)
        .write_week(2200)
        .write_time(1_000)
        .write_blade(Xyz::new(0.0, north, 5.0), Xyz::new(3.0, north, 5.0))
        .write_time_offset(10)
        .write_blade(Xyz::new(0.0, north + 4.0, 5.0), Xyz::new(3.0, north + 4.0, 5.0));
    writer.finish()
}

fn request(project: Uuid, file_name: &str, content: Vec<u8>) -> SubmitTagFileRequest {
    SubmitTagFileRequest {
        project_id: project,
        asset_id: Some(Uuid::new_v4()),
        file_name: file_name.to_string(),
        content,
        originating_org_id: Some("org-1".to_string()),
        treat_as_john_doe: false,
    }
}

fn pass_count(pipeline: &IngestionPipeline, project: Uuid) -> usize {
    let model = pipeline.site_models().get_site_model(project).unwrap();
    let passes = model.read().unwrap().grid.pass_count();
    passes
}

#[tokio::test]
async fn test_ingest_directory_persists_site_model() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    for (i, north) in [0.0, 10.0, 20.0].into_iter().enumerate() {
        let name = format!("0523J019SW--CB54--19081409481{i}.tag");
        std::fs::write(input.join(name), tag_file("CB54-0001", north)).unwrap();
    }
    std::fs::write(input.join("notes.txt"), b"not a tag file").unwrap();

    let config = config(&dir);
    let project = Uuid::new_v4();
    let pipeline = IngestionPipeline::new(config.clone());
    let summary = pipeline.ingest_directory(&input, project, None, true).await.unwrap();

    assert_eq!(summary.files_queued, 3);
    assert_eq!(summary.files_converted, 3);
    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.batches.len(), 2);
    assert_eq!(summary.cell_passes_integrated(), 36);
    assert!(summary.batches.iter().all(|b| b.persisted));

    let reopened = SiteModels::with_config(&config);
    let model = reopened.get_site_model(project).unwrap();
    let model = model.read().unwrap();
    assert_eq!(model.grid.pass_count(), 36);
    assert_eq!(model.processed_tag_file_count, 3);
    assert_eq!(model.machines.len(), 1);
    assert!(model.machines.locate_john_doe("CB54-0001").is_some());
}

#[tokio::test]
async fn test_unreadable_file_is_counted_as_failed() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::write(input.join("a.tag"), tag_file("CB54-0001", 0.0)).unwrap();
    std::fs::write(input.join("b.tag"), [0xFFu8; 32]).unwrap();

    let pipeline = IngestionPipeline::new(config(&dir));
    let summary = pipeline
        .ingest_directory(&input, Uuid::new_v4(), Some(Uuid::new_v4()), false)
        .await
        .unwrap();

    assert_eq!(summary.files_converted, 1);
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.cell_passes_integrated(), 12);
}

#[tokio::test]
async fn test_failed_batch_is_counted_and_run_continues() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::write(input.join("a.tag"), tag_file("CB54-0001", 0.0)).unwrap();
    std::fs::write(input.join("b.tag"), tag_file("CB54-0001", 10.0)).unwrap();

    let config = config(&dir);
    let finer = SwatheConfig {
        cell_size: 0.5,
        ..config.clone()
    };
    let pipeline =
        IngestionPipeline::with_site_models(config, Arc::new(SiteModels::with_config(&finer)));
    let project = Uuid::new_v4();
    let summary = pipeline.ingest_directory(&input, project, None, true).await.unwrap();

    assert_eq!(summary.files_queued, 2);
    assert_eq!(summary.files_converted, 0);
    assert_eq!(summary.files_failed, 2);
    assert_eq!(summary.cell_passes_integrated(), 0);
    assert_eq!(pipeline.queued_count(), 0);
    let model = pipeline.site_models().get_site_model(project).unwrap();
    assert!(model.read().unwrap().machines.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_runs_share_the_queue() {
    let dir = TempDir::new().unwrap();
    let pipeline = Arc::new(IngestionPipeline::new(config(&dir)));
    let project = Uuid::new_v4();
    for i in 0..6 {
        let mut entry = BufferQueueEntry::new(tag_file("CB54-0001", f64::from(i) * 10.0));
        entry.treat_as_john_doe = true;
        assert!(pipeline.enqueue(BufferQueueKey::new(&format!("{i}.tag"), project, None), entry));
    }

    let (first, second) = tokio::join!(
        tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.run_until_idle().await }
        }),
        tokio::spawn({
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.run_until_idle().await }
        })
    );
    let (first, second) = (first.unwrap().unwrap(), second.unwrap().unwrap());

    assert_eq!(first.files_converted + second.files_converted, 6);
    assert_eq!(first.files_failed + second.files_failed, 0);
    assert_eq!(first.cell_passes_integrated() + second.cell_passes_integrated(), 72);
    assert_eq!(pass_count(&pipeline, project), 72);
}

#[tokio::test]
async fn test_submitted_files_are_ingested() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let pipeline = Arc::new(IngestionPipeline::new(config.clone()));
    let submitter = TagFileSubmitter::new(config, Arc::clone(&pipeline));
    let project = Uuid::new_v4();

    let response = submitter.submit(request(project, "a.tag", tag_file("CB54-0001", 0.0)));
    assert_eq!(response.code, SubmitResultCode::Success);
    assert_eq!(pipeline.queued_count(), 1);

    let summary = pipeline.run_until_idle().await.unwrap();
    assert_eq!(summary.files_converted, 1);
    assert_eq!(pass_count(&pipeline, project), 12);
}

#[test]
fn test_submission_result_codes() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    let submitter = TagFileSubmitter::new(config.clone(), Arc::new(IngestionPipeline::new(config)));
    let project = Uuid::new_v4();
    let good = tag_file("CB54-0001", 0.0);

    let empty_name = submitter.submit(request(project, " ", good.clone()));
    assert_eq!(empty_name.code, SubmitResultCode::InvalidRequest);

    let empty_content = submitter.submit(request(project, "a.tag", Vec::new()));
    assert_eq!(empty_content.code, SubmitResultCode::InvalidRequest);

    let nil_project = submitter.submit(request(Uuid::nil(), "a.tag", good.clone()));
    assert_eq!(nil_project.code, SubmitResultCode::InvalidRequest);

    let unreadable = submitter.submit(request(project, "junk.tag", vec![0xFF; 32]));
    assert_eq!(unreadable.code, SubmitResultCode::UnreadableFile);

    let mut writer = TagFileWriter::new();
    writer
        .write_ansi_string(names::MACHINE_ID, "CB54-0001")
        .write_unsigned(names::WEEK, FieldType::UInt32, 50_000_000)
        .write_time(1_000);
    let bad_week = submitter.submit(request(project, "week.tag", writer.finish()));
    assert_eq!(bad_week.code, SubmitResultCode::UnreadableFile);

    let too_short = submitter.submit(request(project, "short.tag", vec![1, 0, 0]));
    assert_eq!(too_short.code, SubmitResultCode::RejectedByPolicy);

    let mut anonymous = request(project, "anon.tag", good.clone());
    anonymous.asset_id = None;
    assert_eq!(submitter.submit(anonymous.clone()).code, SubmitResultCode::RejectedByPolicy);

    anonymous.treat_as_john_doe = true;
    assert!(submitter.submit(anonymous).is_success());
}
