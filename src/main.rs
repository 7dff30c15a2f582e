//! Swathe - TAG file ingestion engine
//!
//! Usage:
//!   swathe ingest --project <uuid> --input data/tagfiles --asset <uuid> --model-dir data/models
//!   swathe ingest --project <uuid> --input data/tagfiles --john-doe
//!   swathe dump data/tagfiles/0523J019SW--CB54--190814094812.tag
//!   swathe summary --project <uuid> --model-dir data/models

use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};

use clap::{Parser, Subcommand};
use swathe::config::SwatheConfig;
use swathe::ingest::IngestionPipeline;
use swathe::parsing::dumper::TagFileDumper;
use swathe::parsing::tag_file::TagFileReader;
use swathe::registry::site_models::SiteModels;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "swathe")]
#[command(about = "Swathe - Decode, swath and aggregate machine TAG files into site models")]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest every .tag file in a directory into a project's site model
    Ingest {
        /// Target project id
        #[arg(short, long)]
        project: Uuid,

        /// Directory containing .tag files
        #[arg(short, long)]
        input: PathBuf,

        /// Asset the files belong to
        #[arg(short, long)]
        asset: Option<Uuid>,

        /// Resolve the machine by hardware id instead of asset id
        #[arg(long)]
        john_doe: bool,

        /// Directory site models are persisted to (overrides the config file)
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Print the dictionary and every value of a TAG file
    Dump {
        /// TAG file to dump
        file: PathBuf,
    },
    /// Print the contents of a persisted site model
    Summary {
        /// Project id
        #[arg(short, long)]
        project: Uuid,

        /// Directory site models are persisted to
        #[arg(long)]
        model_dir: PathBuf,
    },
}

fn load_config(path: Option<&PathBuf>) -> swathe::Result<SwatheConfig> {
    match path {
        Some(path) => SwatheConfig::load_from_file(path),
        None => Ok(SwatheConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_ref())?;

    match args.command {
        Command::Ingest { project, input, asset, john_doe, model_dir } => {
            if let Some(dir) = model_dir {
                config.site_model_dir = Some(dir.to_string_lossy().into_owned());
            }
            if asset.is_none() && !john_doe {
                eprintln!("Error: either --asset or --john-doe is required");
                std::process::exit(1);
            }

            let pipeline = IngestionPipeline::new(config);
            let should_stop = pipeline.shutdown_handle();
            ctrlc::set_handler(move || {
                println!("\nReceived Ctrl+C, stopping after the current batch...");
                should_stop.store(true, Ordering::Relaxed);
            })?;

            let summary = pipeline.ingest_directory(&input, project, asset, john_doe).await?;

            println!("\nIngestion Complete!");
            println!("===================");
            println!("Files queued:        {}", summary.files_queued);
            println!("Files converted:     {}", summary.files_converted);
            println!("Files failed:        {}", summary.files_failed);
            println!("Batches:             {}", summary.batches.len());
            println!("Cell passes merged:  {}", summary.cell_passes_integrated());
            println!("Persisted:           {}", summary.batches.iter().all(|b| b.persisted));
        }
        Command::Dump { file } => {
            let bytes = std::fs::read(&file)?;
            let stdout = std::io::stdout();
            let mut dumper = TagFileDumper::new(BufWriter::new(stdout.lock()));
            let result = TagFileReader::new(&bytes).read(&mut dumper)?;
            drop(dumper);
            info!(file = %file.display(), result = %result, "Dumped TAG file");
            println!("Result: {}", result);
        }
        Command::Summary { project, model_dir } => {
            config.site_model_dir = Some(model_dir.to_string_lossy().into_owned());
            let site_models = Arc::new(SiteModels::with_config(&config));
            let Some(model) = site_models.get_site_model(project) else {
                eprintln!("Error: no site model for project {}", project);
                std::process::exit(1);
            };
            let model = model.read().unwrap_or_else(PoisonError::into_inner);

            println!("Site model {}", model.id);
            println!("=================================================");
            println!("Cell size:           {} m", model.grid.cell_size());
            println!("Subgrids:            {}", model.grid.subgrid_count());
            println!("Cells:               {}", model.grid.cell_count());
            println!("Cell passes:         {}", model.grid.pass_count());
            println!("TAG files processed: {}", model.processed_tag_file_count);
            println!("Epochs processed:    {}", model.total_processed_epochs);
            println!("Designs:             {:?}", model.designs.names());
            println!("Proofing runs:       {}", model.proofing_runs.len());
            println!("Machines:");
            for machine in model.machines.iter() {
                let events = model
                    .event_lists(machine.internal_index)
                    .map_or(0, |e| e.total_event_count());
                println!(
                    "  [{}] {} ({}) hardware={} john_doe={} events={}",
                    machine.internal_index,
                    machine.name,
                    machine.id,
                    machine.hardware_id,
                    machine.is_john_doe,
                    events
                );
            }
        }
    }

    Ok(())
}
