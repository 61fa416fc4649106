//! cleanreport CLI: fill in and submit a cleaning report from the terminal.
//!
//! Reads RELAY_URL and the other client settings from the environment (or `.env`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use cleanreport_cli::{init_tracing, ConsoleUi};
use cleanreport_client::{
    ClientConfig, FormState, HttpRelayClient, SelectedFile, SubmissionOrchestrator, SubmitOutcome,
    TransferMode,
};
use cleanreport_core::WorkType;
use cleanreport_processing::{CompressionOptions, ImageCompressor};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "cleanreport", about = "Cleaning report client")]
struct Cli {
    /// Relay base URL (overrides RELAY_URL)
    #[arg(long, global = true)]
    relay_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress photos and submit a report
    Submit(SubmitArgs),
    /// Show the photo fields and whether they are enabled for a work type
    Fields {
        #[arg(long, default_value = "normal")]
        work_type: WorkType,
    },
    /// Show the forwarding status of a submission
    Status {
        submission_id: Uuid,
    },
    /// Compress one image locally and write the JPEG
    Compress {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        max_width: Option<u32>,
        /// Quality factor between 0.0 and 1.0
        #[arg(long)]
        quality: Option<f32>,
    },
}

#[derive(clap::Args)]
struct SubmitArgs {
    #[arg(long)]
    staff: String,
    #[arg(long)]
    site: String,
    /// Report date (YYYY-MM-DD), today when omitted
    #[arg(long)]
    date: Option<NaiveDate>,
    /// normal, regular, filter or full
    #[arg(long, default_value = "normal")]
    work_type: WorkType,
    /// Work time in minutes (filter and full only)
    #[arg(long)]
    work_time: Option<u32>,
    /// batched, per_image_sequential or per_image_with_progress
    #[arg(long)]
    mode: Option<TransferMode>,
    #[arg(long = "normal", num_args = 1..)]
    normal_photos: Vec<PathBuf>,
    #[arg(long = "normal-extra", num_args = 1..)]
    normal_extra: Vec<PathBuf>,
    #[arg(long = "regular-before", num_args = 1..)]
    regular_before: Vec<PathBuf>,
    #[arg(long = "regular-after", num_args = 1..)]
    regular_after: Vec<PathBuf>,
    #[arg(long = "filter", num_args = 1..)]
    filter: Vec<PathBuf>,
}

impl SubmitArgs {
    fn selections(&self) -> [(&'static str, &[PathBuf]); 5] {
        [
            ("normal_photos", self.normal_photos.as_slice()),
            ("normal_extra", self.normal_extra.as_slice()),
            ("regular_before", self.regular_before.as_slice()),
            ("regular_after", self.regular_after.as_slice()),
            ("filter", self.filter.as_slice()),
        ]
    }

    fn build_form(&self) -> anyhow::Result<FormState> {
        let mut form = FormState::dated(self.date.unwrap_or_else(|| Local::now().date_naive()));
        form.set_staff(self.staff.as_str());
        form.set_site(self.site.as_str());
        form.set_work_type(self.work_type);
        form.set_work_time(self.work_time)?;

        for (field_id, paths) in self.selections() {
            if paths.is_empty() {
                continue;
            }
            let files = paths.iter().map(SelectedFile::from_path).collect();
            form.select_files(field_id, files)
                .with_context(|| format!("Cannot select photos for {}", field_id))?;
        }
        Ok(form)
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn submit(config: ClientConfig, args: SubmitArgs) -> anyhow::Result<()> {
    let mut config = config;
    if let Some(mode) = args.mode {
        config.transfer_mode = mode;
    }

    let mut form = args.build_form()?;
    let transport = HttpRelayClient::new(config.relay_url.clone(), config.timeout)?;
    let orchestrator = SubmissionOrchestrator::new(config, Arc::new(transport));
    let mut ui = ConsoleUi::new();

    match orchestrator.submit(&mut form, &mut ui).await {
        SubmitOutcome::Completed {
            submission_id,
            images,
        } => print_json(&serde_json::json!({
            "submissionId": submission_id,
            "images": images,
        })),
        SubmitOutcome::NotEligible(missing) => {
            for requirement in &missing {
                eprintln!("- {}", requirement);
            }
            anyhow::bail!(cleanreport_client::MISSING_FIELDS_MESSAGE)
        }
        SubmitOutcome::Failed(err) => Err(err.into()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env().context("Failed to load client configuration")?;
    if let Some(url) = cli.relay_url {
        config.relay_url = url.trim_end_matches('/').to_string();
    }

    match cli.command {
        Commands::Submit(args) => submit(config, args).await?,
        Commands::Fields { work_type } => {
            let mut form = FormState::new();
            let fields: Vec<_> = form
                .set_work_type(work_type)
                .into_iter()
                .map(|view| {
                    serde_json::json!({
                        "id": view.id,
                        "label": view.label,
                        "enabled": view.enabled,
                        "required": view.required,
                        "maxCount": view.max_count,
                    })
                })
                .collect();
            print_json(&serde_json::json!({
                "workType": work_type,
                "workTypeLabel": work_type.label(),
                "workTimeRequired": work_type.requires_work_time(),
                "fields": fields,
            }))?;
        }
        Commands::Status { submission_id } => {
            let client = HttpRelayClient::new(config.relay_url.clone(), config.timeout)?;
            let status = client.status(submission_id).await?;
            print_json(&status)?;
        }
        Commands::Compress {
            input,
            output,
            max_width,
            quality,
        } => {
            let options = CompressionOptions {
                max_width: max_width.unwrap_or(config.compression.max_width),
                quality: quality.unwrap_or(config.compression.quality),
            };
            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let image = tokio::task::spawn_blocking(move || ImageCompressor::compress(&bytes, &options))
                .await??;
            tokio::fs::write(&output, &image.jpeg)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_json(&serde_json::json!({
                "output": output.display().to_string(),
                "width": image.width,
                "height": image.height,
                "bytes": image.jpeg.len(),
            }))?;
        }
    }

    Ok(())
}
