use std::path::{Path, PathBuf};
use std::sync::Arc;

use accord_core::{Agreement, HarvestedAgreement};
use accord_storage::{decode_ndjson, RunOutputStore, StoredOutput};
use accord_sync::{
    load_dedup_config, load_validation_rules, process_batch, report_recent_runs, DedupEngine, HarvestConfig,
    HarvestPipeline, ValidationEngine,
};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "accord-cli")]
#[command(about = "Bilateral agreement harvest, deduplication and QA")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one harvest over the enabled sources; keeps running when the scheduler is enabled.
    Harvest,
    /// Deduplicate, merge and validate an NDJSON file of agreements.
    Dedup {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the QA report for an NDJSON file of agreements.
    Validate {
        #[arg(long)]
        input: PathBuf,
        /// Harvest date for the future-date rule (YYYY-MM-DD); defaults to today.
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// List the most recent harvest runs.
    Report {
        #[arg(long, default_value_t = 5)]
        runs: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn read_agreements(path: &Path) -> Result<Vec<Agreement>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    decode_ndjson(&text).with_context(|| format!("decoding {}", path.display()))
}

/// Atomic write through the run-output store: a crash never leaves a truncated file at `output`.
async fn write_rows(output: &Path, rows: &[HarvestedAgreement]) -> Result<StoredOutput> {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = output
        .file_name()
        .with_context(|| format!("{} has no file name", output.display()))?;
    RunOutputStore::new(dir).write_ndjson(name, rows).await
}

fn validator_for(config: &HarvestConfig, as_of: Option<NaiveDate>) -> Result<ValidationEngine> {
    let rules = load_validation_rules(config.rules_dir().join("validation.yaml"))?;
    let harvest_date = as_of
        .or(config.harvest_date)
        .unwrap_or_else(|| Utc::now().date_naive());
    Ok(ValidationEngine::new(&rules, harvest_date)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = HarvestConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Harvest) {
        Commands::Harvest => {
            let pipeline = Arc::new(HarvestPipeline::from_workspace(config)?);
            let summary = pipeline.run_once().await?;
            println!(
                "harvest complete: run_id={} sources={} extracted={} merged={} valid_ratio={:.3} reports={}",
                summary.run_id,
                summary.enabled_sources,
                summary.extracted_records,
                summary.merged_records,
                summary.valid_ratio,
                summary.reports_dir
            );
            if let Some(sched) = pipeline.maybe_build_scheduler().await? {
                sched.start().await.context("starting scheduler")?;
                info!("scheduler running; press ctrl-c to stop");
                tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            }
        }
        Commands::Dedup { input, output } => {
            let agreements = read_agreements(&input).await?;
            let dedup_config = load_dedup_config(config.rules_dir().join("dedup.yaml"))?;
            let validator = validator_for(&config, None)?;
            let batch = process_batch(&DedupEngine::new(dedup_config), &validator, &agreements)?;
            write_rows(&output, &batch.rows)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            info!(
                input = batch.extracted_records,
                output = batch.rows.len(),
                path = %output.display(),
                "dedup complete"
            );
            println!("{}", serde_json::to_string_pretty(&batch.report)?);
        }
        Commands::Validate { input, as_of } => {
            let agreements = read_agreements(&input).await?;
            let report = validator_for(&config, as_of)?.generate_qa_report(&agreements);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Report { runs } => {
            println!("{}", report_recent_runs(runs, &config.reports_root())?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::ValidationOutcome;

    fn row(title: &str) -> HarvestedAgreement {
        let agreement = Agreement {
            title_native: None,
            title_en: Some(title.to_string()),
            agreement_type: "MOU".into(),
            status: "signed".into(),
            date_signed: None,
            jurisdiction_level: "national".into(),
            sources: vec!["https://registry.example.gov/mou".into()],
            country_code: "HU".into(),
        };
        HarvestedAgreement::new(agreement, 1, None, ValidationOutcome::from_findings(Vec::new(), Vec::new()))
    }

    #[tokio::test]
    async fn dedup_output_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("out.ndjson");
        std::fs::write(&output, "stale partial line").unwrap();

        let stored = write_rows(&output, &[row("Memorandum of Understanding on Trade")]).await.unwrap();
        assert_eq!(stored.absolute_path, output);

        let text = std::fs::read_to_string(&output).unwrap();
        let rows: Vec<HarvestedAgreement> = decode_ndjson(&text).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!text.contains("stale"));

        let names = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["out.ndjson".to_string()]);
    }

    #[tokio::test]
    async fn dedup_output_path_without_a_file_name_is_rejected() {
        assert!(write_rows(Path::new("/"), &[]).await.is_err());
    }
}
