//! Harvest pipeline orchestration: extract, deduplicate, validate, persist.

pub mod config;
pub mod dedup;
pub mod validation;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use accord_adapters::{adapter_for_source, load_extraction_bundle, SourceKind};
use accord_core::{Agreement, HarvestedAgreement, QaReport};
use accord_storage::{RunOutputStore, StoredOutput};
use anyhow::{Context, Result};
use arrow_array::{BooleanArray, Float64Array, RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{info, warn};
use uuid::Uuid;

pub use config::{load_dedup_config, load_validation_rules, ConfigError, HarvestConfig};
pub use dedup::{merge_agreements, DedupConfig, DedupEngine, MergedAgreement, SimilarityMetric};
pub use validation::{ValidationEngine, ValidationRules};

pub const CRATE_NAME: &str = "accord-sync";

pub(crate) fn resolve_workers(configured: usize) -> usize {
    if configured == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        configured
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Fixture,
    Manual,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub display_name: String,
    pub enabled: bool,
    pub source_kind: SourceKind,
    pub country_code: String,
    pub mode: SourceMode,
    #[serde(default)]
    pub listing_urls: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub harvest_date: NaiveDate,
    pub country_code: Option<String>,
    pub enabled_sources: usize,
    pub failed_sources: Vec<String>,
    pub extracted_records: usize,
    pub merged_records: usize,
    pub valid_records: usize,
    pub valid_ratio: f64,
    pub reports_dir: String,
    pub parquet_manifest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

/// Final records of one batch plus their QA aggregate.
#[derive(Debug, Clone)]
pub struct ProcessedBatch {
    pub rows: Vec<HarvestedAgreement>,
    pub report: QaReport,
    pub extracted_records: usize,
}

/// Dedup + validation over an in-memory batch. No I/O.
pub fn process_batch(dedup: &DedupEngine, validator: &ValidationEngine, agreements: &[Agreement]) -> Result<ProcessedBatch> {
    let merged = dedup.deduplicate(agreements).context("merging duplicate clusters")?;
    let finals = merged.iter().map(|m| m.agreement.clone()).collect::<Vec<_>>();
    let outcomes = validator.validate_batch(&finals);
    let report = validator.qa_report_from_pairs(finals.iter().zip(outcomes.iter()));
    let rows = merged
        .into_iter()
        .zip(outcomes)
        .map(|(m, outcome)| {
            let merged_from = m.merged_from();
            HarvestedAgreement::new(m.agreement, merged_from, m.confidence, outcome)
        })
        .collect();
    Ok(ProcessedBatch {
        rows,
        report,
        extracted_records: agreements.len(),
    })
}

pub struct HarvestPipeline {
    config: HarvestConfig,
    store: RunOutputStore,
    dedup: DedupEngine,
    rules: ValidationRules,
}

impl HarvestPipeline {
    pub fn new(config: HarvestConfig, dedup_config: DedupConfig, rules: ValidationRules) -> Result<Self> {
        dedup_config.validate()?;
        rules.validate()?;
        let store = RunOutputStore::new(config.reports_root());
        Ok(Self {
            config,
            store,
            dedup: DedupEngine::new(dedup_config),
            rules,
        })
    }

    /// Load `rules/dedup.yaml` and `rules/validation.yaml` from the workspace root.
    pub fn from_workspace(config: HarvestConfig) -> Result<Self> {
        let rules_dir = config.rules_dir();
        let dedup_config = load_dedup_config(rules_dir.join("dedup.yaml"))?;
        let rules = load_validation_rules(rules_dir.join("validation.yaml"))?;
        Self::new(config, dedup_config, rules)
    }

    pub async fn run_once(&self) -> Result<HarvestRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let harvest_date = self.config.harvest_date.unwrap_or_else(|| started_at.date_naive());
        let registry = self.load_source_registry().await?;
        let enabled_sources = registry
            .sources
            .into_iter()
            .filter(|s| s.enabled)
            .filter(|s| {
                self.config
                    .country_code
                    .as_deref()
                    .map_or(true, |cc| s.country_code.eq_ignore_ascii_case(cc))
            })
            .collect::<Vec<_>>();
        info!(%run_id, sources = enabled_sources.len(), %harvest_date, "harvest run started");

        let mut extracted = Vec::new();
        let mut failed_sources = Vec::new();
        for source in &enabled_sources {
            match self.extract_source(source) {
                Ok(agreements) => {
                    info!(%run_id, source_id = %source.source_id, records = agreements.len(), "source extracted");
                    extracted.extend(agreements);
                }
                Err(err) => {
                    warn!(%run_id, source_id = %source.source_id, error = %format!("{err:#}"), "source skipped");
                    failed_sources.push(source.source_id.clone());
                }
            }
        }

        let validator = ValidationEngine::new(&self.rules, harvest_date)?;
        let batch = process_batch(&self.dedup, &validator, &extracted)?;
        info!(
            %run_id,
            extracted = batch.extracted_records,
            merged = batch.rows.len(),
            valid_ratio = batch.report.valid_ratio(),
            "dedup and validation complete"
        );

        let run_dir = PathBuf::from(run_id.to_string());
        self.store
            .write_ndjson(run_dir.join("agreements.ndjson"), &batch.rows)
            .await?;
        self.store
            .write_json_pretty(run_dir.join("qa_report.json"), &batch.report)
            .await?;
        let manifest = self.export_parquet_snapshots(&run_dir, &batch.rows).await?;

        let summary = HarvestRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            harvest_date,
            country_code: self.config.country_code.clone(),
            enabled_sources: enabled_sources.len(),
            failed_sources,
            extracted_records: batch.extracted_records,
            merged_records: batch.rows.len(),
            valid_records: batch.report.valid_records,
            valid_ratio: batch.report.valid_ratio(),
            reports_dir: self.store.root().join(&run_dir).display().to_string(),
            parquet_manifest: manifest.absolute_path.display().to_string(),
        };
        self.store
            .write_json_pretty(run_dir.join("run.json"), &summary)
            .await?;
        Ok(summary)
    }

    pub async fn maybe_build_scheduler(self: &Arc<Self>) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }

        let sched = JobScheduler::new().await.context("creating scheduler")?;
        for cron in &self.config.harvest_crons {
            let pipeline = Arc::clone(self);
            let job = Job::new_async(cron, move |_uuid, _l| {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move {
                    match pipeline.run_once().await {
                        Ok(summary) => info!(run_id = %summary.run_id, valid_ratio = summary.valid_ratio, "scheduled harvest complete"),
                        Err(err) => warn!(error = %format!("{err:#}"), "scheduled harvest failed"),
                    }
                })
            })
            .with_context(|| format!("creating scheduler job for cron {cron}"))?;
            sched.add(job).await.context("adding scheduler job")?;
        }
        Ok(Some(sched))
    }

    fn extract_source(&self, source: &SourceConfig) -> Result<Vec<Agreement>> {
        let bundle = load_extraction_bundle(self.bundle_path_for(source))?;
        let adapter = adapter_for_source(&source.source_id, source.source_kind);
        Ok(adapter.parse_bundle(&bundle)?)
    }

    async fn load_source_registry(&self) -> Result<SourceRegistry> {
        let path = self.config.workspace_root.join("sources.yaml");
        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    fn bundle_path_for(&self, source: &SourceConfig) -> PathBuf {
        match source.mode {
            SourceMode::Manual => self
                .config
                .workspace_root
                .join("manual")
                .join(&source.source_id)
                .join("sample.json"),
            SourceMode::Fixture => self
                .config
                .workspace_root
                .join("fixtures")
                .join(&source.source_id)
                .join("sample")
                .join("bundle.json"),
        }
    }

    async fn export_parquet_snapshots(&self, run_dir: &Path, rows: &[HarvestedAgreement]) -> Result<StoredOutput> {
        let snapshot_dir = run_dir.join("snapshots");
        let agreements = self
            .store
            .write_bytes(snapshot_dir.join("agreements.parquet"), &agreements_parquet(rows)?)
            .await?;
        let sources = self
            .store
            .write_bytes(snapshot_dir.join("sources.parquet"), &sources_parquet(rows)?)
            .await?;
        let findings = self
            .store
            .write_bytes(snapshot_dir.join("validation.parquet"), &validation_parquet(rows)?)
            .await?;

        let manifest = ParquetManifest {
            schema_version: 1,
            files: vec![
                manifest_entry("agreements", run_dir, &agreements),
                manifest_entry("sources", run_dir, &sources),
                manifest_entry("validation", run_dir, &findings),
            ],
        };
        self.store
            .write_json_pretty(snapshot_dir.join("manifest.json"), &manifest)
            .await
    }
}

pub async fn run_harvest_once_from_env() -> Result<HarvestRunSummary> {
    let pipeline = HarvestPipeline::from_workspace(HarvestConfig::from_env()?)?;
    pipeline.run_once().await
}

/// Markdown listing of the most recent runs under the reports directory.
pub fn report_recent_runs(runs: usize, reports_root: &Path) -> Result<String> {
    let mut dirs = std::fs::read_dir(reports_root)
        .with_context(|| format!("reading {}", reports_root.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().join("run.json").exists())
        .map(|entry| {
            let path = entry.path().join("run.json");
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
            let summary: HarvestRunSummary =
                serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            Ok(summary)
        })
        .collect::<Result<Vec<_>>>()?;
    dirs.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    let mut lines = vec!["# Accord Harvest Runs".to_string(), String::new()];
    for summary in dirs.into_iter().take(runs.max(1)) {
        lines.push(format!("## Run `{}`", summary.run_id));
        lines.push(format!("- started: {}", summary.started_at));
        lines.push(format!(
            "- country: {}",
            summary.country_code.as_deref().unwrap_or("all")
        ));
        lines.push(format!(
            "- records: {} extracted, {} after dedup, {} valid",
            summary.extracted_records, summary.merged_records, summary.valid_records
        ));
        lines.push(format!("- valid ratio: {:.3}", summary.valid_ratio));
        if !summary.failed_sources.is_empty() {
            lines.push(format!("- failed sources: {}", summary.failed_sources.join(", ")));
        }
        lines.push(format!("- outputs: `{}`", summary.reports_dir));
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

fn write_parquet(batch: RecordBatch) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), None).context("opening parquet writer")?;
    writer.write(&batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(buf)
}

fn agreements_parquet(rows: &[HarvestedAgreement]) -> Result<Vec<u8>> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("id", DataType::Utf8, false),
        ArrowField::new("country_code", DataType::Utf8, false),
        ArrowField::new("title_native", DataType::Utf8, true),
        ArrowField::new("title_en", DataType::Utf8, true),
        ArrowField::new("type", DataType::Utf8, false),
        ArrowField::new("status", DataType::Utf8, false),
        ArrowField::new("date_signed", DataType::Utf8, true),
        ArrowField::new("jurisdiction_level", DataType::Utf8, false),
        ArrowField::new("source_count", DataType::UInt32, false),
        ArrowField::new("merged_from", DataType::UInt32, false),
        ArrowField::new("dedup_confidence", DataType::Float64, true),
        ArrowField::new("is_valid", DataType::Boolean, false),
    ]));

    let ids = StringArray::from(rows.iter().map(|r| Some(r.id.to_string())).collect::<Vec<_>>());
    let countries = StringArray::from(
        rows.iter()
            .map(|r| Some(r.agreement.country_code.as_str()))
            .collect::<Vec<_>>(),
    );
    let natives = StringArray::from(
        rows.iter()
            .map(|r| r.agreement.title_native.as_deref())
            .collect::<Vec<_>>(),
    );
    let englishes = StringArray::from(rows.iter().map(|r| r.agreement.title_en.as_deref()).collect::<Vec<_>>());
    let types = StringArray::from(
        rows.iter()
            .map(|r| Some(r.agreement.agreement_type.as_str()))
            .collect::<Vec<_>>(),
    );
    let statuses = StringArray::from(
        rows.iter()
            .map(|r| Some(r.agreement.status.as_str()))
            .collect::<Vec<_>>(),
    );
    let dates = StringArray::from(
        rows.iter()
            .map(|r| r.agreement.date_signed.map(|d| d.to_string()))
            .collect::<Vec<_>>(),
    );
    let jurisdictions = StringArray::from(
        rows.iter()
            .map(|r| Some(r.agreement.jurisdiction_level.as_str()))
            .collect::<Vec<_>>(),
    );
    let source_counts = UInt32Array::from(
        rows.iter()
            .map(|r| r.agreement.sources.len() as u32)
            .collect::<Vec<_>>(),
    );
    let merged_from = UInt32Array::from(rows.iter().map(|r| r.merged_from as u32).collect::<Vec<_>>());
    let confidences = Float64Array::from(rows.iter().map(|r| r.dedup_confidence).collect::<Vec<_>>());
    let valid = BooleanArray::from(rows.iter().map(|r| r.is_valid).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(countries),
            Arc::new(natives),
            Arc::new(englishes),
            Arc::new(types),
            Arc::new(statuses),
            Arc::new(dates),
            Arc::new(jurisdictions),
            Arc::new(source_counts),
            Arc::new(merged_from),
            Arc::new(confidences),
            Arc::new(valid),
        ],
    )
    .context("building agreements record batch")?;
    write_parquet(batch)
}

fn sources_parquet(rows: &[HarvestedAgreement]) -> Result<Vec<u8>> {
    let flat = rows
        .iter()
        .flat_map(|r| {
            r.agreement
                .sources
                .iter()
                .enumerate()
                .map(move |(pos, source)| (r.id.to_string(), pos as u32, source.as_str()))
        })
        .collect::<Vec<_>>();

    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("agreement_id", DataType::Utf8, false),
        ArrowField::new("position", DataType::UInt32, false),
        ArrowField::new("source", DataType::Utf8, false),
    ]));
    let ids = StringArray::from(flat.iter().map(|(id, _, _)| Some(id.as_str())).collect::<Vec<_>>());
    let positions = UInt32Array::from(flat.iter().map(|(_, pos, _)| *pos).collect::<Vec<_>>());
    let sources = StringArray::from(flat.iter().map(|(_, _, s)| Some(*s)).collect::<Vec<_>>());
    let batch = RecordBatch::try_new(schema, vec![Arc::new(ids), Arc::new(positions), Arc::new(sources)])
        .context("building sources record batch")?;
    write_parquet(batch)
}

fn validation_parquet(rows: &[HarvestedAgreement]) -> Result<Vec<u8>> {
    let flat = rows
        .iter()
        .flat_map(|r| {
            let issues = r.validation_issues.iter().map(move |m| (r.id.to_string(), "issue", m.as_str()));
            let warnings = r
                .validation_warnings
                .iter()
                .map(move |m| (r.id.to_string(), "warning", m.as_str()));
            issues.chain(warnings)
        })
        .collect::<Vec<_>>();

    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("agreement_id", DataType::Utf8, false),
        ArrowField::new("severity", DataType::Utf8, false),
        ArrowField::new("message", DataType::Utf8, false),
    ]));
    let ids = StringArray::from(flat.iter().map(|(id, _, _)| Some(id.as_str())).collect::<Vec<_>>());
    let severities = StringArray::from(flat.iter().map(|(_, sev, _)| Some(*sev)).collect::<Vec<_>>());
    let messages = StringArray::from(flat.iter().map(|(_, _, m)| Some(*m)).collect::<Vec<_>>());
    let batch = RecordBatch::try_new(schema, vec![Arc::new(ids), Arc::new(severities), Arc::new(messages)])
        .context("building validation record batch")?;
    write_parquet(batch)
}

fn manifest_entry(name: &str, run_dir: &Path, stored: &StoredOutput) -> ParquetManifestFile {
    let rel = stored
        .relative_path
        .strip_prefix(run_dir)
        .unwrap_or(&stored.relative_path)
        .display()
        .to_string();
    ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        sha256: stored.content_hash.clone(),
        bytes: stored.byte_size as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn workspace_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root")
    }

    fn test_config(reports: &Path) -> HarvestConfig {
        HarvestConfig {
            workspace_root: workspace_root(),
            reports_dir: reports.to_path_buf(),
            country_code: Some("HU".into()),
            harvest_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fixture_harvest_dedups_validates_and_persists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = HarvestPipeline::from_workspace(test_config(dir.path())).expect("pipeline");
        let summary = pipeline.run_once().await.expect("harvest");

        assert_eq!(summary.enabled_sources, 3);
        assert!(summary.failed_sources.is_empty());
        assert_eq!(summary.extracted_records, 10);
        // 2019 MOU (registry + news) and the double-taxation convention (registry + parliament) collapse.
        // The trade and health memoranda share boilerplate but stay apart.
        assert_eq!(summary.merged_records, 8);
        assert_eq!(summary.valid_records, 6);

        let run_dir = dir.path().join(summary.run_id.to_string());
        let ndjson = std::fs::read_to_string(run_dir.join("agreements.ndjson")).unwrap();
        assert!(ndjson.contains("Egyetértési megállapodás a gazdasági együttműködésről"));
        let rows: Vec<HarvestedAgreement> = accord_storage::decode_ndjson(&ndjson).unwrap();
        assert_eq!(rows.len(), 8);

        let mou = &rows[0];
        assert_eq!(mou.merged_from, 2);
        assert_eq!(mou.agreement.date_signed, NaiveDate::from_ymd_opt(2019, 4, 23));
        assert_eq!(
            mou.agreement.sources,
            vec![
                "https://registry.example.gov/treaties/hu/2019-017".to_string(),
                "https://news.example.hu/2019/04/24/megallapodas".to_string(),
            ]
        );

        let convention = rows
            .iter()
            .find(|r| r.agreement.agreement_type.as_str() == "convention")
            .unwrap();
        assert_eq!(convention.merged_from, 2);
        assert_eq!(convention.agreement.sources.len(), 2);

        for topic in ["Trade", "Health"] {
            let title = format!("Memorandum of Understanding on {topic}");
            let memo = rows
                .iter()
                .filter(|r| r.agreement.title_en.as_deref() == Some(title.as_str()))
                .collect::<Vec<_>>();
            assert_eq!(memo.len(), 1, "{title}");
            assert_eq!(memo[0].merged_from, 1);
            assert_eq!(memo[0].agreement.sources.len(), 1);
        }

        let ids = rows.iter().map(|r| r.id).collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), rows.len());

        let report: QaReport =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("qa_report.json")).unwrap()).unwrap();
        assert_eq!(report.total_records, 8);
        assert_eq!(report.type_distribution.get("MOU"), Some(&5));
        assert!(run_dir.join("snapshots/agreements.parquet").exists());
        assert!(run_dir.join("snapshots/manifest.json").exists());
        assert!(run_dir.join("run.json").exists());

        let listing = report_recent_runs(5, dir.path()).unwrap();
        assert!(listing.contains(&summary.run_id.to_string()));
    }

    #[tokio::test]
    async fn missing_bundle_is_skipped_not_fatal() {
        let workspace = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(workspace.path().join("rules")).unwrap();
        for file in ["rules/dedup.yaml", "rules/validation.yaml"] {
            std::fs::copy(workspace_root().join(file), workspace.path().join(file)).unwrap();
        }
        let registry_bundle = workspace.path().join("fixtures/mfa-treaty-registry/sample");
        std::fs::create_dir_all(&registry_bundle).unwrap();
        std::fs::copy(
            workspace_root().join("fixtures/mfa-treaty-registry/sample/bundle.json"),
            registry_bundle.join("bundle.json"),
        )
        .unwrap();
        std::fs::write(
            workspace.path().join("sources.yaml"),
            "sources:\n  - source_id: mfa-treaty-registry\n    display_name: Registry\n    enabled: true\n    source_kind: GovernmentRegistry\n    country_code: HU\n    mode: fixture\n  - source_id: gone\n    display_name: Missing\n    enabled: true\n    source_kind: News\n    country_code: HU\n    mode: fixture\n",
        )
        .unwrap();

        let config = HarvestConfig {
            workspace_root: workspace.path().to_path_buf(),
            harvest_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            ..Default::default()
        };
        let summary = HarvestPipeline::from_workspace(config)
            .unwrap()
            .run_once()
            .await
            .unwrap();
        assert_eq!(summary.failed_sources, vec!["gone".to_string()]);
        assert_eq!(summary.merged_records, 4);
        assert_eq!(summary.valid_ratio, 1.0);
    }

    #[test]
    fn process_batch_on_empty_input_reports_zero_ratio() {
        let validator = ValidationEngine::new(
            &ValidationRules {
                types: vec!["MOU".into()],
                statuses: vec!["signed".into()],
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
        .unwrap();
        let batch = process_batch(&DedupEngine::new(DedupConfig::default()), &validator, &[]).unwrap();
        assert!(batch.rows.is_empty());
        assert_eq!(batch.report.valid_ratio(), 0.0);
    }

    #[tokio::test]
    async fn scheduler_is_not_built_when_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pipeline = Arc::new(HarvestPipeline::from_workspace(test_config(dir.path())).unwrap());
        assert!(pipeline.maybe_build_scheduler().await.unwrap().is_none());
    }
}
