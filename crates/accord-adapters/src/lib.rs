//! Source adapter contracts + fixture-first record extraction.

use std::fs;
use std::path::Path;

use accord_core::{Agreement, AgreementStatus, AgreementType};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const CRATE_NAME: &str = "accord-adapters";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%d/%m/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    GovernmentRegistry,
    TreatyDatabase,
    SearchEngine,
    News,
    Academic,
    ManualOnly,
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{0}")]
    Message(String),
    #[error("bundle source_id={found} does not match adapter source_id={expected}")]
    SourceMismatch { expected: String, found: String },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> &str;
    fn source_kind(&self) -> SourceKind;

    fn parse_bundle(&self, bundle: &ExtractionBundle) -> Result<Vec<Agreement>, AdapterError>;
}

/// Pre-extracted output of one source crawl for one country.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionBundle {
    pub bundle_id: String,
    pub source_id: String,
    pub country_code: String,
    pub source_kind: SourceKind,
    pub captured_from_url: String,
    pub fetched_at: DateTime<Utc>,
    pub extractor_version: String,
    #[serde(default)]
    pub records: Vec<ExtractedRecord>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(default)]
    pub title_native: Option<String>,
    #[serde(default)]
    pub title_en: Option<String>,
    #[serde(default, rename = "type")]
    pub agreement_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Raw date text as found in the source document.
    #[serde(default)]
    pub date_signed: Option<String>,
    #[serde(default)]
    pub jurisdiction_level: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

pub fn load_extraction_bundle(path: impl AsRef<Path>) -> Result<ExtractionBundle> {
    read_json_file(path)
}

fn read_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

/// Parse the date formats seen across ministry registers and news sources.
/// Unrecognized text yields `None` rather than an error.
pub fn parse_signed_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim().trim_end_matches('.').trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn text_or_none(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn clean_sources(sources: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(sources.len());
    for source in sources {
        let source = source.trim();
        if !source.is_empty() && !out.iter().any(|s| s == source) {
            out.push(source.to_string());
        }
    }
    out
}

fn record_to_agreement(record: &ExtractedRecord, bundle: &ExtractionBundle, sources: Vec<String>) -> Agreement {
    let date_signed = record.date_signed.as_deref().and_then(|raw| {
        let parsed = parse_signed_date(raw);
        if parsed.is_none() {
            debug!(source_id = %bundle.source_id, raw, "unparseable date_signed dropped");
        }
        parsed
    });
    let country_code = text_or_none(record.country_code.as_deref())
        .unwrap_or_else(|| bundle.country_code.trim().to_string())
        .to_ascii_uppercase();

    Agreement {
        title_native: text_or_none(record.title_native.as_deref()),
        title_en: text_or_none(record.title_en.as_deref()),
        agreement_type: AgreementType::new(text_or_none(record.agreement_type.as_deref()).unwrap_or_default()),
        status: AgreementStatus::new(text_or_none(record.status.as_deref()).unwrap_or_default()),
        date_signed,
        jurisdiction_level: text_or_none(record.jurisdiction_level.as_deref()).unwrap_or_default(),
        sources,
        country_code,
    }
}

fn check_source(expected: &str, bundle: &ExtractionBundle) -> Result<(), AdapterError> {
    if bundle.source_id != expected {
        return Err(AdapterError::SourceMismatch {
            expected: expected.to_string(),
            found: bundle.source_id.clone(),
        });
    }
    Ok(())
}

/// Machine-extracted bundles: records without their own citations are attributed to the capture URL.
#[derive(Debug, Clone)]
struct BundleAgreementAdapter {
    source_id: String,
    source_kind: SourceKind,
}

/// Hand-curated bundles: every record must cite its own sources.
#[derive(Debug, Clone)]
struct ManualEntryAdapter {
    source_id: String,
}

impl SourceAdapter for BundleAgreementAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    fn parse_bundle(&self, bundle: &ExtractionBundle) -> Result<Vec<Agreement>, AdapterError> {
        check_source(&self.source_id, bundle)?;
        let fallback = text_or_none(Some(&bundle.captured_from_url)).ok_or_else(|| {
            AdapterError::Message(format!("bundle {} has no captured_from_url", bundle.bundle_id))
        })?;
        Ok(bundle
            .records
            .iter()
            .map(|record| {
                let mut sources = clean_sources(&record.sources);
                if sources.is_empty() {
                    sources.push(fallback.clone());
                }
                record_to_agreement(record, bundle, sources)
            })
            .collect())
    }
}

impl SourceAdapter for ManualEntryAdapter {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn source_kind(&self) -> SourceKind {
        SourceKind::ManualOnly
    }

    fn parse_bundle(&self, bundle: &ExtractionBundle) -> Result<Vec<Agreement>, AdapterError> {
        check_source(&self.source_id, bundle)?;
        let mut out = Vec::with_capacity(bundle.records.len());
        for (idx, record) in bundle.records.iter().enumerate() {
            let sources = clean_sources(&record.sources);
            if sources.is_empty() {
                debug!(source_id = %self.source_id, record = idx, "manual record without sources skipped");
                continue;
            }
            out.push(record_to_agreement(record, bundle, sources));
        }
        Ok(out)
    }
}

pub fn adapter_for_source(source_id: &str, source_kind: SourceKind) -> Box<dyn SourceAdapter> {
    match source_kind {
        SourceKind::ManualOnly => Box::new(ManualEntryAdapter {
            source_id: source_id.to_string(),
        }),
        kind => Box::new(BundleAgreementAdapter {
            source_id: source_id.to_string(),
            source_kind: kind,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bundle(source_id: &str, kind: SourceKind, records: Vec<ExtractedRecord>) -> ExtractionBundle {
        ExtractionBundle {
            bundle_id: format!("{source_id}-test"),
            source_id: source_id.to_string(),
            country_code: "hu".into(),
            source_kind: kind,
            captured_from_url: "https://registry.example.gov/treaties?country=HU".into(),
            fetched_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).single().unwrap(),
            extractor_version: "test".into(),
            records,
            notes: None,
        }
    }

    fn record(title: &str, sources: &[&str]) -> ExtractedRecord {
        ExtractedRecord {
            title_native: Some(title.to_string()),
            agreement_type: Some("MOU".into()),
            status: Some("signed".into()),
            date_signed: Some("2019.04.23.".into()),
            jurisdiction_level: Some("national".into()),
            sources: sources.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_common_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2019, 4, 23);
        for raw in [
            "2019-04-23",
            "2019.04.23.",
            "23.04.2019",
            "23/04/2019",
            "April 23, 2019",
            "Apr 23, 2019",
            "23 April 2019",
            "2019-04-23T10:00:00+02:00",
        ] {
            assert_eq!(parse_signed_date(raw), expected, "format {raw}");
        }
        assert_eq!(parse_signed_date("spring 2019"), None);
        assert_eq!(parse_signed_date("  "), None);
    }

    #[test]
    fn bundle_adapter_falls_back_to_capture_url() {
        let adapter = adapter_for_source("mfa-registry", SourceKind::GovernmentRegistry);
        let b = bundle(
            "mfa-registry",
            SourceKind::GovernmentRegistry,
            vec![record("Egyetértési megállapodás", &[]), record("Jegyzőkönyv", &[" https://a ", "https://a", ""])],
        );
        let agreements = adapter.parse_bundle(&b).unwrap();
        assert_eq!(agreements.len(), 2);
        assert_eq!(agreements[0].sources, vec![b.captured_from_url.clone()]);
        assert_eq!(agreements[1].sources, vec!["https://a".to_string()]);
        assert_eq!(agreements[0].country_code, "HU");
        assert_eq!(agreements[0].date_signed, NaiveDate::from_ymd_opt(2019, 4, 23));
    }

    #[test]
    fn manual_adapter_drops_uncited_records() {
        let adapter = adapter_for_source("parliament-register", SourceKind::ManualOnly);
        let b = bundle(
            "parliament-register",
            SourceKind::ManualOnly,
            vec![record("Cited", &["Act LXII of 2019"]), record("Uncited", &[])],
        );
        let agreements = adapter.parse_bundle(&b).unwrap();
        assert_eq!(agreements.len(), 1);
        assert_eq!(agreements[0].title_native.as_deref(), Some("Cited"));
        assert_eq!(adapter.source_kind(), SourceKind::ManualOnly);
    }

    #[test]
    fn mismatched_bundle_is_rejected() {
        let adapter = adapter_for_source("mfa-registry", SourceKind::GovernmentRegistry);
        let b = bundle("news-search", SourceKind::SearchEngine, vec![]);
        let err = adapter.parse_bundle(&b).unwrap_err();
        assert!(matches!(err, AdapterError::SourceMismatch { .. }));
    }

    #[test]
    fn malformed_bundle_file_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bundle.json");
        fs::write(&path, "{\"bundle_id\": ").unwrap();
        let err = load_extraction_bundle(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bundle.json"));
    }

    #[test]
    fn blank_fields_become_absent() {
        let adapter = adapter_for_source("news-search", SourceKind::SearchEngine);
        let b = bundle(
            "news-search",
            SourceKind::SearchEngine,
            vec![ExtractedRecord {
                title_native: Some("   ".into()),
                title_en: Some(" Protocol on Culture ".into()),
                date_signed: Some("unknown".into()),
                ..Default::default()
            }],
        );
        let agreements = adapter.parse_bundle(&b).unwrap();
        let a = &agreements[0];
        assert_eq!(a.title_native, None);
        assert_eq!(a.title_en.as_deref(), Some("Protocol on Culture"));
        assert_eq!(a.date_signed, None);
        assert!(a.agreement_type.is_blank());
    }
}
