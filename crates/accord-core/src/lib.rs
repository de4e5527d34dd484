//! Core domain model for Accord harvest runs.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const CRATE_NAME: &str = "accord-core";

pub const KPI_VALID_RATIO: &str = "valid_ratio";
pub const KPI_DATE_COVERAGE: &str = "date_coverage";
pub const KPI_TITLE_NATIVE_COVERAGE: &str = "title_native_coverage";
pub const KPI_TITLE_EN_COVERAGE: &str = "title_en_coverage";
pub const KPI_MULTI_SOURCE_RATIO: &str = "multi_source_ratio";

/// Contract violations raised by the dedup/validation core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

macro_rules! categorical {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }

            /// Lookup form used against configured vocabularies.
            pub fn vocabulary_key(&self) -> String {
                self.0.trim().to_lowercase()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

categorical!(
    /// Agreement category (MOU, treaty, protocol, ...). Allowed values come from configuration.
    AgreementType
);

categorical!(
    /// Agreement lifecycle status (signed, draft, expired, ...). Allowed values come from configuration.
    AgreementStatus
);

/// A single bilateral agreement record discovered from one or more source documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agreement {
    pub title_native: Option<String>,
    pub title_en: Option<String>,
    #[serde(rename = "type")]
    pub agreement_type: AgreementType,
    pub status: AgreementStatus,
    pub date_signed: Option<NaiveDate>,
    pub jurisdiction_level: String,
    pub sources: Vec<String>,
    pub country_code: String,
}

impl Agreement {
    /// Best available display title: native first, English as fallback. Blank titles count as absent.
    pub fn best_title(&self) -> Option<&str> {
        non_blank(self.title_native.as_deref()).or_else(|| non_blank(self.title_en.as_deref()))
    }

    pub fn has_title(&self) -> bool {
        self.best_title().is_some()
    }

    /// Normalized key used for similarity comparison. `None` when the record has no usable title.
    pub fn comparison_key(&self) -> Option<String> {
        self.best_title().map(normalize_title)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Lower-case, trim and collapse internal whitespace runs to single spaces.
pub fn normalize_title(input: &str) -> String {
    input
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic post-dedup identifier for a merged agreement.
pub fn agreement_id(agreement: &Agreement) -> Uuid {
    let key = agreement.comparison_key().unwrap_or_default();
    let date = agreement
        .date_signed
        .map(|d| d.to_string())
        .unwrap_or_default();
    let first_source = agreement.sources.first().map(String::as_str).unwrap_or("");
    let name = format!(
        "{}|{}|{}|{}",
        agreement.country_code.trim().to_ascii_uppercase(),
        key,
        date,
        first_source
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

/// Ephemeral group of records believed to describe the same agreement.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateCluster<'a> {
    members: Vec<(usize, &'a Agreement)>,
    confidence: Option<f64>,
}

impl<'a> DuplicateCluster<'a> {
    /// Members are `(input index, record)` pairs in cluster order.
    pub fn new(members: Vec<(usize, &'a Agreement)>, confidence: Option<f64>) -> Self {
        Self {
            members,
            confidence,
        }
    }

    /// Treat every record of `agreements` as one cluster, indexed by position.
    pub fn from_agreements(agreements: &'a [Agreement]) -> Self {
        Self::new(agreements.iter().enumerate().collect(), None)
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.members.iter().map(|(idx, _)| *idx)
    }

    pub fn members(&self) -> impl Iterator<Item = &'a Agreement> + '_ {
        self.members.iter().map(|(_, agreement)| *agreement)
    }

    pub fn first_index(&self) -> Option<usize> {
        self.members.first().map(|(idx, _)| *idx)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Weakest accepted pairwise score that joined this cluster; `None` for singletons.
    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }
}

/// Per-record validation result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub issues: Vec<String>,
    /// Advisory findings; never affect `is_valid`.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn from_findings(issues: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: issues.is_empty(),
            issues,
            warnings,
        }
    }
}

/// Aggregate statistics over one harvest batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub type_distribution: BTreeMap<String, usize>,
    pub status_distribution: BTreeMap<String, usize>,
    pub jurisdiction_distribution: BTreeMap<String, usize>,
    pub issue_distribution: BTreeMap<String, usize>,
    pub kpis: BTreeMap<String, f64>,
}

impl QaReport {
    pub fn kpi(&self, name: &str) -> f64 {
        self.kpis.get(name).copied().unwrap_or(0.0)
    }

    pub fn valid_ratio(&self) -> f64 {
        self.kpi(KPI_VALID_RATIO)
    }
}

/// Final persisted row: merged agreement + id + dedup/validation annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedAgreement {
    pub id: Uuid,
    #[serde(flatten)]
    pub agreement: Agreement,
    pub merged_from: usize,
    pub dedup_confidence: Option<f64>,
    pub is_valid: bool,
    pub validation_issues: Vec<String>,
    #[serde(default)]
    pub validation_warnings: Vec<String>,
}

impl HarvestedAgreement {
    pub fn new(agreement: Agreement, merged_from: usize, dedup_confidence: Option<f64>, outcome: ValidationOutcome) -> Self {
        Self {
            id: agreement_id(&agreement),
            agreement,
            merged_from,
            dedup_confidence,
            is_valid: outcome.is_valid,
            validation_issues: outcome.issues,
            validation_warnings: outcome.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk(title_native: Option<&str>, title_en: Option<&str>) -> Agreement {
        Agreement {
            title_native: title_native.map(ToString::to_string),
            title_en: title_en.map(ToString::to_string),
            agreement_type: "MOU".into(),
            status: "signed".into(),
            date_signed: NaiveDate::from_ymd_opt(2019, 4, 23),
            jurisdiction_level: "national".into(),
            sources: vec!["https://example.org/a".into()],
            country_code: "HU".into(),
        }
    }

    #[test]
    fn comparison_key_prefers_native_and_collapses_whitespace() {
        let a = mk(Some("  Memorandum   of\tUnderstanding "), Some("ignored"));
        assert_eq!(a.comparison_key().as_deref(), Some("memorandum of understanding"));

        let b = mk(Some("   "), Some("Protocol On Trade"));
        assert_eq!(b.comparison_key().as_deref(), Some("protocol on trade"));

        let c = mk(Some(""), None);
        assert_eq!(c.comparison_key(), None);
        assert!(!c.has_title());
    }

    #[test]
    fn comparison_key_lowercases_non_ascii() {
        let a = mk(Some("Egyetértési MEGÁLLAPODÁS"), None);
        assert_eq!(a.comparison_key().as_deref(), Some("egyetértési megállapodás"));
    }

    #[test]
    fn serializes_with_snake_case_field_names() {
        let value = serde_json::to_value(mk(Some("Megállapodás"), None)).unwrap();
        assert_eq!(value["type"], "MOU");
        assert_eq!(value["date_signed"], "2019-04-23");
        assert_eq!(value["title_native"], "Megállapodás");
        assert_eq!(value["country_code"], "HU");
        assert!(value.get("agreement_type").is_none());
    }

    #[test]
    fn agreement_id_is_deterministic() {
        let a = mk(Some("Treaty of Friendship"), None);
        let b = mk(Some("treaty   of friendship"), None);
        assert_eq!(agreement_id(&a), agreement_id(&a.clone()));
        assert_eq!(agreement_id(&a), agreement_id(&b));
        let mut c = a.clone();
        c.date_signed = NaiveDate::from_ymd_opt(2001, 1, 1);
        assert_ne!(agreement_id(&a), agreement_id(&c));
    }

    #[test]
    fn harvested_row_flattens_agreement_fields() {
        let row = HarvestedAgreement::new(
            mk(Some("Jegyzőkönyv"), None),
            2,
            Some(0.97),
            ValidationOutcome::from_findings(vec![], vec![]),
        );
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["title_native"], "Jegyzőkönyv");
        assert_eq!(value["merged_from"], 2);
        assert_eq!(value["is_valid"], true);
        let back: HarvestedAgreement = serde_json::from_value(value).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn empty_qa_report_reads_zero_ratio() {
        assert_eq!(QaReport::default().valid_ratio(), 0.0);
    }
}
