//! Rule-based validation of merged agreements + batch QA aggregation.

use std::collections::BTreeMap;
use std::thread;

use accord_core::{
    Agreement, QaReport, ValidationOutcome, KPI_DATE_COVERAGE, KPI_MULTI_SOURCE_RATIO,
    KPI_TITLE_EN_COVERAGE, KPI_TITLE_NATIVE_COVERAGE, KPI_VALID_RATIO,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::resolve_workers;

/// Allowed categorical values, loaded from `rules/validation.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub statuses: Vec<String>,
    /// Batch validation threads. 0 = one per available CPU.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            statuses: Vec::new(),
            workers: default_workers(),
        }
    }
}

impl ValidationRules {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.types.iter().all(|t| t.trim().is_empty()) {
            return Err(ConfigError::EmptyVocabulary("type"));
        }
        if self.statuses.iter().all(|s| s.trim().is_empty()) {
            return Err(ConfigError::EmptyVocabulary("status"));
        }
        Ok(())
    }
}

/// Lookup key -> configured spelling. The first spelling listed wins.
fn vocabulary(values: &[String]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() {
            out.entry(value.to_lowercase()).or_insert_with(|| value.to_string());
        }
    }
    out
}

/// Report bucket for a categorical value: the configured spelling when recognized, else the trimmed raw text.
fn bucket(vocabulary: &BTreeMap<String, String>, raw: &str) -> String {
    vocabulary
        .get(&raw.trim().to_lowercase())
        .cloned()
        .unwrap_or_else(|| raw.trim().to_string())
}

pub struct ValidationEngine {
    allowed_types: BTreeMap<String, String>,
    allowed_statuses: BTreeMap<String, String>,
    harvest_date: NaiveDate,
    workers: usize,
}

impl ValidationEngine {
    pub fn new(rules: &ValidationRules, harvest_date: NaiveDate) -> Result<Self, ConfigError> {
        rules.validate()?;
        Ok(Self {
            allowed_types: vocabulary(&rules.types),
            allowed_statuses: vocabulary(&rules.statuses),
            harvest_date,
            workers: rules.workers,
        })
    }

    /// 0 = one worker per available CPU.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn harvest_date(&self) -> NaiveDate {
        self.harvest_date
    }

    /// Every rule is evaluated; the outcome lists all violations at once.
    pub fn validate(&self, agreement: &Agreement) -> ValidationOutcome {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if !agreement.has_title() {
            issues.push("missing title: title_native and title_en are both empty".to_string());
        }
        if agreement.sources.is_empty() {
            issues.push("no sources recorded".to_string());
        }
        if !self.allowed_types.contains_key(&agreement.agreement_type.vocabulary_key()) {
            issues.push(format!("unrecognized type '{}'", agreement.agreement_type));
        }
        if !self.allowed_statuses.contains_key(&agreement.status.vocabulary_key()) {
            issues.push(format!("unrecognized status '{}'", agreement.status));
        }
        match agreement.date_signed {
            Some(date) if date > self.harvest_date => {
                issues.push(format!(
                    "date_signed {date} is after harvest date {}",
                    self.harvest_date
                ));
            }
            Some(_) => {}
            None => warnings.push("date_signed missing".to_string()),
        }

        let code = agreement.country_code.trim();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            warnings.push(format!("country_code '{}' is not an ISO-2 code", agreement.country_code));
        }

        ValidationOutcome::from_findings(issues, warnings)
    }

    /// Validate a batch, preserving input order. Splits across a scoped worker pool when configured.
    pub fn validate_batch(&self, agreements: &[Agreement]) -> Vec<ValidationOutcome> {
        let workers = resolve_workers(self.workers).min(agreements.len().max(1));
        if workers <= 1 {
            return agreements.iter().map(|a| self.validate(a)).collect();
        }
        let chunk_size = agreements.len().div_ceil(workers);
        thread::scope(|scope| {
            let handles = agreements
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || chunk.iter().map(|a| self.validate(a)).collect::<Vec<_>>()))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    }

    pub fn generate_qa_report(&self, agreements: &[Agreement]) -> QaReport {
        let outcomes = self.validate_batch(agreements);
        self.qa_report_from_pairs(agreements.iter().zip(outcomes.iter()))
    }

    /// Aggregate already-computed outcomes. Empty input yields empty distributions and zero KPIs.
    /// Type and status buckets use the configured spelling, so "MOU" and " mou " count together.
    pub fn qa_report_from_pairs<'a>(
        &self,
        pairs: impl IntoIterator<Item = (&'a Agreement, &'a ValidationOutcome)>,
    ) -> QaReport {
        let mut report = QaReport::default();
        let (mut dated, mut native, mut english, mut multi_source) = (0usize, 0usize, 0usize, 0usize);

        for (agreement, outcome) in pairs {
            report.total_records += 1;
            if outcome.is_valid {
                report.valid_records += 1;
            }
            *report
                .type_distribution
                .entry(bucket(&self.allowed_types, agreement.agreement_type.as_str()))
                .or_default() += 1;
            *report
                .status_distribution
                .entry(bucket(&self.allowed_statuses, agreement.status.as_str()))
                .or_default() += 1;
            *report
                .jurisdiction_distribution
                .entry(agreement.jurisdiction_level.clone())
                .or_default() += 1;
            for issue in &outcome.issues {
                *report.issue_distribution.entry(issue.clone()).or_default() += 1;
            }

            dated += usize::from(agreement.date_signed.is_some());
            native += usize::from(agreement.title_native.as_deref().is_some_and(|t| !t.trim().is_empty()));
            english += usize::from(agreement.title_en.as_deref().is_some_and(|t| !t.trim().is_empty()));
            multi_source += usize::from(agreement.sources.len() > 1);
        }

        let total = report.total_records;
        report.kpis = BTreeMap::from([
            (KPI_VALID_RATIO.to_string(), ratio(report.valid_records, total)),
            (KPI_DATE_COVERAGE.to_string(), ratio(dated, total)),
            (KPI_TITLE_NATIVE_COVERAGE.to_string(), ratio(native, total)),
            (KPI_TITLE_EN_COVERAGE.to_string(), ratio(english, total)),
            (KPI_MULTI_SOURCE_RATIO.to_string(), ratio(multi_source, total)),
        ]);
        report
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
