//! Near-duplicate clustering and canonical merge of harvested agreements.

use std::collections::{BTreeSet, HashSet};
use std::thread;

use accord_core::{Agreement, AgreementStatus, AgreementType, CoreError, DuplicateCluster};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strsim::{jaro_winkler, normalized_levenshtein, sorensen_dice};
use tracing::debug;

use crate::config::ConfigError;
use crate::resolve_workers;

/// Two title words are the same word when their Jaro-Winkler score reaches this.
const TOKEN_MATCH_THRESHOLD: f64 = 0.9;

/// Connective words that carry no topic. Words shorter than three characters are dropped as well.
const STOPWORDS: &[&str] = &["and", "for", "the", "between", "with", "from", "into", "között", "szóló", "való"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Whole-title Jaro-Winkler, capped by how many content words the titles share.
    #[default]
    TokenJaroWinkler,
    JaroWinkler,
    NormalizedLevenshtein,
    SorensenDice,
}

impl SimilarityMetric {
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            Self::TokenJaroWinkler => jaro_winkler(a, b).min(content_word_overlap(a, b)),
            Self::JaroWinkler => jaro_winkler(a, b),
            Self::NormalizedLevenshtein => normalized_levenshtein(a, b),
            Self::SorensenDice => sorensen_dice(a, b),
        }
    }
}

fn content_words(key: &str) -> BTreeSet<&str> {
    key.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 3 && !STOPWORDS.contains(word))
        .collect()
}

/// Share of content words, counted on both sides, that have a close counterpart in the other title.
/// "memorandum of understanding on trade" vs "... on health" leaves two of four words unmatched.
fn content_word_overlap(a: &str, b: &str) -> f64 {
    let (words_a, words_b) = (content_words(a), content_words(b));
    if words_a.is_empty() && words_b.is_empty() {
        return 1.0;
    }
    let covered = |from: &BTreeSet<&str>, to: &BTreeSet<&str>| {
        from.iter()
            .filter(|word| to.iter().any(|other| jaro_winkler(word, other) >= TOKEN_MATCH_THRESHOLD))
            .count()
    };
    let matched = covered(&words_a, &words_b) + covered(&words_b, &words_a);
    matched as f64 / (words_a.len() + words_b.len()) as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Pairs scoring at or above this value are duplicates.
    pub similarity_threshold: f64,
    /// Pairs whose signing dates differ by more than this many days never match.
    pub date_tolerance_days: i64,
    pub metric: SimilarityMetric,
    /// 0 = one worker per available CPU.
    pub workers: usize,
    /// Below this batch size pairwise scoring stays on the calling thread.
    pub parallel_min_records: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.92,
            date_tolerance_days: 3,
            metric: SimilarityMetric::TokenJaroWinkler,
            workers: 1,
            parallel_min_records: 512,
        }
    }
}

impl DedupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.similarity_threshold));
        }
        if self.date_tolerance_days < 0 {
            return Err(ConfigError::NegativeTolerance(self.date_tolerance_days));
        }
        Ok(())
    }
}

/// One canonical record plus how it was assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedAgreement {
    pub agreement: Agreement,
    pub member_indices: Vec<usize>,
    pub confidence: Option<f64>,
}

impl MergedAgreement {
    pub fn merged_from(&self) -> usize {
        self.member_indices.len()
    }
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

struct Candidate {
    key: Option<String>,
    date: Option<NaiveDate>,
}

pub struct DedupEngine {
    config: DedupConfig,
}

impl DedupEngine {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    fn pair_score(&self, a: &Candidate, b: &Candidate) -> Option<f64> {
        let (Some(ka), Some(kb)) = (a.key.as_deref(), b.key.as_deref()) else {
            return None;
        };
        if let (Some(da), Some(db)) = (a.date, b.date) {
            if (da - db).num_days().abs() > self.config.date_tolerance_days {
                return None;
            }
        }
        let score = self.config.metric.score(ka, kb);
        (score >= self.config.similarity_threshold).then_some(score)
    }

    fn score_rows(&self, candidates: &[Candidate], rows: impl Iterator<Item = usize>) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        for i in rows {
            for j in (i + 1)..candidates.len() {
                if let Some(score) = self.pair_score(&candidates[i], &candidates[j]) {
                    out.push((i, j, score));
                }
            }
        }
        out
    }

    /// All matching pairs `(i, j, score)` with `i < j`, sorted.
    fn matching_pairs(&self, candidates: &[Candidate]) -> Vec<(usize, usize, f64)> {
        let n = candidates.len();
        let workers = resolve_workers(self.config.workers).min(n.max(1));
        if workers <= 1 || n < self.config.parallel_min_records {
            return self.score_rows(candidates, 0..n);
        }

        // Rows are strided across workers so the long early rows are spread evenly.
        let mut pairs = thread::scope(|scope| {
            let handles = (0..workers)
                .map(|w| scope.spawn(move || self.score_rows(candidates, (w..n).step_by(workers))))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect::<Vec<_>>()
        });
        pairs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        pairs
    }

    /// Group records describing the same agreement. Every input lands in exactly one cluster;
    /// clusters are ordered by their first member's input position.
    pub fn find_duplicates<'a>(&self, agreements: &'a [Agreement]) -> Vec<DuplicateCluster<'a>> {
        let candidates = agreements
            .iter()
            .map(|a| Candidate {
                key: a.comparison_key(),
                date: a.date_signed,
            })
            .collect::<Vec<_>>();

        let pairs = self.matching_pairs(&candidates);
        let mut sets = DisjointSet::new(agreements.len());
        for &(i, j, _) in &pairs {
            sets.union(i, j);
        }

        let mut slot_of_root: Vec<Option<usize>> = vec![None; agreements.len()];
        let mut members: Vec<Vec<(usize, &'a Agreement)>> = Vec::new();
        for (idx, agreement) in agreements.iter().enumerate() {
            let root = sets.find(idx);
            let slot = *slot_of_root[root].get_or_insert_with(|| {
                members.push(Vec::new());
                members.len() - 1
            });
            members[slot].push((idx, agreement));
        }

        let mut confidence: Vec<Option<f64>> = vec![None; members.len()];
        for &(i, _, score) in &pairs {
            if let Some(slot) = slot_of_root[sets.find(i)] {
                let current = confidence[slot].get_or_insert(score);
                *current = current.min(score);
            }
        }

        debug!(
            records = agreements.len(),
            matched_pairs = pairs.len(),
            clusters = members.len(),
            "duplicate clustering complete"
        );

        members
            .into_iter()
            .zip(confidence)
            .map(|(members, confidence)| DuplicateCluster::new(members, confidence))
            .collect()
    }

    pub fn merge_agreements(&self, cluster: &DuplicateCluster<'_>) -> Result<Agreement, CoreError> {
        merge_agreements(cluster)
    }

    /// Cluster then merge each cluster, in cluster order.
    pub fn deduplicate(&self, agreements: &[Agreement]) -> Result<Vec<MergedAgreement>, CoreError> {
        self.find_duplicates(agreements)
            .iter()
            .map(|cluster| {
                Ok::<_, CoreError>(MergedAgreement {
                    agreement: merge_agreements(cluster)?,
                    member_indices: cluster.indices().collect(),
                    confidence: cluster.confidence(),
                })
            })
            .collect()
    }
}

/// Collapse one cluster into a canonical record; each field is resolved independently.
pub fn merge_agreements(cluster: &DuplicateCluster<'_>) -> Result<Agreement, CoreError> {
    let first = cluster
        .members()
        .next()
        .ok_or_else(|| CoreError::InvalidArgument("cannot merge an empty duplicate cluster".to_string()))?;

    let mut seen = HashSet::new();
    let mut sources: Vec<String> = Vec::new();
    for source in cluster.members().flat_map(|a| a.sources.iter()) {
        if seen.insert(source.as_str()) {
            sources.push(source.clone());
        }
    }

    Ok(Agreement {
        title_native: longest_text(cluster, first, |a| a.title_native.as_deref()),
        title_en: longest_text(cluster, first, |a| a.title_en.as_deref()),
        agreement_type: AgreementType::new(most_frequent(cluster, first, |a| a.agreement_type.as_str())),
        status: AgreementStatus::new(most_frequent(cluster, first, |a| a.status.as_str())),
        date_signed: cluster.members().filter_map(|a| a.date_signed).min(),
        jurisdiction_level: most_frequent(cluster, first, |a| a.jurisdiction_level.as_str()),
        sources,
        country_code: most_frequent(cluster, first, |a| a.country_code.as_str()),
    })
}

/// Longest non-blank value by character count, earliest on ties.
fn longest_text<'a>(
    cluster: &DuplicateCluster<'a>,
    first: &'a Agreement,
    field: impl Fn(&'a Agreement) -> Option<&'a str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for value in cluster.members().filter_map(&field) {
        if value.trim().is_empty() {
            continue;
        }
        let len = value.chars().count();
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((value, len));
        }
    }
    match best {
        Some((value, _)) => Some(value.to_string()),
        None => field(first).map(ToString::to_string),
    }
}

/// Majority non-blank value, earliest on ties.
fn most_frequent<'a>(
    cluster: &DuplicateCluster<'a>,
    first: &'a Agreement,
    field: impl Fn(&'a Agreement) -> &'a str,
) -> String {
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for value in cluster.members().map(&field) {
        if value.trim().is_empty() {
            continue;
        }
        match tally.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in tally {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
        .unwrap_or_else(|| field(first))
        .to_string()
}
