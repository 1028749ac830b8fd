//! Failure Tracker
//!
//! Collects per-file problems during a run. Nothing recorded here stops the
//! run; the records end up in the "Processing issues" section.

use crate::extract::ExtractionFailure;
use crate::format::FormatCategory;
use crate::walker::WalkFailure;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Where in the pipeline a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// The entry could not be read or stat'ed during the walk
    Walk,
    /// Every extraction strategy failed
    Extraction,
}

/// A single recorded failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// Relative path with '/' separators
    pub label: String,

    /// Format category, unknown for walk failures
    pub category: Option<FormatCategory>,

    pub reason: String,

    pub attempted_fallback: bool,

    pub stage: FailureStage,
}

/// Failures in recording order, one per relative path
#[derive(Debug, Default)]
pub struct FailureTracker {
    records: Vec<FailureRecord>,
    index: HashMap<String, usize>,
}

impl FailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    ///
    /// A second record for the same path replaces the first and keeps its
    /// position.
    pub fn record(&mut self, record: FailureRecord) {
        tracing::warn!(
            "[FailureTracker] {} ({:?}): {}",
            record.label,
            record.stage,
            record.reason
        );

        match self.index.get(&record.label) {
            Some(&pos) => self.records[pos] = record,
            None => {
                self.index.insert(record.label.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn record_extraction(&mut self, failure: &ExtractionFailure) {
        self.record(FailureRecord {
            label: failure.entry.label(),
            category: Some(failure.category),
            reason: failure.reason.clone(),
            attempted_fallback: failure.attempted_fallback,
            stage: FailureStage::Extraction,
        });
    }

    pub fn record_walk(&mut self, failure: &WalkFailure) {
        self.record(FailureRecord {
            label: failure.label(),
            category: None,
            reason: failure.reason.clone(),
            attempted_fallback: false,
            stage: FailureStage::Walk,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts by category plus every record in recording order
    pub fn summary(&self) -> FailureSummary {
        let mut by_category = BTreeMap::new();
        let mut unreadable = 0;

        for record in &self.records {
            match record.category {
                Some(category) => *by_category.entry(category).or_insert(0) += 1,
                None => unreadable += 1,
            }
        }

        FailureSummary {
            by_category,
            unreadable,
            items: self.records.clone(),
        }
    }
}

/// Snapshot of the tracker at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    /// Extraction failures per format category
    pub by_category: BTreeMap<FormatCategory, usize>,

    /// Entries that failed during the walk
    pub unreadable: usize,

    /// All failures in recording order
    pub items: Vec<FailureRecord>,
}

impl FailureSummary {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// `(path, reason)` pairs in recording order
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.items
            .iter()
            .map(|r| (r.label.clone(), r.reason.clone()))
            .collect()
    }
}
