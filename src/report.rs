use crate::{metrics::QualityMetrics, policy::Decision};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted record per page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageQualityRecord {
    pub document_name: String,
    pub page_number: u32,
    pub quality: Quality,
    pub decision: Decision,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quality {
    pub score: i32,
    pub metrics: QualityMetrics,
}

impl PageQualityRecord {
    /// `{stem}_page_{n}.json`
    pub fn file_name(&self, document_stem: &str) -> String {
        format!("{}_page_{}.json", document_stem, self.page_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub document_name: String,
    pub error_kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub started: String,
    pub finished: String,
    pub documents_seen: u32,
    pub documents_processed: u32,
    pub pages_written: u32,
    pub decisions: BTreeMap<Decision, u32>,
    pub skipped: Vec<SkippedDocument>,
}

impl RunSummary {
    pub fn count(&self, decision: Decision) -> u32 {
        self.decisions.get(&decision).copied().unwrap_or(0)
    }
}
