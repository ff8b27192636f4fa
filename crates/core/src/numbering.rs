//! Persisted identifier formats.
//!
//! These strings are stored verbatim and must stay bit-exact:
//! - case id: `APR` + 8-digit sequence (`APR00000042`)
//! - history id: `AH` + 8-digit sequence (`AH00000007`)
//! - case number: `APR-{yyyy}-{5-digit sequence}` (`APR-2025-00001`)
//!
//! Sequences come from an atomically incremented counter keyed by [`SequenceKind::key`].

use crate::domain::approval::{CaseId, HistoryId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    Case,
    History,
    /// Case numbers restart every calendar year.
    CaseNumber { year: i32 },
}

impl SequenceKind {
    pub fn key(&self) -> String {
        match self {
            Self::Case => "approval_case".to_string(),
            Self::History => "approval_history".to_string(),
            Self::CaseNumber { year } => format!("approval_case_number:{year:04}"),
        }
    }
}

pub fn case_id(sequence: u64) -> CaseId {
    CaseId(format!("APR{sequence:08}"))
}

pub fn history_id(sequence: u64) -> HistoryId {
    HistoryId(format!("AH{sequence:08}"))
}

pub fn case_number(year: i32, sequence: u64) -> String {
    format!("APR-{year:04}-{sequence:05}")
}
