//! Status-code classification
//!
//! Maps each HTTP status code to the action the request cycle takes after
//! receiving it. The table is consulted once per received response.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Action category for a received status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    /// Read the body and invoke the success hook
    Success,
    /// Invoke the retry hook and attempt again
    Retry,
    /// Invoke the failure hook and stop
    Fail,
    /// Log and stop; no status maps here by default
    Start,
    /// Log and stop; no status maps here by default
    End,
}

impl StatusCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Retry => "retry",
            Self::Fail => "fail",
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default status table
///
/// | Codes | Category |
/// |-------|----------|
/// | 200-203, 206 | success |
/// | 401, 403, 405-408, 429, 500, 502-504 | retry |
/// | 204, 400, 404, 410, 501 | fail |
const DEFAULT_TABLE: &[(u16, StatusCategory)] = &[
    (200, StatusCategory::Success),
    (201, StatusCategory::Success),
    (202, StatusCategory::Success),
    (203, StatusCategory::Success),
    (206, StatusCategory::Success),
    (204, StatusCategory::Fail),
    (400, StatusCategory::Fail),
    (401, StatusCategory::Retry),
    (403, StatusCategory::Retry),
    (404, StatusCategory::Fail),
    (405, StatusCategory::Retry),
    (406, StatusCategory::Retry),
    (407, StatusCategory::Retry),
    (408, StatusCategory::Retry),
    (410, StatusCategory::Fail),
    (429, StatusCategory::Retry),
    (500, StatusCategory::Retry),
    (501, StatusCategory::Fail),
    (502, StatusCategory::Retry),
    (503, StatusCategory::Retry),
    (504, StatusCategory::Retry),
];

/// Lookup table from status code to [`StatusCategory`]
///
/// Codes missing from the table are unclassified; the request cycle logs
/// them and stops without invoking any hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusClassifier {
    table: HashMap<u16, StatusCategory>,
}

impl StatusClassifier {
    /// Creates a classifier with no entries
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Adds or replaces an entry, builder style
    pub fn with(mut self, status: u16, category: StatusCategory) -> Self {
        self.insert(status, category);
        self
    }

    /// Adds or replaces an entry
    pub fn insert(&mut self, status: u16, category: StatusCategory) {
        self.table.insert(status, category);
    }

    /// Removes an entry so the code becomes unclassified
    pub fn remove(&mut self, status: u16) -> Option<StatusCategory> {
        self.table.remove(&status)
    }

    /// Looks up the category for a status code
    pub fn classify(&self, status: u16) -> Option<StatusCategory> {
        self.table.get(&status).copied()
    }

    /// Number of classified codes
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.iter().copied().collect(),
        }
    }
}
