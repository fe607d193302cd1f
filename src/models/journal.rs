use serde::{Deserialize, Serialize};

use crate::error::XeroError;

/// Status applied when the caller does not provide one
pub const DEFAULT_JOURNAL_STATUS: &str = "DRAFT";

// ==================================================================================================
// Inbound Models
// ==================================================================================================

/// Manual journal as submitted by callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub narration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(alias = "lines")]
    pub journal_lines: Vec<JournalLineInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalLineInput {
    pub account_code: String,
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Line amount given either as a JSON number or as a string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    /// Numeric value sent to Xero; unparseable text becomes NaN
    pub fn line_amount(&self) -> f64 {
        match self {
            Amount::Number(n) => *n,
            Amount::Text(s) => parse_float(s),
        }
    }
}

impl From<f64> for Amount {
    fn from(n: f64) -> Self {
        Amount::Number(n)
    }
}

impl From<&str> for Amount {
    fn from(s: &str) -> Self {
        Amount::Text(s.to_string())
    }
}

impl JournalRequest {
    /// Map into the Xero manual journal wire format
    pub fn to_manual_journal(&self) -> ManualJournal {
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_JOURNAL_STATUS)
            .to_string();

        ManualJournal {
            status,
            narration: self.narration.clone(),
            date: self.date.clone(),
            journal_lines: self
                .journal_lines
                .iter()
                .map(|line| ManualJournalLine {
                    account_code: line.account_code.clone(),
                    line_amount: line.amount.line_amount(),
                    description: line.description.clone(),
                })
                .collect(),
        }
    }
}

/// Decimal parse of the longest numeric prefix, after leading whitespace.
/// "12.50" -> 12.5, "3e2x" -> 300, "abc" -> NaN.
pub fn parse_float(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return s[..end + "Infinity".len()].replace("Infinity", "inf").parse().unwrap_or(f64::NAN);
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }

    // Exponent only counts when at least one digit follows
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

// ==================================================================================================
// Xero Wire Models
// ==================================================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManualJournals {
    pub manual_journals: Vec<ManualJournal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManualJournal {
    pub status: String,
    pub narration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub journal_lines: Vec<ManualJournalLine>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManualJournalLine {
    pub account_code: String,
    /// NaN serializes as JSON null
    pub line_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ==================================================================================================
// Outcome Models
// ==================================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalSuccess {
    pub status_code: u16,
    pub message: String,
}

impl JournalSuccess {
    pub fn created() -> Self {
        Self {
            status_code: 200,
            message: "Successfully created journal.".to_string(),
        }
    }
}

/// Failure shaped like [`JournalSuccess`]; remote rejections keep the remote status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalFailure {
    pub status_code: u16,
    pub message: String,
}

impl From<XeroError> for JournalFailure {
    fn from(err: XeroError) -> Self {
        match err {
            XeroError::Api {
                status, message, ..
            } => Self {
                status_code: status,
                message,
            },
            other => Self {
                status_code: 500,
                message: other.to_string(),
            },
        }
    }
}
