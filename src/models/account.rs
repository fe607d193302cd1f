use serde::{Deserialize, Serialize};
use serde_json::Value;

/// GET /Accounts response body
///
/// Records stay as raw JSON because the projection exposes the whole record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountsResponse {
    #[serde(default)]
    pub accounts: Option<Vec<Value>>,
}

/// Chart-of-accounts entry returned to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub id: Option<String>,
    pub code: Option<String>,
    pub name: Option<String>,

    /// Currently the complete Xero account record, not its Type code
    #[serde(rename = "type")]
    pub kind: Value,
}

impl AccountSummary {
    pub fn from_record(record: Value) -> Self {
        let field = |name: &str| record.get(name).and_then(Value::as_str).map(str::to_string);

        Self {
            id: field("AccountID"),
            code: field("Code"),
            name: field("Name"),
            kind: record,
        }
    }
}
