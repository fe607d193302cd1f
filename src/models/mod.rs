// Data models for Xero API formats

pub mod account;
pub mod journal;
pub mod tenant;

pub use account::{AccountSummary, AccountsResponse};
pub use journal::{JournalFailure, JournalRequest, JournalSuccess, ManualJournals};
pub use tenant::Tenant;
