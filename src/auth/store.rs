// Token persistence in SQLite

use anyhow::{anyhow, Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::TokenSet;

const TOKEN_KEY: &str = "xero:token";

/// Key/value token store used by the gateway to keep the token pair
/// between restarts
pub struct TokenStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl TokenStore {
    /// Open (or create) the SQLite database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database: {}", path.display()))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Store that lives only as long as the process
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory SQLite")?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to create auth_kv table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the stored token pair, validating it
    pub fn load(&self) -> Result<Option<TokenSet>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM auth_kv WHERE key = ?",
                [TOKEN_KEY],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to load token data from SQLite")?;

        let Some(json) = value else {
            return Ok(None);
        };

        let raw: serde_json::Value =
            serde_json::from_str(&json).context("Failed to parse token data from SQLite")?;
        let token = TokenSet::from_value(raw).context("Stored token data is invalid")?;
        Ok(Some(token))
    }

    pub fn save(&self, token: &TokenSet) -> Result<()> {
        let json = serde_json::to_string(token).context("Failed to serialize token")?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [TOKEN_KEY, json.as_str()],
        )
        .context("Failed to save token to SQLite")?;

        tracing::debug!("Token persisted (expires_at: {:?})", token.expires_at);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM auth_kv WHERE key = ?", [TOKEN_KEY])
            .context("Failed to delete token from SQLite")?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Token store lock poisoned"))
    }
}
