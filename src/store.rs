//! Durable local state: the handful of named entries the application keeps
//! between runs, each stored as a string in the `kv` table.

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::{get_value, set_value};
use crate::error::Result;
use crate::models::Transaction;

pub const HISTORY_KEY: &str = "fintrack_history";
pub const TAGS_KEY: &str = "fintrack_tags";
pub const BANKS_KEY: &str = "fintrack_banks";
pub const SCRIPT_URL_KEY: &str = "fintrack_script_url";
pub const WORKING_SET_KEY: &str = "fintrack_working_set";
pub const UPLOADS_KEY: &str = "fintrack_uploads";

pub const DEFAULT_SCRIPT_URL: &str = "https://script.google.com/macros/s/AKfycbyd_fl5wRPoBviIxp_xzMuzyjkEwe_Xmgy8Mwb8p1SC350yNoyhBHw1zqEzDRcfFtP2/exec";

pub const DEFAULT_TAGS: &[&str] = &[
    "Rent",
    "Utilities",
    "Software",
    "Travel",
    "Meals",
    "Office Supplies",
];

pub const DEFAULT_BANKS: &[&str] = &[
    "HDFC Bank",
    "ICICI Bank",
    "State Bank of India",
    "Axis Bank",
    "Kotak Mahindra Bank",
];

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Decode a JSON entry. Missing or undecodable entries yield `None` so the
    /// caller falls back to its default.
    fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = get_value(&self.conn, key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, "stored entry is not valid JSON, using default: {e}");
                Ok(None)
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        set_value(&self.conn, key, &json)?;
        tracing::debug!(key, bytes = json.len(), "saved");
        Ok(())
    }

    pub fn load_history(&self) -> Result<Vec<Transaction>> {
        Ok(self.load_json(HISTORY_KEY)?.unwrap_or_default())
    }

    pub fn save_history(&self, history: &[Transaction]) -> Result<()> {
        self.save_json(HISTORY_KEY, history)
    }

    pub fn load_working_set(&self) -> Result<Vec<Transaction>> {
        Ok(self.load_json(WORKING_SET_KEY)?.unwrap_or_default())
    }

    pub fn save_working_set(&self, records: &[Transaction]) -> Result<()> {
        self.save_json(WORKING_SET_KEY, records)
    }

    /// Write history and the working set together after a dispatch, so a
    /// failed write leaves neither changed.
    pub fn save_dispatch(&self, history: &[Transaction], working_set: &[Transaction]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        set_value(&tx, HISTORY_KEY, &serde_json::to_string(history)?)?;
        set_value(&tx, WORKING_SET_KEY, &serde_json::to_string(working_set)?)?;
        tx.commit()?;
        Ok(())
    }

    pub fn load_tags(&self) -> Result<Vec<String>> {
        Ok(self
            .load_json(TAGS_KEY)?
            .unwrap_or_else(|| DEFAULT_TAGS.iter().map(|s| s.to_string()).collect()))
    }

    pub fn save_tags(&self, tags: &[String]) -> Result<()> {
        self.save_json(TAGS_KEY, tags)
    }

    pub fn load_banks(&self) -> Result<Vec<String>> {
        Ok(self
            .load_json(BANKS_KEY)?
            .unwrap_or_else(|| DEFAULT_BANKS.iter().map(|s| s.to_string()).collect()))
    }

    pub fn save_banks(&self, banks: &[String]) -> Result<()> {
        self.save_json(BANKS_KEY, banks)
    }

    /// The endpoint is kept as a bare string, not JSON.
    pub fn load_script_url(&self) -> Result<String> {
        Ok(get_value(&self.conn, SCRIPT_URL_KEY)?
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SCRIPT_URL.to_string()))
    }

    pub fn save_script_url(&self, url: &str) -> Result<()> {
        set_value(&self.conn, SCRIPT_URL_KEY, url)
    }

    pub fn load_uploads(&self) -> Result<Vec<String>> {
        Ok(self.load_json(UPLOADS_KEY)?.unwrap_or_default())
    }

    pub fn save_uploads(&self, checksums: &[String]) -> Result<()> {
        self.save_json(UPLOADS_KEY, checksums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::models::{sample, Direction};

    #[test]
    fn test_defaults_when_empty() {
        let (_dir, conn) = test_db();
        let store = Store::new(conn);
        assert!(store.load_history().unwrap().is_empty());
        assert!(store.load_working_set().unwrap().is_empty());
        assert_eq!(store.load_tags().unwrap().len(), DEFAULT_TAGS.len());
        assert_eq!(store.load_banks().unwrap()[0], "HDFC Bank");
        assert_eq!(store.load_script_url().unwrap(), DEFAULT_SCRIPT_URL);
    }

    #[test]
    fn test_history_roundtrip() {
        let (_dir, conn) = test_db();
        let store = Store::new(conn);
        let history = vec![
            sample("a", "2024-01-05", 100.0, Direction::Spent),
            sample("b", "2024-01-10", 50.0, Direction::Received),
        ];
        store.save_history(&history).unwrap();
        assert_eq!(store.load_history().unwrap(), history);
    }

    #[test]
    fn test_script_url_is_stored_verbatim() {
        let (_dir, conn) = test_db();
        let store = Store::new(conn);
        store.save_script_url("https://example.com/exec").unwrap();
        assert_eq!(store.load_script_url().unwrap(), "https://example.com/exec");
        let raw = get_value(store.conn(), SCRIPT_URL_KEY).unwrap();
        assert_eq!(raw.as_deref(), Some("https://example.com/exec"));
    }

    #[test]
    fn test_corrupt_entry_falls_back_to_default() {
        let (_dir, conn) = test_db();
        set_value(&conn, TAGS_KEY, "not json").unwrap();
        let store = Store::new(conn);
        assert_eq!(store.load_tags().unwrap().len(), DEFAULT_TAGS.len());
    }

    #[test]
    fn test_empty_tag_list_is_kept() {
        let (_dir, conn) = test_db();
        let store = Store::new(conn);
        store.save_tags(&[]).unwrap();
        assert!(store.load_tags().unwrap().is_empty());
    }
}
