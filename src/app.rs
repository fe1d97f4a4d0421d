//! Application state and the operations the command line and terminal UI
//! drive. Every mutation is written to the store before returning.

use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::{FinError, Result};
use crate::extractor::{read_statement, StatementExtractor};
use crate::models::{append_unique, Status, Transaction, UNCATEGORIZED};
use crate::review::{dispatch_approved, Dispatch, FieldEdit, WorkingSet};
use crate::store::Store;
use crate::sync::{validate_endpoint, BatchSink, RemoteSnapshot, Sent};

pub struct AppState {
    store: Store,
    pub history: Vec<Transaction>,
    pub working_set: WorkingSet,
    pub tags: Vec<String>,
    pub banks: Vec<String>,
    pub script_url: String,
    uploads: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub extracted: usize,
    pub replaced: usize,
}

impl AppState {
    pub fn load(conn: Connection) -> Result<Self> {
        let store = Store::new(conn);
        Ok(Self {
            history: store.load_history()?,
            working_set: WorkingSet::new(store.load_working_set()?),
            tags: store.load_tags()?,
            banks: store.load_banks()?,
            script_url: store.load_script_url()?,
            uploads: store.load_uploads()?,
            store,
        })
    }

    fn save_working_set(&self) -> Result<()> {
        self.store.save_working_set(self.working_set.records())
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Extract a statement into a fresh working set. The previous working set
    /// is discarded. A statement already processed is refused unless `force`.
    /// `connect` runs only once the file has passed those checks.
    pub fn upload<E, F>(&mut self, path: &Path, force: bool, connect: F) -> Result<UploadOutcome>
    where
        E: StatementExtractor,
        F: FnOnce() -> Result<E>,
    {
        let bytes = read_statement(path)?;
        let checksum = statement_checksum(&bytes);
        if !force && self.uploads.contains(&checksum) {
            return Err(FinError::DuplicateStatement);
        }
        let extractor = connect()?;
        let records = extractor.extract(&bytes)?;
        let replaced = self.working_set.len();
        let outcome = UploadOutcome {
            extracted: records.len(),
            replaced,
        };
        self.working_set = WorkingSet::new(records);
        self.save_working_set()?;
        if !self.uploads.contains(&checksum) {
            self.uploads.push(checksum);
            self.store.save_uploads(&self.uploads)?;
        }
        tracing::info!(
            file = %path.display(),
            extracted = outcome.extracted,
            replaced,
            "statement extracted"
        );
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Working set
    // -----------------------------------------------------------------------

    pub fn edit_pending(&mut self, id: &str, edit: FieldEdit) -> Result<()> {
        self.apply_edits(id, [edit])
    }

    /// Apply several edits to one record. Either all of them land or none do.
    pub fn apply_edits(&mut self, id: &str, edits: impl IntoIterator<Item = FieldEdit>) -> Result<()> {
        let mut updated = self.working_set.clone();
        for edit in edits {
            let edit = match edit {
                FieldEdit::Tag(tag) => FieldEdit::Tag(self.resolve_tag(&tag)?),
                other => other,
            };
            updated.edit(id, edit)?;
        }
        self.working_set = updated;
        self.save_working_set()
    }

    /// Match a tag against the tag set, ignoring case. "Uncategorized" is
    /// always accepted.
    fn resolve_tag(&self, tag: &str) -> Result<String> {
        let tag = tag.trim();
        if tag.eq_ignore_ascii_case(UNCATEGORIZED) {
            return Ok(UNCATEGORIZED.to_string());
        }
        self.tags
            .iter()
            .find(|t| t.eq_ignore_ascii_case(tag))
            .cloned()
            .ok_or_else(|| FinError::UnknownTag(tag.to_string()))
    }

    pub fn toggle(&mut self, id: &str) -> Result<Status> {
        let status = self.working_set.toggle(id)?;
        self.save_working_set()?;
        Ok(status)
    }

    pub fn set_status(&mut self, ids: &[String], status: Status) -> Result<()> {
        let mut updated = self.working_set.clone();
        for id in ids {
            updated.set_status(id, status)?;
        }
        self.working_set = updated;
        self.save_working_set()
    }

    pub fn toggle_all(&mut self) -> Result<Status> {
        let status = self.working_set.toggle_all();
        self.save_working_set()?;
        Ok(status)
    }

    pub fn delete(&mut self, id: &str) -> Result<Transaction> {
        let removed = self.working_set.delete(id)?;
        self.save_working_set()?;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Remote
    // -----------------------------------------------------------------------

    /// Dispatch the approved subset and persist both lists once it is sent.
    pub fn sync_approved(&mut self, sink: &dyn BatchSink) -> Result<Dispatch> {
        let result = dispatch_approved(&mut self.working_set, &mut self.history, sink)?;
        if let Dispatch::Sent(sent) = result {
            if let Err(e) = self.store.save_dispatch(&self.history, self.working_set.records()) {
                tracing::error!(
                    count = sent.count,
                    "batch was sent but could not be saved; it stays approved on disk: {e}"
                );
                return Err(e);
            }
            tracing::info!(count = sent.count, history = self.history.len(), "approved batch moved to history");
        }
        Ok(result)
    }

    /// Replace local history with the remote copy. Tags and banks are replaced
    /// only when the remote sent them.
    pub fn apply_remote(&mut self, snapshot: RemoteSnapshot) -> Result<usize> {
        let mut history = Vec::with_capacity(snapshot.transactions.len());
        append_unique(&mut history, snapshot.transactions);
        self.history = history;
        self.store.save_history(&self.history)?;
        if let Some(tags) = snapshot.tags {
            self.tags = dedup(tags);
            self.store.save_tags(&self.tags)?;
        }
        if let Some(banks) = snapshot.banks {
            self.banks = dedup(banks);
            self.store.save_banks(&self.banks)?;
        }
        Ok(self.history.len())
    }

    pub fn set_script_url(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        validate_endpoint(url)?;
        self.script_url = url.to_string();
        self.store.save_script_url(url)
    }

    // -----------------------------------------------------------------------
    // Tags and banks
    // -----------------------------------------------------------------------

    pub fn add_tag(&mut self, tag: &str) -> Result<bool> {
        let added = add_distinct(&mut self.tags, tag)?;
        if added {
            self.store.save_tags(&self.tags)?;
        }
        Ok(added)
    }

    pub fn remove_tag(&mut self, tag: &str) -> Result<bool> {
        let removed = remove_named(&mut self.tags, tag);
        if removed {
            self.store.save_tags(&self.tags)?;
        }
        Ok(removed)
    }

    pub fn add_bank(&mut self, bank: &str) -> Result<bool> {
        let added = add_distinct(&mut self.banks, bank)?;
        if added {
            self.store.save_banks(&self.banks)?;
        }
        Ok(added)
    }

    pub fn remove_bank(&mut self, bank: &str) -> Result<bool> {
        let removed = remove_named(&mut self.banks, bank);
        if removed {
            self.store.save_banks(&self.banks)?;
        }
        Ok(removed)
    }

    /// The next tag after `current` in the tag cycle used by the review table.
    pub fn next_tag(&self, current: &str) -> String {
        let cycle: Vec<&str> = std::iter::once(UNCATEGORIZED)
            .chain(self.tags.iter().map(String::as_str))
            .collect();
        let idx = cycle
            .iter()
            .position(|t| t.eq_ignore_ascii_case(current))
            .map_or(0, |i| (i + 1) % cycle.len());
        cycle[idx].to_string()
    }
}

pub fn statement_checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn add_distinct(list: &mut Vec<String>, name: &str) -> Result<bool> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FinError::Other("name cannot be empty".to_string()));
    }
    if list.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        return Ok(false);
    }
    list.push(name.to_string());
    Ok(true)
}

fn remove_named(list: &mut Vec<String>, name: &str) -> bool {
    let before = list.len();
    list.retain(|n| !n.eq_ignore_ascii_case(name.trim()));
    list.len() != before
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|n| n.eq_ignore_ascii_case(&item)) {
            out.push(item);
        }
    }
    out
}

/// Summary line for a finished dispatch.
pub fn dispatch_message(result: &Dispatch) -> String {
    match result {
        Dispatch::NothingApproved => "No transactions are approved; nothing to sync.".to_string(),
        Dispatch::Sent(Sent { count }) => {
            format!("Sent {count} transaction(s) to the sheet. Delivery is not confirmed by the remote.")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::db::test_db;
    use crate::error::ExtractionError;
    use crate::models::{sample, Direction};
    use crate::review::tests::RecordingSink;
    use crate::store::DEFAULT_TAGS;

    #[derive(Clone)]
    struct FixedExtractor(Vec<Transaction>);

    impl StatementExtractor for FixedExtractor {
        fn extract(&self, _pdf: &[u8]) -> std::result::Result<Vec<Transaction>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingExtractor;

    impl StatementExtractor for FailingExtractor {
        fn extract(&self, _pdf: &[u8]) -> std::result::Result<Vec<Transaction>, ExtractionError> {
            Err(ExtractionError::EmptyResponse)
        }
    }

    fn fixed(records: Vec<Transaction>) -> impl FnOnce() -> Result<FixedExtractor> {
        move || Ok(FixedExtractor(records))
    }

    fn no_api_key() -> Result<FixedExtractor> {
        Err(ExtractionError::Auth("set GEMINI_API_KEY".to_string()).into())
    }

    fn pending(id: &str, amount: f64) -> Transaction {
        let mut t = sample(id, "2024-01-05", amount, Direction::Spent);
        t.status = Status::Pending;
        t
    }

    fn write_pdf(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "%PDF-1.4\n{body}").unwrap();
        path
    }

    /// Reopen the same database to check what was persisted.
    fn reopen(dir: &tempfile::TempDir) -> AppState {
        let conn = crate::db::get_connection(&dir.path().join("test.db")).unwrap();
        AppState::load(conn).unwrap()
    }

    #[test]
    fn test_load_defaults() {
        let (_dir, conn) = test_db();
        let app = AppState::load(conn).unwrap();
        assert!(app.history.is_empty());
        assert!(app.working_set.is_empty());
        assert_eq!(app.tags.len(), DEFAULT_TAGS.len());
    }

    #[test]
    fn test_upload_replaces_working_set_and_persists() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        let first = write_pdf(dir.path(), "jan.pdf", "jan");
        let second = write_pdf(dir.path(), "feb.pdf", "feb");

        app.upload(&first, false, fixed(vec![pending("a", 1.0), pending("b", 2.0)]))
            .unwrap();
        let outcome = app
            .upload(&second, false, fixed(vec![pending("c", 3.0)]))
            .unwrap();

        assert_eq!(outcome, UploadOutcome { extracted: 1, replaced: 2 });
        let reloaded = reopen(&dir);
        assert_eq!(reloaded.working_set.len(), 1);
        assert_eq!(reloaded.working_set.records()[0].id, "c");
    }

    #[test]
    fn test_upload_refuses_duplicate_statement_unless_forced() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        let path = write_pdf(dir.path(), "jan.pdf", "jan");
        let extractor = FixedExtractor(vec![pending("a", 1.0)]);

        app.upload(&path, false, || Ok(extractor.clone())).unwrap();
        assert!(matches!(
            app.upload(&path, false, || Ok(extractor.clone())),
            Err(FinError::DuplicateStatement)
        ));
        assert!(app.upload(&path, true, || Ok(extractor.clone())).is_ok());
    }

    #[test]
    fn test_upload_rejects_non_pdf() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        let err = app
            .upload(&path, false, fixed(vec![]))
            .unwrap_err();
        assert!(matches!(err, FinError::FileTypeRejected(_)));
    }

    #[test]
    fn test_upload_checks_file_before_connecting() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "hello").unwrap();
        let err = app.upload(&notes, false, no_api_key).unwrap_err();
        assert!(matches!(err, FinError::FileTypeRejected(_)));

        let path = write_pdf(dir.path(), "jan.pdf", "jan");
        app.upload(&path, false, fixed(vec![pending("a", 1.0)])).unwrap();
        let err = app.upload(&path, false, no_api_key).unwrap_err();
        assert!(matches!(err, FinError::DuplicateStatement));
        let err = app.upload(&path, true, no_api_key).unwrap_err();
        assert!(matches!(err, FinError::Extraction(ExtractionError::Auth(_))));
    }

    #[test]
    fn test_failed_extraction_keeps_working_set_and_allows_retry() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        let path = write_pdf(dir.path(), "jan.pdf", "jan");
        app.working_set = WorkingSet::new(vec![pending("keep", 5.0)]);

        let err = app.upload(&path, false, || Ok(FailingExtractor)).unwrap_err();
        assert!(matches!(err, FinError::Extraction(ExtractionError::EmptyResponse)));
        assert_eq!(app.working_set.len(), 1);
        assert!(app
            .upload(&path, false, fixed(vec![pending("a", 1.0)]))
            .is_ok());
    }

    #[test]
    fn test_tag_edit_must_be_known() {
        let (_dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.working_set = WorkingSet::new(vec![pending("a", 1.0)]);

        app.edit_pending("a", FieldEdit::Tag("meals".into())).unwrap();
        assert_eq!(app.working_set.get("a").unwrap().tag, "Meals");
        app.edit_pending("a", FieldEdit::Tag("uncategorized".into())).unwrap();
        assert_eq!(app.working_set.get("a").unwrap().tag, UNCATEGORIZED);
        assert!(matches!(
            app.edit_pending("a", FieldEdit::Tag("Crypto".into())),
            Err(FinError::UnknownTag(_))
        ));
    }

    #[test]
    fn test_apply_edits_is_all_or_nothing() {
        let (_dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.working_set = WorkingSet::new(vec![pending("a", 1.0)]);

        let result = app.apply_edits(
            "a",
            vec![FieldEdit::Description("Rent".into()), FieldEdit::Amount(-4.0)],
        );
        assert!(matches!(result, Err(FinError::InvalidEdit(_))));
        assert_eq!(app.working_set.get("a").unwrap().description, "txn a");

        app.apply_edits("a", vec![FieldEdit::Description("Rent".into()), FieldEdit::Amount(4.0)])
            .unwrap();
        let a = app.working_set.get("a").unwrap();
        assert_eq!((a.description.as_str(), a.amount), ("Rent", 4.0));
    }

    #[test]
    fn test_sync_persists_history_and_working_set() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.working_set = WorkingSet::new(vec![pending("a", 1.0), pending("b", 2.0)]);
        app.toggle("a").unwrap();

        let sink = RecordingSink::default();
        let result = app.sync_approved(&sink).unwrap();

        assert_eq!(result, Dispatch::Sent(Sent { count: 1 }));
        let reloaded = reopen(&dir);
        assert_eq!(reloaded.history.len(), 1);
        assert_eq!(reloaded.history[0].amount, 1.0);
        assert_eq!(reloaded.working_set.len(), 1);
        assert_eq!(reloaded.working_set.records()[0].id, "b");
    }

    #[test]
    fn test_sync_save_failure_leaves_both_lists_on_disk() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.working_set = WorkingSet::new(vec![pending("a", 1.0), pending("b", 2.0)]);
        app.toggle("a").unwrap();
        app.store
            .conn()
            .execute_batch(
                "CREATE TRIGGER block_working_set BEFORE UPDATE ON kv
                 WHEN NEW.key = 'fintrack_working_set'
                 BEGIN SELECT RAISE(ABORT, 'read-only'); END;",
            )
            .unwrap();

        let sink = RecordingSink::default();
        assert!(app.sync_approved(&sink).is_err());
        assert_eq!(sink.batches.borrow().len(), 1);

        let reloaded = reopen(&dir);
        assert!(reloaded.history.is_empty());
        assert_eq!(reloaded.working_set.approved_count(), 1);
    }

    #[test]
    fn test_sync_with_nothing_approved_writes_nothing() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.working_set = WorkingSet::new(vec![pending("a", 1.0)]);
        let sink = RecordingSink::default();
        assert_eq!(app.sync_approved(&sink).unwrap(), Dispatch::NothingApproved);
        assert!(sink.batches.borrow().is_empty());
        assert!(reopen(&dir).history.is_empty());
    }

    #[test]
    fn test_apply_remote_replaces_history_and_config() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.history = vec![sample("old", "2023-01-01", 9.0, Direction::Spent)];
        let snapshot = RemoteSnapshot {
            transactions: vec![sample("x", "2024-01-01", 1.0, Direction::Received)],
            tags: Some(vec!["Rent".into(), "rent".into(), "Fuel".into()]),
            banks: None,
        };
        assert_eq!(app.apply_remote(snapshot).unwrap(), 1);
        let reloaded = reopen(&dir);
        assert_eq!(reloaded.history.len(), 1);
        assert_eq!(reloaded.history[0].id, "x");
        assert_eq!(reloaded.tags, vec!["Rent".to_string(), "Fuel".to_string()]);
        assert_eq!(reloaded.banks, app.banks);
    }

    #[test]
    fn test_script_url_is_validated_before_saving() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        assert!(app.set_script_url("nonsense").is_err());
        app.set_script_url(" https://example.com/exec ").unwrap();
        assert_eq!(reopen(&dir).script_url, "https://example.com/exec");
    }

    #[test]
    fn test_tag_and_bank_sets_stay_distinct() {
        let (dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        assert!(app.add_tag("Fuel").unwrap());
        assert!(!app.add_tag("fuel").unwrap());
        assert!(app.add_tag("  ").is_err());
        assert!(app.remove_tag("RENT").unwrap());
        assert!(!app.remove_bank("Nowhere Bank").unwrap());
        assert!(app.add_bank("Yes Bank").unwrap());

        let reloaded = reopen(&dir);
        assert!(reloaded.tags.contains(&"Fuel".to_string()));
        assert!(!reloaded.tags.contains(&"Rent".to_string()));
        assert!(reloaded.banks.contains(&"Yes Bank".to_string()));
    }

    #[test]
    fn test_next_tag_cycles_through_tag_set() {
        let (_dir, conn) = test_db();
        let mut app = AppState::load(conn).unwrap();
        app.tags = vec!["Rent".into(), "Meals".into()];
        assert_eq!(app.next_tag(UNCATEGORIZED), "Rent");
        assert_eq!(app.next_tag("Rent"), "Meals");
        assert_eq!(app.next_tag("Meals"), UNCATEGORIZED);
        assert_eq!(app.next_tag("gone"), UNCATEGORIZED);
    }

    #[test]
    fn test_checksum_is_stable_hex() {
        let sum = statement_checksum(b"%PDF-1.4");
        assert_eq!(sum.len(), 64);
        assert_eq!(sum, statement_checksum(b"%PDF-1.4"));
    }
}
