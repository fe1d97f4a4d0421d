use crate::error::{FinError, Result};
use crate::models::{append_unique, is_iso_date, CategoryType, Direction, Status, Transaction};
use crate::sync::{BatchSink, Sent};

/// A single-field change to a record in the working set.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Date(String),
    BankName(String),
    Description(String),
    Amount(f64),
    Direction(Direction),
    Type(CategoryType),
    Tag(String),
}

/// Records extracted from the current statement that have not been synced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    records: Vec<Transaction>,
}

impl WorkingSet {
    pub fn new(records: Vec<Transaction>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Transaction] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.records.iter().find(|t| t.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.records
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| FinError::UnknownTransaction(id.to_string()))
    }

    pub fn toggle(&mut self, id: &str) -> Result<Status> {
        let idx = self.position(id)?;
        let txn = &mut self.records[idx];
        txn.status = txn.status.toggled();
        Ok(txn.status)
    }

    pub fn set_status(&mut self, id: &str, status: Status) -> Result<()> {
        let idx = self.position(id)?;
        self.records[idx].status = status;
        Ok(())
    }

    /// True when every record is approved. Vacuously true when empty.
    pub fn all_approved(&self) -> bool {
        self.records.iter().all(Transaction::is_approved)
    }

    /// Select all / deselect all: flips every record to the opposite of the
    /// current all-approved state. Returns the status applied.
    pub fn toggle_all(&mut self) -> Status {
        let status = if self.all_approved() {
            Status::Pending
        } else {
            Status::Approved
        };
        for txn in &mut self.records {
            txn.status = status;
        }
        status
    }

    pub fn approved(&self) -> Vec<&Transaction> {
        self.records.iter().filter(|t| t.is_approved()).collect()
    }

    pub fn approved_count(&self) -> usize {
        self.records.iter().filter(|t| t.is_approved()).count()
    }

    pub fn edit(&mut self, id: &str, edit: FieldEdit) -> Result<()> {
        let idx = self.position(id)?;
        let txn = &mut self.records[idx];
        match edit {
            FieldEdit::Date(date) => {
                let date = date.trim().to_string();
                if !is_iso_date(&date) {
                    return Err(FinError::InvalidEdit(format!(
                        "date must be YYYY-MM-DD, got '{date}'"
                    )));
                }
                txn.date = date;
            }
            FieldEdit::BankName(name) => txn.bank_name = name.trim().to_string(),
            FieldEdit::Description(desc) => txn.description = desc.trim().to_string(),
            FieldEdit::Amount(amount) => {
                if !amount.is_finite() || amount < 0.0 {
                    return Err(FinError::InvalidEdit(format!(
                        "amount must be a non-negative number, got {amount}"
                    )));
                }
                txn.amount = amount;
            }
            FieldEdit::Direction(direction) => txn.direction = direction,
            FieldEdit::Type(category) => txn.category = category,
            FieldEdit::Tag(tag) => txn.tag = tag.trim().to_string(),
        }
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<Transaction> {
        let idx = self.position(id)?;
        Ok(self.records.remove(idx))
    }

    fn remove_approved(&mut self) -> Vec<Transaction> {
        let (approved, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.records)
                .into_iter()
                .partition(Transaction::is_approved);
        self.records = pending;
        approved
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing was approved; no request was made and nothing changed.
    NothingApproved,
    Sent(Sent),
}

/// Send every approved record in one batch. Once the request has gone out the
/// batch moves from the working set into history, without waiting for the
/// remote to confirm anything. A transport failure leaves both lists as they
/// were.
pub fn dispatch_approved(
    working_set: &mut WorkingSet,
    history: &mut Vec<Transaction>,
    sink: &dyn BatchSink,
) -> Result<Dispatch> {
    let batch: Vec<Transaction> = working_set.approved().into_iter().cloned().collect();
    if batch.is_empty() {
        return Ok(Dispatch::NothingApproved);
    }
    let sent = sink.send_batch(&batch)?;
    let moved = working_set.remove_approved();
    append_unique(history, moved);
    Ok(Dispatch::Sent(sent))
}
