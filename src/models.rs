use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

pub const UNCATEGORIZED: &str = "Uncategorized";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Spent,
    Received,
}

impl Direction {
    /// Map a loosely-typed label onto a direction. Anything that is not
    /// "received" counts as money spent.
    pub fn coerce(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("received") {
            Self::Received
        } else {
            Self::Spent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spent => "Spent",
            Self::Received => "Received",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Self::Spent => Self::Received,
            Self::Received => Self::Spent,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expense sub-classification. Meaningless for received money.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryType {
    Personal,
    Office,
}

impl CategoryType {
    pub fn coerce(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("office") {
            Self::Office
        } else {
            Self::Personal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Office => "Office",
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            Self::Personal => Self::Office,
            Self::Office => Self::Personal,
        }
    }
}

impl fmt::Display for CategoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Approved,
}

impl Status {
    pub fn toggled(&self) -> Self {
        match self {
            Self::Pending => Self::Approved,
            Self::Approved => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: String,
    pub bank_name: String,
    pub description: String,
    pub amount: f64,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub category: CategoryType,
    pub status: Status,
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_tag() -> String {
    UNCATEGORIZED.to_string()
}

impl Transaction {
    pub fn is_approved(&self) -> bool {
        self.status == Status::Approved
    }

    /// Month bucket (`YYYY-MM`) derived from the ISO date.
    pub fn month(&self) -> &str {
        self.date.get(..7).unwrap_or(&self.date)
    }

    /// The tag used for grouping; an empty tag falls back to "Uncategorized".
    /// Tags are compared exactly as stored.
    pub fn tag_or_default(&self) -> &str {
        if self.tag.is_empty() {
            UNCATEGORIZED
        } else {
            &self.tag
        }
    }
}

pub fn new_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Generate an id that does not appear in `taken`.
pub fn unique_id(taken: &HashSet<String>) -> String {
    loop {
        let id = new_id();
        if !taken.contains(&id) {
            return id;
        }
    }
}

/// Append records to `list`, re-keying any record whose id is already present.
pub fn append_unique(list: &mut Vec<Transaction>, incoming: impl IntoIterator<Item = Transaction>) {
    let mut taken: HashSet<String> = list.iter().map(|t| t.id.clone()).collect();
    for mut txn in incoming {
        if taken.contains(&txn.id) {
            txn.id = unique_id(&taken);
        }
        taken.insert(txn.id.clone());
        list.push(txn);
    }
}

pub fn is_iso_date(raw: &str) -> bool {
    raw.len() == 10 && chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// Parse an amount that may arrive as a JSON number or a formatted string.
/// The sign is dropped; direction carries it.
pub fn coerce_amount(value: &serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s
            .trim()
            .replace([',', '$', '₹'], "")
            .parse::<f64>()
            .unwrap_or(0.0),
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed.abs()
    } else {
        0.0
    }
}

#[cfg(test)]
pub(crate) fn sample(id: &str, date: &str, amount: f64, direction: Direction) -> Transaction {
    Transaction {
        id: id.to_string(),
        date: date.to_string(),
        bank_name: "HDFC Bank".to_string(),
        description: format!("txn {id}"),
        amount,
        direction,
        category: CategoryType::Personal,
        status: Status::Approved,
        tag: UNCATEGORIZED.to_string(),
    }
}
