//! One-way delivery to the spreadsheet web-hook, plus the read path used to
//! reload history from it.
//!
//! The web-hook never reports whether it accepted a batch. A successful send
//! only means the request left this machine, so the only success value is
//! [`Sent`].

use std::collections::HashSet;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::error::{FinError, Result};
use crate::models::{
    coerce_amount, unique_id, CategoryType, Direction, Status, Transaction, UNCATEGORIZED,
};

/// A request was handed to the network. Remote acceptance is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sent {
    pub count: usize,
}

pub trait BatchSink {
    fn send_batch(&self, batch: &[Transaction]) -> Result<Sent>;
}

/// Row shape appended to the sheet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRow<'a> {
    pub date: &'a str,
    pub bank_name: &'a str,
    pub description: &'a str,
    pub amount: f64,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub category: CategoryType,
    pub tag: &'a str,
}

impl<'a> From<&'a Transaction> for SheetRow<'a> {
    fn from(t: &'a Transaction) -> Self {
        Self {
            date: &t.date,
            bank_name: &t.bank_name,
            description: &t.description,
            amount: t.amount,
            direction: t.direction,
            category: t.category,
            tag: &t.tag,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigUpdate<'a> {
    is_config_update: bool,
    tags: &'a [String],
    banks: &'a [String],
}

pub fn validate_endpoint(url: &str) -> Result<Url> {
    let invalid = |reason: &str| FinError::InvalidEndpoint {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(parsed)
}

// ---------------------------------------------------------------------------
// Remote payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Default, PartialEq)]
pub struct RemoteSnapshot {
    pub transactions: Vec<Transaction>,
    pub tags: Option<Vec<String>>,
    pub banks: Option<Vec<String>>,
}

fn text_field(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn remote_records(items: &[Value]) -> Vec<Transaction> {
    let mut taken = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let Some(obj) = item.as_object() else {
            tracing::warn!("skipping non-object row in remote payload");
            continue;
        };
        let id = unique_id(&taken);
        taken.insert(id.clone());
        let tag = text_field(obj, "tag");
        records.push(Transaction {
            id,
            date: text_field(obj, "date"),
            bank_name: text_field(obj, "bankName"),
            description: text_field(obj, "description"),
            amount: obj.get("amount").map(coerce_amount).unwrap_or(0.0),
            direction: Direction::coerce(&text_field(obj, "direction")),
            category: CategoryType::coerce(&text_field(obj, "type")),
            status: Status::Approved,
            tag: if tag.is_empty() { UNCATEGORIZED.to_string() } else { tag },
        });
    }
    records
}

/// Accepts `{transactions: [...], config: {tags, banks}}` or a bare array.
pub fn parse_remote_payload(body: &str) -> Result<RemoteSnapshot> {
    let parsed: Value = serde_json::from_str(body.trim())?;
    match parsed {
        Value::Array(items) => Ok(RemoteSnapshot {
            transactions: remote_records(&items),
            ..Default::default()
        }),
        Value::Object(obj) => {
            let transactions = obj
                .get("transactions")
                .and_then(Value::as_array)
                .map(|items| remote_records(items))
                .unwrap_or_default();
            let config = obj.get("config");
            Ok(RemoteSnapshot {
                transactions,
                tags: string_list(config.and_then(|c| c.get("tags"))),
                banks: string_list(config.and_then(|c| c.get("banks"))),
            })
        }
        _ => Err(FinError::Other(
            "remote payload must be a JSON object or array".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct SheetClient {
    http: Client,
    url: Url,
}

impl SheetClient {
    pub fn new(url: &str) -> Result<Self> {
        let url = validate_endpoint(url)?;
        let http = Client::builder()
            .build()
            .map_err(|e| FinError::SyncTransport(e.to_string()))?;
        Ok(Self { http, url })
    }

    /// Post a body and discard whatever comes back.
    fn post_unobserved(&self, body: String) -> Result<()> {
        self.http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .map_err(|e| FinError::SyncTransport(e.to_string()))?;
        Ok(())
    }

    pub fn push_config(&self, tags: &[String], banks: &[String]) -> Result<Sent> {
        let body = serde_json::to_string(&ConfigUpdate {
            is_config_update: true,
            tags,
            banks,
        })?;
        self.post_unobserved(body)?;
        tracing::info!(tags = tags.len(), banks = banks.len(), "configuration pushed");
        Ok(Sent {
            count: tags.len() + banks.len(),
        })
    }

    pub fn fetch_remote(&self) -> Result<RemoteSnapshot> {
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .map_err(|e| FinError::SyncTransport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FinError::SyncTransport(format!("remote returned {status}")));
        }
        let body = response
            .text()
            .map_err(|e| FinError::SyncTransport(e.to_string()))?;
        let snapshot = parse_remote_payload(&body)?;
        tracing::info!(count = snapshot.transactions.len(), "remote snapshot loaded");
        Ok(snapshot)
    }
}

impl BatchSink for SheetClient {
    fn send_batch(&self, batch: &[Transaction]) -> Result<Sent> {
        let rows: Vec<SheetRow> = batch.iter().map(SheetRow::from).collect();
        self.post_unobserved(serde_json::to_string(&rows)?)?;
        tracing::info!(count = batch.len(), "batch sent");
        Ok(Sent { count: batch.len() })
    }
}
