use std::collections::HashSet;
use std::path::Path;

use base64::Engine as _;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::error::{ExtractionError, FinError, Result};
use crate::models::{
    coerce_amount, unique_id, CategoryType, Direction, Status, Transaction, UNCATEGORIZED,
};
use crate::settings::Settings;

const PDF_MAGIC: &[u8] = b"%PDF-";

const PROMPT: &str = "\
Analyze this financial statement and extract all transactions.
For each transaction, determine:
- date: YYYY-MM-DD
- bankName: The name of the bank or institution
- description: Merchant name or transaction detail
- amount: The numerical value (always positive)
- direction: \"Spent\" for withdrawals/purchases or \"Received\" for deposits/credits
- type: \"Personal\" or \"Office\" based on description (e.g., AWS, LinkedIn, Staples are Office; Starbucks, Rent, Grocery are Personal)

Return a valid JSON array of objects.";

const REQUIRED_FIELDS: &[&str] = &["date", "bankName", "description", "amount", "direction", "type"];

// ---------------------------------------------------------------------------
// Statement files
// ---------------------------------------------------------------------------

/// Read a statement from disk and make sure it is a PDF.
pub fn read_statement(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)
        .map_err(|e| FinError::FileRead(format!("{}: {e}", path.display())))?;
    ensure_pdf(path, &bytes)?;
    Ok(bytes)
}

pub fn ensure_pdf(path: &Path, bytes: &[u8]) -> Result<()> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Err(FinError::FileTypeRejected(format!("{name} is not a PDF file")))
}

// ---------------------------------------------------------------------------
// Request / reply shapes
// ---------------------------------------------------------------------------

pub fn build_request(pdf: &[u8]) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(pdf);
    let string = json!({ "type": "STRING" });
    json!({
        "contents": [{
            "parts": [
                { "inline_data": { "mime_type": "application/pdf", "data": data } },
                { "text": PROMPT }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "date": string,
                        "bankName": string,
                        "description": string,
                        "amount": { "type": "NUMBER" },
                        "direction": string,
                        "type": string
                    },
                    "required": REQUIRED_FIELDS
                }
            }
        }
    })
}

/// Concatenate the text parts of the first candidate.
pub fn reply_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let re = Regex::new(r"(?s)^\s*```(?:json|JSON)?\s*(.*?)\s*```\s*$").expect("valid regex");
    match re.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

fn string_field(item: &serde_json::Map<String, Value>, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Turn the service's loosely-typed reply into pending records.
pub fn parse_extraction_reply(text: &str) -> std::result::Result<Vec<Transaction>, ExtractionError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(ExtractionError::EmptyResponse);
    }
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| ExtractionError::MalformedJson(e.to_string()))?;
    let Value::Array(items) = parsed else {
        return Err(ExtractionError::MalformedJson(
            "expected a JSON array of transactions".to_string(),
        ));
    };

    let mut taken = HashSet::new();
    let mut records = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let Some(obj) = item.as_object() else {
            tracing::warn!(idx, "skipping non-object item in extraction reply");
            continue;
        };
        let id = unique_id(&taken);
        taken.insert(id.clone());
        records.push(Transaction {
            id,
            date: string_field(obj, "date"),
            bank_name: string_field(obj, "bankName"),
            description: string_field(obj, "description"),
            amount: obj.get("amount").map(coerce_amount).unwrap_or(0.0),
            direction: Direction::coerce(&string_field(obj, "direction")),
            category: CategoryType::coerce(&string_field(obj, "type")),
            status: Status::Pending,
            tag: UNCATEGORIZED.to_string(),
        });
    }
    Ok(records)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn from_settings(settings: &Settings, api_key: Option<String>) -> std::result::Result<Self, ExtractionError> {
        let api_key = api_key.ok_or_else(|| {
            ExtractionError::Auth("set GEMINI_API_KEY (or API_KEY) in the environment".to_string())
        })?;
        Ok(Self {
            api_key,
            model: settings.model.clone(),
            base_url: settings.api_base_url.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> std::result::Result<Self, ExtractionError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ExtractionError::Network(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// One extraction attempt. No retries.
    pub fn extract_transactions(&self, pdf: &[u8]) -> std::result::Result<Vec<Transaction>, ExtractionError> {
        let endpoint = self.config.endpoint();
        tracing::info!(model = %self.config.model, bytes = pdf.len(), "requesting extraction");

        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&build_request(pdf))
            .send()
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ExtractionError::Network(e.to_string()))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExtractionError::Auth(error_message(&body)));
        }
        if !status.is_success() {
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let reply: Value =
            serde_json::from_str(&body).map_err(|e| ExtractionError::MalformedJson(e.to_string()))?;
        let text = reply_text(&reply).ok_or(ExtractionError::EmptyResponse)?;
        let records = parse_extraction_reply(&text)?;
        tracing::info!(count = records.len(), "extraction finished");
        Ok(records)
    }
}

/// Turns statement bytes into pending records.
pub trait StatementExtractor {
    fn extract(&self, pdf: &[u8]) -> std::result::Result<Vec<Transaction>, ExtractionError>;
}

impl StatementExtractor for GeminiClient {
    fn extract(&self, pdf: &[u8]) -> std::result::Result<Vec<Transaction>, ExtractionError> {
        self.extract_transactions(pdf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_direction_coerces_to_spent() {
        let text = r#"[{"date":"2024-01-05","bankName":"HDFC","description":"Cafe",
            "amount":120.5,"direction":"Unknown","type":"Personal"}]"#;
        let records = parse_extraction_reply(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].direction, Direction::Spent);
        assert_eq!(records[0].status, Status::Pending);
        assert_eq!(records[0].tag, UNCATEGORIZED);
    }

    #[test]
    fn test_fields_are_coerced() {
        let text = r#"[
            {"date":"2024-01-10","bankName":"ICICI","description":"Salary",
             "amount":"-50,000.00","direction":"Received","type":"Office"},
            {"date":"2024-01-11","description":"Mystery","amount":null,"type":"weird"}
        ]"#;
        let records = parse_extraction_reply(text).unwrap();
        assert_eq!(records[0].amount, 50000.0);
        assert_eq!(records[0].direction, Direction::Received);
        assert_eq!(records[0].category, CategoryType::Office);
        assert_eq!(records[1].bank_name, "");
        assert_eq!(records[1].amount, 0.0);
        assert_eq!(records[1].direction, Direction::Spent);
        assert_eq!(records[1].category, CategoryType::Personal);
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn test_code_fences_are_stripped() {
        let text = "```json\n[{\"date\":\"2024-02-01\",\"amount\":1}]\n```";
        let records = parse_extraction_reply(text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, "2024-02-01");
    }

    #[test]
    fn test_non_object_items_are_skipped() {
        let records = parse_extraction_reply(r#"[1, "two", {"amount": 3}]"#).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, 3.0);
    }

    #[test]
    fn test_empty_and_malformed_replies() {
        assert_eq!(parse_extraction_reply("   "), Err(ExtractionError::EmptyResponse));
        assert!(matches!(
            parse_extraction_reply("not json"),
            Err(ExtractionError::MalformedJson(_))
        ));
        assert!(matches!(
            parse_extraction_reply(r#"{"date":"2024-01-01"}"#),
            Err(ExtractionError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_reply_text_joins_parts() {
        let reply = json!({
            "candidates": [{ "content": { "parts": [{ "text": "[{\"amount\"" }, { "text": ":1}]" }] } }]
        });
        assert_eq!(reply_text(&reply).as_deref(), Some("[{\"amount\":1}]"));
        assert_eq!(reply_text(&json!({ "candidates": [] })), None);
        assert_eq!(reply_text(&json!({ "promptFeedback": { "blockReason": "SAFETY" } })), None);
    }

    #[test]
    fn test_build_request_embeds_pdf_and_schema() {
        let req = build_request(b"%PDF-1.4");
        let inline = &req["contents"][0]["parts"][0]["inline_data"];
        assert_eq!(inline["mime_type"], "application/pdf");
        assert_eq!(inline["data"], "JVBERi0xLjQ=");
        let schema = &req["generationConfig"]["responseSchema"];
        assert_eq!(schema["type"], "ARRAY");
        assert_eq!(schema["items"]["required"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn test_ensure_pdf_rejects_other_files() {
        assert!(ensure_pdf(Path::new("s.pdf"), b"%PDF-1.7 ...").is_ok());
        let err = ensure_pdf(Path::new("s.csv"), b"Date,Amount").unwrap_err();
        assert!(matches!(err, FinError::FileTypeRejected(_)));
    }

    #[test]
    fn test_missing_api_key_is_auth_error() {
        let err = GeminiConfig::from_settings(&Settings::default(), None).unwrap_err();
        assert!(matches!(err, ExtractionError::Auth(_)));
    }

    #[test]
    fn test_endpoint_includes_model() {
        let mut settings = Settings::default();
        settings.api_base_url = "http://localhost:8080/".to_string();
        let config = GeminiConfig::from_settings(&settings, Some("k".into())).unwrap();
        assert_eq!(
            config.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }
}
