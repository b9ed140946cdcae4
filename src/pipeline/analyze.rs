//! Analysis stage: named-entity recognition and claim field structuring.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Processor;
use super::service::{DocumentServiceClient, ServiceEndpoints};
use crate::domain::{ActionResult, ClaimState, DocumentStage, FieldValue, StageData};
use crate::error::Result;

/// One recognized entity from the NER service.
///
/// Accepts both the service's native `label`/`text` shape and the
/// `entity_group`/`word` shape emitted by token-classification models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(alias = "entity_group")]
    pub label: String,
    #[serde(alias = "word")]
    pub text: String,
    #[serde(default)]
    pub score: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct NerReply {
    #[serde(default)]
    entities: Vec<Entity>,
}

/// Runs NER and summarization over the extracted text and structures the
/// recognized entities into typed claim fields.
pub struct AnalyzeProcessor {
    service: Arc<DocumentServiceClient>,
    endpoints: ServiceEndpoints,
}

impl AnalyzeProcessor {
    pub fn new(service: Arc<DocumentServiceClient>, endpoints: ServiceEndpoints) -> Self {
        Self { service, endpoints }
    }
}

#[async_trait]
impl Processor for AnalyzeProcessor {
    async fn execute(&self, state: &ClaimState, _input: &Value) -> Result<ActionResult> {
        let docs = state.documents_at(DocumentStage::Extracted);
        if docs.is_empty() {
            return Ok(ActionResult::fail("no extracted text to analyze"));
        }

        let mut texts = Vec::with_capacity(docs.len());
        for doc in &docs {
            texts.push(tokio::fs::read_to_string(&doc.path).await?);
        }

        let (ner_replies, summaries) = futures::try_join!(
            self.service.post_texts(&self.endpoints.ner, &texts, &[]),
            self.service.post_texts(&self.endpoints.summarize, &texts, &[]),
        )?;

        let entities: Vec<Entity> = ner_replies.iter().flat_map(entities_of).collect();
        let fields = structure_fields(&entities);

        let structured = fields.len();
        let mut payload = StageData { fields, ..Default::default() }.into_value()?;
        payload["entities_recognized"] = Value::from(entities.len());
        payload["fields_structured"] = Value::from(structured);
        payload["summaries"] = Value::Array(summaries);

        Ok(ActionResult::ok(payload))
    }
}

fn entities_of(reply: &Value) -> Vec<Entity> {
    serde_json::from_value::<NerReply>(reply.clone())
        .map(|r| r.entities)
        .unwrap_or_default()
}

/// Map recognized entities onto the typed claim fields.
///
/// Singleton fields (patient, provider, policy, amount, date) take the last
/// entity seen; diagnosis and procedure mentions accumulate. Amounts and
/// dates are parsed into their typed forms where the text allows, and kept
/// as text otherwise so nothing recognized is dropped.
pub fn structure_fields(entities: &[Entity]) -> BTreeMap<String, FieldValue> {
    let mut fields = BTreeMap::new();
    let mut diagnoses: Vec<String> = Vec::new();
    let mut procedures: Vec<String> = Vec::new();

    for entity in entities {
        let label = entity.label.to_ascii_uppercase();
        let text = entity.text.trim();
        if text.is_empty() {
            continue;
        }

        if label.contains("PATIENT") {
            fields.insert("patient_name".to_string(), FieldValue::text(text));
        } else if label.contains("PROVIDER") || label.contains("HOSPITAL") {
            fields.insert("provider_name".to_string(), FieldValue::text(text));
        } else if label.contains("POLICY") {
            fields.insert("policy_number".to_string(), FieldValue::text(text));
        } else if label.contains("DIAGNOSIS") {
            if !diagnoses.iter().any(|d| d == text) {
                diagnoses.push(text.to_string());
            }
        } else if label.contains("PROCEDURE") {
            if !procedures.iter().any(|p| p == text) {
                procedures.push(text.to_string());
            }
        } else if label.contains("AMOUNT") || label.contains("COST") {
            let value = parse_money(text).unwrap_or_else(|| FieldValue::text(text));
            fields.insert("amount_total".to_string(), value);
        } else if label.contains("DATE") {
            let value = parse_claim_date(text)
                .map(FieldValue::date)
                .unwrap_or_else(|| FieldValue::text(text));
            fields.insert("claim_date".to_string(), value);
        }
    }

    if !diagnoses.is_empty() {
        fields.insert("diagnosis".to_string(), FieldValue::text(diagnoses.join("; ")));
    }
    if !procedures.is_empty() {
        fields.insert("procedures".to_string(), FieldValue::text(procedures.join("; ")));
    }

    fields
}

/// Parse an amount mention into minor units with a recognized currency.
/// Returns `None` unless both an amount and a currency are clearly present.
fn parse_money(text: &str) -> Option<FieldValue> {
    let currency = detect_currency(text)?;
    let minor_units = normalize_amount(text)?;
    Some(FieldValue::money(minor_units, currency))
}

fn detect_currency(text: &str) -> Option<&'static str> {
    if text.contains('€') {
        return Some("EUR");
    }
    if text.contains('$') {
        return Some("USD");
    }
    if text.contains('£') {
        return Some("GBP");
    }
    ["EUR", "USD", "GBP", "CHF"].into_iter().find(|code| text.contains(code))
}

/// Normalize `1,234.56` / `1.234,56` / `45` style amounts to minor units.
fn normalize_amount(text: &str) -> Option<i64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    // When both separators appear the rightmost one is decimal; a lone
    // separator is decimal only when at most two digits follow it.
    let decimal_at = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) => Some(dot.max(comma)),
        (Some(sep), None) | (None, Some(sep)) => (cleaned.len() - sep <= 3).then_some(sep),
        (None, None) => None,
    };

    let (int_text, frac_text) = match decimal_at {
        Some(sep) => (&cleaned[..sep], &cleaned[sep + 1..]),
        None => (cleaned.as_str(), ""),
    };

    let int_digits: String = int_text.chars().filter(char::is_ascii_digit).collect();
    if int_digits.is_empty() {
        return None;
    }
    let whole: i64 = int_digits.parse().ok()?;

    let frac_digits: String = frac_text.chars().filter(char::is_ascii_digit).collect();
    let cents: i64 = format!("{:0<2}", frac_digits.chars().take(2).collect::<String>())
        .parse()
        .ok()?;

    Some(whole.checked_mul(100)?.checked_add(cents)?)
}

/// Parse a date mention, trying the formats claim documents actually use.
fn parse_claim_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for format in ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    None
}
