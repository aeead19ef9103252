//! Result normalizer
//!
//! Relays serve every field as a JSON string. This module coerces each field
//! to its canonical type independently: a field that fails coercion becomes
//! null and is reported as a [`CoercionIssue`], the rest of the record is kept.

use crate::record::PayloadRecord;
use serde_json::{Map, Value};
use std::fmt;

/// The type a field was expected to coerce to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Integer,
    Float,
    String,
    Object,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

/// A field whose raw value could not be coerced
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionIssue {
    pub field: &'static str,
    pub raw: String,
    pub expected: Expected,
}

impl fmt::Display for CoercionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' expected {}, got {}",
            self.field, self.expected, self.raw
        )
    }
}

/// A normalized record together with the issues met while coercing it
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub record: PayloadRecord,
    pub issues: Vec<CoercionIssue>,
}

/// Coerces a raw relay object into a [`PayloadRecord`] tagged with `relay`
///
/// When `queried_slot` is given the record is attributed to that slot, so it
/// always matches the unit that produced it. Without one (latest mode) the
/// record's own `slot` field is used.
///
/// # Returns
///
/// * `Ok(Normalized)` - The record, possibly with nulled fields
/// * `Err(CoercionIssue)` - No slot could be determined for the record
///
/// # Examples
///
/// ```
/// use relay_payloads::record::normalize;
/// use serde_json::json;
///
/// let raw = json!({"slot": "7", "gas_limit": "not-a-number", "num_tx": "12"});
/// let normalized = normalize(&raw, "relay-a", Some(7)).unwrap();
///
/// assert_eq!(normalized.record.gas_limit, None);
/// assert_eq!(normalized.record.num_tx, Some(12));
/// assert_eq!(normalized.issues.len(), 1);
/// ```
pub fn normalize(
    raw: &Value,
    relay: &str,
    queried_slot: Option<u64>,
) -> Result<Normalized, CoercionIssue> {
    let empty = Map::new();
    let mut issues = Vec::new();

    let fields = match raw.as_object() {
        Some(map) => map,
        None => {
            issues.push(CoercionIssue {
                field: "<record>",
                raw: raw.to_string(),
                expected: Expected::Object,
            });
            &empty
        }
    };

    let mut coercer = Coercer {
        fields,
        issues: &mut issues,
    };

    let own_slot = coercer.integer("slot");
    let slot = match (queried_slot, own_slot) {
        (Some(queried), Some(own)) if own != queried => {
            tracing::warn!(
                "Relay {} returned slot {} for a query on slot {}",
                relay,
                own,
                queried
            );
            queried
        }
        (Some(queried), _) => queried,
        (None, Some(own)) => own,
        (None, None) => {
            return Err(CoercionIssue {
                field: "slot",
                raw: fields
                    .get("slot")
                    .map(Value::to_string)
                    .unwrap_or_else(|| "null".to_string()),
                expected: Expected::Integer,
            });
        }
    };

    let record = PayloadRecord {
        slot,
        parent_hash: coercer.string("parent_hash"),
        block_hash: coercer.string("block_hash"),
        builder_pubkey: coercer.string("builder_pubkey"),
        proposer_pubkey: coercer.string("proposer_pubkey"),
        proposer_fee_recipient: coercer.string("proposer_fee_recipient"),
        gas_limit: coercer.integer("gas_limit"),
        gas_used: coercer.integer("gas_used"),
        value: coercer.float("value"),
        block_number: coercer.integer("block_number"),
        num_tx: coercer.integer("num_tx"),
        relay: relay.to_string(),
    };

    for issue in &issues {
        tracing::warn!("Slot {} from {}: {}", slot, relay, issue);
    }

    Ok(Normalized { record, issues })
}

struct Coercer<'a> {
    fields: &'a Map<String, Value>,
    issues: &'a mut Vec<CoercionIssue>,
}

impl<'a> Coercer<'a> {
    fn field(&self, name: &str) -> Option<&'a Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    fn reject(&mut self, field: &'static str, raw: &Value, expected: Expected) {
        self.issues.push(CoercionIssue {
            field,
            raw: raw.to_string(),
            expected,
        });
    }

    fn integer(&mut self, name: &'static str) -> Option<u64> {
        let raw = self.field(name)?;
        let parsed = match raw {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        if parsed.is_none() {
            self.reject(name, raw, Expected::Integer);
        }
        parsed
    }

    fn float(&mut self, name: &'static str) -> Option<f64> {
        let raw = self.field(name)?;
        let parsed = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite());
        if parsed.is_none() {
            self.reject(name, raw, Expected::Float);
        }
        parsed
    }

    fn string(&mut self, name: &'static str) -> Option<String> {
        let raw = self.field(name)?;
        match raw {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => {
                self.reject(name, raw, Expected::String);
                None
            }
        }
    }
}
