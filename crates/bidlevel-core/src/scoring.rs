//! Oracle payloads as the reconciler sees them.
//!
//! Every field is optional and loosely typed: indexes and prices may arrive as
//! numbers or strings, lists may arrive as a single string. Nothing here fails on
//! shape; unusable values become `None` or empty.

use serde::Deserialize;
use serde_json::Value;

use crate::model::{Qualifications, ScopeStatus, UnmappedItem};
use crate::text::parse_money;

/// Aggregation pass answer: `{scope_items: [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawProposal {
    #[serde(alias = "items", deserialize_with = "loose_strings")]
    pub scope_items: Vec<String>,
}

/// One item from a scoring answer, before it is pinned to a candidate.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawItem {
    #[serde(alias = "index", alias = "candidate")]
    pub candidate_index: Value,
    #[serde(alias = "scope_item", alias = "item", alias = "candidate_scope_item")]
    pub name: Option<String>,
    pub status: Option<String>,
    pub price: Value,
    #[serde(deserialize_with = "loose_string")]
    pub evidence: String,
}

impl RawItem {
    /// One-based index as sent to the oracle, if it is a usable number.
    pub fn one_based_index(&self) -> Option<usize> {
        match &self.candidate_index {
            Value::Number(n) => n.as_u64().map(|n| n as usize).or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as usize)
            }),
            Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
            _ => None,
        }
    }

    pub fn status(&self) -> ScopeStatus {
        self.status
            .as_deref()
            .map(ScopeStatus::from_loose)
            .unwrap_or_default()
    }

    pub fn price(&self) -> Option<f64> {
        match &self.price {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_money(s),
            _ => None,
        }
        .filter(|p| p.is_finite())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawQualifications {
    #[serde(alias = "inclusions", deserialize_with = "loose_strings")]
    pub includes: Vec<String>,
    #[serde(alias = "exclusions", deserialize_with = "loose_strings")]
    pub excludes: Vec<String>,
    #[serde(deserialize_with = "loose_strings")]
    pub allowances: Vec<String>,
    #[serde(deserialize_with = "loose_strings")]
    pub alternates: Vec<String>,
    #[serde(deserialize_with = "loose_strings")]
    pub payment_terms: Vec<String>,
    #[serde(alias = "notes", deserialize_with = "loose_strings")]
    pub fine_print: Vec<String>,
}

impl From<RawQualifications> for Qualifications {
    fn from(raw: RawQualifications) -> Self {
        let mut q = Qualifications::default();
        q.absorb(&Qualifications {
            includes: raw.includes,
            excludes: raw.excludes,
            allowances: raw.allowances,
            alternates: raw.alternates,
            payment_terms: raw.payment_terms,
            fine_print: raw.fine_print,
        });
        q
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawUnmapped {
    #[serde(alias = "item", alias = "scope_item")]
    pub name: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub evidence: String,
}

/// Scoring pass answer: `{items, qualifications, total, unmapped}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawScoring {
    #[serde(alias = "scored_items", deserialize_with = "loose_items")]
    pub items: Vec<RawItem>,
    #[serde(deserialize_with = "loose_qualifications")]
    pub qualifications: RawQualifications,
    #[serde(alias = "bid_total", alias = "total_price")]
    pub total: Value,
    #[serde(deserialize_with = "loose_unmapped")]
    pub unmapped: Vec<RawUnmapped>,
}

impl RawScoring {
    /// Best-effort decode of a JSON value. Non-objects yield the empty default.
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }

    pub fn total(&self) -> Option<f64> {
        match &self.total {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_money(s),
            _ => None,
        }
        .filter(|t| t.is_finite())
    }

    pub fn unmapped_items(&self) -> Vec<UnmappedItem> {
        self.unmapped
            .iter()
            .filter_map(|u| {
                let name = u.name.as_deref()?.trim();
                (!name.is_empty()).then(|| UnmappedItem {
                    name: name.to_string(),
                    evidence: u.evidence.clone(),
                })
            })
            .collect()
    }
}

impl RawProposal {
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// One contractor's scoring answer, tagged with who it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractorScoring {
    pub contractor_id: String,
    pub name: String,
    pub raw: RawScoring,
}

// ── Loose deserializers ──

fn loose_string<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    })
}

fn loose_strings<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(strings_from(Value::deserialize(d)?))
}

fn strings_from(value: Value) -> Vec<String> {
    match value {
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s.trim().to_string()],
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                Value::Object(map) => map
                    .get("name")
                    .or_else(|| map.get("description"))
                    .or_else(|| map.get("text"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn loose_items<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<RawItem>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn loose_unmapped<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Vec<RawUnmapped>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(name) => Some(RawUnmapped {
                    name: Some(name),
                    evidence: String::new(),
                }),
                other => serde_json::from_value(other).ok(),
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn loose_qualifications<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> Result<RawQualifications, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_answer_decodes() {
        let raw = RawScoring::from_value(json!({
            "items": [
                {"candidate_index": 1, "name": "Ductwork", "status": "included", "price": 12000, "evidence": "Install ductwork"},
                {"candidate_index": "2", "status": "Excluded", "price": "$4,200.00", "evidence": ["by", "others"]}
            ],
            "qualifications": {"inclusions": ["Permits"], "excludes": "Asbestos", "allowances": []},
            "total": "$482,000",
            "unmapped": [{"name": "Temporary heat", "evidence": "p.3"}, "Bonds"]
        }));
        assert_eq!(raw.items.len(), 2);
        assert_eq!(raw.items[0].one_based_index(), Some(1));
        assert_eq!(raw.items[0].status(), ScopeStatus::Included);
        assert_eq!(raw.items[0].price(), Some(12000.0));
        assert_eq!(raw.items[1].one_based_index(), Some(2));
        assert_eq!(raw.items[1].status(), ScopeStatus::Excluded);
        assert_eq!(raw.items[1].price(), Some(4200.0));
        assert_eq!(raw.items[1].evidence, "by others");
        assert_eq!(raw.qualifications.includes, vec!["Permits"]);
        assert_eq!(raw.qualifications.excludes, vec!["Asbestos"]);
        assert_eq!(raw.total(), Some(482000.0));
        let unmapped = raw.unmapped_items();
        assert_eq!(unmapped.len(), 2);
        assert_eq!(unmapped[1].name, "Bonds");
    }

    #[test]
    fn missing_and_wrong_fields_default() {
        let raw = RawScoring::from_value(json!({"items": "nope", "qualifications": 3, "total": null}));
        assert!(raw.items.is_empty());
        assert_eq!(raw.qualifications, RawQualifications::default());
        assert_eq!(raw.total(), None);

        assert_eq!(RawScoring::from_value(json!([1, 2, 3])), RawScoring::default());
    }

    #[test]
    fn bad_items_skipped_not_fatal() {
        let raw = RawScoring::from_value(json!({"items": [42, {"name": "Controls"}]}));
        assert_eq!(raw.items.len(), 1);
        assert_eq!(raw.items[0].status(), ScopeStatus::NotSpecified);
        assert_eq!(raw.items[0].one_based_index(), None);
    }

    #[test]
    fn proposal_accepts_items_alias() {
        let p = RawProposal::from_value(json!({"items": ["Ductwork", " ", "Controls"]}));
        assert_eq!(p.scope_items, vec!["Ductwork", "Controls"]);
    }
}
