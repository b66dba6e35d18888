//! Helpers for reading loosely-typed FHIR JSON.

use serde_json::Value;
use std::collections::BTreeSet;

/// `"<given...> <family>"` from the first `name` entry, or `"Unknown"`
pub fn human_name(resource: &Value) -> String {
    let Some(name) = resource
        .get("name")
        .and_then(Value::as_array)
        .and_then(|names| names.first())
    else {
        return "Unknown".to_string();
    };

    let given = name
        .get("given")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default();
    let family = name.get("family").and_then(Value::as_str).unwrap_or("");

    format!("{given} {family}").trim().to_string()
}

fn field_or_placeholder(resource: &Value, field: &str) -> String {
    match resource.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "?".to_string(),
        Some(other) => other.to_string(),
    }
}

/// One-line patient summary: `🆔 id | name | DOB date | gender`
pub fn patient_summary(patient: &Value) -> String {
    format!(
        "🆔 {} | {} | DOB {} | {}",
        field_or_placeholder(patient, "id"),
        human_name(patient),
        field_or_placeholder(patient, "birthDate"),
        field_or_placeholder(patient, "gender"),
    )
}

pub fn is_operation_outcome(value: &Value) -> bool {
    value.get("resourceType").and_then(Value::as_str) == Some("OperationOutcome")
}

/// Text of the first issue when `value` is an `OperationOutcome`
pub fn outcome_text(value: &Value) -> Option<String> {
    if !is_operation_outcome(value) {
        return None;
    }
    let text = value
        .pointer("/issue/0/details/text")
        .or_else(|| value.pointer("/issue/0/diagnostics"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown error");
    Some(text.to_string())
}

/// Entries of a search `Bundle`; anything else has none
pub fn bundle_entries(bundle: &Value) -> &[Value] {
    if bundle.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        return &[];
    }
    bundle
        .get("entry")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// `resource` members of every bundle entry
pub fn bundle_resources(bundle: &Value) -> Vec<Value> {
    bundle_entries(bundle)
        .iter()
        .filter_map(|entry| entry.get("resource").cloned())
        .collect()
}

/// Sorted, de-duplicated patient ids referenced by `Condition.subject`
pub fn patient_ids_from_conditions(bundle: &Value) -> Vec<String> {
    bundle_entries(bundle)
        .iter()
        .filter_map(|entry| entry.pointer("/resource/subject/reference"))
        .filter_map(Value::as_str)
        .filter_map(|reference| reference.rsplit('/').next())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
