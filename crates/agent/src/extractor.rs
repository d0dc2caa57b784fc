use brokerdesk_core::QueryClassification;
use serde::Serialize;
use serde_json::Value;

const OPEN: &str = "<result>";
const CLOSE: &str = "</result>";

/// Classifications that may carry a structured list, and the payload field
/// the list is read from.
const STRUCTURED_FIELDS: &[(QueryClassification, &str)] = &[
    (QueryClassification::Leads, "contacts"),
    (QueryClassification::Oportunidades, "opportunities"),
    (QueryClassification::Ventas, "opportunities"),
];

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StructuredData {
    #[serde(rename = "type")]
    pub kind: QueryClassification,
    pub source_field: &'static str,
    pub items: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Extraction {
    pub clean_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<StructuredData>,
}

/// Post-processes the final model text. Never fails: anything malformed
/// degrades to the verbatim text and no structured data.
pub fn extract(
    raw_text: &str,
    classification: QueryClassification,
    raw_tool_payload: Option<&Value>,
) -> Extraction {
    let clean_text = result_block(raw_text).unwrap_or(raw_text).to_string();
    let structured_data = raw_tool_payload.and_then(|payload| structured(classification, payload));

    Extraction { clean_text, structured_data }
}

/// Inner text of the single `<result>` block, when there is exactly one and it
/// is well formed.
fn result_block(text: &str) -> Option<&str> {
    if text.matches(OPEN).count() != 1 || text.matches(CLOSE).count() != 1 {
        return None;
    }

    let start = text.find(OPEN)? + OPEN.len();
    let end = text.find(CLOSE)?;
    if end < start {
        return None;
    }

    Some(text[start..end].trim())
}

fn structured(classification: QueryClassification, payload: &Value) -> Option<StructuredData> {
    let (_, field) = STRUCTURED_FIELDS.iter().find(|(kind, _)| *kind == classification)?;
    let items = payload.get(*field)?.as_array()?;

    Some(StructuredData { kind: classification, source_field: *field, items: items.clone() })
}
