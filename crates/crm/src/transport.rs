use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("event stream carried no data line")]
    MissingDataLine,
    #[error("response body is not valid JSON: {0}")]
    Json(String),
    #[error("CRM RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Wire format of a CRM response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireEncoding {
    Json,
    EventStream,
}

impl WireEncoding {
    pub fn detect(content_type: Option<&str>, body: &str) -> Self {
        let declared = content_type
            .map(|value| value.to_ascii_lowercase().contains("text/event-stream"))
            .unwrap_or(false);
        let framed = body
            .trim_start()
            .lines()
            .next()
            .map(|line| line.starts_with("event:") || line.starts_with("data:"))
            .unwrap_or(false);

        if declared || framed {
            Self::EventStream
        } else {
            Self::Json
        }
    }
}

/// Normalizes one CRM response body into a payload value, whatever its
/// encoding. JSON-RPC envelopes are unwrapped; plain REST bodies are returned
/// as parsed. An empty body decodes to `null`.
pub fn decode(content_type: Option<&str>, body: &str) -> Result<Value, DecodeError> {
    let json_text = match WireEncoding::detect(content_type, body) {
        WireEncoding::Json => body.trim(),
        WireEncoding::EventStream => first_data_line(body).ok_or(DecodeError::MissingDataLine)?,
    };

    if json_text.is_empty() {
        return Ok(Value::Null);
    }

    let value = serde_json::from_str::<Value>(json_text)
        .map_err(|error| DecodeError::Json(error.to_string()))?;
    unwrap_rpc(value)
}

fn first_data_line(body: &str) -> Option<&str> {
    body.lines().find_map(|line| line.strip_prefix("data:")).map(str::trim)
}

fn unwrap_rpc(value: Value) -> Result<Value, DecodeError> {
    if value.get("jsonrpc").is_none() {
        return Ok(value);
    }

    if let Some(error) = value.get("error") {
        return Err(DecodeError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    let Some(result) = value.get("result") else {
        return Ok(Value::Null);
    };

    let texts = result
        .get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        return Err(DecodeError::Rpc { code: 0, message: texts.join(" ") });
    }

    let parsed = texts
        .iter()
        .map(|text| serde_json::from_str::<Value>(text))
        .collect::<Result<Vec<_>, _>>();

    match parsed {
        Ok(mut values) if values.len() == 1 => Ok(values.remove(0)),
        Ok(values) if !values.is_empty() => Ok(Value::Array(values)),
        _ => Ok(result.clone()),
    }
}
