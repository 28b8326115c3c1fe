//! JSON-RPC 1.0 style messages as used by getblocktemplate.
//!
//! Requests carry `id`, `method` and `params`. Responses carry `result` and `error`; a response
//! is an error response when `error` is present and not null.
use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct StandardRequest {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl fmt::Display for StandardRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params =
            serde_json::to_string_pretty(&self.params).unwrap_or_else(|_| self.params.to_string());
        write!(
            f,
            "{{ id: {}, method: {}, params: {} }}",
            self.id, self.method, params
        )
    }
}

impl From<StandardRequest> for Value {
    fn from(req: StandardRequest) -> Self {
        let mut obj = serde_json::Map::new();
        obj.insert("id".to_string(), req.id.into());
        obj.insert("method".to_string(), req.method.into());
        obj.insert("params".to_string(), req.params);
        Value::Object(obj)
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Response {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub result: Value,
}

impl Response {
    pub fn is_error(&self) -> bool {
        matches!(&self.error, Some(e) if !e.is_null())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result =
            serde_json::to_string_pretty(&self.result).unwrap_or_else(|_| self.result.to_string());
        let id = self.id.clone().unwrap_or(Value::Null);

        match &self.error {
            Some(err) if !err.is_null() => {
                write!(f, "{{ id: {}, error: {}, result: {} }}", id, err, result)
            }
            _ => write!(f, "{{ id: {}, result: {} }}", id, result),
        }
    }
}

/// The payload of a response document.
///
/// A document with a `result` member is an envelope: it fails when its `error` member is
/// present and not null, otherwise its `result` is returned. Any other document is taken to be
/// the result itself.
pub fn split_envelope(doc: &Value) -> Result<&Value, Error> {
    match doc.get("result") {
        Some(result) => match doc.get("error") {
            Some(e) if !e.is_null() => Err(Error::JsonRpc(Box::new(e.clone()))),
            _ => Ok(result),
        },
        None => Ok(doc),
    }
}
