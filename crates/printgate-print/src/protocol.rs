// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Agent wire protocol, JSON text messages.
//
// Requests are `{"call": "<name>", "params": [...]}`; privileged requests
// carry the signed envelope fields on top (see printgate-security).
// Responses are JSON objects whose interesting fields are all optional:
//
//   result   printer name list, a version string, or an opaque status payload
//   jobId    correlation id for an accepted print job
//   error    the agent's own failure message
//
// Anything missing degrades to `None`; only text that is not a JSON object
// at all is a protocol error.

use serde::Serialize;
use serde_json::Value;

use printgate_core::error::{GatewayError, Result};
use printgate_core::types::PrinterStatus;

/// List attached printers.
pub const CALL_FIND_PRINTERS: &str = "printers.find";
/// Query one printer's live status.
pub const CALL_PRINTER_STATUS: &str = "printers.getStatus";
/// Submit print data. Always signed.
pub const CALL_PRINT: &str = "print";
/// Ask the agent for its version string.
pub const CALL_GET_VERSION: &str = "getVersion";

/// An unsigned agent request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRequest {
    pub call: String,
    pub params: Value,
}

impl AgentRequest {
    pub fn new(call: &str, params: Value) -> Self {
        Self {
            call: call.to_owned(),
            params,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The `result` field, by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResult {
    /// An array of strings (printer names, status keywords).
    Names(Vec<String>),
    Text(String),
    /// Anything else, kept as-is.
    Payload(Value),
}

/// A decoded agent response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAgentResponse {
    pub result: Option<AgentResult>,
    pub job_id: Option<String>,
    pub error: Option<String>,
}

impl ParsedAgentResponse {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GatewayError::Protocol(format!("response is not JSON: {e}")))?;
        let Value::Object(mut fields) = value else {
            return Err(GatewayError::Protocol(
                "response is not a JSON object".into(),
            ));
        };

        let result = fields.remove("result").and_then(classify_result);
        let job_id = fields.remove("jobId").and_then(scalar_text);
        let error = match fields.remove("error") {
            None | Some(Value::Null) => None,
            Some(Value::String(message)) => Some(message),
            Some(other) => Some(other.to_string()),
        };

        Ok(Self {
            result,
            job_id,
            error,
        })
    }

    /// Turn an agent-reported `error` into `GatewayError::Agent`.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(message) => Err(GatewayError::Agent(message)),
            None => Ok(self),
        }
    }

    /// Printer names, if `result` carries any. A single string counts as
    /// one name.
    pub fn printer_names(&self) -> Option<Vec<String>> {
        match self.result.as_ref()? {
            AgentResult::Names(names) => Some(names.clone()),
            AgentResult::Text(name) => Some(vec![name.clone()]),
            AgentResult::Payload(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self.result.as_ref()? {
            AgentResult::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interpret `result` as a printer status. Unrecognised shapes are
    /// `Unknown`.
    pub fn printer_status(&self) -> PrinterStatus {
        let mut keywords = Vec::new();
        match &self.result {
            None => {}
            Some(AgentResult::Text(text)) => keywords.push(text.clone()),
            Some(AgentResult::Names(names)) => keywords.extend(names.iter().cloned()),
            Some(AgentResult::Payload(value)) => collect_status_keywords(value, &mut keywords),
        }
        fold_status(keywords.iter().map(|k| status_from_keyword(k)))
    }
}

fn classify_result(value: Value) -> Option<AgentResult> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(AgentResult::Text(text)),
        Value::Array(items) if items.iter().all(Value::is_string) => Some(AgentResult::Names(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        )),
        other => Some(AgentResult::Payload(other)),
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Pull status words out of `{status|statusText|state: ...}` objects and
/// arrays of them.
fn collect_status_keywords(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(text) => out.push(text.clone()),
        Value::Array(items) => {
            for item in items {
                collect_status_keywords(item, out);
            }
        }
        Value::Object(fields) => {
            for key in ["status", "statusText", "state"] {
                if let Some(Value::String(text)) = fields.get(key) {
                    out.push(text.clone());
                }
            }
        }
        _ => {}
    }
}

fn status_from_keyword(keyword: &str) -> PrinterStatus {
    let normalized = keyword.trim().to_ascii_lowercase().replace(['_', ' '], "-");
    match normalized.as_str() {
        "online" | "ok" | "ready" | "idle" | "printing" => PrinterStatus::Online,
        "offline" | "not-available" | "disconnected" | "paused" => PrinterStatus::Offline,
        "error" | "paper-out" | "out-of-paper" | "media-empty" | "jam" | "paper-jam"
        | "media-jam" | "door-open" | "cover-open" | "toner-empty" => PrinterStatus::Error,
        _ => PrinterStatus::Unknown,
    }
}

/// The most severe status wins: Error, then Offline, then Online.
fn fold_status(statuses: impl Iterator<Item = PrinterStatus>) -> PrinterStatus {
    statuses.fold(PrinterStatus::Unknown, |acc, next| {
        let rank = |s: PrinterStatus| match s {
            PrinterStatus::Unknown => 0,
            PrinterStatus::Online => 1,
            PrinterStatus::Offline => 2,
            PrinterStatus::Error => 3,
        };
        if rank(next) > rank(acc) { next } else { acc }
    })
}
