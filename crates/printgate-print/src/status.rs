// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live printer status probe.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use printgate_core::error::GatewayError;
use printgate_core::types::PrinterStatus;

use crate::channel::AgentChannel;
use crate::protocol::{AgentRequest, CALL_PRINTER_STATUS, ParsedAgentResponse};

/// Asks the agent how one printer is doing.
///
/// Never fails: a reply it cannot read is `Unknown`, an agent it cannot
/// reach is `Error`.
#[derive(Clone)]
pub struct PrinterStatusProbe {
    channel: AgentChannel,
}

impl PrinterStatusProbe {
    pub fn new(channel: AgentChannel) -> Self {
        Self { channel }
    }

    #[instrument(skip(self, cancel))]
    pub async fn get_status(
        &self,
        endpoint: &str,
        printer_id: &str,
        cancel: &CancellationToken,
    ) -> PrinterStatus {
        let request = match AgentRequest::new(CALL_PRINTER_STATUS, json!([printer_id])).to_json()
        {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "status request could not be encoded");
                return PrinterStatus::Unknown;
            }
        };

        let reply = match self.channel.request(endpoint, request, cancel).await {
            Ok(reply) => reply,
            Err(GatewayError::Cancelled) => {
                debug!("status probe cancelled");
                return PrinterStatus::Unknown;
            }
            Err(e) => {
                warn!(error = %e, "status probe could not reach the agent");
                return PrinterStatus::Error;
            }
        };

        match ParsedAgentResponse::parse(&reply) {
            Ok(response) if response.error.is_some() => {
                warn!(error = ?response.error, "agent reported a status error");
                PrinterStatus::Error
            }
            Ok(response) => {
                let status = response.printer_status();
                debug!(?status, "printer status received");
                status
            }
            Err(e) => {
                debug!(error = %e, "unreadable status reply");
                PrinterStatus::Unknown
            }
        }
    }
}
