// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer discovery through the local agent.
//
// Listing printers is not privileged, so the request goes out unsigned.
// The agent only reports names here; every printer it lists is treated as
// online and available until a status probe says otherwise.

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use printgate_core::error::Result;
use printgate_core::types::Printer;

use crate::channel::AgentChannel;
use crate::protocol::{AgentRequest, CALL_FIND_PRINTERS, ParsedAgentResponse};

/// Asks the agent which printers it can reach.
#[derive(Clone)]
pub struct PrinterDiscoveryService {
    channel: AgentChannel,
}

impl PrinterDiscoveryService {
    pub fn new(channel: AgentChannel) -> Self {
        Self { channel }
    }

    /// List printers attached to the agent at `endpoint`.
    ///
    /// A response without a name list yields no printers rather than an
    /// error.
    #[instrument(skip(self, cancel))]
    pub async fn discover(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Printer>> {
        let request = AgentRequest::new(CALL_FIND_PRINTERS, json!([])).to_json()?;
        let reply = self.channel.request(endpoint, request, cancel).await?;
        let response = ParsedAgentResponse::parse(&reply)?.into_result()?;

        let Some(names) = response.printer_names() else {
            warn!("agent response carried no printer list");
            return Ok(Vec::new());
        };

        let printers: Vec<Printer> = names.into_iter().map(Printer::discovered).collect();
        info!(count = printers.len(), "printers discovered");
        Ok(printers)
    }
}
