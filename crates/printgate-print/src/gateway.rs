// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PrintGateway: the operations the point-of-sale server calls.
//
// Every agent-facing call opens its own connection; the gateway keeps no
// connection state between calls.  Failures come back as result records
// (or `false`/`None`) rather than errors, so callers always have something
// to show the operator.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use printgate_core::GatewayConfig;
use printgate_core::error::Result;
use printgate_core::types::{
    ConnectionStatus, DiscoveryOutcome, JobId, JobStatus, PrintJob, PrinterStatus,
    PrinterStatusReport, SubmissionOutcome,
};
use printgate_security::{CertificateChainProvider, ChallengeSigner, PayloadSigner};

use crate::channel::{AgentChannel, AgentConnector, WebSocketConnector};
use crate::discovery::PrinterDiscoveryService;
use crate::dispatcher::PrintJobDispatcher;
use crate::protocol::{AgentRequest, CALL_GET_VERSION, ParsedAgentResponse};
use crate::registry::{CancelOutcome, PrintJobRegistry};
use crate::status::PrinterStatusProbe;

pub struct PrintGateway {
    config: GatewayConfig,
    chain: Arc<CertificateChainProvider>,
    signer: Arc<PayloadSigner>,
    challenge: ChallengeSigner,
    channel: AgentChannel,
    discovery: PrinterDiscoveryService,
    status: PrinterStatusProbe,
    dispatcher: PrintJobDispatcher,
    registry: Arc<PrintJobRegistry>,
}

impl PrintGateway {
    /// A gateway talking WebSocket to the configured agent, with its own
    /// empty job registry.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let connector = Arc::new(WebSocketConnector::new(config.connect_timeout()));
        Self::with_connector(config, connector, Arc::new(PrintJobRegistry::new()))
    }

    /// A gateway over an arbitrary transport and a caller-owned registry.
    pub fn with_connector(
        config: GatewayConfig,
        connector: Arc<dyn AgentConnector>,
        registry: Arc<PrintJobRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let chain = Arc::new(CertificateChainProvider::from_config(&config));
        let signer = Arc::new(PayloadSigner::from_config(Arc::clone(&chain), &config));
        let channel = AgentChannel::new(connector, config.response_timeout());
        let dispatcher = PrintJobDispatcher::new(
            Arc::clone(&signer),
            channel.clone(),
            Arc::clone(&registry),
            config.estimated_print_duration(),
        );

        Ok(Self {
            challenge: ChallengeSigner::from_config(&config),
            discovery: PrinterDiscoveryService::new(channel.clone()),
            status: PrinterStatusProbe::new(channel.clone()),
            config,
            chain,
            signer,
            channel,
            dispatcher,
            registry,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PrintJobRegistry> {
        &self.registry
    }

    fn endpoint<'a>(&'a self, endpoint: Option<&'a str>) -> &'a str {
        endpoint.unwrap_or(self.config.agent_endpoint.as_str())
    }

    // -- Printers --

    /// List the agent's printers. `endpoint` overrides the configured one.
    #[instrument(skip(self, cancel))]
    pub async fn discover_printers(
        &self,
        endpoint: Option<&str>,
        cancel: &CancellationToken,
    ) -> DiscoveryOutcome {
        let endpoint = self.endpoint(endpoint);
        match self.discovery.discover(endpoint, cancel).await {
            Ok(printers) => DiscoveryOutcome {
                printers,
                discovered_at: Utc::now(),
                connection_status: ConnectionStatus::Connected,
                error_message: None,
            },
            Err(e) => {
                warn!(error = %e, "printer discovery failed");
                DiscoveryOutcome {
                    printers: Vec::new(),
                    discovered_at: Utc::now(),
                    connection_status: ConnectionStatus::Failed,
                    error_message: Some(e.to_string()),
                }
            }
        }
    }

    #[instrument(skip(self, cancel))]
    pub async fn check_printer_status(
        &self,
        printer_id: &str,
        cancel: &CancellationToken,
    ) -> PrinterStatusReport {
        let status = if printer_id.trim().is_empty() {
            warn!("status check without a printer id");
            PrinterStatus::Unknown
        } else {
            self.status
                .get_status(&self.config.agent_endpoint, printer_id, cancel)
                .await
        };
        PrinterStatusReport {
            printer_id: printer_id.to_owned(),
            status,
            checked_at: Utc::now(),
        }
    }

    // -- Jobs --

    pub async fn submit_print_job(
        &self,
        job: PrintJob,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        self.dispatcher
            .submit(&self.config.agent_endpoint, job, cancel)
            .await
    }

    pub fn get_print_job_status(&self, id: &JobId) -> Option<PrintJob> {
        self.registry.get(id)
    }

    /// `true` for any known job, including one that had already finished
    /// (which is left as it was); `false` for an unknown id.
    #[instrument(skip(self))]
    pub fn cancel_print_job(&self, id: &JobId) -> bool {
        match self.registry.cancel(id) {
            Ok(CancelOutcome::Cancelled) => true,
            Ok(CancelOutcome::AlreadyTerminal(status)) => {
                info!(?status, "cancel requested for a finished job");
                true
            }
            Err(e) => {
                warn!(error = %e, "cancel failed");
                false
            }
        }
    }

    /// Record that a printing job came out, as reported out of band.
    pub fn complete_print_job(&self, id: &JobId) -> Result<PrintJob> {
        self.registry.update_status(id, JobStatus::Completed, None)
    }

    pub fn list_print_jobs(&self) -> Vec<PrintJob> {
        self.registry.list()
    }

    // -- Agent --

    /// Whether a connection to the agent can be opened at all.
    #[instrument(skip(self, cancel))]
    pub async fn test_connection(&self, endpoint: Option<&str>, cancel: &CancellationToken) -> bool {
        match self.channel.probe(self.endpoint(endpoint), cancel).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "agent connection test failed");
                false
            }
        }
    }

    /// The agent's version string. Sent unsigned.
    #[instrument(skip(self, cancel))]
    pub async fn get_agent_version(
        &self,
        endpoint: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let request = AgentRequest::new(CALL_GET_VERSION, json!([])).to_json().ok()?;
        let reply = match self.channel.request(self.endpoint(endpoint), request, cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "agent version query failed");
                return None;
            }
        };
        match ParsedAgentResponse::parse(&reply).and_then(ParsedAgentResponse::into_result) {
            Ok(response) => response.text().map(str::to_owned),
            Err(e) => {
                warn!(error = %e, "agent version reply unusable");
                None
            }
        }
    }

    // -- Trust material --

    /// Whether the private key and certificate chain load right now.
    ///
    /// Reads from disk, bypassing the chain cache.
    #[instrument(skip(self))]
    pub fn validate_signature_configuration(&self) -> bool {
        self.chain.invalidate();
        match self.signer.check() {
            Ok(()) => {
                info!("signature configuration valid");
                true
            }
            Err(e) => {
                warn!(error = %e, "signature configuration invalid");
                false
            }
        }
    }

    /// Sign an agent trust-handshake challenge.
    pub fn sign_challenge(&self, challenge: &str) -> Result<String> {
        self.challenge.sign_challenge(challenge)
    }
}
