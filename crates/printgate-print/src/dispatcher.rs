// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Signed print job dispatch.
//
// A submission is: register the job as Queued, build the agent's print
// command, sign it, send it over a fresh connection, read the reply.  The
// registry is written only after the agent I/O has settled, so a cancelled
// or failed call never leaves a job half-updated.  Nothing is retried here:
// a silent retry can print the same receipt twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use printgate_core::error::{GatewayError, Result};
use printgate_core::types::{JobStatus, PrintJob, SubmissionOutcome};
use printgate_security::PayloadSigner;

use crate::channel::AgentChannel;
use crate::protocol::{AgentRequest, CALL_PRINT, ParsedAgentResponse};
use crate::registry::PrintJobRegistry;

/// Sends print jobs to the agent as signed commands.
pub struct PrintJobDispatcher {
    signer: Arc<PayloadSigner>,
    channel: AgentChannel,
    registry: Arc<PrintJobRegistry>,
    estimated_print: Duration,
}

impl PrintJobDispatcher {
    pub fn new(
        signer: Arc<PayloadSigner>,
        channel: AgentChannel,
        registry: Arc<PrintJobRegistry>,
        estimated_print: Duration,
    ) -> Self {
        Self {
            signer,
            channel,
            registry,
            estimated_print,
        }
    }

    /// The unsigned print command for `job`:
    /// `{"call":"print","params":[{"printer":..,"data":[{"type":..,"data":..}]}]}`.
    pub fn build_command(job: &PrintJob) -> AgentRequest {
        AgentRequest::new(
            CALL_PRINT,
            json!([{
                "printer": job.printer_id,
                "data": [{
                    "type": job.content_type.agent_data_type(),
                    "data": job.content,
                }],
            }]),
        )
    }

    /// Register `job` and dispatch it to the agent at `endpoint`.
    ///
    /// Never returns an error: every failure is recorded on the job as
    /// `Failed` and reported in the outcome.
    #[instrument(skip(self, job, cancel), fields(job_id = %job.id, printer = %job.printer_id))]
    pub async fn submit(
        &self,
        endpoint: &str,
        job: PrintJob,
        cancel: &CancellationToken,
    ) -> SubmissionOutcome {
        if let Err(e) = validate(&job) {
            warn!(error = %e, "submission rejected");
            return SubmissionOutcome::failed(e.to_string());
        }

        let id = job.id.clone();
        let command = Self::build_command(&job);
        if let Err(e) = self.registry.register(job) {
            warn!(error = %e, "submission rejected");
            return SubmissionOutcome::failed(e.to_string());
        }

        match self.dispatch(endpoint, command, cancel).await {
            Ok(agent_job_id) => {
                match self.registry.mark_dispatched(&id, agent_job_id.clone()) {
                    Ok(_) => info!(agent_job_id = ?agent_job_id, "job accepted by agent"),
                    // Cancelled while the command was in flight; the agent
                    // already has it, so report what the agent said.
                    Err(e) => info!(error = %e, "job accepted by agent after local cancel"),
                }
                SubmissionOutcome {
                    success: true,
                    agent_job_id,
                    estimated_completion: chrono::Duration::from_std(self.estimated_print)
                        .ok()
                        .and_then(|d| Utc::now().checked_add_signed(d)),
                    error_message: None,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "job dispatch failed");
                if let Err(update) =
                    self.registry
                        .update_status(&id, JobStatus::Failed, Some(message.clone()))
                {
                    debug!(error = %update, "failed job was already terminal");
                }
                SubmissionOutcome::failed(message)
            }
        }
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        command: AgentRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let signed = self.signer.sign(&command.call, command.params)?;
        let reply = self
            .channel
            .request(endpoint, signed.to_json()?, cancel)
            .await?;

        // The reply only matters for its optional correlation id and error.
        match ParsedAgentResponse::parse(&reply) {
            Ok(response) => Ok(response.into_result()?.job_id),
            Err(e) => {
                debug!(error = %e, "print reply carried no JSON; accepted without job id");
                Ok(None)
            }
        }
    }
}

fn validate(job: &PrintJob) -> Result<()> {
    if job.id.as_str().trim().is_empty() {
        return Err(GatewayError::InvalidArgument("job id must not be empty".into()));
    }
    if job.printer_id.trim().is_empty() {
        return Err(GatewayError::InvalidArgument(
            "printer id must not be empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use printgate_core::types::{ContentType, JobId};
    use printgate_security::{CertificateChainProvider, SignedEnvelope, SigningKey};

    use crate::testing::{Behaviour, KEY_PEM, ScriptedConnector, config_in};

    struct Harness {
        dispatcher: PrintJobDispatcher,
        registry: Arc<PrintJobRegistry>,
        connector: Arc<ScriptedConnector>,
        dir: tempfile::TempDir,
    }

    fn harness(behaviour: Behaviour) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(dir.path());
        let chain = Arc::new(CertificateChainProvider::from_config(&config));
        let signer = Arc::new(PayloadSigner::from_config(chain, &config));
        let connector = Arc::new(ScriptedConnector::new(behaviour));
        let channel = AgentChannel::new(connector.clone(), Duration::from_millis(200));
        let registry = Arc::new(PrintJobRegistry::new());
        Harness {
            dispatcher: PrintJobDispatcher::new(
                signer,
                channel,
                Arc::clone(&registry),
                Duration::from_secs(30),
            ),
            registry,
            connector,
            dir,
        }
    }

    fn receipt(id: &str) -> PrintJob {
        PrintJob::new(id, "Receipt", "HP-1", "TOTAL 4.20\n", ContentType::Raw)
    }

    #[test]
    fn raw_command_shape() {
        let command = PrintJobDispatcher::build_command(&receipt("j1"));
        assert_eq!(command.call, "print");
        assert_eq!(
            command.params,
            json!([{ "printer": "HP-1", "data": [{ "type": "raw", "data": "TOTAL 4.20\n" }] }])
        );
    }

    #[test]
    fn html_and_unknown_content_types() {
        let html = PrintJob::new("j1", "t", "HP-1", "<b>hi</b>", ContentType::Html);
        assert_eq!(
            PrintJobDispatcher::build_command(&html).params[0]["data"][0]["type"],
            "html"
        );

        let pdf = PrintJob::new("j2", "t", "HP-1", "%PDF", ContentType::parse("application/pdf"));
        assert_eq!(
            PrintJobDispatcher::build_command(&pdf).params[0]["data"][0]["type"],
            "raw"
        );
    }

    #[tokio::test]
    async fn accepted_job_is_printing() {
        let h = harness(Behaviour::Reply(r#"{"jobId":"agent-77"}"#.into()));
        let before = Utc::now();

        let outcome = h
            .dispatcher
            .submit("ws://agent", receipt("j1"), &CancellationToken::new())
            .await;

        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.agent_job_id.as_deref(), Some("agent-77"));
        let eta = outcome.estimated_completion.expect("estimate");
        assert!(eta >= before + chrono::Duration::seconds(30));

        let job = h.registry.get(&JobId::from("j1")).expect("registered");
        assert_eq!(job.status, JobStatus::Printing);
        assert_eq!(job.agent_job_id.as_deref(), Some("agent-77"));
        assert!(job.completed_at.is_none());
    }

    #[tokio::test]
    async fn command_on_the_wire_is_signed() {
        let h = harness(Behaviour::Reply("{}".into()));
        h.dispatcher
            .submit("ws://agent", receipt("j1"), &CancellationToken::new())
            .await;

        let sent = h.connector.sent();
        assert_eq!(sent.len(), 1);
        let envelope: SignedEnvelope = serde_json::from_str(&sent[0]).expect("envelope");
        assert_eq!(envelope.envelope.call, "print");
        assert_eq!(envelope.envelope.params[0]["printer"], "HP-1");
        assert!(
            envelope
                .envelope
                .certificate
                .contains("\n--START INTERMEDIATE CERT--\n")
        );

        // PKCS#1 v1.5 is deterministic, so re-signing the canonical form
        // must reproduce the signature exactly.
        let canonical = envelope.envelope.canonical_json().expect("canonical");
        let expected = SigningKey::from_pem(KEY_PEM.as_bytes())
            .expect("key")
            .sign_base64(canonical.as_bytes())
            .expect("sign");
        assert_eq!(envelope.signature, expected);
    }

    #[tokio::test]
    async fn reply_without_job_id_still_succeeds() {
        for reply in ["{}", "OK"] {
            let h = harness(Behaviour::Reply(reply.into()));
            let outcome = h
                .dispatcher
                .submit("ws://agent", receipt("j1"), &CancellationToken::new())
                .await;
            assert!(outcome.success, "reply {reply:?}: {outcome:?}");
            assert!(outcome.agent_job_id.is_none());
            assert_eq!(
                h.registry.get(&JobId::from("j1")).expect("job").status,
                JobStatus::Printing
            );
        }
    }

    #[tokio::test]
    async fn unreachable_agent_fails_the_job() {
        let h = harness(Behaviour::Refuse);
        let outcome = h
            .dispatcher
            .submit("ws://agent", receipt("j1"), &CancellationToken::new())
            .await;

        assert!(!outcome.success);
        let message = outcome.error_message.expect("message");
        assert!(!message.is_empty());

        let job = h.registry.get(&JobId::from("j1")).expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some(message.as_str()));
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn agent_error_fails_the_job() {
        let h = harness(Behaviour::Reply(r#"{"error":"Printer not found"}"#.into()));
        let outcome = h
            .dispatcher
            .submit("ws://agent", receipt("j1"), &CancellationToken::new())
            .await;

        assert!(!outcome.success);
        assert!(
            outcome
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("Printer not found"))
        );
        assert_eq!(
            h.registry.get(&JobId::from("j1")).expect("job").status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn missing_key_fails_before_connecting() {
        let h = harness(Behaviour::Reply("{}".into()));
        std::fs::remove_file(h.dir.path().join("private-key.pem")).expect("remove key");

        let outcome = h
            .dispatcher
            .submit("ws://agent", receipt("j1"), &CancellationToken::new())
            .await;

        assert!(!outcome.success);
        assert_eq!(h.connector.connections(), 0);
        assert_eq!(
            h.registry.get(&JobId::from("j1")).expect("job").status,
            JobStatus::Failed
        );
    }

    #[tokio::test]
    async fn duplicate_submission_leaves_original_alone() {
        let h = harness(Behaviour::Reply(r#"{"jobId":"first"}"#.into()));
        let cancel = CancellationToken::new();
        assert!(h.dispatcher.submit("ws://agent", receipt("j1"), &cancel).await.success);

        let outcome = h.dispatcher.submit("ws://agent", receipt("j1"), &cancel).await;
        assert!(!outcome.success);
        assert_eq!(h.connector.connections(), 1);

        let job = h.registry.get(&JobId::from("j1")).expect("job");
        assert_eq!(job.status, JobStatus::Printing);
        assert_eq!(job.agent_job_id.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn blank_printer_is_rejected_unregistered() {
        let h = harness(Behaviour::Reply("{}".into()));
        let job = PrintJob::new("j1", "t", "  ", "x", ContentType::Raw);

        let outcome = h
            .dispatcher
            .submit("ws://agent", job, &CancellationToken::new())
            .await;
        assert!(!outcome.success);
        assert!(h.registry.is_empty());
        assert_eq!(h.connector.connections(), 0);
    }

    #[tokio::test]
    async fn cancelled_submission_is_failed() {
        let h = harness(Behaviour::Silent);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let outcome = h.dispatcher.submit("ws://agent", receipt("j1"), &cancel).await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some(GatewayError::Cancelled.to_string().as_str())
        );
        assert_eq!(
            h.registry.get(&JobId::from("j1")).expect("job").status,
            JobStatus::Failed
        );
    }
}
