// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printgate Print — the agent channel, printer discovery and status, signed
// job dispatch and the in-memory job registry, composed behind
// `PrintGateway`.

pub mod channel;
pub mod discovery;
pub mod dispatcher;
pub mod gateway;
pub mod protocol;
pub mod registry;
pub mod status;

#[cfg(test)]
mod testing;

pub use channel::{AgentChannel, AgentConnection, AgentConnector, WebSocketConnector};
pub use discovery::PrinterDiscoveryService;
pub use dispatcher::PrintJobDispatcher;
pub use gateway::PrintGateway;
pub use protocol::{AgentRequest, ParsedAgentResponse};
pub use registry::{CancelOutcome, PrintJobRegistry};
pub use status::PrinterStatusProbe;
