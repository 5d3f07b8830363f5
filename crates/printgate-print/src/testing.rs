// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scripted in-memory agent for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use printgate_core::GatewayConfig;
use printgate_core::error::{GatewayError, Result};

use crate::channel::{AgentConnection, AgentConnector};

pub const KEY_PEM: &str = include_str!("../../printgate-security/testdata/signing-key.pem");
pub const LEAF_PEM: &str = include_str!("../../printgate-security/testdata/leaf-cert.pem");
pub const INTERMEDIATE_PEM: &str =
    include_str!("../../printgate-security/testdata/intermediate-cert.pem");

/// Write the test key and certificates into `dir` and return a config
/// pointing at them.
pub fn config_in(dir: &Path) -> GatewayConfig {
    let key = dir.join("private-key.pem");
    let leaf = dir.join("digital-certificate.txt");
    let intermediate = dir.join("intermediate.txt");
    std::fs::write(&key, KEY_PEM).expect("write key");
    std::fs::write(&leaf, LEAF_PEM).expect("write leaf");
    std::fs::write(&intermediate, INTERMEDIATE_PEM).expect("write intermediate");

    GatewayConfig {
        agent_endpoint: "ws://agent.test:8182".into(),
        private_key_path: key,
        certificate_path: leaf,
        intermediate_certificate_path: Some(intermediate),
        ..GatewayConfig::default()
    }
}

/// What the fake agent does on one connection.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Answer the request with this text.
    Reply(String),
    /// Refuse the connection.
    Refuse,
    /// Accept the connection, then fail the receive.
    DropReply,
    /// Accept and never answer.
    Silent,
}

/// Connector that plays back behaviours in order, repeating the last one.
pub struct ScriptedConnector {
    script: Mutex<VecDeque<Behaviour>>,
    sent: Arc<Mutex<Vec<String>>>,
    connections: AtomicUsize,
    closes: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    pub fn new(behaviour: Behaviour) -> Self {
        Self::script([behaviour])
    }

    pub fn script(behaviours: impl IntoIterator<Item = Behaviour>) -> Self {
        Self {
            script: Mutex::new(behaviours.into_iter().collect()),
            sent: Arc::new(Mutex::new(Vec::new())),
            connections: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Every message sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn next_behaviour(&self) -> Behaviour {
        let mut script = self.script.lock().expect("script lock");
        if script.len() > 1 {
            script.pop_front().expect("non-empty script")
        } else {
            script.front().cloned().unwrap_or(Behaviour::Refuse)
        }
    }
}

#[async_trait]
impl AgentConnector for ScriptedConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn AgentConnection>> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let behaviour = self.next_behaviour();
        if matches!(behaviour, Behaviour::Refuse) {
            return Err(GatewayError::Channel(format!(
                "connect to {endpoint}: Connection refused"
            )));
        }
        Ok(Box::new(ScriptedConnection {
            behaviour,
            sent: Arc::clone(&self.sent),
            closes: Arc::clone(&self.closes),
        }))
    }
}

struct ScriptedConnection {
    behaviour: Behaviour,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl AgentConnection for ScriptedConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sent.lock().expect("sent lock").push(text);
        Ok(())
    }

    async fn receive(&mut self) -> Result<String> {
        match &self.behaviour {
            Behaviour::Reply(text) => Ok(text.clone()),
            Behaviour::DropReply => Err(GatewayError::Channel(
                "connection closed before a response arrived".into(),
            )),
            Behaviour::Silent => std::future::pending().await,
            Behaviour::Refuse => unreachable!("refused connections are never opened"),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
