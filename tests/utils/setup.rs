//! Test setup - a running coordinator with a handful of connected clients
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use attendance_realtime::{auth::Role, CoordinatorHandle, SessionId};
use serde_json::Value;

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

/// A connected session and the frames queued for it
pub struct TestClient {
    pub session_id: SessionId,
    pub user_id: String,
    pub role: Role,
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl TestClient {
    /// Every frame delivered so far, without waiting
    pub fn drain(&mut self) -> Vec<Value> {
        let mut frames = vec![];
        while let Ok(raw) = self.outbound.try_recv() {
            frames.push(serde_json::from_str(&raw).expect("outbound frame is JSON"));
        }
        frames
    }

    /// Closes the receiving side, as a dropped socket would
    pub fn close(&mut self) {
        self.outbound.close();
    }
}

pub struct TestSetup {
    pub coordinator: CoordinatorHandle,
    pub clients: HashMap<String, TestClient>,
    pub _worker: JoinHandle<()>,
}

impl TestSetup {
    pub fn client(&mut self, name: &str) -> &mut TestClient {
        self.clients
            .get_mut(name)
            .unwrap_or_else(|| panic!("no client named {name}"))
    }

    pub fn session_id(&self, name: &str) -> SessionId {
        self.clients[name].session_id.clone()
    }

    /// Sends a raw inbound frame as `name` and waits until it has been applied
    pub async fn send_raw(&self, name: &str, raw: &str) {
        let session_id = self.session_id(name);
        self.coordinator
            .submit_frame(&session_id, raw.to_string())
            .await
            .unwrap();
        self.settle().await;
    }

    pub async fn send(&self, name: &str, frame: Value) {
        self.send_raw(name, &frame.to_string()).await;
    }

    pub async fn join(&self, name: &str, room: &str) {
        self.send(name, serde_json::json!({"type": "join_room", "payload": {"room": room}}))
            .await;
    }

    pub async fn leave(&self, name: &str, room: &str) {
        self.send(name, serde_json::json!({"type": "leave_room", "payload": {"room": room}}))
            .await;
    }

    pub async fn disconnect(&self, name: &str) -> bool {
        self.coordinator
            .disconnect(&self.session_id(name))
            .await
            .unwrap()
    }

    /// Barrier: every command queued before this one has been applied
    pub async fn settle(&self) {
        self.coordinator.stats().await.unwrap();
    }

    /// Discards everything queued so far for every client
    pub fn drain_all(&mut self) {
        for client in self.clients.values_mut() {
            client.drain();
        }
    }

    pub async fn assert_consistent(&self) {
        assert!(
            self.coordinator.is_consistent().await.unwrap(),
            "room index and session table disagree"
        );
    }
}

pub struct TestSetupBuilder {
    clients: Vec<(String, Role, Option<String>)>,
    mailbox: usize,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            clients: vec![],
            mailbox: 64,
        }
    }

    /// Adds a client that connects with the given role and optional initial room
    pub fn with_client(mut self, name: &str, role: Role, room: Option<&str>) -> Self {
        self.clients
            .push((name.to_string(), role, room.map(str::to_string)));
        self
    }

    /// Two employees and a manager in `team1`, an admin in `admin`
    pub fn with_team(self) -> Self {
        self.with_client("alice", Role::Employee, Some("team1"))
            .with_client("bob", Role::Employee, Some("team1"))
            .with_client("carol", Role::Manager, Some("team1"))
            .with_client("root", Role::Admin, Some("admin"))
    }

    pub fn with_mailbox(mut self, capacity: usize) -> Self {
        self.mailbox = capacity;
        self
    }

    pub async fn build(self) -> TestSetup {
        let (coordinator, worker) = CoordinatorHandle::spawn(self.mailbox);
        let mut clients = HashMap::new();

        for (name, role, room) in self.clients {
            let (tx, rx) = mpsc::unbounded_channel();
            let session_id = coordinator.connect(&name, role, room, tx).await.unwrap();
            clients.insert(
                name.clone(),
                TestClient {
                    session_id,
                    user_id: name,
                    role,
                    outbound: rx,
                },
            );
        }

        TestSetup {
            coordinator,
            clients,
            _worker: worker,
        }
    }
}
