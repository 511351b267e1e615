use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::{Coordinator, CoordinatorStats};
use crate::auth::Role;
use crate::event::{DeliveryReport, RouteError};
use crate::session::{Outbound, Session, SessionId};
use crate::websockets::MessageHandler;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error("Coordinator is not running")]
    Unavailable,
}

/// Where a server-originated frame should go
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryTarget {
    Room(String),
    All,
}

/// Requests processed one at a time by the coordinator task
enum Command {
    Connect {
        user_id: String,
        role: Role,
        room: Option<String>,
        outbound: Outbound,
        reply: oneshot::Sender<SessionId>,
    },
    Frame {
        session_id: SessionId,
        raw: String,
    },
    Disconnect {
        session_id: SessionId,
        reply: oneshot::Sender<bool>,
    },
    Deliver {
        target: DeliveryTarget,
        frame_type: String,
        payload: Map<String, Value>,
        exclude: HashSet<SessionId>,
        reply: oneshot::Sender<DeliveryReport>,
    },
    Publish {
        frame_type: String,
        payload: Map<String, Value>,
        reply: oneshot::Sender<Result<DeliveryReport, RouteError>>,
    },
    Members {
        room: String,
        reply: oneshot::Sender<Vec<SessionId>>,
    },
    Session {
        session_id: SessionId,
        reply: oneshot::Sender<Option<Session>>,
    },
    Stats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
    Consistency {
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable entry point to the single coordinator instance.
///
/// Every call is a message into one mailbox, so state changes are applied in
/// arrival order and none of them is interleaved with another.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    /// Spawns the coordinator task and returns a handle to it
    pub fn spawn(mailbox_capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let worker = tokio::spawn(run_coordinator(rx, Coordinator::new()));
        info!(mailbox_capacity, "Coordinator started");
        (Self { tx }, worker)
    }

    pub async fn connect(
        &self,
        user_id: &str,
        role: Role,
        room: Option<String>,
        outbound: Outbound,
    ) -> Result<SessionId, CoordinatorError> {
        self.request(|reply| Command::Connect {
            user_id: user_id.to_string(),
            role,
            room,
            outbound,
            reply,
        })
        .await
    }

    /// Queues an inbound frame; replies reach the sender through its outbound channel
    pub async fn submit_frame(&self, session_id: &SessionId, raw: String) -> Result<(), CoordinatorError> {
        self.tx
            .send(Command::Frame {
                session_id: session_id.clone(),
                raw,
            })
            .await
            .map_err(|_| CoordinatorError::Unavailable)
    }

    /// Destroys the session and waits until the teardown has been applied
    pub async fn disconnect(&self, session_id: &SessionId) -> Result<bool, CoordinatorError> {
        self.request(|reply| Command::Disconnect {
            session_id: session_id.clone(),
            reply,
        })
        .await
    }

    pub async fn deliver(
        &self,
        target: DeliveryTarget,
        frame_type: &str,
        payload: Map<String, Value>,
        exclude: HashSet<SessionId>,
    ) -> Result<DeliveryReport, CoordinatorError> {
        self.request(|reply| Command::Deliver {
            target,
            frame_type: frame_type.to_string(),
            payload,
            exclude,
            reply,
        })
        .await
    }

    pub async fn deliver_to_room(
        &self,
        room: &str,
        frame_type: &str,
        payload: Map<String, Value>,
        exclude: HashSet<SessionId>,
    ) -> Result<DeliveryReport, CoordinatorError> {
        self.deliver(DeliveryTarget::Room(room.to_string()), frame_type, payload, exclude)
            .await
    }

    pub async fn deliver_to_all(
        &self,
        frame_type: &str,
        payload: Map<String, Value>,
        exclude: HashSet<SessionId>,
    ) -> Result<DeliveryReport, CoordinatorError> {
        self.deliver(DeliveryTarget::All, frame_type, payload, exclude).await
    }

    /// Domain event routed by the admin/department fan-out policy
    pub async fn publish_event(
        &self,
        frame_type: &str,
        payload: Map<String, Value>,
    ) -> Result<Result<DeliveryReport, RouteError>, CoordinatorError> {
        self.request(|reply| Command::Publish {
            frame_type: frame_type.to_string(),
            payload,
            reply,
        })
        .await
    }

    pub async fn members_of(&self, room: &str) -> Result<Vec<SessionId>, CoordinatorError> {
        self.request(|reply| Command::Members {
            room: room.to_string(),
            reply,
        })
        .await
    }

    pub async fn session(&self, session_id: &SessionId) -> Result<Option<Session>, CoordinatorError> {
        self.request(|reply| Command::Session {
            session_id: session_id.clone(),
            reply,
        })
        .await
    }

    /// Also acts as a barrier: every command queued before it has been applied
    pub async fn stats(&self) -> Result<CoordinatorStats, CoordinatorError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    pub async fn is_consistent(&self) -> Result<bool, CoordinatorError> {
        self.request(|reply| Command::Consistency { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoordinatorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| CoordinatorError::Unavailable)?;
        reply_rx.await.map_err(|_| CoordinatorError::Unavailable)
    }
}

#[async_trait]
impl MessageHandler for CoordinatorHandle {
    async fn handle_message(&self, session_id: &SessionId, message: String) {
        if let Err(e) = self.submit_frame(session_id, message).await {
            warn!(session_id = %session_id, error = %e, "Dropping inbound frame");
        }
    }
}

/// Coordinator task: applies commands strictly in arrival order
async fn run_coordinator(mut rx: mpsc::Receiver<Command>, mut coordinator: Coordinator) {
    while let Some(command) = rx.recv().await {
        apply(&mut coordinator, command);
    }
    info!("Coordinator mailbox closed, shutting down");
}

// Synchronous on purpose: nothing here may await, so no other command can
// observe a half-applied membership change.
fn apply(coordinator: &mut Coordinator, command: Command) {
    match command {
        Command::Connect {
            user_id,
            role,
            room,
            outbound,
            reply,
        } => {
            let session_id = coordinator.connect(outbound, &user_id, role, room.as_deref());
            if reply.send(session_id.clone()).is_err() {
                // Caller went away before learning its id; nobody will disconnect it.
                coordinator.disconnect(&session_id);
            }
        }
        Command::Frame { session_id, raw } => coordinator.handle_frame(&session_id, &raw),
        Command::Disconnect { session_id, reply } => {
            let _ = reply.send(coordinator.disconnect(&session_id));
        }
        Command::Deliver {
            target,
            frame_type,
            payload,
            exclude,
            reply,
        } => {
            let report = match &target {
                DeliveryTarget::Room(room) => coordinator.deliver_to_room(room, &frame_type, payload, &exclude),
                DeliveryTarget::All => coordinator.deliver_to_all(&frame_type, payload, &exclude),
            };
            debug!(?target, frame_type = %frame_type, delivered = report.delivered, "Server delivery");
            let _ = reply.send(report);
        }
        Command::Publish {
            frame_type,
            payload,
            reply,
        } => {
            let _ = reply.send(coordinator.publish_event(&frame_type, payload));
        }
        Command::Members { room, reply } => {
            let mut members: Vec<SessionId> = coordinator.rooms().members_of(&room).into_iter().collect();
            members.sort();
            let _ = reply.send(members);
        }
        Command::Session { session_id, reply } => {
            let _ = reply.send(coordinator.session(&session_id).cloned());
        }
        Command::Stats { reply } => {
            let _ = reply.send(coordinator.stats());
        }
        Command::Consistency { reply } => {
            let _ = reply.send(coordinator.is_consistent());
        }
    }
}
