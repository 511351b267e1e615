use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::SessionId;

/// Simple WebSocket abstraction - all we care about is send/receive
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text frame to the client
    async fn send_message(&mut self, message: String) -> Result<(), SocketError>;

    /// Next text frame from the client (None once the connection is closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;

    async fn close(&mut self) -> Result<(), SocketError>;
}

/// Handler for frames arriving on an open connection
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, session_id: &SessionId, message: String);
}

#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        loop {
            match self.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // axum answers pings itself; binary frames are not part of the protocol
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SocketError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), SocketError> {
        self.send(Message::Close(None))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }
}

/// One open client connection.
///
/// Pumps frames queued on the session's outbound channel to the socket and
/// hands every inbound text frame to the message handler, until either side
/// goes away.
pub struct Connection {
    pub session_id: SessionId,
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<String>,
    message_handler: Arc<dyn MessageHandler>,
}

impl Connection {
    pub fn new(
        session_id: SessionId,
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<String>,
        message_handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            session_id,
            socket,
            outbound_receiver,
            message_handler,
        }
    }

    /// Run the connection - handles both sending and receiving until disconnect
    pub async fn run(mut self) -> Result<(), SocketError> {
        loop {
            tokio::select! {
                msg = self.outbound_receiver.recv() => {
                    match msg {
                        Some(message) => self.socket.send_message(message).await?,
                        None => break,
                    }
                }

                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            self.message_handler
                                .handle_message(&self.session_id, message)
                                .await;
                        }
                        Ok(None) => break,
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        let _ = self.socket.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted socket: yields queued inbound frames, records what was sent
    struct MockSocket {
        inbound: VecDeque<String>,
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
        hold_open: bool,
    }

    #[async_trait]
    impl SocketWrapper for MockSocket {
        async fn send_message(&mut self, message: String) -> Result<(), SocketError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
            match self.inbound.pop_front() {
                Some(message) => Ok(Some(message)),
                None if self.hold_open => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn close(&mut self) -> Result<(), SocketError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        received: Mutex<Vec<(SessionId, String)>>,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle_message(&self, session_id: &SessionId, message: String) {
            self.received
                .lock()
                .unwrap()
                .push((session_id.clone(), message));
        }
    }

    fn mock_socket(inbound: &[&str], hold_open: bool) -> (MockSocket, Arc<Mutex<Vec<String>>>, Arc<Mutex<bool>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        let socket = MockSocket {
            inbound: inbound.iter().map(|s| s.to_string()).collect(),
            sent: sent.clone(),
            closed: closed.clone(),
            hold_open,
        };
        (socket, sent, closed)
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_handler_until_client_closes() {
        let (socket, _sent, closed) = mock_socket(&[r#"{"type":"a"}"#, r#"{"type":"b"}"#], false);
        let handler = Arc::new(RecordingHandler::default());
        let (_tx, rx) = mpsc::unbounded_channel();
        let id = SessionId::from("s-1");

        Connection::new(id.clone(), Box::new(socket), rx, handler.clone())
            .run()
            .await
            .unwrap();

        let received = handler.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], (id.clone(), r#"{"type":"a"}"#.to_string()));
        assert_eq!(received[1].1, r#"{"type":"b"}"#);
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_outbound_frames_are_written_until_channel_closes() {
        let (socket, sent, closed) = mock_socket(&[], true);
        let handler = Arc::new(RecordingHandler::default());
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send("first".to_string()).unwrap();
        tx.send("second".to_string()).unwrap();
        drop(tx);

        Connection::new(SessionId::from("s-1"), Box::new(socket), rx, handler)
            .run()
            .await
            .unwrap();

        assert_eq!(*sent.lock().unwrap(), vec!["first".to_string(), "second".to_string()]);
        assert!(*closed.lock().unwrap());
    }
}
