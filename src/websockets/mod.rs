// Public API
pub use handler::{websocket_handler, ConnectParams};
pub use messages::{frame_types, timestamp_now, Frame, SERVER_ORIGIN};
pub use socket::{Connection, MessageHandler, SocketError, SocketWrapper};

// Internal modules
mod handler;
mod messages;
mod socket;
