// Public API - what other modules can use
pub use handle::{CoordinatorError, CoordinatorHandle, DeliveryTarget};
pub use handlers::{deliver_to_all, deliver_to_room, health, publish_event, room_members, DeliveryRequest, MembersResponse};
pub use state::{Coordinator, CoordinatorStats};

// Internal modules
mod handle;
mod handlers;
mod state;
