// Event routing and fan-out
//
// The router decodes inbound realtime frames and decides where they go; the
// broadcaster performs the actual best-effort delivery.

// Public API - what other modules can use
pub use broadcast::{Broadcaster, DeliveryReport};
pub use errors::{DeliveryError, RouteError};
pub use router::{dispatch_domain_event, EventRouter, ADMIN_ROOM, DEPARTMENT_ROOM_PREFIX};

// Internal modules
mod broadcast;
mod errors;
mod router;
