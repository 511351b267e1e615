// Public API - what other modules can use
pub use index::{LeaveOutcome, RoomIndex};

// Internal modules
mod index;
