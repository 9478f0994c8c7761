pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use error::QueueError;
pub use models::*;
pub use router::create_waiting_queue_router;
