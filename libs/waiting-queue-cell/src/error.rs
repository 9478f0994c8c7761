use thiserror::Error;

use crate::models::QueueEntryStatus;

#[derive(Error, Debug, Clone)]
pub enum QueueError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Queue entry not found")]
    NotFound,

    #[error("Invalid queue transition from {current}")]
    State { current: QueueEntryStatus },

    #[error("Store error: {0}")]
    Store(String),
}
