pub mod queue;

pub use queue::WaitingQueueService;
