//! Background job processing
//!
//! The export worker is a separate process from the API server; the two
//! coordinate only through the job store and the durable queue.

pub mod processor;
pub mod worker;

pub use worker::WorkerPool;
