pub mod config;
pub mod error;
pub mod shutdown;
pub mod stream;
pub mod worker;

pub use error::{Result, WorkerError};
