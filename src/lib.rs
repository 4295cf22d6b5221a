pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logs;
pub mod matrix;
pub mod row_worker;
pub mod rows;
pub mod status;
pub mod worker;

pub use buffer::ResultBuffer;
pub use config::{BackendKind, SessionConfig, WorkerSpec};
pub use coordinator::{SessionCoordinator, SessionState, SessionSummary};
pub use error::{OrchestraErr, Result};
pub use matrix::Matrix;
pub use rows::{RowBackend, RowDispatcher};
pub use worker::MatrixWorker;
