//! Estado das threads, como visto pelo OOM killer

pub mod state;

pub use state::TaskState;
