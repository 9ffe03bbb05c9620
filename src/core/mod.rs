//! Core services and infrastructure

pub mod error_handling;
pub mod fatal;
pub mod logging;
pub mod mutex;
pub mod retry;
pub mod shutdown;
pub mod sync;
pub mod time;
