pub mod app;
pub mod core;
pub mod events;
pub mod queue;
pub mod stream;

include!(concat!(env!("OUT_DIR"), "/version.rs"));
