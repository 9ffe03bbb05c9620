//! Test modules for the stream binding

mod common;
mod producer;
