//! Test modules for event dispatch

mod common;
