//! Test modules for CLI parsing
