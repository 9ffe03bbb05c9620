//! Global logger installation and runtime level changes

use eventpipe::core::logging::{init_logging, reconfigure_logging, LoggingError};
use serial_test::serial;
use std::sync::OnceLock;

static LOG_FILE: OnceLock<tempfile::TempDir> = OnceLock::new();

/// The logger can only be installed once per process
fn ensure_logger() {
    let dir = LOG_FILE.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eventpipe.log");
        init_logging(Some("info"), Some("json"), path.to_str(), false).unwrap();
        dir
    });
    assert!(dir.path().exists());
}

#[test]
#[serial]
fn test_level_can_be_changed_after_start() {
    ensure_logger();

    assert!(reconfigure_logging("debug").is_ok());
    assert!(reconfigure_logging("warn,eventpipe::stream=trace").is_ok());
    log::warn!("logged after reconfiguration");
}

#[test]
#[serial]
fn test_invalid_level_is_rejected() {
    ensure_logger();

    let error = reconfigure_logging("eventpipe=notalevel").unwrap_err();
    assert!(matches!(error, LoggingError::Spec(_)));
}

#[test]
#[serial]
fn test_blank_level_falls_back_to_info() {
    ensure_logger();

    assert!(reconfigure_logging("  ").is_ok());
}
