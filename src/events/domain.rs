//! Domain event catalogue
//!
//! Every event travels as one JSON object tagged by `eventType`; field names
//! are camelCase on the wire. Priorities are derived from the fields, never
//! read from input, so a producer cannot jump the queue by lying about them.

use crate::events::event::Event;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Base priority of "data ready" events
pub const DATA_READY_PRIORITY: f64 = 20.0;

/// Most error or warning entries carried by a `SourceProcessed` event
pub const MAX_ERRORS_IN_EVENT: usize = 100;

static SCAN_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_scan_id() -> u64 {
    SCAN_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Aggregation period of processed data
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum AggPeriod {
    Rt,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl AggPeriod {
    /// Added to the data-ready priority. Data in shorter periods can feed
    /// longer ones, so longer periods are dispatched slightly later.
    pub fn priority_offset(self) -> f64 {
        match self {
            AggPeriod::Rt => 0.1,
            AggPeriod::Hour => 0.2,
            AggPeriod::Day => 0.3,
            AggPeriod::Week => 0.5,
            AggPeriod::Month => 0.7,
            AggPeriod::Year => 0.8,
        }
    }
}

/// Priority of a data-ready event; `None` means raw, unaggregated data
pub fn data_ready_priority(agg_period: Option<AggPeriod>, high_priority: bool) -> f64 {
    let boost = if high_priority { 1.0 } else { 0.0 };
    DATA_READY_PRIORITY - boost + agg_period.map_or(0.0, AggPeriod::priority_offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum Severity {
    Error,
    Warning,
}

/// Whether a collection failure took out a whole source or a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ErrorScope {
    Source,
    Content,
}

/// Outcome counters of processing one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub warning_count: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub error_list: Vec<String>,
    #[serde(default)]
    pub warning_list: Vec<String>,
}

impl ProcessingResult {
    pub fn total_record_count(&self) -> u64 {
        self.success_count + self.warning_count + self.error_count
    }

    /// Cap both message lists, noting how many entries were dropped
    pub fn truncated(mut self, max_entries: usize) -> Self {
        truncate_messages(&mut self.error_list, max_entries);
        truncate_messages(&mut self.warning_list, max_entries);
        self
    }
}

fn truncate_messages(list: &mut Vec<String>, max_entries: usize) {
    if list.len() > max_entries {
        let dropped = list.len() - max_entries;
        list.truncate(max_entries);
        list.push(format!("... and more {}", dropped));
    }
}

/// The events exchanged between pipeline services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "eventType")]
pub enum DomainEvent {
    #[serde(rename_all = "camelCase")]
    DataLoaded {
        object_type: String,
        pipeline_name: String,
        agg_period: AggPeriod,
        timestamp_from: DateTime<Utc>,
        timestamp_to: DateTime<Utc>,
    },

    #[serde(rename_all = "camelCase")]
    FileReady {
        pipeline_name: String,
        filename: String,
        #[serde(default)]
        force: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archive_to: Option<String>,
        #[serde(default)]
        high_priority: bool,
    },

    #[serde(rename = "APIReady", rename_all = "camelCase")]
    #[strum(serialize = "APIReady")]
    ApiReady {
        pipeline_name: String,
        api_name: String,
    },

    #[serde(rename_all = "camelCase")]
    ReApplyTagging {
        pipeline_name: String,
        timestamp_from: DateTime<Utc>,
        timestamp_to: DateTime<Utc>,
    },

    #[serde(rename_all = "camelCase")]
    DataRetention {
        object_type: String,
        pipeline_name: String,
        agg_period: AggPeriod,
        days: u32,
    },

    #[serde(rename_all = "camelCase")]
    SourceProcessed {
        pipeline_name: String,
        source_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_size: Option<u64>,
        elapsed_time_ms: u64,
        #[serde(default)]
        total_record_count: u64,
        processing_result: ProcessingResult,
        execution_id: String,
    },

    #[serde(rename_all = "camelCase")]
    ScanForFiles {
        #[serde(default = "next_scan_id")]
        id: u64,
        pipeline_name: String,
        path: String,
        #[serde(default)]
        force: bool,
        #[serde(default)]
        high_priority: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archive_to: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    StorageSizeStats { pipeline_name: String },

    #[serde(rename_all = "camelCase")]
    FileSystemSizeStats {
        disk_used: u64,
        disk_size: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pct: Option<u64>,
    },

    #[serde(rename_all = "camelCase")]
    CollectionError {
        service_name: String,
        source_name: String,
        pipeline_name: String,
        message: String,
        #[serde(rename = "type")]
        severity: Severity,
        scope: ErrorScope,
    },
}

impl DomainEvent {
    /// `SourceProcessed` with the message lists capped and the record total
    /// filled in
    pub fn source_processed(
        pipeline_name: impl Into<String>,
        source_name: impl Into<String>,
        source_size: Option<u64>,
        elapsed_time_ms: u64,
        processing_result: ProcessingResult,
        execution_id: impl Into<String>,
    ) -> Self {
        let total_record_count = processing_result.total_record_count();
        DomainEvent::SourceProcessed {
            pipeline_name: pipeline_name.into(),
            source_name: source_name.into(),
            source_size,
            elapsed_time_ms,
            total_record_count,
            processing_result: processing_result.truncated(MAX_ERRORS_IN_EVENT),
            execution_id: execution_id.into(),
        }
    }

    /// `ScanForFiles` with a process-unique id, so two scan requests never
    /// merge while queued
    pub fn scan_for_files(
        pipeline_name: impl Into<String>,
        path: impl Into<String>,
        force: bool,
        high_priority: bool,
        archive_to: Option<String>,
    ) -> Self {
        DomainEvent::ScanForFiles {
            id: next_scan_id(),
            pipeline_name: pipeline_name.into(),
            path: path.into(),
            force,
            high_priority,
            archive_to,
        }
    }

    /// `FileSystemSizeStats` with the used percentage, omitted for a
    /// zero-sized disk
    pub fn file_system_size_stats(disk_used: u64, disk_size: u64) -> Self {
        let pct = (disk_size != 0)
            .then(|| (disk_used as f64 / disk_size as f64 * 100.0).round() as u64);
        DomainEvent::FileSystemSizeStats {
            disk_used,
            disk_size,
            pct,
        }
    }

    pub fn pipeline_name(&self) -> Option<&str> {
        match self {
            DomainEvent::DataLoaded { pipeline_name, .. }
            | DomainEvent::FileReady { pipeline_name, .. }
            | DomainEvent::ApiReady { pipeline_name, .. }
            | DomainEvent::ReApplyTagging { pipeline_name, .. }
            | DomainEvent::DataRetention { pipeline_name, .. }
            | DomainEvent::SourceProcessed { pipeline_name, .. }
            | DomainEvent::ScanForFiles { pipeline_name, .. }
            | DomainEvent::StorageSizeStats { pipeline_name }
            | DomainEvent::CollectionError { pipeline_name, .. } => Some(pipeline_name),
            DomainEvent::FileSystemSizeStats { .. } => None,
        }
    }

    /// `DataLoaded`, `FileReady` and `APIReady`
    pub fn is_data_ready(&self) -> bool {
        matches!(
            self,
            DomainEvent::DataLoaded { .. }
                | DomainEvent::FileReady { .. }
                | DomainEvent::ApiReady { .. }
        )
    }
}

impl Event for DomainEvent {
    fn event_type(&self) -> &str {
        <&'static str>::from(self)
    }

    fn priority(&self) -> f64 {
        match self {
            DomainEvent::DataLoaded { agg_period, .. } => {
                data_ready_priority(Some(*agg_period), false)
            }
            DomainEvent::FileReady { high_priority, .. } => {
                data_ready_priority(None, *high_priority)
            }
            DomainEvent::ApiReady { .. } => data_ready_priority(None, false),
            DomainEvent::ReApplyTagging { .. } => 15.0,
            DomainEvent::DataRetention { .. } => 20.0,
            DomainEvent::SourceProcessed { .. } => 5.0,
            DomainEvent::ScanForFiles { .. } => 10.0,
            DomainEvent::StorageSizeStats { .. } => 15.0,
            DomainEvent::FileSystemSizeStats { .. } => 15.0,
            DomainEvent::CollectionError { .. } => 2.0,
        }
    }

    fn describe(&self) -> String {
        match self {
            DomainEvent::DataLoaded {
                object_type,
                agg_period,
                timestamp_from,
                timestamp_to,
                ..
            } => format!(
                "{} {}.{} ({}-{})",
                self.event_type(),
                object_type,
                agg_period,
                timestamp_from.to_rfc3339_opts(SecondsFormat::Secs, true),
                timestamp_to.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            DomainEvent::SourceProcessed { source_name, .. } => {
                format!("{} {}", self.event_type(), source_name)
            }
            DomainEvent::FileReady {
                filename, force, ..
            } => format!(
                "{} {}{}",
                self.event_type(),
                filename,
                if *force { " FORCE" } else { "" }
            ),
            DomainEvent::CollectionError {
                source_name,
                message,
                ..
            } => format!("{} {}:{}", self.event_type(), source_name, message),
            _ => self.event_type().to_string(),
        }
    }

    fn aggregation_period(&self) -> Option<AggPeriod> {
        match self {
            DomainEvent::DataLoaded { agg_period, .. } => Some(*agg_period),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use strum::IntoEnumIterator;

    fn hour_loaded() -> DomainEvent {
        DomainEvent::DataLoaded {
            object_type: "traffic".into(),
            pipeline_name: "edge".into(),
            agg_period: AggPeriod::Hour,
            timestamp_from: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            timestamp_to: Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_longer_periods_dispatch_later() {
        let priorities: Vec<f64> = AggPeriod::iter()
            .map(|period| data_ready_priority(Some(period), false))
            .collect();

        assert!(priorities.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(data_ready_priority(None, false), 20.0);
        assert_eq!(data_ready_priority(None, true), 19.0);
        assert!((hour_loaded().priority() - 20.2).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_priorities() {
        assert_eq!(
            DomainEvent::StorageSizeStats {
                pipeline_name: "p".into()
            }
            .priority(),
            15.0
        );
        assert_eq!(DomainEvent::file_system_size_stats(1, 2).priority(), 15.0);
        assert_eq!(
            DomainEvent::scan_for_files("p", "/in", false, false, None).priority(),
            10.0
        );
    }

    #[test]
    fn test_wire_format_uses_event_type_tag() {
        let event = DomainEvent::FileReady {
            pipeline_name: "edge".into(),
            filename: "a.csv".into(),
            force: true,
            archive_to: None,
            high_priority: false,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "FileReady");
        assert_eq!(json["pipelineName"], "edge");
        assert!(json.get("archiveTo").is_none());

        let api: DomainEvent = serde_json::from_str(
            r#"{"eventType":"APIReady","pipelineName":"edge","apiName":"meters","priority":1}"#,
        )
        .unwrap();
        assert_eq!(api.event_type(), "APIReady");
        assert_eq!(api.priority(), 20.0);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(
            hour_loaded().describe(),
            "DataLoaded traffic.HOUR (2024-05-01T10:00:00Z-2024-05-01T11:00:00Z)"
        );

        let error = DomainEvent::CollectionError {
            service_name: "collector".into(),
            source_name: "s1".into(),
            pipeline_name: "edge".into(),
            message: "timeout".into(),
            severity: Severity::Warning,
            scope: ErrorScope::Source,
        };
        assert_eq!(error.describe(), "CollectionError s1:timeout");
        assert_eq!(
            DomainEvent::file_system_size_stats(0, 0).describe(),
            "FileSystemSizeStats"
        );
    }

    #[test]
    fn test_source_processed_caps_message_lists() {
        let result = ProcessingResult {
            success_count: 10,
            warning_count: 2,
            error_count: 150,
            error_list: (0..150).map(|i| format!("row {}", i)).collect(),
            warning_list: vec!["w".into(); 2],
        };

        let event = DomainEvent::source_processed("edge", "a.csv", Some(1024), 40, result, "run-1");

        match event {
            DomainEvent::SourceProcessed {
                total_record_count,
                processing_result,
                ..
            } => {
                assert_eq!(total_record_count, 162);
                assert_eq!(processing_result.error_list.len(), 101);
                assert_eq!(
                    processing_result.error_list.last().map(String::as_str),
                    Some("... and more 50")
                );
                assert_eq!(processing_result.warning_list.len(), 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_disk_percentage_absent_for_zero_size() {
        assert_eq!(
            DomainEvent::file_system_size_stats(250, 1000),
            DomainEvent::FileSystemSizeStats {
                disk_used: 250,
                disk_size: 1000,
                pct: Some(25)
            }
        );
        let json = serde_json::to_value(DomainEvent::file_system_size_stats(5, 0)).unwrap();
        assert!(json.get("pct").is_none());
    }

    #[test]
    fn test_scan_requests_never_compare_equal() {
        let first = DomainEvent::scan_for_files("edge", "/in", false, false, None);
        let second = DomainEvent::scan_for_files("edge", "/in", false, false, None);
        assert_ne!(first, second);
    }

    #[test]
    fn test_only_data_loaded_carries_aggregation() {
        assert_eq!(hour_loaded().aggregation_period(), Some(AggPeriod::Hour));
        let file = DomainEvent::FileReady {
            pipeline_name: "edge".into(),
            filename: "a.csv".into(),
            force: false,
            archive_to: None,
            high_priority: true,
        };
        assert!(file.is_data_ready());
        assert_eq!(file.aggregation_period(), None);
        assert_eq!(file.priority(), 19.0);
    }
}
