//! Normalized task, trigger, and event types.
//!
//! These are the in-memory shapes of §"task graph" used across the tool;
//! QRS wire structs live in `qrs::types` and are converted on ingest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel meaning "never happened"
pub const NEVER_TIMESTAMP: &str = "1753-01-01T00:00:00.000Z";

/// Sentinel meaning "no expiration"
pub const NO_EXPIRATION_TIMESTAMP: &str = "9999-01-01T00:00:00.000Z";

/// Wire timestamp format used by QRS
pub const QRS_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Render a timestamp the way QRS expects it
pub fn format_qrs_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(QRS_TIMESTAMP_FORMAT).to_string()
}

/// Parse a QRS or source timestamp (RFC 3339, `Z` suffix)
pub fn parse_qrs_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Task flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    Reload,
    ExternalProgram,
}

impl TaskKind {
    /// Spelling used in the tabular grammar's `Task type` column
    pub fn as_source_str(&self) -> &'static str {
        match self {
            TaskKind::Reload => "Reload",
            TaskKind::ExternalProgram => "External program",
        }
    }

    pub fn from_source_str(value: &str) -> Option<Self> {
        match value {
            "Reload" => Some(TaskKind::Reload),
            "External program" => Some(TaskKind::ExternalProgram),
            _ => None,
        }
    }
}

/// Terminal state a composite rule waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleState {
    TaskSuccessful,
    TaskFail,
}

impl RuleState {
    pub fn as_source_str(&self) -> &'static str {
        match self {
            RuleState::TaskSuccessful => "TaskSuccessful",
            RuleState::TaskFail => "TaskFail",
        }
    }

    pub fn from_source_str(value: &str) -> Option<Self> {
        match value {
            "TaskSuccessful" => Some(RuleState::TaskSuccessful),
            "TaskFail" => Some(RuleState::TaskFail),
            _ => None,
        }
    }
}

/// Schedule repetition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncrementOption {
    Once,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl IncrementOption {
    pub fn as_source_str(&self) -> &'static str {
        match self {
            IncrementOption::Once => "once",
            IncrementOption::Hourly => "hourly",
            IncrementOption::Daily => "daily",
            IncrementOption::Weekly => "weekly",
            IncrementOption::Monthly => "monthly",
            IncrementOption::Custom => "custom",
        }
    }

    pub fn from_source_str(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "once" => Some(IncrementOption::Once),
            "hourly" => Some(IncrementOption::Hourly),
            "daily" => Some(IncrementOption::Daily),
            "weekly" => Some(IncrementOption::Weekly),
            "monthly" => Some(IncrementOption::Monthly),
            "custom" => Some(IncrementOption::Custom),
            _ => None,
        }
    }
}

/// Daylight-saving handling of a schedule trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaylightSaving {
    ObserveDaylightSavingTime,
    PermanentStandardTime,
    PermanentDaylightSavingTime,
}

impl DaylightSaving {
    pub fn as_source_str(&self) -> &'static str {
        match self {
            DaylightSaving::ObserveDaylightSavingTime => "ObserveDaylightSavingTime",
            DaylightSaving::PermanentStandardTime => "PermanentStandardTime",
            DaylightSaving::PermanentDaylightSavingTime => "PermanentDaylightSavingTime",
        }
    }

    pub fn from_source_str(value: &str) -> Option<Self> {
        match value {
            "ObserveDaylightSavingTime" => Some(DaylightSaving::ObserveDaylightSavingTime),
            "PermanentStandardTime" => Some(DaylightSaving::PermanentStandardTime),
            "PermanentDaylightSavingTime" => Some(DaylightSaving::PermanentDaylightSavingTime),
            _ => None,
        }
    }
}

/// App reference in an import source: either a server GUID or the app
/// uploaded under `App counter = n` in the same run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppRef {
    Guid(Uuid),
    NewApp(u32),
}

impl AppRef {
    /// Parse the `App id` cell: a GUID or `newapp-<n>`
    pub fn parse(value: &str) -> Option<Self> {
        if let Ok(guid) = Uuid::parse_str(value) {
            return Some(AppRef::Guid(guid));
        }
        value
            .strip_prefix("newapp-")
            .and_then(|n| n.parse::<u32>().ok())
            .map(AppRef::NewApp)
    }
}

/// Time-based fire rule attached to exactly one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaTrigger {
    pub name: String,
    pub enabled: bool,
    pub increment_option: IncrementOption,
    /// Four integers: minutes, hours, days, weeks
    pub increment_description: String,
    pub daylight_saving: DaylightSaving,
    pub start: DateTime<Utc>,
    /// `9999-01-01T00:00:00.000Z` means "never expires"
    pub expiration: DateTime<Utc>,
    /// Seven-field scheduling window
    pub filter_description: String,
    /// IANA time zone name
    pub time_zone: String,
}

impl SchemaTrigger {
    pub fn never_expires(&self) -> bool {
        format_qrs_timestamp(&self.expiration) == NO_EXPIRATION_TIMESTAMP
    }
}

/// Sliding window within which all of a composite event's dependencies must
/// have fired. All-zero is forwarded to the Repository verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeConstraint {
    pub seconds: u32,
    pub minutes: u32,
    pub hours: u32,
    pub days: u32,
}

impl TimeConstraint {
    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.minutes == 0 && self.hours == 0 && self.days == 0
    }
}

/// Edge from an upstream task to a composite event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeRule {
    /// Upstream task GUID
    pub upstream: Uuid,
    pub state: RuleState,
    /// Upstream task name, when known (export decoration)
    pub upstream_name: Option<String>,
}

/// Dependency-based fire rule attached to exactly one downstream task.
/// The rule list is a conjunction and is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeTrigger {
    /// Server GUID, when the event came from QSEoW
    pub id: Option<Uuid>,
    pub name: String,
    pub enabled: bool,
    pub time_constraint: TimeConstraint,
    pub rules: Vec<CompositeRule>,
}

/// Kind-specific task payload. The kind determines which fields are
/// meaningful; the parser rejects stray fields on the wrong kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskPayload {
    Reload {
        app_id: Uuid,
        app_name: Option<String>,
        partial_reload: bool,
        manually_triggered: bool,
    },
    ExternalProgram {
        path: String,
        parameters: String,
    },
}

/// Operational state mirrored from the Repository's task listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub last_status: Option<String>,
    pub last_start: Option<DateTime<Utc>>,
    pub last_stop: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<i64>,
    pub next_execution: Option<DateTime<Utc>>,
}

/// A unit of work scheduled by QSEoW, with its triggers attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub kind: TaskKind,
    pub name: String,
    pub enabled: bool,
    pub session_timeout_minutes: u32,
    pub max_retries: u32,
    pub payload: TaskPayload,
    /// Tag names, resolved against the server population
    pub tags: Vec<String>,
    /// Custom property name/value pairs
    pub custom_properties: Vec<(String, String)>,
    pub schema_triggers: Vec<SchemaTrigger>,
    pub composite_triggers: Vec<CompositeTrigger>,
    pub execution: ExecutionState,
}

impl Task {
    pub fn app_id(&self) -> Option<Uuid> {
        match &self.payload {
            TaskPayload::Reload { app_id, .. } => Some(*app_id),
            TaskPayload::ExternalProgram { .. } => None,
        }
    }

    pub fn app_name(&self) -> Option<&str> {
        match &self.payload {
            TaskPayload::Reload { app_name, .. } => app_name.as_deref(),
            TaskPayload::ExternalProgram { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_round_trips_through_chrono() {
        let parsed = parse_qrs_timestamp(NO_EXPIRATION_TIMESTAMP).expect("sentinel parses");
        assert_eq!(format_qrs_timestamp(&parsed), NO_EXPIRATION_TIMESTAMP);

        let never = parse_qrs_timestamp(NEVER_TIMESTAMP).expect("sentinel parses");
        assert_eq!(format_qrs_timestamp(&never), NEVER_TIMESTAMP);
    }

    #[test]
    fn test_app_ref_parses_guid_and_counter() {
        let guid = Uuid::new_v4();
        assert_eq!(
            AppRef::parse(&guid.to_string()),
            Some(AppRef::Guid(guid))
        );
        assert_eq!(AppRef::parse("newapp-3"), Some(AppRef::NewApp(3)));
        assert_eq!(AppRef::parse("newapp-x"), None);
        assert_eq!(AppRef::parse("not-a-ref"), None);
    }

    #[test]
    fn test_task_kind_source_spelling() {
        assert_eq!(
            TaskKind::from_source_str("External program"),
            Some(TaskKind::ExternalProgram)
        );
        assert_eq!(TaskKind::from_source_str("Reload"), Some(TaskKind::Reload));
        assert_eq!(TaskKind::from_source_str("reload"), None);
    }

    #[test]
    fn test_time_constraint_zero() {
        assert!(TimeConstraint::default().is_zero());
        assert!(!TimeConstraint {
            seconds: 1,
            ..Default::default()
        }
        .is_zero());
    }

    #[test]
    fn test_never_expires_uses_sentinel() {
        let trigger = SchemaTrigger {
            name: "Daily".to_string(),
            enabled: true,
            increment_option: IncrementOption::Daily,
            increment_description: "0 0 1 0".to_string(),
            daylight_saving: DaylightSaving::ObserveDaylightSavingTime,
            start: parse_qrs_timestamp("2024-01-01T00:00:00.000Z").unwrap(),
            expiration: parse_qrs_timestamp(NO_EXPIRATION_TIMESTAMP).unwrap(),
            filter_description: "* * - * * * *".to_string(),
            time_zone: "Europe/Stockholm".to_string(),
        };
        assert!(trigger.never_expires());
    }
}
