//! Wire shapes of the QRS resources the tool touches.
//!
//! These structs mirror the Repository's JSON exactly (camelCase fields,
//! integer-coded enums); conversions into the richer domain model live in
//! `model`. Unknown fields are ignored on decode and optional fields default
//! so that listing payloads from different QSEoW releases stay readable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{DaylightSaving, IncrementOption, RuleState};

/// `eventType` of a schema (time-based) event
pub const EVENT_TYPE_SCHEMA: i32 = 0;

/// `eventType` of a composite (dependency-based) event
pub const EVENT_TYPE_COMPOSITE: i32 = 1;

/// Condensed tag reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCondensed {
    pub id: Uuid,
    pub name: String,
}

/// Custom property definition with its declared choice set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPropertyDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub choice_values: Vec<String>,
    #[serde(default)]
    pub object_types: Vec<String>,
}

/// Condensed stream reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCondensed {
    pub id: Uuid,
    pub name: String,
}

/// Condensed app reference as embedded in task listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCondensed {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub stream: Option<StreamCondensed>,
    #[serde(default)]
    pub tags: Vec<TagCondensed>,
}

/// Condensed user reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCondensed {
    pub id: Uuid,
    pub user_directory: String,
    pub user_id: String,
}

/// Custom property value attached to a task or app
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPropertyValue {
    pub value: String,
    pub definition: CustomPropertyDefinitionCondensed,
}

/// Condensed definition reference inside a custom property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPropertyDefinitionCondensed {
    pub id: Uuid,
    pub name: String,
}

/// Last-execution block of a task's `operational` member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub stop_time: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
}

/// Operational state of a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operational {
    #[serde(default)]
    pub last_execution_result: Option<ExecutionResult>,
    #[serde(default)]
    pub next_execution: Option<String>,
}

/// Reload task as listed by `/qrs/reloadtask/full`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadTask {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub task_session_timeout: i32,
    #[serde(default)]
    pub max_retries: i32,
    #[serde(default)]
    pub is_partial_reload: bool,
    #[serde(default)]
    pub is_manually_triggered: bool,
    pub app: AppCondensed,
    #[serde(default)]
    pub tags: Vec<TagCondensed>,
    #[serde(default)]
    pub custom_properties: Vec<CustomPropertyValue>,
    #[serde(default)]
    pub operational: Option<Operational>,
}

/// External program task as listed by `/qrs/externalprogramtask/full`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProgramTask {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub task_session_timeout: i32,
    #[serde(default)]
    pub max_retries: i32,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub tags: Vec<TagCondensed>,
    #[serde(default)]
    pub custom_properties: Vec<CustomPropertyValue>,
    #[serde(default)]
    pub operational: Option<Operational>,
}

/// Owning-task reference embedded in event listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

/// Schema (time) event as listed by `/qrs/schemaevent/full`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaEvent {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub event_type: i32,
    #[serde(default)]
    pub increment_option: i32,
    #[serde(default)]
    pub increment_description: String,
    #[serde(default)]
    pub daylight_saving_time: i32,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub expiration_date: String,
    #[serde(default)]
    pub schema_filter_description: Vec<String>,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default)]
    pub reload_task: Option<TaskRef>,
    #[serde(default)]
    pub external_program_task: Option<TaskRef>,
}

impl SchemaEvent {
    /// GUID of the task owning this event, whichever kind it is
    pub fn owner_id(&self) -> Option<Uuid> {
        self.reload_task
            .as_ref()
            .or(self.external_program_task.as_ref())
            .map(|t| t.id)
    }
}

/// Sliding-window constraint of a composite event
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeConstraintWire {
    #[serde(default)]
    pub seconds: i32,
    #[serde(default)]
    pub minutes: i32,
    #[serde(default)]
    pub hours: i32,
    #[serde(default)]
    pub days: i32,
}

/// One rule of a composite event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRuleWire {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub rule_state: i32,
    #[serde(default)]
    pub reload_task: Option<TaskRef>,
    #[serde(default)]
    pub external_program_task: Option<TaskRef>,
}

impl CompositeRuleWire {
    /// GUID of the upstream task this rule points at
    pub fn upstream_id(&self) -> Option<Uuid> {
        self.reload_task
            .as_ref()
            .or(self.external_program_task.as_ref())
            .map(|t| t.id)
    }

    /// Name of the upstream task, when the listing carried one
    pub fn upstream_name(&self) -> Option<&str> {
        self.reload_task
            .as_ref()
            .or(self.external_program_task.as_ref())
            .and_then(|t| t.name.as_deref())
    }
}

/// Composite event as listed by `/qrs/compositeevent/full`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeEvent {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub event_type: i32,
    #[serde(default)]
    pub time_constraint: TimeConstraintWire,
    #[serde(default)]
    pub composite_rules: Vec<CompositeRuleWire>,
    #[serde(default)]
    pub reload_task: Option<TaskRef>,
    #[serde(default)]
    pub external_program_task: Option<TaskRef>,
}

impl CompositeEvent {
    /// GUID of the downstream task owning this event
    pub fn owner_id(&self) -> Option<Uuid> {
        self.reload_task
            .as_ref()
            .or(self.external_program_task.as_ref())
            .map(|t| t.id)
    }
}

//
// Creation payloads
//

/// Bare id reference used in creation payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: Uuid,
}

/// Custom property value in a creation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPropertyValueCreate {
    pub value: String,
    pub definition: CustomPropertyDefinitionCondensed,
}

/// Task part of a `/qrs/reloadtask/create` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadTaskSpec {
    pub name: String,
    pub app: IdRef,
    pub enabled: bool,
    pub task_session_timeout: i32,
    pub max_retries: i32,
    pub is_partial_reload: bool,
    pub is_manually_triggered: bool,
    pub tags: Vec<IdRef>,
    pub custom_properties: Vec<CustomPropertyValueCreate>,
}

/// Task part of a `/qrs/externalprogramtask/create` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProgramTaskSpec {
    pub name: String,
    pub path: String,
    pub parameters: String,
    pub enabled: bool,
    pub task_session_timeout: i32,
    pub max_retries: i32,
    pub tags: Vec<IdRef>,
    pub custom_properties: Vec<CustomPropertyValueCreate>,
}

/// Schema event embedded in a task creation payload. The owning task is
/// implicit; the Repository attaches nested events atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaEventCreate {
    pub name: String,
    pub enabled: bool,
    pub event_type: i32,
    pub increment_option: i32,
    pub increment_description: String,
    pub daylight_saving_time: i32,
    pub start_date: String,
    pub expiration_date: String,
    pub schema_filter_description: Vec<String>,
    pub time_zone: String,
}

/// `/qrs/reloadtask/create` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadTaskCreate {
    pub task: ReloadTaskSpec,
    pub schema_events: Vec<SchemaEventCreate>,
    pub composite_events: Vec<CompositeEventCreate>,
}

/// `/qrs/externalprogramtask/create` request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProgramTaskCreate {
    pub task: ExternalProgramTaskSpec,
    pub schema_events: Vec<SchemaEventCreate>,
    pub composite_events: Vec<CompositeEventCreate>,
}

/// One rule of a composite event creation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRuleCreate {
    pub rule_state: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_task: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_program_task: Option<IdRef>,
}

/// `/qrs/compositeevent` creation body, posted after its tasks exist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeEventCreate {
    pub name: String,
    pub enabled: bool,
    pub event_type: i32,
    pub time_constraint: TimeConstraintWire,
    pub composite_rules: Vec<CompositeRuleCreate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_task: Option<IdRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_program_task: Option<IdRef>,
}

//
// Integer-coded enum mappings
//

impl IncrementOption {
    pub fn to_wire(self) -> i32 {
        match self {
            IncrementOption::Once => 0,
            IncrementOption::Hourly => 1,
            IncrementOption::Daily => 2,
            IncrementOption::Weekly => 3,
            IncrementOption::Monthly => 4,
            IncrementOption::Custom => 5,
        }
    }

    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(IncrementOption::Once),
            1 => Some(IncrementOption::Hourly),
            2 => Some(IncrementOption::Daily),
            3 => Some(IncrementOption::Weekly),
            4 => Some(IncrementOption::Monthly),
            5 => Some(IncrementOption::Custom),
            _ => None,
        }
    }
}

impl DaylightSaving {
    pub fn to_wire(self) -> i32 {
        match self {
            DaylightSaving::ObserveDaylightSavingTime => 0,
            DaylightSaving::PermanentStandardTime => 1,
            DaylightSaving::PermanentDaylightSavingTime => 2,
        }
    }

    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(DaylightSaving::ObserveDaylightSavingTime),
            1 => Some(DaylightSaving::PermanentStandardTime),
            2 => Some(DaylightSaving::PermanentDaylightSavingTime),
            _ => None,
        }
    }
}

impl RuleState {
    pub fn to_wire(self) -> i32 {
        match self {
            RuleState::TaskSuccessful => 1,
            RuleState::TaskFail => 2,
        }
    }

    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(RuleState::TaskSuccessful),
            2 => Some(RuleState::TaskFail),
            _ => None,
        }
    }
}

/// Human-readable spelling of a task execution status code
pub fn execution_status_name(status: i32) -> &'static str {
    match status {
        0 => "NeverStarted",
        1 => "Triggered",
        2 => "Started",
        3 => "Queued",
        4 => "AbortInitiated",
        5 => "Aborting",
        6 => "Aborted",
        7 => "FinishedSuccess",
        8 => "FinishedFail",
        9 => "Skipped",
        10 => "Retry",
        11 => "Error",
        12 => "Reset",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_state_wire_mapping() {
        assert_eq!(RuleState::TaskSuccessful.to_wire(), 1);
        assert_eq!(RuleState::TaskFail.to_wire(), 2);
        assert_eq!(RuleState::from_wire(1), Some(RuleState::TaskSuccessful));
        assert_eq!(RuleState::from_wire(0), None);
    }

    #[test]
    fn test_increment_option_wire_round_trip() {
        for option in [
            IncrementOption::Once,
            IncrementOption::Hourly,
            IncrementOption::Daily,
            IncrementOption::Weekly,
            IncrementOption::Monthly,
            IncrementOption::Custom,
        ] {
            assert_eq!(IncrementOption::from_wire(option.to_wire()), Some(option));
        }
    }

    #[test]
    fn test_composite_event_decodes_listing_payload() {
        let raw = serde_json::json!({
            "id": "7552e4c6-9ad3-4b54-bbbe-0a0b0c0d0e0f",
            "name": "When both are done",
            "enabled": true,
            "eventType": 1,
            "timeConstraint": {"seconds": 0, "minutes": 360, "hours": 0, "days": 0},
            "compositeRules": [
                {
                    "id": "a9e0a1a2-0001-4b54-bbbe-0a0b0c0d0e0f",
                    "ruleState": 1,
                    "reloadTask": {"id": "b9e0a1a2-0002-4b54-bbbe-0a0b0c0d0e0f", "name": "Upstream"}
                }
            ],
            "reloadTask": {"id": "c9e0a1a2-0003-4b54-bbbe-0a0b0c0d0e0f", "name": "Downstream"},
            "privileges": null
        });
        let event: CompositeEvent =
            serde_json::from_value(raw).expect("listing payload should decode");
        assert_eq!(event.composite_rules.len(), 1);
        assert_eq!(
            event.composite_rules[0].upstream_name(),
            Some("Upstream")
        );
        assert_eq!(event.time_constraint.minutes, 360);
        assert!(event.owner_id().is_some());
    }

    #[test]
    fn test_composite_rule_create_skips_absent_task_kind() {
        let rule = CompositeRuleCreate {
            rule_state: 1,
            reload_task: Some(IdRef {
                id: Uuid::new_v4(),
            }),
            external_program_task: None,
        };
        let value = serde_json::to_value(&rule).unwrap();
        assert!(value.get("externalProgramTask").is_none());
        assert!(value.get("reloadTask").is_some());
    }
}
