//! Import source parsing and validation.
//!
//! Rows are grouped by `Task counter`; within a task by `Event counter`;
//! within a composite event by `Rule counter`. The first row of a task
//! group carries the top-level task fields, subsequent rows describe
//! triggers and rules. Cell values merged across a group must agree, which
//! keeps the parse independent of row order inside the group.
//!
//! Diagnostics are collected into a vector rather than aborting on the
//! first offence; the import driver treats a non-empty vector as fatal.

pub mod columns;
pub mod source;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::errors::ParseError;
use crate::model::types::{
    parse_qrs_timestamp, DaylightSaving, IncrementOption, RuleState, SchemaTrigger, TaskKind,
    TimeConstraint, NO_EXPIRATION_TIMESTAMP,
};
use columns::{AppColumn, ColRefBy, ColumnResolver, LogicalColumn, TaskColumn};
use source::SourceTable;

/// Default session timeout (minutes) when the source leaves the cell empty
const DEFAULT_TASK_TIMEOUT_MINUTES: u32 = 1440;

/// Default seven-field scheduling window: always open
const DEFAULT_FILTER_DESCRIPTION: &str = "* * - * * * *";

/// Parser configuration
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub col_ref_by: ColRefBy,
    /// Retain only rows with `Task counter <= N`; 0 means no limit
    pub limit_import_count: u32,
}

/// One task described by the source, triggers included. App and rule
/// references are kept raw; the resolver turns them into GUIDs.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskImportRecord {
    pub counter: u32,
    pub kind: TaskKind,
    pub name: String,
    /// `Task id` cell: the local handle other rows may reference
    pub source_id: String,
    pub enabled: bool,
    pub timeout_minutes: u32,
    pub max_retries: u32,
    /// Raw `App id` cell (GUID or `newapp-<n>`); reload tasks only
    pub app_ref: Option<String>,
    pub partial_reload: bool,
    pub manually_triggered: bool,
    pub ext_program_path: Option<String>,
    pub ext_program_parameters: Option<String>,
    pub tags: Vec<String>,
    pub custom_properties: Vec<(String, String)>,
    pub schema_triggers: Vec<SchemaTrigger>,
    pub composite_triggers: Vec<CompositeTriggerRecord>,
    /// First source row of the group, for diagnostics
    pub row: usize,
}

/// One composite event described by the source
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeTriggerRecord {
    pub counter: u32,
    pub name: String,
    pub enabled: bool,
    pub time_constraint: TimeConstraint,
    pub rules: Vec<CompositeRuleRecord>,
    pub row: usize,
}

/// One rule of a composite event, reference unresolved
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeRuleRecord {
    pub counter: u32,
    pub state: RuleState,
    pub task_name: String,
    /// Raw `Rule task id` cell: a GUID of an existing task or the `Task id`
    /// of another row in the same import
    pub task_ref: String,
    pub row: usize,
}

/// One app upload described by the companion app sheet
#[derive(Debug, Clone, PartialEq)]
pub struct AppImportRecord {
    pub counter: u32,
    pub name: String,
    pub qvf_directory: String,
    pub qvf_name: String,
    pub exclude_data_connections: bool,
    pub tags: Vec<String>,
    pub custom_properties: Vec<(String, String)>,
    pub owner: Option<(String, String)>,
    pub publish_to_stream: Option<String>,
    pub row: usize,
}

type GroupRows<'a> = Vec<(usize, &'a [String])>;

/// Parse the task sheet into task records, collecting every diagnostic
pub fn parse_tasks(
    table: &SourceTable,
    opts: &ParseOptions,
) -> Result<Vec<TaskImportRecord>, Vec<ParseError>> {
    let resolver =
        ColumnResolver::<TaskColumn>::build(opts.col_ref_by, &table.headers).map_err(|e| vec![e])?;

    let mut errors = Vec::new();
    let mut groups: IndexMap<u32, GroupRows> = IndexMap::new();

    for (idx, row) in table.rows.iter().enumerate() {
        let row_no = SourceTable::row_number(idx);
        let raw = resolver.value(row, TaskColumn::TaskCounter);
        if raw.is_empty() {
            errors.push(ParseError::MissingValue {
                row: row_no,
                column: TaskColumn::TaskCounter.header().to_string(),
            });
            continue;
        }
        let counter = match raw.parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => {
                errors.push(ParseError::TypeCoercion {
                    row: row_no,
                    column: TaskColumn::TaskCounter.header().to_string(),
                    value: raw.to_string(),
                    expected: "integer >= 1",
                });
                continue;
            }
        };
        if opts.limit_import_count > 0 && counter > opts.limit_import_count {
            continue;
        }
        groups
            .entry(counter)
            .or_default()
            .push((row_no, row.as_slice()));
    }

    let mut records = Vec::with_capacity(groups.len());
    for (counter, rows) in groups {
        if let Some(record) = parse_task_group(counter, &rows, &resolver, &mut errors) {
            records.push(record);
        }
    }

    debug!(
        "Parsed {} task record(s), {} diagnostic(s)",
        records.len(),
        errors.len()
    );
    if errors.is_empty() {
        Ok(records)
    } else {
        Err(errors)
    }
}

fn parse_task_group(
    counter: u32,
    rows: &GroupRows,
    resolver: &ColumnResolver<TaskColumn>,
    errors: &mut Vec<ParseError>,
) -> Option<TaskImportRecord> {
    let before = errors.len();
    let (first_row_no, first) = rows[0];

    let kind = match TaskKind::from_source_str(resolver.value(first, TaskColumn::TaskType)) {
        Some(kind) => kind,
        None => {
            errors.push(ParseError::TypeCoercion {
                row: first_row_no,
                column: TaskColumn::TaskType.header().to_string(),
                value: resolver.value(first, TaskColumn::TaskType).to_string(),
                expected: "'Reload' or 'External program'",
            });
            return None;
        }
    };

    let name = resolver.value(first, TaskColumn::TaskName).to_string();
    if name.is_empty() {
        errors.push(ParseError::MissingValue {
            row: first_row_no,
            column: TaskColumn::TaskName.header().to_string(),
        });
    }

    let enabled = coerce_bool01(
        resolver.value(first, TaskColumn::TaskEnabled),
        first_row_no,
        TaskColumn::TaskEnabled.header(),
        errors,
    );
    let timeout_minutes = coerce_u32(
        resolver.value(first, TaskColumn::TaskTimeout),
        first_row_no,
        TaskColumn::TaskTimeout.header(),
        1,
        errors,
    )
    .unwrap_or(DEFAULT_TASK_TIMEOUT_MINUTES);
    let max_retries = coerce_u32(
        resolver.value(first, TaskColumn::TaskRetries),
        first_row_no,
        TaskColumn::TaskRetries.header(),
        0,
        errors,
    )
    .unwrap_or(0);

    let tags = split_list(resolver.value(first, TaskColumn::Tags));
    let custom_properties = split_pairs(
        resolver.value(first, TaskColumn::CustomProperties),
        first_row_no,
        TaskColumn::CustomProperties.header(),
        errors,
    );

    let app_raw = resolver.value(first, TaskColumn::AppId);
    let ext_path_raw = resolver.value(first, TaskColumn::ExtPgmPath);
    let ext_params_raw = resolver.value(first, TaskColumn::ExtPgmParameters);
    let partial_raw = resolver.value(first, TaskColumn::PartialReload);
    let manual_raw = resolver.value(first, TaskColumn::ManuallyTriggered);

    let mut app_ref = None;
    let mut partial_reload = false;
    let mut manually_triggered = false;
    let mut ext_program_path = None;
    let mut ext_program_parameters = None;

    match kind {
        TaskKind::Reload => {
            if app_raw.is_empty() {
                errors.push(ParseError::MissingValue {
                    row: first_row_no,
                    column: TaskColumn::AppId.header().to_string(),
                });
            } else {
                app_ref = Some(app_raw.to_string());
            }
            partial_reload = coerce_bool01(
                partial_raw,
                first_row_no,
                TaskColumn::PartialReload.header(),
                errors,
            );
            manually_triggered = coerce_bool01(
                manual_raw,
                first_row_no,
                TaskColumn::ManuallyTriggered.header(),
                errors,
            );
            for (raw, col) in [
                (ext_path_raw, TaskColumn::ExtPgmPath),
                (ext_params_raw, TaskColumn::ExtPgmParameters),
            ] {
                if !raw.is_empty() {
                    errors.push(ParseError::StrayField {
                        row: first_row_no,
                        column: col.header().to_string(),
                        task_type: "Reload",
                    });
                }
            }
        }
        TaskKind::ExternalProgram => {
            for (raw, col) in [
                (app_raw, TaskColumn::AppId),
                (partial_raw, TaskColumn::PartialReload),
                (manual_raw, TaskColumn::ManuallyTriggered),
            ] {
                if !raw.is_empty() && raw != "0" {
                    errors.push(ParseError::StrayField {
                        row: first_row_no,
                        column: col.header().to_string(),
                        task_type: "External program",
                    });
                }
            }
            if ext_path_raw.is_empty() {
                errors.push(ParseError::MissingValue {
                    row: first_row_no,
                    column: TaskColumn::ExtPgmPath.header().to_string(),
                });
            } else {
                ext_program_path = Some(ext_path_raw.to_string());
            }
            if !ext_params_raw.is_empty() {
                ext_program_parameters = Some(ext_params_raw.to_string());
            }
        }
    }

    // Event rows, grouped and ordered by event counter
    let mut event_groups: BTreeMap<u32, GroupRows> = BTreeMap::new();
    for &(row_no, row) in rows {
        let raw = resolver.value(row, TaskColumn::EventCounter);
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<u32>() {
            Ok(event_counter) => {
                event_groups
                    .entry(event_counter)
                    .or_default()
                    .push((row_no, row));
            }
            Err(_) => errors.push(ParseError::TypeCoercion {
                row: row_no,
                column: TaskColumn::EventCounter.header().to_string(),
                value: raw.to_string(),
                expected: "integer",
            }),
        }
    }

    let mut schema_triggers = Vec::new();
    let mut composite_triggers = Vec::new();
    for (event_counter, event_rows) in &event_groups {
        parse_event_group(
            counter,
            *event_counter,
            event_rows,
            resolver,
            &mut schema_triggers,
            &mut composite_triggers,
            errors,
        );
    }

    if errors.len() > before {
        return None;
    }
    Some(TaskImportRecord {
        counter,
        kind,
        name,
        source_id: resolver.value(first, TaskColumn::TaskId).to_string(),
        enabled,
        timeout_minutes,
        max_retries,
        app_ref,
        partial_reload,
        manually_triggered,
        ext_program_path,
        ext_program_parameters,
        tags,
        custom_properties,
        schema_triggers,
        composite_triggers,
        row: first_row_no,
    })
}

#[allow(clippy::too_many_arguments)]
fn parse_event_group(
    task_counter: u32,
    event_counter: u32,
    event_rows: &GroupRows,
    resolver: &ColumnResolver<TaskColumn>,
    schema_triggers: &mut Vec<SchemaTrigger>,
    composite_triggers: &mut Vec<CompositeTriggerRecord>,
    errors: &mut Vec<ParseError>,
) {
    let event_row_no = event_rows.iter().map(|(no, _)| *no).min().unwrap_or(0);

    let merged = |col: TaskColumn, errors: &mut Vec<ParseError>| -> Option<String> {
        match merged_value(event_rows, resolver, col) {
            Ok(value) => value,
            Err(e) => {
                errors.push(e);
                None
            }
        }
    };

    let event_type = merged(TaskColumn::EventType, errors);
    let event_name = merged(TaskColumn::EventName, errors).unwrap_or_default();
    if event_name.is_empty() {
        errors.push(ParseError::MissingValue {
            row: event_row_no,
            column: TaskColumn::EventName.header().to_string(),
        });
    }
    let enabled = coerce_bool01(
        merged(TaskColumn::EventEnabled, errors)
            .as_deref()
            .unwrap_or(""),
        event_row_no,
        TaskColumn::EventEnabled.header(),
        errors,
    );

    match event_type.as_deref() {
        Some("Schema") => {
            if let Some(trigger) = parse_schema_event(
                event_row_no,
                event_name,
                enabled,
                event_rows,
                resolver,
                errors,
            ) {
                schema_triggers.push(trigger);
            }
        }
        Some("Composite") => {
            if let Some(trigger) = parse_composite_event(
                task_counter,
                event_counter,
                event_row_no,
                event_name,
                enabled,
                event_rows,
                resolver,
                errors,
            ) {
                composite_triggers.push(trigger);
            }
        }
        other => {
            errors.push(ParseError::TypeCoercion {
                row: event_row_no,
                column: TaskColumn::EventType.header().to_string(),
                value: other.unwrap_or("").to_string(),
                expected: "'Schema' or 'Composite'",
            });
        }
    }
}

fn parse_schema_event(
    event_row_no: usize,
    name: String,
    enabled: bool,
    event_rows: &GroupRows,
    resolver: &ColumnResolver<TaskColumn>,
    errors: &mut Vec<ParseError>,
) -> Option<SchemaTrigger> {
    let before = errors.len();

    let merged = |col: TaskColumn, errors: &mut Vec<ParseError>| -> Option<String> {
        match merged_value(event_rows, resolver, col) {
            Ok(value) => value,
            Err(e) => {
                errors.push(e);
                None
            }
        }
    };

    let increment_option = match merged(TaskColumn::SchemaIncrementOption, errors) {
        Some(raw) => match IncrementOption::from_source_str(&raw) {
            Some(option) => option,
            None => {
                errors.push(ParseError::TypeCoercion {
                    row: event_row_no,
                    column: TaskColumn::SchemaIncrementOption.header().to_string(),
                    value: raw,
                    expected: "once, hourly, daily, weekly, monthly or custom",
                });
                return None;
            }
        },
        None => {
            errors.push(ParseError::MissingValue {
                row: event_row_no,
                column: TaskColumn::SchemaIncrementOption.header().to_string(),
            });
            return None;
        }
    };

    let increment_description = match merged(TaskColumn::SchemaIncrementDescription, errors) {
        Some(raw) => {
            let ok = raw.split_whitespace().count() == 4
                && raw.split_whitespace().all(|f| f.parse::<i64>().is_ok());
            if !ok {
                errors.push(ParseError::TypeCoercion {
                    row: event_row_no,
                    column: TaskColumn::SchemaIncrementDescription.header().to_string(),
                    value: raw.clone(),
                    expected: "four integers (minutes hours days weeks)",
                });
            }
            raw
        }
        None => "0 0 0 0".to_string(),
    };

    let daylight_saving = match merged(TaskColumn::DaylightSavingsTime, errors) {
        Some(raw) => match DaylightSaving::from_source_str(&raw) {
            Some(value) => value,
            None => {
                errors.push(ParseError::TypeCoercion {
                    row: event_row_no,
                    column: TaskColumn::DaylightSavingsTime.header().to_string(),
                    value: raw,
                    expected: "ObserveDaylightSavingTime, PermanentStandardTime or PermanentDaylightSavingTime",
                });
                return None;
            }
        },
        None => DaylightSaving::ObserveDaylightSavingTime,
    };

    let start = match merged(TaskColumn::SchemaStart, errors) {
        Some(raw) => match parse_qrs_timestamp(&raw) {
            Some(ts) => ts,
            None => {
                errors.push(ParseError::TypeCoercion {
                    row: event_row_no,
                    column: TaskColumn::SchemaStart.header().to_string(),
                    value: raw,
                    expected: "UTC timestamp (e.g. 2024-01-01T00:00:00.000Z)",
                });
                return None;
            }
        },
        None => {
            errors.push(ParseError::MissingValue {
                row: event_row_no,
                column: TaskColumn::SchemaStart.header().to_string(),
            });
            return None;
        }
    };

    let expiration_raw = merged(TaskColumn::SchemaExpiration, errors)
        .unwrap_or_else(|| NO_EXPIRATION_TIMESTAMP.to_string());
    let expiration = match parse_qrs_timestamp(&expiration_raw) {
        Some(ts) => ts,
        None => {
            errors.push(ParseError::TypeCoercion {
                row: event_row_no,
                column: TaskColumn::SchemaExpiration.header().to_string(),
                value: expiration_raw,
                expected: "UTC timestamp (e.g. 9999-01-01T00:00:00.000Z)",
            });
            return None;
        }
    };
    if expiration < start {
        errors.push(ParseError::ExpirationBeforeStart { row: event_row_no });
    }

    let filter_description = match merged(TaskColumn::SchemaFilterDescription, errors) {
        Some(raw) => {
            if raw.split_whitespace().count() != 7 {
                errors.push(ParseError::TypeCoercion {
                    row: event_row_no,
                    column: TaskColumn::SchemaFilterDescription.header().to_string(),
                    value: raw.clone(),
                    expected: "seven-field scheduling window",
                });
            }
            raw
        }
        None => DEFAULT_FILTER_DESCRIPTION.to_string(),
    };

    let time_zone =
        merged(TaskColumn::SchemaTimeZone, errors).unwrap_or_else(|| "UTC".to_string());

    if errors.len() > before {
        return None;
    }
    Some(SchemaTrigger {
        name,
        enabled,
        increment_option,
        increment_description,
        daylight_saving,
        start,
        expiration,
        filter_description,
        time_zone,
    })
}

#[allow(clippy::too_many_arguments)]
fn parse_composite_event(
    task_counter: u32,
    event_counter: u32,
    event_row_no: usize,
    name: String,
    enabled: bool,
    event_rows: &GroupRows,
    resolver: &ColumnResolver<TaskColumn>,
    errors: &mut Vec<ParseError>,
) -> Option<CompositeTriggerRecord> {
    let before = errors.len();

    let merged = |col: TaskColumn, errors: &mut Vec<ParseError>| -> Option<String> {
        match merged_value(event_rows, resolver, col) {
            Ok(value) => value,
            Err(e) => {
                errors.push(e);
                None
            }
        }
    };

    let constraint_field = |col: TaskColumn, errors: &mut Vec<ParseError>| -> u32 {
        let raw = merged(col, errors).unwrap_or_default();
        coerce_u32(&raw, event_row_no, col.header(), 0, errors).unwrap_or(0)
    };
    let time_constraint = TimeConstraint {
        seconds: constraint_field(TaskColumn::TimeConstraintSeconds, errors),
        minutes: constraint_field(TaskColumn::TimeConstraintMinutes, errors),
        hours: constraint_field(TaskColumn::TimeConstraintHours, errors),
        days: constraint_field(TaskColumn::TimeConstraintDays, errors),
    };

    // Rule rows, grouped and ordered by rule counter
    let mut rule_groups: BTreeMap<u32, GroupRows> = BTreeMap::new();
    for &(row_no, row) in event_rows {
        let raw = resolver.value(row, TaskColumn::RuleCounter);
        if raw.is_empty() {
            continue;
        }
        match raw.parse::<u32>() {
            Ok(rule_counter) => {
                rule_groups
                    .entry(rule_counter)
                    .or_default()
                    .push((row_no, row));
            }
            Err(_) => errors.push(ParseError::TypeCoercion {
                row: row_no,
                column: TaskColumn::RuleCounter.header().to_string(),
                value: raw.to_string(),
                expected: "integer",
            }),
        }
    }

    let mut rules = Vec::new();
    for (rule_counter, rule_rows) in &rule_groups {
        let rule_row_no = rule_rows.iter().map(|(no, _)| *no).min().unwrap_or(0);
        let merged_rule = |col: TaskColumn, errors: &mut Vec<ParseError>| -> Option<String> {
            match merged_value(rule_rows, resolver, col) {
                Ok(value) => value,
                Err(e) => {
                    errors.push(e);
                    None
                }
            }
        };

        let state = match merged_rule(TaskColumn::RuleState, errors) {
            Some(raw) => match RuleState::from_source_str(&raw) {
                Some(state) => state,
                None => {
                    errors.push(ParseError::TypeCoercion {
                        row: rule_row_no,
                        column: TaskColumn::RuleState.header().to_string(),
                        value: raw,
                        expected: "'TaskSuccessful' or 'TaskFail'",
                    });
                    continue;
                }
            },
            None => {
                errors.push(ParseError::MissingValue {
                    row: rule_row_no,
                    column: TaskColumn::RuleState.header().to_string(),
                });
                continue;
            }
        };

        let task_ref = match merged_rule(TaskColumn::RuleTaskId, errors) {
            Some(raw) => raw,
            None => {
                errors.push(ParseError::MissingValue {
                    row: rule_row_no,
                    column: TaskColumn::RuleTaskId.header().to_string(),
                });
                continue;
            }
        };

        rules.push(CompositeRuleRecord {
            counter: *rule_counter,
            state,
            task_name: merged_rule(TaskColumn::RuleTaskName, errors).unwrap_or_default(),
            task_ref,
            row: rule_row_no,
        });
    }

    if rules.is_empty() && errors.len() == before {
        errors.push(ParseError::CompositeWithoutRules {
            task: task_counter,
            event: event_counter,
        });
    }
    if errors.len() > before {
        return None;
    }
    Some(CompositeTriggerRecord {
        counter: event_counter,
        name,
        enabled,
        time_constraint,
        rules,
        row: event_row_no,
    })
}

/// Parse the app sheet into upload records
pub fn parse_apps(
    table: &SourceTable,
    opts: &ParseOptions,
) -> Result<Vec<AppImportRecord>, Vec<ParseError>> {
    let resolver =
        ColumnResolver::<AppColumn>::build(opts.col_ref_by, &table.headers).map_err(|e| vec![e])?;

    let mut errors = Vec::new();
    let mut records: Vec<AppImportRecord> = Vec::new();

    for (idx, row) in table.rows.iter().enumerate() {
        let row_no = SourceTable::row_number(idx);
        let raw = resolver.value(row, AppColumn::AppCounter);
        let counter = match raw.parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => {
                errors.push(ParseError::TypeCoercion {
                    row: row_no,
                    column: AppColumn::AppCounter.header().to_string(),
                    value: raw.to_string(),
                    expected: "integer >= 1",
                });
                continue;
            }
        };
        if records.iter().any(|r| r.counter == counter) {
            errors.push(ParseError::ConflictingValues {
                rows: vec![row_no],
                column: AppColumn::AppCounter.header().to_string(),
            });
            continue;
        }

        let mut required = |col: AppColumn, errors: &mut Vec<ParseError>| -> String {
            let value = resolver.value(row, col);
            if value.is_empty() {
                errors.push(ParseError::MissingValue {
                    row: row_no,
                    column: col.header().to_string(),
                });
            }
            value.to_string()
        };

        let before = errors.len();
        let name = required(AppColumn::AppName, &mut errors);
        let qvf_directory = required(AppColumn::QvfDirectory, &mut errors);
        let qvf_name = required(AppColumn::QvfName, &mut errors);
        let exclude = coerce_bool01(
            resolver.value(row, AppColumn::ExcludeDataConnections),
            row_no,
            AppColumn::ExcludeDataConnections.header(),
            &mut errors,
        );
        let tags = split_list(resolver.value(row, AppColumn::AppTags));
        let custom_properties = split_pairs(
            resolver.value(row, AppColumn::AppCustomProperties),
            row_no,
            AppColumn::AppCustomProperties.header(),
            &mut errors,
        );

        let owner_dir = resolver.value(row, AppColumn::OwnerUserDirectory);
        let owner_id = resolver.value(row, AppColumn::OwnerUserId);
        let owner = match (owner_dir.is_empty(), owner_id.is_empty()) {
            (false, false) => Some((owner_dir.to_string(), owner_id.to_string())),
            (true, true) => None,
            (true, false) => {
                errors.push(ParseError::MissingValue {
                    row: row_no,
                    column: AppColumn::OwnerUserDirectory.header().to_string(),
                });
                None
            }
            (false, true) => {
                errors.push(ParseError::MissingValue {
                    row: row_no,
                    column: AppColumn::OwnerUserId.header().to_string(),
                });
                None
            }
        };

        let stream_raw = resolver.value(row, AppColumn::PublishToStream);
        let publish_to_stream = if stream_raw.is_empty() {
            None
        } else {
            Some(stream_raw.to_string())
        };

        if errors.len() > before {
            continue;
        }
        records.push(AppImportRecord {
            counter,
            name,
            qvf_directory,
            qvf_name,
            exclude_data_connections: exclude,
            tags,
            custom_properties,
            owner,
            publish_to_stream,
            row: row_no,
        });
    }

    if errors.is_empty() {
        Ok(records)
    } else {
        Err(errors)
    }
}

/// First (and only) distinct non-empty value of a column across a group.
/// Two distinct values are a grouping error, which keeps parsing
/// independent of row order inside the group.
fn merged_value(
    rows: &GroupRows,
    resolver: &ColumnResolver<TaskColumn>,
    col: TaskColumn,
) -> Result<Option<String>, ParseError> {
    let mut found: Option<(String, usize)> = None;
    for &(row_no, row) in rows {
        let value = resolver.value(row, col);
        if value.is_empty() {
            continue;
        }
        match &found {
            None => found = Some((value.to_string(), row_no)),
            Some((existing, first_row)) if existing != value => {
                return Err(ParseError::ConflictingValues {
                    rows: vec![*first_row, row_no],
                    column: col.header().to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(found.map(|(value, _)| value))
}

/// `0`, `1`, or empty; empty is false
fn coerce_bool01(raw: &str, row: usize, column: &str, errors: &mut Vec<ParseError>) -> bool {
    match raw {
        "" | "0" => false,
        "1" => true,
        other => {
            errors.push(ParseError::TypeCoercion {
                row,
                column: column.to_string(),
                value: other.to_string(),
                expected: "0, 1 or empty",
            });
            false
        }
    }
}

/// Integer with an empty-means-absent rule and a lower bound
fn coerce_u32(
    raw: &str,
    row: usize,
    column: &str,
    min: u32,
    errors: &mut Vec<ParseError>,
) -> Option<u32> {
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u32>() {
        Ok(n) if n >= min => Some(n),
        _ => {
            errors.push(ParseError::TypeCoercion {
                row,
                column: column.to_string(),
                value: raw.to_string(),
                expected: if min > 0 { "integer > 0" } else { "integer >= 0" },
            });
            None
        }
    }
}

/// `a / b / c` list cells
fn split_list(raw: &str) -> Vec<String> {
    raw.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `name=value / name=value` cells
fn split_pairs(
    raw: &str,
    row: usize,
    column: &str,
    errors: &mut Vec<ParseError>,
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for chunk in raw.split('/').map(str::trim).filter(|s| !s.is_empty()) {
        match chunk.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                pairs.push((name.trim().to_string(), value.trim().to_string()));
            }
            _ => {
                errors.push(ParseError::TypeCoercion {
                    row,
                    column: column.to_string(),
                    value: chunk.to_string(),
                    expected: "name=value pairs separated by /",
                });
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::format_qrs_timestamp;

    fn table(rows: Vec<Vec<&str>>) -> SourceTable {
        let headers = TaskColumn::ALL
            .iter()
            .map(|c| c.header().to_string())
            .collect();
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut cells: Vec<String> = row.into_iter().map(str::to_string).collect();
                cells.resize(TaskColumn::ALL.len(), String::new());
                cells
            })
            .collect();
        SourceTable { headers, rows }
    }

    fn task_row(
        counter: &'static str,
        name: &'static str,
        task_id: &'static str,
    ) -> Vec<&'static str> {
        // counter, type, name, id, enabled, timeout, retries, app id
        vec![
            counter,
            "Reload",
            name,
            task_id,
            "1",
            "1440",
            "0",
            "5d3f9f3a-1111-4d3c-8458-d54e8e87b1f2",
        ]
    }

    #[test]
    fn test_single_task_without_events() {
        let source = table(vec![task_row("1", "T1", "1")]);
        let records = parse_tasks(&source, &ParseOptions::default()).expect("clean source");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.counter, 1);
        assert_eq!(record.name, "T1");
        assert_eq!(record.kind, TaskKind::Reload);
        assert!(record.schema_triggers.is_empty());
        assert!(record.composite_triggers.is_empty());
    }

    #[test]
    fn test_schema_event_rows_group_under_task() {
        // columns 14..: event counter, type, name, enabled, schema cols
        let mut row: Vec<&str> = vec!["1", "", "", "", "", "", "", "", "", "", "", "", "", ""];
        row.extend([
            "1",
            "Schema",
            "Daily at six",
            "1",
            "daily",
            "0 0 1 0",
            "ObserveDaylightSavingTime",
            "2024-01-01T06:00:00.000Z",
            "9999-01-01T00:00:00.000Z",
            "* * - * * * *",
            "Europe/Stockholm",
        ]);

        let source = table(vec![task_row("1", "T1", "1"), row]);
        let records = parse_tasks(&source, &ParseOptions::default()).expect("clean source");
        assert_eq!(records[0].schema_triggers.len(), 1);
        let trigger = &records[0].schema_triggers[0];
        assert_eq!(trigger.name, "Daily at six");
        assert_eq!(trigger.increment_option, IncrementOption::Daily);
        assert!(trigger.never_expires());
        assert_eq!(
            format_qrs_timestamp(&trigger.start),
            "2024-01-01T06:00:00.000Z"
        );
    }

    fn composite_rows() -> Vec<Vec<&'static str>> {
        let mut event: Vec<&str> = vec!["2", "", "", "", "", "", "", "", "", "", "", "", "", ""];
        event.extend(["1", "Composite", "After T1", "1"]);
        // skip schema columns (7) and time constraint (4 zeros via empty)
        event.extend(["", "", "", "", "", "", ""]);
        event.extend(["0", "0", "0", "0"]);
        event.extend(["1", "TaskSuccessful", "T1", "1"]);
        vec![
            task_row("1", "T1", "1"),
            task_row("2", "T2", "2"),
            event,
        ]
    }

    #[test]
    fn test_composite_event_with_rule() {
        let source = table(composite_rows());
        let records = parse_tasks(&source, &ParseOptions::default()).expect("clean source");
        assert_eq!(records.len(), 2);
        let t2 = records.iter().find(|r| r.counter == 2).unwrap();
        assert_eq!(t2.composite_triggers.len(), 1);
        let event = &t2.composite_triggers[0];
        assert_eq!(event.name, "After T1");
        assert!(event.time_constraint.is_zero());
        assert_eq!(event.rules.len(), 1);
        assert_eq!(event.rules[0].task_ref, "1");
        assert_eq!(event.rules[0].state, RuleState::TaskSuccessful);
    }

    #[test]
    fn test_row_order_within_group_does_not_matter() {
        let mut rows = composite_rows();
        let parsed_in_order = parse_tasks(&table(rows.clone()), &ParseOptions::default()).unwrap();
        rows.swap(1, 2);
        let parsed_swapped = parse_tasks(&table(rows), &ParseOptions::default()).unwrap();

        let find = |records: &[TaskImportRecord], counter: u32| -> TaskImportRecord {
            records.iter().find(|r| r.counter == counter).unwrap().clone()
        };
        for counter in [1, 2] {
            let mut a = find(&parsed_in_order, counter);
            let mut b = find(&parsed_swapped, counter);
            a.row = 0;
            b.row = 0;
            for trigger in a.composite_triggers.iter_mut().chain(b.composite_triggers.iter_mut()) {
                trigger.row = 0;
                for rule in &mut trigger.rules {
                    rule.row = 0;
                }
            }
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_composite_without_rules_is_rejected() {
        let mut event: Vec<&str> = vec!["1", "", "", "", "", "", "", "", "", "", "", "", "", ""];
        event.extend(["1", "Composite", "Empty event", "1"]);
        let source = table(vec![task_row("1", "T1", "1"), event]);
        let errors = parse_tasks(&source, &ParseOptions::default()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ParseError::CompositeWithoutRules { task: 1, event: 1 })));
    }

    #[test]
    fn test_limit_import_count_keeps_low_counters() {
        let source = table(vec![
            task_row("1", "T1", "1"),
            task_row("2", "T2", "2"),
            task_row("3", "T3", "3"),
        ]);
        let opts = ParseOptions {
            limit_import_count: 1,
            ..Default::default()
        };
        let records = parse_tasks(&source, &opts).expect("clean source");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].counter, 1);

        let no_limit = parse_tasks(&source, &ParseOptions::default()).unwrap();
        assert_eq!(no_limit.len(), 3);
    }

    #[test]
    fn test_bad_bool_is_a_precise_diagnostic() {
        let mut row = task_row("1", "T1", "1");
        row[4] = "yes";
        let source = table(vec![row]);
        let errors = parse_tasks(&source, &ParseOptions::default()).unwrap_err();
        match &errors[0] {
            ParseError::TypeCoercion {
                row, column, value, ..
            } => {
                assert_eq!(*row, 2);
                assert_eq!(column, "Task enabled");
                assert_eq!(value, "yes");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_stray_app_id_on_external_program_task() {
        let mut row: Vec<&str> = vec![
            "1",
            "External program",
            "Run script",
            "1",
            "1",
            "60",
            "0",
            "5d3f9f3a-1111-4d3c-8458-d54e8e87b1f2",
            "",
            "",
            "C:\\tools\\run.cmd",
            "",
        ];
        row.resize(TaskColumn::ALL.len(), "");
        let source = table(vec![row]);
        let errors = parse_tasks(&source, &ParseOptions::default()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ParseError::StrayField { column, .. } if column == "App id")));
    }

    #[test]
    fn test_expiration_before_start_is_rejected() {
        let mut event: Vec<&str> = vec!["1", "", "", "", "", "", "", "", "", "", "", "", "", ""];
        event.extend([
            "1",
            "Schema",
            "Backwards",
            "1",
            "daily",
            "0 0 1 0",
            "ObserveDaylightSavingTime",
            "2024-06-01T00:00:00.000Z",
            "2024-01-01T00:00:00.000Z",
            "* * - * * * *",
            "UTC",
        ]);
        let source = table(vec![task_row("1", "T1", "1"), event]);
        let errors = parse_tasks(&source, &ParseOptions::default()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ParseError::ExpirationBeforeStart { .. })));
    }

    #[test]
    fn test_parse_apps_minimal_row() {
        let headers = AppColumn::ALL.iter().map(|c| c.header().to_string()).collect();
        let mut row: Vec<String> = vec![
            "1".to_string(),
            "Sales".to_string(),
            "/data/qvf".to_string(),
            "sales.qvf".to_string(),
            "0".to_string(),
        ];
        row.resize(AppColumn::ALL.len(), String::new());
        let source = SourceTable {
            headers,
            rows: vec![row],
        };
        let records = parse_apps(&source, &ParseOptions::default()).expect("clean source");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].counter, 1);
        assert_eq!(records[0].qvf_name, "sales.qvf");
        assert!(records[0].owner.is_none());
        assert!(records[0].publish_to_stream.is_none());
    }
}
