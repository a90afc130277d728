//! Tabular projection of the task graph.
//!
//! The exporter emits the same column grammar the import parser reads, so
//! an exported file fed back through the importer recreates an equivalent
//! task population (GUIDs differ; `Task id` cells carry the exported GUIDs,
//! which rule references resolve against as local handles). Column blocks
//! are selectable for display; the `lastexecution` block adds display-only
//! columns the parser ignores.

pub mod to_csv;
pub mod to_excel;
pub mod to_json;
pub mod to_tree;

use std::collections::HashMap;

use crate::model::{FilterSpec, Task, TaskGraph, TaskKind, TaskPayload};
use crate::model::types::format_qrs_timestamp;
use crate::parser::columns::{LogicalColumn, TaskColumn};
use crate::parser::source::SourceTable;

/// Display-only columns of the `lastexecution` block
const LAST_EXECUTION_HEADERS: [&str; 5] = [
    "Last execution status",
    "Last execution start",
    "Last execution stop",
    "Last execution duration",
    "Next execution",
];

/// Selectable column blocks of the task table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableDetail {
    Common,
    LastExecution,
    Tag,
    CustomProperty,
    SchemaTrigger,
    CompositeTrigger,
}

impl TableDetail {
    pub fn from_cli(value: &str) -> Option<Self> {
        match value {
            "common" => Some(TableDetail::Common),
            "lastexecution" => Some(TableDetail::LastExecution),
            "tag" => Some(TableDetail::Tag),
            "customproperty" => Some(TableDetail::CustomProperty),
            "schematrigger" => Some(TableDetail::SchemaTrigger),
            "compositetrigger" => Some(TableDetail::CompositeTrigger),
            _ => None,
        }
    }

    /// Every block; the resulting table round-trips through the parser
    pub fn all() -> Vec<TableDetail> {
        vec![
            TableDetail::Common,
            TableDetail::LastExecution,
            TableDetail::Tag,
            TableDetail::CustomProperty,
            TableDetail::SchemaTrigger,
            TableDetail::CompositeTrigger,
        ]
    }
}

fn selected_headers(details: &[TableDetail]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    let has = |d: TableDetail| details.contains(&d);

    headers.push(TaskColumn::TaskCounter.header().to_string());
    if has(TableDetail::Common) {
        for col in [
            TaskColumn::TaskType,
            TaskColumn::TaskName,
            TaskColumn::TaskId,
            TaskColumn::TaskEnabled,
            TaskColumn::TaskTimeout,
            TaskColumn::TaskRetries,
            TaskColumn::AppId,
            TaskColumn::PartialReload,
            TaskColumn::ManuallyTriggered,
            TaskColumn::ExtPgmPath,
            TaskColumn::ExtPgmParameters,
        ] {
            headers.push(col.header().to_string());
        }
    }
    if has(TableDetail::Tag) {
        headers.push(TaskColumn::Tags.header().to_string());
    }
    if has(TableDetail::CustomProperty) {
        headers.push(TaskColumn::CustomProperties.header().to_string());
    }
    if has(TableDetail::SchemaTrigger) || has(TableDetail::CompositeTrigger) {
        for col in [
            TaskColumn::EventCounter,
            TaskColumn::EventType,
            TaskColumn::EventName,
            TaskColumn::EventEnabled,
        ] {
            headers.push(col.header().to_string());
        }
    }
    if has(TableDetail::SchemaTrigger) {
        for col in [
            TaskColumn::SchemaIncrementOption,
            TaskColumn::SchemaIncrementDescription,
            TaskColumn::DaylightSavingsTime,
            TaskColumn::SchemaStart,
            TaskColumn::SchemaExpiration,
            TaskColumn::SchemaFilterDescription,
            TaskColumn::SchemaTimeZone,
        ] {
            headers.push(col.header().to_string());
        }
    }
    if has(TableDetail::CompositeTrigger) {
        for col in [
            TaskColumn::TimeConstraintSeconds,
            TaskColumn::TimeConstraintMinutes,
            TaskColumn::TimeConstraintHours,
            TaskColumn::TimeConstraintDays,
            TaskColumn::RuleCounter,
            TaskColumn::RuleState,
            TaskColumn::RuleTaskName,
            TaskColumn::RuleTaskId,
        ] {
            headers.push(col.header().to_string());
        }
    }
    if has(TableDetail::LastExecution) {
        for header in LAST_EXECUTION_HEADERS {
            headers.push(header.to_string());
        }
    }
    headers
}

/// Sparse row keyed by header, projected against the selected header list
#[derive(Default)]
struct RowBuilder {
    cells: HashMap<&'static str, String>,
}

impl RowBuilder {
    fn set(&mut self, col: TaskColumn, value: impl Into<String>) -> &mut Self {
        self.cells.insert(col.header(), value.into());
        self
    }

    fn set_raw(&mut self, header: &'static str, value: impl Into<String>) -> &mut Self {
        self.cells.insert(header, value.into());
        self
    }

    fn project(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| self.cells.get(h.as_str()).cloned().unwrap_or_default())
            .collect()
    }
}

fn bool01(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Project the graph into the tabular grammar. The filter restricts the
/// task set (union of terms); details select column blocks.
pub fn build_task_table(
    graph: &TaskGraph,
    filter: &FilterSpec,
    details: &[TableDetail],
) -> SourceTable {
    let headers = selected_headers(details);
    let include_schema = details.contains(&TableDetail::SchemaTrigger);
    let include_composite = details.contains(&TableDetail::CompositeTrigger);
    let mut rows: Vec<Vec<String>> = Vec::new();

    for (idx, task) in graph.matching_tasks(filter).into_iter().enumerate() {
        let counter = (idx + 1).to_string();

        let mut first = RowBuilder::default();
        first.set(TaskColumn::TaskCounter, counter.clone());
        fill_task_fields(&mut first, task);
        rows.push(first.project(&headers));

        let mut event_counter = 0u32;
        if !include_schema {
            event_counter += task.schema_triggers.len() as u32;
        }
        for trigger in task.schema_triggers.iter().filter(|_| include_schema) {
            event_counter += 1;
            let mut row = RowBuilder::default();
            row.set(TaskColumn::TaskCounter, counter.clone())
                .set(TaskColumn::EventCounter, event_counter.to_string())
                .set(TaskColumn::EventType, "Schema")
                .set(TaskColumn::EventName, trigger.name.clone())
                .set(TaskColumn::EventEnabled, bool01(trigger.enabled))
                .set(
                    TaskColumn::SchemaIncrementOption,
                    trigger.increment_option.as_source_str(),
                )
                .set(
                    TaskColumn::SchemaIncrementDescription,
                    trigger.increment_description.clone(),
                )
                .set(
                    TaskColumn::DaylightSavingsTime,
                    trigger.daylight_saving.as_source_str(),
                )
                .set(TaskColumn::SchemaStart, format_qrs_timestamp(&trigger.start))
                .set(
                    TaskColumn::SchemaExpiration,
                    format_qrs_timestamp(&trigger.expiration),
                )
                .set(
                    TaskColumn::SchemaFilterDescription,
                    trigger.filter_description.clone(),
                )
                .set(TaskColumn::SchemaTimeZone, trigger.time_zone.clone());
            rows.push(row.project(&headers));
        }

        for trigger in task.composite_triggers.iter().filter(|_| include_composite) {
            event_counter += 1;
            for (rule_idx, rule) in trigger.rules.iter().enumerate() {
                let mut row = RowBuilder::default();
                row.set(TaskColumn::TaskCounter, counter.clone())
                    .set(TaskColumn::EventCounter, event_counter.to_string())
                    .set(TaskColumn::RuleCounter, (rule_idx + 1).to_string())
                    .set(TaskColumn::RuleState, rule.state.as_source_str())
                    .set(TaskColumn::RuleTaskId, rule.upstream.to_string());
                let upstream_name = rule.upstream_name.clone().or_else(|| {
                    graph.task(rule.upstream).map(|t| t.name.clone())
                });
                if let Some(name) = upstream_name {
                    row.set(TaskColumn::RuleTaskName, name);
                }
                if rule_idx == 0 {
                    // Event-level fields ride on the first rule row; the
                    // parser merges them across the event group.
                    row.set(TaskColumn::EventType, "Composite")
                        .set(TaskColumn::EventName, trigger.name.clone())
                        .set(TaskColumn::EventEnabled, bool01(trigger.enabled))
                        .set(
                            TaskColumn::TimeConstraintSeconds,
                            trigger.time_constraint.seconds.to_string(),
                        )
                        .set(
                            TaskColumn::TimeConstraintMinutes,
                            trigger.time_constraint.minutes.to_string(),
                        )
                        .set(
                            TaskColumn::TimeConstraintHours,
                            trigger.time_constraint.hours.to_string(),
                        )
                        .set(
                            TaskColumn::TimeConstraintDays,
                            trigger.time_constraint.days.to_string(),
                        );
                }
                rows.push(row.project(&headers));
            }
        }
    }

    SourceTable { headers, rows }
}

fn fill_task_fields(row: &mut RowBuilder, task: &Task) {
    row.set(
        TaskColumn::TaskType,
        match task.kind {
            TaskKind::Reload => TaskKind::Reload.as_source_str(),
            TaskKind::ExternalProgram => TaskKind::ExternalProgram.as_source_str(),
        },
    )
    .set(TaskColumn::TaskName, task.name.clone())
    .set(TaskColumn::TaskId, task.id.to_string())
    .set(TaskColumn::TaskEnabled, bool01(task.enabled))
    .set(
        TaskColumn::TaskTimeout,
        task.session_timeout_minutes.to_string(),
    )
    .set(TaskColumn::TaskRetries, task.max_retries.to_string());

    match &task.payload {
        TaskPayload::Reload {
            app_id,
            partial_reload,
            manually_triggered,
            ..
        } => {
            row.set(TaskColumn::AppId, app_id.to_string())
                .set(TaskColumn::PartialReload, bool01(*partial_reload))
                .set(TaskColumn::ManuallyTriggered, bool01(*manually_triggered));
        }
        TaskPayload::ExternalProgram { path, parameters } => {
            row.set(TaskColumn::ExtPgmPath, path.clone())
                .set(TaskColumn::ExtPgmParameters, parameters.clone());
        }
    }

    if !task.tags.is_empty() {
        row.set(TaskColumn::Tags, task.tags.join(" / "));
    }
    if !task.custom_properties.is_empty() {
        let pairs: Vec<String> = task
            .custom_properties
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        row.set(TaskColumn::CustomProperties, pairs.join(" / "));
    }

    row.set_raw(
        "Last execution status",
        task.execution.last_status.clone().unwrap_or_else(|| "-".to_string()),
    );
    row.set_raw(
        "Last execution start",
        task.execution
            .last_start
            .map(|ts| format_qrs_timestamp(&ts))
            .unwrap_or_else(|| "-".to_string()),
    );
    row.set_raw(
        "Last execution stop",
        task.execution
            .last_stop
            .map(|ts| format_qrs_timestamp(&ts))
            .unwrap_or_else(|| "-".to_string()),
    );
    row.set_raw(
        "Last execution duration",
        task.execution
            .last_duration_ms
            .map(|ms| ms.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    row.set_raw(
        "Next execution",
        task.execution
            .next_execution
            .map(|ts| format_qrs_timestamp(&ts))
            .unwrap_or_else(|| "-".to_string()),
    );
}

/// Pad columns for screen output
pub fn render_text_table(table: &SourceTable) -> String {
    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.chars().count()).collect();
    for row in &table.rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx < widths.len() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }
    }

    let render_row = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(idx, cell)| {
                let width = widths.get(idx).copied().unwrap_or(0);
                format!("{:<width$}", cell, width = width)
            })
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut out = String::new();
    out.push_str(&render_row(&table.headers));
    out.push('\n');
    let separator: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1) * 2;
    out.push_str(&"-".repeat(separator));
    out.push('\n');
    for row in &table.rows {
        out.push_str(&render_row(row));
        out.push('\n');
    }
    out
}
