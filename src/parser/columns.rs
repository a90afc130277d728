//! Logical column sets of the import grammar and their resolution.
//!
//! Sources may address columns by header name or by position; a
//! [`ColumnResolver`] hides the difference and replaces stringly-typed
//! access in the parsing hot path.

use std::collections::HashMap;
use std::hash::Hash;

use crate::errors::ParseError;

/// How the header row maps to the logical column set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColRefBy {
    /// Match header cells against the canonical column names
    #[default]
    Name,
    /// Columns appear in canonical order; header text is ignored
    Position,
}

/// A typed, enumerable column set
pub trait LogicalColumn: Copy + Eq + Hash + Sized + 'static {
    /// Canonical column order; also the position-mode layout
    const ALL: &'static [Self];

    /// Canonical header spelling
    fn header(self) -> &'static str;

    /// Whether the column must be present in the header
    fn required(self) -> bool;
}

/// Columns of the task import sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskColumn {
    TaskCounter,
    TaskType,
    TaskName,
    TaskId,
    TaskEnabled,
    TaskTimeout,
    TaskRetries,
    AppId,
    PartialReload,
    ManuallyTriggered,
    ExtPgmPath,
    ExtPgmParameters,
    Tags,
    CustomProperties,
    EventCounter,
    EventType,
    EventName,
    EventEnabled,
    SchemaIncrementOption,
    SchemaIncrementDescription,
    DaylightSavingsTime,
    SchemaStart,
    SchemaExpiration,
    SchemaFilterDescription,
    SchemaTimeZone,
    TimeConstraintSeconds,
    TimeConstraintMinutes,
    TimeConstraintHours,
    TimeConstraintDays,
    RuleCounter,
    RuleState,
    RuleTaskName,
    RuleTaskId,
}

impl LogicalColumn for TaskColumn {
    const ALL: &'static [TaskColumn] = &[
        TaskColumn::TaskCounter,
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
        TaskColumn::Tags,
        TaskColumn::CustomProperties,
        TaskColumn::EventCounter,
        TaskColumn::EventType,
        TaskColumn::EventName,
        TaskColumn::EventEnabled,
        TaskColumn::SchemaIncrementOption,
        TaskColumn::SchemaIncrementDescription,
        TaskColumn::DaylightSavingsTime,
        TaskColumn::SchemaStart,
        TaskColumn::SchemaExpiration,
        TaskColumn::SchemaFilterDescription,
        TaskColumn::SchemaTimeZone,
        TaskColumn::TimeConstraintSeconds,
        TaskColumn::TimeConstraintMinutes,
        TaskColumn::TimeConstraintHours,
        TaskColumn::TimeConstraintDays,
        TaskColumn::RuleCounter,
        TaskColumn::RuleState,
        TaskColumn::RuleTaskName,
        TaskColumn::RuleTaskId,
    ];

    fn header(self) -> &'static str {
        match self {
            TaskColumn::TaskCounter => "Task counter",
            TaskColumn::TaskType => "Task type",
            TaskColumn::TaskName => "Task name",
            TaskColumn::TaskId => "Task id",
            TaskColumn::TaskEnabled => "Task enabled",
            TaskColumn::TaskTimeout => "Task timeout",
            TaskColumn::TaskRetries => "Task retries",
            TaskColumn::AppId => "App id",
            TaskColumn::PartialReload => "Partial reload",
            TaskColumn::ManuallyTriggered => "Manually triggered",
            TaskColumn::ExtPgmPath => "ExtPgm path",
            TaskColumn::ExtPgmParameters => "ExtPgm parameters",
            TaskColumn::Tags => "Tags",
            TaskColumn::CustomProperties => "Custom properties",
            TaskColumn::EventCounter => "Event counter",
            TaskColumn::EventType => "Event type",
            TaskColumn::EventName => "Event name",
            TaskColumn::EventEnabled => "Event enabled",
            TaskColumn::SchemaIncrementOption => "Schema increment option",
            TaskColumn::SchemaIncrementDescription => "Schema increment description",
            TaskColumn::DaylightSavingsTime => "Daylight savings time",
            TaskColumn::SchemaStart => "Schema start",
            TaskColumn::SchemaExpiration => "Schema expiration",
            TaskColumn::SchemaFilterDescription => "Schema filter description",
            TaskColumn::SchemaTimeZone => "Schema time zone",
            TaskColumn::TimeConstraintSeconds => "Time constraint seconds",
            TaskColumn::TimeConstraintMinutes => "Time constraint minutes",
            TaskColumn::TimeConstraintHours => "Time constraint hours",
            TaskColumn::TimeConstraintDays => "Time constraint days",
            TaskColumn::RuleCounter => "Rule counter",
            TaskColumn::RuleState => "Rule state",
            TaskColumn::RuleTaskName => "Rule task name",
            TaskColumn::RuleTaskId => "Rule task id",
        }
    }

    fn required(self) -> bool {
        // External-program payload columns only matter when such tasks
        // appear; a reload-only sheet may omit them.
        !matches!(
            self,
            TaskColumn::ExtPgmPath | TaskColumn::ExtPgmParameters
        )
    }
}

/// Columns of the app import sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppColumn {
    AppCounter,
    AppName,
    QvfDirectory,
    QvfName,
    ExcludeDataConnections,
    AppTags,
    AppCustomProperties,
    OwnerUserDirectory,
    OwnerUserId,
    PublishToStream,
}

impl LogicalColumn for AppColumn {
    const ALL: &'static [AppColumn] = &[
        AppColumn::AppCounter,
        AppColumn::AppName,
        AppColumn::QvfDirectory,
        AppColumn::QvfName,
        AppColumn::ExcludeDataConnections,
        AppColumn::AppTags,
        AppColumn::AppCustomProperties,
        AppColumn::OwnerUserDirectory,
        AppColumn::OwnerUserId,
        AppColumn::PublishToStream,
    ];

    fn header(self) -> &'static str {
        match self {
            AppColumn::AppCounter => "App counter",
            AppColumn::AppName => "App name",
            AppColumn::QvfDirectory => "QVF directory",
            AppColumn::QvfName => "QVF name",
            AppColumn::ExcludeDataConnections => "Exclude data connections",
            AppColumn::AppTags => "App tags",
            AppColumn::AppCustomProperties => "App custom properties",
            AppColumn::OwnerUserDirectory => "Owner user directory",
            AppColumn::OwnerUserId => "Owner user id",
            AppColumn::PublishToStream => "Publish to stream",
        }
    }

    fn required(self) -> bool {
        true
    }
}

/// Header-to-logical-column mapping, built once per source
#[derive(Debug)]
pub struct ColumnResolver<C: LogicalColumn> {
    positions: HashMap<C, usize>,
}

impl<C: LogicalColumn> ColumnResolver<C> {
    /// Map logical columns to header positions by exact name match.
    /// Unknown header cells are retained in the source but ignored here.
    pub fn by_name(headers: &[String]) -> Result<Self, ParseError> {
        let mut positions = HashMap::new();
        for &col in C::ALL {
            let found = headers
                .iter()
                .position(|h| h.trim() == col.header());
            match found {
                Some(idx) => {
                    positions.insert(col, idx);
                }
                None if col.required() => {
                    return Err(ParseError::MissingColumn {
                        column: col.header().to_string(),
                    });
                }
                None => {}
            }
        }
        Ok(Self { positions })
    }

    /// Assume canonical column order; header text is ignored
    pub fn by_position() -> Self {
        let positions = C::ALL
            .iter()
            .enumerate()
            .map(|(idx, &col)| (col, idx))
            .collect();
        Self { positions }
    }

    /// Build a resolver per the configured mode
    pub fn build(mode: ColRefBy, headers: &[String]) -> Result<Self, ParseError> {
        match mode {
            ColRefBy::Name => Self::by_name(headers),
            ColRefBy::Position => Ok(Self::by_position()),
        }
    }

    /// Trimmed cell value of a logical column; empty when the column is
    /// absent or the row is short
    pub fn value<'a>(&self, row: &'a [String], col: C) -> &'a str {
        self.positions
            .get(&col)
            .and_then(|&idx| row.get(idx))
            .map(|cell| cell.trim())
            .unwrap_or("")
    }

    /// Header position of a logical column, when present
    pub fn index(&self, col: C) -> Option<usize> {
        self.positions.get(&col).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_resolves_shuffled_headers() {
        let full: Vec<String> = TaskColumn::ALL
            .iter()
            .rev()
            .map(|c| c.header().to_string())
            .collect();
        let resolver = ColumnResolver::<TaskColumn>::by_name(&full).expect("all headers present");
        assert_eq!(
            resolver.index(TaskColumn::TaskCounter),
            Some(TaskColumn::ALL.len() - 1)
        );
    }

    #[test]
    fn test_by_name_rejects_missing_mandatory_column() {
        let headers: Vec<String> = TaskColumn::ALL
            .iter()
            .filter(|c| **c != TaskColumn::TaskName)
            .map(|c| c.header().to_string())
            .collect();
        match ColumnResolver::<TaskColumn>::by_name(&headers) {
            Err(ParseError::MissingColumn { column }) => assert_eq!(column, "Task name"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_by_name_tolerates_missing_optional_columns() {
        let headers: Vec<String> = TaskColumn::ALL
            .iter()
            .filter(|c| !matches!(c, TaskColumn::ExtPgmPath | TaskColumn::ExtPgmParameters))
            .map(|c| c.header().to_string())
            .collect();
        let resolver =
            ColumnResolver::<TaskColumn>::by_name(&headers).expect("optional columns may be absent");
        assert_eq!(resolver.index(TaskColumn::ExtPgmPath), None);
    }

    #[test]
    fn test_by_position_uses_canonical_order() {
        let resolver = ColumnResolver::<AppColumn>::by_position();
        assert_eq!(resolver.index(AppColumn::AppCounter), Some(0));
        assert_eq!(resolver.index(AppColumn::PublishToStream), Some(9));
    }

    #[test]
    fn test_value_is_trimmed_and_total() {
        let resolver = ColumnResolver::<AppColumn>::by_position();
        let row = vec!["1".to_string(), "  Sales  ".to_string()];
        assert_eq!(resolver.value(&row, AppColumn::AppName), "Sales");
        // Row shorter than the column set reads as empty
        assert_eq!(resolver.value(&row, AppColumn::QvfName), "");
    }
}
