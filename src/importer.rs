//! Two-phase task import.
//!
//! Phase 0 uploads companion QVFs (with a configurable pause between
//! uploads to relieve rate-limit pressure) and records the
//! `App counter -> GUID` mapping. Phase A creates tasks with their schedule
//! events embedded, populating the per-run `localToGuid` table in commit
//! order. Phase B creates composite events whose rules point at Phase-A
//! GUIDs and at pre-existing tasks. Phases are strictly sequential and
//! writes within a phase are serialized; errors are recorded per work item
//! and never roll back completed ones.
//!
//! The source format deliberately allows a row to reference a task the same
//! file creates later; composite events therefore cannot be created inside
//! Phase A.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{ConfigError, ImportError};
use crate::model::{TaskGraph, TaskKind};
use crate::parser::{AppImportRecord, CompositeTriggerRecord, TaskImportRecord};
use crate::qrs::types::{
    CompositeEventCreate, CompositeRuleCreate, ExternalProgramTaskCreate, ExternalProgramTaskSpec,
    IdRef, ReloadTaskCreate, ReloadTaskSpec, SchemaEventCreate, TimeConstraintWire,
    EVENT_TYPE_COMPOSITE, EVENT_TYPE_SCHEMA,
};
use crate::qrs::{Repository, RepositoryCaches};
use crate::resolver::{validate_rule_refs, ReferenceResolver};
use crate::session::CancelFlag;

/// Import mode. Only create-only imports are supported; differential
/// updates fail fast at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    #[default]
    Create,
}

impl FromStr for UpdateMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(UpdateMode::Create),
            other => Err(ConfigError::UnsupportedUpdateMode(other.to_string())),
        }
    }
}

/// Importer knobs
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Pause between consecutive app uploads
    pub sleep_app_upload: Duration,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            sleep_app_upload: Duration::from_millis(1000),
        }
    }
}

/// Per-item outcome of one phase
#[derive(Debug)]
pub struct WorkOutcome {
    /// Grouping key of the work item (task, event, or app counter)
    pub counter: u32,
    /// Secondary key for Phase-B items: the event counter
    pub event_counter: Option<u32>,
    pub name: String,
    pub result: Result<Uuid, ImportError>,
}

/// What an import run did, item by item
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub apps: Vec<WorkOutcome>,
    pub tasks: Vec<WorkOutcome>,
    pub events: Vec<WorkOutcome>,
    /// The run was canceled; remaining work items were skipped
    pub canceled: bool,
}

impl ImportSummary {
    pub fn created_count(&self) -> usize {
        self.apps
            .iter()
            .chain(&self.tasks)
            .chain(&self.events)
            .filter(|o| o.result.is_ok())
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.apps
            .iter()
            .chain(&self.tasks)
            .chain(&self.events)
            .filter(|o| o.result.is_err())
            .count()
    }

    /// A run is clean when nothing failed and nothing was skipped; a
    /// partial run maps to a non-zero exit code.
    pub fn is_clean(&self) -> bool {
        !self.canceled && self.failure_count() == 0
    }
}

/// The two-phase importer
pub struct TaskImporter<'a> {
    repo: &'a dyn Repository,
    graph: &'a TaskGraph,
    options: ImportOptions,
    cancel: CancelFlag,
}

impl<'a> TaskImporter<'a> {
    pub fn new(
        repo: &'a dyn Repository,
        graph: &'a TaskGraph,
        options: ImportOptions,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            repo,
            graph,
            options,
            cancel,
        }
    }

    /// Run the import. Rule references are validated up front; any
    /// unresolvable reference aborts the run before Phase A.
    pub async fn run(
        &self,
        caches: &RepositoryCaches,
        tasks: &[TaskImportRecord],
        apps: &[AppImportRecord],
    ) -> Result<ImportSummary, Vec<ImportError>> {
        let preflight = validate_rule_refs(tasks, self.graph);
        if !preflight.is_empty() {
            return Err(preflight);
        }

        let mut summary = ImportSummary::default();
        let mut resolver = ReferenceResolver::new(caches);

        self.upload_apps(apps, &mut resolver, &mut summary).await;
        if summary.canceled {
            return Ok(summary);
        }

        // Phase A: tasks and their schedule triggers, created atomically.
        // The localToGuid table is populated in commit order, keyed by the
        // source `Task id`.
        let mut local_to_guid: HashMap<String, Uuid> = HashMap::new();
        let mut created_kinds: HashMap<Uuid, TaskKind> = HashMap::new();
        let mut created_tasks: HashMap<u32, Uuid> = HashMap::new();

        info!("Phase A: creating {} task(s)", tasks.len());
        for record in tasks {
            if self.cancel.is_canceled() {
                summary.canceled = true;
                summary.tasks.push(WorkOutcome {
                    counter: record.counter,
                    event_counter: None,
                    name: record.name.clone(),
                    result: Err(ImportError::Canceled),
                });
                break;
            }
            let result = self.create_task(record, &resolver).await;
            if let Ok(guid) = &result {
                created_tasks.insert(record.counter, *guid);
                created_kinds.insert(*guid, record.kind);
                if !record.source_id.is_empty() {
                    local_to_guid.insert(record.source_id.clone(), *guid);
                }
                info!("Created task '{}' ({})", record.name, guid);
            }
            summary.tasks.push(WorkOutcome {
                counter: record.counter,
                event_counter: None,
                name: record.name.clone(),
                result,
            });
        }
        if summary.canceled {
            return Ok(summary);
        }

        // Phase B starts only after Phase A has drained, so every
        // resolvable localToGuid entry is present before any rule is built.
        let event_count: usize = tasks.iter().map(|t| t.composite_triggers.len()).sum();
        info!("Phase B: creating {} composite event(s)", event_count);
        for record in tasks {
            let Some(&downstream) = created_tasks.get(&record.counter) else {
                if !record.composite_triggers.is_empty() {
                    warn!(
                        "Task counter {} failed in Phase A; skipping its {} composite event(s)",
                        record.counter,
                        record.composite_triggers.len()
                    );
                }
                continue;
            };
            for trigger in &record.composite_triggers {
                if self.cancel.is_canceled() {
                    summary.canceled = true;
                    summary.events.push(WorkOutcome {
                        counter: record.counter,
                        event_counter: Some(trigger.counter),
                        name: trigger.name.clone(),
                        result: Err(ImportError::Canceled),
                    });
                    return Ok(summary);
                }
                let result = self
                    .create_composite_event(
                        record,
                        trigger,
                        downstream,
                        &resolver,
                        &local_to_guid,
                        &created_kinds,
                    )
                    .await;
                summary.events.push(WorkOutcome {
                    counter: record.counter,
                    event_counter: Some(trigger.counter),
                    name: trigger.name.clone(),
                    result,
                });
            }
        }

        Ok(summary)
    }

    /// Phase 0: upload companion apps, then apply tags, custom properties,
    /// owner, and stream publication.
    async fn upload_apps(
        &self,
        apps: &[AppImportRecord],
        resolver: &mut ReferenceResolver<'_>,
        summary: &mut ImportSummary,
    ) {
        if apps.is_empty() {
            return;
        }
        info!("Phase 0: uploading {} app(s)", apps.len());
        for (idx, app) in apps.iter().enumerate() {
            if self.cancel.is_canceled() {
                summary.canceled = true;
                summary.apps.push(WorkOutcome {
                    counter: app.counter,
                    event_counter: None,
                    name: app.name.clone(),
                    result: Err(ImportError::Canceled),
                });
                return;
            }
            let result = self.upload_app(app, resolver).await;
            if let Ok(guid) = &result {
                resolver.register_uploaded_app(app.counter, *guid);
                info!("Uploaded app '{}' ({})", app.name, guid);
            }
            summary.apps.push(WorkOutcome {
                counter: app.counter,
                event_counter: None,
                name: app.name.clone(),
                result,
            });
            if idx + 1 < apps.len() && !self.options.sleep_app_upload.is_zero() {
                tokio::time::sleep(self.options.sleep_app_upload).await;
            }
        }
    }

    async fn upload_app(
        &self,
        app: &AppImportRecord,
        resolver: &ReferenceResolver<'_>,
    ) -> Result<Uuid, ImportError> {
        // References must resolve before the upload touches the server
        let tags = resolver.resolve_tags_condensed(app.counter, &app.tags)?;
        let custom_properties =
            resolver.resolve_custom_properties(app.counter, &app.custom_properties)?;
        let stream = app
            .publish_to_stream
            .as_deref()
            .and_then(|raw| resolver.resolve_stream(raw));

        let path = Path::new(&app.qvf_directory).join(&app.qvf_name);
        if !path.is_file() {
            return Err(ImportError::QvfMissing {
                app: app.counter,
                path: path.display().to_string(),
                reason: "file not found".to_string(),
            });
        }

        let guid = self
            .repo
            .upload_app(&path, &app.name, app.exclude_data_connections)
            .await?;

        self.repo
            .set_app_metadata(guid, &tags, &custom_properties)
            .await?;
        if let Some((directory, user)) = &app.owner {
            self.repo.set_app_owner(guid, directory, user).await?;
        }
        if let Some(stream) = stream {
            self.repo.publish_app(guid, stream.id).await?;
        }
        Ok(guid)
    }

    /// Build and post one Phase-A task with its schedule events embedded.
    /// Composite events declared on the same rows are deliberately left for
    /// Phase B.
    async fn create_task(
        &self,
        record: &TaskImportRecord,
        resolver: &ReferenceResolver<'_>,
    ) -> Result<Uuid, ImportError> {
        let tags = resolver.resolve_tags(record.counter, &record.tags)?;
        let custom_properties =
            resolver.resolve_custom_properties(record.counter, &record.custom_properties)?;
        let schema_events: Vec<SchemaEventCreate> = record
            .schema_triggers
            .iter()
            .map(schema_event_create)
            .collect();

        match record.kind {
            TaskKind::Reload => {
                let app_ref = record.app_ref.as_deref().unwrap_or("");
                let app_id = resolver.resolve_app_ref(record.counter, app_ref)?;
                let spec = ReloadTaskCreate {
                    task: ReloadTaskSpec {
                        name: record.name.clone(),
                        app: IdRef { id: app_id },
                        enabled: record.enabled,
                        task_session_timeout: record.timeout_minutes as i32,
                        max_retries: record.max_retries as i32,
                        is_partial_reload: record.partial_reload,
                        is_manually_triggered: record.manually_triggered,
                        tags,
                        custom_properties,
                    },
                    schema_events,
                    composite_events: Vec::new(),
                };
                Ok(self.repo.create_reload_task(&spec).await?)
            }
            TaskKind::ExternalProgram => {
                let spec = ExternalProgramTaskCreate {
                    task: ExternalProgramTaskSpec {
                        name: record.name.clone(),
                        path: record.ext_program_path.clone().unwrap_or_default(),
                        parameters: record.ext_program_parameters.clone().unwrap_or_default(),
                        enabled: record.enabled,
                        task_session_timeout: record.timeout_minutes as i32,
                        max_retries: record.max_retries as i32,
                        tags,
                        custom_properties,
                    },
                    schema_events,
                    composite_events: Vec::new(),
                };
                Ok(self.repo.create_external_program_task(&spec).await?)
            }
        }
    }

    /// Build and post one Phase-B composite event. A rule that fails to
    /// resolve aborts this event but not its siblings.
    async fn create_composite_event(
        &self,
        record: &TaskImportRecord,
        trigger: &CompositeTriggerRecord,
        downstream: Uuid,
        resolver: &ReferenceResolver<'_>,
        local_to_guid: &HashMap<String, Uuid>,
        created_kinds: &HashMap<Uuid, TaskKind>,
    ) -> Result<Uuid, ImportError> {
        let mut composite_rules = Vec::with_capacity(trigger.rules.len());
        for rule in &trigger.rules {
            let upstream = resolver.resolve_rule_ref(
                record.counter,
                trigger.counter,
                rule,
                local_to_guid,
                self.graph,
            )?;
            let upstream_kind = created_kinds
                .get(&upstream)
                .copied()
                .or_else(|| self.graph.task(upstream).map(|t| t.kind))
                .unwrap_or(TaskKind::Reload);
            composite_rules.push(task_kind_ref(
                CompositeRuleCreate {
                    rule_state: rule.state.to_wire(),
                    reload_task: None,
                    external_program_task: None,
                },
                upstream_kind,
                upstream,
            ));
        }

        let mut spec = CompositeEventCreate {
            name: trigger.name.clone(),
            enabled: trigger.enabled,
            event_type: EVENT_TYPE_COMPOSITE,
            time_constraint: TimeConstraintWire {
                seconds: trigger.time_constraint.seconds as i32,
                minutes: trigger.time_constraint.minutes as i32,
                hours: trigger.time_constraint.hours as i32,
                days: trigger.time_constraint.days as i32,
            },
            composite_rules,
            reload_task: None,
            external_program_task: None,
        };
        match record.kind {
            TaskKind::Reload => spec.reload_task = Some(IdRef { id: downstream }),
            TaskKind::ExternalProgram => {
                spec.external_program_task = Some(IdRef { id: downstream })
            }
        }
        Ok(self.repo.create_composite_event(&spec).await?)
    }
}

fn task_kind_ref(
    mut rule: CompositeRuleCreate,
    kind: TaskKind,
    task_id: Uuid,
) -> CompositeRuleCreate {
    match kind {
        TaskKind::Reload => rule.reload_task = Some(IdRef { id: task_id }),
        TaskKind::ExternalProgram => rule.external_program_task = Some(IdRef { id: task_id }),
    }
    rule
}

fn schema_event_create(trigger: &crate::model::SchemaTrigger) -> SchemaEventCreate {
    use crate::model::types::format_qrs_timestamp;
    SchemaEventCreate {
        name: trigger.name.clone(),
        enabled: trigger.enabled,
        event_type: EVENT_TYPE_SCHEMA,
        increment_option: trigger.increment_option.to_wire(),
        increment_description: trigger.increment_description.clone(),
        daylight_saving_time: trigger.daylight_saving.to_wire(),
        start_date: format_qrs_timestamp(&trigger.start),
        expiration_date: format_qrs_timestamp(&trigger.expiration),
        schema_filter_description: vec![trigger.filter_description.clone()],
        time_zone: trigger.time_zone.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_mode_accepts_only_create() {
        assert_eq!(UpdateMode::from_str("create").unwrap(), UpdateMode::Create);
        assert!(matches!(
            UpdateMode::from_str("update"),
            Err(ConfigError::UnsupportedUpdateMode(_))
        ));
        assert!(UpdateMode::from_str("Create").is_err());
    }

    #[test]
    fn test_summary_counters() {
        let mut summary = ImportSummary::default();
        summary.tasks.push(WorkOutcome {
            counter: 1,
            event_counter: None,
            name: "T1".to_string(),
            result: Ok(Uuid::new_v4()),
        });
        summary.events.push(WorkOutcome {
            counter: 1,
            event_counter: Some(1),
            name: "E1".to_string(),
            result: Err(ImportError::UnknownTag {
                task: 1,
                name: "missing".to_string(),
            }),
        });
        assert_eq!(summary.created_count(), 1);
        assert_eq!(summary.failure_count(), 1);
        assert!(!summary.is_clean());
    }
}
