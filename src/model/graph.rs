//! The task-graph multigraph.
//!
//! Tasks are nodes; every composite rule contributes one directed edge from
//! its upstream task to the event's owning (downstream) task, labelled with
//! the event id and the rule state. Schedule triggers and composite events
//! are kept on their owning tasks and surface as meta-nodes in tree
//! renderings. The graph is process-local, rebuilt on demand, and not safe
//! for concurrent mutation.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use tracing::warn;
use uuid::Uuid;

use crate::errors::GraphError;
use crate::model::types::{
    parse_qrs_timestamp, CompositeRule, CompositeTrigger, DaylightSaving, ExecutionState,
    IncrementOption, RuleState, SchemaTrigger, Task, TaskKind, TaskPayload, TimeConstraint,
    NEVER_TIMESTAMP,
};
use crate::qrs::types::{
    execution_status_name, AppCondensed, CompositeEvent, ExternalProgramTask, Operational,
    ReloadTask, SchemaEvent,
};

/// One composite-dependency edge: upstream fired with `state`, feeding the
/// composite event `event_id` on the downstream task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEdge {
    pub upstream: Uuid,
    pub downstream: Uuid,
    pub event_id: Option<Uuid>,
    pub event_name: String,
    pub state: RuleState,
}

/// Selection terms for [`TaskGraph::root_nodes_from_filter`]; terms are
/// OR-ed together.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub task_ids: Vec<Uuid>,
    pub task_tags: Vec<String>,
    pub app_ids: Vec<Uuid>,
    pub app_tags: Vec<String>,
}

impl FilterSpec {
    pub fn is_empty(&self) -> bool {
        self.task_ids.is_empty()
            && self.task_tags.is_empty()
            && self.app_ids.is_empty()
            && self.app_tags.is_empty()
    }
}

/// Single source of truth for the task population during a run
#[derive(Debug, Default)]
pub struct TaskGraph {
    tasks: IndexMap<Uuid, Task>,
    name_index: HashMap<String, Vec<Uuid>>,
    tag_index: HashMap<String, Vec<Uuid>>,
    app_index: HashMap<Uuid, Vec<Uuid>>,
    /// App tag name -> app GUIDs, from the app population
    app_tag_index: HashMap<String, Vec<Uuid>>,
    edges: Vec<TaskEdge>,
    /// Upstream GUIDs referenced by rules but absent from the population.
    /// Dangling references are reported, never dropped.
    tombstones: IndexSet<Uuid>,
    incoming: HashMap<Uuid, Vec<usize>>,
    outgoing: HashMap<Uuid, Vec<usize>>,
}

impl TaskGraph {
    /// Assemble the graph from the Repository's full task, event, and app
    /// populations. Events are joined to their owning tasks client-side.
    pub fn from_repository(
        reload_tasks: Vec<ReloadTask>,
        external_tasks: Vec<ExternalProgramTask>,
        schema_events: Vec<SchemaEvent>,
        composite_events: Vec<CompositeEvent>,
        apps: &[AppCondensed],
    ) -> Self {
        let mut tasks: Vec<Task> = Vec::with_capacity(reload_tasks.len() + external_tasks.len());
        tasks.extend(reload_tasks.into_iter().map(task_from_reload));
        tasks.extend(external_tasks.into_iter().map(task_from_external));

        let mut by_id: IndexMap<Uuid, Task> =
            tasks.into_iter().map(|t| (t.id, t)).collect();

        for event in schema_events {
            let Some(owner) = event.owner_id() else {
                warn!("Schema event '{}' has no owning task, skipped", event.name);
                continue;
            };
            match by_id.get_mut(&owner) {
                Some(task) => task.schema_triggers.push(schema_trigger_from_wire(&event)),
                None => warn!(
                    "Schema event '{}' references unknown task {}",
                    event.name, owner
                ),
            }
        }

        for event in composite_events {
            let Some(owner) = event.owner_id() else {
                warn!(
                    "Composite event '{}' has no owning task, skipped",
                    event.name
                );
                continue;
            };
            match by_id.get_mut(&owner) {
                Some(task) => task
                    .composite_triggers
                    .push(composite_trigger_from_wire(&event)),
                None => warn!(
                    "Composite event '{}' references unknown task {}",
                    event.name, owner
                ),
            }
        }

        let mut graph = Self::from_tasks(by_id.into_values().collect());
        for app in apps {
            for tag in &app.tags {
                graph
                    .app_tag_index
                    .entry(tag.name.clone())
                    .or_default()
                    .push(app.id);
            }
        }
        graph
    }

    /// Build the graph from already-normalized tasks (tests and previews)
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut graph = TaskGraph::default();
        for task in tasks {
            graph
                .name_index
                .entry(task.name.clone())
                .or_default()
                .push(task.id);
            for tag in &task.tags {
                graph.tag_index.entry(tag.clone()).or_default().push(task.id);
            }
            if let Some(app_id) = task.app_id() {
                graph.app_index.entry(app_id).or_default().push(task.id);
            }
            graph.tasks.insert(task.id, task);
        }
        graph.rebuild_edges();
        graph
    }

    /// Derive the edge list from every composite rule of every task. Rules
    /// whose upstream is unknown produce a tombstone entry and keep their
    /// edge, so the dangling reference stays visible.
    fn rebuild_edges(&mut self) {
        self.edges.clear();
        self.incoming.clear();
        self.outgoing.clear();
        self.tombstones.clear();

        let mut edges = Vec::new();
        for task in self.tasks.values() {
            for trigger in &task.composite_triggers {
                for rule in &trigger.rules {
                    if !self.tasks.contains_key(&rule.upstream) {
                        self.tombstones.insert(rule.upstream);
                    }
                    edges.push(TaskEdge {
                        upstream: rule.upstream,
                        downstream: task.id,
                        event_id: trigger.id,
                        event_name: trigger.name.clone(),
                        state: rule.state,
                    });
                }
            }
        }

        for (idx, edge) in edges.iter().enumerate() {
            self.incoming.entry(edge.downstream).or_default().push(idx);
            self.outgoing.entry(edge.upstream).or_default().push(idx);
        }
        self.edges = edges;

        if !self.tombstones.is_empty() {
            warn!(
                "{} composite rule(s) reference tasks missing from the population",
                self.tombstones.len()
            );
        }
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate tasks in insertion order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    /// All composite-dependency edges
    pub fn edges(&self) -> &[TaskEdge] {
        &self.edges
    }

    /// `(upstream, downstream, event, state)` tuples
    pub fn edge_tuples(&self) -> impl Iterator<Item = (Uuid, Uuid, Option<Uuid>, RuleState)> + '_ {
        self.edges
            .iter()
            .map(|e| (e.upstream, e.downstream, e.event_id, e.state))
    }

    /// Upstream GUIDs referenced by rules but absent from the population
    pub fn tombstones(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.tombstones.iter().copied()
    }

    pub fn tasks_by_name(&self, name: &str) -> Vec<&Task> {
        self.name_index
            .get(name)
            .map(|ids| ids.iter().filter_map(|id| self.tasks.get(id)).collect())
            .unwrap_or_default()
    }

    /// Edges fanning out of a task, to downstream dependents
    pub fn outgoing_edges(&self, id: Uuid) -> impl Iterator<Item = &TaskEdge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.edges[idx])
    }

    /// Edges pointing into a task, from upstream dependencies
    pub fn incoming_edges(&self, id: Uuid) -> impl Iterator<Item = &TaskEdge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .map(|&idx| &self.edges[idx])
    }

    /// Whether a task has an incoming edge from a task that actually exists.
    /// Edges from tombstones do not count: their upstream cannot anchor a
    /// chain in any rendering.
    fn has_live_incoming(&self, id: Uuid) -> bool {
        self.incoming_edges(id)
            .any(|e| self.tasks.contains_key(&e.upstream))
    }

    /// Tasks with no incoming composite edges
    pub fn roots(&self) -> Vec<Uuid> {
        self.tasks
            .keys()
            .copied()
            .filter(|&id| !self.has_live_incoming(id))
            .collect()
    }

    /// Tasks carrying at least one schedule trigger
    pub fn scheduled_tasks(&self) -> Vec<Uuid> {
        self.tasks
            .values()
            .filter(|t| !t.schema_triggers.is_empty())
            .map(|t| t.id)
            .collect()
    }

    /// Tasks matching any filter term (union), in insertion order; an
    /// empty filter matches everything. Used to restrict table output.
    pub fn matching_tasks(&self, filter: &FilterSpec) -> Vec<&Task> {
        if filter.is_empty() {
            return self.tasks().collect();
        }
        let mut selected: IndexSet<Uuid> = IndexSet::new();
        for id in &filter.task_ids {
            if self.tasks.contains_key(id) {
                selected.insert(*id);
            }
        }
        for tag in &filter.task_tags {
            for id in self.tag_index.get(tag).into_iter().flatten() {
                selected.insert(*id);
            }
        }
        let mut app_ids: IndexSet<Uuid> = filter.app_ids.iter().copied().collect();
        for app_tag in &filter.app_tags {
            for id in self.app_tag_index.get(app_tag).into_iter().flatten() {
                app_ids.insert(*id);
            }
        }
        for app_id in &app_ids {
            for id in self.app_index.get(app_id).into_iter().flatten() {
                selected.insert(*id);
            }
        }
        self.tasks
            .values()
            .filter(|t| selected.contains(&t.id))
            .collect()
    }

    /// Collect the initial set matching any filter term (union), walk the
    /// composite edges upstream until fixed point, and return the tasks of
    /// that closure that have no incoming composite edges. De-duplicated by
    /// task GUID.
    pub fn root_nodes_from_filter(&self, filter: &FilterSpec) -> Vec<Uuid> {
        let mut initial: IndexSet<Uuid> = IndexSet::new();

        for id in &filter.task_ids {
            if self.tasks.contains_key(id) {
                initial.insert(*id);
            }
        }
        for tag in &filter.task_tags {
            for id in self.tag_index.get(tag).into_iter().flatten() {
                initial.insert(*id);
            }
        }
        let mut app_ids: IndexSet<Uuid> = filter.app_ids.iter().copied().collect();
        for app_tag in &filter.app_tags {
            for id in self.app_tag_index.get(app_tag).into_iter().flatten() {
                app_ids.insert(*id);
            }
        }
        for app_id in &app_ids {
            for id in self.app_index.get(app_id).into_iter().flatten() {
                initial.insert(*id);
            }
        }

        // Fixed-point walk upstream
        let mut visited: IndexSet<Uuid> = IndexSet::new();
        let mut stack: Vec<Uuid> = initial.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            for edge in self.incoming_edges(id) {
                if self.tasks.contains_key(&edge.upstream) && !visited.contains(&edge.upstream) {
                    stack.push(edge.upstream);
                }
            }
        }

        visited
            .into_iter()
            .filter(|&id| !self.has_live_incoming(id))
            .collect()
    }

    /// Downstream tasks reachable from `root` through composite edges,
    /// `root` included. Traversal halts at repeating nodes; exceeding
    /// `max_depth` on any path is an error.
    pub fn subtree(&self, root: Uuid, max_depth: usize) -> Result<Vec<Uuid>, GraphError> {
        if !self.tasks.contains_key(&root) {
            return Err(GraphError::UnknownTask(root));
        }
        let mut reached: IndexSet<Uuid> = IndexSet::new();
        let mut stack: Vec<(Uuid, usize)> = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            if !reached.insert(id) {
                continue;
            }
            if depth >= max_depth {
                if self.outgoing_edges(id).next().is_some() {
                    return Err(GraphError::DepthExceeded { root, max_depth });
                }
                continue;
            }
            for edge in self.outgoing_edges(id) {
                if self.tasks.contains_key(&edge.downstream) {
                    stack.push((edge.downstream, depth + 1));
                }
            }
        }
        Ok(reached.into_iter().collect())
    }
}

fn execution_from_operational(operational: Option<Operational>) -> ExecutionState {
    let Some(op) = operational else {
        return ExecutionState::default();
    };
    let mut state = ExecutionState {
        next_execution: op
            .next_execution
            .as_deref()
            .and_then(non_sentinel_timestamp),
        ..Default::default()
    };
    if let Some(last) = op.last_execution_result {
        state.last_status = Some(execution_status_name(last.status).to_string());
        state.last_start = last.start_time.as_deref().and_then(non_sentinel_timestamp);
        state.last_stop = last.stop_time.as_deref().and_then(non_sentinel_timestamp);
        state.last_duration_ms = last.duration;
    }
    state
}

/// Parse a wire timestamp, treating the 1753 sentinel as "never happened"
fn non_sentinel_timestamp(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if value == NEVER_TIMESTAMP {
        return None;
    }
    parse_qrs_timestamp(value)
}

fn task_from_reload(wire: ReloadTask) -> Task {
    Task {
        id: wire.id,
        kind: TaskKind::Reload,
        name: wire.name,
        enabled: wire.enabled,
        session_timeout_minutes: wire.task_session_timeout.max(0) as u32,
        max_retries: wire.max_retries.max(0) as u32,
        payload: TaskPayload::Reload {
            app_id: wire.app.id,
            app_name: Some(wire.app.name),
            partial_reload: wire.is_partial_reload,
            manually_triggered: wire.is_manually_triggered,
        },
        tags: wire.tags.into_iter().map(|t| t.name).collect(),
        custom_properties: wire
            .custom_properties
            .into_iter()
            .map(|cp| (cp.definition.name, cp.value))
            .collect(),
        schema_triggers: Vec::new(),
        composite_triggers: Vec::new(),
        execution: execution_from_operational(wire.operational),
    }
}

fn task_from_external(wire: ExternalProgramTask) -> Task {
    Task {
        id: wire.id,
        kind: TaskKind::ExternalProgram,
        name: wire.name,
        enabled: wire.enabled,
        session_timeout_minutes: wire.task_session_timeout.max(0) as u32,
        max_retries: wire.max_retries.max(0) as u32,
        payload: TaskPayload::ExternalProgram {
            path: wire.path,
            parameters: wire.parameters,
        },
        tags: wire.tags.into_iter().map(|t| t.name).collect(),
        custom_properties: wire
            .custom_properties
            .into_iter()
            .map(|cp| (cp.definition.name, cp.value))
            .collect(),
        schema_triggers: Vec::new(),
        composite_triggers: Vec::new(),
        execution: execution_from_operational(wire.operational),
    }
}

fn schema_trigger_from_wire(event: &SchemaEvent) -> SchemaTrigger {
    SchemaTrigger {
        name: event.name.clone(),
        enabled: event.enabled,
        increment_option: IncrementOption::from_wire(event.increment_option)
            .unwrap_or(IncrementOption::Once),
        increment_description: event.increment_description.clone(),
        daylight_saving: DaylightSaving::from_wire(event.daylight_saving_time)
            .unwrap_or(DaylightSaving::ObserveDaylightSavingTime),
        start: parse_qrs_timestamp(&event.start_date).unwrap_or_default(),
        expiration: parse_qrs_timestamp(&event.expiration_date).unwrap_or_default(),
        filter_description: event.schema_filter_description.join(" "),
        time_zone: event.time_zone.clone(),
    }
}

fn composite_trigger_from_wire(event: &CompositeEvent) -> CompositeTrigger {
    CompositeTrigger {
        id: Some(event.id),
        name: event.name.clone(),
        enabled: event.enabled,
        time_constraint: TimeConstraint {
            seconds: event.time_constraint.seconds.max(0) as u32,
            minutes: event.time_constraint.minutes.max(0) as u32,
            hours: event.time_constraint.hours.max(0) as u32,
            days: event.time_constraint.days.max(0) as u32,
        },
        rules: event
            .composite_rules
            .iter()
            .filter_map(|rule| {
                let upstream = rule.upstream_id()?;
                Some(CompositeRule {
                    upstream,
                    state: RuleState::from_wire(rule.rule_state)
                        .unwrap_or(RuleState::TaskSuccessful),
                    upstream_name: rule.upstream_name().map(str::to_string),
                })
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::format_qrs_timestamp;

    fn reload_task(id: Uuid, name: &str, tags: &[&str]) -> Task {
        Task {
            id,
            kind: TaskKind::Reload,
            name: name.to_string(),
            enabled: true,
            session_timeout_minutes: 1440,
            max_retries: 0,
            payload: TaskPayload::Reload {
                app_id: Uuid::new_v4(),
                app_name: Some("App".to_string()),
                partial_reload: false,
                manually_triggered: false,
            },
            tags: tags.iter().map(|t| t.to_string()).collect(),
            custom_properties: Vec::new(),
            schema_triggers: Vec::new(),
            composite_triggers: Vec::new(),
            execution: ExecutionState::default(),
        }
    }

    fn chain_to(task: &mut Task, upstream: Uuid, state: RuleState) {
        task.composite_triggers.push(CompositeTrigger {
            id: Some(Uuid::new_v4()),
            name: format!("after {}", upstream),
            enabled: true,
            time_constraint: TimeConstraint::default(),
            rules: vec![CompositeRule {
                upstream,
                state,
                upstream_name: None,
            }],
        });
    }

    #[test]
    fn test_edges_derived_from_composite_rules() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let task_a = reload_task(a, "A", &[]);
        let mut task_b = reload_task(b, "B", &[]);
        chain_to(&mut task_b, a, RuleState::TaskSuccessful);

        let graph = TaskGraph::from_tasks(vec![task_a, task_b]);
        assert_eq!(graph.edges().len(), 1);
        let edge = &graph.edges()[0];
        assert_eq!(edge.upstream, a);
        assert_eq!(edge.downstream, b);
        assert_eq!(edge.state, RuleState::TaskSuccessful);
        assert_eq!(graph.roots(), vec![a]);
    }

    #[test]
    fn test_dangling_rule_becomes_tombstone_not_dropped() {
        let b = Uuid::new_v4();
        let missing = Uuid::new_v4();
        let mut task_b = reload_task(b, "B", &[]);
        chain_to(&mut task_b, missing, RuleState::TaskFail);

        let graph = TaskGraph::from_tasks(vec![task_b]);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.tombstones().collect::<Vec<_>>(), vec![missing]);
        // The tombstone upstream cannot anchor a chain, so B still renders
        // as a root.
        assert_eq!(graph.roots(), vec![b]);
    }

    #[test]
    fn test_root_nodes_from_filter_walks_upstream() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let task_a = reload_task(a, "A", &[]);
        let mut task_b = reload_task(b, "B", &[]);
        chain_to(&mut task_b, a, RuleState::TaskSuccessful);
        let mut task_c = reload_task(c, "C", &["finance"]);
        chain_to(&mut task_c, b, RuleState::TaskSuccessful);

        let graph = TaskGraph::from_tasks(vec![task_a, task_b, task_c]);
        let filter = FilterSpec {
            task_tags: vec!["finance".to_string()],
            ..Default::default()
        };
        assert_eq!(graph.root_nodes_from_filter(&filter), vec![a]);
    }

    #[test]
    fn test_root_nodes_from_filter_unions_terms() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let task_a = reload_task(a, "A", &["nightly"]);
        let task_b = reload_task(b, "B", &[]);

        let graph = TaskGraph::from_tasks(vec![task_a, task_b]);
        let filter = FilterSpec {
            task_ids: vec![b],
            task_tags: vec!["nightly".to_string()],
            ..Default::default()
        };
        let mut roots = graph.root_nodes_from_filter(&filter);
        roots.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(roots, expected);
    }

    #[test]
    fn test_subtree_halts_on_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut task_a = reload_task(a, "A", &[]);
        let mut task_b = reload_task(b, "B", &[]);
        chain_to(&mut task_b, a, RuleState::TaskSuccessful);
        chain_to(&mut task_a, b, RuleState::TaskSuccessful);

        let graph = TaskGraph::from_tasks(vec![task_a, task_b]);
        let subtree = graph.subtree(a, 10).expect("cycle must not loop");
        assert_eq!(subtree.len(), 2);
    }

    #[test]
    fn test_subtree_depth_guard() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let task_a = reload_task(a, "A", &[]);
        let mut task_b = reload_task(b, "B", &[]);
        chain_to(&mut task_b, a, RuleState::TaskSuccessful);
        let mut task_c = reload_task(c, "C", &[]);
        chain_to(&mut task_c, b, RuleState::TaskSuccessful);

        let graph = TaskGraph::from_tasks(vec![task_a, task_b, task_c]);
        assert!(matches!(
            graph.subtree(a, 1),
            Err(GraphError::DepthExceeded { .. })
        ));
        assert_eq!(graph.subtree(a, 5).unwrap().len(), 3);
    }

    #[test]
    fn test_from_repository_joins_events_to_tasks() {
        let task_id = Uuid::new_v4();
        let upstream_id = Uuid::new_v4();
        let reload: ReloadTask = serde_json::from_value(serde_json::json!({
            "id": task_id,
            "name": "Reload sales",
            "enabled": true,
            "taskSessionTimeout": 1440,
            "maxRetries": 0,
            "isPartialReload": false,
            "app": {"id": Uuid::new_v4(), "name": "Sales"},
            "tags": [],
            "customProperties": []
        }))
        .unwrap();
        let upstream: ReloadTask = serde_json::from_value(serde_json::json!({
            "id": upstream_id,
            "name": "Upstream",
            "enabled": true,
            "app": {"id": Uuid::new_v4(), "name": "Upstream app"}
        }))
        .unwrap();

        let schema: SchemaEvent = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Daily",
            "enabled": true,
            "eventType": 0,
            "incrementOption": 2,
            "incrementDescription": "0 0 1 0",
            "daylightSavingTime": 0,
            "startDate": "2024-01-01T06:00:00.000Z",
            "expirationDate": "9999-01-01T00:00:00.000Z",
            "schemaFilterDescription": ["* * - * * * *"],
            "timeZone": "Europe/Stockholm",
            "reloadTask": {"id": task_id, "name": "Reload sales"}
        }))
        .unwrap();

        let composite: CompositeEvent = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "After upstream",
            "enabled": true,
            "eventType": 1,
            "timeConstraint": {"seconds": 0, "minutes": 0, "hours": 0, "days": 0},
            "compositeRules": [
                {"ruleState": 1, "reloadTask": {"id": upstream_id, "name": "Upstream"}}
            ],
            "reloadTask": {"id": task_id, "name": "Reload sales"}
        }))
        .unwrap();

        let graph =
            TaskGraph::from_repository(vec![reload, upstream], vec![], vec![schema], vec![composite], &[]);
        assert_eq!(graph.len(), 2);
        let task = graph.task(task_id).unwrap();
        assert_eq!(task.schema_triggers.len(), 1);
        assert!(task.schema_triggers[0].never_expires());
        assert_eq!(
            format_qrs_timestamp(&task.schema_triggers[0].start),
            "2024-01-01T06:00:00.000Z"
        );
        assert_eq!(task.composite_triggers.len(), 1);
        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.roots(), vec![upstream_id]);
    }
}
