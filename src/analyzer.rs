//! Task-network analysis and tree projection.
//!
//! Cycle detection runs a three-color DFS over the composite edges;
//! duplicate edges are counted per `(upstream, downstream, state)` triple.
//! The tree renderer starts from the graph roots plus a synthetic
//! "scheduled" super-root and deliberately produces a tree, not a DAG: a
//! task reachable from several chains appears once per chain, each
//! appearance showing a different causal path.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::model::{RuleState, Task, TaskGraph};

/// One circular dependency, reported as an unordered task pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircularChain {
    pub from: Uuid,
    pub from_name: Option<String>,
    pub to: Uuid,
    pub to_name: Option<String>,
}

/// A `(upstream, downstream, state)` triple that appears more than once
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateEdge {
    pub upstream: Uuid,
    pub upstream_name: Option<String>,
    pub downstream: Uuid,
    pub downstream_name: Option<String>,
    pub state: RuleState,
    pub count: usize,
}

/// Find every circular pair with a white/gray/black DFS; a back edge into a
/// gray node yields the pair. Pairs are de-duplicated by unordered endpoint
/// identity.
pub fn find_circular_chains(graph: &TaskGraph) -> Vec<CircularChain> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut colors: HashMap<Uuid, Color> =
        graph.tasks().map(|t| (t.id, Color::White)).collect();
    let mut seen: BTreeSet<(Uuid, Uuid)> = BTreeSet::new();
    let mut pairs = Vec::new();

    fn visit(
        graph: &TaskGraph,
        node: Uuid,
        colors: &mut HashMap<Uuid, Color>,
        seen: &mut BTreeSet<(Uuid, Uuid)>,
        pairs: &mut Vec<CircularChain>,
    ) {
        colors.insert(node, Color::Gray);
        for edge in graph.outgoing_edges(node) {
            let target = edge.downstream;
            match colors.get(&target).copied() {
                Some(Color::Gray) => {
                    let key = if node < target {
                        (node, target)
                    } else {
                        (target, node)
                    };
                    if seen.insert(key) {
                        pairs.push(CircularChain {
                            from: node,
                            from_name: graph.task(node).map(|t| t.name.clone()),
                            to: target,
                            to_name: graph.task(target).map(|t| t.name.clone()),
                        });
                    }
                }
                Some(Color::White) => visit(graph, target, colors, seen, pairs),
                _ => {}
            }
        }
        colors.insert(node, Color::Black);
    }

    let nodes: Vec<Uuid> = graph.tasks().map(|t| t.id).collect();
    for node in nodes {
        if colors.get(&node) == Some(&Color::White) {
            visit(graph, node, &mut colors, &mut seen, &mut pairs);
        }
    }
    pairs
}

/// Count `(upstream, downstream, state)` occurrences; every count of two or
/// more yields one report.
pub fn find_duplicate_edges(graph: &TaskGraph) -> Vec<DuplicateEdge> {
    let mut counts: HashMap<(Uuid, Uuid, RuleState), usize> = HashMap::new();
    for edge in graph.edges() {
        *counts
            .entry((edge.upstream, edge.downstream, edge.state))
            .or_insert(0) += 1;
    }

    let mut duplicates: Vec<DuplicateEdge> = counts
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .map(|((upstream, downstream, state), count)| DuplicateEdge {
            upstream,
            upstream_name: graph.task(upstream).map(|t| t.name.clone()),
            downstream,
            downstream_name: graph.task(downstream).map(|t| t.name.clone()),
            state,
            count,
        })
        .collect();
    duplicates.sort_by_key(|d| (d.upstream, d.downstream));
    duplicates
}

/// Vertex flavor in a rendered tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TreeNodeKind {
    Task,
    /// Synthetic super-root collecting every task with a schedule trigger
    ScheduledRoot,
    /// Meta-node for a schedule trigger
    SchemaTrigger,
    /// Meta-node for a composite event edge
    CompositeTrigger,
    /// Marker emitted where a chain loops back on itself
    Circular,
}

/// One vertex of the rendered task tree
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub label: String,
    pub kind: TreeNodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

/// Display-only decorations appended to task labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeDetail {
    TaskId,
    LastStatus,
    LastExecution,
    NextExecution,
    AppName,
    Tags,
}

impl TreeDetail {
    pub fn from_cli(value: &str) -> Option<Self> {
        match value {
            "taskid" => Some(TreeDetail::TaskId),
            "laststatus" => Some(TreeDetail::LastStatus),
            "lastexecution" => Some(TreeDetail::LastExecution),
            "nextexecution" => Some(TreeDetail::NextExecution),
            "appname" => Some(TreeDetail::AppName),
            "tags" => Some(TreeDetail::Tags),
            _ => None,
        }
    }
}

/// Tree projection knobs
#[derive(Debug, Clone, Default)]
pub struct TreeOptions {
    pub details: Vec<TreeDetail>,
}

/// Build the task tree: every root chain, plus a synthetic super-root that
/// collects each task owning at least one schedule trigger. Pass explicit
/// roots to restrict the projection.
pub fn build_task_tree(
    graph: &TaskGraph,
    roots: Option<Vec<Uuid>>,
    options: &TreeOptions,
) -> Vec<TreeNode> {
    let roots = roots.unwrap_or_else(|| graph.roots());

    let mut tree = Vec::new();

    let scheduled = graph.scheduled_tasks();
    if !scheduled.is_empty() {
        let mut super_root = TreeNode {
            label: "Scheduled tasks".to_string(),
            kind: TreeNodeKind::ScheduledRoot,
            task_id: None,
            children: Vec::new(),
        };
        for id in scheduled {
            let mut path = HashSet::new();
            if let Some(node) = task_subtree(graph, id, options, &mut path) {
                super_root.children.push(node);
            }
        }
        tree.push(super_root);
    }

    for id in roots {
        let mut path = HashSet::new();
        if let Some(node) = task_subtree(graph, id, options, &mut path) {
            tree.push(node);
        }
    }
    tree
}

/// Recursive downstream projection of one task. `path` carries the chain
/// currently being rendered; meeting a task already on it emits a circular
/// marker and stops.
fn task_subtree(
    graph: &TaskGraph,
    id: Uuid,
    options: &TreeOptions,
    path: &mut HashSet<Uuid>,
) -> Option<TreeNode> {
    let task = graph.task(id)?;
    if !path.insert(id) {
        return Some(TreeNode {
            label: format!("{} (circular dependency)", task.name),
            kind: TreeNodeKind::Circular,
            task_id: Some(id),
            children: Vec::new(),
        });
    }

    let mut node = TreeNode {
        label: task_label(task, options),
        kind: TreeNodeKind::Task,
        task_id: Some(id),
        children: Vec::new(),
    };

    for trigger in &task.schema_triggers {
        node.children.push(TreeNode {
            label: format!(
                "{} [{}]",
                trigger.name,
                trigger.increment_option.as_source_str()
            ),
            kind: TreeNodeKind::SchemaTrigger,
            task_id: None,
            children: Vec::new(),
        });
    }

    for edge in graph.outgoing_edges(id) {
        let state = match edge.state {
            RuleState::TaskSuccessful => "on success",
            RuleState::TaskFail => "on failure",
        };
        let mut meta = TreeNode {
            label: format!("{} ({})", edge.event_name, state),
            kind: TreeNodeKind::CompositeTrigger,
            task_id: None,
            children: Vec::new(),
        };
        if let Some(child) = task_subtree(graph, edge.downstream, options, path) {
            meta.children.push(child);
        }
        node.children.push(meta);
    }

    path.remove(&id);
    Some(node)
}

fn task_label(task: &Task, options: &TreeOptions) -> String {
    let mut label = task.name.clone();
    for detail in &options.details {
        match detail {
            TreeDetail::TaskId => {
                label.push_str(&format!(" <id: {}>", task.id));
            }
            TreeDetail::LastStatus => {
                let status = task.execution.last_status.as_deref().unwrap_or("-");
                label.push_str(&format!(" <last: {}>", status));
            }
            TreeDetail::LastExecution => {
                let stamp = task
                    .execution
                    .last_stop
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                label.push_str(&format!(" <finished: {}>", stamp));
            }
            TreeDetail::NextExecution => {
                let stamp = task
                    .execution
                    .next_execution
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                label.push_str(&format!(" <next: {}>", stamp));
            }
            TreeDetail::AppName => {
                if let Some(app) = task.app_name() {
                    label.push_str(&format!(" <app: {}>", app));
                }
            }
            TreeDetail::Tags => {
                if !task.tags.is_empty() {
                    label.push_str(&format!(" <tags: {}>", task.tags.join(", ")));
                }
            }
        }
    }
    label
}
