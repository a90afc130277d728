//! Round-trip: exporting a graph produces a source that the parser and
//! importer recreate as an equivalent population.

mod common;

use std::time::Duration;

use uuid::Uuid;

use common::MockRepository;
use ctrlq::export::{build_task_table, to_csv, TableDetail};
use ctrlq::importer::{ImportOptions, TaskImporter};
use ctrlq::model::types::{
    format_qrs_timestamp, parse_qrs_timestamp, CompositeRule, CompositeTrigger, DaylightSaving,
    ExecutionState, IncrementOption, RuleState, SchemaTrigger, TaskKind, TaskPayload,
    TimeConstraint, NO_EXPIRATION_TIMESTAMP,
};
use ctrlq::model::{FilterSpec, Task, TaskGraph};
use ctrlq::parser::source::read_delimited;
use ctrlq::parser::{parse_tasks, ParseOptions};
use ctrlq::qrs::types::AppCondensed;
use ctrlq::qrs::RepositoryCaches;
use ctrlq::session::CancelFlag;

fn sample_graph() -> (TaskGraph, Uuid, Uuid, Uuid) {
    let app_id = Uuid::new_v4();
    let a_id = Uuid::new_v4();
    let b_id = Uuid::new_v4();
    let c_id = Uuid::new_v4();

    let task_a = Task {
        id: a_id,
        kind: TaskKind::Reload,
        name: "Load sales".to_string(),
        enabled: true,
        session_timeout_minutes: 720,
        max_retries: 2,
        payload: TaskPayload::Reload {
            app_id,
            app_name: Some("Sales".to_string()),
            partial_reload: true,
            manually_triggered: false,
        },
        tags: vec!["Nightly".to_string(), "Finance".to_string()],
        custom_properties: vec![("Department".to_string(), "Sales".to_string())],
        schema_triggers: vec![SchemaTrigger {
            name: "Every morning".to_string(),
            enabled: true,
            increment_option: IncrementOption::Daily,
            increment_description: "0 0 1 0".to_string(),
            daylight_saving: DaylightSaving::ObserveDaylightSavingTime,
            start: parse_qrs_timestamp("2024-01-01T05:30:00.000Z").unwrap(),
            expiration: parse_qrs_timestamp(NO_EXPIRATION_TIMESTAMP).unwrap(),
            filter_description: "* * - * * * *".to_string(),
            time_zone: "Europe/Stockholm".to_string(),
        }],
        composite_triggers: Vec::new(),
        execution: ExecutionState::default(),
    };

    let mut task_b = task_a.clone();
    task_b.id = b_id;
    task_b.name = "Publish sales".to_string();
    task_b.tags = Vec::new();
    task_b.custom_properties = Vec::new();
    task_b.schema_triggers = Vec::new();
    task_b.payload = TaskPayload::Reload {
        app_id,
        app_name: Some("Sales".to_string()),
        partial_reload: false,
        manually_triggered: false,
    };
    task_b.composite_triggers = vec![CompositeTrigger {
        id: Some(Uuid::new_v4()),
        name: "After load".to_string(),
        enabled: true,
        time_constraint: TimeConstraint {
            seconds: 0,
            minutes: 360,
            hours: 0,
            days: 0,
        },
        rules: vec![
            CompositeRule {
                upstream: a_id,
                state: RuleState::TaskSuccessful,
                upstream_name: Some("Load sales".to_string()),
            },
            CompositeRule {
                upstream: a_id,
                state: RuleState::TaskFail,
                upstream_name: Some("Load sales".to_string()),
            },
        ],
    }];

    let task_c = Task {
        id: c_id,
        kind: TaskKind::ExternalProgram,
        name: "Archive logs".to_string(),
        enabled: true,
        session_timeout_minutes: 60,
        max_retries: 1,
        payload: TaskPayload::ExternalProgram {
            path: "C:\\tools\\archive.cmd".to_string(),
            parameters: "--all".to_string(),
        },
        tags: Vec::new(),
        custom_properties: Vec::new(),
        schema_triggers: Vec::new(),
        composite_triggers: Vec::new(),
        execution: ExecutionState::default(),
    };

    (
        TaskGraph::from_tasks(vec![task_a, task_b, task_c]),
        app_id,
        a_id,
        b_id,
    )
}

#[test]
fn export_parses_back_into_equivalent_records() {
    let (graph, _app_id, a_id, _b_id) = sample_graph();
    let table = build_task_table(&graph, &FilterSpec::default(), &TableDetail::all());

    let records = parse_tasks(&table, &ParseOptions::default()).expect("exported table parses");
    assert_eq!(records.len(), 3);

    let load = records.iter().find(|r| r.name == "Load sales").unwrap();
    assert_eq!(load.kind, TaskKind::Reload);
    assert_eq!(load.timeout_minutes, 720);
    assert_eq!(load.max_retries, 2);
    assert!(load.partial_reload);
    assert_eq!(load.tags, vec!["Nightly".to_string(), "Finance".to_string()]);
    assert_eq!(
        load.custom_properties,
        vec![("Department".to_string(), "Sales".to_string())]
    );
    assert_eq!(load.schema_triggers.len(), 1);
    let trigger = &load.schema_triggers[0];
    assert_eq!(trigger.name, "Every morning");
    assert_eq!(trigger.increment_option, IncrementOption::Daily);
    assert_eq!(
        format_qrs_timestamp(&trigger.expiration),
        NO_EXPIRATION_TIMESTAMP,
        "the no-expiration sentinel round-trips"
    );

    let publish = records.iter().find(|r| r.name == "Publish sales").unwrap();
    assert_eq!(publish.composite_triggers.len(), 1);
    let event = &publish.composite_triggers[0];
    assert_eq!(event.time_constraint.minutes, 360);
    assert_eq!(event.rules.len(), 2);
    for rule in &event.rules {
        assert_eq!(rule.task_ref, a_id.to_string());
    }
    let states: Vec<RuleState> = event.rules.iter().map(|r| r.state).collect();
    assert!(states.contains(&RuleState::TaskSuccessful));
    assert!(states.contains(&RuleState::TaskFail));

    let archive = records.iter().find(|r| r.name == "Archive logs").unwrap();
    assert_eq!(archive.kind, TaskKind::ExternalProgram);
    assert_eq!(
        archive.ext_program_path.as_deref(),
        Some("C:\\tools\\archive.cmd")
    );
}

#[test]
fn csv_sink_round_trips_through_the_reader() {
    let (graph, _, _, _) = sample_graph();
    let table = build_task_table(&graph, &FilterSpec::default(), &TableDetail::all());

    let csv = to_csv::render(&table).expect("csv renders");
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    std::io::Write::write_all(&mut file, csv.as_bytes()).unwrap();

    let reread = read_delimited(file.path(), b',').expect("csv reads back");
    let direct = parse_tasks(&table, &ParseOptions::default()).unwrap();
    let through_csv = parse_tasks(&reread, &ParseOptions::default()).unwrap();
    assert_eq!(direct, through_csv);
}

/// Feeding the exporter's output through the importer recreates the same
/// task names, trigger definitions, and composite-rule multisets. GUIDs
/// differ; exported `Task id` cells act as local handles.
#[tokio::test]
async fn exported_population_reimports_equivalently() {
    let (graph, app_id, _a_id, _b_id) = sample_graph();
    let table = build_task_table(&graph, &FilterSpec::default(), &TableDetail::all());
    let records = parse_tasks(&table, &ParseOptions::default()).expect("exported table parses");

    // The import target knows the app and the tags/properties the export
    // references, but none of the tasks.
    let caches = RepositoryCaches {
        tags: vec![
            ctrlq::qrs::types::TagCondensed {
                id: Uuid::new_v4(),
                name: "Nightly".to_string(),
            },
            ctrlq::qrs::types::TagCondensed {
                id: Uuid::new_v4(),
                name: "Finance".to_string(),
            },
        ],
        custom_properties: vec![ctrlq::qrs::types::CustomPropertyDefinition {
            id: Uuid::new_v4(),
            name: "Department".to_string(),
            choice_values: vec!["Sales".to_string()],
            object_types: Vec::new(),
        }],
        streams: Vec::new(),
        apps: vec![AppCondensed {
            id: app_id,
            name: "Sales".to_string(),
            published: false,
            stream: None,
            tags: Vec::new(),
        }],
    };

    let repo = MockRepository::default();
    let empty_graph = TaskGraph::from_tasks(Vec::new());
    let importer = TaskImporter::new(
        &repo,
        &empty_graph,
        ImportOptions {
            sleep_app_upload: Duration::ZERO,
        },
        CancelFlag::new(),
    );
    let summary = importer
        .run(&caches, &records, &[])
        .await
        .expect("references resolve");
    assert!(summary.is_clean());

    let reloads = repo.reload_creates.lock().unwrap();
    let externals = repo.external_creates.lock().unwrap();
    let composites = repo.composite_creates.lock().unwrap();

    let mut names: Vec<String> = reloads
        .iter()
        .map(|(_, s)| s.task.name.clone())
        .chain(externals.iter().map(|(_, s)| s.task.name.clone()))
        .collect();
    names.sort();
    assert_eq!(names, vec!["Archive logs", "Load sales", "Publish sales"]);

    let load = reloads
        .iter()
        .find(|(_, s)| s.task.name == "Load sales")
        .unwrap();
    assert_eq!(load.1.schema_events.len(), 1);
    assert_eq!(
        load.1.schema_events[0].expiration_date,
        NO_EXPIRATION_TIMESTAMP
    );
    assert_eq!(load.1.task.tags.len(), 2);
    assert_eq!(load.1.task.custom_properties.len(), 1);

    // The composite rule multiset survives, now pointing at the new GUID
    // of "Load sales".
    let new_load_guid = load.0;
    assert_eq!(composites.len(), 1);
    let rules = &composites[0].1.composite_rules;
    assert_eq!(rules.len(), 2);
    for rule in rules {
        assert_eq!(rule.reload_task.as_ref().unwrap().id, new_load_guid);
    }
    let mut states: Vec<i32> = rules.iter().map(|r| r.rule_state).collect();
    states.sort();
    assert_eq!(states, vec![1, 2]);
}
