//! Shared test helpers: an in-memory Repository double and source-table
//! builders matching the import grammar.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use ctrlq::errors::RepositoryError;
use ctrlq::parser::columns::{AppColumn, LogicalColumn, TaskColumn};
use ctrlq::parser::source::SourceTable;
use ctrlq::qrs::types::{
    CompositeEventCreate, CustomPropertyValueCreate, ExternalProgramTaskCreate, ReloadTaskCreate,
    TagCondensed,
};
use ctrlq::qrs::Repository;

/// In-memory Repository double recording every write in call order
#[derive(Default)]
pub struct MockRepository {
    pub reload_creates: Mutex<Vec<(Uuid, ReloadTaskCreate)>>,
    pub external_creates: Mutex<Vec<(Uuid, ExternalProgramTaskCreate)>>,
    pub composite_creates: Mutex<Vec<(Uuid, CompositeEventCreate)>>,
    pub uploads: Mutex<Vec<(Uuid, PathBuf, String, bool)>>,
    pub published: Mutex<Vec<(Uuid, Uuid)>>,
    pub owners: Mutex<Vec<(Uuid, String, String)>>,
    pub call_order: Mutex<Vec<String>>,
}

impl MockRepository {
    fn log(&self, call: impl Into<String>) {
        self.call_order.lock().unwrap().push(call.into());
    }

    pub fn created_task_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .reload_creates
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| *id)
            .collect();
        ids.extend(
            self.external_creates
                .lock()
                .unwrap()
                .iter()
                .map(|(id, _)| *id),
        );
        ids
    }
}

#[async_trait]
impl Repository for MockRepository {
    async fn create_reload_task(&self, spec: &ReloadTaskCreate) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        self.log(format!("create_reload_task:{}", spec.task.name));
        self.reload_creates.lock().unwrap().push((id, spec.clone()));
        Ok(id)
    }

    async fn create_external_program_task(
        &self,
        spec: &ExternalProgramTaskCreate,
    ) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        self.log(format!("create_external_program_task:{}", spec.task.name));
        self.external_creates
            .lock()
            .unwrap()
            .push((id, spec.clone()));
        Ok(id)
    }

    async fn create_composite_event(
        &self,
        spec: &CompositeEventCreate,
    ) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        self.log(format!("create_composite_event:{}", spec.name));
        self.composite_creates
            .lock()
            .unwrap()
            .push((id, spec.clone()));
        Ok(id)
    }

    async fn upload_app(
        &self,
        qvf: &Path,
        name: &str,
        exclude_data_connections: bool,
    ) -> Result<Uuid, RepositoryError> {
        let id = Uuid::new_v4();
        self.log(format!("upload_app:{}", name));
        self.uploads.lock().unwrap().push((
            id,
            qvf.to_path_buf(),
            name.to_string(),
            exclude_data_connections,
        ));
        Ok(id)
    }

    async fn publish_app(&self, app_id: Uuid, stream_id: Uuid) -> Result<(), RepositoryError> {
        self.log("publish_app");
        self.published.lock().unwrap().push((app_id, stream_id));
        Ok(())
    }

    async fn set_app_owner(
        &self,
        app_id: Uuid,
        user_directory: &str,
        user_id: &str,
    ) -> Result<(), RepositoryError> {
        self.log("set_app_owner");
        self.owners.lock().unwrap().push((
            app_id,
            user_directory.to_string(),
            user_id.to_string(),
        ));
        Ok(())
    }

    async fn set_app_metadata(
        &self,
        _app_id: Uuid,
        _tags: &[TagCondensed],
        _custom_properties: &[CustomPropertyValueCreate],
    ) -> Result<(), RepositoryError> {
        self.log("set_app_metadata");
        Ok(())
    }
}

/// A row from string literals, padded to the task column count
pub fn srow(cells: &[&str]) -> Vec<String> {
    let mut row: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
    row.resize(TaskColumn::ALL.len(), String::new());
    row
}

/// Build a task source table with the full canonical header row
pub fn task_table(rows: Vec<Vec<String>>) -> SourceTable {
    let headers = TaskColumn::ALL
        .iter()
        .map(|c| c.header().to_string())
        .collect();
    let rows = rows
        .into_iter()
        .map(|mut cells| {
            cells.resize(TaskColumn::ALL.len(), String::new());
            cells
        })
        .collect();
    SourceTable { headers, rows }
}

/// Build an app source table with the full canonical header row
pub fn app_table(rows: Vec<Vec<String>>) -> SourceTable {
    let headers = AppColumn::ALL
        .iter()
        .map(|c| c.header().to_string())
        .collect();
    let rows = rows
        .into_iter()
        .map(|mut cells| {
            cells.resize(AppColumn::ALL.len(), String::new());
            cells
        })
        .collect();
    SourceTable { headers, rows }
}

/// A reload task row: counter, name, local id and app reference
pub fn reload_row(
    counter: &'static str,
    name: &'static str,
    task_id: &'static str,
    app_ref: &str,
) -> Vec<String> {
    let mut cells: Vec<String> = vec![
        counter.to_string(),
        "Reload".to_string(),
        name.to_string(),
        task_id.to_string(),
        "1".to_string(),
        "1440".to_string(),
        "0".to_string(),
        app_ref.to_string(),
    ];
    cells.resize(TaskColumn::ALL.len(), String::new());
    cells
}
