//! Typed client for the QSEoW Repository (QRS) REST API.
//!
//! One method per endpoint the tool touches. Listings are fetched in full
//! and joined client-side; the tag, custom-property, stream, and app
//! populations are cached once per run and treated as immutable afterwards.
//! Creation endpoints are non-idempotent; de-duplication is the caller's
//! responsibility.

pub mod types;

use std::path::Path;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::RepositoryError;
use crate::model::TaskKind;
use crate::session::{Idempotency, RequestBody, RestClient};
use types::{
    AppCondensed, CompositeEvent, CompositeEventCreate, CustomPropertyDefinition,
    CustomPropertyValueCreate, ExternalProgramTask, ExternalProgramTaskCreate, ReloadTask,
    ReloadTaskCreate, SchemaEvent, StreamCondensed, TagCondensed, UserCondensed,
};

/// Content type of a QVF upload body
const QVF_CONTENT_TYPE: &str = "application/vnd.qlik.sense.app";

/// Read-mostly populations warmed once per run
#[derive(Debug, Clone, Default)]
pub struct RepositoryCaches {
    pub tags: Vec<TagCondensed>,
    pub custom_properties: Vec<CustomPropertyDefinition>,
    pub streams: Vec<StreamCondensed>,
    pub apps: Vec<AppCondensed>,
}

/// Typed wrapper over the Repository endpoints used by the core
pub struct QrsClient {
    rest: RestClient,
}

impl QrsClient {
    pub fn new(rest: RestClient) -> Self {
        Self { rest }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RepositoryError> {
        let resp = self
            .rest
            .request(Method::GET, path, query, RequestBody::None, Idempotency::Idempotent)
            .await?;
        if !resp.is_success() {
            return Err(http_error(resp.status, path, &resp.body));
        }
        serde_json::from_slice(&resp.body).map_err(|source| RepositoryError::Decode {
            path: path.to_string(),
            source,
        })
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: &B,
        idempotency: Idempotency,
    ) -> Result<T, RepositoryError> {
        let payload = serde_json::to_value(body).map_err(|source| RepositoryError::Decode {
            path: path.to_string(),
            source,
        })?;
        let resp = self
            .rest
            .request(method, path, query, RequestBody::Json(payload), idempotency)
            .await?;
        if !resp.is_success() {
            return Err(http_error(resp.status, path, &resp.body));
        }
        serde_json::from_slice(&resp.body).map_err(|source| RepositoryError::Decode {
            path: path.to_string(),
            source,
        })
    }

    /// Full tag population
    pub async fn list_tags(&self) -> Result<Vec<TagCondensed>, RepositoryError> {
        self.get_json("/qrs/tag/full", &[]).await
    }

    /// Full custom property definition population
    pub async fn list_custom_properties(
        &self,
    ) -> Result<Vec<CustomPropertyDefinition>, RepositoryError> {
        self.get_json("/qrs/custompropertydefinition/full", &[]).await
    }

    /// Full stream population
    pub async fn list_streams(&self) -> Result<Vec<StreamCondensed>, RepositoryError> {
        self.get_json("/qrs/stream/full", &[]).await
    }

    /// Full app population, with tags
    pub async fn list_apps(&self) -> Result<Vec<AppCondensed>, RepositoryError> {
        self.get_json("/qrs/app/full", &[]).await
    }

    /// Reload tasks, optionally restricted with a QRS filter clause
    pub async fn list_reload_tasks(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<ReloadTask>, RepositoryError> {
        let query = filter_query(filter);
        self.get_json("/qrs/reloadtask/full", &query).await
    }

    /// External program tasks, optionally restricted with a QRS filter clause
    pub async fn list_external_program_tasks(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<ExternalProgramTask>, RepositoryError> {
        let query = filter_query(filter);
        self.get_json("/qrs/externalprogramtask/full", &query).await
    }

    /// Full schema event population; joined to owning tasks client-side
    pub async fn list_schema_events(&self) -> Result<Vec<SchemaEvent>, RepositoryError> {
        self.get_json("/qrs/schemaevent/full", &[]).await
    }

    /// Full composite event population; joined to owning tasks client-side
    pub async fn list_composite_events(&self) -> Result<Vec<CompositeEvent>, RepositoryError> {
        self.get_json("/qrs/compositeevent/full", &[]).await
    }

    /// Look up a user by directory and id
    pub async fn find_user(
        &self,
        directory: &str,
        user_id: &str,
    ) -> Result<Option<UserCondensed>, RepositoryError> {
        let filter = format!(
            "userDirectory eq '{}' and userId eq '{}'",
            directory, user_id
        );
        let users: Vec<UserCondensed> = self
            .get_json("/qrs/user/full", &[("filter", filter)])
            .await?;
        Ok(users.into_iter().next())
    }

    /// Warm the per-run caches in one sweep
    pub async fn warm_caches(&self) -> Result<RepositoryCaches, RepositoryError> {
        info!("Fetching tags, custom properties, streams and apps");
        Ok(RepositoryCaches {
            tags: self.list_tags().await?,
            custom_properties: self.list_custom_properties().await?,
            streams: self.list_streams().await?,
            apps: self.list_apps().await?,
        })
    }

    /// Raw task object for read-modify-write updates
    pub async fn get_task_raw(
        &self,
        kind: TaskKind,
        id: Uuid,
    ) -> Result<Value, RepositoryError> {
        let path = format!("{}/{}", task_endpoint(kind), id);
        self.get_json(&path, &[]).await
    }

    /// Write back a task object previously fetched with [`get_task_raw`]
    pub async fn put_task_raw(
        &self,
        kind: TaskKind,
        id: Uuid,
        task: &Value,
    ) -> Result<(), RepositoryError> {
        let path = format!("{}/{}", task_endpoint(kind), id);
        let _: Value = self
            .send_json(Method::PUT, &path, &[], task, Idempotency::Idempotent)
            .await?;
        Ok(())
    }
}

fn task_endpoint(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Reload => "/qrs/reloadtask",
        TaskKind::ExternalProgram => "/qrs/externalprogramtask",
    }
}

fn filter_query(filter: Option<&str>) -> Vec<(&'static str, String)> {
    filter
        .map(|f| vec![("filter", f.to_string())])
        .unwrap_or_default()
}

fn http_error(status: u16, path: &str, body: &[u8]) -> RepositoryError {
    let mut text = String::from_utf8_lossy(body).to_string();
    if text.len() > 512 {
        text.truncate(512);
    }
    RepositoryError::Http {
        status,
        path: path.to_string(),
        body: text,
    }
}

/// Creation and mutation seam of the Repository. The importer runs against
/// this trait so a dry run (or a test double) can stand in for the live
/// client without touching the phase logic.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Create a reload task with its schedule events attached atomically;
    /// returns the new task GUID.
    async fn create_reload_task(&self, spec: &ReloadTaskCreate) -> Result<Uuid, RepositoryError>;

    /// Create an external program task with its schedule events attached
    /// atomically; returns the new task GUID.
    async fn create_external_program_task(
        &self,
        spec: &ExternalProgramTaskCreate,
    ) -> Result<Uuid, RepositoryError>;

    /// Create a composite event; its tasks must already exist
    async fn create_composite_event(
        &self,
        spec: &CompositeEventCreate,
    ) -> Result<Uuid, RepositoryError>;

    /// Upload a QVF and return the new app GUID
    async fn upload_app(
        &self,
        qvf: &Path,
        name: &str,
        exclude_data_connections: bool,
    ) -> Result<Uuid, RepositoryError>;

    /// Publish an app to a stream
    async fn publish_app(&self, app_id: Uuid, stream_id: Uuid) -> Result<(), RepositoryError>;

    /// Change an app's owner
    async fn set_app_owner(
        &self,
        app_id: Uuid,
        user_directory: &str,
        user_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Replace an app's tags and custom properties
    async fn set_app_metadata(
        &self,
        app_id: Uuid,
        tags: &[TagCondensed],
        custom_properties: &[CustomPropertyValueCreate],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
impl Repository for QrsClient {
    async fn create_reload_task(&self, spec: &ReloadTaskCreate) -> Result<Uuid, RepositoryError> {
        let created: ReloadTask = self
            .send_json(
                Method::POST,
                "/qrs/reloadtask/create",
                &[],
                spec,
                Idempotency::NonIdempotent,
            )
            .await?;
        Ok(created.id)
    }

    async fn create_external_program_task(
        &self,
        spec: &ExternalProgramTaskCreate,
    ) -> Result<Uuid, RepositoryError> {
        let created: ExternalProgramTask = self
            .send_json(
                Method::POST,
                "/qrs/externalprogramtask/create",
                &[],
                spec,
                Idempotency::NonIdempotent,
            )
            .await?;
        Ok(created.id)
    }

    async fn create_composite_event(
        &self,
        spec: &CompositeEventCreate,
    ) -> Result<Uuid, RepositoryError> {
        let created: CompositeEvent = self
            .send_json(
                Method::POST,
                "/qrs/compositeevent",
                &[],
                spec,
                Idempotency::NonIdempotent,
            )
            .await?;
        Ok(created.id)
    }

    async fn upload_app(
        &self,
        qvf: &Path,
        name: &str,
        exclude_data_connections: bool,
    ) -> Result<Uuid, RepositoryError> {
        // The upload endpoint throttles; the body must be replayable for
        // the transport's 429 backoff.
        let data = tokio::fs::read(qvf)
            .await
            .map_err(|e| RepositoryError::QvfUnreadable {
                path: qvf.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!("Uploading {} ({} bytes)", qvf.display(), data.len());

        let query = [
            ("name", name.to_string()),
            ("keepdata", "false".to_string()),
            ("excludeconnections", exclude_data_connections.to_string()),
        ];
        let resp = self
            .rest
            .request(
                Method::POST,
                "/qrs/app/upload",
                &query,
                RequestBody::Binary {
                    content_type: QVF_CONTENT_TYPE,
                    data,
                },
                Idempotency::Idempotent,
            )
            .await?;
        if !resp.is_success() {
            return Err(http_error(resp.status, "/qrs/app/upload", &resp.body));
        }
        let app: AppCondensed =
            serde_json::from_slice(&resp.body).map_err(|source| RepositoryError::Decode {
                path: "/qrs/app/upload".to_string(),
                source,
            })?;
        Ok(app.id)
    }

    async fn publish_app(&self, app_id: Uuid, stream_id: Uuid) -> Result<(), RepositoryError> {
        let path = format!("/qrs/app/{}/publish", app_id);
        let query = [("stream", stream_id.to_string())];
        let resp = self
            .rest
            .request(
                Method::PUT,
                &path,
                &query,
                RequestBody::None,
                Idempotency::Idempotent,
            )
            .await?;
        if !resp.is_success() {
            return Err(http_error(resp.status, &path, &resp.body));
        }
        Ok(())
    }

    async fn set_app_owner(
        &self,
        app_id: Uuid,
        user_directory: &str,
        user_id: &str,
    ) -> Result<(), RepositoryError> {
        let user = self
            .find_user(user_directory, user_id)
            .await?
            .ok_or(RepositoryError::NotFound {
                entity: "user",
                name: format!("{}\\{}", user_directory, user_id),
            })?;

        let path = format!("/qrs/app/{}", app_id);
        let mut app: Value = self.get_json(&path, &[]).await?;
        app["owner"] = serde_json::json!({ "id": user.id });
        let _: Value = self
            .send_json(Method::PUT, &path, &[], &app, Idempotency::Idempotent)
            .await?;
        Ok(())
    }

    async fn set_app_metadata(
        &self,
        app_id: Uuid,
        tags: &[TagCondensed],
        custom_properties: &[CustomPropertyValueCreate],
    ) -> Result<(), RepositoryError> {
        if tags.is_empty() && custom_properties.is_empty() {
            return Ok(());
        }
        let path = format!("/qrs/app/{}", app_id);
        let mut app: Value = self.get_json(&path, &[]).await?;
        if !tags.is_empty() {
            app["tags"] = serde_json::to_value(tags).unwrap_or(Value::Null);
        }
        if !custom_properties.is_empty() {
            app["customProperties"] =
                serde_json::to_value(custom_properties).unwrap_or(Value::Null);
        }
        let _: Value = self
            .send_json(Method::PUT, &path, &[], &app, Idempotency::Idempotent)
            .await?;
        Ok(())
    }
}

/// Stand-in repository for `--dry-run`: performs every resolution step but
/// creates nothing, logging the payload each call would have posted.
#[derive(Debug, Default)]
pub struct DryRunRepository;

impl DryRunRepository {
    fn log_payload<T: Serialize>(&self, what: &str, payload: &T) {
        match serde_json::to_string_pretty(payload) {
            Ok(text) => info!("Dry run: would POST {}:\n{}", what, text),
            Err(_) => info!("Dry run: would POST {}", what),
        }
    }
}

#[async_trait]
impl Repository for DryRunRepository {
    async fn create_reload_task(&self, spec: &ReloadTaskCreate) -> Result<Uuid, RepositoryError> {
        self.log_payload("reload task", spec);
        Ok(Uuid::new_v4())
    }

    async fn create_external_program_task(
        &self,
        spec: &ExternalProgramTaskCreate,
    ) -> Result<Uuid, RepositoryError> {
        self.log_payload("external program task", spec);
        Ok(Uuid::new_v4())
    }

    async fn create_composite_event(
        &self,
        spec: &CompositeEventCreate,
    ) -> Result<Uuid, RepositoryError> {
        self.log_payload("composite event", spec);
        Ok(Uuid::new_v4())
    }

    async fn upload_app(
        &self,
        qvf: &Path,
        name: &str,
        _exclude_data_connections: bool,
    ) -> Result<Uuid, RepositoryError> {
        info!("Dry run: would upload {} as '{}'", qvf.display(), name);
        Ok(Uuid::new_v4())
    }

    async fn publish_app(&self, app_id: Uuid, stream_id: Uuid) -> Result<(), RepositoryError> {
        info!("Dry run: would publish app {} to stream {}", app_id, stream_id);
        Ok(())
    }

    async fn set_app_owner(
        &self,
        app_id: Uuid,
        user_directory: &str,
        user_id: &str,
    ) -> Result<(), RepositoryError> {
        info!(
            "Dry run: would set owner of app {} to {}\\{}",
            app_id, user_directory, user_id
        );
        Ok(())
    }

    async fn set_app_metadata(
        &self,
        app_id: Uuid,
        tags: &[TagCondensed],
        custom_properties: &[CustomPropertyValueCreate],
    ) -> Result<(), RepositoryError> {
        info!(
            "Dry run: would set {} tag(s) and {} custom propert(y/ies) on app {}",
            tags.len(),
            custom_properties.len(),
            app_id
        );
        Ok(())
    }
}
