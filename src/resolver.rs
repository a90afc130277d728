//! Symbolic reference resolution against the server populations.
//!
//! Tag names, custom-property name/value pairs, app references (GUID or
//! `newapp-<n>`), stream references, and composite-rule task references are
//! turned into GUIDs here. Tags and custom properties must pre-exist on the
//! server; creating them is out of scope. Resolution is pure lookup, so
//! resolving the same reference twice in one run always yields the same
//! GUID.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::errors::ImportError;
use crate::model::{AppRef, TaskGraph};
use crate::parser::{CompositeRuleRecord, TaskImportRecord};
use crate::qrs::types::{
    CustomPropertyDefinitionCondensed, CustomPropertyValueCreate, IdRef, StreamCondensed,
    TagCondensed,
};
use crate::qrs::RepositoryCaches;

/// Resolves source references to server GUIDs
pub struct ReferenceResolver<'a> {
    caches: &'a RepositoryCaches,
    /// `App counter` -> GUID of the app uploaded earlier in this run
    uploaded_apps: HashMap<u32, Uuid>,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(caches: &'a RepositoryCaches) -> Self {
        Self {
            caches,
            uploaded_apps: HashMap::new(),
        }
    }

    /// Record the GUID produced by uploading the row with `App counter = n`
    pub fn register_uploaded_app(&mut self, counter: u32, app_id: Uuid) {
        self.uploaded_apps.insert(counter, app_id);
    }

    /// Resolve tag names, case-sensitively, against the cached population
    pub fn resolve_tags(
        &self,
        task: u32,
        names: &[String],
    ) -> Result<Vec<IdRef>, ImportError> {
        names
            .iter()
            .map(|name| {
                self.caches
                    .tags
                    .iter()
                    .find(|tag| &tag.name == name)
                    .map(|tag| IdRef { id: tag.id })
                    .ok_or_else(|| ImportError::UnknownTag {
                        task,
                        name: name.clone(),
                    })
            })
            .collect()
    }

    /// Tag references with names kept, for app metadata updates
    pub fn resolve_tags_condensed(
        &self,
        task: u32,
        names: &[String],
    ) -> Result<Vec<TagCondensed>, ImportError> {
        names
            .iter()
            .map(|name| {
                self.caches
                    .tags
                    .iter()
                    .find(|tag| &tag.name == name)
                    .cloned()
                    .ok_or_else(|| ImportError::UnknownTag {
                        task,
                        name: name.clone(),
                    })
            })
            .collect()
    }

    /// Resolve `name=value` pairs: the property must exist and the value
    /// must be one of its declared choices
    pub fn resolve_custom_properties(
        &self,
        task: u32,
        pairs: &[(String, String)],
    ) -> Result<Vec<CustomPropertyValueCreate>, ImportError> {
        pairs
            .iter()
            .map(|(name, value)| {
                let definition = self
                    .caches
                    .custom_properties
                    .iter()
                    .find(|def| &def.name == name)
                    .ok_or_else(|| ImportError::UnknownCustomProperty {
                        task,
                        name: name.clone(),
                    })?;
                if !definition.choice_values.iter().any(|choice| choice == value) {
                    return Err(ImportError::UnknownCustomPropertyValue {
                        task,
                        name: name.clone(),
                        value: value.clone(),
                    });
                }
                Ok(CustomPropertyValueCreate {
                    value: value.clone(),
                    definition: CustomPropertyDefinitionCondensed {
                        id: definition.id,
                        name: definition.name.clone(),
                    },
                })
            })
            .collect()
    }

    /// Resolve an `App id` cell: a GUID is used verbatim after an existence
    /// check; `newapp-<n>` resolves to the app uploaded under that counter
    /// earlier in this run.
    pub fn resolve_app_ref(&self, task: u32, raw: &str) -> Result<Uuid, ImportError> {
        match AppRef::parse(raw) {
            Some(AppRef::Guid(guid)) => {
                if self.caches.apps.iter().any(|app| app.id == guid) {
                    Ok(guid)
                } else {
                    Err(ImportError::UnknownApp {
                        task,
                        guid: raw.to_string(),
                    })
                }
            }
            Some(AppRef::NewApp(counter)) => self
                .uploaded_apps
                .get(&counter)
                .copied()
                .ok_or(ImportError::UnknownAppCounter { task, counter }),
            None => Err(ImportError::BadAppRef {
                task,
                value: raw.to_string(),
            }),
        }
    }

    /// Resolve a stream by GUID first, then by case-sensitive name. A miss
    /// is a warning that cancels publication for that app only.
    pub fn resolve_stream(&self, raw: &str) -> Option<&StreamCondensed> {
        let found = match Uuid::parse_str(raw) {
            Ok(guid) => self.caches.streams.iter().find(|s| s.id == guid),
            Err(_) => self.caches.streams.iter().find(|s| s.name == raw),
        };
        if found.is_none() {
            warn!("Stream '{}' not found; publish step skipped", raw);
        }
        found
    }

    /// Resolve a composite-rule task reference: the per-run `localToGuid`
    /// table first, then tasks the graph knows from QSEoW.
    pub fn resolve_rule_ref(
        &self,
        task: u32,
        event: u32,
        rule: &CompositeRuleRecord,
        local_to_guid: &HashMap<String, Uuid>,
        graph: &TaskGraph,
    ) -> Result<Uuid, ImportError> {
        if let Some(guid) = local_to_guid.get(&rule.task_ref) {
            return Ok(*guid);
        }
        if let Ok(guid) = Uuid::parse_str(&rule.task_ref) {
            if graph.task(guid).is_some() {
                return Ok(guid);
            }
        }
        Err(ImportError::UnresolvedRuleRef {
            task,
            event,
            rule: rule.counter,
            value: rule.task_ref.clone(),
        })
    }
}

/// Check, before Phase A, that every rule reference will be resolvable:
/// either a GUID the graph knows or the `Task id` of another row in the
/// same import.
pub fn validate_rule_refs(
    records: &[TaskImportRecord],
    graph: &TaskGraph,
) -> Vec<ImportError> {
    let local_ids: Vec<&str> = records
        .iter()
        .filter(|r| !r.source_id.is_empty())
        .map(|r| r.source_id.as_str())
        .collect();

    let mut errors = Vec::new();
    for record in records {
        for trigger in &record.composite_triggers {
            for rule in &trigger.rules {
                if local_ids.contains(&rule.task_ref.as_str()) {
                    continue;
                }
                let known = Uuid::parse_str(&rule.task_ref)
                    .ok()
                    .and_then(|guid| graph.task(guid))
                    .is_some();
                if !known {
                    errors.push(ImportError::UnresolvedRuleRef {
                        task: record.counter,
                        event: trigger.counter,
                        rule: rule.counter,
                        value: rule.task_ref.clone(),
                    });
                }
            }
        }
    }
    errors
}
