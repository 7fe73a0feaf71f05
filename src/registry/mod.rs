//! Process registry.
//!
//! The registry is the shared directory of processes. Each registration
//! (descriptor plus locator) is stored in the cache backend under
//! `process_registry:{id}:{version}` and never expires, so any process that
//! shares the backend sees the same directory. Implementations live in a
//! local [`Catalog`] keyed by locator; a worker that did not register a
//! process itself makes it resolvable with [`ProcessRegistry::provide`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use procman::process::SyncProcess;
//! use procman::registry::ProcessRegistry;
//! use procman::types::{InputDescription, OutputDescription, ProcessDescriptor, Schema};
//! use serde_json::{json, Value};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> procman::Result<()> {
//! let registry = ProcessRegistry::in_memory();
//! let uppercase = SyncProcess::new(
//!     ProcessDescriptor::new("uppercase", "1.0.0", "Uppercase")
//!         .with_input("text", InputDescription::new(Schema::string()))
//!         .with_output("result", OutputDescription::new(Schema::string())),
//!     |inputs| {
//!         let text = inputs.get("text").and_then(Value::as_str).unwrap_or_default();
//!         Ok(json!({"result": text.to_uppercase()}))
//!     },
//! );
//!
//! registry.register("uppercase", Arc::new(uppercase)).await?;
//! assert_eq!(registry.list_ids().await?, vec!["uppercase"]);
//! assert!(registry.resolve("uppercase").await.is_ok());
//! # Ok(())
//! # }
//! ```

mod catalog;
mod version;

use std::any::type_name;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use procman_jobs::store::backend::{make_key, make_prefix, strip_namespace};
use procman_jobs::{CacheBackend, InMemoryBackend, StorageError, REGISTRY_NAMESPACE};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::process::Process;
use crate::types::ProcessDescriptor;

pub use catalog::Catalog;

/// A stored registration: the descriptor and the locator of the
/// implementation that serves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRegistration {
    /// The process description at registration time.
    pub descriptor: ProcessDescriptor,
    /// Catalog key of the implementation.
    pub locator: String,
}

/// What [`ProcessRegistry::register`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registered {
    /// No registration existed for the id and version.
    Created,
    /// A different registration was replaced.
    Replaced,
    /// An identical registration already existed.
    Unchanged,
}

/// Directory of registered processes.
pub struct ProcessRegistry {
    backend: Arc<dyn CacheBackend>,
    catalog: Catalog,
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl ProcessRegistry {
    /// A registry storing registrations in `backend`.
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            catalog: Catalog::new(),
        }
    }

    /// A registry over a fresh in-memory backend.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// The locator under which `P` serving `id`@`version` is catalogued.
    pub fn locator_for<P: ?Sized>(process_id: &str, version: &str) -> String {
        locator(type_name::<P>(), process_id, version)
    }

    /// Registers `process` under `process_id`.
    ///
    /// The registration is keyed by the description's version. Re-registering
    /// identical content is a no-op; different content replaces the stored
    /// registration.
    ///
    /// # Errors
    ///
    /// - [`Error::Registration`] if the implementation has no description,
    ///   or its id is empty or differs from `process_id`, or its version is
    ///   empty or contains `:`.
    /// - [`Error::CacheUnavailable`] if the store fails.
    pub async fn register<P>(&self, process_id: &str, process: Arc<P>) -> Result<Registered>
    where
        P: Process + 'static,
    {
        self.register_as(process_id, process, type_name::<P>()).await
    }

    /// Registers a type-erased implementation. `type_label` stands in for
    /// the implementation type in the locator.
    ///
    /// # Errors
    ///
    /// As for [`register`](Self::register).
    pub async fn register_as(
        &self,
        process_id: &str,
        process: Arc<dyn Process>,
        type_label: &str,
    ) -> Result<Registered> {
        let descriptor = process
            .description()
            .ok_or_else(|| registration_error(process_id, "implementation has no description"))?;
        check_descriptor(process_id, &descriptor)?;

        let locator = locator(type_label, &descriptor.id, &descriptor.version);
        let key = registration_key(&descriptor.id, &descriptor.version);
        let registration = ProcessRegistration {
            descriptor,
            locator: locator.clone(),
        };

        let outcome = match self.read_registration(&key).await? {
            Some(existing) if existing == registration => Registered::Unchanged,
            Some(_) => Registered::Replaced,
            None => Registered::Created,
        };

        if outcome != Registered::Unchanged {
            let data = serde_json::to_vec(&registration)?;
            self.backend
                .put(&key, &data, None)
                .await
                .map_err(|e| Error::from_storage(e, "process registration"))?;
        }
        self.catalog.insert(locator, process);

        let version = &registration.descriptor.version;
        match outcome {
            Registered::Replaced => {
                tracing::warn!(process_id, %version, "replaced existing process registration");
            },
            Registered::Created => tracing::info!(process_id, %version, "registered process"),
            Registered::Unchanged => {
                tracing::debug!(process_id, %version, "process registration unchanged");
            },
        }
        Ok(outcome)
    }

    /// Makes an implementation resolvable under `locator` without writing a
    /// registration.
    pub fn provide(&self, locator: impl Into<String>, process: Arc<dyn Process>) {
        let locator = locator.into();
        tracing::debug!(%locator, "providing process implementation");
        self.catalog.insert(locator, process);
    }

    /// Every registered process id, de-duplicated across versions, sorted.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let keys = self.registry_keys().await?;
        let ids: BTreeSet<String> = keys
            .iter()
            .filter_map(|key| strip_namespace(REGISTRY_NAMESPACE, key))
            .filter_map(|rest| rest.rsplit_once(':'))
            .map(|(id, _)| id.to_string())
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// Registered versions of `process_id`, lowest first.
    pub async fn versions(&self, process_id: &str) -> Result<Vec<String>> {
        let prefix = format!("{}:", make_key(REGISTRY_NAMESPACE, process_id));
        let keys = self
            .backend
            .keys(&prefix)
            .await
            .map_err(|e| Error::from_storage(e, "registry listing"))?;
        let mut versions: Vec<String> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|version| !version.is_empty() && !version.contains(':'))
            .map(str::to_string)
            .collect();
        versions.sort_by(|a, b| version::compare(a, b));
        Ok(versions)
    }

    /// Returns `true` if any version of `process_id` is registered.
    pub async fn has(&self, process_id: &str) -> Result<bool> {
        Ok(!self.versions(process_id).await?.is_empty())
    }

    /// Returns `true` if `process_id`@`version` is registered.
    pub async fn has_version(&self, process_id: &str, version: &str) -> Result<bool> {
        self.backend
            .exists(&registration_key(process_id, version))
            .await
            .map_err(|e| Error::from_storage(e, "registry lookup"))
    }

    /// The stored descriptor of the latest version, without resolving the
    /// implementation.
    ///
    /// # Errors
    ///
    /// [`Error::ProcessNotFound`] if nothing is registered under the id.
    pub async fn describe(&self, process_id: &str) -> Result<ProcessDescriptor> {
        let version = self.latest_version(process_id).await?;
        Ok(self.registration(process_id, &version).await?.descriptor)
    }

    /// The implementation of the latest version.
    ///
    /// # Errors
    ///
    /// - [`Error::ProcessNotFound`] if nothing is registered under the id.
    /// - [`Error::ProcessLoad`] if the locator is not in the local catalog.
    pub async fn resolve(&self, process_id: &str) -> Result<Arc<dyn Process>> {
        let version = self.latest_version(process_id).await?;
        self.resolve_version(process_id, &version).await
    }

    /// The implementation of a specific version.
    ///
    /// # Errors
    ///
    /// As for [`resolve`](Self::resolve).
    pub async fn resolve_version(
        &self,
        process_id: &str,
        version: &str,
    ) -> Result<Arc<dyn Process>> {
        let registration = self.registration(process_id, version).await?;
        self.catalog
            .get(&registration.locator)
            .ok_or_else(|| Error::ProcessLoad {
                process_id: process_id.to_string(),
                locator: registration.locator.clone(),
                reason: "no implementation is provided for this locator".to_string(),
            })
    }

    /// Loads the stored registration for `process_id`@`version`.
    ///
    /// # Errors
    ///
    /// [`Error::ProcessNotFound`] if it does not exist.
    pub async fn registration(&self, process_id: &str, version: &str) -> Result<ProcessRegistration> {
        self.read_registration(&registration_key(process_id, version))
            .await?
            .ok_or_else(|| Error::ProcessNotFound {
                process_id: process_id.to_string(),
            })
    }

    async fn latest_version(&self, process_id: &str) -> Result<String> {
        let versions = self.versions(process_id).await?;
        version::latest(versions.iter().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::ProcessNotFound {
                process_id: process_id.to_string(),
            })
    }

    async fn registry_keys(&self) -> Result<Vec<String>> {
        self.backend
            .keys(&make_prefix(REGISTRY_NAMESPACE))
            .await
            .map_err(|e| Error::from_storage(e, "registry listing"))
    }

    async fn read_registration(&self, key: &str) -> Result<Option<ProcessRegistration>> {
        match self.backend.get(key).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| Error::Internal(format!("corrupted registration {key}: {e}"))),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::from_storage(e, "registry lookup")),
        }
    }
}

fn locator(type_label: &str, process_id: &str, version: &str) -> String {
    format!("{type_label}@{process_id}:{version}")
}

fn registration_key(process_id: &str, version: &str) -> String {
    make_key(REGISTRY_NAMESPACE, &format!("{process_id}:{version}"))
}

fn registration_error(process_id: &str, reason: &str) -> Error {
    Error::Registration {
        process_id: process_id.to_string(),
        reason: reason.to_string(),
    }
}

fn check_descriptor(process_id: &str, descriptor: &ProcessDescriptor) -> Result<()> {
    if descriptor.id.is_empty() {
        return Err(registration_error(process_id, "description has an empty id"));
    }
    if descriptor.id != process_id {
        return Err(registration_error(
            process_id,
            &format!("description id '{}' does not match", descriptor.id),
        ));
    }
    if descriptor.version.is_empty() {
        return Err(registration_error(process_id, "description has an empty version"));
    }
    if descriptor.version.contains(':') {
        return Err(registration_error(process_id, "version must not contain ':'"));
    }
    Ok(())
}
