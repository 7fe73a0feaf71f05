//! Builder for [`ProcessManager`].

use std::any::type_name;
use std::sync::Arc;

use procman_jobs::{CacheBackend, InMemoryBackend, JobStore, ResultCache};

use super::ProcessManager;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::process::Process;
use crate::queue::{LocalTaskQueue, TaskQueue};
use crate::registry::ProcessRegistry;
use crate::worker::Worker;

/// Builder for a [`ProcessManager`].
///
/// Everything is optional. Without a backend, one is chosen from the
/// configuration: Redis when `redis_url` is set (feature `redis`), memory
/// otherwise. Without a queue, a [`LocalTaskQueue`] running a [`Worker`]
/// over the same registry and stores is used.
#[derive(Default)]
pub struct ProcessManagerBuilder {
    config: ServiceConfig,
    backend: Option<Arc<dyn CacheBackend>>,
    registry: Option<Arc<ProcessRegistry>>,
    queue: Option<Arc<dyn TaskQueue>>,
    processes: Vec<(String, Arc<dyn Process>, &'static str)>,
}

impl std::fmt::Debug for ProcessManagerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.processes.iter().map(|(id, _, _)| id.as_str()).collect();
        f.debug_struct("ProcessManagerBuilder")
            .field("config", &self.config)
            .field("processes", &ids)
            .finish_non_exhaustive()
    }
}

impl ProcessManagerBuilder {
    /// A builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `backend` for jobs, results and registrations.
    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Uses an existing registry instead of one over the backend.
    pub fn registry(mut self, registry: Arc<ProcessRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Uses `queue` for asynchronous execution.
    pub fn queue(mut self, queue: Arc<dyn TaskQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Registers a process when the manager is built.
    pub fn process<P>(mut self, process_id: impl Into<String>, process: P) -> Self
    where
        P: Process + 'static,
    {
        let process: Arc<dyn Process> = Arc::new(process);
        self.processes
            .push((process_id.into(), process, type_name::<P>()));
        self
    }

    /// Builds the manager and registers the collected processes.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the configuration is invalid, or names a Redis
    ///   URL without the `redis` feature.
    /// - [`Error::Registration`] if a collected process cannot be registered.
    /// - [`Error::CacheUnavailable`] if the backend cannot be reached.
    pub async fn build(self) -> Result<ProcessManager> {
        self.config.validate()?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => connect_backend(&self.config).await?,
        };
        let store_config = self.config.store_config();
        let jobs = JobStore::new(Arc::clone(&backend)).with_config(store_config.clone());
        let results = ResultCache::new(Arc::clone(&backend)).with_config(store_config);
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ProcessRegistry::new(Arc::clone(&backend))));

        for (process_id, process, type_label) in self.processes {
            registry.register_as(&process_id, process, type_label).await?;
        }

        let worker = Worker::new(Arc::clone(&registry), results.clone(), jobs.clone());
        let queue = self.queue.unwrap_or_else(|| {
            Arc::new(
                LocalTaskQueue::new(Arc::new(worker.clone()), self.config.queue_concurrency)
                    .with_retention(self.config.retention()),
            )
        });

        tracing::debug!(
            retention_secs = self.config.retention_secs,
            base_path = %self.config.base_path,
            "process manager ready"
        );
        Ok(ProcessManager {
            config: self.config,
            registry,
            jobs,
            results,
            queue,
            worker,
        })
    }
}

#[cfg(feature = "redis")]
async fn connect_backend(config: &ServiceConfig) -> Result<Arc<dyn CacheBackend>> {
    use procman_jobs::store::redis::RedisBackend;

    let Some(url) = config.redis_url.as_deref() else {
        return Ok(Arc::new(InMemoryBackend::new()));
    };
    let mut backend = RedisBackend::new(url)
        .await
        .map_err(|e| Error::from_storage(e, "redis connection"))?;
    if let Some(prefix) = &config.key_prefix {
        backend = backend.with_prefix(prefix.clone());
    }
    tracing::info!("using redis cache backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "redis"))]
async fn connect_backend(config: &ServiceConfig) -> Result<Arc<dyn CacheBackend>> {
    if config.redis_url.is_some() {
        return Err(Error::Config(
            "redis_url is set but procman was built without the `redis` feature".to_string(),
        ));
    }
    Ok(Arc::new(InMemoryBackend::new()))
}
