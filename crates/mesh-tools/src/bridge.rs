//! Tool bridge - TIP execution with concurrency, timeout and retry
//!
//! Every public operation settles into a result object. Timeouts, retry
//! exhaustion, missing tools and budget rejections all surface as
//! `success = false` results; nothing here aborts the caller.

use crate::catalog::{ResourceCache, ToolCatalogCache};
use mesh_core::{
    Error, ExecutionContext, Notification, NotificationBus, ResourceAccessResult,
    ResourceDescriptor, Result, TipClient, ToolConfig, ToolDefinition, ToolExecutionResult,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Tool and resource bridge over TIP
pub struct ToolBridge {
    tip: Arc<dyn TipClient>,
    config: ToolConfig,
    catalog: Arc<ToolCatalogCache>,
    resources: ResourceCache,
    resource_listing: RwLock<Option<(Vec<ResourceDescriptor>, Instant)>>,
    semaphore: Arc<Semaphore>,
    bus: NotificationBus,
    initialized: AtomicBool,
}

impl ToolBridge {
    pub fn new(tip: Arc<dyn TipClient>, config: ToolConfig, bus: NotificationBus) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        let catalog = Arc::new(ToolCatalogCache::new(
            config.cache_capacity,
            config.catalog_ttl(),
        ));
        let resources = ResourceCache::new(config.cache_capacity, config.resource_ttl());

        Self {
            tip,
            config,
            catalog,
            resources,
            resource_listing: RwLock::new(None),
            semaphore,
            bus,
            initialized: AtomicBool::new(false),
        }
    }

    /// Prime the tool catalog and mark the bridge ready.
    ///
    /// An unreachable TIP is not fatal; the catalog fills lazily on the
    /// first successful listing.
    pub async fn initialize(&self) {
        match self.tip.list_tools().await {
            Ok(tools) => {
                let count = tools.len();
                if self.config.cache_enabled {
                    self.catalog.insert_batch(tools).await;
                }
                info!("Tool bridge initialized ({} tools)", count);
            }
            Err(e) => {
                warn!("Tool catalog priming failed: {}", e);
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
    }

    /// Tear down bridge state after a failed coordinator initialization
    pub async fn teardown(&self) {
        self.catalog.clear().await;
        self.resources.clear().await;
        *self.resource_listing.write().await = None;
        self.initialized.store(false, Ordering::SeqCst);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Execute a tool call under the concurrency ceiling.
    ///
    /// `execution_time_ms` on the returned result spans submission to
    /// settlement, including any interaction with the limiter.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: Value,
        ctx: &ExecutionContext,
    ) -> ToolExecutionResult {
        let start = Instant::now();

        // Ceiling reached means rejection, not queueing; a rejected call
        // does not consume a retry slot.
        let _permit = match self.semaphore.try_acquire() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Tool '{}' rejected: concurrency budget exceeded ({} in flight)",
                    tool_name, self.config.max_concurrent
                );
                return self.settle_failure(
                    tool_name,
                    format!(
                        "concurrency budget exceeded: {} calls already in flight",
                        self.config.max_concurrent
                    ),
                    start,
                );
            }
        };

        if self.resolve_definition(tool_name).await.is_none() {
            return self.settle_failure(
                tool_name,
                format!("unknown tool '{}'", tool_name),
                start,
            );
        }

        debug!(
            "Executing tool '{}' with timeout {}ms (session {})",
            tool_name, self.config.tool_timeout_ms, ctx.session_id
        );

        let outcome = timeout(
            self.config.tool_timeout(),
            self.call_with_retry(tool_name, &parameters, ctx),
        )
        .await;

        match outcome {
            Ok(Ok(value)) => {
                let result = ToolExecutionResult::success(tool_name, value, elapsed_ms(start));
                self.bus.emit(Notification::ToolExecuted {
                    tool_name: tool_name.to_string(),
                    execution_time_ms: result.metadata.execution_time_ms,
                });
                result
            }
            Ok(Err(e)) => self.settle_failure(tool_name, e.to_string(), start),
            Err(_) => {
                warn!(
                    "Tool '{}' timed out after {}ms",
                    tool_name, self.config.tool_timeout_ms
                );
                self.settle_failure(
                    tool_name,
                    format!("timeout after {}ms", self.config.tool_timeout_ms),
                    start,
                )
            }
        }
    }

    /// Execute multiple tool calls concurrently
    pub async fn execute_batch(
        &self,
        requests: Vec<(String, Value)>,
        ctx: &ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        let futures: Vec<_> = requests
            .into_iter()
            .map(|(name, params)| async move { self.execute_tool(&name, params, ctx).await })
            .collect();

        futures::future::join_all(futures).await
    }

    /// Read a resource, cache-first.
    ///
    /// A cache hit reports `access_time_ms` measured against the lookup,
    /// not the original fetch.
    pub async fn access_resource(&self, uri: &str, ctx: &ExecutionContext) -> ResourceAccessResult {
        let start = Instant::now();

        if self.config.cache_enabled {
            if let Some(content) = self.resources.get(uri).await {
                debug!("Resource cache hit: {} (session {})", uri, ctx.session_id);
                self.bus.emit(Notification::ResourceAccessed {
                    uri: uri.to_string(),
                    from_cache: true,
                });
                return ResourceAccessResult::hit(uri, content, elapsed_ms(start));
            }
        }

        let outcome = timeout(self.config.resource_timeout(), self.read_with_retry(uri)).await;

        match outcome {
            Ok(Ok(content)) => {
                if self.config.cache_enabled {
                    self.resources.insert(uri, content.clone()).await;
                }
                self.bus.emit(Notification::ResourceAccessed {
                    uri: uri.to_string(),
                    from_cache: false,
                });
                ResourceAccessResult::fetched(uri, content, elapsed_ms(start))
            }
            Ok(Err(e)) => {
                let error = format!("resource read failed: {}", e);
                self.bus.emit(Notification::ResourceFailed {
                    uri: uri.to_string(),
                    error: error.clone(),
                });
                ResourceAccessResult::failure(uri, error, elapsed_ms(start))
            }
            Err(_) => {
                let error = format!("timeout after {}ms", self.config.resource_timeout_ms);
                warn!("Resource '{}' {}", uri, error);
                self.bus.emit(Notification::ResourceFailed {
                    uri: uri.to_string(),
                    error: error.clone(),
                });
                ResourceAccessResult::failure(uri, error, elapsed_ms(start))
            }
        }
    }

    /// Current TIP tool catalog, cache-first when enabled and populated.
    ///
    /// Planning-time read for the graph engine; never executes a tool.
    pub async fn available_tools(&self) -> Result<Vec<ToolDefinition>> {
        if self.config.cache_enabled {
            let cached = self.catalog.list_all().await;
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let tools = self.tip.list_tools().await?;
        if self.config.cache_enabled {
            self.catalog.insert_batch(tools.clone()).await;
        }
        Ok(tools)
    }

    /// Current TIP resource listing, cache-first when enabled and fresh
    pub async fn available_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        if self.config.cache_enabled {
            let listing = self.resource_listing.read().await;
            if let Some((descriptors, fetched_at)) = listing.as_ref() {
                if fetched_at.elapsed() <= self.config.catalog_ttl() {
                    return Ok(descriptors.clone());
                }
            }
        }

        let descriptors = self.tip.list_resources().await?;
        if self.config.cache_enabled {
            *self.resource_listing.write().await =
                Some((descriptors.clone(), Instant::now()));
        }
        Ok(descriptors)
    }

    /// Calls currently holding a concurrency permit
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent - self.semaphore.available_permits()
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Shared catalog handle, for maintenance tasks
    pub fn catalog(&self) -> &Arc<ToolCatalogCache> {
        &self.catalog
    }

    fn settle_failure(
        &self,
        tool_name: &str,
        error: String,
        start: Instant,
    ) -> ToolExecutionResult {
        self.bus.emit(Notification::ToolFailed {
            tool_name: tool_name.to_string(),
            error: error.clone(),
        });
        ToolExecutionResult::failure(tool_name, error, elapsed_ms(start))
    }

    /// Resolve a tool definition from cache or a fresh TIP listing
    async fn resolve_definition(&self, name: &str) -> Option<ToolDefinition> {
        if self.config.cache_enabled {
            if let Some(definition) = self.catalog.get(name).await {
                return Some(definition);
            }
        }

        match self.tip.list_tools().await {
            Ok(tools) => {
                let found = tools.iter().find(|t| t.name == name).cloned();
                if self.config.cache_enabled {
                    self.catalog.insert_batch(tools).await;
                }
                found
            }
            Err(e) => {
                warn!("Tool listing failed while resolving '{}': {}", name, e);
                None
            }
        }
    }

    async fn call_with_retry(
        &self,
        name: &str,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value> {
        let attempts = u64::from(self.config.retry_attempts) + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.tip.call_tool(name, params.clone(), ctx).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("Tool '{}' attempt {}/{} failed: {}", name, attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        // Linear backoff: attempt N waits N * unit.
                        tokio::time::sleep(Duration::from_millis(
                            self.config.retry_backoff_ms * attempt,
                        ))
                        .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::tool_execution("tool call never attempted")))
    }

    async fn read_with_retry(&self, uri: &str) -> Result<Value> {
        let attempts = u64::from(self.config.retry_attempts) + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.tip.read_resource(uri).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!("Resource '{}' attempt {}/{} failed: {}", uri, attempt, attempts, e);
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(
                            self.config.retry_backoff_ms * attempt,
                        ))
                        .await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::resource_access("resource never read")))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
