use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use sandscript_domain::{CapabilityFlagSet, LeasePolicy, ObjectId, ScriptExecutionContext, ScriptValue};
use thiserror::Error;
use tokio::runtime::Handle;

use super::handles::{HandleArena, ProxyHandle};
use super::{ApiDenial, SandboxError};
use crate::ports::region::RegionContext;
use crate::registry::panic_message;

/// Default bound on a single collaborator call.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(2);

/// Host function body.
pub type ApiHandler =
    Arc<dyn Fn(&ApiCall<'_>, &[ScriptValue]) -> Result<ScriptValue, ApiDenial> + Send + Sync>;

/// One script-callable host function.
#[derive(Clone)]
pub struct ApiFunction {
    pub name: &'static str,
    /// Capability that must be enabled for the function to do anything.
    pub capability: Option<&'static str>,
    /// Returned whenever the call is refused or cannot be answered.
    pub neutral: ScriptValue,
    pub handler: ApiHandler,
}

impl ApiFunction {
    pub fn new<F>(name: &'static str, neutral: ScriptValue, handler: F) -> Self
    where
        F: Fn(&ApiCall<'_>, &[ScriptValue]) -> Result<ScriptValue, ApiDenial>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            capability: None,
            neutral,
            handler: Arc::new(handler),
        }
    }

    pub fn gated_by(mut self, capability: &'static str) -> Self {
        self.capability = Some(capability);
        self
    }
}

impl std::fmt::Debug for ApiFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFunction")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("neutral", &self.neutral)
            .finish()
    }
}

/// A group of host functions contributed to the surface.
pub trait ApiModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn functions(&self) -> Vec<ApiFunction>;
}

/// Everything a handler may see about the call in progress.
pub struct ApiCall<'a> {
    pub context: &'a ScriptExecutionContext,
    pub region: &'a RegionContext,
    runtime: Option<&'a Handle>,
    service_timeout: Duration,
}

impl<'a> ApiCall<'a> {
    /// Wait for a collaborator future, bounded by the service timeout.
    ///
    /// Must be called from a blocking context (a script worker), never
    /// from inside an async task.
    pub fn await_service<F, T, E>(&self, fut: F) -> Result<T, ApiDenial>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let Some(runtime) = self.runtime else {
            return Err(ApiDenial::BackingServiceUnavailable(
                "no runtime attached".to_string(),
            ));
        };
        let timeout = self.service_timeout;
        match runtime.block_on(async move { tokio::time::timeout(timeout, fut).await }) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ApiDenial::BackingServiceUnavailable(e.to_string())),
            Err(_) => Err(ApiDenial::BackingServiceUnavailable(format!(
                "no answer within {} ms",
                timeout.as_millis()
            ))),
        }
    }
}

/// Surface construction failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxBuildError {
    #[error("host function '{name}' from module '{module}' is already defined by '{existing}'")]
    DuplicateFunction {
        name: &'static str,
        module: &'static str,
        existing: &'static str,
    },
}

/// Builder collecting modules into a [`SandboxApiSurface`].
pub struct SandboxApiBuilder {
    region: Arc<RegionContext>,
    capabilities: Arc<CapabilityFlagSet>,
    runtime: Option<Handle>,
    service_timeout: Duration,
    functions: HashMap<&'static str, (&'static str, ApiFunction)>,
    error: Option<SandboxBuildError>,
}

impl SandboxApiBuilder {
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }

    pub fn module(mut self, module: &dyn ApiModule) -> Self {
        if self.error.is_some() {
            return self;
        }
        for function in module.functions() {
            if let Some((existing, _)) = self.functions.get(function.name) {
                self.error = Some(SandboxBuildError::DuplicateFunction {
                    name: function.name,
                    module: module.name(),
                    existing: *existing,
                });
                return self;
            }
            self.functions
                .insert(function.name, (module.name(), function));
        }
        self
    }

    pub fn build(self) -> Result<SandboxApiSurface, SandboxBuildError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(SandboxApiSurface {
            functions: self
                .functions
                .into_iter()
                .map(|(name, (_, function))| (name, function))
                .collect(),
            handles: Mutex::new(HandleArena::new()),
            capabilities: self.capabilities,
            region: self.region,
            runtime: self.runtime,
            service_timeout: self.service_timeout,
        })
    }
}

/// The host function table plus the handles that may call into it.
pub struct SandboxApiSurface {
    functions: HashMap<&'static str, ApiFunction>,
    handles: Mutex<HandleArena>,
    capabilities: Arc<CapabilityFlagSet>,
    region: Arc<RegionContext>,
    runtime: Option<Handle>,
    service_timeout: Duration,
}

impl SandboxApiSurface {
    pub fn builder(
        region: Arc<RegionContext>,
        capabilities: Arc<CapabilityFlagSet>,
    ) -> SandboxApiBuilder {
        SandboxApiBuilder {
            region,
            capabilities,
            runtime: None,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            functions: HashMap::new(),
            error: None,
        }
    }

    fn arena(&self) -> MutexGuard<'_, HandleArena> {
        // Arena methods never panic midway, so a poisoned lock is consistent.
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capabilities(&self) -> &CapabilityFlagSet {
        &self.capabilities
    }

    /// Names of every host function, sorted.
    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn issue_handle(
        &self,
        context: Arc<ScriptExecutionContext>,
        policy: LeasePolicy,
        now: Instant,
    ) -> ProxyHandle {
        let handle = self.arena().issue(context, policy, now);
        tracing::trace!(%handle, mode = ?policy.mode(), "Issued proxy handle");
        handle
    }

    pub fn renew(&self, handle: ProxyHandle, now: Instant) -> Result<(), SandboxError> {
        self.arena().renew(handle, now)
    }

    pub fn dispose(&self, handle: ProxyHandle) -> bool {
        self.arena().dispose(handle)
    }

    pub fn dispose_owner(&self, script_id: ObjectId) -> usize {
        self.arena().dispose_owner(script_id)
    }

    pub fn dispose_all(&self) -> usize {
        self.arena().dispose_all()
    }

    /// Reclaim expired timed leases. Returns how many were reclaimed.
    pub fn sweep(&self, now: Instant) -> usize {
        let expired = self.arena().sweep(now);
        for handle in &expired {
            tracing::debug!(%handle, "Reclaimed proxy handle with expired lease");
        }
        expired.len()
    }

    pub fn live_handles(&self) -> usize {
        self.arena().len()
    }

    /// Call host function `name` on behalf of the script holding `handle`.
    pub fn invoke(
        &self,
        handle: ProxyHandle,
        name: &str,
        args: &[ScriptValue],
        now: Instant,
    ) -> Result<ScriptValue, SandboxError> {
        let context = self.arena().access(handle, now)?;
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| SandboxError::UnknownFunction(name.to_string()))?;

        if let Some(capability) = function.capability
            && !self.capabilities.is_enabled(capability)
        {
            self.log_denial(&context, function, &ApiDenial::CapabilityDisabled(capability));
            return Ok(function.neutral.clone());
        }

        let call = ApiCall {
            context: &context,
            region: &self.region,
            runtime: self.runtime.as_ref(),
            service_timeout: self.service_timeout,
        };

        match catch_unwind(AssertUnwindSafe(|| (function.handler)(&call, args))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(denial)) => {
                self.log_denial(&context, function, &denial);
                Ok(function.neutral.clone())
            }
            Err(payload) => {
                tracing::warn!(
                    script_id = %context.script_id,
                    function = function.name,
                    panic = %panic_message(payload.as_ref()),
                    "Host function panicked; returning neutral result"
                );
                Ok(function.neutral.clone())
            }
        }
    }

    fn log_denial(&self, context: &ScriptExecutionContext, function: &ApiFunction, denial: &ApiDenial) {
        tracing::debug!(
            script_id = %context.script_id,
            script = %context.script_name,
            function = function.name,
            reason = %denial,
            "Host function call denied"
        );
    }
}
