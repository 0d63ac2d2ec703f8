// Adapter between the host deploy pipeline's packaging lifecycle and
// the optimization pipeline. The host implements `DeployPipeline`;
// this crate implements `PackagingHook` and registers itself, so no
// inheritance relationship exists in either direction.

use crate::core::capability::CapabilityRegistry;
use crate::core::interfaces::FileSystemService;
use crate::core::models::{
    EnvFilePolicy, FunctionDescriptor, PackagedEntry, ScopeConfig, SkipContext, SkipReason,
};
use crate::core::services::{OptimizeOutcome, OptimizeService};
use crate::utils::{Logger, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Action identifier of the per-function packaging step this
/// optimizer attaches to
pub const PACKAGE_FUNCTION_ACTION: &str = "codeDeployFunction";

/// Oldest host pipeline version this optimizer is known to work with
pub const SUPPORTED_VERSION_FLOOR: &str = "0.5";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Pre,
    Post,
}

/// Per-function packaging event owned by the host pipeline
#[derive(Debug, Clone)]
pub struct PackagingEvent {
    pub function: FunctionDescriptor,
    pub stage: String,
    pub region: String,
    /// Staging directory holding the function's compiled output
    pub dist_dir: PathBuf,
    /// Final archive entries; filled by the optimizer on success
    pub entries: Vec<PackagedEntry>,
    /// Staging path of the optimized audit copies; set by the
    /// optimizer on success so later hooks can point at it
    pub optimized_dir: Option<PathBuf>,
}

/// Handler attached to a packaging lifecycle action
#[async_trait]
pub trait PackagingHook: Send + Sync {
    async fn on_package(&self, event: PackagingEvent) -> Result<PackagingEvent>;
}

/// The narrow surface this crate needs from the host deploy pipeline
pub trait DeployPipeline {
    fn version(&self) -> &str;
    fn add_hook(&mut self, action: &str, phase: HookPhase, hook: Arc<dyn PackagingHook>);
}

/// Registers the composed pipeline against the host's packaging
/// lifecycle and adapts events into and out of it.
pub struct HookAdapter {
    service: OptimizeService,
    project_scope: Option<ScopeConfig>,
    component_scope: Option<ScopeConfig>,
}

impl HookAdapter {
    pub fn new(
        fs: Arc<dyn FileSystemService>,
        registry: Arc<CapabilityRegistry>,
        env_file: EnvFilePolicy,
    ) -> Self {
        Self {
            service: OptimizeService::new(fs, registry, env_file),
            project_scope: None,
            component_scope: None,
        }
    }

    /// Project-wide optimization fragment (broadest declared scope)
    pub fn with_project_scope(mut self, scope: ScopeConfig) -> Self {
        self.project_scope = Some(scope);
        self
    }

    /// Component-level optimization fragment (between project and
    /// function)
    pub fn with_component_scope(mut self, scope: ScopeConfig) -> Self {
        self.component_scope = Some(scope);
        self
    }

    /// Attach to the packaging action at the pre phase, where the set
    /// of files to archive is still ours to decide. Warns (and
    /// continues) when the host is older than the supported floor.
    pub fn register(self: Arc<Self>, pipeline: &mut dyn DeployPipeline) {
        if version_below_floor(pipeline.version()) {
            Logger::version_warning(pipeline.version(), SUPPORTED_VERSION_FLOOR);
        }
        pipeline.add_hook(PACKAGE_FUNCTION_ACTION, HookPhase::Pre, self);
    }

    fn broader_scopes(&self) -> Vec<ScopeConfig> {
        let mut scopes = Vec::new();
        if let Some(ref project) = self.project_scope {
            scopes.push(project.clone());
        }
        if let Some(ref component) = self.component_scope {
            scopes.push(component.clone());
        }
        scopes
    }
}

#[async_trait]
impl PackagingHook for HookAdapter {
    async fn on_package(&self, mut event: PackagingEvent) -> Result<PackagingEvent> {
        if !event.function.runtime.contains("nodejs") {
            Logger::skipping(
                &event.function.name,
                &SkipReason::UnsupportedRuntime(event.function.runtime.clone()).to_string(),
            );
            return Ok(event);
        }

        let context = SkipContext {
            stage: event.stage.clone(),
            region: event.region.clone(),
        };

        let outcome = self
            .service
            .optimize(
                &event.function,
                &event.dist_dir,
                &self.broader_scopes(),
                &context,
            )
            .await?;

        match outcome {
            OptimizeOutcome::Skipped(_) => Ok(event),
            OptimizeOutcome::Optimized {
                entries,
                optimized_dir,
            } => {
                event.entries = entries;
                event.optimized_dir = Some(optimized_dir);
                Ok(event)
            }
        }
    }
}

/// True when `version` is older than the supported floor (0.5).
/// Malformed versions are not warned about.
fn version_below_floor(version: &str) -> bool {
    let mut parts = version.split('.');
    let major = parts.next().and_then(|p| p.parse::<u32>().ok());
    let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
    match (major, minor) {
        (Some(0), Some(minor)) => minor < 5,
        _ => false,
    }
}
