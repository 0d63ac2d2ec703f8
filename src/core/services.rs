use crate::core::capability::CapabilityRegistry;
use crate::core::config::ConfigResolver;
use crate::core::interfaces::FileSystemService;
use crate::core::models::{
    EnvFilePolicy, FunctionDescriptor, PackagedEntry, ScopeConfig, SkipContext, SkipReason,
};
use crate::infrastructure::{BundleOrchestrator, MinificationService, PackageAssembler};
use crate::utils::{Logger, Result, Timer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Outcome of one optimization run
#[derive(Debug)]
pub enum OptimizeOutcome {
    /// Nothing was done; the event passes through unchanged
    Skipped(SkipReason),
    Optimized {
        entries: Vec<PackagedEntry>,
        /// Where the audit copies were retained
        optimized_dir: PathBuf,
    },
}

/// The composed optimization pipeline:
/// resolve -> skip check -> bundle -> minify -> assemble.
///
/// Holds only `Arc`s to immutable collaborators, so one service can
/// serve concurrent invocations for independent functions; all per-run
/// state lives in locals.
pub struct OptimizeService {
    bundler: BundleOrchestrator,
    minifier: MinificationService,
    assembler: PackageAssembler,
}

impl OptimizeService {
    pub fn new(
        fs: Arc<dyn FileSystemService>,
        registry: Arc<CapabilityRegistry>,
        env_file: EnvFilePolicy,
    ) -> Self {
        Self {
            bundler: BundleOrchestrator::new(fs.clone(), registry),
            minifier: MinificationService::new(fs.clone()),
            assembler: PackageAssembler::new(fs, env_file),
        }
    }

    /// Run the pipeline for one (function, stage, region) invocation.
    ///
    /// `broader_scopes` are the project/component fragments ordered
    /// broadest-first; the function's own fragment is appended as the
    /// narrowest scope.
    pub async fn optimize(
        &self,
        function: &FunctionDescriptor,
        dist_dir: &Path,
        broader_scopes: &[ScopeConfig],
        context: &SkipContext,
    ) -> Result<OptimizeOutcome> {
        let timer = Timer::start("Optimization run");

        let mut scopes: Vec<ScopeConfig> = broader_scopes.to_vec();
        if let Some(function_scope) = function.optimize.as_ref().and_then(|s| s.as_scope()) {
            scopes.push(function_scope);
        }

        let effective = ConfigResolver::resolve(&scopes);
        if let Some(reason) = ConfigResolver::should_skip(&effective, context) {
            Logger::skipping(&function.name, &reason.to_string());
            return Ok(OptimizeOutcome::Skipped(reason));
        }

        Logger::optimize_start(&function.name, &context.stage, &context.region);

        let entry = function.entry_file(&effective);
        let handler_base = function.handler_module();

        let artifact = self
            .bundler
            .bundle(&entry, dist_dir, handler_base, &effective)
            .await?;
        let artifact = self.minifier.minify(artifact, &effective).await?;
        let entries = self
            .assembler
            .assemble(&artifact, dist_dir, &effective.include_paths, handler_base)
            .await?;

        Logger::optimize_complete(entries.len(), timer.elapsed());

        Ok(OptimizeOutcome::Optimized {
            entries,
            optimized_dir: dist_dir.join("optimized"),
        })
    }
}
