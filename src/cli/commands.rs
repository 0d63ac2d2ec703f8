use crate::core::{
    CapabilityRegistry, EnvFilePolicy, FunctionDescriptor, OptimizeOutcome, OptimizeService,
    OptimizeSetting, ScopeConfig, SkipContext,
};
use crate::infrastructure::TokioFileSystemService;
use crate::utils::{FnpackError, Logger, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fnpack")]
#[command(about = "Packaging-time optimizer for deployed functions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bundle, minify and assemble one function's package
    Optimize {
        /// Staging directory holding the compiled function output
        #[arg(short, long, default_value = ".")]
        dist: String,
        /// Handler reference in module.export form
        #[arg(long, default_value = "index.handler")]
        handler: String,
        /// Function name, for logging
        #[arg(long, default_value = "function")]
        name: String,
        /// Runtime identifier
        #[arg(long, default_value = "nodejs20.x")]
        runtime: String,
        /// Deployment stage
        #[arg(short, long, default_value = "dev")]
        stage: String,
        /// Deployment region
        #[arg(short, long, default_value = "us-east-1")]
        region: String,
        /// JSON file with project/component/function scope fragments
        #[arg(short, long)]
        config: Option<String>,
        /// Disable the minification step
        #[arg(long)]
        no_minify: bool,
        /// Whether a .env sidecar must be packaged
        #[arg(long, value_enum, default_value_t = EnvFileArg::Optional)]
        env_file: EnvFileArg,
        /// Write package entries into this directory instead of
        /// only listing them
        #[arg(short, long)]
        out: Option<String>,
    },
    /// List the registered bundling capabilities
    Capabilities,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EnvFileArg {
    Required,
    Optional,
    None,
}

impl From<EnvFileArg> for EnvFilePolicy {
    fn from(arg: EnvFileArg) -> Self {
        match arg {
            EnvFileArg::Required => EnvFilePolicy::Required,
            EnvFileArg::Optional => EnvFilePolicy::Optional,
            EnvFileArg::None => EnvFilePolicy::NotPackaged,
        }
    }
}

/// Scope fragments as laid out in an fnpack.config.json file
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    project: Option<ScopeConfig>,
    component: Option<ScopeConfig>,
    function: Option<ScopeConfig>,
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        // Initialize logging
        Logger::init();

        let cli = Cli::parse();

        match cli.command {
            Commands::Optimize {
                dist,
                handler,
                name,
                runtime,
                stage,
                region,
                config,
                no_minify,
                env_file,
                out,
            } => {
                self.handle_optimize(
                    &dist, &handler, &name, &runtime, &stage, &region, config, no_minify,
                    env_file, out,
                )
                .await
            }
            Commands::Capabilities => self.handle_capabilities(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_optimize(
        &self,
        dist: &str,
        handler: &str,
        name: &str,
        runtime: &str,
        stage: &str,
        region: &str,
        config_path: Option<String>,
        no_minify: bool,
        env_file: EnvFileArg,
        out: Option<String>,
    ) -> Result<()> {
        let config_file = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(FnpackError::Io)?;
                serde_json::from_str::<ConfigFile>(&content)?
            }
            None => ConfigFile::default(),
        };

        // The CLI is an explicit request to optimize, so the function
        // scope always exists even without a config file
        let mut function_scope = config_file.function.unwrap_or_default();
        if no_minify {
            function_scope.minify = Some(false);
        }

        let mut broader_scopes = Vec::new();
        if let Some(project) = config_file.project {
            broader_scopes.push(project);
        }
        if let Some(component) = config_file.component {
            broader_scopes.push(component);
        }

        let function = FunctionDescriptor {
            name: name.to_string(),
            handler: handler.to_string(),
            runtime: runtime.to_string(),
            optimize: Some(OptimizeSetting::Scoped(function_scope)),
        };
        let context = SkipContext {
            stage: stage.to_string(),
            region: region.to_string(),
        };

        let service = OptimizeService::new(
            Arc::new(TokioFileSystemService),
            Arc::new(CapabilityRegistry::with_builtins()),
            env_file.into(),
        );

        let outcome = service
            .optimize(&function, &PathBuf::from(dist), &broader_scopes, &context)
            .await?;

        match outcome {
            OptimizeOutcome::Skipped(reason) => {
                Logger::warn(&format!("Nothing optimized: {}", reason));
                Ok(())
            }
            OptimizeOutcome::Optimized { entries, .. } => {
                if let Some(out_dir) = out {
                    let out_dir = PathBuf::from(out_dir);
                    for entry in &entries {
                        let target = out_dir.join(&entry.name);
                        if let Some(parent) = target.parent() {
                            tokio::fs::create_dir_all(parent)
                                .await
                                .map_err(FnpackError::Io)?;
                        }
                        tokio::fs::write(&target, &entry.content)
                            .await
                            .map_err(FnpackError::Io)?;
                    }
                    tracing::info!("📦 Wrote {} entries to {}", entries.len(), out_dir.display());
                } else {
                    for entry in &entries {
                        tracing::info!("  {} ({} bytes)", entry.name, entry.size());
                    }
                }
                Ok(())
            }
        }
    }

    fn handle_capabilities(&self) -> Result<()> {
        let registry = CapabilityRegistry::with_builtins();
        tracing::info!("🧩 Registered capabilities:");
        tracing::info!("  • plugins: {}", registry.plugin_count());
        tracing::info!("  • transforms: {}", registry.transform_count());
        tracing::info!("");
        tracing::info!("Transforms: remove-console, inline-env");
        tracing::info!("Plugins: banner");
        Ok(())
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}
