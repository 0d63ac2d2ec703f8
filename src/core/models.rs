use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stage/region exclusion value as written in configuration:
/// a single matcher, a list of matchers, or `false` to clear
/// anything inherited from a broader scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Exclusion {
    Flag(bool),
    One(String),
    Many(Vec<String>),
}

impl Exclusion {
    /// Coerce to a matcher list. `false` clears; `true` carries no
    /// matchers either, so a malformed `true` is tolerated as empty.
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Exclusion::Flag(_) => Vec::new(),
            Exclusion::One(value) => vec![value.clone()],
            Exclusion::Many(values) => values.clone(),
        }
    }
}

/// Extra file or directory copied verbatim into the package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IncludePath {
    Bare(String),
    Mapped { src: String, dest: String },
}

/// Reference to a registered bundling capability: a bare name or a
/// name with per-entry options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CapabilityRef {
    Name(String),
    Configured {
        name: String,
        #[serde(default)]
        opts: serde_json::Value,
    },
}

impl CapabilityRef {
    pub fn name(&self) -> &str {
        match self {
            CapabilityRef::Name(name) => name,
            CapabilityRef::Configured { name, .. } => name,
        }
    }

    pub fn opts(&self) -> serde_json::Value {
        match self {
            CapabilityRef::Name(_) => serde_json::Value::Null,
            CapabilityRef::Configured { opts, .. } => opts.clone(),
        }
    }
}

/// Optimization-configuration fragment attached at one scope
/// (project, component, or function). Every field is optional;
/// absence leaves the broader scope's value intact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeConfig {
    pub disable: Option<bool>,
    pub exclude_stage: Option<Exclusion>,
    pub exclude_region: Option<Exclusion>,
    pub handler_ext: Option<String>,
    pub include_paths: Option<Vec<IncludePath>>,
    pub requires: Option<Vec<CapabilityRef>>,
    pub plugins: Option<Vec<CapabilityRef>>,
    pub transforms: Option<Vec<CapabilityRef>>,
    pub exclude: Option<Vec<String>>,
    pub ignore: Option<Vec<String>>,
    pub extensions: Option<Vec<String>>,
    pub minify: Option<bool>,
}

/// The single merged configuration for one optimization run.
/// Immutable once produced by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    /// Whether any scope supplied optimization settings at all
    pub configured: bool,
    pub disable: bool,
    pub exclude_stage: Vec<String>,
    pub exclude_region: Vec<String>,
    pub handler_ext: String,
    pub include_paths: Vec<IncludePath>,
    pub requires: Vec<CapabilityRef>,
    pub plugins: Vec<CapabilityRef>,
    pub transforms: Vec<CapabilityRef>,
    pub exclude: Vec<String>,
    pub ignore: Vec<String>,
    pub extensions: Vec<String>,
    pub minify: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            configured: false,
            disable: false,
            exclude_stage: Vec::new(),
            exclude_region: Vec::new(),
            handler_ext: "js".to_string(),
            include_paths: Vec::new(),
            requires: Vec::new(),
            plugins: Vec::new(),
            transforms: Vec::new(),
            exclude: Vec::new(),
            ignore: Vec::new(),
            extensions: Vec::new(),
            minify: true,
        }
    }
}

/// Function-scope `optimize` value as written in configuration:
/// a scalar on/off switch or a full fragment. Scalar `true` opts in
/// with all defaults; scalar `false` leaves the function
/// unconfigured, same as omitting the key entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptimizeSetting {
    Enabled(bool),
    Scoped(ScopeConfig),
}

impl OptimizeSetting {
    /// The fragment this setting contributes to the cascade, if any
    pub fn as_scope(&self) -> Option<ScopeConfig> {
        match self {
            OptimizeSetting::Enabled(false) => None,
            OptimizeSetting::Enabled(true) => Some(ScopeConfig::default()),
            OptimizeSetting::Scoped(scope) => Some(scope.clone()),
        }
    }
}

/// Identifies one deployable function. Owned by the host pipeline
/// and read-only to the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    /// Handler reference in `module.export` form, e.g. `index.handler`
    pub handler: String,
    /// Runtime identifier, e.g. `nodejs20.x`
    pub runtime: String,
    /// Function-scope optimization setting, if declared
    #[serde(default)]
    pub optimize: Option<OptimizeSetting>,
}

impl FunctionDescriptor {
    /// Module path component of the handler reference: everything
    /// before the first dot (`src/index.handler` -> `src/index`).
    pub fn handler_module(&self) -> &str {
        self.handler.split('.').next().unwrap_or(&self.handler)
    }

    /// Entry file name derived from the handler module plus the
    /// configured handler extension.
    pub fn entry_file(&self, config: &EffectiveConfig) -> String {
        format!("{}.{}", self.handler_module(), config.handler_ext)
    }
}

/// Stage/region dimensions of the current invocation
#[derive(Debug, Clone)]
pub struct SkipContext {
    pub stage: String,
    pub region: String,
}

/// Why a run was skipped. Skips are pass-throughs, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NotConfigured,
    Disabled,
    StageExcluded(String),
    RegionExcluded(String),
    UnsupportedRuntime(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotConfigured => write!(f, "no optimization configured"),
            SkipReason::Disabled => write!(f, "optimization disabled"),
            SkipReason::StageExcluded(stage) => write!(f, "stage '{}' excluded", stage),
            SkipReason::RegionExcluded(region) => write!(f, "region '{}' excluded", region),
            SkipReason::UnsupportedRuntime(runtime) => {
                write!(f, "unsupported runtime '{}'", runtime)
            }
        }
    }
}

/// Whether the runtime convention requires a sidecar environment file
/// in the package. Which generation of the host pipeline is targeted
/// decides this, so the host declares it up front.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EnvFilePolicy {
    /// `.env` must exist in the staging directory and is packaged
    Required,
    /// `.env` is packaged when present, silently skipped otherwise
    #[default]
    Optional,
    /// The env file is never packaged
    NotPackaged,
}

/// The bundled (possibly minified) program plus the audit path it was
/// retained at inside the staging directory.
#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub code: String,
    pub audit_path: PathBuf,
}

/// One (archive-relative path, content) pair destined for the final
/// archive. Paths use forward slashes regardless of platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagedEntry {
    pub name: String,
    pub content: Vec<u8>,
}

impl PackagedEntry {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_coercion() {
        assert_eq!(Exclusion::Flag(false).as_list(), Vec::<String>::new());
        assert_eq!(Exclusion::Flag(true).as_list(), Vec::<String>::new());
        assert_eq!(Exclusion::One("prod".into()).as_list(), vec!["prod"]);
        assert_eq!(
            Exclusion::Many(vec!["prod".into(), "staging".into()]).as_list(),
            vec!["prod", "staging"]
        );
    }

    #[test]
    fn test_scope_config_json_shapes() {
        let json = r#"{
            "excludeStage": ["prod"],
            "excludeRegion": false,
            "handlerExt": "js",
            "includePaths": ["assets", {"src": "lib/vendor", "dest": "vendor"}],
            "transforms": ["strip-comments", {"name": "inline-env", "opts": {"STAGE": "dev"}}]
        }"#;

        let scope: ScopeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            scope.exclude_stage,
            Some(Exclusion::Many(vec!["prod".into()]))
        );
        assert_eq!(scope.exclude_region, Some(Exclusion::Flag(false)));
        let transforms = scope.transforms.unwrap();
        assert_eq!(transforms[0].name(), "strip-comments");
        assert_eq!(transforms[1].name(), "inline-env");
        assert_eq!(transforms[1].opts()["STAGE"], "dev");
    }

    #[test]
    fn test_optimize_scalar_forms() {
        let base = r#"{"name": "hello", "handler": "index.handler", "runtime": "nodejs20.x""#;

        let enabled: FunctionDescriptor =
            serde_json::from_str(&format!(r#"{}, "optimize": true}}"#, base)).unwrap();
        let scope = enabled.optimize.unwrap().as_scope();
        assert!(scope.is_some());
        assert!(scope.unwrap().minify.is_none());

        let disabled: FunctionDescriptor =
            serde_json::from_str(&format!(r#"{}, "optimize": false}}"#, base)).unwrap();
        assert!(disabled.optimize.unwrap().as_scope().is_none());

        let fragment: FunctionDescriptor = serde_json::from_str(&format!(
            r#"{}, "optimize": {{"minify": false}}}}"#,
            base
        ))
        .unwrap();
        let scope = fragment.optimize.unwrap().as_scope().unwrap();
        assert_eq!(scope.minify, Some(false));
    }

    #[test]
    fn test_handler_entry_derivation() {
        let func = FunctionDescriptor {
            name: "hello".into(),
            handler: "src/index.handler".into(),
            runtime: "nodejs20.x".into(),
            optimize: None,
        };

        let config = EffectiveConfig::default();
        assert_eq!(func.handler_module(), "src/index");
        assert_eq!(func.entry_file(&config), "src/index.js");
    }
}
