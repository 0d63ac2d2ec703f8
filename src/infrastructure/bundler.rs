use crate::core::capability::{BundlePlugin, CapabilityRegistry, TransformCapability};
use crate::core::models::{BundleArtifact, EffectiveConfig};
use crate::core::interfaces::FileSystemService;
use crate::utils::{ErrorContext, FnpackError, Logger, Result, Timer};
use once_cell::sync::Lazy;
use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

// Pre-compiled patterns for dependency extraction
static REQUIRE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
static IMPORT_FROM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*(?:import|export)\s[^;'"]*?from\s*['"]([^'"]+)['"]"#).unwrap()
});
static SIDE_EFFECT_IMPORT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#).unwrap());

/// Drives one bundling job: walks the dependency graph from the
/// resolved entry point, applies configured transforms and plugins in
/// listed order, and emits a single self-contained CommonJS buffer.
///
/// The target is a server-side runtime: no browser-field resolution,
/// no global shimming. Bare specifiers that cannot be found locally
/// are left to the runtime loader, so missing optional dependencies
/// never fail the bundle; an unresolved *relative* specifier does.
pub struct BundleOrchestrator {
    fs: Arc<dyn FileSystemService>,
    registry: Arc<CapabilityRegistry>,
}

struct ResolvedCapabilities {
    plugins: Vec<(Arc<dyn BundlePlugin>, serde_json::Value)>,
    transforms: Vec<(Arc<dyn TransformCapability>, serde_json::Value)>,
}

impl BundleOrchestrator {
    pub fn new(fs: Arc<dyn FileSystemService>, registry: Arc<CapabilityRegistry>) -> Self {
        Self { fs, registry }
    }

    /// Bundle the function rooted at `entry` (a path relative to the
    /// staging directory `base_dir`). The bundled buffer is retained at
    /// `<base_dir>/optimized/<handler_base>.js` for audit.
    pub async fn bundle(
        &self,
        entry: &str,
        base_dir: &Path,
        handler_base: &str,
        config: &EffectiveConfig,
    ) -> Result<BundleArtifact> {
        let _timer = Timer::start("Bundling");
        Logger::bundling(entry, &base_dir.display().to_string());

        // Resolve configured capability names before touching any file
        let capabilities = self.resolve_capabilities(config)?;

        let entry_path = base_dir.join(entry);
        if !self.fs.file_exists(&entry_path) {
            return Err(FnpackError::bundle_with_context(
                format!("entry point '{}' not found", entry),
                ErrorContext::new().with_file(entry_path),
            ));
        }

        for (plugin, opts) in &capabilities.plugins {
            plugin.on_bundle_start(&entry_path, opts)?;
        }

        let graph = self
            .walk_graph(entry, base_dir, config, &capabilities)
            .await?;

        let entry_id = normalize_specifier(entry);
        let mut code = emit_bundle(&entry_id, &graph);

        for (plugin, opts) in &capabilities.plugins {
            if let Some(rewritten) = plugin.on_bundle_end(&code, opts)? {
                code = rewritten;
            }
        }

        // Retain the bundled buffer on disk for inspection
        let audit_path = base_dir
            .join("optimized")
            .join(format!("{}.js", handler_base));
        Logger::writing_bundle(&audit_path.display().to_string());
        self.fs.write_file(&audit_path, code.as_bytes()).await?;

        Ok(BundleArtifact { code, audit_path })
    }

    fn resolve_capabilities(&self, config: &EffectiveConfig) -> Result<ResolvedCapabilities> {
        let mut plugins = Vec::new();
        for reference in &config.plugins {
            plugins.push((self.registry.plugin(reference.name())?, reference.opts()));
        }

        let mut transforms = Vec::new();
        for reference in &config.transforms {
            transforms.push((self.registry.transform(reference.name())?, reference.opts()));
        }

        Ok(ResolvedCapabilities {
            plugins,
            transforms,
        })
    }

    async fn walk_graph(
        &self,
        entry: &str,
        base_dir: &Path,
        config: &EffectiveConfig,
        capabilities: &ResolvedCapabilities,
    ) -> Result<ModuleGraph> {
        let excluded: HashSet<&str> = config.exclude.iter().map(String::as_str).collect();
        let ignored: HashSet<&str> = config.ignore.iter().map(String::as_str).collect();
        let runtime_provided: HashSet<&str> =
            config.requires.iter().map(|r| r.name()).collect();

        let mut graph = ModuleGraph::default();
        let mut queue = VecDeque::new();
        queue.push_back(normalize_specifier(entry));

        while let Some(module_id) = queue.pop_front() {
            if graph.modules.contains_key(&module_id) {
                continue;
            }

            let module_path = base_dir.join(&module_id);
            let content = self.fs.read_to_string(&module_path).await?;
            let content = self.apply_transforms(content, &module_path, capabilities)?;
            validate_syntax(&content, &module_path)?;

            let mut aliases = BTreeMap::new();
            for specifier in extract_dependencies(&content) {
                if excluded.contains(specifier.as_str()) {
                    // Dropped from the bundle entirely; a runtime
                    // require of it is the caller's problem
                    continue;
                }
                if ignored.contains(specifier.as_str()) {
                    graph.stubs.insert(specifier.clone());
                    continue;
                }
                if is_relative(&specifier) {
                    let dep_id = self
                        .resolve_relative(&specifier, &module_id, base_dir, config)
                        .ok_or_else(|| {
                            FnpackError::bundle_with_context(
                                format!("unresolved module '{}'", specifier),
                                ErrorContext::new()
                                    .with_file(module_path.clone())
                                    .with_snippet(specifier.clone()),
                            )
                        })?;
                    Logger::module_resolved(&specifier, &dep_id);
                    aliases.insert(specifier, dep_id.clone());
                    queue.push_back(dep_id);
                } else {
                    // Bare specifier: runtime-provided via `requires`,
                    // or an (optional) dependency deferred to the
                    // runtime loader either way
                    if !runtime_provided.contains(specifier.as_str()) {
                        Logger::module_external(&specifier);
                    }
                }
            }

            graph.modules.insert(module_id, ModuleRecord { content, aliases });
        }

        Ok(graph)
    }

    fn apply_transforms(
        &self,
        mut content: String,
        module_path: &Path,
        capabilities: &ResolvedCapabilities,
    ) -> Result<String> {
        for (transform, opts) in &capabilities.transforms {
            content = transform.apply(&content, module_path, opts)?;
        }
        for (plugin, opts) in &capabilities.plugins {
            if let Some(transformed) = plugin.transform_module(&content, module_path, opts)? {
                content = transformed;
            }
        }
        Ok(content)
    }

    /// Resolve a relative specifier against the importing module's
    /// directory. Tries the exact path, then the handler extension,
    /// then any configured extra extensions, then an index file.
    fn resolve_relative(
        &self,
        specifier: &str,
        importer_id: &str,
        base_dir: &Path,
        config: &EffectiveConfig,
    ) -> Option<String> {
        let importer_dir = Path::new(importer_id).parent().unwrap_or(Path::new(""));
        let joined = normalize_path(&importer_dir.join(specifier));

        let mut candidates = vec![joined.clone()];
        candidates.push(append_ext(&joined, &config.handler_ext));
        for ext in &config.extensions {
            candidates.push(append_ext(&joined, ext.trim_start_matches('.')));
        }
        candidates.push(joined.join(format!("index.{}", config.handler_ext)));

        candidates
            .into_iter()
            .find(|candidate| self.fs.file_exists(&base_dir.join(candidate)))
            .map(|candidate| candidate.to_string_lossy().replace('\\', "/"))
    }
}

#[derive(Default)]
struct ModuleGraph {
    /// Module id (base-relative path) -> record, ordered for
    /// deterministic output
    modules: BTreeMap<String, ModuleRecord>,
    /// Specifiers replaced with an empty stub
    stubs: HashSet<String>,
}

struct ModuleRecord {
    content: String,
    aliases: BTreeMap<String, String>,
}

fn emit_bundle(entry_id: &str, graph: &ModuleGraph) -> String {
    let mut aliases: BTreeMap<&str, &BTreeMap<String, String>> = BTreeMap::new();
    for (id, record) in &graph.modules {
        if !record.aliases.is_empty() {
            aliases.insert(id, &record.aliases);
        }
    }
    let alias_table =
        serde_json::to_string(&aliases).unwrap_or_else(|_| "{}".to_string());

    let mut bundle = String::new();
    bundle.push_str("// fnpack - optimized function bundle\n");
    bundle.push_str("'use strict';\n");
    bundle.push_str("var __modules = {};\n");
    bundle.push_str("var __cache = {};\n");
    bundle.push_str(&format!("var __aliases = {};\n", alias_table));
    bundle.push_str(concat!(
        "function __load(id) {\n",
        "  var factory = __modules[id];\n",
        "  if (!factory) { return require(id); }\n",
        "  if (__cache[id]) { return __cache[id].exports; }\n",
        "  var module = { exports: {} };\n",
        "  __cache[id] = module;\n",
        "  var table = __aliases[id] || {};\n",
        "  factory(module, module.exports, function (spec) {\n",
        "    return __load(table[spec] !== undefined ? table[spec] : spec);\n",
        "  });\n",
        "  return module.exports;\n",
        "}\n",
    ));

    for specifier in graph.stubs.iter().collect::<std::collections::BTreeSet<_>>() {
        bundle.push_str(&format!(
            "__modules[{}] = function (module, exports, require) {{}};\n",
            serde_json::Value::String(specifier.to_string())
        ));
    }

    for (id, record) in &graph.modules {
        bundle.push_str(&format!(
            "__modules[{}] = function (module, exports, require) {{\n",
            serde_json::Value::String(id.clone())
        ));
        bundle.push_str(&record.content);
        if !record.content.ends_with('\n') {
            bundle.push('\n');
        }
        bundle.push_str("};\n");
    }

    bundle.push_str(&format!(
        "module.exports = __load({});\n",
        serde_json::Value::String(entry_id.to_string())
    ));
    bundle
}

/// Fail the bundle on a syntax error in any included module
fn validate_syntax(content: &str, path: &Path) -> Result<()> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_default();
    let parse_result = Parser::new(&allocator, content, source_type).parse();

    if !parse_result.errors.is_empty() {
        let messages: Vec<String> = parse_result
            .errors
            .iter()
            .map(|e| format!("{}", e))
            .collect();
        return Err(FnpackError::bundle_with_context(
            messages.join("\n"),
            ErrorContext::new().with_file(path.to_path_buf()),
        ));
    }
    Ok(())
}

fn extract_dependencies(content: &str) -> Vec<String> {
    let mut specifiers = Vec::new();
    let mut seen = HashSet::new();
    for regex in [&*REQUIRE_REGEX, &*IMPORT_FROM_REGEX, &*SIDE_EFFECT_IMPORT_REGEX] {
        for captures in regex.captures_iter(content) {
            let specifier = captures[1].to_string();
            if seen.insert(specifier.clone()) {
                specifiers.push(specifier);
            }
        }
    }
    specifiers
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

fn normalize_specifier(entry: &str) -> String {
    normalize_path(Path::new(entry))
        .to_string_lossy()
        .replace('\\', "/")
}

/// Logical path normalization: strips `.` and folds `..` without
/// touching the filesystem
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

fn append_ext(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", ext));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::CapabilityRef;
    use crate::infrastructure::file_system::TokioFileSystemService;
    use tempfile::tempdir;

    fn orchestrator() -> BundleOrchestrator {
        BundleOrchestrator::new(
            Arc::new(TokioFileSystemService),
            Arc::new(CapabilityRegistry::with_builtins()),
        )
    }

    async fn write(dir: &Path, rel: &str, content: &str) {
        let fs = TokioFileSystemService;
        fs.write_file(&dir.join(rel), content.as_bytes())
            .await
            .unwrap();
    }

    #[test]
    fn test_extract_dependencies() {
        let content = r#"
            const util = require('./util');
            import helper from './lib/helper.js';
            import 'polyfill';
            const aws = require('aws-sdk');
        "#;
        let deps = extract_dependencies(content);
        assert_eq!(deps, vec!["./util", "aws-sdk", "./lib/helper.js", "polyfill"]);
    }

    #[test]
    fn test_normalize_path_folds_parents() {
        assert_eq!(
            normalize_specifier("lib/../util/./helper.js"),
            "util/helper.js"
        );
    }

    #[tokio::test]
    async fn test_bundle_two_module_graph() {
        let temp = tempdir().unwrap();
        write(temp.path(), "index.js", "const u = require('./util');\nmodule.exports.handler = function () { return u.double(21); };\n").await;
        write(temp.path(), "util.js", "exports.double = function (n) { return n * 2; };\n").await;

        let config = EffectiveConfig::default();
        let artifact = orchestrator()
            .bundle("index.js", temp.path(), "index", &config)
            .await
            .unwrap();

        assert!(artifact.code.contains("__modules[\"index.js\"]"));
        assert!(artifact.code.contains("__modules[\"util.js\"]"));
        assert!(artifact.code.contains("module.exports = __load(\"index.js\")"));
        // Audit copy retained in the staging directory
        assert!(temp.path().join("optimized/index.js").is_file());
    }

    #[tokio::test]
    async fn test_missing_relative_dependency_fails() {
        let temp = tempdir().unwrap();
        write(temp.path(), "index.js", "require('./missing');\n").await;

        let config = EffectiveConfig::default();
        let err = orchestrator()
            .bundle("index.js", temp.path(), "index", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FnpackError::Bundle { .. }));
        assert!(err.to_string().contains("./missing"));
    }

    #[tokio::test]
    async fn test_bare_specifier_left_to_runtime() {
        let temp = tempdir().unwrap();
        write(temp.path(), "index.js", "const aws = require('aws-sdk');\nmodule.exports.handler = function () {};\n").await;

        let config = EffectiveConfig::default();
        let artifact = orchestrator()
            .bundle("index.js", temp.path(), "index", &config)
            .await
            .unwrap();
        // aws-sdk is not inlined; __load falls back to the host require
        assert!(!artifact.code.contains("__modules[\"aws-sdk\"]"));
    }

    #[tokio::test]
    async fn test_ignore_stubs_and_exclude_drops() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "index.js",
            "require('imagemagick');\nrequire('heavy-native');\nmodule.exports.handler = function () {};\n",
        )
        .await;

        let config = EffectiveConfig {
            configured: true,
            ignore: vec!["imagemagick".into()],
            exclude: vec!["heavy-native".into()],
            ..EffectiveConfig::default()
        };
        let artifact = orchestrator()
            .bundle("index.js", temp.path(), "index", &config)
            .await
            .unwrap();

        // Ignored module becomes an empty stub
        assert!(artifact
            .code
            .contains("__modules[\"imagemagick\"] = function (module, exports, require) {}"));
        // Excluded module is absent from the bundle entirely
        assert!(!artifact.code.contains("__modules[\"heavy-native\"]"));
    }

    #[tokio::test]
    async fn test_syntax_error_fails_bundle() {
        let temp = tempdir().unwrap();
        write(temp.path(), "index.js", "function ( { broken\n").await;

        let config = EffectiveConfig::default();
        let err = orchestrator()
            .bundle("index.js", temp.path(), "index", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FnpackError::Bundle { .. }));
    }

    #[tokio::test]
    async fn test_unknown_capability_fails_before_bundling() {
        let temp = tempdir().unwrap();
        write(temp.path(), "index.js", "module.exports = 1;\n").await;

        let config = EffectiveConfig {
            configured: true,
            transforms: vec![CapabilityRef::Name("does-not-exist".into())],
            ..EffectiveConfig::default()
        };
        let err = orchestrator()
            .bundle("index.js", temp.path(), "index", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FnpackError::UnknownCapability(_)));
    }

    #[tokio::test]
    async fn test_transforms_applied_in_listed_order() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "index.js",
            "console.log('noise');\nconst stage = process.env.STAGE;\nmodule.exports = stage;\n",
        )
        .await;

        let config = EffectiveConfig {
            configured: true,
            transforms: vec![
                CapabilityRef::Name("remove-console".into()),
                CapabilityRef::Configured {
                    name: "inline-env".into(),
                    opts: serde_json::json!({"STAGE": "dev"}),
                },
            ],
            ..EffectiveConfig::default()
        };
        let artifact = orchestrator()
            .bundle("index.js", temp.path(), "index", &config)
            .await
            .unwrap();
        assert!(!artifact.code.contains("console.log"));
        assert!(artifact.code.contains("const stage = \"dev\";"));
    }
}
