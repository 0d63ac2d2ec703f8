// Registered-capability table for bundling-time extensions.
// Configured plugin/transform names resolve against this table, built
// once at process start; names are never evaluated as code.

use crate::utils::{FnpackError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

static CONSOLE_CALL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*console\.(log|debug|info|trace)\([^;]*\);?\s*$").unwrap()
});

static ENV_ACCESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"process\.env\.([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Per-module source transformation applied during bundling
pub trait TransformCapability: Send + Sync {
    fn name(&self) -> &str;

    /// Transform module source. `opts` carries the per-entry options
    /// from the configuration, `Null` when configured by bare name.
    fn apply(&self, code: &str, path: &Path, opts: &serde_json::Value) -> Result<String>;
}

/// Bundling-job extension with lifecycle hooks
///
/// Plugins run in configured order. Each hook has a no-op default so
/// implementations only override what they need.
pub trait BundlePlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called once before the module graph is walked
    fn on_bundle_start(&self, _entry: &Path, _opts: &serde_json::Value) -> Result<()> {
        Ok(())
    }

    /// Transform one module's source; `None` leaves it unchanged
    fn transform_module(
        &self,
        _code: &str,
        _path: &Path,
        _opts: &serde_json::Value,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    /// Rewrite the assembled bundle; `None` leaves it unchanged
    fn on_bundle_end(&self, _bundle: &str, _opts: &serde_json::Value) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Maps configured capability names to statically linked
/// implementations. Lookups of unregistered names are fatal at
/// bundle time.
pub struct CapabilityRegistry {
    plugins: HashMap<String, Arc<dyn BundlePlugin>>,
    transforms: HashMap<String, Arc<dyn TransformCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
            transforms: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in capabilities
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_transform(Arc::new(RemoveConsoleTransform));
        registry.register_transform(Arc::new(InlineEnvTransform));
        registry.register_plugin(Arc::new(BannerPlugin));
        registry
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn BundlePlugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn register_transform(&mut self, transform: Arc<dyn TransformCapability>) {
        self.transforms
            .insert(transform.name().to_string(), transform);
    }

    pub fn plugin(&self, name: &str) -> Result<Arc<dyn BundlePlugin>> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| FnpackError::UnknownCapability(format!("plugin '{}'", name)))
    }

    pub fn transform(&self, name: &str) -> Result<Arc<dyn TransformCapability>> {
        self.transforms
            .get(name)
            .cloned()
            .ok_or_else(|| FnpackError::UnknownCapability(format!("transform '{}'", name)))
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Strips whole-line console.log/debug/info/trace calls
pub struct RemoveConsoleTransform;

impl TransformCapability for RemoveConsoleTransform {
    fn name(&self) -> &str {
        "remove-console"
    }

    fn apply(&self, code: &str, _path: &Path, _opts: &serde_json::Value) -> Result<String> {
        Ok(CONSOLE_CALL_REGEX.replace_all(code, "").to_string())
    }
}

/// Replaces `process.env.NAME` reads with literal values from the
/// transform options, leaving unknown names untouched
pub struct InlineEnvTransform;

impl TransformCapability for InlineEnvTransform {
    fn name(&self) -> &str {
        "inline-env"
    }

    fn apply(&self, code: &str, _path: &Path, opts: &serde_json::Value) -> Result<String> {
        let result = ENV_ACCESS_REGEX.replace_all(code, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match opts.get(key).and_then(|v| v.as_str()) {
                Some(value) => serde_json::Value::String(value.to_string()).to_string(),
                None => caps[0].to_string(),
            }
        });
        Ok(result.to_string())
    }
}

/// Prepends a banner comment (opts: `{"text": "..."}`) to the bundle
pub struct BannerPlugin;

impl BundlePlugin for BannerPlugin {
    fn name(&self) -> &str {
        "banner"
    }

    fn on_bundle_end(&self, bundle: &str, opts: &serde_json::Value) -> Result<Option<String>> {
        let text = opts.get("text").and_then(|v| v.as_str()).unwrap_or("");
        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("/* {} */\n{}", text, bundle)))
    }
}
