use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct Logger;

impl Logger {
    pub fn init() {
        tracing_subscriber::fmt()
            .with_env_filter("fnpack=debug")
            .with_target(false)
            .init();
    }

    pub fn optimize_start(function: &str, stage: &str, region: &str) {
        info!("📦 fnpack - Function Optimization");
        info!("═══════════════════════════════════════");
        info!("λ  Function: {}", function);
        info!("🌐 Stage: {} / Region: {}", stage, region);
    }

    pub fn skipping(function: &str, reason: &str) {
        debug!("⏭️  Skipping {}: {}", function, reason);
    }

    pub fn bundling(entry: &str, base_dir: &str) {
        info!("🔗 Bundling starting at {}/{}", base_dir, entry);
    }

    pub fn module_resolved(specifier: &str, path: &str) {
        debug!("🔍 Resolved '{}' -> {}", specifier, path);
    }

    pub fn module_external(specifier: &str) {
        debug!("📡 Leaving '{}' to the runtime loader", specifier);
    }

    pub fn writing_bundle(path: &str) {
        debug!("💾 Writing bundled file: {}", path);
    }

    pub fn minifying(path: &str) {
        info!("🗜️  Minifying bundled file {}", path);
    }

    pub fn minify_stats(original: usize, minified: usize) {
        let reduction = if original > 0 {
            ((original - minified.min(original)) as f64 / original as f64) * 100.0
        } else {
            0.0
        };
        info!(
            "  • Minification: {} → {} bytes ({:.1}% reduction)",
            original, minified, reduction
        );
    }

    pub fn collecting_include_path(src: &str, dest: &str) {
        debug!("📁 Collecting include path: {} -> {}", src, dest);
    }

    pub fn optimize_complete(entry_count: usize, elapsed: std::time::Duration) {
        info!("");
        info!("📊 Optimization complete:");
        info!("  • Package entries: {}", entry_count);
        info!("  • Elapsed: {:.2?}", elapsed);
        info!("✅ Ready for archiving");
    }

    pub fn version_warning(found: &str, floor: &str) {
        warn!(
            "⚠️  Host pipeline version {} is below the supported floor {}; continuing anyway",
            found, floor
        );
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
