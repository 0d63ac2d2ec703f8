use crate::core::interfaces::FileSystemService;
use crate::core::models::{BundleArtifact, EffectiveConfig};
use crate::utils::{FnpackError, Logger, Result};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, MangleOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use std::sync::Arc;

/// JavaScript minification using oxc: identifier mangling enabled,
/// default compression settings.
pub struct OxcMinifier;

impl OxcMinifier {
    pub fn new() -> Self {
        Self
    }

    pub fn minify(&self, source_code: &str, filename: &str) -> Result<String> {
        let allocator = Allocator::default();
        let source_type = SourceType::from_path(filename).unwrap_or_default();

        let parse_result = Parser::new(&allocator, source_code, source_type).parse();
        if !parse_result.errors.is_empty() {
            let errors: Vec<String> = parse_result
                .errors
                .iter()
                .map(|e| format!("Parse error: {}", e))
                .collect();
            return Err(FnpackError::Minification(errors.join("\n")));
        }

        let options = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions::default()),
        };

        let mut program = parse_result.program;
        let minifier_return = Minifier::new(options).minify(&allocator, &mut program);

        let codegen_options = CodegenOptions {
            minify: true,
            ..CodegenOptions::default()
        };
        let minified_code = Codegen::new()
            .with_options(codegen_options)
            .with_scoping(minifier_return.scoping)
            .build(&program)
            .code;

        Ok(minified_code)
    }
}

impl Default for OxcMinifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipeline step wrapping [`OxcMinifier`]: passthrough when the
/// effective configuration disables minification, otherwise replaces
/// the bundle and rewrites the audit file.
pub struct MinificationService {
    fs: Arc<dyn FileSystemService>,
    minifier: Arc<OxcMinifier>,
}

impl MinificationService {
    pub fn new(fs: Arc<dyn FileSystemService>) -> Self {
        Self {
            fs,
            minifier: Arc::new(OxcMinifier::new()),
        }
    }

    /// Conditionally minify the bundle. A capability failure or an
    /// empty code payload is a hard failure of the optimization run.
    pub async fn minify(
        &self,
        artifact: BundleArtifact,
        config: &EffectiveConfig,
    ) -> Result<BundleArtifact> {
        if !config.minify {
            return Ok(artifact);
        }

        Logger::minifying(&artifact.audit_path.display().to_string());

        let minifier = self.minifier.clone();
        let source = artifact.code.clone();
        let filename = artifact
            .audit_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("bundle.js")
            .to_string();

        // oxc is CPU-intensive; keep it off the async runtime
        let minified = tokio::task::spawn_blocking(move || minifier.minify(&source, &filename))
            .await
            .map_err(|e| FnpackError::Minification(format!("minification task failed: {}", e)))??;

        if minified.trim().is_empty() {
            return Err(FnpackError::Minification(format!(
                "empty minifier output for {}",
                artifact.audit_path.display()
            )));
        }

        Logger::minify_stats(artifact.code.len(), minified.len());

        // The minified form replaces the bundle in storage
        self.fs
            .write_file(&artifact.audit_path, minified.as_bytes())
            .await?;

        Ok(BundleArtifact {
            code: minified,
            audit_path: artifact.audit_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::file_system::TokioFileSystemService;
    use tempfile::tempdir;

    fn service() -> MinificationService {
        MinificationService::new(Arc::new(TokioFileSystemService))
    }

    #[test]
    fn test_basic_minification() {
        let minifier = OxcMinifier::new();
        let source = r#"
            function hello(name) {
                const message = "Hello, " + name;
                return message;
            }
            module.exports = hello;
        "#;

        let minified = minifier.minify(source, "bundle.js").unwrap();
        assert!(minified.len() < source.len());
        assert!(minified.contains("module.exports"));
    }

    #[test]
    fn test_minified_output_minifies_again() {
        // An audit file from a previous run may be fed back through
        // the pipeline; minified output must stay valid input.
        let minifier = OxcMinifier::new();
        let source = "function add(left, right) { return left + right; }\nmodule.exports = add;\n";

        let once = minifier.minify(source, "bundle.js").unwrap();
        let twice = minifier.minify(&once, "bundle.js").unwrap();

        assert!(!twice.trim().is_empty());
        assert!(twice.contains("module.exports"));
        assert!(twice.len() <= once.len());
    }

    #[test]
    fn test_minify_rejects_invalid_source() {
        let minifier = OxcMinifier::new();
        assert!(minifier.minify("function ( { nope", "bundle.js").is_err());
    }

    #[tokio::test]
    async fn test_passthrough_when_minify_disabled() {
        let temp = tempdir().unwrap();
        let artifact = BundleArtifact {
            code: "const answer = 40 + 2;\nmodule.exports = answer;\n".into(),
            audit_path: temp.path().join("optimized/index.js"),
        };

        let config = EffectiveConfig {
            configured: true,
            minify: false,
            ..EffectiveConfig::default()
        };
        let result = service().minify(artifact.clone(), &config).await.unwrap();
        assert_eq!(result.code, artifact.code);
        // No audit rewrite happens on passthrough
        assert!(!artifact.audit_path.exists());
    }

    #[tokio::test]
    async fn test_minified_form_replaces_audit_file() {
        let temp = tempdir().unwrap();
        let audit_path = temp.path().join("optimized/index.js");
        let code = "function add(left, right) { return left + right; }\nmodule.exports = add;\n";
        TokioFileSystemService
            .write_file(&audit_path, code.as_bytes())
            .await
            .unwrap();

        let artifact = BundleArtifact {
            code: code.into(),
            audit_path: audit_path.clone(),
        };
        let config = EffectiveConfig::default();
        let result = service().minify(artifact, &config).await.unwrap();

        assert!(result.code.len() < code.len());
        let on_disk = std::fs::read_to_string(&audit_path).unwrap();
        assert_eq!(on_disk, result.code);
    }

    #[tokio::test]
    async fn test_empty_output_is_fatal() {
        let temp = tempdir().unwrap();
        let artifact = BundleArtifact {
            // Comment-only input minifies to nothing
            code: "// nothing here\n".into(),
            audit_path: temp.path().join("optimized/index.js"),
        };

        let config = EffectiveConfig::default();
        let err = service().minify(artifact, &config).await.unwrap_err();
        assert!(matches!(err, FnpackError::Minification(_)));
    }
}
