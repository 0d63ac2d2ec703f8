use std::path::PathBuf;
use thiserror::Error;

/// Error context pointing at the module that failed inside a bundle run
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub snippet: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.snippet = Some(snippet);
        self
    }
}

#[derive(Error, Debug)]
pub enum FnpackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration value. Exclusion fields are coerced instead of
    /// failing, so this only fires for values nothing can be made of.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bundle error: {message}")]
    Bundle {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Minification error: {0}")]
    Minification(String),

    #[error("Missing environment file: {0}")]
    MissingEnvFile(PathBuf),

    #[error("Include path not found: {0}")]
    IncludePathNotFound(PathBuf),

    #[error("Duplicate package entry: {0}")]
    DuplicateEntry(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),
}

impl FnpackError {
    /// Create a simple bundle error without context
    pub fn bundle(message: String) -> Self {
        Self::Bundle {
            message,
            context: None,
        }
    }

    /// Create a bundle error pointing at a specific module
    pub fn bundle_with_context(message: String, context: ErrorContext) -> Self {
        Self::Bundle {
            message,
            context: Some(context),
        }
    }

    pub fn config(message: String) -> Self {
        Self::Config(message)
    }

    /// Format error with the failing module attached, for log output
    pub fn format_detailed(&self) -> String {
        match self {
            FnpackError::Bundle { message, context } => {
                let mut output = format!("Bundle error: {}", message);
                if let Some(ctx) = context {
                    if let Some(ref file_path) = ctx.file_path {
                        output.push_str(&format!("\n  file: {}", file_path.display()));
                    }
                    if let Some(ref snippet) = ctx.snippet {
                        output.push_str(&format!("\n  near: {}", snippet));
                    }
                }
                output
            }
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FnpackError>;

impl From<serde_json::Error> for FnpackError {
    fn from(err: serde_json::Error) -> Self {
        FnpackError::config(format!("JSON error: {}", err))
    }
}
