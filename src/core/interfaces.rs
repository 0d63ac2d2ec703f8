use crate::utils::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> Result<String>;
    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
    /// All descendant files of a directory, depth-first, sorted for
    /// deterministic package ordering
    async fn walk_files(&self, path: &Path) -> Result<Vec<PathBuf>>;
    fn file_exists(&self, path: &Path) -> bool;
    fn is_directory(&self, path: &Path) -> bool;
}
