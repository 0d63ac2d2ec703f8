use crate::core::interfaces::FileSystemService;
use crate::utils::{FnpackError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub struct TokioFileSystemService;

#[async_trait::async_trait]
impl FileSystemService for TokioFileSystemService {
    async fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).await.map_err(FnpackError::Io)
    }

    async fn read_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).await.map_err(FnpackError::Io)
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            self.create_directory(parent).await?;
        }

        fs::write(path, content).await.map_err(FnpackError::Io)
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(FnpackError::Io)
    }

    async fn walk_files(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let root = path.to_path_buf();
        // walkdir is synchronous; run the traversal off the async runtime
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in WalkDir::new(&root).follow_links(true) {
                let entry = entry.map_err(|e| {
                    FnpackError::Io(e.into_io_error().unwrap_or_else(|| {
                        std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
                    }))
                })?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            Ok::<_, FnpackError>(files)
        })
        .await
        .map_err(|e| FnpackError::bundle(format!("walk task failed: {}", e)))??;

        Ok(files)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_directory(&self, path: &Path) -> bool {
        path.is_dir()
    }
}
