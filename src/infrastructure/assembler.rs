use crate::core::interfaces::FileSystemService;
use crate::core::models::{BundleArtifact, EnvFilePolicy, IncludePath, PackagedEntry};
use crate::utils::{FnpackError, Logger, Result, Timer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ENV_FILE_NAME: &str = ".env";

/// Files never packaged from an include-path walk, matched
/// case-insensitively as substrings of the relative path
const DEFAULT_PACKAGE_IGNORE: &[&str] = &[".ds_store", "thumbs.db", "desktop.ini"];

/// Combines the bundled handler, any required sidecar files, and the
/// resolved include-path entries into the final ordered archive-entry
/// list.
pub struct PackageAssembler {
    fs: Arc<dyn FileSystemService>,
    env_file: EnvFilePolicy,
}

impl PackageAssembler {
    pub fn new(fs: Arc<dyn FileSystemService>, env_file: EnvFilePolicy) -> Self {
        Self { fs, env_file }
    }

    /// Produce the archive entries for one optimized function. Any
    /// missing include path aborts the whole call; a partial package
    /// is never usable.
    pub async fn assemble(
        &self,
        bundle: &BundleArtifact,
        dist_dir: &Path,
        include_paths: &[IncludePath],
        handler_base: &str,
    ) -> Result<Vec<PackagedEntry>> {
        let _timer = Timer::start("Assembling package");

        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        let handler_name = format!("{}.js", handler_base);
        seen.insert(handler_name.clone());
        entries.push(PackagedEntry::new(handler_name, bundle.code.clone().into_bytes()));

        if let Some(env_entry) = self.collect_env_file(dist_dir).await? {
            if !seen.insert(env_entry.name.clone()) {
                return Err(FnpackError::DuplicateEntry(env_entry.name));
            }
            entries.push(env_entry);
        }

        // Plan every (destination, source) pair first, then read the
        // file contents concurrently; the reads share no state.
        let mut planned: Vec<(String, PathBuf)> = Vec::new();
        for include in include_paths {
            self.plan_include_path(include, dist_dir, &mut planned)
                .await?;
        }

        let reads = planned
            .iter()
            .map(|(_, src)| self.fs.read_bytes(src));
        let contents = futures::future::try_join_all(reads).await?;

        for ((dest, _), content) in planned.into_iter().zip(contents) {
            if !seen.insert(dest.clone()) {
                return Err(FnpackError::DuplicateEntry(dest));
            }
            entries.push(PackagedEntry::new(dest, content));
        }

        Ok(entries)
    }

    async fn collect_env_file(&self, dist_dir: &Path) -> Result<Option<PackagedEntry>> {
        let env_path = dist_dir.join(ENV_FILE_NAME);
        match self.env_file {
            EnvFilePolicy::NotPackaged => Ok(None),
            EnvFilePolicy::Optional if !self.fs.file_exists(&env_path) => Ok(None),
            EnvFilePolicy::Required if !self.fs.file_exists(&env_path) => {
                Err(FnpackError::MissingEnvFile(env_path))
            }
            _ => {
                let content = self.fs.read_bytes(&env_path).await?;
                Ok(Some(PackagedEntry::new(ENV_FILE_NAME, content)))
            }
        }
    }

    /// Resolve one include-path entry to (destination, source) pairs.
    ///
    /// A bare file mirrors its path relative to the staging directory;
    /// a bare directory is pivoted to its base name in the archive; an
    /// explicit `{src, dest}` pair is used verbatim.
    async fn plan_include_path(
        &self,
        include: &IncludePath,
        dist_dir: &Path,
        planned: &mut Vec<(String, PathBuf)>,
    ) -> Result<()> {
        let (src_rel, dest) = match include {
            IncludePath::Bare(path) => {
                let src = dist_dir.join(path);
                let dest = if self.fs.is_directory(&src) {
                    // Pivot a directory to its base name
                    Path::new(path)
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| path.clone())
                } else {
                    to_archive_path(path)
                };
                (path.clone(), dest)
            }
            IncludePath::Mapped { src, dest } => (src.clone(), to_archive_path(dest)),
        };

        let src = dist_dir.join(&src_rel);
        if !self.fs.file_exists(&src) && !self.fs.is_directory(&src) {
            return Err(FnpackError::IncludePathNotFound(src));
        }

        Logger::collecting_include_path(&src_rel, &dest);

        if self.fs.is_directory(&src) {
            for file in self.fs.walk_files(&src).await? {
                let relative = file
                    .strip_prefix(&src)
                    .map_err(|_| FnpackError::IncludePathNotFound(file.clone()))?;
                let relative = to_archive_path(&relative.to_string_lossy());
                if is_ignored(&relative) {
                    continue;
                }
                planned.push((format!("{}/{}", dest, relative), file));
            }
        } else {
            planned.push((dest, src));
        }

        Ok(())
    }
}

fn to_archive_path(path: &str) -> String {
    path.replace('\\', "/")
}

fn is_ignored(relative_path: &str) -> bool {
    let lowered = relative_path.to_lowercase();
    DEFAULT_PACKAGE_IGNORE
        .iter()
        .any(|token| lowered.contains(token))
}
