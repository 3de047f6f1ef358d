//! Workspace-confined file access for `fs/read_text_file` and
//! `fs/write_text_file`.
//!
//! Every path the agent sends is resolved against the workspace root:
//! `..` traversal and symlinks pointing outside the root are rejected.
//! Writes go through a temporary file in the target directory and are
//! renamed into place, so a crash never leaves a half-written file.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::acp::handler::HandlerFuture;
use crate::acp::schema::{ReadTextFileRequest, WriteTextFileRequest};
use crate::orchestrator::session_manager::FileSystemHandler;
use crate::{AppError, Result};

/// Validate that `candidate` resides within `workspace_root`.
///
/// Relative candidates are taken relative to the root. Returns the
/// resolved absolute path on success.
///
/// # Errors
///
/// Returns [`AppError::PathViolation`] if:
/// - The workspace root cannot be canonicalized.
/// - The candidate contains `..` segments that climb above the filesystem root.
/// - The resolved path does not start with the workspace root.
/// - The resolved path is a symlink whose target escapes the workspace.
pub fn validate_path(workspace_root: &Path, candidate: impl AsRef<Path>) -> Result<PathBuf> {
    let root = workspace_root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("workspace root invalid: {err}")))?;

    let mut normalized = PathBuf::new();
    for component in candidate.as_ref().components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(AppError::PathViolation(
                        "path attempts to escape workspace".into(),
                    ));
                }
            }
            Component::CurDir => {}
            // Pushing a root or prefix replaces whatever came before.
            Component::RootDir | Component::Prefix(_) => normalized.push(component),
            Component::Normal(part) => normalized.push(part),
        }
    }

    let absolute = if normalized.is_absolute() {
        normalized
    } else {
        root.join(normalized)
    };

    if !absolute.starts_with(&root) {
        return Err(AppError::PathViolation(format!(
            "{} is outside the workspace",
            absolute.display()
        )));
    }

    if absolute.exists() {
        let canonical = absolute
            .canonicalize()
            .map_err(|err| AppError::PathViolation(format!("cannot resolve path: {err}")))?;

        if !canonical.starts_with(&root) {
            return Err(AppError::PathViolation(
                "symlink target escapes workspace".into(),
            ));
        }

        Ok(canonical)
    } else {
        Ok(absolute)
    }
}

/// Select `limit` lines starting at 1-based `line`.
///
/// Line endings are preserved; `None` means "from the start" / "to the end".
#[must_use]
pub fn slice_lines(content: &str, line: Option<u32>, limit: Option<u32>) -> String {
    if line.is_none() && limit.is_none() {
        return content.to_owned();
    }
    let to_usize = |n: u32| usize::try_from(n).unwrap_or(usize::MAX);
    let skip = line.map_or(0, |l| to_usize(l.saturating_sub(1)));
    let take = limit.map_or(usize::MAX, to_usize);
    content.split_inclusive('\n').skip(skip).take(take).collect()
}

/// Write `content` to `path` atomically, creating parent directories.
///
/// # Errors
///
/// Returns [`AppError::Io`] when a directory, the temporary file, or the
/// final rename fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<usize> {
    let parent = path
        .parent()
        .ok_or_else(|| AppError::Io(format!("{} has no parent directory", path.display())))?;

    std::fs::create_dir_all(parent).map_err(|err| {
        AppError::Io(format!(
            "failed to create parent directories for {}: {err}",
            path.display()
        ))
    })?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|err| AppError::Io(format!("failed to create temporary file: {err}")))?;

    let bytes = content.as_bytes();
    tmp.write_all(bytes)
        .map_err(|err| AppError::Io(format!("failed to write temporary file: {err}")))?;

    tmp.persist(path).map_err(|err| {
        AppError::Io(format!("failed to persist file to {}: {err}", path.display()))
    })?;

    Ok(bytes.len())
}

/// [`FileSystemHandler`] serving files under one workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceFiles {
    root: PathBuf,
}

impl WorkspaceFiles {
    /// Serve reads and writes under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a file, optionally restricted to a line window.
    ///
    /// # Errors
    ///
    /// [`AppError::PathViolation`] for paths outside the root,
    /// [`AppError::NotFound`] for missing files, [`AppError::Io`] otherwise.
    pub async fn read(&self, request: &ReadTextFileRequest) -> Result<String> {
        let path = validate_path(&self.root, &request.path)?;
        let content = tokio::fs::read_to_string(&path).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("{} does not exist", path.display()))
            } else {
                AppError::Io(format!("failed to read {}: {err}", path.display()))
            }
        })?;
        debug!(path = %path.display(), bytes = content.len(), "agent read file");
        Ok(slice_lines(&content, request.line, request.limit))
    }

    /// Replace a file's contents.
    ///
    /// # Errors
    ///
    /// [`AppError::PathViolation`] for paths outside the root,
    /// [`AppError::Io`] for write failures.
    pub async fn write(&self, request: &WriteTextFileRequest) -> Result<()> {
        let path = validate_path(&self.root, &request.path)?;
        let content = request.content.clone();
        let target = path.clone();
        let bytes = tokio::task::spawn_blocking(move || write_atomic(&target, &content))
            .await
            .map_err(|err| AppError::Io(format!("write task failed: {err}")))??;
        info!(path = %path.display(), bytes, "agent wrote file");
        Ok(())
    }
}

impl FileSystemHandler for WorkspaceFiles {
    fn read_text_file(&self, request: ReadTextFileRequest) -> HandlerFuture<'_, Result<String>> {
        Box::pin(async move { self.read(&request).await })
    }

    fn write_text_file(&self, request: WriteTextFileRequest) -> HandlerFuture<'_, Result<()>> {
        Box::pin(async move { self.write(&request).await })
    }
}
