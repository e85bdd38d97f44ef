//! File tools: read, write, list and delete files inside a sandbox directory.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use toolhost::{
    Arguments, Capability, Handler, HandlerError, HandlerResult, InputContract, ParamSpec,
};

use super::parse_args;

/// A directory that file tools may not leave.
///
/// Paths are interpreted relative to the root. Absolute paths, `..`
/// components and symlinks resolving outside the root are refused.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub size: Option<u64>,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root if needed and return its canonical form.
    fn canonical_root(&self) -> HandlerResult<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        Ok(self.root.canonicalize()?)
    }

    /// Map a caller-supplied relative path to a location inside the root.
    pub fn resolve(&self, relative: &str) -> HandlerResult<PathBuf> {
        let requested = Path::new(relative);
        if requested.is_absolute() {
            return Err(HandlerError::new(format!(
                "absolute paths are not allowed: {relative}"
            )));
        }
        for component in requested.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(HandlerError::new(format!(
                        "path outside allowed directory: {relative}"
                    )))
                }
            }
        }

        let root = self.canonical_root()?;
        let full = root.join(requested);

        // Follow whatever part of the path already exists and make sure it stays inside.
        let mut existing = full.as_path();
        while existing.symlink_metadata().is_err() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        let real = existing.canonicalize()?;
        if !real.starts_with(&root) {
            return Err(HandlerError::new(format!(
                "path outside allowed directory: {relative}"
            )));
        }
        Ok(full)
    }

    fn display_path(&self, root: &Path, path: &Path) -> String {
        path.strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn read(&self, relative: &str) -> HandlerResult<Value> {
        let path = self.resolve(relative)?;
        if !path.is_file() {
            return Err(HandlerError::new(format!("File not found: {relative}")));
        }
        let bytes = std::fs::read(&path)?;
        let size = bytes.len();
        let (content, encoding) = match String::from_utf8(bytes) {
            Ok(text) => (text, "utf-8"),
            Err(e) => (
                base64::engine::general_purpose::STANDARD.encode(e.into_bytes()),
                "base64",
            ),
        };
        tracing::info!("Read file: {relative}");
        Ok(json!({
            "path": relative,
            "content": content,
            "encoding": encoding,
            "size": size,
        }))
    }

    pub fn write(&self, relative: &str, content: &str) -> HandlerResult<Value> {
        let path = self.resolve(relative)?;
        if path.is_dir() {
            return Err(HandlerError::new(format!("Path is a directory: {relative}")));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        tracing::info!("Wrote file: {relative}");
        Ok(json!({
            "path": relative,
            "bytes_written": content.len(),
        }))
    }

    /// Entries of a directory, sorted by name.
    pub fn list(&self, relative: &str) -> HandlerResult<Vec<FileEntry>> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Err(HandlerError::new(format!("Directory not found: {relative}")));
        }
        if !path.is_dir() {
            return Err(HandlerError::new(format!(
                "Path is not a directory: {relative}"
            )));
        }

        let root = self.canonical_root()?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: self.display_path(&root, &entry.path()),
                kind: if metadata.is_dir() { "directory" } else { "file" },
                size: metadata.is_file().then(|| metadata.len()),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!("Listed {} entries in {relative}", entries.len());
        Ok(entries)
    }

    pub fn delete(&self, relative: &str) -> HandlerResult<Value> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Err(HandlerError::new(format!("File not found: {relative}")));
        }
        if path.is_dir() {
            return Err(HandlerError::new(format!(
                "Path is a directory, not a file: {relative}"
            )));
        }
        std::fs::remove_file(&path)?;
        tracing::info!("Deleted file: {relative}");
        Ok(json!({ "path": relative, "deleted": true }))
    }
}

/// Run blocking file-system work off the async workers.
async fn blocking<F>(work: F) -> HandlerResult<Value>
where
    F: FnOnce() -> HandlerResult<Value> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| HandlerError::new(format!("file task failed: {e}")))?
}

#[derive(Debug, Deserialize)]
struct PathParams {
    path: String,
}

#[derive(Debug, Deserialize)]
struct WriteParams {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    directory: String,
}

struct ReadFile(Arc<Sandbox>);
struct WriteFile(Arc<Sandbox>);
struct ListFiles(Arc<Sandbox>);
struct DeleteFile(Arc<Sandbox>);

#[async_trait]
impl Handler for ReadFile {
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        let params: PathParams = parse_args(args)?;
        let sandbox = Arc::clone(&self.0);
        blocking(move || sandbox.read(&params.path)).await
    }
}

#[async_trait]
impl Handler for WriteFile {
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        let params: WriteParams = parse_args(args)?;
        let sandbox = Arc::clone(&self.0);
        blocking(move || sandbox.write(&params.path, &params.content)).await
    }
}

#[async_trait]
impl Handler for ListFiles {
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        let params: ListParams = parse_args(args)?;
        let sandbox = Arc::clone(&self.0);
        blocking(move || {
            let entries = sandbox.list(&params.directory)?;
            Ok(json!({
                "directory": params.directory,
                "count": entries.len(),
                "entries": entries,
            }))
        })
        .await
    }
}

#[async_trait]
impl Handler for DeleteFile {
    async fn call(&self, args: Arguments) -> HandlerResult<Value> {
        let params: PathParams = parse_args(args)?;
        let sandbox = Arc::clone(&self.0);
        blocking(move || sandbox.delete(&params.path)).await
    }
}

fn path_param() -> ParamSpec {
    ParamSpec::string("path")
        .required()
        .description("Path relative to the data directory")
}

pub fn read_file(sandbox: Arc<Sandbox>) -> Capability {
    Capability::tool(
        "read_file",
        InputContract::new().param(path_param()),
        Arc::new(ReadFile(sandbox)),
    )
    .with_description("Read the contents of a file in the data directory")
}

pub fn write_file(sandbox: Arc<Sandbox>) -> Capability {
    Capability::tool(
        "write_file",
        InputContract::new()
            .param(path_param())
            .param(
                ParamSpec::string("content")
                    .required()
                    .description("Content to write"),
            ),
        Arc::new(WriteFile(sandbox)),
    )
    .with_description("Write content to a file, creating parent directories")
}

pub fn list_files(sandbox: Arc<Sandbox>) -> Capability {
    Capability::tool(
        "list_files",
        InputContract::new().param(
            ParamSpec::string("directory")
                .default(".")
                .description("Directory relative to the data directory"),
        ),
        Arc::new(ListFiles(sandbox)),
    )
    .with_description("List files and directories")
}

pub fn delete_file(sandbox: Arc<Sandbox>) -> Capability {
    Capability::tool(
        "delete_file",
        InputContract::new().param(path_param()),
        Arc::new(DeleteFile(sandbox)),
    )
    .with_description("Delete a file in the data directory")
}
