//! `scratch` Lua API: file access confined to one directory.
//!
//! ```lua
//! scratch.write("notes/summary.txt", text)
//! local text = scratch.read("notes/summary.txt")
//! if scratch.exists("cache.json") then ... end
//! for _, name in ipairs(scratch.list()) do ... end
//! ```
//!
//! Only registered when a scratch directory is configured. File work runs
//! on the blocking pool, and the bytes one execution may write are capped.

use mlua::prelude::*;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolves script-supplied paths inside the scratch root.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
    max_bytes: usize,
    /// Bytes written so far, shared by every clone
    written: Arc<AtomicUsize>,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
            written: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn bytes_written(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path. Absolute paths, drive prefixes and `..`
    /// components are rejected, and so is anything that escapes the root
    /// through a symlink.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        if path.is_empty() {
            return Err("scratch path must not be empty".to_string());
        }
        let relative = Path::new(path);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Err(format!("scratch path '{}' must not contain '..'", path));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!("scratch path '{}' must be relative", path));
                }
            }
        }

        let resolved = self.root.join(relative);
        // Existing prefixes must stay under the canonical root
        let root = self
            .root
            .canonicalize()
            .map_err(|e| format!("scratch directory unavailable: {}", e))?;
        let mut existing = resolved.as_path();
        while !existing.exists() {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        if let Ok(canonical) = existing.canonicalize()
            && !canonical.starts_with(&root)
        {
            return Err(format!("scratch path '{}' escapes the scratch directory", path));
        }
        Ok(resolved)
    }

    pub fn read(&self, path: &str) -> Result<String, String> {
        let file = self.resolve(path)?;
        std::fs::read_to_string(&file).map_err(|e| format!("scratch.read '{}': {}", path, e))
    }

    /// Write `text`, counting it against the byte cap. Overwrites count in
    /// full; a failed write gives its bytes back.
    pub fn write(&self, path: &str, text: &[u8]) -> Result<(), String> {
        let file = self.resolve(path)?;
        self.reserve(path, text.len())?;
        let written = file
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| std::fs::write(&file, text));
        written.map_err(|e| {
            self.written.fetch_sub(text.len(), Ordering::SeqCst);
            format!("scratch.write '{}': {}", path, e)
        })
    }

    fn reserve(&self, path: &str, len: usize) -> Result<(), String> {
        self.written
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |written| {
                written
                    .checked_add(len)
                    .filter(|total| *total <= self.max_bytes)
            })
            .map(|_| ())
            .map_err(|written| {
                format!(
                    "scratch.write '{}': {} more bytes would exceed the limit of {} ({} written)",
                    path, len, self.max_bytes, written
                )
            })
    }

    pub fn exists(&self, path: &str) -> Result<bool, String> {
        Ok(self.resolve(path)?.exists())
    }

    /// Relative paths of all files, sorted
    pub fn list(&self) -> Result<Vec<String>, String> {
        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files)
            .map_err(|e| format!("scratch.list: {}", e))?;
        files.sort();
        Ok(files)
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();
        if file_type.is_dir() {
            collect_files(root, &path, files)?;
        } else if file_type.is_file()
            && let Ok(relative) = path.strip_prefix(root)
        {
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

/// Run a file operation on the blocking pool.
async fn blocking<T, F>(op: F) -> LuaResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| LuaError::external(format!("scratch: {}", e)))?
        .map_err(LuaError::external)
}

/// Register the `scratch` table.
pub fn register_scratch_api(lua: &Lua, scratch: ScratchDir) -> LuaResult<()> {
    let table = lua.create_table()?;

    let dir = scratch.clone();
    table.set(
        "read",
        lua.create_async_function(move |_, path: String| {
            let dir = dir.clone();
            blocking(move || dir.read(&path))
        })?,
    )?;

    let dir = scratch.clone();
    table.set(
        "write",
        lua.create_async_function(move |_, (path, text): (String, LuaString)| {
            let dir = dir.clone();
            let text = text.as_bytes().to_vec();
            blocking(move || dir.write(&path, &text))
        })?,
    )?;

    let dir = scratch.clone();
    table.set(
        "exists",
        lua.create_async_function(move |_, path: String| {
            let dir = dir.clone();
            blocking(move || dir.exists(&path))
        })?,
    )?;

    let dir = scratch;
    table.set(
        "list",
        lua.create_async_function(move |_, ()| {
            let dir = dir.clone();
            blocking(move || dir.list())
        })?,
    )?;

    lua.globals().set("scratch", table)
}
