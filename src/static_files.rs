// Static file mounts

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::http::{HttpRequest, HttpResponse};
use crate::mounted::join_paths;

/// Serves the files under one static mount.
#[async_trait]
pub trait StaticApp: Send + Sync {
    /// `rel_path` is the request path with the mount prefix stripped.
    async fn serve(&self, request: &HttpRequest, rel_path: &str) -> Result<HttpResponse, Error>;
}

/// Where a static mount points.
#[derive(Clone)]
pub enum StaticTarget {
    /// A local handler, normally a [`DirectoryApp`].
    App(Arc<dyn StaticApp>),
    /// An external base URL. Used only for URL generation; a local
    /// request under the prefix is a 404.
    External(String),
}

#[derive(Clone)]
pub struct StaticMount {
    pub prefix: String,
    pub target: StaticTarget,
}

/// Static mounts, matched by longest prefix.
#[derive(Default, Clone)]
pub struct StaticMounts {
    mounts: Vec<StaticMount>,
}

impl StaticMounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, prefix: impl Into<String>, target: StaticTarget) {
        let mut prefix = prefix.into();
        if !prefix.starts_with('/') {
            prefix.insert(0, '/');
        }
        let prefix = prefix.trim_end_matches('/').to_string();
        self.mounts.push(StaticMount { prefix, target });
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Find the mount covering `path`, preferring the longest prefix.
    /// Returns the mount and the path relative to it.
    pub fn find<'a>(&'a self, path: &'a str) -> Option<(&'a StaticMount, &'a str)> {
        self.mounts
            .iter()
            .filter(|m| {
                path == m.prefix
                    || path
                        .strip_prefix(m.prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|m| m.prefix.len())
            .map(|m| {
                let rel = path[m.prefix.len()..].trim_start_matches('/');
                (m, rel)
            })
    }

    /// Generate the URL for a file under a mount. External mounts join
    /// onto their base URL.
    pub fn static_path(&self, prefix: &str, rel: &str) -> Result<String, Error> {
        let normalized = format!("/{}", prefix.trim_matches('/'));
        let mount = self
            .mounts
            .iter()
            .find(|m| m.prefix == normalized)
            .ok_or_else(|| {
                Error::PathFormat(format!("no static mount at prefix {prefix}"))
            })?;
        Ok(match &mount.target {
            StaticTarget::App(_) => join_paths(&mount.prefix, rel),
            StaticTarget::External(base) => {
                format!("{}/{}", base.trim_end_matches('/'), rel.trim_start_matches('/'))
            }
        })
    }
}

/// Serves files from a directory root, rejecting path traversal.
pub struct DirectoryApp {
    root: PathBuf,
    index_file: Option<String>,
}

impl DirectoryApp {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_file: Some("index.html".to_string()),
        }
    }

    pub fn with_index_file(mut self, index: Option<String>) -> Self {
        self.index_file = index;
        self
    }

    fn resolve(&self, rel_path: &str) -> Result<PathBuf, Error> {
        let clean = rel_path.trim_start_matches('/');
        let full = self.root.join(clean);

        let canonical_root = self
            .root
            .canonicalize()
            .map_err(|_| Error::Internal("static root directory is unreadable".to_string()))?;
        let canonical = full
            .canonicalize()
            .map_err(|_| Error::NotFound(format!("/{clean}")))?;
        if !canonical.starts_with(&canonical_root) {
            return Err(Error::abort(403, "path escapes the static root"));
        }
        Ok(canonical)
    }
}

#[async_trait]
impl StaticApp for DirectoryApp {
    async fn serve(&self, request: &HttpRequest, rel_path: &str) -> Result<HttpResponse, Error> {
        let mut path = self.resolve(rel_path)?;
        if path.is_dir() {
            match &self.index_file {
                Some(index) => path = path.join(index),
                None => return Err(Error::NotFound(request.path.clone())),
            }
        }
        let body = tokio::fs::read(&path)
            .await
            .map_err(|_| Error::NotFound(request.path.clone()))?;
        Ok(HttpResponse::ok()
            .with_header("Content-Type", mime_type_for(&path))
            .with_body(body))
    }
}

/// Content type from the file extension.
pub fn mime_type_for(path: &Path) -> String {
    let ext = path.extension().and_then(|e| e.to_str());
    match ext {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("pdf") => "application/pdf",
        Some("wasm") => "application/wasm",
        _ => "application/octet-stream",
    }
    .to_string()
}
