//! Host-side resolution of the resources a model asks for.
//!
//! Not used by the viewer itself: the two-phase load leaves fetching to the
//! host, and this is the host the CLI uses.

use crate::assets::ResourceMap;
use crate::error::ErrorKind;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

const MAX_CACHED_EXTENSION_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("GET {url} returned HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("cannot resolve resource {id}: {reason}")]
    Unresolvable { id: String, reason: &'static str },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Unresolvable { .. } => ErrorKind::InvalidArgument,
            FetchError::Io { .. } | FetchError::Http { .. } | FetchError::Transport { .. } => ErrorKind::Io,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        FetchError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Where a model came from, and so where its relative resources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceBase {
    Directory(PathBuf),
    /// Always ends with `/`.
    Url(String),
}

/// A single resolved resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocation {
    File(PathBuf),
    Url(String),
}

impl ResourceLocation {
    /// Parses a model argument: http(s) URLs, `file://` URLs or plain paths.
    pub fn parse(location: &str) -> Self {
        if is_http_url(location) {
            ResourceLocation::Url(location.to_string())
        } else if let Some(path) = location.strip_prefix("file://") {
            ResourceLocation::File(PathBuf::from(percent_decode(path)))
        } else {
            ResourceLocation::File(PathBuf::from(location))
        }
    }

    /// The base that relative identifiers inside this resource resolve against.
    pub fn base(&self) -> ResourceBase {
        match self {
            ResourceLocation::File(path) => ResourceBase::Directory(
                path.parent().map(Path::to_path_buf).unwrap_or_default(),
            ),
            ResourceLocation::Url(url) => {
                let without_query = strip_query(url);
                let cut = without_query.rfind('/').map_or(without_query.len(), |i| i + 1);
                let mut base = without_query[..cut].to_string();
                if !base.ends_with('/') {
                    base.push('/');
                }
                ResourceBase::Url(base)
            }
        }
    }

    pub fn read(&self, cache: Option<&DownloadCache>) -> Result<Vec<u8>, FetchError> {
        match self {
            ResourceLocation::File(path) => fs::read(path).map_err(|err| FetchError::io(path, err)),
            ResourceLocation::Url(url) => match cache {
                Some(cache) => cache.get_or_download(url),
                None => download(url),
            },
        }
    }
}

impl ResourceBase {
    /// Resolves a resource identifier from a model document. `.` and `..`
    /// segments are folded away. A model served over http can only reach
    /// other URLs: absolute paths resolve against its origin and `file://`
    /// identifiers are refused.
    pub fn resolve(&self, id: &str) -> Result<ResourceLocation, FetchError> {
        if is_http_url(id) {
            return Ok(ResourceLocation::Url(id.to_string()));
        }
        match self {
            ResourceBase::Directory(dir) => {
                let path = match id.strip_prefix("file://") {
                    Some(path) => PathBuf::from(percent_decode(path)),
                    None => dir.join(percent_decode(id)),
                };
                Ok(ResourceLocation::File(normalize_path(&path)))
            }
            ResourceBase::Url(base) => {
                if id.starts_with("file://") {
                    return Err(FetchError::Unresolvable {
                        id: id.to_string(),
                        reason: "local file referenced by a remote model",
                    });
                }
                let (origin, base_path) = split_origin(base).ok_or_else(|| FetchError::Unresolvable {
                    id: id.to_string(),
                    reason: "base URL has no scheme",
                })?;
                let (path, suffix) = id.split_at(id.find(['?', '#']).unwrap_or(id.len()));
                let joined = if path.starts_with('/') {
                    path.to_string()
                } else {
                    format!("{base_path}{path}")
                };
                Ok(ResourceLocation::Url(format!(
                    "{origin}{}{suffix}",
                    normalize_url_path(&joined)
                )))
            }
        }
    }
}

/// Reads every identifier relative to `base`. Fails on the first resource
/// that cannot be read.
pub fn fetch_resources(
    base: &ResourceBase,
    ids: &[String],
    cache: Option<&DownloadCache>,
) -> Result<ResourceMap, FetchError> {
    let mut resources = ResourceMap::new();
    for id in ids {
        let location = base.resolve(id)?;
        log::debug!("fetching {id} from {location:?}");
        let bytes = location.read(cache)?;
        resources.insert(id.clone(), bytes);
    }
    log::info!(
        "fetched {} resources ({} bytes)",
        resources.len(),
        resources.total_bytes()
    );
    Ok(resources)
}

/// Downloads kept on disk, one file per URL named by the SHA-256 of the URL.
#[derive(Debug, Clone)]
pub struct DownloadCache {
    dir: PathBuf,
}

impl DownloadCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|err| FetchError::io(&dir, err))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        let mut name = format!("{:x}", Sha256::digest(url.as_bytes()));
        if let Some(ext) = cached_extension(url) {
            name.push('.');
            name.push_str(ext);
        }
        self.dir.join(name)
    }

    pub fn get_or_download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.path_for(url);
        if path.is_file() {
            log::debug!("cache hit for {url}");
            return fs::read(&path).map_err(|err| FetchError::io(&path, err));
        }
        let bytes = download(url)?;
        let partial = path.with_extension("part");
        fs::write(&partial, &bytes).map_err(|err| FetchError::io(&partial, err))?;
        fs::rename(&partial, &path).map_err(|err| FetchError::io(&path, err))?;
        Ok(bytes)
    }

    pub fn size_bytes(&self) -> Result<u64, FetchError> {
        let mut total = 0;
        for entry in fs::read_dir(&self.dir).map_err(|err| FetchError::io(&self.dir, err))? {
            let entry = entry.map_err(|err| FetchError::io(&self.dir, err))?;
            let metadata = entry
                .metadata()
                .map_err(|err| FetchError::io(&entry.path(), err))?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }

    pub fn clear(&self) -> Result<(), FetchError> {
        for entry in fs::read_dir(&self.dir).map_err(|err| FetchError::io(&self.dir, err))? {
            let path = entry.map_err(|err| FetchError::io(&self.dir, err))?.path();
            if path.is_file() {
                fs::remove_file(&path).map_err(|err| FetchError::io(&path, err))?;
            }
        }
        log::info!("cleared download cache at {}", self.dir.display());
        Ok(())
    }
}

fn download(url: &str) -> Result<Vec<u8>, FetchError> {
    log::info!("downloading {url}");
    let response = ureq::get(url).call().map_err(|err| match err {
        ureq::Error::Status(status, _) => FetchError::Http {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => FetchError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    })?;
    let status = response.status();
    if !(200..300).contains(&status) {
        return Err(FetchError::Http {
            url: url.to_string(),
            status,
        });
    }
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| FetchError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;
    Ok(bytes)
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Splits `scheme://host` from the path that follows it.
fn split_origin(url: &str) -> Option<(&str, &str)> {
    let authority = url.find("://")? + 3;
    let path_start = url[authority..].find('/').map_or(url.len(), |i| authority + i);
    Some(url.split_at(path_start))
}

/// Folds `.` and `..` out of a URL path. `..` stops at the root.
fn normalize_url_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut out = format!("/{}", segments.join("/"));
    let directory = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    if directory && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Lexical `.`/`..` folding; the filesystem is not consulted.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::CurDir | Component::ParentDir) | None => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn cached_extension(url: &str) -> Option<&str> {
    let last_segment = strip_query(url).rsplit('/').next()?;
    let (stem, ext) = last_segment.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= MAX_CACHED_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let decoded = match bytes.get(i..i + 3) {
            Some([b'%', hi, lo]) => std::str::from_utf8(&[*hi, *lo])
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok()),
            _ => None,
        };
        match decoded {
            Some(byte) => {
                out.push(byte);
                i += 3;
            }
            None => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
