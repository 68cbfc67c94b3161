//! Model source resolution.
//!
//! A [`ModelSource`] is whatever the host handed over: a URL string, a
//! picked file, or a raw blob. [`SourceResolver::resolve`] turns it into
//! bytes, a URL naming them and a detected [`ModelFormat`]. Files and blobs
//! are registered as temporary object URLs; the returned [`ObjectUrl`]
//! guard revokes the URL when dropped, on success and error paths alike.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use base64::Engine as _;

use crate::error::SourceError;
use crate::format::{detect_model_format, ModelFormat};

/// Scheme prefix of object URLs minted by [`ObjectUrlStore`].
pub const OBJECT_URL_PREFIX: &str = "blob:meshcrop/";

/// Input handed to the loader.
#[derive(Clone, PartialEq)]
pub enum ModelSource {
    /// Plain, `data:` or `blob:` URL.
    Url(String),
    /// A named file and its contents.
    File {
        /// Filename as picked by the user.
        name: String,
        /// MIME type declared by the host, if any.
        mime: Option<String>,
        /// File contents.
        bytes: Vec<u8>,
    },
    /// Anonymous binary data.
    Blob {
        /// MIME type declared by the host, if any.
        mime: Option<String>,
        /// Blob contents.
        bytes: Vec<u8>,
    },
}

impl ModelSource {
    /// URL source.
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// File source without a declared MIME type.
    pub fn file(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::File {
            name: name.into(),
            mime: None,
            bytes,
        }
    }

    /// Blob source without a declared MIME type.
    pub fn blob(bytes: Vec<u8>) -> Self {
        Self::Blob { mime: None, bytes }
    }

    /// Attach a declared MIME type. No effect on URL sources.
    pub fn with_mime(mut self, declared: impl Into<String>) -> Self {
        match &mut self {
            Self::File { mime, .. } | Self::Blob { mime, .. } => *mime = Some(declared.into()),
            Self::Url(_) => {}
        }
        self
    }
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) if url.starts_with("data:") => {
                write!(f, "Url(data: {} bytes)", url.len())
            }
            Self::Url(url) => write!(f, "Url({url})"),
            Self::File { name, mime, bytes } => {
                write!(f, "File({name}, {mime:?}, {} bytes)", bytes.len())
            }
            Self::Blob { mime, bytes } => write!(f, "Blob({mime:?}, {} bytes)", bytes.len()),
        }
    }
}

#[derive(Clone)]
struct ObjectEntry {
    mime: Option<String>,
    bytes: Rc<[u8]>,
}

type ObjectMap = RefCell<HashMap<String, ObjectEntry>>;

/// Registry of temporary object URLs.
///
/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct ObjectUrlStore {
    entries: Rc<ObjectMap>,
}

impl ObjectUrlStore {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` under a fresh URL.
    pub fn create(&self, bytes: Rc<[u8]>, mime: Option<String>) -> ObjectUrl {
        let url = format!("{OBJECT_URL_PREFIX}{}", uuid::Uuid::new_v4());
        self.entries
            .borrow_mut()
            .insert(url.clone(), ObjectEntry { mime, bytes });
        tracing::trace!(%url, "object URL created");
        ObjectUrl {
            url,
            store: Rc::downgrade(&self.entries),
        }
    }

    /// Contents and declared MIME type behind `url`.
    pub fn get(&self, url: &str) -> Option<(Rc<[u8]>, Option<String>)> {
        self.entries
            .borrow()
            .get(url)
            .map(|entry| (Rc::clone(&entry.bytes), entry.mime.clone()))
    }

    /// Forget `url`. Returns whether it was registered.
    pub fn revoke(&self, url: &str) -> bool {
        revoke(&self.entries, url)
    }

    /// Number of live URLs.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True when no URL is live.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for ObjectUrlStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectUrlStore")
            .field("live", &self.len())
            .finish()
    }
}

fn revoke(entries: &ObjectMap, url: &str) -> bool {
    let removed = entries.borrow_mut().remove(url).is_some();
    if removed {
        tracing::trace!(%url, "object URL revoked");
    }
    removed
}

/// A live object URL, revoked on drop.
pub struct ObjectUrl {
    url: String,
    store: Weak<ObjectMap>,
}

impl ObjectUrl {
    /// The URL string.
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.url).finish()
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        if let Some(entries) = self.store.upgrade() {
            revoke(&entries, &self.url);
        }
    }
}

/// Bytes returned by a [`Fetcher`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedBytes {
    /// Response body.
    pub bytes: Vec<u8>,
    /// `Content-Type` reported by the server, if any.
    pub content_type: Option<String>,
}

/// Host capability for reading remote URLs.
///
/// Implementations run on the host's event loop; nothing here requires
/// `Send`.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// Fetch the full body of `url`.
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, SourceError>;
}

/// Fetcher for hosts without network access. Every fetch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBytes, SourceError> {
        Err(SourceError::Offline(url.to_string()))
    }
}

/// A source turned into bytes.
#[derive(Debug)]
pub struct ResolvedSource {
    /// URL naming the bytes: the original URL, or a minted object URL.
    pub url: String,
    /// Detected container format.
    pub format: ModelFormat,
    /// Model contents.
    pub bytes: Rc<[u8]>,
    /// Temporary object URL owned by this resolution, if one was minted.
    pub object_url: Option<ObjectUrl>,
}

/// Turns [`ModelSource`]s into [`ResolvedSource`]s.
pub struct SourceResolver<F> {
    fetcher: F,
    object_urls: ObjectUrlStore,
}

impl<F: Fetcher> SourceResolver<F> {
    /// Resolver with its own object URL registry.
    pub fn new(fetcher: F) -> Self {
        Self::with_object_urls(fetcher, ObjectUrlStore::new())
    }

    /// Resolver sharing an existing object URL registry.
    pub fn with_object_urls(fetcher: F, object_urls: ObjectUrlStore) -> Self {
        Self {
            fetcher,
            object_urls,
        }
    }

    /// Object URL registry used for files, blobs and the URLs minted for them.
    pub fn object_urls(&self) -> &ObjectUrlStore {
        &self.object_urls
    }

    /// The fetcher for remote URLs.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Read the source and detect its format.
    pub async fn resolve(&self, source: ModelSource) -> Result<ResolvedSource, SourceError> {
        match source {
            ModelSource::Url(url) => self.resolve_url(url).await,
            ModelSource::File { name, mime, bytes } => {
                Ok(self.register(Some(name.as_str()), mime, bytes))
            }
            ModelSource::Blob { mime, bytes } => Ok(self.register(None, mime, bytes)),
        }
    }

    fn register(&self, name: Option<&str>, mime: Option<String>, bytes: Vec<u8>) -> ResolvedSource {
        let format = detect_model_format(name, mime.as_deref(), Some(bytes.as_slice()));
        let bytes: Rc<[u8]> = bytes.into();
        let object_url = self.object_urls.create(Rc::clone(&bytes), mime);
        tracing::debug!(url = object_url.as_str(), %format, len = bytes.len(), "registered local source");
        ResolvedSource {
            url: object_url.as_str().to_string(),
            format,
            bytes,
            object_url: Some(object_url),
        }
    }

    async fn resolve_url(&self, url: String) -> Result<ResolvedSource, SourceError> {
        if url.starts_with("data:") {
            let (mime, bytes) = decode_data_url(&url)?;
            let format = detect_model_format(None, mime.as_deref(), Some(bytes.as_slice()));
            return Ok(ResolvedSource {
                url,
                format,
                bytes: bytes.into(),
                object_url: None,
            });
        }

        // Only our own object URLs live in the store. Host-minted `blob:`
        // URLs are readable through the fetcher like any other URL.
        if url.starts_with(OBJECT_URL_PREFIX) {
            let (bytes, mime) = self
                .object_urls
                .get(&url)
                .ok_or_else(|| SourceError::UnknownObjectUrl(url.clone()))?;
            let format = detect_model_format(None, mime.as_deref(), Some(&bytes[..]));
            return Ok(ResolvedSource {
                url,
                format,
                bytes,
                object_url: None,
            });
        }

        let fetched = self.fetcher.fetch(&url).await?;
        let format = detect_model_format(
            Some(url.as_str()),
            fetched.content_type.as_deref(),
            Some(fetched.bytes.as_slice()),
        );
        tracing::debug!(%url, %format, len = fetched.bytes.len(), "fetched remote source");
        Ok(ResolvedSource {
            url,
            format,
            bytes: fetched.bytes.into(),
            object_url: None,
        })
    }

    /// Read a file that the model at `base` refers to by `reference`, such
    /// as a glTF buffer stored next to the `.gltf`.
    pub async fn resolve_reference(
        &self,
        base: &str,
        reference: &str,
    ) -> Result<ResolvedSource, SourceError> {
        let url = join_url(base, reference).ok_or_else(|| SourceError::UnresolvableReference {
            reference: reference.to_string(),
            base: truncate(base),
        })?;
        tracing::debug!(%url, "resolving external reference");
        self.resolve_url(url).await
    }
}

impl<F> fmt::Debug for SourceResolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceResolver")
            .field("object_urls", &self.object_urls)
            .finish_non_exhaustive()
    }
}

/// Split a `data:[<mime>][;base64],<payload>` URL into MIME type and bytes.
pub fn decode_data_url(url: &str) -> Result<(Option<String>, Vec<u8>), SourceError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| SourceError::MalformedDataUrl(truncate(url)))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| SourceError::MalformedDataUrl(truncate(url)))?;

    let mut parts = meta.split(';');
    let mime = parts
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let is_base64 = parts.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        base64::engine::general_purpose::STANDARD.decode(payload.trim())?
    } else {
        percent_decode(payload)
    };
    Ok((mime, bytes))
}

/// Resolve `reference` against `base` the way a browser resolves a link
/// inside a document.
///
/// Absolute references are returned unchanged. `None` means `base` cannot
/// anchor relative references: `data:` and `blob:` URLs, or anything
/// without a `scheme://` prefix.
pub fn join_url(base: &str, reference: &str) -> Option<String> {
    if has_scheme(reference) {
        return Some(reference.to_string());
    }
    if base.starts_with("data:") || base.starts_with("blob:") {
        return None;
    }
    let (scheme, rest) = base.split_once("://")?;
    if let Some(network_path) = reference.strip_prefix("//") {
        return Some(format!("{scheme}://{network_path}"));
    }

    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let path = if reference.starts_with('/') {
        reference.to_string()
    } else {
        let dir = path.rfind('/').map_or("/", |i| &path[..=i]);
        format!("{dir}{reference}")
    };
    Some(format!("{scheme}://{authority}{}", remove_dot_segments(&path)))
}

fn has_scheme(reference: &str) -> bool {
    let Some((scheme, _)) = reference.split_once(':') else {
        return false;
    };
    // Single letters are drive names, not schemes.
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn remove_dot_segments(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());
    for (i, segment) in segments.iter().enumerate() {
        match *segment {
            "." | ".." => {
                // Never pop the empty segment before the leading slash.
                if *segment == ".." && out.len() > 1 {
                    out.pop();
                }
                if i == last {
                    out.push("");
                }
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

fn percent_decode(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn truncate(url: &str) -> String {
    url.chars().take(48).collect()
}
