use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleRegistry};
use crate::host::{DocumentHost, Location, PictureSpec};
use crate::scope::{self, Scope};

pub const INLINE_WRAP: &str = "inline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Url,
    Base64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct FetchError(pub String);

/// Retrieves picture bytes for `url` sources.
pub trait PictureFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureLimits {
    pub allow_remote: bool,
    pub max_bytes: usize,
}

impl Default for PictureLimits {
    fn default() -> Self {
        Self {
            allow_remote: true,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Produces the base64 payload the host expects from a caller-supplied source.
pub fn load_payload(
    kind: SourceKind,
    data: &str,
    limits: &PictureLimits,
    fetcher: Option<&dyn PictureFetcher>,
) -> BridgeResult<String> {
    match kind {
        SourceKind::Base64 => {
            let cleaned = strip_data_url(data)
                .chars()
                .filter(|ch| !ch.is_ascii_whitespace())
                .collect::<String>();
            if cleaned.is_empty() {
                return Err(BridgeError::invalid("picture data is empty"));
            }
            let bytes = STANDARD
                .decode(cleaned.as_bytes())
                .map_err(|err| BridgeError::invalid(format!("picture data is not valid base64: {err}")))?;
            check_size(bytes.len(), limits)?;
            debug!(bytes = bytes.len(), format = detect_format(&bytes), "picture decoded");
            Ok(cleaned)
        }
        SourceKind::Url => {
            if data.trim().is_empty() {
                return Err(BridgeError::invalid("picture url is empty"));
            }
            if !limits.allow_remote {
                return Err(BridgeError::Permission(
                    "remote picture sources are disabled".to_string(),
                ));
            }
            let fetcher = fetcher.ok_or_else(|| {
                BridgeError::Unsupported("no picture fetcher is configured".to_string())
            })?;
            let bytes = fetcher
                .fetch(data.trim())
                .map_err(|err| BridgeError::Runtime(format!("failed to fetch '{data}': {err}")))?;
            if bytes.is_empty() {
                return Err(BridgeError::Runtime(format!("'{data}' returned no data")));
            }
            check_size(bytes.len(), limits)?;
            debug!(bytes = bytes.len(), format = detect_format(&bytes), "picture fetched");
            Ok(STANDARD.encode(bytes))
        }
    }
}

pub fn insert(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
    scope: &Scope,
    location: Location,
    picture: &PictureSpec,
) -> BridgeResult<Handle> {
    for (name, value) in [("width", picture.width), ("height", picture.height)] {
        if let Some(value) = value {
            if value.is_nan() || value <= 0.0 {
                return Err(BridgeError::invalid(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
    }

    let resolved = scope::resolve(scope, host, registry)?;
    let inserted = host.insert_picture(resolved.range, picture, location);
    resolved.release(host);
    let inserted = inserted?;
    if let Err(err) = host.sync() {
        host.release_range(inserted);
        return Err(err.into());
    }
    Ok(registry.register_range(inserted))
}

fn strip_data_url(data: &str) -> &str {
    let trimmed = data.trim();
    match trimmed.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => trimmed,
    }
}

fn check_size(len: usize, limits: &PictureLimits) -> BridgeResult<()> {
    if len > limits.max_bytes {
        return Err(BridgeError::invalid(format!(
            "picture is {len} bytes, above the {} byte limit",
            limits.max_bytes
        )));
    }
    Ok(())
}

fn detect_format(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "png",
        [0xFF, 0xD8, 0xFF, ..] => "jpeg",
        [b'G', b'I', b'F', b'8', ..] => "gif",
        [b'B', b'M', ..] => "bmp",
        [b'<', ..] => "svg",
        _ => "unknown",
    }
}
