//! JSON document loading from various sources.
//!
//! Handles loading schemas, ui-schemas and form data from files, strings,
//! and HTTP URLs.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.json())
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

/// Navigate a JSON Pointer fragment (e.g., "#/definitions/foo").
///
/// The fragment should start with '#'. Returns a copy of the target.
pub fn navigate_fragment(document: &Value, fragment: &str) -> Result<Value, LoadError> {
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(document.clone());
    }

    let mut current = document;
    for part in path.split('/') {
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        let key = part.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Array(arr) => key.parse::<usize>().ok().and_then(|i| arr.get(i)),
            other => other.get(&key),
        };
        current = next.ok_or_else(|| LoadError::FragmentNotFound {
            fragment: fragment.to_string(),
        })?;
    }
    Ok(current.clone())
}
