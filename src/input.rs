//! Input resolution: turn a user-supplied path or URL into bytes plus a
//! declared name for the classifier.
//!
//! Nothing here trusts the name. It is only a hint; the content decides the
//! format.

use crate::error::ConvertError;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Input loaded into memory.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    pub bytes: Vec<u8>,
    /// File name from the path or URL, when there is one.
    pub declared_name: Option<String>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to bytes, downloading it when it is an HTTP(S) URL.
///
/// Reads at most `max_bytes`; anything larger is an
/// [`ConvertError::InvalidRequest`].
pub async fn resolve_input(
    input: &str,
    timeout: Duration,
    max_bytes: usize,
) -> Result<ResolvedInput, ConvertError> {
    if is_url(input) {
        download_url(input, timeout, max_bytes).await
    } else {
        read_local(Path::new(input), max_bytes).await
    }
}

async fn read_local(path: &Path, max_bytes: usize) -> Result<ResolvedInput, ConvertError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ConvertError::InvalidRequest(format!("file not found: {}", path.display()))
        }
        _ => ConvertError::workspace("read input", path, e),
    })?;
    if !meta.is_file() {
        return Err(ConvertError::InvalidRequest(format!(
            "not a regular file: {}",
            path.display()
        )));
    }
    if meta.len() > max_bytes as u64 {
        return Err(too_large(meta.len() as usize, max_bytes));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ConvertError::workspace("read input", path, e))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(ResolvedInput {
        bytes,
        declared_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned()),
    })
}

async fn download_url(
    url: &str,
    timeout: Duration,
    max_bytes: usize,
) -> Result<ResolvedInput, ConvertError> {
    info!("Downloading input from: {}", url);
    let failed =
        |reason: String| ConvertError::InvalidRequest(format!("download of {url} failed: {reason}"));

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {}s", timeout.as_secs()))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    if let Some(len) = response.content_length() {
        if len > max_bytes as u64 {
            return Err(too_large(len as usize, max_bytes));
        }
    }

    let declared_name = extract_filename(url);
    let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
    let mut stream = response.bytes_stream();
    // A missing or lying Content-Length must not let the body grow past
    // the limit.
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| failed(e.to_string()))?;
        let total = bytes.len() + chunk.len();
        if total > max_bytes {
            return Err(too_large(total, max_bytes));
        }
        bytes.extend_from_slice(&chunk);
    }

    info!("Downloaded {} bytes", bytes.len());
    Ok(ResolvedInput {
        bytes,
        declared_name,
    })
}

fn too_large(len: usize, max_bytes: usize) -> ConvertError {
    ConvertError::InvalidRequest(format!(
        "input is at least {len} bytes; the limit is {max_bytes}"
    ))
}

/// Last path segment of the URL, if it looks like a file name.
fn extract_filename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    (!last.is_empty() && last.contains('.')).then(|| last.to_string())
}
