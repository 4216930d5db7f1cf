//! Result types returned by the [`crate::Converter`].

use crate::engine::EngineKind;
use crate::format::{Format, FormatDescriptor};
use crate::job::{JobId, StatusChange};
use crate::route::ConversionRoute;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One produced file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// File name derived from the declared input name, e.g. `report-2.png`.
    pub name: String,
    pub format: Format,
    pub media_type: String,
    /// 1-indexed page for per-page output; `None` for single-file output.
    pub page: Option<usize>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub(crate) fn new(name: String, format: Format, page: Option<usize>, bytes: Vec<u8>) -> Self {
        let (width, height) = match header_dimensions(format, &bytes) {
            Some((w, h)) => (Some(w), Some(h)),
            None => (None, None),
        };
        Self {
            name,
            format,
            media_type: format.media_type().to_string(),
            page,
            width,
            height,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Pixel dimensions from the image header; no full decode.
fn header_dimensions(format: Format, bytes: &[u8]) -> Option<(u32, u32)> {
    if !format.is_raster() {
        return None;
    }
    image::ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

static UNSAFE_NAME_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// File-name stem for artifacts, derived from the declared input name.
pub(crate) fn artifact_stem(declared_name: Option<&str>) -> String {
    let stem = declared_name
        .and_then(|n| Path::new(n).file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned = UNSAFE_NAME_CHARS.replace_all(&stem, "_");
    let cleaned: String = cleaned.trim_start_matches('.').chars().take(100).collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Artifact name `<stem>.<ext>` or `<stem>-<page>.<ext>`.
pub(crate) fn artifact_name(stem: &str, format: Format, page: Option<usize>) -> String {
    match page {
        Some(p) => format!("{stem}-{p}.{}", format.extension()),
        None => format!("{stem}.{}", format.extension()),
    }
}

/// Everything a successful job returns.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub job_id: JobId,
    pub source: FormatDescriptor,
    pub target: Format,
    pub route: ConversionRoute,
    pub artifacts: Vec<Artifact>,
    pub stats: ConversionStats,
    pub history: Vec<StatusChange>,
}

/// Timing and size figures for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub hops: Vec<HopReport>,
    pub total_duration_ms: u64,
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// What one hop did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopReport {
    /// 1-indexed position in the route.
    pub index: usize,
    pub engine: EngineKind,
    pub input: Format,
    pub output: Format,
    /// 2 when the hop was retried.
    pub attempts: u32,
    pub duration_ms: u64,
    /// Files produced.
    pub outputs: usize,
}

/// Result of probing one engine binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub engine: EngineKind,
    pub program: PathBuf,
    /// How the binary was found (`env:file`, `path`, `fallback`, …).
    pub source: String,
    pub available: bool,
    /// First line of the version output.
    pub version: Option<String>,
    pub detail: Option<String>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}
