//! Configuration types for the conversion orchestrator.
//!
//! Two layers, with different lifetimes:
//!
//! * [`ConverterConfig`] is fixed when a [`crate::Converter`] is built: where
//!   workspaces live, how many jobs may run at once, per-engine timeouts and
//!   which engine binaries to launch. Built via [`ConverterConfigBuilder`].
//! * [`ConversionOptions`] travel with each request: page selection,
//!   resolution, quality, resize.
//!
//! Builder setters clamp obviously-wrong values; `build()` and
//! [`ConversionOptions::validate`] reject whatever clamping cannot fix, with
//! [`ConvertError::InvalidRequest`].

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Resolution range accepted for rasterisation.
pub const DPI_RANGE: std::ops::RangeInclusive<u32> = 72..=1200;

/// Largest border accepted by [`ConversionOptions::trim_margins`].
pub const MAX_TRIM_PADDING: u32 = 1000;

/// Configuration for a [`crate::Converter`].
///
/// # Example
/// ```rust
/// use docforge::ConverterConfig;
/// use std::time::Duration;
///
/// let config = ConverterConfig::builder()
///     .max_concurrent_jobs(8)
///     .office_timeout(Duration::from_secs(90))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Directory under which every job gets its own subtree. Created on
    /// demand. Default: `$TMPDIR/docforge`.
    pub workspace_root: PathBuf,

    /// Jobs allowed to run at the same time. Default: 4.
    ///
    /// A job runs at most one engine process at a time, so this is also the
    /// bound on concurrent engine processes.
    pub max_concurrent_jobs: usize,

    /// What happens to a job that arrives while all slots are busy.
    pub admission: AdmissionPolicy,

    /// Per-hop timeout for LibreOffice. Default: 120 s.
    pub office_timeout: Duration,

    /// Per-hop timeout for Ghostscript. Default: 60 s.
    pub pdf_timeout: Duration,

    /// Per-hop timeout for ImageMagick. Default: 60 s.
    pub image_timeout: Duration,

    /// How long to wait for a killed engine to be reaped. Default: 5 s.
    pub kill_grace: Duration,

    /// Bytes of engine stderr kept in error diagnostics. Default: 4096.
    pub diagnostic_limit: usize,

    /// Retry an Office hop once after a timeout. Default: true.
    ///
    /// LibreOffice can hang on its first launch with a fresh user profile;
    /// this is the only failure that is ever retried.
    pub retry_office_timeout: bool,

    /// Largest accepted input. Default: 256 MiB.
    pub max_input_bytes: usize,

    /// Rasterisation resolution for WMF/EMF sources, which carry no useful
    /// page size of their own. Default: 300.
    pub metafile_dpi: u32,

    /// Deliver PNG when WebP is requested but the ImageMagick build cannot
    /// write it. When false such requests fail with `UnsupportedConversion`.
    /// Default: true.
    pub webp_fallback: bool,

    /// Explicit engine binaries. Unset entries are discovered.
    pub engines: EngineBinaries,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("docforge"),
            max_concurrent_jobs: 4,
            admission: AdmissionPolicy::default(),
            office_timeout: Duration::from_secs(120),
            pdf_timeout: Duration::from_secs(60),
            image_timeout: Duration::from_secs(60),
            kill_grace: Duration::from_secs(5),
            diagnostic_limit: 4096,
            retry_office_timeout: true,
            max_input_bytes: 256 * 1024 * 1024,
            metafile_dpi: 300,
            webp_fallback: true,
            engines: EngineBinaries::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("workspace_root", &self.workspace_root)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("admission", &self.admission)
            .field("office_timeout", &self.office_timeout)
            .field("pdf_timeout", &self.pdf_timeout)
            .field("image_timeout", &self.image_timeout)
            .field("kill_grace", &self.kill_grace)
            .field("diagnostic_limit", &self.diagnostic_limit)
            .field("retry_office_timeout", &self.retry_office_timeout)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("metafile_dpi", &self.metafile_dpi)
            .field("webp_fallback", &self.webp_fallback)
            .field("engines", &self.engines)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Per-hop timeout for `engine`.
    pub fn timeout_for(&self, engine: crate::engine::EngineKind) -> Duration {
        use crate::engine::EngineKind;
        match engine {
            EngineKind::Office => self.office_timeout,
            EngineKind::Pdf => self.pdf_timeout,
            EngineKind::Image => self.image_timeout,
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = dir.into();
        self
    }

    pub fn max_concurrent_jobs(mut self, n: usize) -> Self {
        self.config.max_concurrent_jobs = n.max(1);
        self
    }

    pub fn admission(mut self, policy: AdmissionPolicy) -> Self {
        self.config.admission = policy;
        self
    }

    pub fn office_timeout(mut self, t: Duration) -> Self {
        self.config.office_timeout = t;
        self
    }

    pub fn pdf_timeout(mut self, t: Duration) -> Self {
        self.config.pdf_timeout = t;
        self
    }

    pub fn image_timeout(mut self, t: Duration) -> Self {
        self.config.image_timeout = t;
        self
    }

    /// Set the same timeout for all three engines.
    pub fn engine_timeout(self, t: Duration) -> Self {
        self.office_timeout(t).pdf_timeout(t).image_timeout(t)
    }

    pub fn kill_grace(mut self, t: Duration) -> Self {
        self.config.kill_grace = t;
        self
    }

    pub fn diagnostic_limit(mut self, bytes: usize) -> Self {
        self.config.diagnostic_limit = bytes.max(64);
        self
    }

    pub fn retry_office_timeout(mut self, v: bool) -> Self {
        self.config.retry_office_timeout = v;
        self
    }

    pub fn max_input_bytes(mut self, bytes: usize) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    pub fn metafile_dpi(mut self, dpi: u32) -> Self {
        self.config.metafile_dpi = dpi.clamp(*DPI_RANGE.start(), *DPI_RANGE.end());
        self
    }

    pub fn webp_fallback(mut self, v: bool) -> Self {
        self.config.webp_fallback = v;
        self
    }

    pub fn office_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engines.office = Some(path.into());
        self
    }

    pub fn pdf_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engines.pdf = Some(path.into());
        self
    }

    pub fn image_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engines.image = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.max_concurrent_jobs == 0 {
            return Err(ConvertError::InvalidRequest(
                "max_concurrent_jobs must be ≥ 1".into(),
            ));
        }
        for (name, t) in [
            ("office_timeout", c.office_timeout),
            ("pdf_timeout", c.pdf_timeout),
            ("image_timeout", c.image_timeout),
        ] {
            if t.is_zero() {
                return Err(ConvertError::InvalidRequest(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        if c.workspace_root.as_os_str().is_empty() {
            return Err(ConvertError::InvalidRequest(
                "workspace_root must not be empty".into(),
            ));
        }
        if c.max_input_bytes == 0 {
            return Err(ConvertError::InvalidRequest(
                "max_input_bytes must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Explicit engine binary overrides. A directory is searched for the tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineBinaries {
    pub office: Option<PathBuf>,
    pub pdf: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

/// Behaviour when `max_concurrent_jobs` jobs are already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionPolicy {
    /// Fail immediately with `Overloaded`.
    Reject,
    /// Wait up to `max_wait` for a slot, with at most `max_queued` waiters;
    /// beyond either bound the job fails with `Overloaded`.
    Queue { max_wait: Duration, max_queued: usize },
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy::Queue {
            max_wait: Duration::from_secs(30),
            max_queued: 64,
        }
    }
}

// ── Per-request options ──────────────────────────────────────────────────

/// Options for one conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    /// Pages to rasterise. Applies where a PDF is turned into images.
    pub pages: PageSelection,
    /// Rasterisation resolution (and SVG density). Default: 150.
    pub dpi: u32,
    /// Lossy encoder quality 1–100. Engine default when `None`.
    pub quality: Option<u8>,
    pub resize: Option<Resize>,
    /// WebP encoder choice. Default: [`WebpMode::Auto`].
    pub webp: WebpMode,
    /// Trim uniform margins from image output and pad the result with this
    /// many pixels of white.
    pub trim_margins: Option<u32>,
    /// Drop EXIF/ICC and other metadata from image output. Default: true.
    pub strip_metadata: bool,
}

/// How WebP output is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebpMode {
    /// Lossless for diagrams, screenshots and other flat images; lossy for
    /// photographs. Decided per image by ImageMagick `identify`.
    #[default]
    Auto,
    Lossy,
    Lossless,
}

impl FromStr for WebpMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(WebpMode::Auto),
            "lossy" => Ok(WebpMode::Lossy),
            "lossless" => Ok(WebpMode::Lossless),
            other => Err(ConvertError::InvalidRequest(format!(
                "invalid webp mode '{other}': expected auto, lossy or lossless"
            ))),
        }
    }
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            pages: PageSelection::All,
            dpi: 150,
            quality: None,
            resize: None,
            webp: WebpMode::Auto,
            trim_margins: None,
            strip_metadata: true,
        }
    }
}

impl ConversionOptions {
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_resize(mut self, resize: Resize) -> Self {
        self.resize = Some(resize);
        self
    }

    pub fn with_webp(mut self, mode: WebpMode) -> Self {
        self.webp = mode;
        self
    }

    pub fn with_trim_margins(mut self, padding: u32) -> Self {
        self.trim_margins = Some(padding);
        self
    }

    /// Reject values no engine should ever see.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !DPI_RANGE.contains(&self.dpi) {
            return Err(ConvertError::InvalidRequest(format!(
                "dpi must be {}–{}, got {}",
                DPI_RANGE.start(),
                DPI_RANGE.end(),
                self.dpi
            )));
        }
        if let Some(q) = self.quality {
            if !(1..=100).contains(&q) {
                return Err(ConvertError::InvalidRequest(format!(
                    "quality must be 1–100, got {q}"
                )));
            }
        }
        if let Some(r) = self.resize {
            if r.width == Some(0) || r.height == Some(0) {
                return Err(ConvertError::InvalidRequest(format!(
                    "resize dimensions must be positive, got {r}"
                )));
            }
        }
        if let Some(padding) = self.trim_margins {
            if padding > MAX_TRIM_PADDING {
                return Err(ConvertError::InvalidRequest(format!(
                    "trim padding must be at most {MAX_TRIM_PADDING}px, got {padding}"
                )));
            }
        }
        self.pages.validate()
    }
}

/// Which pages of a paged document to rasterise (1-indexed).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    #[default]
    All,
    Single(usize),
    /// Inclusive range.
    Range(usize, usize),
    /// Specific pages, deduplicated and sorted when rendered.
    Set(Vec<usize>),
}

impl PageSelection {
    fn validate(&self) -> Result<(), ConvertError> {
        let bad = |msg: String| Err(ConvertError::InvalidRequest(msg));
        match self {
            PageSelection::All => Ok(()),
            PageSelection::Single(0) => bad("pages are 1-indexed; got page 0".into()),
            PageSelection::Single(_) => Ok(()),
            PageSelection::Range(s, e) if *s == 0 || s > e => {
                bad(format!("invalid page range {s}-{e}"))
            }
            PageSelection::Range(..) => Ok(()),
            PageSelection::Set(v) if v.is_empty() || v.contains(&0) => {
                bad(format!("invalid page set {v:?}"))
            }
            PageSelection::Set(_) => Ok(()),
        }
    }

    /// Ghostscript `-sPageList` value; `None` means every page.
    pub fn to_page_list(&self) -> Option<String> {
        match self {
            PageSelection::All => None,
            PageSelection::Single(p) => Some(p.to_string()),
            PageSelection::Range(s, e) => Some(format!("{s}-{e}")),
            PageSelection::Set(pages) => {
                let mut pages = pages.clone();
                pages.sort_unstable();
                pages.dedup();
                let parts: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
                Some(parts.join(","))
            }
        }
    }
}

impl PageSelection {
    /// Document page number of the `position`-th rendered page (0-indexed).
    /// Ghostscript numbers its output files sequentially, so the selection
    /// maps them back.
    pub fn page_number(&self, position: usize) -> usize {
        match self {
            PageSelection::All => position + 1,
            PageSelection::Single(p) => p + position,
            PageSelection::Range(s, _) => s + position,
            PageSelection::Set(pages) => {
                let mut pages = pages.clone();
                pages.sort_unstable();
                pages.dedup();
                pages.get(position).copied().unwrap_or(position + 1)
            }
        }
    }
}

static PAGE_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\s*-\s*(\d+)$").unwrap());

impl FromStr for PageSelection {
    type Err = ConvertError;

    /// Parse `all`, `5`, `3-15` or `1,3,5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ConvertError::InvalidRequest(format!("invalid page selection '{s}'"));
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }
        if let Some(caps) = PAGE_RANGE.captures(s) {
            let start = caps[1].parse().map_err(|_| invalid())?;
            let end = caps[2].parse().map_err(|_| invalid())?;
            let sel = PageSelection::Range(start, end);
            sel.validate()?;
            return Ok(sel);
        }
        if s.contains(',') {
            let pages = s
                .split(',')
                .map(|p| p.trim().parse::<usize>().map_err(|_| invalid()))
                .collect::<Result<Vec<_>, _>>()?;
            let sel = PageSelection::Set(pages);
            sel.validate()?;
            return Ok(sel);
        }
        let page: usize = s.parse().map_err(|_| invalid())?;
        let sel = PageSelection::Single(page);
        sel.validate()?;
        Ok(sel)
    }
}

/// Target bounding box for image output. A missing side keeps the aspect
/// ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Resize {
    /// ImageMagick geometry, e.g. `800x600`, `800x`, `x600`.
    pub fn geometry(&self) -> String {
        let side = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_default();
        format!("{}x{}", side(self.width), side(self.height))
    }
}

impl fmt::Display for Resize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.geometry())
    }
}

static GEOMETRY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d*)[xX](\d*)$").unwrap());

impl FromStr for Resize {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || {
            ConvertError::InvalidRequest(format!(
                "invalid resize '{s}': expected WxH, Wx or xH"
            ))
        };
        let caps = GEOMETRY.captures(s).ok_or_else(invalid)?;
        let side = |m: &str| -> Result<Option<u32>, ConvertError> {
            if m.is_empty() {
                Ok(None)
            } else {
                m.parse::<u32>().map(Some).map_err(|_| invalid())
            }
        };
        let resize = Resize {
            width: side(&caps[1])?,
            height: side(&caps[2])?,
        };
        if resize.width.is_none() && resize.height.is_none() {
            return Err(invalid());
        }
        if resize.width == Some(0) || resize.height == Some(0) {
            return Err(invalid());
        }
        Ok(resize)
    }
}
