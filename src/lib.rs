//! # docforge
//!
//! Convert office documents, PDFs and images by orchestrating three external
//! engines: LibreOffice, Ghostscript and ImageMagick.
//!
//! ## Why orchestrate?
//!
//! Each engine is excellent at one step and unpleasant to drive directly.
//! LibreOffice hangs when two processes share a profile, Ghostscript writes
//! one file per page, and ImageMagick silently treats multi-frame inputs as
//! animations. This crate hides that behind one call: classify the input by
//! content, plan a route through the engines, run every hop in a private
//! workspace with a timeout, and return the bytes or a single typed error.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes + declared name + target
//!  │
//!  ├─ 1. Classify   magic bytes / container structure → FormatDescriptor
//!  ├─ 2. Route      (source, target) → ordered engine hops
//!  ├─ 3. Admit      bounded in-flight jobs; excess queued or rejected
//!  ├─ 4. Stage      private workspace per job
//!  ├─ 5. Convert    one child process per hop (per page where needed)
//!  └─ 6. Collect    artifacts read back; workspace removed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docforge::{ConversionOptions, Converter, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let converter = Converter::new(ConverterConfig::default())?;
//!     let bytes = std::fs::read("slides.pptx")?;
//!     let output = converter
//!         .convert(&bytes, Some("slides.pptx"), "png", &ConversionOptions::default())
//!         .await?;
//!     for page in &output.artifacts {
//!         std::fs::write(&page.name, &page.bytes)?;
//!     }
//!     eprintln!("{} in {}ms", output.route, output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docforge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docforge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod admission;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod format;
pub mod input;
pub mod job;
pub mod output;
pub mod progress;
pub mod route;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    AdmissionPolicy, ConversionOptions, ConverterConfig, ConverterConfigBuilder, EngineBinaries,
    PageSelection, Resize, WebpMode,
};
pub use convert::{ConversionRequest, Converter};
pub use engine::EngineKind;
pub use error::{ConvertError, Diagnostic, ErrorKind, ErrorReport};
pub use format::{classify, Format, FormatDescriptor, FormatFamily};
pub use job::{JobId, JobStatus};
pub use output::{Artifact, ConversionOutput, ConversionStats, EngineStatus, HopReport};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use route::{route, ConversionRoute, Hop};
pub use tokio_util::sync::CancellationToken;
