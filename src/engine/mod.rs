//! Engine adapters: one per external tool.
//!
//! An adapter only knows how to turn a [`HopRequest`] into an
//! [`EngineCommand`]: the argument list plus where the output is expected to
//! appear. Running the process and checking that output really exists is the
//! same for every engine and lives in [`invoke`].
//!
//! ```text
//!  HopRequest ──adapter.command()──▶ EngineCommand
//!                                       │
//!                          process::run_bounded (timeout, kill, capture)
//!                                       │
//!                         exit status ≠ 0 → EngineExecutionError
//!                         no/empty output → EngineOutputMissing
//!                                       ▼
//!                                 Vec<PathBuf>
//! ```
//!
//! Adapters are immutable after construction, so a single instance serves
//! any number of concurrent jobs.

pub mod image;
pub mod office;
pub mod pdf;
pub mod process;

use crate::config::ConversionOptions;
use crate::error::ConvertError;
use crate::route::{Hop, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use self::image::ImageAdapter;
pub use self::office::OfficeAdapter;
pub use self::pdf::PdfAdapter;
pub use self::process::{CommandSpec, ProcessLimits, ProcessOutcome};

/// The three logical engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    /// Office-suite renderer (LibreOffice).
    Office,
    /// PostScript/PDF interpreter (Ghostscript).
    Pdf,
    /// Image toolkit (ImageMagick).
    Image,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [EngineKind::Office, EngineKind::Pdf, EngineKind::Image];

    pub fn tool(self) -> engine_locate::Tool {
        match self {
            EngineKind::Office => engine_locate::Tool::Office,
            EngineKind::Pdf => engine_locate::Tool::Ghostscript,
            EngineKind::Image => engine_locate::Tool::ImageMagick,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Office => f.pad("Office"),
            EngineKind::Pdf => f.pad("PDF"),
            EngineKind::Image => f.pad("Image"),
        }
    }
}

/// Everything an adapter needs to build one invocation.
#[derive(Debug, Clone, Copy)]
pub struct HopRequest<'a> {
    pub hop: &'a Hop,
    /// What the planner decided this hop does.
    pub operation: Operation,
    /// File produced by the previous hop, or the staged input.
    pub input: &'a Path,
    /// Empty directory that receives this invocation's output.
    pub out_dir: &'a Path,
    /// Root of the job workspace (process cwd, profile and home live here).
    pub workspace: &'a Path,
    pub options: &'a ConversionOptions,
    /// Rasterisation resolution for this job (the metafile density for
    /// WMF/EMF sources).
    pub dpi: u32,
    /// Encode WebP output losslessly.
    pub lossless: bool,
}

impl HopRequest<'_> {
    /// The planner handed this adapter a hop it does not perform.
    pub fn mismatch(&self) -> ConvertError {
        ConvertError::UnsupportedConversion {
            from: self.hop.input.to_string(),
            to: self.hop.output.to_string(),
        }
    }

    /// Stem of the input file, used to name outputs.
    pub fn input_stem(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string())
    }
}

/// Where an engine is expected to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedOutput {
    /// A single file. When `fallback_ext` is set and the exact path is
    /// absent, the newest non-empty `*.ext` in the same directory is taken
    /// instead (LibreOffice picks its own output names in some builds).
    File {
        path: PathBuf,
        fallback_ext: Option<&'static str>,
    },
    /// Numbered files `<prefix>NNNN.<ext>`, one per page.
    Sequence {
        dir: PathBuf,
        prefix: String,
        ext: &'static str,
    },
}

/// A command ready to run plus its output contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub spec: CommandSpec,
    pub expected: ExpectedOutput,
}

/// Builds engine-specific command lines.
pub trait EngineAdapter: Send + Sync + fmt::Debug {
    fn kind(&self) -> EngineKind;

    /// Program and environment this adapter launches.
    fn binary(&self) -> &engine_locate::Located;

    /// Build the command for one hop invocation. Pure: no I/O.
    fn command(&self, req: &HopRequest<'_>) -> Result<EngineCommand, ConvertError>;
}

/// Run one engine invocation and return the output files it produced.
///
/// # Errors
/// * [`ConvertError::EngineTimeout`] / [`ConvertError::Cancelled`]: the
///   process was killed.
/// * [`ConvertError::EngineExecution`]: launch failure or non-zero exit,
///   with bounded stderr.
/// * [`ConvertError::EngineOutputMissing`]: exit 0 but nothing (or an empty
///   file) where the output should be.
pub async fn invoke(
    adapter: &dyn EngineAdapter,
    req: &HopRequest<'_>,
    limits: &ProcessLimits,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, ConvertError> {
    let engine = adapter.kind();
    let command = adapter.command(req)?;
    let outcome = process::run_bounded(engine, &command.spec, limits, cancel).await?;

    if !outcome.status.success() {
        return Err(ConvertError::EngineExecution {
            engine,
            exit_code: outcome.status.code(),
            diagnostic: outcome.diagnostic(limits.capture_limit),
        });
    }

    let outputs = verify_outputs(engine, &command.expected).await?;
    debug!(
        "{} engine produced {} file(s) in {}ms",
        engine,
        outputs.len(),
        outcome.duration.as_millis()
    );
    Ok(outputs)
}

async fn verify_outputs(
    engine: EngineKind,
    expected: &ExpectedOutput,
) -> Result<Vec<PathBuf>, ConvertError> {
    match expected {
        ExpectedOutput::File { path, fallback_ext } => {
            let size = file_size(path).await;
            if size > 0 {
                return Ok(vec![path.clone()]);
            }
            if let (Some(ext), Some(dir)) = (fallback_ext, path.parent()) {
                if let Some(found) = newest_with_extension(dir, ext).await? {
                    debug!(
                        "{} engine wrote '{}' instead of '{}'",
                        engine,
                        found.display(),
                        path.display()
                    );
                    return Ok(vec![found]);
                }
            }
            let detail = if tokio::fs::try_exists(path).await.unwrap_or(false) {
                "file is empty".to_string()
            } else {
                "file was not created".to_string()
            };
            Err(ConvertError::EngineOutputMissing {
                engine,
                expected: path.clone(),
                detail,
            })
        }
        ExpectedOutput::Sequence { dir, prefix, ext } => {
            let suffix = format!(".{ext}");
            let mut pages = Vec::new();
            for (path, size, _) in list_dir(dir).await? {
                let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !(name.starts_with(prefix.as_str()) && name.ends_with(&suffix)) {
                    continue;
                }
                if size == 0 {
                    return Err(ConvertError::EngineOutputMissing {
                        engine,
                        expected: path.clone(),
                        detail: "page file is empty".into(),
                    });
                }
                pages.push(path);
            }
            if pages.is_empty() {
                return Err(ConvertError::EngineOutputMissing {
                    engine,
                    expected: dir.join(format!("{prefix}*{suffix}")),
                    detail: "no page files were written".into(),
                });
            }
            pages.sort();
            Ok(pages)
        }
    }
}

async fn file_size(path: &Path) -> u64 {
    tokio::fs::metadata(path)
        .await
        .map(|m| if m.is_file() { m.len() } else { 0 })
        .unwrap_or(0)
}

async fn newest_with_extension(dir: &Path, ext: &str) -> Result<Option<PathBuf>, ConvertError> {
    let newest = list_dir(dir)
        .await?
        .into_iter()
        .filter(|(path, size, _)| {
            *size > 0
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .max_by_key(|(_, _, modified)| *modified)
        .map(|(path, _, _)| path);
    Ok(newest)
}

/// Regular files in `dir` with their size and mtime.
async fn list_dir(dir: &Path) -> Result<Vec<(PathBuf, u64, SystemTime)>, ConvertError> {
    let mut rd = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ConvertError::workspace("list output directory", dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = rd
        .next_entry()
        .await
        .map_err(|e| ConvertError::workspace("list output directory", dir, e))?
    {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        files.push((entry.path(), meta.len(), modified));
    }
    Ok(files)
}
