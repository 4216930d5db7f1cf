//! ImageMagick adapter: raster/SVG format conversion, resize, re-encode.
//!
//! Besides the conversion command itself this module builds the two
//! side queries the orchestrator runs against the same binary: `identify`
//! to choose a WebP encoder for one image, and `-list format` to learn
//! whether the build can write WebP at all.

use crate::engine::process::CommandSpec;
use crate::engine::{EngineAdapter, EngineCommand, EngineKind, ExpectedOutput, HopRequest};
use crate::error::ConvertError;
use crate::format::Format;
use crate::route::Operation;
use engine_locate::Located;
use std::ffi::OsString;
use std::path::Path;

/// Quality used for lossy WebP/JPEG output when the request sets none.
pub const DEFAULT_LOSSY_QUALITY: u8 = 82;

/// Images with at most this many distinct colours are treated as diagrams.
pub const DIAGRAM_MAX_COLORS: u64 = 512;

/// Counting colours decodes every pixel; skip it above this size.
pub const COLOR_COUNT_MAX_BYTES: u64 = 20 * 1024 * 1024;

/// `identify` image types that indicate flat artwork.
const FLAT_TYPES: &[&str] = &[
    "Bilevel",
    "Grayscale",
    "GrayscaleAlpha",
    "Palette",
    "PaletteAlpha",
];

#[derive(Debug, Clone)]
pub struct ImageAdapter {
    binary: Located,
}

impl ImageAdapter {
    pub fn new(binary: Located) -> Self {
        Self { binary }
    }
}

/// Multi-frame sources written to a single-frame target keep only the first
/// frame; otherwise ImageMagick writes `name-0.png`, `name-1.png`, ….
fn needs_first_frame(source: Format, target: Format) -> bool {
    source.is_multi_frame() && !target.is_multi_frame()
}

fn first_frame(path: &Path) -> OsString {
    let mut input = OsString::from(path.as_os_str());
    input.push("[0]");
    input
}

impl EngineAdapter for ImageAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Image
    }

    fn binary(&self) -> &Located {
        &self.binary
    }

    fn command(&self, req: &HopRequest<'_>) -> Result<EngineCommand, ConvertError> {
        if req.operation != Operation::Transform {
            return Err(req.mismatch());
        }
        let source = req.hop.input;
        let target = req.hop.output;
        let opts = req.options;

        let mut spec = CommandSpec::new(&self.binary.program);
        if source == Format::Svg {
            // Density must precede the input to affect SVG rasterisation.
            spec = spec.arg("-density").arg(req.dpi.to_string());
        }
        let input = if needs_first_frame(source, target) {
            first_frame(req.input)
        } else {
            OsString::from(req.input.as_os_str())
        };
        spec = spec.arg(input).arg("-auto-orient");
        if let Some(padding) = opts.trim_margins {
            spec = spec
                .args(["-trim", "+repage", "-bordercolor", "white", "-border"])
                .arg(padding.to_string());
        }
        if opts.strip_metadata {
            spec = spec.arg("-strip");
        }
        if let Some(resize) = opts.resize {
            spec = spec.arg("-resize").arg(resize.geometry());
        }

        match target {
            Format::Webp if req.lossless => {
                spec = spec.args([
                    "-define",
                    "webp:lossless=true",
                    "-define",
                    "webp:method=6",
                    "-define",
                    "webp:image-hint=graph",
                ]);
            }
            Format::Webp => {
                let q = opts.quality.unwrap_or(DEFAULT_LOSSY_QUALITY);
                spec = spec.arg("-quality").arg(q.to_string()).args([
                    "-define",
                    "webp:method=6",
                    "-define",
                    "webp:image-hint=photo",
                ]);
            }
            Format::Jpeg => {
                let q = opts.quality.unwrap_or(DEFAULT_LOSSY_QUALITY);
                spec = spec.arg("-quality").arg(q.to_string());
            }
            _ => {
                if let Some(q) = opts.quality {
                    spec = spec.arg("-quality").arg(q.to_string());
                }
            }
        }

        if matches!(target, Format::Jpeg | Format::Bmp) {
            // No alpha channel in the target: flatten onto white.
            spec = spec.args(["-background", "white", "-alpha", "remove", "-alpha", "off"]);
        }

        let output = req
            .out_dir
            .join(format!("{}.{}", req.input_stem(), target.extension()));
        let spec = spec
            .arg(output.as_os_str())
            .envs(&self.binary.env)
            .cwd(req.workspace);

        Ok(EngineCommand {
            spec,
            expected: ExpectedOutput::File {
                path: output,
                fallback_ext: None,
            },
        })
    }
}

// ── Side queries ─────────────────────────────────────────────────────────

/// `identify` invocation printing `type|opaque[|colours]` for the first
/// frame of `input`.
///
/// ImageMagick 7 runs it as `magick identify`; a version 6 install found as
/// `convert` has a sibling `identify` binary instead.
pub fn identify_command(binary: &Located, input: &Path, count_colors: bool) -> CommandSpec {
    let is_im6 = binary
        .program
        .file_stem()
        .is_some_and(|stem| stem.eq_ignore_ascii_case("convert"));
    let mut spec = if is_im6 {
        CommandSpec::new(binary.program.with_file_name("identify"))
    } else {
        CommandSpec::new(&binary.program).arg("identify")
    };
    let fields = if count_colors {
        "%[type]|%[opaque]|%k"
    } else {
        "%[type]|%[opaque]"
    };
    spec = spec.arg("-format").arg(fields).arg(first_frame(input));
    spec.envs(&binary.env)
}

/// `-list format` invocation; its output feeds [`lists_format`].
pub fn list_formats_command(binary: &Located) -> CommandSpec {
    CommandSpec::new(&binary.program)
        .args(["-list", "format"])
        .envs(&binary.env)
}

/// Whether a `-list format` table contains a writable `name` entry.
///
/// Lines look like `     WEBP* rw+   WebP Image Format (libwebp 1.2.4)`;
/// the mode column must contain `w`.
pub fn lists_format(listing: &str, name: &str) -> bool {
    listing.lines().any(|line| {
        let mut cols = line.split_whitespace();
        let Some(format) = cols.next() else {
            return false;
        };
        let format = format.trim_end_matches('*');
        format.eq_ignore_ascii_case(name) && cols.next().is_some_and(|mode| mode.contains('w'))
    })
}

/// What `identify` reported about one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTraits {
    pub kind: String,
    pub opaque: Option<bool>,
    pub colors: Option<u64>,
}

impl ImageTraits {
    /// Parse `type|opaque[|colours]` as printed by [`identify_command`].
    pub fn parse(text: &str) -> Option<Self> {
        let mut fields = text.trim().split('|');
        let kind = fields.next().map(str::trim).filter(|k| !k.is_empty())?;
        let opaque = fields.next().and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        });
        let colors = fields.next().and_then(|v| v.trim().parse().ok());
        Some(Self {
            kind: kind.to_string(),
            opaque,
            colors,
        })
    }

    /// Diagrams, screenshots and anything with transparency compress better
    /// (and without ringing) as lossless WebP.
    pub fn prefers_lossless(&self) -> bool {
        FLAT_TYPES.contains(&self.kind.as_str())
            || self.opaque == Some(false)
            || self.colors.is_some_and(|c| c <= DIAGRAM_MAX_COLORS)
    }
}
