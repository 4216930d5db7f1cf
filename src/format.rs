//! Format classification: decide what an input really is.
//!
//! Declared file names lie. Users rename `.docx` files to `.doc`, scanners
//! save JPEGs as `.png`, and browsers upload everything as
//! `application/octet-stream`. [`classify`] therefore looks at a bounded
//! prefix of the content first and treats the declared extension only as a
//! tie-breaker for containers whose markers sit beyond the sniff window.
//!
//! Classification is a pure function of `(bytes, declared name)`; it never
//! touches the filesystem and never spawns an engine.

use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Bytes inspected by [`classify`].
pub const SNIFF_WINDOW: usize = 64 * 1024;

/// `%PDF-` may be preceded by junk; Acrobat accepts it within the first KiB.
const PDF_HEADER_WINDOW: usize = 1024;

/// Every file format docforge can read or produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    // Office documents
    Doc,
    Docx,
    Odt,
    Rtf,
    Txt,
    Xls,
    Xlsx,
    Ods,
    Csv,
    Ppt,
    Pptx,
    Odp,
    // Portable documents
    Pdf,
    // Raster images
    Png,
    Jpeg,
    Gif,
    Webp,
    Tiff,
    Bmp,
    // Vector images
    Svg,
    Wmf,
    Emf,
}

/// Coarse grouping used by the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatFamily {
    Office,
    Pdf,
    Raster,
    Vector,
}

/// Which office application a document belongs to. Conversions between
/// office formats only make sense inside one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfficeClass {
    Text,
    Spreadsheet,
    Presentation,
}

impl Format {
    pub const ALL: [Format; 22] = [
        Format::Doc,
        Format::Docx,
        Format::Odt,
        Format::Rtf,
        Format::Txt,
        Format::Xls,
        Format::Xlsx,
        Format::Ods,
        Format::Csv,
        Format::Ppt,
        Format::Pptx,
        Format::Odp,
        Format::Pdf,
        Format::Png,
        Format::Jpeg,
        Format::Gif,
        Format::Webp,
        Format::Tiff,
        Format::Bmp,
        Format::Svg,
        Format::Wmf,
        Format::Emf,
    ];

    pub fn family(self) -> FormatFamily {
        use Format::*;
        match self {
            Doc | Docx | Odt | Rtf | Txt | Xls | Xlsx | Ods | Csv | Ppt | Pptx | Odp => {
                FormatFamily::Office
            }
            Pdf => FormatFamily::Pdf,
            Png | Jpeg | Gif | Webp | Tiff | Bmp => FormatFamily::Raster,
            Svg | Wmf | Emf => FormatFamily::Vector,
        }
    }

    pub fn office_class(self) -> Option<OfficeClass> {
        use Format::*;
        match self {
            Doc | Docx | Odt | Rtf | Txt => Some(OfficeClass::Text),
            Xls | Xlsx | Ods | Csv => Some(OfficeClass::Spreadsheet),
            Ppt | Pptx | Odp => Some(OfficeClass::Presentation),
            _ => None,
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(self) -> &'static str {
        use Format::*;
        match self {
            Doc => "doc",
            Docx => "docx",
            Odt => "odt",
            Rtf => "rtf",
            Txt => "txt",
            Xls => "xls",
            Xlsx => "xlsx",
            Ods => "ods",
            Csv => "csv",
            Ppt => "ppt",
            Pptx => "pptx",
            Odp => "odp",
            Pdf => "pdf",
            Png => "png",
            Jpeg => "jpg",
            Gif => "gif",
            Webp => "webp",
            Tiff => "tiff",
            Bmp => "bmp",
            Svg => "svg",
            Wmf => "wmf",
            Emf => "emf",
        }
    }

    pub fn media_type(self) -> &'static str {
        use Format::*;
        match self {
            Doc => "application/msword",
            Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Odt => "application/vnd.oasis.opendocument.text",
            Rtf => "application/rtf",
            Txt => "text/plain",
            Xls => "application/vnd.ms-excel",
            Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Ods => "application/vnd.oasis.opendocument.spreadsheet",
            Csv => "text/csv",
            Ppt => "application/vnd.ms-powerpoint",
            Pptx => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            Odp => "application/vnd.oasis.opendocument.presentation",
            Pdf => "application/pdf",
            Png => "image/png",
            Jpeg => "image/jpeg",
            Gif => "image/gif",
            Webp => "image/webp",
            Tiff => "image/tiff",
            Bmp => "image/bmp",
            Svg => "image/svg+xml",
            Wmf => "image/wmf",
            Emf => "image/emf",
        }
    }

    /// Look up a format by file extension (case-insensitive, leading dot
    /// optional).
    pub fn from_extension(ext: &str) -> Option<Format> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        let format = match ext.as_str() {
            "doc" => Format::Doc,
            "docx" => Format::Docx,
            "odt" => Format::Odt,
            "rtf" => Format::Rtf,
            "txt" | "text" => Format::Txt,
            "xls" => Format::Xls,
            "xlsx" => Format::Xlsx,
            "ods" => Format::Ods,
            "csv" => Format::Csv,
            "ppt" => Format::Ppt,
            "pptx" => Format::Pptx,
            "odp" => Format::Odp,
            "pdf" => Format::Pdf,
            "png" => Format::Png,
            "jpg" | "jpeg" | "jpe" => Format::Jpeg,
            "gif" => Format::Gif,
            "webp" => Format::Webp,
            "tif" | "tiff" => Format::Tiff,
            "bmp" => Format::Bmp,
            "svg" => Format::Svg,
            "wmf" => Format::Wmf,
            "emf" => Format::Emf,
            _ => return None,
        };
        Some(format)
    }

    /// Extension of a declared file name, if it names a known format.
    pub fn from_file_name(name: &str) -> Option<Format> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Format::from_extension)
    }

    /// Parse a requested target format.
    ///
    /// An unknown target can never be routed, so it is reported as
    /// [`ConvertError::UnsupportedConversion`] rather than a format error.
    pub fn parse_target(target: &str) -> Result<Format, ConvertError> {
        Format::from_extension(target).ok_or_else(|| ConvertError::UnsupportedConversion {
            from: "*".to_string(),
            to: target.trim().to_string(),
        })
    }

    pub fn is_raster(self) -> bool {
        self.family() == FormatFamily::Raster
    }

    /// Formats that can carry more than one frame/page.
    pub fn is_multi_frame(self) -> bool {
        matches!(self, Format::Gif | Format::Tiff | Format::Webp | Format::Pdf)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

// ── Descriptor ───────────────────────────────────────────────────────────

/// How the classifier reached its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Derivation {
    /// Content signature and declared extension name the same format.
    Agreed,
    /// Content signature decided; the extension was absent or contradicted it.
    ContentSniffed,
    /// Content only proved the container type; the extension picked the format.
    DeclaredExtension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
}

/// Result of [`classify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub format: Format,
    pub family: FormatFamily,
    pub derivation: Derivation,
    pub confidence: Confidence,
    /// Format implied by the declared file name, when it named one.
    pub declared: Option<Format>,
}

// ── Sniffing ─────────────────────────────────────────────────────────────

/// What the content alone says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sniffed {
    Exact(Format),
    /// ZIP archive without an OOXML/ODF marker inside the window.
    Zip,
    /// OLE2 compound file whose directory is unreadable or names no known stream.
    Ole2,
    /// Plausible UTF-8, or UTF-16 with a BOM, with no stronger signature.
    Text,
    /// A recognised image type docforge does not handle.
    OtherImage(image::ImageFormat),
    Unknown,
}

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const WMF_PLACEABLE: &[u8] = &[0xD7, 0xCD, 0xC6, 0x9A];
const ODF_MIMETYPE: &[u8] = b"application/vnd.oasis.opendocument.";

static SVG_ROOT: Lazy<Regex> = Lazy::new(|| {
    // XML prolog, comments and a DOCTYPE may precede the root element.
    Regex::new(
        r"(?is)\A(?-u:\xEF\xBB\xBF)?\s*(?:<\?xml[^>]*\?>\s*)?(?:<!--.*?-->\s*)*(?:<!DOCTYPE\s+svg[^>]*>\s*)?(?:<!--.*?-->\s*)*<svg[\s>:]",
    )
    .expect("valid SVG root regex")
});

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn sniff(window: &[u8]) -> Sniffed {
    let pdf_window = &window[..window.len().min(PDF_HEADER_WINDOW)];
    if contains(pdf_window, b"%PDF-") {
        return Sniffed::Exact(Format::Pdf);
    }
    if window.starts_with(b"{\\rtf") {
        return Sniffed::Exact(Format::Rtf);
    }
    if is_wmf(window) {
        return Sniffed::Exact(Format::Wmf);
    }
    if is_emf(window) {
        return Sniffed::Exact(Format::Emf);
    }
    if window.starts_with(ZIP_MAGIC) {
        return sniff_zip(window);
    }
    if window.starts_with(OLE2_MAGIC) {
        return sniff_ole2(window);
    }
    if let Ok(img) = image::guess_format(window) {
        use image::ImageFormat as F;
        return match img {
            F::Png => Sniffed::Exact(Format::Png),
            F::Jpeg => Sniffed::Exact(Format::Jpeg),
            F::Gif => Sniffed::Exact(Format::Gif),
            F::WebP => Sniffed::Exact(Format::Webp),
            F::Tiff => Sniffed::Exact(Format::Tiff),
            F::Bmp => Sniffed::Exact(Format::Bmp),
            other => Sniffed::OtherImage(other),
        };
    }
    if SVG_ROOT.is_match(window) {
        return Sniffed::Exact(Format::Svg);
    }
    if looks_like_text(window) {
        return Sniffed::Text;
    }
    Sniffed::Unknown
}

fn is_wmf(b: &[u8]) -> bool {
    if b.starts_with(WMF_PLACEABLE) {
        return true;
    }
    // Standard METAHEADER: type 1|2, header size 9 words, version 0x0100|0x0300.
    if b.len() < 18 {
        return false;
    }
    let word = |i: usize| u16::from_le_bytes([b[i], b[i + 1]]);
    matches!(word(0), 1 | 2) && word(2) == 9 && matches!(word(4), 0x0100 | 0x0300)
}

fn is_emf(b: &[u8]) -> bool {
    b.len() >= 44 && b[..4] == [1, 0, 0, 0] && &b[40..44] == b" EMF"
}

fn sniff_zip(window: &[u8]) -> Sniffed {
    // ODF stores an uncompressed `mimetype` entry first.
    if let Some(pos) = window
        .windows(ODF_MIMETYPE.len())
        .position(|w| w == ODF_MIMETYPE)
    {
        let rest = &window[pos + ODF_MIMETYPE.len()..];
        if rest.starts_with(b"text") {
            return Sniffed::Exact(Format::Odt);
        }
        if rest.starts_with(b"spreadsheet") {
            return Sniffed::Exact(Format::Ods);
        }
        if rest.starts_with(b"presentation") {
            return Sniffed::Exact(Format::Odp);
        }
    }
    if contains(window, b"word/") {
        return Sniffed::Exact(Format::Docx);
    }
    if contains(window, b"ppt/") {
        return Sniffed::Exact(Format::Pptx);
    }
    if contains(window, b"xl/") {
        return Sniffed::Exact(Format::Xlsx);
    }
    Sniffed::Zip
}

/// Size of one OLE2 directory entry.
const OLE2_DIR_ENTRY: usize = 128;

fn sniff_ole2(window: &[u8]) -> Sniffed {
    let Some(names) = ole2_entry_names(window) else {
        return Sniffed::Ole2;
    };
    for name in &names {
        match name.as_str() {
            "WordDocument" => return Sniffed::Exact(Format::Doc),
            "PowerPoint Document" => return Sniffed::Exact(Format::Ppt),
            // Excel 5/95 names its stream "Book".
            "Workbook" | "Book" => return Sniffed::Exact(Format::Xls),
            _ => {}
        }
    }
    Sniffed::Ole2
}

/// Names of the directory entries that lie inside the window, starting at
/// the header's first directory sector.
///
/// `None` when the header is malformed or the directory starts beyond the
/// window. Sectors after the first are read contiguously; a fragmented
/// directory just yields fewer names.
fn ole2_entry_names(window: &[u8]) -> Option<Vec<String>> {
    if window.len() < 512 {
        return None;
    }
    let u16_at = |i: usize| u16::from_le_bytes([window[i], window[i + 1]]);
    let u32_at = |i: usize| {
        u32::from_le_bytes([window[i], window[i + 1], window[i + 2], window[i + 3]])
    };

    let sector_size = match u16_at(30) {
        9 => 512usize,
        12 => 4096,
        _ => return None,
    };
    let first_dir = u32_at(48) as usize;
    // The header occupies the first sector-sized block.
    let start = first_dir.checked_add(1)?.checked_mul(sector_size)?;
    if start >= window.len() {
        return None;
    }

    let names = window[start..]
        .chunks_exact(OLE2_DIR_ENTRY)
        .filter_map(|entry| {
            let name_len = u16::from_le_bytes([entry[64], entry[65]]) as usize;
            let object_type = entry[66];
            // 1 storage, 2 stream, 5 root; name length counts the NUL.
            if !matches!(object_type, 1 | 2 | 5)
                || !(2..=64).contains(&name_len)
                || name_len % 2 != 0
            {
                return None;
            }
            let units: Vec<u16> = entry[..name_len - 2]
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            String::from_utf16(&units).ok()
        })
        .collect();
    Some(names)
}

const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

fn looks_like_text(window: &[u8]) -> bool {
    if window.starts_with(UTF16_LE_BOM) || window.starts_with(UTF16_BE_BOM) {
        return looks_like_utf16(window);
    }
    if window.contains(&0) {
        return false;
    }
    match std::str::from_utf8(window) {
        Ok(_) => true,
        // The window may cut a multi-byte sequence in half.
        Err(e) => e.error_len().is_none() && window.len() - e.valid_up_to() < 4,
    }
}

fn looks_like_utf16(window: &[u8]) -> bool {
    let little = window.starts_with(UTF16_LE_BOM);
    let units = window[2..].chunks_exact(2).map(|c| {
        if little {
            u16::from_le_bytes([c[0], c[1]])
        } else {
            u16::from_be_bytes([c[0], c[1]])
        }
    });
    // A trailing unpaired surrogate may come from the window cut.
    let decoded: Vec<_> = char::decode_utf16(units).collect();
    let bad = decoded.iter().filter(|c| c.is_err()).count();
    let controls = decoded
        .iter()
        .filter(|c| matches!(c, Ok(ch) if ch.is_control() && !ch.is_whitespace()))
        .count();
    bad <= 1 && controls == 0
}

// ── Classification ───────────────────────────────────────────────────────

/// Classify an input by content, using the declared name only where the
/// content cannot decide.
///
/// # Errors
/// [`ConvertError::UnsupportedFormat`] for empty input, unrecognised content,
/// unsupported image types, and containers whose declared extension does not
/// resolve them.
pub fn classify(bytes: &[u8], declared_name: Option<&str>) -> Result<FormatDescriptor, ConvertError> {
    let unsupported = |detail: String| ConvertError::UnsupportedFormat {
        declared_name: declared_name.map(str::to_string),
        detail,
    };

    if bytes.is_empty() {
        return Err(unsupported("input is empty".into()));
    }

    let declared = declared_name.and_then(Format::from_file_name);
    let window = &bytes[..bytes.len().min(SNIFF_WINDOW)];
    let sniffed = sniff(window);
    debug!(?sniffed, ?declared, "Sniffed input");

    let descriptor = |format: Format, derivation: Derivation, confidence: Confidence| {
        FormatDescriptor {
            format,
            family: format.family(),
            derivation,
            confidence,
            declared,
        }
    };

    match sniffed {
        Sniffed::Exact(format) => {
            if declared == Some(format) {
                return Ok(descriptor(format, Derivation::Agreed, Confidence::High));
            }
            if let Some(name) = declared_name {
                warn!(
                    "Declared name '{}' contradicts content; treating input as {}",
                    name, format
                );
            }
            Ok(descriptor(format, Derivation::ContentSniffed, Confidence::High))
        }
        Sniffed::Zip => match declared {
            Some(f @ (Format::Docx | Format::Xlsx | Format::Pptx | Format::Odt | Format::Ods | Format::Odp)) => {
                Ok(descriptor(f, Derivation::DeclaredExtension, Confidence::Medium))
            }
            _ => Err(unsupported(
                "ZIP archive without an office document marker".into(),
            )),
        },
        Sniffed::Ole2 => match declared {
            Some(f @ (Format::Doc | Format::Xls | Format::Ppt)) => {
                Ok(descriptor(f, Derivation::DeclaredExtension, Confidence::Medium))
            }
            _ => Err(unsupported(
                "OLE2 compound file of unknown application".into(),
            )),
        },
        Sniffed::Text => match declared {
            Some(f @ (Format::Txt | Format::Csv)) => {
                Ok(descriptor(f, Derivation::DeclaredExtension, Confidence::Medium))
            }
            _ => Err(unsupported(
                "plain text is only accepted with a .txt or .csv name".into(),
            )),
        },
        Sniffed::OtherImage(img) => Err(unsupported(format!("{img:?} images are not supported"))),
        Sniffed::Unknown => Err(unsupported(format!(
            "unrecognised content (first bytes {:02X?})",
            &window[..window.len().min(8)]
        ))),
    }
}
