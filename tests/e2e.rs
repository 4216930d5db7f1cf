//! End-to-end integration tests for docforge.
//!
//! These tests drive the real LibreOffice, Ghostscript and ImageMagick
//! binaries. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested, and each one also
//! skips when an engine it needs is not installed.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_office_to_pdf -- --nocapture

use docforge::{
    ConversionOptions, Converter, ConverterConfig, EngineKind, ErrorKind, Format, PageSelection,
    Resize,
};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// One US Letter page of text.
const ONE_PAGE_RTF: &[u8] =
    b"{\\rtf1\\ansi\\deff0\\paperw12240\\paperh15840 {\\fonttbl {\\f0 Helvetica;}}\\f0\\fs24 Memo\\par}";

/// Two pages of text, separated by an explicit page break.
const TWO_PAGE_RTF: &[u8] =
    b"{\\rtf1\\ansi\\deff0 {\\fonttbl {\\f0 Helvetica;}}\\f0\\fs48 First page\\par\\page Second page\\par}";

const SVG: &[u8] = br##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="120" height="80" viewBox="0 0 120 80">
  <rect width="120" height="80" fill="#2a6"/>
  <circle cx="60" cy="40" r="25" fill="#fff"/>
</svg>
"##;

fn converter(root: &std::path::Path) -> Converter {
    let config = ConverterConfig::builder()
        .workspace_root(root)
        .office_timeout(Duration::from_secs(180))
        .build()
        .expect("valid config");
    Converter::new(config).expect("engines resolve")
}

/// Skip this test unless E2E_ENABLED is set *and* the named engines answer.
macro_rules! e2e_skip_unless_ready {
    ($converter:expr, [$($engine:expr),+]) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let statuses = $converter.probe_engines().await;
        for needed in [$($engine),+] {
            let status = statuses.iter().find(|s| s.engine == needed).unwrap();
            if !status.available {
                println!(
                    "SKIP — {} engine unavailable: {}",
                    needed,
                    status.detail.as_deref().unwrap_or("unknown")
                );
                return;
            }
        }
    }};
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(w, h, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

/// A minimal PDF with `pages` blank US Letter (612×792 pt) pages.
fn blank_letter_pdf(pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {pages} >>", kids.join(" ")),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }
    let xref = pdf.len();
    let size = objects.len() + 1;
    pdf.extend_from_slice(format!("xref\n0 {size}\n0000000000 65535 f \n").as_bytes());
    for offset in offsets {
        pdf.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    pdf.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n").as_bytes(),
    );
    pdf
}

/// Page objects in an uncompressed PDF (`/Type /Page`, not `/Pages`).
fn pdf_page_count(pdf: &[u8]) -> usize {
    let page = regex::bytes::Regex::new(r"/Type\s*/Page\b").unwrap();
    page.find_iter(pdf).count()
}

/// Pixels spanned by `points` (1/72 in) at `dpi`.
fn pixels(points: u32, dpi: u32) -> u32 {
    points * dpi / 72
}

fn assert_root_empty(root: &std::path::Path) {
    if root.exists() {
        assert!(
            std::fs::read_dir(root).unwrap().next().is_none(),
            "workspace root not empty"
        );
    }
}

// ── Office engine ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_office_to_pdf() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Office]);

    let out = c
        .convert(TWO_PAGE_RTF, Some("letter.rtf"), "pdf", &ConversionOptions::default())
        .await
        .expect("rtf → pdf should succeed");

    assert_eq!(out.artifacts.len(), 1);
    let pdf = &out.artifacts[0];
    assert_eq!(pdf.name, "letter.pdf");
    assert!(pdf.bytes.starts_with(b"%PDF"), "not a PDF");
    println!("PDF: {} bytes in {}ms", pdf.len(), out.stats.total_duration_ms);
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn test_single_page_office_to_pdf() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Office]);

    let out = c
        .convert(ONE_PAGE_RTF, Some("memo.rtf"), "pdf", &ConversionOptions::default())
        .await
        .expect("rtf → pdf should succeed");

    assert_eq!(out.artifacts.len(), 1);
    let pdf = &out.artifacts[0];
    assert!(!pdf.bytes.is_empty());
    assert!(pdf.bytes.starts_with(b"%PDF"), "not a PDF");
    assert_eq!(pdf_page_count(&pdf.bytes), 1);
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn test_office_to_png_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Office, EngineKind::Pdf]);

    let out = c
        .convert(
            TWO_PAGE_RTF,
            Some("letter.rtf"),
            "png",
            &ConversionOptions::default().with_dpi(72),
        )
        .await
        .expect("rtf → png should succeed");

    assert_eq!(out.route.len(), 2);
    let names: Vec<_> = out.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["letter-1.png", "letter-2.png"]);
    for page in &out.artifacts {
        assert_eq!(page.format, Format::Png);
        assert!(page.width.unwrap_or(0) > 0, "page has no dimensions");
    }
    assert_root_empty(tmp.path());
}

// ── Ghostscript ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdf_to_png_at_150_dpi() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Pdf]);

    let pdf = blank_letter_pdf(3);
    let out = c
        .convert(&pdf, Some("deck.pdf"), "png", &ConversionOptions::default().with_dpi(150))
        .await
        .expect("pdf → png should succeed");

    let names: Vec<_> = out.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["deck-1.png", "deck-2.png", "deck-3.png"]);
    let expected = (pixels(612, 150), pixels(792, 150));
    assert_eq!(expected, (1275, 1650));
    for page in &out.artifacts {
        let (w, h) = (page.width.unwrap(), page.height.unwrap());
        assert!(
            w.abs_diff(expected.0) <= 1 && h.abs_diff(expected.1) <= 1,
            "{} is {w}x{h}, expected {}x{}",
            page.name,
            expected.0,
            expected.1
        );
    }
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn test_pdf_to_jpeg_page_selection() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Office, EngineKind::Pdf]);

    let pdf = c
        .convert(TWO_PAGE_RTF, Some("letter.rtf"), "pdf", &ConversionOptions::default())
        .await
        .expect("setup: rtf → pdf")
        .artifacts
        .remove(0);

    let options = ConversionOptions::default()
        .with_dpi(100)
        .with_quality(70)
        .with_pages(PageSelection::Single(2));
    let out = c
        .convert(&pdf.bytes, Some("letter.pdf"), "jpg", &options)
        .await
        .expect("pdf → jpg should succeed");

    assert_eq!(out.artifacts.len(), 1);
    assert_eq!(out.artifacts[0].name, "letter-2.jpg");
    assert_eq!(out.artifacts[0].media_type, "image/jpeg");
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn test_malformed_pdf_is_engine_error() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Pdf]);

    let err = c
        .convert(
            b"%PDF-1.7\nthis is not really a pdf\n",
            Some("broken.pdf"),
            "png",
            &ConversionOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(
        matches!(
            err.kind(),
            ErrorKind::EngineExecutionError | ErrorKind::EngineOutputMissing
        ),
        "unexpected: {err}"
    );
    println!("Report: {:?}", err.report());
    assert_root_empty(tmp.path());
}

// ── ImageMagick ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_png_to_webp_resized() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Image]);

    let options = ConversionOptions::default().with_resize(Resize {
        width: Some(100),
        height: None,
    });
    let out = c
        .convert(&png_bytes(400, 200), Some("photo.png"), "webp", &options)
        .await
        .expect("png → webp should succeed");

    let webp = &out.artifacts[0];
    assert_eq!(webp.name, "photo.webp");
    assert_eq!((webp.width, webp.height), (Some(100), Some(50)));
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn test_image_reencode_keeps_dimensions() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Image]);
    let png = png_bytes(321, 123);

    for target in ["jpg", "webp", "bmp"] {
        let out = c
            .convert(&png, Some("photo.png"), target, &ConversionOptions::default())
            .await
            .unwrap_or_else(|e| panic!("png → {target} should succeed: {e}"));
        let img = &out.artifacts[0];
        assert_eq!(
            (img.width, img.height),
            (Some(321), Some(123)),
            "{} changed size",
            img.name
        );
    }
    assert_root_empty(tmp.path());
}

#[tokio::test]
async fn test_svg_to_png() {
    let tmp = tempfile::tempdir().unwrap();
    let c = converter(tmp.path());
    e2e_skip_unless_ready!(c, [EngineKind::Image]);

    let out = c
        .convert(SVG, Some("badge.svg"), "png", &ConversionOptions::default().with_dpi(96))
        .await
        .expect("svg → png should succeed");

    assert_eq!(out.source.format, Format::Svg);
    assert!(out.artifacts[0].width.unwrap_or(0) > 0);
    assert_root_empty(tmp.path());
}

// ── Engine check ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_engine_check_reports_versions() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let tmp = tempfile::tempdir().unwrap();
    let statuses = converter(tmp.path()).probe_engines().await;
    assert_eq!(statuses.len(), 3);
    for s in &statuses {
        println!(
            "{:<6} {} ({}) → {:?}",
            s.engine,
            s.program.display(),
            s.source,
            s.version.as_deref().or(s.detail.as_deref())
        );
        if s.available {
            assert!(s.version.is_some());
        }
    }
}
