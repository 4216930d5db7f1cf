//! CLI binary for docforge.
//!
//! A thin shim over the library crate that maps CLI flags to a
//! `ConverterConfig` plus `ConversionOptions` and writes the artifacts.

use anyhow::{Context, Result};
use clap::Parser;
use docforge::input::{resolve_input, ResolvedInput};
use docforge::{
    ConversionOptions, ConversionOutput, ConversionProgressCallback, ConvertError, Converter,
    ConverterConfig, EngineKind, ErrorKind, PageSelection, ProgressCallback, Resize, WebpMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner for the single job the CLI runs; hop lines are printed above
/// it as they finish.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(bar: ProgressBar) -> Arc<Self> {
        let style =
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Classifying input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_job_start(&self, _job_id: &str, total_hops: usize) {
        self.bar.set_prefix("Converting");
        self.bar.set_message(format!("{total_hops} hop(s)"));
    }

    fn on_hop_start(&self, _job_id: &str, hop: usize, total_hops: usize, engine: EngineKind) {
        self.bar
            .set_message(format!("hop {hop}/{total_hops}: {engine} engine"));
    }

    fn on_hop_retry(&self, _job_id: &str, hop: usize, engine: EngineKind, error: &str) {
        self.bar.println(format!(
            "  {} Hop {} ({}) retrying: {}",
            cyan("↻"),
            hop,
            engine,
            dim(error)
        ));
    }

    fn on_hop_complete(
        &self,
        _job_id: &str,
        hop: usize,
        total_hops: usize,
        engine: EngineKind,
        outputs: usize,
    ) {
        self.bar.println(format!(
            "  {} Hop {}/{}  {:<6}  {}",
            green("✓"),
            hop,
            total_hops,
            engine,
            dim(&format!("{outputs} file(s)")),
        ));
    }

    fn on_job_complete(&self, _job_id: &str, _artifacts: usize, error: Option<ErrorKind>) {
        self.bar.finish_and_clear();
        if let Some(kind) = error {
            eprintln!("{} conversion failed ({})", red("✘"), kind);
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Office document to PDF
  docforge report.docx --to pdf -o out/

  # Every page of a PDF as PNG at 200 DPI
  docforge slides.pdf --to png --dpi 200 -o pages/

  # Pages 2-4 of a spreadsheet as JPEG (Office → PDF → JPEG)
  docforge budget.xlsx --to jpg --pages 2-4 -o out/

  # Resize and re-encode an image
  docforge photo.tiff --to webp --resize 1200x --quality 80 -o out/

  # Slide pages as PNG with the white margins cut down to 10px
  docforge deck.pptx --to png --trim -o out/

  # What is this file, and how would it be converted?
  docforge --inspect-only mystery.bin --to pdf

  # Which engines are installed?
  docforge --check-engines

ENGINES:
  Office       LibreOffice (soffice)          office documents → PDF/PNG/SVG
  PDF          Ghostscript (gs)               PDF → PNG/JPEG/TIFF per page
  Image        ImageMagick (magick/convert)   raster/vector transforms

ENVIRONMENT VARIABLES:
  DOCFORGE_OFFICE_BIN, SOFFICE_BIN    Office engine binary or directory
  DOCFORGE_GS_BIN, GS_BIN             Ghostscript binary or directory
  IMAGEMAGICK_BIN, MAGICK_BIN         ImageMagick binary or directory
  RUST_LOG                            Log filter (overrides -v / -q)
"#;

/// Convert documents and images with LibreOffice, Ghostscript and ImageMagick.
#[derive(Parser, Debug)]
#[command(
    name = "docforge",
    version,
    about = "Convert documents and images with LibreOffice, Ghostscript and ImageMagick",
    long_about = "Convert office documents, PDFs and images (local files or URLs) to PDF or \
raster formats. The input is classified by content, a route through one or more external \
engines is planned, and every engine runs in its own throwaway workspace with a timeout.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "check_engines")]
    input: Option<String>,

    /// Target format: pdf, png, jpg, webp, tiff, gif, bmp, svg, docx, …
    #[arg(
        short,
        long,
        env = "DOCFORGE_TO",
        required_unless_present_any = ["check_engines", "inspect_only"]
    )]
    to: Option<String>,

    /// Directory to write artifacts into.
    #[arg(short, long, env = "DOCFORGE_OUTPUT", default_value = ".")]
    output: PathBuf,

    /// Rasterisation DPI (72–1200).
    #[arg(long, env = "DOCFORGE_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=1200))]
    dpi: u32,

    /// Page selection: all, 5, 3-15, or 1,3,5,7.
    #[arg(long, env = "DOCFORGE_PAGES", default_value = "all")]
    pages: String,

    /// Lossy encoder quality (1–100).
    #[arg(long, env = "DOCFORGE_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Resize bounding box: WxH, Wx or xH.
    #[arg(long, env = "DOCFORGE_RESIZE")]
    resize: Option<String>,

    /// WebP encoder: auto (lossless for diagrams and transparency), lossy
    /// or lossless.
    #[arg(long, env = "DOCFORGE_WEBP", default_value = "auto")]
    webp: WebpMode,

    /// Shorthand for --webp lossless.
    #[arg(long, env = "DOCFORGE_LOSSLESS", conflicts_with = "webp")]
    lossless: bool,

    /// Trim white margins, then pad with a white border of PAD pixels.
    #[arg(long, env = "DOCFORGE_TRIM", value_name = "PAD", num_args = 0..=1,
          default_missing_value = "10",
          value_parser = clap::value_parser!(u32).range(0..=1000))]
    trim: Option<u32>,

    /// Rasterisation DPI for WMF/EMF sources (72–1200).
    #[arg(long, env = "DOCFORGE_METAFILE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=1200))]
    metafile_dpi: u32,

    /// Fail instead of writing PNG when ImageMagick cannot encode WebP.
    #[arg(long, env = "DOCFORGE_NO_WEBP_FALLBACK")]
    no_webp_fallback: bool,

    /// Keep EXIF and other metadata in image output.
    #[arg(long, env = "DOCFORGE_KEEP_METADATA")]
    keep_metadata: bool,

    /// Output structured JSON (ConversionOutput or ErrorReport).
    #[arg(long, env = "DOCFORGE_JSON")]
    json: bool,

    /// Classify the input and print the planned route, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Probe the engines and exit.
    #[arg(long)]
    check_engines: bool,

    /// Root directory for per-job workspaces.
    #[arg(long, env = "DOCFORGE_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Maximum concurrent jobs.
    #[arg(long, env = "DOCFORGE_MAX_JOBS", default_value_t = 4)]
    max_jobs: usize,

    /// Office engine timeout per hop, in seconds.
    #[arg(long, env = "DOCFORGE_OFFICE_TIMEOUT", default_value_t = 120)]
    office_timeout: u64,

    /// Ghostscript timeout per hop, in seconds.
    #[arg(long, env = "DOCFORGE_PDF_TIMEOUT", default_value_t = 60)]
    pdf_timeout: u64,

    /// ImageMagick timeout per hop, in seconds.
    #[arg(long, env = "DOCFORGE_IMAGE_TIMEOUT", default_value_t = 60)]
    image_timeout: u64,

    /// Do not retry an Office hop that timed out.
    #[arg(long, env = "DOCFORGE_NO_RETRY")]
    no_retry: bool,

    /// Office engine binary (overrides PATH lookup).
    #[arg(long)]
    office_bin: Option<PathBuf>,

    /// Ghostscript binary (overrides PATH lookup).
    #[arg(long)]
    gs_bin: Option<PathBuf>,

    /// ImageMagick binary (overrides PATH lookup).
    #[arg(long)]
    magick_bin: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCFORGE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCFORGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCFORGE_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCFORGE_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs from
    // tearing through it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, cli.json);
            ExitCode::FAILURE
        }
    }
}

/// Print a conversion failure as its structured report; anything else as
/// an anyhow chain.
fn report_error(err: &anyhow::Error, json: bool) {
    match err.downcast_ref::<ConvertError>() {
        Some(e) => {
            let report = e.report();
            if json {
                match serde_json::to_string_pretty(&report) {
                    Ok(s) => println!("{s}"),
                    Err(_) => eprintln!("{}: {}", report.kind, report.detail),
                }
            } else {
                eprintln!("{} {}: {}", red("error"), bold(&report.kind.to_string()), report.detail);
                if report.truncated {
                    eprintln!("  {}", dim("(diagnostic truncated)"));
                }
            }
        }
        None => eprintln!("{} {:#}", red("error"), err),
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let config = build_config(cli)?;

    // ── Engine check ─────────────────────────────────────────────────────
    if cli.check_engines {
        let converter = Converter::new(config)?;
        let statuses = converter.probe_engines().await;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&statuses).context("Failed to serialise engine status")?
            );
        } else {
            for s in &statuses {
                let mark = if s.available { green("✔") } else { red("✘") };
                println!(
                    "{} {:<6} {}  {}",
                    mark,
                    s.engine,
                    s.program.display(),
                    dim(&format!("({})", s.source))
                );
                if let Some(ref v) = s.version {
                    println!("         {v}");
                }
                if let Some(ref d) = s.detail {
                    println!("         {}", red(d));
                }
            }
        }
        if statuses.iter().any(|s| !s.available) {
            anyhow::bail!("one or more engines are unavailable");
        }
        return Ok(());
    }

    // clap guarantees INPUT unless --check-engines.
    let input_arg = cli.input.as_deref().context("missing INPUT")?;
    let input = resolve_input(
        input_arg,
        Duration::from_secs(cli.download_timeout),
        config.max_input_bytes,
    )
    .await?;
    let name = input.declared_name.as_deref();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let converter = Converter::new(config)?;
        let descriptor = converter.inspect(&input.bytes, name)?;
        let route = match cli.to.as_deref() {
            Some(to) => Some(converter.plan(&input.bytes, name, to)?),
            None => None,
        };
        if cli.json {
            let value = serde_json::json!({ "source": descriptor, "route": route });
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("Failed to serialise descriptor")?
            );
        } else {
            println!("Input:        {}", input_arg);
            println!("Format:       {} ({:?})", descriptor.format, descriptor.family);
            println!("Derived from: {:?}", descriptor.derivation);
            println!("Confidence:   {:?}", descriptor.confidence);
            if let Some(declared) = descriptor.declared {
                println!("Declared:     {}", declared);
            }
            if let Some(route) = route {
                println!("Route:        {}", route);
            }
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let target = cli.to.as_deref().context("missing --to")?;
    let options = build_options(cli)?;

    let spinner = show_progress.then(CliProgressCallback::new);
    let (output, paths) = convert(config, spinner, &input, target, &options, &cli.output).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        for path in &paths {
            println!("{}", path.display());
        }
        eprintln!(
            "{}  {}  {} file(s)  {}ms",
            green("✔"),
            output.route,
            paths.len(),
            output.stats.total_duration_ms,
        );
    }
    Ok(())
}

/// Run the conversion, with `spinner` attached for its duration.
async fn convert(
    mut config: ConverterConfig,
    spinner: Option<Arc<CliProgressCallback>>,
    input: &ResolvedInput,
    target: &str,
    options: &ConversionOptions,
    dir: &std::path::Path,
) -> Result<(ConversionOutput, Vec<PathBuf>), ConvertError> {
    config.progress_callback = spinner.clone().map(|s| s as ProgressCallback);
    let result = match Converter::new(config) {
        Ok(converter) => {
            converter
                .convert_to_dir(&input.bytes, input.declared_name.as_deref(), target, options, dir)
                .await
        }
        Err(e) => Err(e),
    };
    // Failures before admission never reach on_job_complete.
    if let Some(spinner) = spinner {
        spinner.bar.finish_and_clear();
    }
    result
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .max_concurrent_jobs(cli.max_jobs)
        .office_timeout(Duration::from_secs(cli.office_timeout))
        .pdf_timeout(Duration::from_secs(cli.pdf_timeout))
        .image_timeout(Duration::from_secs(cli.image_timeout))
        .retry_office_timeout(!cli.no_retry)
        .metafile_dpi(cli.metafile_dpi)
        .webp_fallback(!cli.no_webp_fallback);

    if let Some(ref root) = cli.workspace_root {
        builder = builder.workspace_root(root);
    }
    if let Some(ref p) = cli.office_bin {
        builder = builder.office_binary(p);
    }
    if let Some(ref p) = cli.gs_bin {
        builder = builder.pdf_binary(p);
    }
    if let Some(ref p) = cli.magick_bin {
        builder = builder.image_binary(p);
    }
    builder.build().context("Invalid configuration")
}

/// Map CLI args to per-request `ConversionOptions`.
fn build_options(cli: &Cli) -> Result<ConversionOptions> {
    let pages: PageSelection = cli.pages.parse()?;
    let mut options = ConversionOptions::default()
        .with_dpi(cli.dpi)
        .with_pages(pages);
    if let Some(q) = cli.quality {
        options = options.with_quality(q);
    }
    if let Some(ref r) = cli.resize {
        let resize: Resize = r.parse()?;
        options = options.with_resize(resize);
    }
    options = options.with_webp(if cli.lossless {
        WebpMode::Lossless
    } else {
        cli.webp
    });
    if let Some(padding) = cli.trim {
        options = options.with_trim_margins(padding);
    }
    options.strip_metadata = !cli.keep_metadata;
    options.validate()?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("docforge").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn image_flags_map_to_options() {
        let options = build_options(&parse(&["a.png", "--to", "webp"])).unwrap();
        assert_eq!(options.webp, WebpMode::Auto);
        assert_eq!(options.trim_margins, None);

        let options = build_options(&parse(&["a.png", "--to", "webp", "--lossless", "--trim"]))
            .unwrap();
        assert_eq!(options.webp, WebpMode::Lossless);
        assert_eq!(options.trim_margins, Some(10));

        let options =
            build_options(&parse(&["a.png", "--to", "png", "--webp", "lossy", "--trim", "0"]))
                .unwrap();
        assert_eq!(options.webp, WebpMode::Lossy);
        assert_eq!(options.trim_margins, Some(0));

        let clash = ["docforge", "a.png", "--to", "webp", "--webp", "lossy", "--lossless"];
        assert!(Cli::try_parse_from(clash).is_err());
    }

    #[test]
    fn engine_flags_map_to_config() {
        let cli = parse(&["a.wmf", "--to", "png", "--metafile-dpi", "600", "--no-webp-fallback"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.metafile_dpi, 600);
        assert!(!config.webp_fallback);
        assert!(config.progress_callback.is_none());
    }

    #[tokio::test]
    async fn spinner_is_cleared_when_the_job_fails_early() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConverterConfig::builder()
            .workspace_root(tmp.path().join("ws"))
            .build()
            .unwrap();
        let spinner = CliProgressCallback::with_bar(ProgressBar::hidden());
        let input = ResolvedInput {
            bytes: b"%PDF-1.7\n".to_vec(),
            declared_name: Some("a.pdf".into()),
        };

        let err = convert(
            config,
            Some(spinner.clone()),
            &input,
            "xyz",
            &ConversionOptions::default(),
            tmp.path(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
        assert!(spinner.bar.is_finished());
    }
}
