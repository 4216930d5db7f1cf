//! The job orchestrator.
//!
//! [`Converter`] owns everything shared between jobs (the admission gate,
//! the workspace manager and the resolved engine adapters) and drives each
//! job through its lifecycle:
//!
//! 1. validate the request, classify the input and plan the route
//! 2. take an admission slot
//! 3. acquire a private workspace and stage the input
//! 4. run every hop in order, feeding each hop's outputs to the next
//! 5. read the final outputs back as [`Artifact`]s
//! 6. release the workspace, whatever happened
//!
//! Requests that fail in step 1 never touch the filesystem.

use crate::admission::Admission;
use crate::config::{ConversionOptions, ConverterConfig, PageSelection, WebpMode};
use crate::engine::{
    self, image, CommandSpec, EngineAdapter, EngineKind, HopRequest, ImageAdapter, OfficeAdapter,
    PdfAdapter, ProcessLimits,
};
use crate::error::ConvertError;
use crate::format::{self, Format, FormatDescriptor};
use crate::job::{ConversionJob, JobStatus};
use crate::output::{
    artifact_name, artifact_stem, Artifact, ConversionOutput, ConversionStats, EngineStatus,
    HopReport,
};
use crate::route::{self, ConversionRoute, Hop};
use crate::workspace::{Workspace, WorkspaceManager};
use chrono::Utc;
use engine_locate::{Located, Source};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// `-list format` prints a few hundred lines.
const FORMAT_LIST_LIMIT: usize = 256 * 1024;

/// One entry of a [`Converter::convert_batch`] call.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub bytes: Vec<u8>,
    pub declared_name: Option<String>,
    pub target: String,
    pub options: ConversionOptions,
}

impl ConversionRequest {
    pub fn new(bytes: Vec<u8>, declared_name: Option<&str>, target: impl Into<String>) -> Self {
        Self {
            bytes,
            declared_name: declared_name.map(str::to_string),
            target: target.into(),
            options: ConversionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConversionOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug)]
struct Engines {
    office: Arc<dyn EngineAdapter>,
    pdf: Arc<dyn EngineAdapter>,
    image: Arc<dyn EngineAdapter>,
}

impl Engines {
    fn get(&self, kind: EngineKind) -> &Arc<dyn EngineAdapter> {
        match kind {
            EngineKind::Office => &self.office,
            EngineKind::Pdf => &self.pdf,
            EngineKind::Image => &self.image,
        }
    }
}

#[derive(Debug)]
struct Inner {
    config: ConverterConfig,
    workspaces: WorkspaceManager,
    admission: Admission,
    engines: Engines,
    /// Whether the ImageMagick build writes WebP; learned on first need.
    webp_support: tokio::sync::OnceCell<bool>,
}

/// Converts documents by driving external engines along a planned route.
///
/// Cheap to clone; clones share the admission limit and engine binaries.
///
/// # Example
///
/// ```rust,no_run
/// use docforge::{ConversionOptions, Converter, ConverterConfig};
///
/// # async fn run() -> Result<(), docforge::ConvertError> {
/// let converter = Converter::new(ConverterConfig::default())?;
/// let bytes = std::fs::read("report.docx").unwrap();
/// let out = converter
///     .convert(&bytes, Some("report.docx"), "pdf", &ConversionOptions::default())
///     .await?;
/// println!("{} via {}", out.artifacts[0].name, out.route);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    inner: Arc<Inner>,
}

fn resolve_engine(kind: EngineKind, explicit: Option<&PathBuf>) -> Result<Located, ConvertError> {
    let tool = kind.tool();
    match explicit {
        Some(path) => engine_locate::from_explicit(tool, path)
            .map_err(|e| ConvertError::InvalidRequest(format!("{kind} engine: {e}"))),
        None => {
            let located = engine_locate::locate_or_fallback(tool);
            if located.source == Source::Fallback {
                warn!(
                    "{} engine not found; will try '{}' at conversion time",
                    kind,
                    located.program.display()
                );
            } else {
                debug!(
                    "{} engine: {} ({})",
                    kind,
                    located.program.display(),
                    located.source
                );
            }
            Ok(located)
        }
    }
}

impl Converter {
    /// Resolve engine binaries and set up shared state.
    ///
    /// Missing engines are not an error here; they surface as
    /// [`ConvertError::EngineExecution`] when a route first needs them, and
    /// [`Converter::probe_engines`] reports them up front.
    pub fn new(config: ConverterConfig) -> Result<Self, ConvertError> {
        let office = resolve_engine(EngineKind::Office, config.engines.office.as_ref())?;
        let pdf = resolve_engine(EngineKind::Pdf, config.engines.pdf.as_ref())?;
        let image = resolve_engine(EngineKind::Image, config.engines.image.as_ref())?;
        let engines = Engines {
            office: Arc::new(OfficeAdapter::new(office)),
            pdf: Arc::new(PdfAdapter::new(pdf)),
            image: Arc::new(ImageAdapter::new(image)),
        };

        let inner = Inner {
            workspaces: WorkspaceManager::new(config.workspace_root.clone()),
            admission: Admission::new(config.max_concurrent_jobs, config.admission),
            engines,
            webp_support: tokio::sync::OnceCell::new(),
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.inner.config
    }

    /// Jobs currently holding an admission slot.
    pub fn in_flight(&self) -> usize {
        self.inner.admission.in_flight()
    }

    /// Classify `bytes` without converting anything.
    pub fn inspect(
        &self,
        bytes: &[u8],
        declared_name: Option<&str>,
    ) -> Result<FormatDescriptor, ConvertError> {
        format::classify(bytes, declared_name)
    }

    /// Classify `bytes` and plan the route to `target` without running it.
    pub fn plan(
        &self,
        bytes: &[u8],
        declared_name: Option<&str>,
        target: &str,
    ) -> Result<ConversionRoute, ConvertError> {
        let target = Format::parse_target(target)?;
        let source = format::classify(bytes, declared_name)?;
        route::route(&source, target)
    }

    /// Convert `bytes` to `target` (an extension such as `"pdf"` or `"png"`).
    pub async fn convert(
        &self,
        bytes: &[u8],
        declared_name: Option<&str>,
        target: &str,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, ConvertError> {
        let cancel = CancellationToken::new();
        self.convert_cancellable(bytes, declared_name, target, options, &cancel)
            .await
    }

    /// Like [`Converter::convert`], aborting when `cancel` fires. A running
    /// engine process is killed and the workspace removed before this
    /// returns [`ConvertError::Cancelled`].
    pub async fn convert_cancellable(
        &self,
        bytes: &[u8],
        declared_name: Option<&str>,
        target: &str,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<ConversionOutput, ConvertError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let config = &self.inner.config;

        // ── Validate and plan before any resource is taken ───────────────
        options.validate()?;
        if bytes.len() > config.max_input_bytes {
            return Err(ConvertError::InvalidRequest(format!(
                "input is {} bytes; the limit is {}",
                bytes.len(),
                config.max_input_bytes
            )));
        }
        let target = Format::parse_target(target)?;
        let source = format::classify(bytes, declared_name)?;
        let route = route::route(&source, target)?;
        let route = self.finish_route(route, &source, options, cancel).await?;
        let target = route.target();

        let mut job = ConversionJob::new(
            declared_name.map(str::to_string),
            target,
            options.clone(),
            bytes.len(),
        );
        let job_id = job.id.to_string();
        info!(job = %job.id, "Starting conversion: {}", route);

        // ── Admission ────────────────────────────────────────────────────
        let _permit = match self.inner.admission.admit(cancel).await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(job = %job.id, "Not admitted: {}", e);
                job.fail(e.kind());
                return Err(e);
            }
        };
        if let Some(ref cb) = config.progress_callback {
            cb.on_job_start(&job_id, route.len());
        }

        // ── Workspace lifetime ───────────────────────────────────────────
        let result = match self.inner.workspaces.acquire(job.id).await {
            Ok(workspace) => {
                let result = self
                    .run_job(&mut job, &workspace, bytes, &source, &route, cancel)
                    .await;
                self.inner.workspaces.release(workspace).await;
                result
            }
            Err(e) => Err(e),
        };

        let result = match result {
            Ok((artifacts, hops)) => {
                job.transition(JobStatus::Succeeded);
                let output_bytes = artifacts.iter().map(Artifact::len).sum();
                let stats = ConversionStats {
                    hops,
                    total_duration_ms: started.elapsed().as_millis() as u64,
                    input_bytes: bytes.len(),
                    output_bytes,
                    started_at: Some(started_at),
                    finished_at: Some(Utc::now()),
                };
                info!(
                    job = %job.id,
                    "Conversion complete: {} artifact(s), {} bytes, {}ms",
                    artifacts.len(),
                    stats.output_bytes,
                    stats.total_duration_ms
                );
                Ok(ConversionOutput {
                    job_id: job.id,
                    source,
                    target,
                    route,
                    artifacts,
                    stats,
                    history: job.history().to_vec(),
                })
            }
            Err(e) => {
                job.fail(e.kind());
                warn!(job = %job.id, "Conversion failed ({}): {}", e.kind(), e);
                Err(e)
            }
        };

        if let Some(ref cb) = config.progress_callback {
            match &result {
                Ok(out) => cb.on_job_complete(&job_id, out.artifacts.len(), None),
                Err(e) => cb.on_job_complete(&job_id, 0, Some(e.kind())),
            }
        }
        result
    }

    /// Adjust a planned route to the request: WebP fallback, margin
    /// trimming, and options that the route cannot honour.
    async fn finish_route(
        &self,
        mut route: ConversionRoute,
        source: &FormatDescriptor,
        options: &ConversionOptions,
        cancel: &CancellationToken,
    ) -> Result<ConversionRoute, ConvertError> {
        if route.target() == Format::Webp && !self.image_writes_webp(cancel).await? {
            if !self.inner.config.webp_fallback {
                return Err(ConvertError::UnsupportedConversion {
                    from: source.format.to_string(),
                    to: "webp (ImageMagick has no WebP encoder)".into(),
                });
            }
            warn!("ImageMagick cannot write WebP; delivering PNG instead");
            route = route::route(source, Format::Png)?;
        }

        if options.trim_margins.is_some() {
            if !route.target().is_raster() {
                return Err(ConvertError::InvalidRequest(format!(
                    "margin trimming needs an image target, not {}",
                    route.target()
                )));
            }
            route = route.with_image_pass();
        }

        if options.pages != PageSelection::All
            && !route.hops().iter().any(|h| h.engine == EngineKind::Pdf)
        {
            return Err(ConvertError::InvalidRequest(format!(
                "page selection needs a route that rasterises a PDF; {route} does not"
            )));
        }
        Ok(route)
    }

    /// Ask ImageMagick once whether it can write WebP. A build that cannot
    /// be asked is assumed capable; the conversion itself then reports
    /// whatever is wrong with it.
    async fn image_writes_webp(&self, cancel: &CancellationToken) -> Result<bool, ConvertError> {
        let listed = self
            .inner
            .webp_support
            .get_or_try_init(|| async {
                let binary = self.inner.engines.image.binary();
                let spec = image::list_formats_command(binary).cwd(std::env::temp_dir());
                let limits = ProcessLimits {
                    timeout: PROBE_TIMEOUT,
                    kill_grace: self.inner.config.kill_grace,
                    capture_limit: FORMAT_LIST_LIMIT,
                };
                let outcome =
                    engine::process::run_bounded(EngineKind::Image, &spec, &limits, cancel).await?;
                if !outcome.status.success() {
                    return Err(ConvertError::EngineExecution {
                        engine: EngineKind::Image,
                        exit_code: outcome.status.code(),
                        diagnostic: outcome.diagnostic(256),
                    });
                }
                let writes = image::lists_format(&outcome.stdout.text(), "WEBP");
                debug!("ImageMagick WebP support: {}", writes);
                Ok(writes)
            })
            .await;
        match listed {
            Ok(writes) => Ok(*writes),
            Err(e @ ConvertError::Cancelled { .. }) => Err(e),
            Err(e) => {
                debug!("Could not list ImageMagick formats: {}", e);
                Ok(true)
            }
        }
    }

    #[instrument(skip_all, fields(job = %job.id))]
    async fn run_job(
        &self,
        job: &mut ConversionJob,
        workspace: &Workspace,
        bytes: &[u8],
        source: &FormatDescriptor,
        route: &ConversionRoute,
        cancel: &CancellationToken,
    ) -> Result<(Vec<Artifact>, Vec<HopReport>), ConvertError> {
        let staged = self
            .inner
            .workspaces
            .stage_input(workspace, bytes, source.format)
            .await?;
        job.transition(JobStatus::Staged);

        let total = route.len();
        let job_id = job.id.to_string();
        let dpi = if matches!(source.format, Format::Wmf | Format::Emf) {
            self.inner.config.metafile_dpi
        } else {
            job.options.dpi
        };
        let mut inputs = vec![staged];
        let mut reports = Vec::with_capacity(total);

        for (i, hop) in route.hops().iter().enumerate() {
            let index = i + 1;
            if cancel.is_cancelled() {
                return Err(ConvertError::cancelled(format!("before hop {index}")));
            }
            job.transition(JobStatus::Converting { hop: index });
            if let Some(ref cb) = self.inner.config.progress_callback {
                cb.on_hop_start(&job_id, index, total, hop.engine);
            }

            let (outputs, report) = self
                .run_hop(&job_id, workspace, hop, index, &inputs, &job.options, dpi, cancel)
                .await?;

            if let Some(ref cb) = self.inner.config.progress_callback {
                cb.on_hop_complete(&job_id, index, total, hop.engine, outputs.len());
            }
            reports.push(report);
            inputs = outputs;
        }

        if cancel.is_cancelled() {
            return Err(ConvertError::cancelled("collecting outputs"));
        }

        // Ghostscript output is per page; everything downstream keeps that.
        let paged = route.hops().iter().any(|h| h.engine == EngineKind::Pdf);
        let stem = artifact_stem(job.declared_name.as_deref());
        let mut artifacts = Vec::with_capacity(inputs.len());
        for (position, path) in inputs.iter().enumerate() {
            let data = self
                .inner
                .workspaces
                .collect_output(workspace, path)
                .await?;
            let page = paged.then(|| job.options.pages.page_number(position));
            let name = artifact_name(&stem, route.target(), page);
            artifacts.push(Artifact::new(name, route.target(), page, data));
        }
        Ok((artifacts, reports))
    }

    /// Run one hop, retrying once when the failure is transient and retries
    /// are enabled.
    #[allow(clippy::too_many_arguments)]
    async fn run_hop(
        &self,
        job_id: &str,
        workspace: &Workspace,
        hop: &Hop,
        index: usize,
        inputs: &[PathBuf],
        options: &ConversionOptions,
        dpi: u32,
        cancel: &CancellationToken,
    ) -> Result<(Vec<PathBuf>, HopReport), ConvertError> {
        let config = &self.inner.config;
        let max_attempts = if hop.engine == EngineKind::Office && config.retry_office_timeout {
            2
        } else {
            1
        };
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let out_dir = workspace.hop_dir(index).await?;
            match self
                .attempt_hop(workspace, hop, inputs, &out_dir, options, dpi, cancel)
                .await
            {
                Ok(outputs) => {
                    let report = HopReport {
                        index,
                        engine: hop.engine,
                        input: hop.input,
                        output: hop.output,
                        attempts,
                        duration_ms: started.elapsed().as_millis() as u64,
                        outputs: outputs.len(),
                    };
                    debug!(
                        "Hop {} ({}) produced {} file(s) in {}ms",
                        index, hop, report.outputs, report.duration_ms
                    );
                    return Ok((outputs, report));
                }
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    warn!("Hop {} ({}) failed, retrying once: {}", index, hop, e);
                    if let Some(ref cb) = config.progress_callback {
                        cb.on_hop_retry(job_id, index, hop.engine, &e.to_string());
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One attempt at a hop: one engine invocation per input file, all
    /// inside the hop's time budget.
    #[allow(clippy::too_many_arguments)]
    async fn attempt_hop(
        &self,
        workspace: &Workspace,
        hop: &Hop,
        inputs: &[PathBuf],
        out_dir: &Path,
        options: &ConversionOptions,
        dpi: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<PathBuf>, ConvertError> {
        let config = &self.inner.config;
        let adapter = self.inner.engines.get(hop.engine);
        let operation = hop
            .operation()
            .ok_or_else(|| ConvertError::UnsupportedConversion {
                from: hop.input.to_string(),
                to: hop.output.to_string(),
            })?;
        let budget = config.timeout_for(hop.engine);
        let deadline = Instant::now() + budget;
        let hop_timeout = || ConvertError::EngineTimeout {
            engine: hop.engine,
            timeout_ms: budget.as_millis() as u64,
        };

        let limits_now = || {
            let remaining = deadline.saturating_duration_since(Instant::now());
            (!remaining.is_zero())
                .then(|| ProcessLimits {
                    timeout: remaining,
                    kill_grace: config.kill_grace,
                    capture_limit: config.diagnostic_limit,
                })
                .ok_or_else(hop_timeout)
        };
        let on_budget = |e: ConvertError| match e {
            ConvertError::EngineTimeout { .. } => hop_timeout(),
            other => other,
        };

        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let lossless = if hop.engine == EngineKind::Image && hop.output == Format::Webp {
                match options.webp {
                    WebpMode::Lossless => true,
                    WebpMode::Lossy => false,
                    WebpMode::Auto => self
                        .prefers_lossless(workspace, input, &limits_now()?, cancel)
                        .await
                        .map_err(on_budget)?,
                }
            } else {
                false
            };
            let request = HopRequest {
                hop,
                operation,
                input,
                out_dir,
                workspace: workspace.path(),
                options,
                dpi,
                lossless,
            };
            let produced = engine::invoke(adapter.as_ref(), &request, &limits_now()?, cancel)
                .await
                .map_err(on_budget)?;
            outputs.extend(produced);
        }
        Ok(outputs)
    }

    /// Pick the WebP encoder for one image from what `identify` says about
    /// it. Anything short of a clear answer means lossy.
    async fn prefers_lossless(
        &self,
        workspace: &Workspace,
        input: &Path,
        limits: &ProcessLimits,
        cancel: &CancellationToken,
    ) -> Result<bool, ConvertError> {
        let binary = self.inner.engines.image.binary();
        let size = tokio::fs::metadata(input)
            .await
            .map(|m| m.len())
            .unwrap_or(u64::MAX);
        let spec = image::identify_command(binary, input, size <= image::COLOR_COUNT_MAX_BYTES)
            .cwd(workspace.path());

        let run = engine::process::run_bounded(EngineKind::Image, &spec, limits, cancel).await;
        let outcome = match run {
            Ok(outcome) => outcome,
            Err(e @ (ConvertError::Cancelled { .. } | ConvertError::EngineTimeout { .. })) => {
                return Err(e)
            }
            Err(e) => {
                debug!("identify failed, encoding lossy: {}", e);
                return Ok(false);
            }
        };
        if !outcome.status.success() {
            debug!(
                "identify exited with {}, encoding lossy: {}",
                outcome.status,
                outcome.diagnostic(256).text
            );
            return Ok(false);
        }
        let traits = image::ImageTraits::parse(&outcome.stdout.text());
        let lossless = traits.as_ref().is_some_and(image::ImageTraits::prefers_lossless);
        debug!(?traits, lossless, "Chose WebP encoder for {}", input.display());
        Ok(lossless)
    }

    /// Convert many inputs, at most `max_concurrent_jobs` at a time.
    /// Results come back in request order.
    pub async fn convert_batch(
        &self,
        requests: Vec<ConversionRequest>,
    ) -> Vec<Result<ConversionOutput, ConvertError>> {
        let concurrency = self.inner.config.max_concurrent_jobs;
        let mut results: Vec<(usize, Result<ConversionOutput, ConvertError>)> =
            stream::iter(requests.into_iter().enumerate())
                .map(|(i, req)| async move {
                    let result = self
                        .convert(
                            &req.bytes,
                            req.declared_name.as_deref(),
                            &req.target,
                            &req.options,
                        )
                        .await;
                    (i, result)
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;
        results.sort_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, r)| r).collect()
    }

    /// Convert and write every artifact into `dir`.
    ///
    /// Each file is written to a temporary name and renamed into place, so a
    /// reader never sees a partial artifact.
    pub async fn convert_to_dir(
        &self,
        bytes: &[u8],
        declared_name: Option<&str>,
        target: &str,
        options: &ConversionOptions,
        dir: impl AsRef<Path>,
    ) -> Result<(ConversionOutput, Vec<PathBuf>), ConvertError> {
        let output = self.convert(bytes, declared_name, target, options).await?;
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ConvertError::workspace("create output directory", dir, e))?;

        let mut written = Vec::with_capacity(output.artifacts.len());
        for artifact in &output.artifacts {
            let path = dir.join(&artifact.name);
            let tmp_path = dir.join(format!(".{}.tmp", artifact.name));
            tokio::fs::write(&tmp_path, &artifact.bytes)
                .await
                .map_err(|e| ConvertError::workspace("write artifact", &tmp_path, e))?;
            tokio::fs::rename(&tmp_path, &path)
                .await
                .map_err(|e| ConvertError::workspace("write artifact", &path, e))?;
            written.push(path);
        }
        Ok((output, written))
    }

    /// Synchronous wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime; do not call from async code.
    pub fn convert_blocking(
        &self,
        bytes: &[u8],
        declared_name: Option<&str>,
        target: &str,
        options: &ConversionOptions,
    ) -> Result<ConversionOutput, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::workspace("start runtime", Path::new("."), e))?
            .block_on(self.convert(bytes, declared_name, target, options))
    }

    /// Run each engine's version command and report what answers.
    pub async fn probe_engines(&self) -> Vec<EngineStatus> {
        let probes = EngineKind::ALL.map(|kind| self.probe(kind));
        futures::future::join_all(probes).await
    }

    async fn probe(&self, kind: EngineKind) -> EngineStatus {
        let binary = self.inner.engines.get(kind).binary();
        let spec = CommandSpec::new(&binary.program)
            .arg(binary.tool.version_arg())
            .envs(&binary.env)
            .cwd(std::env::temp_dir());
        let limits = ProcessLimits {
            timeout: PROBE_TIMEOUT,
            kill_grace: self.inner.config.kill_grace,
            capture_limit: 4096,
        };
        let cancel = CancellationToken::new();

        let mut status = EngineStatus {
            engine: kind,
            program: binary.program.clone(),
            source: binary.source.to_string(),
            available: false,
            version: None,
            detail: None,
        };
        match engine::process::run_bounded(kind, &spec, &limits, &cancel).await {
            Ok(outcome) if outcome.status.success() => {
                let text = if outcome.stdout.bytes.is_empty() {
                    outcome.stderr.text()
                } else {
                    outcome.stdout.text()
                };
                status.available = true;
                status.version = text
                    .lines()
                    .map(str::trim)
                    .find(|l| !l.is_empty())
                    .map(str::to_string);
            }
            Ok(outcome) => {
                status.detail = Some(format!(
                    "exited with {}: {}",
                    outcome.status,
                    outcome.diagnostic(256).text
                ));
            }
            Err(e) => status.detail = Some(e.to_string()),
        }
        status
    }
}
