//! Ghostscript adapter: PDF pages to raster images.

use crate::engine::process::CommandSpec;
use crate::engine::{EngineAdapter, EngineCommand, EngineKind, ExpectedOutput, HopRequest};
use crate::error::ConvertError;
use crate::format::Format;
use crate::route::Operation;
use engine_locate::Located;

/// Prefix of the numbered page files Ghostscript writes.
pub const PAGE_PREFIX: &str = "page-";

/// Ghostscript output device for a raster target.
pub fn device(target: Format) -> Option<&'static str> {
    match target {
        Format::Png => Some("png16m"),
        Format::Jpeg => Some("jpeg"),
        Format::Tiff => Some("tiff24nc"),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct PdfAdapter {
    binary: Located,
}

impl PdfAdapter {
    pub fn new(binary: Located) -> Self {
        Self { binary }
    }
}

impl EngineAdapter for PdfAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Pdf
    }

    fn binary(&self) -> &Located {
        &self.binary
    }

    fn command(&self, req: &HopRequest<'_>) -> Result<EngineCommand, ConvertError> {
        let target = req.hop.output;
        let Operation::Rasterize { device } = req.operation else {
            return Err(req.mismatch());
        };
        let opts = req.options;
        let ext = target.extension();

        let mut spec = CommandSpec::new(&self.binary.program)
            .args(["-dSAFER", "-dBATCH", "-dNOPAUSE", "-dQUIET"])
            .arg(format!("-sDEVICE={device}"))
            .arg(format!("-r{}", req.dpi))
            .args(["-dTextAlphaBits=4", "-dGraphicsAlphaBits=4"]);
        if target == Format::Jpeg {
            if let Some(q) = opts.quality {
                spec = spec.arg(format!("-dJPEGQ={q}"));
            }
        }
        if let Some(list) = opts.pages.to_page_list() {
            spec = spec.arg(format!("-sPageList={list}"));
        }
        let pattern = req.out_dir.join(format!("{PAGE_PREFIX}%04d.{ext}"));
        let mut output_arg = std::ffi::OsString::from("-sOutputFile=");
        output_arg.push(pattern.as_os_str());
        let spec = spec
            .arg(output_arg)
            .arg(req.input)
            .envs(&self.binary.env)
            .cwd(req.workspace);

        Ok(EngineCommand {
            spec,
            expected: ExpectedOutput::Sequence {
                dir: req.out_dir.to_path_buf(),
                prefix: PAGE_PREFIX.to_string(),
                ext,
            },
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::{ConversionOptions, PageSelection};
    use crate::route::Hop;
    use engine_locate::{Source, Tool};
    use std::path::{Path, PathBuf};

    fn command(options: &ConversionOptions, output: Format) -> EngineCommand {
        let adapter = PdfAdapter::new(Located {
            tool: Tool::Ghostscript,
            program: PathBuf::from("gs"),
            source: Source::Fallback,
            env: Vec::new(),
        });
        let hop = Hop {
            engine: EngineKind::Pdf,
            input: Format::Pdf,
            output,
        };
        let req = HopRequest {
            hop: &hop,
            operation: hop.operation().unwrap(),
            input: Path::new("/ws/j/hop-1/source.pdf"),
            out_dir: Path::new("/ws/j/hop-2"),
            workspace: Path::new("/ws/j"),
            options,
            dpi: options.dpi,
            lossless: false,
        };
        adapter.command(&req).unwrap()
    }

    fn args(cmd: &EngineCommand) -> Vec<String> {
        cmd.spec
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn png_at_requested_dpi() {
        let cmd = command(&ConversionOptions::default().with_dpi(300), Format::Png);
        let a = args(&cmd);
        assert!(a.contains(&"-dSAFER".to_string()));
        assert!(a.contains(&"-sDEVICE=png16m".to_string()));
        assert!(a.contains(&"-r300".to_string()));
        assert!(a.contains(&"-sOutputFile=/ws/j/hop-2/page-%04d.png".to_string()));
        assert!(!a.iter().any(|x| x.starts_with("-sPageList")));
        assert_eq!(a.last().unwrap(), "/ws/j/hop-1/source.pdf");
        assert!(matches!(cmd.expected, ExpectedOutput::Sequence { ext: "png", .. }));
    }

    #[test]
    fn jpeg_quality_and_page_list() {
        let opts = ConversionOptions::default()
            .with_quality(70)
            .with_pages(PageSelection::Range(2, 3));
        let a = args(&command(&opts, Format::Jpeg));
        assert!(a.contains(&"-sDEVICE=jpeg".to_string()));
        assert!(a.contains(&"-dJPEGQ=70".to_string()));
        assert!(a.contains(&"-sPageList=2-3".to_string()));
    }

    #[test]
    fn metafile_density_overrides_request_dpi() {
        let adapter = PdfAdapter::new(Located {
            tool: Tool::Ghostscript,
            program: PathBuf::from("gs"),
            source: Source::Fallback,
            env: Vec::new(),
        });
        let hop = Hop {
            engine: EngineKind::Pdf,
            input: Format::Pdf,
            output: Format::Png,
        };
        let options = ConversionOptions::default();
        let req = HopRequest {
            hop: &hop,
            operation: hop.operation().unwrap(),
            input: Path::new("/ws/j/hop-1/source.pdf"),
            out_dir: Path::new("/ws/j/hop-2"),
            workspace: Path::new("/ws/j"),
            options: &options,
            dpi: 300,
            lossless: false,
        };
        let a = args(&adapter.command(&req).unwrap());
        assert!(a.contains(&"-r300".to_string()));
        assert!(!a.contains(&"-r150".to_string()));
    }

    #[test]
    fn no_device_for_webp() {
        assert_eq!(device(Format::Webp), None);
        assert_eq!(device(Format::Tiff), Some("tiff24nc"));
    }
}
