//! LibreOffice adapter.
//!
//! LibreOffice keeps per-user state (registry, caches, a lock file) in a
//! profile directory. Two concurrent `soffice` processes sharing a profile
//! either block on each other or silently hand the job to the first
//! instance. Every invocation therefore gets the profile directory of its own
//! job workspace via `-env:UserInstallation`, and `HOME` is pointed into the
//! workspace as well so nothing lands in the service account's home.

use crate::engine::process::CommandSpec;
use crate::engine::{EngineAdapter, EngineCommand, EngineKind, ExpectedOutput, HopRequest};
use crate::error::ConvertError;
use crate::format::Format;
use crate::route::Operation;
use engine_locate::Located;
use std::path::Path;

/// Workspace subdirectory holding the job's LibreOffice profile.
pub const PROFILE_DIR: &str = "office-profile";
/// Workspace subdirectory used as `HOME` for the engine.
pub const HOME_DIR: &str = "home";

/// `--convert-to` filter for an Office export target.
pub fn export_filter(target: Format) -> Option<&'static str> {
    let filter = match target {
        Format::Pdf => "pdf",
        Format::Svg => "svg:draw_svg_Export",
        Format::Doc => "doc:MS Word 97",
        Format::Docx => "docx:MS Word 2007 XML",
        Format::Odt => "odt:writer8",
        Format::Rtf => "rtf:Rich Text Format",
        Format::Txt => "txt:Text (encoded):UTF8",
        Format::Xls => "xls:MS Excel 97",
        Format::Xlsx => "xlsx:Calc MS Excel 2007 XML",
        Format::Ods => "ods:calc8",
        Format::Csv => "csv:Text - txt - csv (StarCalc):44,34,76",
        Format::Ppt => "ppt:MS PowerPoint 97",
        Format::Pptx => "pptx:Impress MS PowerPoint 2007 XML",
        Format::Odp => "odp:impress8",
        _ => return None,
    };
    Some(filter)
}

#[derive(Debug, Clone)]
pub struct OfficeAdapter {
    binary: Located,
}

impl OfficeAdapter {
    pub fn new(binary: Located) -> Self {
        Self { binary }
    }
}

fn profile_url(workspace: &Path) -> Result<String, ConvertError> {
    let dir = workspace.join(PROFILE_DIR);
    reqwest::Url::from_directory_path(&dir)
        .map(|u| u.to_string())
        .map_err(|_| {
            ConvertError::InvalidRequest(format!(
                "office profile path '{}' is not absolute",
                dir.display()
            ))
        })
}

impl EngineAdapter for OfficeAdapter {
    fn kind(&self) -> EngineKind {
        EngineKind::Office
    }

    fn binary(&self) -> &Located {
        &self.binary
    }

    fn command(&self, req: &HopRequest<'_>) -> Result<EngineCommand, ConvertError> {
        let target = req.hop.output;
        let Operation::Export { filter } = req.operation else {
            return Err(req.mismatch());
        };

        let spec = CommandSpec::new(&self.binary.program)
            .args([
                "--headless",
                "--nologo",
                "--nodefault",
                "--nolockcheck",
                "--norestore",
                "--invisible",
            ])
            .arg(format!("-env:UserInstallation={}", profile_url(req.workspace)?))
            .arg("--convert-to")
            .arg(filter)
            .arg("--outdir")
            .arg(req.out_dir)
            .arg(req.input)
            .envs(&self.binary.env)
            .env("HOME", req.workspace.join(HOME_DIR))
            .cwd(req.workspace);

        let ext = target.extension();
        Ok(EngineCommand {
            spec,
            expected: ExpectedOutput::File {
                path: req.out_dir.join(format!("{}.{}", req.input_stem(), ext)),
                fallback_ext: Some(ext),
            },
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ConversionOptions;
    use crate::route::Hop;
    use engine_locate::{Source, Tool};
    use std::ffi::OsString;
    use std::path::PathBuf;

    fn adapter() -> OfficeAdapter {
        OfficeAdapter::new(Located {
            tool: Tool::Office,
            program: PathBuf::from("/usr/bin/soffice"),
            source: Source::Path,
            env: Vec::new(),
        })
    }

    #[test]
    fn builds_isolated_headless_command() {
        let hop = Hop {
            engine: EngineKind::Office,
            input: Format::Docx,
            output: Format::Pdf,
        };
        let options = ConversionOptions::default();
        let req = HopRequest {
            hop: &hop,
            operation: hop.operation().unwrap(),
            input: Path::new("/ws/job-1/input/source.docx"),
            out_dir: Path::new("/ws/job-1/hop-1"),
            workspace: Path::new("/ws/job-1"),
            options: &options,
            dpi: options.dpi,
            lossless: false,
        };
        let cmd = adapter().command(&req).unwrap();
        let args: Vec<OsString> = cmd.spec.args.clone();
        assert_eq!(args[0], "--headless");
        assert!(args.contains(&OsString::from(
            "-env:UserInstallation=file:///ws/job-1/office-profile/"
        )));
        let convert_to = args.iter().position(|a| a == "--convert-to").unwrap();
        assert_eq!(args[convert_to + 1], "pdf");
        assert_eq!(args.last().unwrap(), "/ws/job-1/input/source.docx");
        assert!(cmd
            .spec
            .env
            .contains(&(OsString::from("HOME"), OsString::from("/ws/job-1/home"))));
        assert_eq!(
            cmd.expected,
            ExpectedOutput::File {
                path: PathBuf::from("/ws/job-1/hop-1/source.pdf"),
                fallback_ext: Some("pdf"),
            }
        );
    }

    #[test]
    fn export_filter_comes_from_the_planned_operation() {
        let hop = Hop {
            engine: EngineKind::Office,
            input: Format::Pptx,
            output: Format::Odp,
        };
        let options = ConversionOptions::default();
        let mut req = HopRequest {
            hop: &hop,
            operation: hop.operation().unwrap(),
            input: Path::new("/ws/j/input/source.pptx"),
            out_dir: Path::new("/ws/j/hop-1"),
            workspace: Path::new("/ws/j"),
            options: &options,
            dpi: options.dpi,
            lossless: false,
        };
        let cmd = adapter().command(&req).unwrap();
        assert!(cmd.spec.args.contains(&OsString::from("odp:impress8")));

        req.operation = Operation::Transform;
        let err = adapter().command(&req).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedConversion);
    }

    #[test]
    fn svg_export_uses_draw_filter() {
        assert_eq!(export_filter(Format::Svg), Some("svg:draw_svg_Export"));
        assert_eq!(export_filter(Format::Png), None);
    }
}
