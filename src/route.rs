//! The conversion route table.
//!
//! A route is the ordered list of engine hops that turns a source format into
//! the requested target. Each hop declares the format it consumes and the
//! format it produces, and consecutive hops always agree.
//!
//! | Source            | Target                         | Hops                       |
//! |-------------------|--------------------------------|----------------------------|
//! | office            | pdf                            | Office                     |
//! | office            | office, same document class    | Office                     |
//! | office            | png, jpeg, tiff                | Office → PDF               |
//! | office            | webp, gif, bmp                 | Office → PDF(png) → Image  |
//! | pdf               | png, jpeg, tiff                | PDF                        |
//! | pdf               | webp, gif, bmp                 | PDF(png) → Image           |
//! | raster            | raster                         | Image                      |
//! | raster, svg       | pdf                            | Image                      |
//! | svg               | raster                         | Image                      |
//! | wmf, emf          | pdf, svg                       | Office                     |
//! | wmf, emf          | png, jpeg, tiff                | Office → PDF               |
//! | wmf, emf          | webp, gif, bmp                 | Office → PDF(png) → Image  |
//!
//! Any other pair is [`ConvertError::UnsupportedConversion`]; there is no
//! guessed fallback chain. Requests that transform the final image (margin
//! trimming) get an extra ImageMagick pass when the route does not already
//! end in one.

use crate::engine::{office, pdf, EngineKind};
use crate::error::ConvertError;
use crate::format::{Format, FormatDescriptor, FormatFamily};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an engine does in one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    /// Office export through the named filter.
    Export { filter: &'static str },
    /// Ghostscript rasterisation with the named output device.
    Rasterize { device: &'static str },
    /// ImageMagick format conversion and transforms.
    Transform,
}

/// One engine invocation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub engine: EngineKind,
    pub input: Format,
    pub output: Format,
}

impl Hop {
    fn new(engine: EngineKind, input: Format, output: Format) -> Self {
        Self {
            engine,
            input,
            output,
        }
    }

    /// Engine parameters for this hop. `None` only for hops the table never
    /// produces.
    pub fn operation(&self) -> Option<Operation> {
        match self.engine {
            EngineKind::Office => office::export_filter(self.output)
                .map(|filter| Operation::Export { filter }),
            EngineKind::Pdf => pdf::device(self.output).map(|device| Operation::Rasterize { device }),
            EngineKind::Image => Some(Operation::Transform),
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} → {}", self.engine, self.input, self.output)
    }
}

/// Ordered, non-empty chain of hops from `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionRoute {
    source: Format,
    target: Format,
    hops: Vec<Hop>,
}

impl ConversionRoute {
    pub fn source(&self) -> Format {
        self.source
    }

    pub fn target(&self) -> Format {
        self.target
    }

    pub fn hops(&self) -> &[Hop] {
        &self.hops
    }

    pub fn len(&self) -> usize {
        self.hops.len()
    }

    /// Always false: routes have at least one hop.
    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Make sure the last hop is an ImageMagick pass over the target, so
    /// image transforms apply to the final output. Routes already ending in
    /// ImageMagick are unchanged.
    pub(crate) fn with_image_pass(mut self) -> Self {
        if self.hops.last().map(|h| h.engine) != Some(EngineKind::Image) {
            self.hops
                .push(Hop::new(EngineKind::Image, self.target, self.target));
        }
        self
    }
}

impl fmt::Display for ConversionRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engines: Vec<String> = self.hops.iter().map(|h| h.engine.to_string()).collect();
        write!(f, "{} → {} via {}", self.source, self.target, engines.join(" → "))
    }
}

/// Compute the route for a classified input and a target format.
///
/// Deterministic and side-effect free; no engine runs here.
pub fn route(source: &FormatDescriptor, target: Format) -> Result<ConversionRoute, ConvertError> {
    plan(source.format, target).ok_or_else(|| ConvertError::UnsupportedConversion {
        from: source.format.to_string(),
        to: target.to_string(),
    })
}

/// Targets Ghostscript can write directly.
fn gs_native(target: Format) -> bool {
    matches!(target, Format::Png | Format::Jpeg | Format::Tiff)
}

/// PDF → raster, going through PNG and ImageMagick when Ghostscript has no
/// device for the target.
fn rasterize_pdf(target: Format) -> Option<Vec<Hop>> {
    if gs_native(target) {
        return Some(vec![Hop::new(EngineKind::Pdf, Format::Pdf, target)]);
    }
    if target.is_raster() {
        return Some(vec![
            Hop::new(EngineKind::Pdf, Format::Pdf, Format::Png),
            Hop::new(EngineKind::Image, Format::Png, target),
        ]);
    }
    None
}

/// Render through an Office PDF export first.
fn via_office_pdf(source: Format, target: Format) -> Option<Vec<Hop>> {
    let mut hops = vec![Hop::new(EngineKind::Office, source, Format::Pdf)];
    hops.extend(rasterize_pdf(target)?);
    Some(hops)
}

fn plan(source: Format, target: Format) -> Option<ConversionRoute> {
    use FormatFamily::*;

    let hops = match (source.family(), target.family()) {
        (Office, Pdf) => vec![Hop::new(EngineKind::Office, source, target)],
        (Office, Office) => {
            if source == target || source.office_class() != target.office_class() {
                return None;
            }
            vec![Hop::new(EngineKind::Office, source, target)]
        }
        (Office, Raster) => via_office_pdf(source, target)?,

        (Pdf, Raster) => rasterize_pdf(target)?,

        (Raster, Raster) | (Raster, Pdf) => vec![Hop::new(EngineKind::Image, source, target)],

        (Vector, _) if source == Format::Svg => match target.family() {
            Raster | Pdf => vec![Hop::new(EngineKind::Image, source, target)],
            _ => return None,
        },
        (Vector, Pdf) => vec![Hop::new(EngineKind::Office, source, target)],
        (Vector, Vector) if target == Format::Svg => {
            vec![Hop::new(EngineKind::Office, source, target)]
        }
        (Vector, Raster) => via_office_pdf(source, target)?,

        _ => return None,
    };

    Some(ConversionRoute {
        source,
        target,
        hops,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::format::{Confidence, Derivation};

    fn descriptor(format: Format) -> FormatDescriptor {
        FormatDescriptor {
            format,
            family: format.family(),
            derivation: Derivation::ContentSniffed,
            confidence: Confidence::High,
            declared: None,
        }
    }

    fn engines(source: Format, target: Format) -> Vec<EngineKind> {
        route(&descriptor(source), target)
            .unwrap()
            .hops()
            .iter()
            .map(|h| h.engine)
            .collect()
    }

    #[test]
    fn every_route_is_consistent() {
        let mut supported = 0;
        for source in Format::ALL {
            for target in Format::ALL {
                match route(&descriptor(source), target) {
                    Ok(r) => {
                        supported += 1;
                        let hops = r.hops();
                        assert!(!hops.is_empty(), "{source}->{target}");
                        assert_eq!(hops[0].input, source, "{source}->{target}");
                        assert_eq!(hops[hops.len() - 1].output, target, "{source}->{target}");
                        for pair in hops.windows(2) {
                            assert_eq!(pair[0].output, pair[1].input, "{source}->{target}");
                        }
                        for hop in hops {
                            assert!(hop.operation().is_some(), "no operation for {hop}");
                        }
                    }
                    Err(e) => assert_eq!(e.kind(), ErrorKind::UnsupportedConversion),
                }
            }
        }
        assert!(supported > 50, "only {supported} routes");
    }

    #[test]
    fn office_routes() {
        assert_eq!(engines(Format::Docx, Format::Pdf), [EngineKind::Office]);
        assert_eq!(engines(Format::Doc, Format::Odt), [EngineKind::Office]);
        assert_eq!(
            engines(Format::Pptx, Format::Png),
            [EngineKind::Office, EngineKind::Pdf]
        );
        assert_eq!(
            engines(Format::Xlsx, Format::Webp),
            [EngineKind::Office, EngineKind::Pdf, EngineKind::Image]
        );
    }

    #[test]
    fn pdf_and_image_routes() {
        assert_eq!(engines(Format::Pdf, Format::Jpeg), [EngineKind::Pdf]);
        assert_eq!(
            engines(Format::Pdf, Format::Gif),
            [EngineKind::Pdf, EngineKind::Image]
        );
        assert_eq!(engines(Format::Png, Format::Webp), [EngineKind::Image]);
        assert_eq!(engines(Format::Jpeg, Format::Jpeg), [EngineKind::Image]);
        assert_eq!(engines(Format::Tiff, Format::Pdf), [EngineKind::Image]);
        assert_eq!(engines(Format::Svg, Format::Png), [EngineKind::Image]);
    }

    #[test]
    fn metafile_routes() {
        assert_eq!(engines(Format::Wmf, Format::Svg), [EngineKind::Office]);
        assert_eq!(
            engines(Format::Emf, Format::Png),
            [EngineKind::Office, EngineKind::Pdf]
        );
    }

    #[test]
    fn unsupported_pairs() {
        for (s, t) in [
            (Format::Pdf, Format::Pdf),
            (Format::Pdf, Format::Docx),
            (Format::Docx, Format::Docx),
            (Format::Docx, Format::Xlsx),
            (Format::Png, Format::Docx),
            (Format::Png, Format::Svg),
            (Format::Svg, Format::Svg),
            (Format::Svg, Format::Wmf),
            (Format::Wmf, Format::Wmf),
        ] {
            let err = route(&descriptor(s), t).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedConversion, "{s}->{t}");
        }
    }

    #[test]
    fn image_pass_is_appended_once() {
        let r = route(&descriptor(Format::Pdf), Format::Png)
            .unwrap()
            .with_image_pass();
        assert_eq!(
            r.hops().iter().map(|h| h.engine).collect::<Vec<_>>(),
            [EngineKind::Pdf, EngineKind::Image]
        );
        assert_eq!(r.hops()[1].input, Format::Png);
        assert_eq!(r.hops()[1].output, Format::Png);
        assert_eq!(r.hops()[1].operation(), Some(Operation::Transform));

        let r = route(&descriptor(Format::Png), Format::Webp)
            .unwrap()
            .with_image_pass();
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn display_names_the_chain() {
        let r = route(&descriptor(Format::Docx), Format::Webp).unwrap();
        assert_eq!(r.to_string(), "docx → webp via Office → PDF → Image");
    }
}
