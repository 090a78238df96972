use crate::{
    config::Config,
    gray::rgb_to_gray,
    metrics::{MetricOptions, QualityMetrics},
    policy::{self, Decision},
    raster::{RasterizeError, Rasterizer},
    report::{PageQualityRecord, Quality, RunSummary, SkippedDocument},
    score::{self, ScoreBreakdown},
    util::{ensure_dir, has_pdf_extension, now_local_rfc3339},
};
use anyhow::{Context, Result};
use image::GrayImage;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Metrics, score and decision for one grayscale page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageAssessment {
    pub metrics: QualityMetrics,
    pub breakdown: ScoreBreakdown,
    pub score: i32,
    pub decision: Decision,
}

pub fn assess_gray(gray: &GrayImage, opts: &MetricOptions) -> PageAssessment {
    let metrics = QualityMetrics::measure(gray, opts);
    let breakdown = score::breakdown(&metrics);
    let score = breakdown.total();
    PageAssessment {
        metrics,
        breakdown,
        score,
        decision: policy::decide(score),
    }
}

pub struct Pipeline<R: Rasterizer> {
    cfg: Config,
    rasterizer: R,
}

impl<R: Rasterizer> Pipeline<R> {
    pub fn new(cfg: &Config, rasterizer: R) -> Self {
        Self {
            cfg: cfg.clone(),
            rasterizer,
        }
    }

    /// PDF files directly inside `input_dir`, sorted by name.
    pub fn discover(&self, input_dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(input_dir)
            .with_context(|| format!("reading input dir: {}", input_dir.display()))?;
        let mut pdfs = Vec::new();
        for entry in entries {
            let path = entry
                .with_context(|| format!("listing {}", input_dir.display()))?
                .path();
            if path.is_file() && has_pdf_extension(&path) {
                pdfs.push(path);
            }
        }
        pdfs.sort();
        Ok(pdfs)
    }

    /// Records for every page of `pdf`, or the error that makes the whole
    /// document unusable. Nothing is written here.
    pub fn assess_document(&self, pdf: &Path) -> Result<Vec<PageQualityRecord>, RasterizeError> {
        let document_name = document_name(pdf);
        let doc = self.rasterizer.rasterize(pdf)?;

        let mut records = Vec::with_capacity(doc.page_count());
        for index in 0..doc.page_count() {
            let page_number = index as u32 + 1;
            let image = doc.load_page(index)?;
            let gray = rgb_to_gray(&image);
            drop(image);

            let a = assess_gray(&gray, &self.cfg.metrics);
            debug!(
                "{} page {} {}x{} sharpness={:.3} contrast={:.3} noise={:.3} score={} decision={}",
                document_name,
                page_number,
                gray.width(),
                gray.height(),
                a.metrics.sharpness,
                a.metrics.contrast,
                a.metrics.noise,
                a.score,
                a.decision
            );

            records.push(PageQualityRecord {
                document_name: document_name.clone(),
                page_number,
                quality: Quality {
                    score: a.score,
                    metrics: a.metrics,
                },
                decision: a.decision,
                timestamp: now_local_rfc3339(),
            });
        }
        Ok(records)
    }

    pub fn run(&self, input_dir: &Path, out_dir: &Path) -> Result<RunSummary> {
        let started = Instant::now();
        ensure_dir(out_dir)?;

        let pdfs = self.discover(input_dir)?;
        info!("found {} PDF(s) in {}", pdfs.len(), input_dir.display());

        let mut summary = RunSummary {
            started: now_local_rfc3339(),
            ..Default::default()
        };

        let mut used_stems = HashSet::new();
        for pdf in &pdfs {
            summary.documents_seen += 1;
            let name = document_name(pdf);

            let Some(stem) = output_stem(pdf, &used_stems) else {
                warn!("skipping {}: output names already taken", name);
                summary.skipped.push(SkippedDocument {
                    document_name: name,
                    error_kind: "name_collision".to_string(),
                    message: "both the file stem and the file name are used by another document"
                        .to_string(),
                });
                continue;
            };

            let records = match self.assess_document(pdf) {
                Ok(records) => records,
                Err(err) => {
                    warn!("skipping {}: {}", name, err);
                    summary.skipped.push(SkippedDocument {
                        document_name: name,
                        error_kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            for record in &records {
                self.write_record(out_dir, &stem, record)?;
                *summary.decisions.entry(record.decision).or_insert(0) += 1;
                summary.pages_written += 1;
            }
            summary.documents_processed += 1;
            info!("{} pages={} written as {}_page_*", name, records.len(), stem);
            used_stems.insert(stem);
        }

        summary.finished = now_local_rfc3339();

        if self.cfg.output.write_summary_json {
            let path = out_dir.join(&self.cfg.output.summary_filename);
            std::fs::write(&path, to_json(&summary, self.cfg.output.pretty_json)?)
                .with_context(|| format!("writing summary: {}", path.display()))?;
        }

        info!(
            "done documents={} processed={} skipped={} pages={} elapsed={:?}",
            summary.documents_seen,
            summary.documents_processed,
            summary.skipped.len(),
            summary.pages_written,
            started.elapsed()
        );
        Ok(summary)
    }

    fn write_record(&self, out_dir: &Path, stem: &str, record: &PageQualityRecord) -> Result<()> {
        let path = out_dir.join(record.file_name(stem));
        std::fs::write(&path, to_json(record, self.cfg.output.pretty_json)?)
            .with_context(|| format!("writing record: {}", path.display()))
    }
}

/// File name including extension, as reported in records.
pub fn document_name(pdf: &Path) -> String {
    pdf.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| pdf.display().to_string())
}

pub fn document_stem(pdf: &Path) -> String {
    pdf.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| document_name(pdf))
}

/// Record file prefix for `pdf`: the file stem, or the full file name when an
/// earlier document in the run already wrote under that stem (`a.pdf` vs `a.PDF`).
/// `None` when both are taken.
fn output_stem(pdf: &Path, used: &HashSet<String>) -> Option<String> {
    [document_stem(pdf), document_name(pdf)]
        .into_iter()
        .find(|candidate| !used.contains(candidate))
}

/// JSON with 4-space indentation when `pretty`, compact otherwise.
pub fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    if !pretty {
        return Ok(serde_json::to_string(value)?);
    }
    let mut buf = Vec::new();
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{types::ScratchDir, RasterDiag, RasterizedDocument};
    use image::{Rgb, RgbImage};

    #[test]
    fn stem_falls_back_to_file_name() {
        let mut used = HashSet::new();
        assert_eq!(output_stem(Path::new("in/a.pdf"), &used).as_deref(), Some("a"));
        used.insert("a".to_string());
        assert_eq!(output_stem(Path::new("in/a.PDF"), &used).as_deref(), Some("a.PDF"));
        used.insert("a.PDF".to_string());
        assert_eq!(output_stem(Path::new("in/a.PDF"), &used), None);
    }

    /// Serves rendered page files from disk; `broken*` documents get a garbage second page.
    struct PageFiles {
        good: PathBuf,
        garbage: PathBuf,
        dir: PathBuf,
    }

    impl PageFiles {
        fn new(dir: &Path) -> Self {
            let good = dir.join("page-1.png");
            RgbImage::from_pixel(8, 6, Rgb([120, 120, 120]))
                .save(&good)
                .unwrap();
            let garbage = dir.join("page-2.png");
            std::fs::write(&garbage, b"definitely not a png").unwrap();
            Self {
                good,
                garbage,
                dir: dir.to_path_buf(),
            }
        }
    }

    impl Rasterizer for PageFiles {
        fn doctor(&self) -> Result<RasterDiag> {
            Ok(RasterDiag {
                exe: "files".into(),
                version: None,
                dpi: 200,
                ok: true,
                error: None,
            })
        }

        fn rasterize(&self, pdf: &Path) -> Result<RasterizedDocument, RasterizeError> {
            let mut pages = vec![self.good.clone()];
            if document_name(pdf).starts_with("broken") {
                pages.push(self.garbage.clone());
            }
            Ok(RasterizedDocument::from_files(
                pages,
                ScratchDir::new(self.dir.clone(), true),
            ))
        }
    }

    #[test]
    fn undecodable_page_fails_the_whole_document() {
        let pages = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(&Config::default(), PageFiles::new(pages.path()));

        let err = pipeline
            .assess_document(Path::new("broken.pdf"))
            .unwrap_err();
        assert!(matches!(err, RasterizeError::Decode { page: 2, .. }), "{err}");
        assert_eq!(err.kind(), "decode");

        let input = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["broken.pdf", "good.pdf"] {
            std::fs::write(input.path().join(name), b"%PDF-1.4\n").unwrap();
        }
        let summary = pipeline.run(input.path(), out.path()).unwrap();

        assert_eq!(summary.documents_processed, 1);
        assert_eq!(summary.pages_written, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].document_name, "broken.pdf");
        assert_eq!(summary.skipped[0].error_kind, "decode");
        assert!(out.path().join("good_page_1.json").exists());
        let broken_files = std::fs::read_dir(out.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("broken")
            })
            .count();
        assert_eq!(broken_files, 0);
    }
}
