use super::{
    types::{RasterDiag, RasterizeError, RasterizedDocument, ScratchDir},
    Rasterizer,
};
use crate::{config::Config, util::sha256_hex};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const PAGE_PREFIX: &str = "page";

/// Rasterizes through poppler's `pdftoppm`, one PNG per page in a scratch dir.
pub struct PdftoppmRasterizer {
    exe: PathBuf,
    dpi: u32,
    timeout: Option<Duration>,
    work_dir: PathBuf,
    keep_intermediates: bool,
    page_file: Regex,
}

impl PdftoppmRasterizer {
    pub fn new(cfg: &Config) -> Result<Self> {
        if cfg.render.dpi == 0 {
            return Err(anyhow!("render.dpi must be > 0"));
        }
        let exe = cfg.render.pdftoppm_exe.trim();
        if exe.is_empty() {
            return Err(anyhow!("render.pdftoppm_exe is empty"));
        }
        let page_file = Regex::new(&format!(r"^{PAGE_PREFIX}-(\d+)\.png$"))
            .with_context(|| "compiling page file pattern")?;
        Ok(Self {
            exe: PathBuf::from(exe),
            dpi: cfg.render.dpi,
            timeout: (cfg.render.timeout_seconds > 0)
                .then(|| Duration::from_secs(cfg.render.timeout_seconds)),
            work_dir: PathBuf::from(&cfg.paths.work_dir),
            keep_intermediates: cfg.global.keep_intermediates,
            page_file,
        })
    }

    fn scratch_dir(&self, pdf: &Path) -> PathBuf {
        let key = sha256_hex(pdf.display().to_string().as_bytes());
        self.work_dir.join(&key[..16])
    }

    fn render(&self, pdf: &Path, out_dir: &Path) -> Result<(), RasterizeError> {
        debug!(
            "pdftoppm {} dpi={} timeout={:?}",
            pdf.display(),
            self.dpi,
            self.timeout
        );
        let mut child = Command::new(&self.exe)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(out_dir.join(PAGE_PREFIX))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RasterizeError::Spawn {
                exe: self.exe.display().to_string(),
                source,
            })?;

        let output = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout)?,
            None => child.wait_with_output()?,
        };

        if !output.status.success() {
            return Err(RasterizeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !output.stderr.is_empty() {
            debug!(
                "pdftoppm stderr {}: {}",
                pdf.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// Rendered page files ordered by their numeric suffix.
    fn collect_pages(&self, out_dir: &Path) -> Result<Vec<PathBuf>, RasterizeError> {
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(out_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(n) = page_number(&self.page_file, name) {
                pages.push((n, entry.path()));
            }
        }
        pages.sort_by_key(|(n, _)| *n);
        Ok(pages.into_iter().map(|(_, p)| p).collect())
    }
}

fn page_number(pattern: &Regex, file_name: &str) -> Option<u32> {
    pattern
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl Rasterizer for PdftoppmRasterizer {
    fn doctor(&self) -> Result<RasterDiag> {
        let exe = self.exe.display().to_string();
        let out = match Command::new(&self.exe).arg("-v").output() {
            Ok(out) => out,
            Err(e) => {
                return Ok(RasterDiag {
                    exe,
                    version: None,
                    dpi: self.dpi,
                    ok: false,
                    error: Some(format!("failed to launch: {e}")),
                });
            }
        };
        // pdftoppm prints its version banner on stderr.
        let banner = String::from_utf8_lossy(&out.stderr).to_string()
            + &String::from_utf8_lossy(&out.stdout);
        let version = banner
            .lines()
            .find(|l| l.contains("version"))
            .map(|l| l.trim().to_string());
        Ok(RasterDiag {
            exe,
            version,
            dpi: self.dpi,
            ok: out.status.success(),
            error: (!out.status.success()).then(|| format!("exit status {}", out.status)),
        })
    }

    fn rasterize(&self, pdf: &Path) -> Result<RasterizedDocument, RasterizeError> {
        let path = self.scratch_dir(pdf);
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        let scratch = ScratchDir::new(path, self.keep_intermediates);

        self.render(pdf, scratch.path())?;
        let pages = self.collect_pages(scratch.path())?;
        if pages.is_empty() {
            return Err(RasterizeError::NoPages);
        }
        debug!("rendered {} pages from {}", pages.len(), pdf.display());
        Ok(RasterizedDocument::from_files(pages, scratch))
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output, RasterizeError> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let join = |h: std::thread::JoinHandle<std::io::Result<Vec<u8>>>| -> std::io::Result<Vec<u8>> {
        h.join()
            .map_err(|_| std::io::Error::other("pipe reader thread panicked"))?
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Output {
                status,
                stdout: join(stdout_thread)?,
                stderr: join(stderr_thread)?,
            });
        }

        if start.elapsed() > timeout {
            warn!("pdftoppm timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait()?;
            let _ = join(stdout_thread);
            let _ = join(stderr_thread);
            return Err(RasterizeError::Timeout(timeout));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rasterizer() -> PdftoppmRasterizer {
        PdftoppmRasterizer::new(&Config::default()).unwrap()
    }

    #[test]
    fn parses_padded_page_suffixes() {
        let r = rasterizer();
        assert_eq!(page_number(&r.page_file, "page-1.png"), Some(1));
        assert_eq!(page_number(&r.page_file, "page-007.png"), Some(7));
        assert_eq!(page_number(&r.page_file, "page-12.png"), Some(12));
        assert_eq!(page_number(&r.page_file, "page-x.png"), None);
        assert_eq!(page_number(&r.page_file, "other-1.png"), None);
        assert_eq!(page_number(&r.page_file, "page-1.ppm"), None);
    }

    #[test]
    fn pages_are_ordered_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-1.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pages = rasterizer().collect_pages(dir.path()).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-02.png", "page-10.png"]);
    }

    #[test]
    fn scratch_dir_is_stable_per_document() {
        let r = rasterizer();
        let a = r.scratch_dir(Path::new("pdfs/a.pdf"));
        assert_eq!(a, r.scratch_dir(Path::new("pdfs/a.pdf")));
        assert_ne!(a, r.scratch_dir(Path::new("pdfs/b.pdf")));
        assert!(a.starts_with(".scan-triage-work"));
    }

    #[test]
    fn missing_executable_is_a_spawn_error() {
        let mut cfg = Config::default();
        cfg.render.pdftoppm_exe = "definitely-not-a-real-pdftoppm".into();
        let work = tempfile::tempdir().unwrap();
        cfg.paths.work_dir = work.path().display().to_string();
        let r = PdftoppmRasterizer::new(&cfg).unwrap();
        let err = r.rasterize(Path::new("missing.pdf")).err().unwrap();
        assert_eq!(err.kind(), "spawn");
    }
}
