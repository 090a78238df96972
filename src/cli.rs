use crate::{
    config::Config,
    gray::to_gray,
    pipeline::{self, Pipeline},
    policy::Decision,
    raster::{pdftoppm::PdftoppmRasterizer, Rasterizer},
    util::{ensure_dir, has_pdf_extension},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_CONFIG: &str = "scan-triage.toml";

#[derive(Parser, Debug)]
#[command(name = "scan-triage")]
#[command(about = "Score scanned PDF pages (sharpness, contrast, noise) and route them")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./scan-triage.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the rasterizer can be launched.
    Doctor {},
    /// Score every PDF in a directory and write one JSON record per page.
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Score one PDF and print its page records.
    Assess {
        #[arg(long)]
        input: PathBuf,
    },
    /// Score a single raster image and print the per-metric breakdown.
    Inspect {
        #[arg(long)]
        input: PathBuf,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = load_config(args.config.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            doctor(&cfg)
        }
        Command::Run { input, out_dir } => run(&args, &cfg, input.as_deref(), out_dir.as_deref()),
        Command::Assess { input } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            assess(&cfg, input)
        }
        Command::Inspect { input } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg, None).as_deref())?;
            inspect(&cfg, input)
        }
    }
}

fn load_config(user: Option<&Path>) -> Result<Config> {
    if let Some(p) = user {
        return Config::load(p);
    }
    let default = Path::new(DEFAULT_CONFIG);
    if default.exists() {
        Config::load(default)
    } else {
        Ok(Config::default())
    }
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let stdout_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let rasterizer = PdftoppmRasterizer::new(cfg)?;
    let diag = rasterizer.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    if !diag.ok {
        return Err(anyhow!(
            "rasterizer not usable: {}",
            diag.error.unwrap_or_default()
        ));
    }
    Ok(())
}

fn run(args: &Args, cfg: &Config, input: Option<&Path>, out_override: Option<&Path>) -> Result<()> {
    let input_dir = input
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.input_dir));
    let out_dir = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));

    if !input_dir.is_dir() {
        return Err(anyhow!("input is not a directory: {}", input_dir.display()));
    }
    ensure_dir(&out_dir)?;

    let log_path = resolve_log_path(cfg, Some(&out_dir));
    let _guard = init_logging(args, cfg, log_path.as_deref())?;

    info!("input={} out={}", input_dir.display(), out_dir.display());

    if cfg.debug.dump_effective_config {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(out_dir.join("effective-config.toml"), raw)?;
    }

    ensure_dir(Path::new(&cfg.paths.work_dir))?;

    let rasterizer = PdftoppmRasterizer::new(cfg)?;
    let diag = rasterizer.doctor()?;
    if !diag.ok {
        return Err(anyhow!(
            "rasterizer not usable ({}): {}",
            diag.exe,
            diag.error.unwrap_or_default()
        ));
    }

    let pipeline = Pipeline::new(cfg, rasterizer);
    let summary = pipeline.run(&input_dir, &out_dir)?;

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "out_dir": out_dir,
                "documents": summary.documents_seen,
                "processed": summary.documents_processed,
                "skipped": summary.skipped.len(),
                "pages": summary.pages_written,
                "send_to_ai": summary.count(Decision::SendToAi),
                "review_manually": summary.count(Decision::ReviewManually),
                "redigitalize": summary.count(Decision::Redigitalize),
            }))?
        );
    }

    Ok(())
}

fn assess(cfg: &Config, input: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    if !has_pdf_extension(input) {
        warn!("input has no .pdf extension: {}", input.display());
    }

    let rasterizer = PdftoppmRasterizer::new(cfg)?;
    let pipeline = Pipeline::new(cfg, rasterizer);
    let records = pipeline
        .assess_document(input)
        .with_context(|| format!("rasterizing {}", input.display()))?;
    println!("{}", pipeline::to_json(&records, cfg.output.pretty_json)?);
    Ok(())
}

fn inspect(cfg: &Config, input: &Path) -> Result<()> {
    let img = image::open(input).with_context(|| format!("decoding image: {}", input.display()))?;
    let gray = to_gray(&img);
    let assessment = pipeline::assess_gray(&gray, &cfg.metrics);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "width": gray.width(),
            "height": gray.height(),
            "options": cfg.metrics,
            "assessment": assessment,
        }))?
    );
    Ok(())
}

fn resolve_log_path(cfg: &Config, out_dir: Option<&Path>) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    if let Some(out_dir) = out_dir {
        return Some(out_dir.join("scan-triage.log"));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("scan-triage.log"))
}
