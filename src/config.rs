use crate::metrics::MetricOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub metrics: MetricOptions,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub debug: Debug,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub keep_intermediates: bool,
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            keep_intermediates: false,
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub input_dir: String,
    pub out_dir: String,
    pub work_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            input_dir: "pdfs".into(),
            out_dir: "saida".into(),
            work_dir: ".scan-triage-work".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Render {
    pub pdftoppm_exe: String,
    pub dpi: u32,
    /// Per-document rasterization timeout; 0 disables it.
    pub timeout_seconds: u64,
}
impl Default for Render {
    fn default() -> Self {
        Self {
            pdftoppm_exe: "pdftoppm".into(),
            dpi: 200,
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub pretty_json: bool,
    pub write_summary_json: bool,
    pub summary_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            pretty_json: true,
            write_summary_json: true,
            summary_filename: "summary.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Debug {
    pub dump_effective_config: bool,
}
