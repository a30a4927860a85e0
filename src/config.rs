use crate::error::{DossierError, Result};
use crate::jobs::unpack::resolve_encodings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub unpack: UnpackConfig,
    pub convert: ConvertConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Staging area for incoming packages.
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Templates live in `<template_dir>/<kind>/<name>.json`.
    pub template_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UnpackConfig {
    /// Used when the unpack template does not set `fallback_encodings`.
    pub fallback_encodings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub office_command: String,
    pub office_args: Vec<String>,
    /// Overrides the template's `keep_original_files` when set.
    pub keep_original_files: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub progress: bool,
    /// Every job also writes its JSON report here when set.
    pub report_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            template_dir: PathBuf::from("templates"),
        }
    }
}

impl Default for UnpackConfig {
    fn default() -> Self {
        Self {
            fallback_encodings: vec!["gbk".to_string()],
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            office_command: "soffice".to_string(),
            office_args: Vec::new(),
            keep_original_files: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            progress: true,
            report_file: None,
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DossierError::Config {
                message: format!("Configuration file not found: {}", path.display()),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DossierError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| DossierError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;

        Ok(config)
    }

    pub fn load_with_defaults<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_file(path),
            None => {
                let default_paths = ["dossier.toml", "dossier.config.toml", ".dossier.toml"];

                for default_path in &default_paths {
                    if Path::new(default_path).exists() {
                        return Self::load_from_file(default_path);
                    }
                }

                Ok(Self::default())
            }
        }
    }

    pub fn merge_with_cli_args(&mut self, cli_args: &CliOverrides) {
        if let Some(ref template_dir) = cli_args.template_dir {
            self.paths.template_dir = template_dir.clone();
        }

        if let Some(ref data_dir) = cli_args.data_dir {
            self.paths.data_dir = data_dir.clone();
        }

        if let Some(ref output_dir) = cli_args.output_dir {
            self.paths.output_dir = output_dir.clone();
        }

        if let Some(keep) = cli_args.keep_original {
            self.convert.keep_original_files = Some(keep);
        }

        if let Some(ref encodings) = cli_args.fallback_encodings {
            self.unpack.fallback_encodings = encodings
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(ref report_file) = cli_args.report_file {
            self.output.report_file = Some(report_file.clone());
        }

        if cli_args.no_progress {
            self.output.progress = false;
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).map_err(|e| DossierError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        std::fs::write(path, content).map_err(|e| DossierError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.convert.office_command.trim().is_empty() {
            return Err(DossierError::Config {
                message: "convert.office_command must not be empty".to_string(),
            });
        }

        resolve_encodings(&self.unpack.fallback_encodings).map_err(|e| DossierError::Config {
            message: format!("unpack.fallback_encodings: {}", e),
        })?;

        for (key, path) in [
            ("data_dir", &self.paths.data_dir),
            ("output_dir", &self.paths.output_dir),
            ("template_dir", &self.paths.template_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(DossierError::Config {
                    message: format!("paths.{} must not be empty", key),
                });
            }
        }

        if let Some(parent) = self
            .output
            .report_file
            .as_deref()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
        {
            if !parent.exists() {
                return Err(DossierError::Config {
                    message: format!("Report directory does not exist: {}", parent.display()),
                });
            }
        }

        Ok(())
    }

    pub fn create_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config).unwrap_or_else(|_| String::new())
    }
}

#[derive(Debug, Default)]
pub struct CliOverrides {
    pub template_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub keep_original: Option<bool>,
    pub fallback_encodings: Option<String>,
    pub report_file: Option<PathBuf>,
    pub no_progress: bool,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template_dir(mut self, template_dir: Option<PathBuf>) -> Self {
        self.template_dir = template_dir;
        self
    }

    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    pub fn with_keep_original(mut self, keep: Option<bool>) -> Self {
        self.keep_original = keep;
        self
    }

    /// Comma-separated encoding labels, e.g. `gbk,big5`.
    pub fn with_fallback_encodings(mut self, encodings: Option<String>) -> Self {
        self.fallback_encodings = encodings;
        self
    }

    pub fn with_report_file(mut self, report_file: Option<PathBuf>) -> Self {
        self.report_file = report_file;
        self
    }

    pub fn with_no_progress(mut self, no_progress: bool) -> Self {
        self.no_progress = no_progress;
        self
    }
}
