use crate::error::{AppError, Result};
use crate::filter::FilterOptions;
use crate::rules::RuleSet;
use crate::size::parse_size;
use log;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".srcpack";
pub const DEFAULT_CONFIG_FILENAME: &str = "srcpack.toml";
pub const DEFAULT_MAX_FILE_SIZE: &str = "1MiB";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub exclude: ExcludeConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_true")]
    pub tree: bool,
    #[serde(default)]
    pub skip_aux_files: bool,
    /// Byte-unit string; "0" disables the limit.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Defaults to `<source name>.txt` in the current directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
    #[serde(default)]
    pub dirs: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    #[serde(default = "default_true")]
    pub use_builtin: bool,
}

fn default_true() -> bool {
    true
}
fn default_max_file_size() -> String {
    DEFAULT_MAX_FILE_SIZE.to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            tree: default_true(),
            skip_aux_files: false,
            max_file_size: default_max_file_size(),
        }
    }
}
impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            use_builtin: default_true(),
        }
    }
}

impl Config {
    /// Directory used to look up `.srcpack/srcpack.toml`: the given path or
    /// the current directory, tilde-expanded and canonicalized.
    pub fn determine_base_dir(cli_dir: Option<&Path>) -> Result<PathBuf> {
        let path_to_resolve = match cli_dir {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
            None => env::current_dir().map_err(AppError::Io)?,
        };

        path_to_resolve.canonicalize().map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to canonicalize directory '{}': {}",
                    path_to_resolve.display(),
                    e
                ),
            ))
        })
    }

    pub fn default_config_path(base_dir: &Path) -> PathBuf {
        base_dir
            .join(DEFAULT_CONFIG_DIR)
            .join(DEFAULT_CONFIG_FILENAME)
    }

    pub fn resolve_config_path(
        base_dir: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }

        match cli_config_file {
            Some(p_str) => {
                let expanded_path_cow = shellexpand::tilde(p_str);
                let mut path = PathBuf::from(expanded_path_cow.as_ref());
                if path.is_relative() {
                    path = base_dir.join(path);
                }
                if !path.exists() && path.extension().is_none() {
                    path.set_extension("toml");
                }
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found at path: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file path: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = Self::default_config_path(base_dir);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        toml::from_str::<Config>(&toml_content).map_err(|e| {
            AppError::TomlParse(format!(
                "Error parsing config file '{}': {}. Check TOML syntax and structure.",
                config_path.display(),
                e
            ))
        })
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn max_file_size_bytes(&self) -> Result<u64> {
        parse_size(&self.general.max_file_size)
    }

    /// Built-in (or empty) lists plus this config's exclusions.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let base = if self.rules.use_builtin {
            RuleSet::builtin()?
        } else {
            log::debug!("Built-in exclusion lists disabled.");
            RuleSet::empty()
        };
        Ok(base.with_user_overrides(
            &self.exclude.dirs,
            &self.exclude.extensions,
            &self.exclude.patterns,
        ))
    }

    pub fn filter_options(&self, output_file: Option<PathBuf>) -> Result<FilterOptions> {
        Ok(FilterOptions {
            max_file_size: self.max_file_size_bytes()?,
            skip_aux_files: self.general.skip_aux_files,
            output_file,
        })
    }
}
