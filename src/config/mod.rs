use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use confique::Config as _;
use serde::Deserialize;

use crate::prelude::*;


/// The locations where wpgate will look for a configuration file. The first
/// existing file in this list is used.
const DEFAULT_PATHS: &[&str] = &[
    "config.toml",
    "/etc/wpgate/config.toml",
];

const WPGATE_CONFIG_PATH_ENV: &str = "WPGATE_CONFIG_PATH";

/// Configuration for wpgate.
///
/// All relative paths are relative to the location of this configuration file.
/// Duration values are specified as string with a unit, e.g. "27s". Valid
/// units: 'ms', 's', 'min', 'h' and 'd'.
#[derive(Debug, confique::Config)]
pub(crate) struct Config {
    #[config(nested)]
    pub(crate) db: crate::db::DbConfig,

    #[config(nested)]
    pub(crate) http: crate::http::HttpConfig,

    #[config(nested)]
    pub(crate) auth: crate::auth::AuthConfig,

    #[config(nested)]
    pub(crate) log: crate::logger::LogConfig,
}

impl Config {
    /// Tries to find a config file by checking `WPGATE_CONFIG_PATH` and the
    /// list of default locations. The first config file found is loaded via
    /// [`Self::load_from`]. Returns the loaded config and the path that it
    /// was loaded from.
    pub(crate) fn from_env_or_default_locations() -> Result<(Self, PathBuf)> {
        let path = if let Some(path) = std::env::var_os(WPGATE_CONFIG_PATH_ENV) {
            PathBuf::from(path)
        } else {
            DEFAULT_PATHS.iter()
                .map(PathBuf::from)
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!(
                    "no configuration file found. Note: we checked the following paths: {}",
                    DEFAULT_PATHS.join(", "),
                ))?
        };

        let config = Self::load_from(&path)
            .with_context(|| format!("failed to load configuration from '{}'", path.display()))?;

        Ok((config, path))
    }

    /// Loads the configuration from a specific TOML file. Values marked with
    /// `env` can be overridden via environment variables. Call
    /// [`Self::validate`] once the logger is initialized.
    pub(crate) fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Config::builder()
            .env()
            .file(path)
            .load()
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;

        config.fix_paths(path)?;

        Ok(config)
    }

    /// Checks the config for invalid combinations of values that cannot be
    /// expressed in the types.
    pub(crate) fn validate(&self) -> Result<()> {
        self.db.validate()?;
        self.auth.validate()?;
        Ok(())
    }

    /// Goes through all paths in the configuration and changes relative paths
    /// to be absolute based on the path of the configuration file itself.
    fn fix_paths(&mut self, config_path: &Path) -> Result<()> {
        fn fix_path(base_path: &Path, path: &mut PathBuf) {
            if path.is_relative() {
                *path = base_path.join(&path);
            }
        }

        let absolute_config_path = config_path.canonicalize()
            .context("failed to canonicalize config path")?;
        let base = absolute_config_path.parent()
            .ok_or_else(|| anyhow!("config file path has no parent"))?;

        if let Some(p) = &mut self.log.file {
            fix_path(base, p);
        }
        if let Some(p) = &mut self.db.server_cert {
            fix_path(base, p);
        }

        Ok(())
    }
}

/// Writes the generated TOML config template file to the given destination or
/// stdout.
pub(crate) fn write_template(path: Option<&PathBuf>) -> Result<()> {
    info!(
        "Writing configuration template to '{}'",
        path.map(|p| p.display().to_string()).unwrap_or("<stdout>".into()),
    );

    let template = template();
    match path {
        Some(path) => fs::write(path, template)?,
        None => io::stdout().write_all(template.as_bytes())?,
    }

    Ok(())
}

fn template() -> String {
    use confique::toml::FormatOptions;

    let mut options = FormatOptions::default();
    options.general.nested_field_gap = 2;
    confique::toml::template::<Config>(options)
}

/// Our custom format for durations. We allow a couple useful units and require
/// a unit to increase readability of config files.
pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let s = String::deserialize(deserializer)?;

    // Allow unit-less zeroes
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let start_unit = s.find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| D::Error::custom("no time unit for duration"))?;
    let (num, unit) = s.split_at(start_unit);
    let num: u32 = num.parse()
        .map_err(|e| D::Error::custom(format!("invalid integer for duration: {e}")))?;
    let num: u64 = num.into();

    match unit {
        "ms" => Ok(Duration::from_millis(num)),
        "s" => Ok(Duration::from_secs(num)),
        "min" => Ok(Duration::from_secs(num * 60)),
        "h" => Ok(Duration::from_secs(num * 60 * 60)),
        "d" => Ok(Duration::from_secs(num * 60 * 60 * 24)),
        _ => Err(D::Error::custom("invalid unit of time for duration")),
    }
}
