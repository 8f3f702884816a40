use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

use super::minio_config::MinioConfig;

pub const ENV_PREFIX: &str = "PULSE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub source: SourceConfig,
    pub load: LoadConfig,
    pub sink: SinkConfig,
    pub minio: MinioConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the cloned dataset; must contain `data/`.
    pub repo_path: PathBuf,
    pub default_country: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            default_country: Some("india".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub batch_size: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self { batch_size: 5000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Parquet,
    Csv,
    Ndjson,
    Minio,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub output_dir: PathBuf,
    pub prefix: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            output_dir: PathBuf::from("output"),
            prefix: "pulse".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level> {
        Level::from_str(self.level.trim())
            .map_err(|_| anyhow!("Unknown log level '{}'", self.level))
    }
}

impl LoaderConfig {
    /// Read a TOML file on its own, without the environment overlay.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read loader config file: {}", path))?;

        let config: LoaderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse loader config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults, then the optional TOML file, then `PULSE__SECTION__KEY`
    /// environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            if !Path::new(path).exists() {
                return Err(anyhow!("Config file not found: {}", path));
            }
            builder = builder.add_source(
                ::config::File::new(path, ::config::FileFormat::Toml).required(true),
            );
        }

        let config: LoaderConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble loader configuration")?
            .try_deserialize()
            .context("Failed to deserialize loader configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.load.batch_size == 0 {
            return Err(anyhow!("load.batch_size must be greater than zero"));
        }

        if matches!(
            self.sink.kind,
            SinkKind::Parquet | SinkKind::Csv | SinkKind::Ndjson
        ) && self.sink.output_dir.as_os_str().is_empty()
        {
            return Err(anyhow!("sink.output_dir is required for local sinks"));
        }

        self.logging.max_level()?;
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        self.source.repo_path.join("data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.load.batch_size, 5000);
        assert_eq!(config.source.default_country.as_deref(), Some("india"));
        assert_eq!(config.sink.kind, SinkKind::Parquet);
        assert_eq!(config.logging.max_level().unwrap(), Level::INFO);
        assert_eq!(config.data_dir(), PathBuf::from("./data"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pulse.toml");
        fs::write(
            &path,
            r#"
            [source]
            repo_path = "/srv/pulse"

            [sink]
            kind = "csv"
            output_dir = "/tmp/tables"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        let config = LoaderConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.source.repo_path, PathBuf::from("/srv/pulse"));
        assert_eq!(config.source.default_country.as_deref(), Some("india"));
        assert_eq!(config.sink.kind, SinkKind::Csv);
        assert_eq!(config.sink.prefix, "pulse");
        assert_eq!(config.load.batch_size, 5000);
        assert_eq!(config.logging.max_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_sample_config_parses() {
        let config =
            LoaderConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/configs/pulse.toml")).unwrap();
        assert_eq!(config.sink.kind, SinkKind::Parquet);
        assert_eq!(config.minio.access_key_var(), "MINIO_ACCESS_KEY");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.toml");

        fs::write(&path, "[load]\nbatch_size = 0\n").unwrap();
        assert!(LoaderConfig::from_file(path.to_str().unwrap()).is_err());

        fs::write(&path, "[sink]\nkind = \"sqlite\"\n").unwrap();
        assert!(LoaderConfig::from_file(path.to_str().unwrap()).is_err());

        fs::write(&path, "[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(LoaderConfig::from_file(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_load_layers_file_and_env() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("pulse.toml");
        fs::write(&path, "[load]\nbatch_size = 10\n\n[sink]\nkind = \"memory\"\n").unwrap();

        unsafe {
            std::env::set_var("PULSE__SINK__PREFIX", "from-env");
        }
        let config = LoaderConfig::load(Some(path.to_str().unwrap())).unwrap();
        unsafe {
            std::env::remove_var("PULSE__SINK__PREFIX");
        }

        assert_eq!(config.load.batch_size, 10);
        assert_eq!(config.sink.kind, SinkKind::Memory);
        assert_eq!(config.sink.prefix, "from-env");
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        assert!(LoaderConfig::load(Some("/definitely/not/here.toml")).is_err());
    }
}
