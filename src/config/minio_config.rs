use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_ACCESS_KEY_VAR: &str = "MINIO_ACCESS_KEY";
pub const DEFAULT_SECRET_KEY_VAR: &str = "MINIO_SECRET_KEY";

/// The `[minio]` section. Credentials never live in the file: they are read
/// from the environment variables the section names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinioConfig {
    pub endpoint: String,
    pub bucket_name: String,
    pub region: Option<String>,
    pub path_style: Option<bool>,
    pub env_access_key: Option<String>,
    pub env_secret_key: Option<String>,
    #[serde(skip)]
    pub access_key: Option<String>,
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl MinioConfig {
    pub fn load_credentials(&mut self) -> Result<()> {
        let access_key_var = self.access_key_var().to_string();
        let secret_key_var = self.secret_key_var().to_string();

        self.access_key = Some(
            env::var(&access_key_var)
                .with_context(|| format!("Missing environment variable: {}", access_key_var))?,
        );
        self.secret_key = Some(
            env::var(&secret_key_var)
                .with_context(|| format!("Missing environment variable: {}", secret_key_var))?,
        );

        Ok(())
    }

    pub fn access_key_var(&self) -> &str {
        self.env_access_key.as_deref().unwrap_or(DEFAULT_ACCESS_KEY_VAR)
    }

    pub fn secret_key_var(&self) -> &str {
        self.env_secret_key.as_deref().unwrap_or(DEFAULT_SECRET_KEY_VAR)
    }

    pub fn get_access_key(&self) -> Result<&str> {
        self.access_key
            .as_deref()
            .ok_or_else(|| anyhow!("Access key not loaded"))
    }

    pub fn get_secret_key(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .ok_or_else(|| anyhow!("Secret key not loaded"))
    }

    pub fn is_path_style(&self) -> bool {
        self.path_style.unwrap_or(true)
    }

    pub fn get_region(&self) -> &str {
        self.region.as_deref().unwrap_or("us-east-1")
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(anyhow!("MinIO endpoint cannot be empty"));
        }

        if self.bucket_name.trim().is_empty() {
            return Err(anyhow!("MinIO bucket name cannot be empty"));
        }

        if self.access_key.is_none() {
            return Err(anyhow!("MinIO access key not loaded"));
        }

        if self.secret_key.is_none() {
            return Err(anyhow!("MinIO secret key not loaded"));
        }

        Ok(())
    }
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            bucket_name: "phonepe-pulse".to_string(),
            region: Some("us-east-1".to_string()),
            path_style: Some(true),
            env_access_key: None,
            env_secret_key: None,
            access_key: None,
            secret_key: None,
        }
    }
}
