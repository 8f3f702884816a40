use anyhow::{Context, Result, anyhow};
use polars::prelude::*;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::collections::HashMap;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::frame::batch_to_dataframe;
use super::row_sink::RowSink;
use super::storage_manager::StorageManager;
use crate::config::MinioConfig;
use crate::models::{Table, TableBatch};

/// Uploads each batch as one Parquet object. Uploads run on the tokio
/// runtime the sink was created in, so `write_batch` must be called from a
/// blocking context (e.g. `spawn_blocking`), never from an async task.
pub struct MinioSink {
    bucket: Bucket,
    prefix: String,
    paths: StorageManager,
    parts: HashMap<Table, usize>,
    runtime: Handle,
}

impl MinioSink {
    pub fn from_config(config: &MinioConfig, prefix: &str) -> Result<Self> {
        config.validate()?;

        // Create region with custom endpoint
        let region = Region::Custom {
            region: config.get_region().to_owned(),
            endpoint: config.endpoint.clone(),
        };

        // Create credentials
        let credentials = Credentials::new(
            Some(config.get_access_key()?),
            Some(config.get_secret_key()?),
            None,
            None,
            None,
        )?;

        // Create bucket handle, path style for MinIO
        let bucket = Bucket::new(&config.bucket_name, region, credentials)?;
        let bucket = if config.is_path_style() {
            *bucket.with_path_style()
        } else {
            *bucket
        };

        let runtime = Handle::try_current()
            .map_err(|e| anyhow!("MinIO sink needs a tokio runtime: {}", e))?;

        Ok(MinioSink {
            bucket,
            prefix: prefix.to_string(),
            paths: StorageManager::new(),
            parts: HashMap::new(),
            runtime,
        })
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket.name
    }

    pub async fn ensure_bucket(&self) -> Result<()> {
        match self.bucket.exists().await {
            Ok(true) => {
                info!("Bucket '{}' already exists", self.bucket.name);
            }
            Ok(false) => {
                let config = s3::BucketConfiguration::default();
                s3::Bucket::create(
                    &self.bucket.name,
                    self.bucket.region.clone(),
                    self.bucket.credentials().await?,
                    config,
                )
                .await
                .map_err(|e| anyhow!("Failed to create bucket: {}", e))?;
                info!("Created bucket: {}", self.bucket.name);
            }
            Err(e) => {
                return Err(anyhow!("Failed to check bucket existence: {}", e));
            }
        }
        Ok(())
    }

    pub async fn store_parquet(&self, key: &str, data: &[u8]) -> Result<()> {
        let response = self.bucket.put_object(key, data).await?;

        if response.status_code() == 200 {
            debug!("Stored Parquet object: {}", key);
            Ok(())
        } else {
            Err(anyhow!(
                "Failed to store {}: HTTP {}",
                key,
                response.status_code()
            ))
        }
    }

    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let list = self.bucket.list(prefix.to_string(), None).await?;

        let mut keys = Vec::new();
        for result in list {
            for object in result.contents {
                keys.push(object.key);
            }
        }

        Ok(keys)
    }

    fn next_part(&mut self, table: Table) -> usize {
        let part = self.parts.entry(table).or_insert(0);
        let current = *part;
        *part += 1;
        current
    }
}

impl RowSink for MinioSink {
    fn write_batch(&mut self, batch: &TableBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let table = batch.table();
        let mut df = batch_to_dataframe(batch)?;

        // Encode to Parquet in memory
        let mut buffer = Vec::new();
        ParquetWriter::new(&mut buffer)
            .finish(&mut df)
            .map_err(|e| anyhow!("Failed to encode {} as Parquet: {}", table, e))?;

        let part = self.next_part(table);
        let key = self.paths.object_key(&self.prefix, table, part);

        // Upload on the sink's runtime from this blocking thread
        self.runtime
            .block_on(self.store_parquet(&key, &buffer))
            .with_context(|| format!("Failed to upload {} rows of {}", df.height(), table))?;

        Ok(df.height())
    }

    fn describe(&self) -> String {
        format!("MinIO bucket '{}' under '{}'", self.bucket.name, self.prefix)
    }
}
