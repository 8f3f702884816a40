use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::Table;

/// Names output files and objects for one load run. Every part written in a
/// run shares the run id and the run's date partition.
#[derive(Debug, Clone)]
pub struct StorageManager {
    run_id: Uuid,
    date: String,
}

impl StorageManager {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            date: Utc::now().format("%Y/%m/%d").to_string(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn table_dir(output_dir: &Path, table: Table) -> PathBuf {
        output_dir.join(table.name())
    }

    pub fn part_file_name(&self, part: usize, extension: &str) -> String {
        format!("{}-{:05}.{}", self.run_id, part, extension)
    }

    pub fn csv_file_name(table: Table) -> String {
        format!("{}.csv", table.name())
    }

    /// `<prefix>/<table>/<YYYY/MM/DD>/<run-id>-<part>.parquet`
    pub fn object_key(&self, prefix: &str, table: Table, part: usize) -> String {
        let prefix = prefix.trim_matches('/');
        let file_name = self.part_file_name(part, "parquet");
        if prefix.is_empty() {
            format!("{}/{}/{}", table.name(), self.date, file_name)
        } else {
            format!("{}/{}/{}/{}", prefix, table.name(), self.date, file_name)
        }
    }
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_layout() {
        let paths = StorageManager::new();
        let key = paths.object_key("/pulse/", Table::TopUser, 3);
        let parts: Vec<&str> = key.split('/').collect();

        assert_eq!(parts[0], "pulse");
        assert_eq!(parts[1], "top_user");
        assert_eq!(parts.len(), 6);
        assert_eq!(parts[5], format!("{}-00003.parquet", paths.run_id()));

        let bare = paths.object_key("", Table::MapMap, 0);
        assert!(bare.starts_with("map_map/"));
    }

    #[test]
    fn test_local_names() {
        let paths = StorageManager::new();
        assert_eq!(
            StorageManager::table_dir(Path::new("/out"), Table::AggregatedUser),
            PathBuf::from("/out/aggregated_user")
        );
        assert_eq!(StorageManager::csv_file_name(Table::MapInsurance), "map_insurance.csv");
        assert!(paths.part_file_name(12, "ndjson").ends_with("-00012.ndjson"));
    }
}
