use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::Category;

/// JSON files found under `<root>/data/{aggregated,map,top}`, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredFiles {
    pub aggregated: Vec<PathBuf>,
    pub map: Vec<PathBuf>,
    pub top: Vec<PathBuf>,
}

impl DiscoveredFiles {
    pub fn for_category(&self, category: Category) -> &[PathBuf] {
        match category {
            Category::Aggregated => &self.aggregated,
            Category::Map => &self.map,
            Category::Top => &self.top,
        }
    }

    fn for_category_mut(&mut self, category: Category) -> &mut Vec<PathBuf> {
        match category {
            Category::Aggregated => &mut self.aggregated,
            Category::Map => &mut self.map,
            Category::Top => &mut self.top,
        }
    }

    pub fn total(&self) -> usize {
        self.aggregated.len() + self.map.len() + self.top.len()
    }
}

/// Walk the source tree. Missing category folders and unreadable directory
/// entries are logged and skipped.
pub fn discover_json_files(repo_path: &Path) -> DiscoveredFiles {
    let root = repo_path.join("data");
    let mut files = DiscoveredFiles::default();

    for category in Category::ALL {
        let base = root.join(category.as_str());
        if !base.is_dir() {
            warn!("Missing folder: {}", base.display());
            continue;
        }

        let found = files.for_category_mut(category);
        for entry in WalkDir::new(&base) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", base.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && is_json(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
    }

    info!(
        "Found json counts: aggregated={} map={} top={}",
        files.aggregated.len(),
        files.map.len(),
        files.top.len()
    );

    files
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
