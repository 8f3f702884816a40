use std::collections::BTreeMap;
use tracing::debug;

use super::discovery::DiscoveredFiles;
use super::reader::read_document;
use super::router::Route;
use crate::models::{Category, Kind};
use crate::processor::shape::detect;

pub const NO_MATCH: &str = "no-match";
pub const UNREADABLE: &str = "unreadable";

/// Per (category, kind), how many documents matched each shape variant.
#[derive(Debug, Clone, Default)]
pub struct ShapeCensus {
    pub groups: BTreeMap<(Category, Kind), BTreeMap<&'static str, usize>>,
    pub unrouted: usize,
}

impl ShapeCensus {
    pub fn count(&self, category: Category, kind: Kind, shape: &str) -> usize {
        self.groups
            .get(&(category, kind))
            .and_then(|shapes| shapes.get(shape))
            .copied()
            .unwrap_or(0)
    }
}

pub fn shape_census(files: &DiscoveredFiles) -> ShapeCensus {
    let mut census = ShapeCensus::default();

    for category in Category::ALL {
        for path in files.for_category(category) {
            let Some(route) = Route::classify(path) else {
                census.unrouted += 1;
                continue;
            };

            let label = match read_document(path) {
                Ok((document, _)) => {
                    let data = document.get("data").unwrap_or(&serde_json::Value::Null);
                    detect(route.category, route.kind, data)
                        .map_or(NO_MATCH, |shape| shape.kind().name())
                }
                Err(e) => {
                    debug!("Unreadable {}: {:#}", path.display(), e);
                    UNREADABLE
                }
            };

            *census
                .groups
                .entry((route.category, route.kind))
                .or_default()
                .entry(label)
                .or_insert(0) += 1;
        }
    }

    census
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::discover_json_files;
    use std::fs;

    #[test]
    fn test_census_counts_variants() {
        let tmp = tempfile::tempdir().unwrap();
        let write = |relative: &str, content: &str| {
            let path = tmp.path().join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        };

        write(
            "data/aggregated/user/country/india/2018/1.json",
            r#"{"data": {"registeredUsers": 1}}"#,
        );
        write(
            "data/aggregated/user/country/india/2018/2.json",
            r#"{"data": {"usersByDevice": [{"brand": "X", "count": 3}]}}"#,
        );
        write("data/aggregated/user/country/india/2018/3.json", "{}");
        write("data/aggregated/user/country/india/2018/4.json", "[oops");

        let census = shape_census(&discover_json_files(tmp.path()));
        assert_eq!(census.count(Category::Aggregated, Kind::User, "user-summary"), 1);
        assert_eq!(census.count(Category::Aggregated, Kind::User, "users-by-device"), 1);
        assert_eq!(census.count(Category::Aggregated, Kind::User, NO_MATCH), 1);
        assert_eq!(census.count(Category::Aggregated, Kind::User, UNREADABLE), 1);
        assert_eq!(census.unrouted, 0);
    }
}
