use anyhow::Result;
use regex::Regex;
use std::path::{Component, Path};

use crate::models::Category;

const DATA_SEGMENT: &str = "data";
const IMPLIED_COUNTRY: &str = "india";

/// Geographic and temporal scope recovered from a file's directory path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathContext {
    pub country: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub year: Option<i32>,
    pub quarter: Option<i32>,
}

/// Marker tokens that give meaning to the segment following them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Country,
    State,
    StateWise,
}

impl Marker {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "country" => Some(Marker::Country),
            "state" => Some(Marker::State),
            "state-wise" => Some(Marker::StateWise),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Marker,
    NameAfter(Marker),
}

/// What the marker grammar saw in the directory segments between the
/// category and the file name.
#[derive(Debug, Default)]
struct MarkerScan {
    country: Option<String>,
    state: Option<String>,
    state_wise: Option<String>,
    saw_country: bool,
    saw_state: bool,
    saw_state_wise: bool,
    saw_india: bool,
}

impl MarkerScan {
    fn run<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut scan = MarkerScan::default();
        let mut expect = Expect::Marker;

        for segment in segments {
            if segment == IMPLIED_COUNTRY {
                scan.saw_india = true;
            }

            if let Expect::NameAfter(marker) = expect {
                expect = Expect::Marker;
                // A numeric segment is the year, never a place name.
                if !is_numeric(segment) && Marker::parse(segment).is_none() {
                    let slot = match marker {
                        Marker::Country => &mut scan.country,
                        Marker::State => &mut scan.state,
                        Marker::StateWise => &mut scan.state_wise,
                    };
                    if slot.is_none() {
                        *slot = Some(segment.to_string());
                    }
                    continue;
                }
            }

            if let Some(marker) = Marker::parse(segment) {
                match marker {
                    Marker::Country => scan.saw_country = true,
                    Marker::State => scan.saw_state = true,
                    Marker::StateWise => scan.saw_state_wise = true,
                }
                expect = Expect::NameAfter(marker);
            }
        }

        scan
    }
}

/// Resolves `(country, state, district, year, quarter)` from the path alone.
///
/// Paths are read as `.../data/<category>/<kind>/.../<year>/<quarter>.json`.
/// Every signal is independent: one that cannot be recovered is left `None`
/// without affecting the others, and a path that does not fit the grammar
/// resolves to an empty context.
pub struct PathContextResolver {
    escape: Regex,
}

impl PathContextResolver {
    pub fn new() -> Result<Self> {
        Ok(PathContextResolver {
            escape: Regex::new(r"%([0-9A-Fa-f]{2})")?,
        })
    }

    pub fn resolve(&self, path: &Path) -> PathContext {
        let segments: Vec<String> = path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        let Some(data_index) = segments.windows(2).position(|pair| {
            pair[0] == DATA_SEGMENT && Category::from_segment(&pair[1]).is_some()
        }) else {
            return PathContext::default();
        };
        let tail = &segments[data_index + 1..];
        if tail.len() < 4 {
            return PathContext::default();
        }
        let Some(category) = Category::from_segment(&tail[0]) else {
            return PathContext::default();
        };

        let directories = &tail[1..tail.len() - 1];
        let scan = MarkerScan::run(directories.iter().map(String::as_str));
        let mut context = PathContext::default();

        let scoped = match category {
            Category::Aggregated => {
                if scan.saw_country {
                    context.country = scan.country.clone();
                }
                if scan.saw_state {
                    context.state = scan.state.as_deref().map(|s| self.decode_segment(s));
                }
                scan.saw_country || scan.saw_state
            }
            Category::Map | Category::Top => {
                let national = scan.saw_country && scan.saw_india;
                if national {
                    context.country = Some(IMPLIED_COUNTRY.to_string());
                }
                let state = if scan.saw_state_wise {
                    scan.state_wise.as_deref()
                } else if national && scan.saw_state {
                    scan.state.as_deref()
                } else {
                    None
                };
                context.state = state.map(|s| self.decode_segment(s));
                national || scan.saw_state_wise
            }
        };

        if scoped {
            context.year = parse_year(&tail[tail.len() - 2]);
            context.quarter = parse_quarter(&tail[tail.len() - 1]);
        }

        context
    }

    /// Percent-decode a path segment (`%20` becomes a space).
    pub fn decode_segment(&self, segment: &str) -> String {
        if !segment.contains('%') {
            return segment.to_string();
        }

        let mut bytes = Vec::with_capacity(segment.len());
        let mut last = 0;
        for caps in self.escape.captures_iter(segment) {
            let (Some(whole), Some(hex)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            bytes.extend_from_slice(segment[last..whole.start()].as_bytes());
            match u8::from_str_radix(hex.as_str(), 16) {
                Ok(byte) => bytes.push(byte),
                Err(_) => bytes.extend_from_slice(whole.as_str().as_bytes()),
            }
            last = whole.end();
        }
        bytes.extend_from_slice(segment[last..].as_bytes());

        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn parse_year(segment: &str) -> Option<i32> {
    if is_numeric(segment) {
        segment.parse().ok()
    } else {
        None
    }
}

fn parse_quarter(file_name: &str) -> Option<i32> {
    let stem = Path::new(file_name).file_stem()?.to_str()?;
    if !is_numeric(stem) {
        return None;
    }
    stem.parse().ok().filter(|q| (1..=4).contains(q))
}
