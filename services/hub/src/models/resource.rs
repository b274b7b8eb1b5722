//! Resource models for the catalog

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Number of academic terms a resource can be filed under
pub const SEMESTER_COUNT: u8 = 8;

/// Academic term, rendered as `Semester 1` … `Semester 8`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Semester(u8);

impl Semester {
    /// Term number `1..=8`, or `None` when out of range
    pub fn new(number: u8) -> Option<Self> {
        (1..=SEMESTER_COUNT).contains(&number).then_some(Self(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Semester {}", self.0)
    }
}

impl FromStr for Semester {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix("Semester ")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(Semester::new)
            .ok_or_else(|| {
                format!(
                    "Invalid semester '{}': expected 'Semester 1' through 'Semester {}'",
                    s, SEMESTER_COUNT
                )
            })
    }
}

impl TryFrom<String> for Semester {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Semester> for String {
    fn from(value: Semester) -> Self {
        value.to_string()
    }
}

/// Where the bytes of an uploaded file live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    /// Opaque key understood by the blob store
    pub key: String,
    /// File name as supplied by the uploader
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

/// Catalog metadata for a resource about to be created
#[derive(Debug, Clone)]
pub struct NewResource {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub semester: String,
    pub tags: Vec<String>,
}

/// A catalogued resource joined with its uploader and aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub semester: Semester,
    pub tags: Vec<String>,
    pub uploader_id: Uuid,
    /// Username of the uploader
    pub uploader: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    #[serde(rename = "upload_date")]
    pub created_at: DateTime<Utc>,
    pub average_rating: f64,
    pub rating_count: i64,
    pub download_count: i64,
    #[serde(skip)]
    pub blob_key: String,
}

/// Query parameters for resource listing
///
/// Blank values are treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceFilter {
    /// Case-insensitive subject prefix
    pub subject: Option<String>,
    /// Exact semester, e.g. `Semester 3`
    pub semester: Option<String>,
    /// Case-insensitive substring of title, description or any tag
    pub search: Option<String>,
}

impl ResourceFilter {
    pub fn subject(&self) -> Option<&str> {
        non_blank(self.subject.as_deref())
    }

    pub fn search(&self) -> Option<&str> {
        non_blank(self.search.as_deref())
    }

    /// Parsed semester option; an unrecognised value is an error
    pub fn semester(&self) -> Result<Option<Semester>, String> {
        non_blank(self.semester.as_deref())
            .map(str::parse)
            .transpose()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Split a comma-separated tag list into a trimmed, de-duplicated, sorted set
pub fn parse_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(','))
}

/// Trim tags, drop blanks and duplicates, and sort them
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}
