use serde::{Deserialize, Serialize};

/// One playable item of a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub url: String,
}

/// How fetched files are ordered before they become tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TrackOrder {
    /// Ascending by the leading number of the filename.
    #[default]
    NumericPrefix,
    /// Most recently modified first.
    NewestFirst,
}

impl TrackOrder {
    pub fn label(self) -> &'static str {
        match self {
            Self::NumericPrefix => "By number",
            Self::NewestFirst => "Newest first",
        }
    }
}

/// Subset of the archive.org item metadata document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveMetadata {
    #[serde(default)]
    pub files: Vec<ArchiveFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveFile {
    pub name: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub mtime: Option<serde_json::Value>,
}

impl ArchiveFile {
    /// Modification time in seconds. archive.org sends it as a string of digits.
    pub fn mtime_secs(&self) -> i64 {
        match &self.mtime {
            Some(serde_json::Value::Number(number)) => number
                .as_i64()
                .or_else(|| number.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
                .unwrap_or(0),
            Some(serde_json::Value::String(text)) => text.trim().parse::<i64>().unwrap_or(0),
            _ => 0,
        }
    }
}
