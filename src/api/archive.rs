//! Internet Archive catalog client.
//!
//! Turns the metadata document of an archive item into an ordered list of
//! playable [`Track`]s. Network and parse failures surface as [`ArchiveError`];
//! [`ArchiveClient::load_catalog`] folds them into an empty catalog for the UI.

use crate::api::models::*;
use once_cell::sync::Lazy;
use std::cmp::Reverse;
use thiserror::Error;
use tracing::{debug, error, info};
use unicode_normalization::UnicodeNormalization;

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

pub const DEFAULT_METADATA_ENDPOINT: &str = "https://archive.org/metadata";
pub const DEFAULT_DOWNLOAD_ENDPOINT: &str = "https://archive.org/download";

pub fn default_allowed_formats() -> Vec<String> {
    vec!["Opus".to_string(), "VBR MP3".to_string()]
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("No identifier given")]
    EmptyIdentifier,
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Archive responded with HTTP {0}")]
    Status(u16),
    #[error("Malformed metadata document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Knobs that shape how a metadata document becomes a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogOptions {
    pub metadata_endpoint: String,
    pub download_endpoint: String,
    pub allowed_formats: Vec<String>,
    pub order: TrackOrder,
    pub numbered_titles: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            download_endpoint: DEFAULT_DOWNLOAD_ENDPOINT.to_string(),
            allowed_formats: default_allowed_formats(),
            order: TrackOrder::default(),
            numbered_titles: false,
        }
    }
}

/// Outcome of [`ArchiveClient::load_catalog`]: never an error, at worst empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogLoad {
    pub tracks: Vec<Track>,
    pub error: Option<String>,
}

pub struct ArchiveClient {
    pub options: CatalogOptions,
}

impl ArchiveClient {
    pub fn new(options: CatalogOptions) -> Self {
        Self { options }
    }

    fn metadata_url(&self, identifier: &str) -> String {
        format!(
            "{}/{}",
            self.options.metadata_endpoint.trim_end_matches('/'),
            urlencoding::encode(identifier)
        )
    }

    pub async fn fetch_catalog(&self, identifier: &str) -> Result<Vec<Track>, ArchiveError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ArchiveError::EmptyIdentifier);
        }

        let url = self.metadata_url(identifier);
        debug!(%url, "fetching archive metadata");
        let response = HTTP_CLIENT.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let doc: ArchiveMetadata = serde_json::from_str(&body)?;

        Ok(tracks_from_metadata(identifier, &doc, &self.options))
    }

    /// Like [`fetch_catalog`](Self::fetch_catalog) but failures become an
    /// empty catalog plus a logged, displayable message.
    pub async fn load_catalog(&self, identifier: &str) -> CatalogLoad {
        if identifier.trim().is_empty() {
            return CatalogLoad::default();
        }
        match self.fetch_catalog(identifier).await {
            Ok(tracks) => {
                info!(identifier, count = tracks.len(), "catalog loaded");
                CatalogLoad {
                    tracks,
                    error: None,
                }
            }
            Err(err) => {
                error!(identifier, %err, "catalog fetch failed");
                CatalogLoad {
                    tracks: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

/// Filter, order and map the files of a metadata document.
pub fn tracks_from_metadata(
    identifier: &str,
    doc: &ArchiveMetadata,
    options: &CatalogOptions,
) -> Vec<Track> {
    let mut files: Vec<&ArchiveFile> = doc
        .files
        .iter()
        .filter(|f| options.allowed_formats.iter().any(|fmt| *fmt == f.format))
        .collect();

    // Both sorts are stable: equal keys keep document order.
    match options.order {
        TrackOrder::NumericPrefix => {
            files.sort_by_key(|f| {
                let prefix = numeric_prefix(&f.name);
                (prefix.is_none(), prefix.unwrap_or(0))
            });
        }
        TrackOrder::NewestFirst => files.sort_by_key(|f| Reverse(f.mtime_secs())),
    }

    let total = files.len();
    let base = options.download_endpoint.trim_end_matches('/');
    let encoded_identifier = urlencoding::encode(identifier);

    files
        .into_iter()
        .enumerate()
        .map(|(i, file)| {
            let title = derive_title(&file.name, options.order);
            let title = if options.numbered_titles {
                let ordinal = match options.order {
                    TrackOrder::NumericPrefix => i + 1,
                    TrackOrder::NewestFirst => total - i,
                };
                format!("{ordinal} - {title}")
            } else {
                title
            };
            Track {
                id: i.to_string(),
                title,
                url: format!(
                    "{base}/{encoded_identifier}/{}",
                    urlencoding::encode(&file.name)
                ),
            }
        })
        .collect()
}

/// Display title for a filename: extension dropped, NFKC-normalised, cut at
/// `#`, trimmed. Under [`TrackOrder::NumericPrefix`] the leading track number
/// goes too, as long as something is left.
pub fn derive_title(file_name: &str, order: TrackOrder) -> String {
    let normalized: String = strip_extension(file_name).nfkc().collect();
    let head = normalized.split('#').next().unwrap_or_default().trim();

    match order {
        TrackOrder::NumericPrefix => strip_track_number(head).to_string(),
        TrackOrder::NewestFirst => head.to_string(),
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() && !name[pos + 1..].contains('/') => &name[..pos],
        _ => name,
    }
}

fn strip_track_number(title: &str) -> &str {
    let digits = title.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return title;
    }
    let rest = title[digits..]
        .trim_start_matches(|c: char| matches!(c, ' ' | '.' | '-' | '_' | ')'));
    if rest.is_empty() {
        title
    } else {
        rest
    }
}

fn numeric_prefix(name: &str) -> Option<u64> {
    let digits: String = name.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse().unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> ArchiveMetadata {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn example_item_scenario() {
        let metadata = doc(
            r#"{"files":[
                {"name":"bonus#take2.mp3","format":"VBR MP3","mtime":"30"},
                {"name":"02 verse.mp3","format":"VBR MP3","mtime":"20"},
                {"name":"01 intro.mp3","format":"VBR MP3","mtime":"10"},
                {"name":"cover.jpg","format":"JPEG","mtime":"5"}
            ]}"#,
        );

        let tracks = tracks_from_metadata("example-item", &metadata, &CatalogOptions::default());

        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        let ids: Vec<&str> = tracks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(titles, vec!["intro", "verse", "bonus"]);
        assert_eq!(ids, vec!["0", "1", "2"]);
        assert_eq!(
            tracks[0].url,
            "https://archive.org/download/example-item/01%20intro.mp3"
        );
        assert_eq!(
            tracks[2].url,
            "https://archive.org/download/example-item/bonus%23take2.mp3"
        );
    }

    #[test]
    fn newest_first_orders_by_mtime_and_numbers_backwards() {
        let metadata = doc(
            r#"{"files":[
                {"name":"old.opus","format":"Opus","mtime":"100"},
                {"name":"new.opus","format":"Opus","mtime":"300"},
                {"name":"mid.opus","format":"Opus","mtime":"200"}
            ]}"#,
        );
        let options = CatalogOptions {
            order: TrackOrder::NewestFirst,
            numbered_titles: true,
            ..CatalogOptions::default()
        };

        let titles: Vec<String> = tracks_from_metadata("x", &metadata, &options)
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["3 - new", "2 - mid", "1 - old"]);
    }

    #[test]
    fn equal_keys_keep_document_order() {
        let metadata = doc(
            r#"{"files":[
                {"name":"b.opus","format":"Opus","mtime":"1"},
                {"name":"a.opus","format":"Opus","mtime":"1"},
                {"name":"7 x.opus","format":"Opus","mtime":"1"},
                {"name":"c.opus","format":"Opus","mtime":"1"}
            ]}"#,
        );

        let by_number: Vec<String> =
            tracks_from_metadata("x", &metadata, &CatalogOptions::default())
                .into_iter()
                .map(|t| t.title)
                .collect();
        assert_eq!(by_number, vec!["x", "b", "a", "c"]);

        let newest = CatalogOptions {
            order: TrackOrder::NewestFirst,
            ..CatalogOptions::default()
        };
        let by_time: Vec<String> = tracks_from_metadata("x", &metadata, &newest)
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(by_time, vec!["b", "a", "7 x", "c"]);
    }

    #[test]
    fn unknown_formats_are_dropped() {
        let metadata = doc(
            r#"{"files":[
                {"name":"a.flac","format":"Flac"},
                {"name":"a_spectrogram.png","format":"PNG"},
                {"name":"a.ogg","format":"Ogg Vorbis"}
            ]}"#,
        );
        assert!(tracks_from_metadata("x", &metadata, &CatalogOptions::default()).is_empty());
    }

    #[test]
    fn title_rules() {
        let order = TrackOrder::NumericPrefix;
        assert_eq!(derive_title("03 - Song.Name.mp3", order), "Song.Name");
        assert_eq!(derive_title("42.mp3", order), "42");
        assert_eq!(derive_title("  spaced  #tail.opus", order), "spaced");
        assert_eq!(derive_title("noext", order), "noext");
        // Full-width digits and ligatures fold under NFKC.
        assert_eq!(derive_title("ﬁle１.mp3", TrackOrder::NewestFirst), "file1");
        assert_eq!(
            derive_title("01 intro.mp3", TrackOrder::NewestFirst),
            "01 intro"
        );
    }

    #[test]
    fn title_derivation_is_deterministic() {
        for name in ["01 intro.mp3", "bonus#take2.mp3", "Tập 12 # extra.opus", "x"] {
            for order in [TrackOrder::NumericPrefix, TrackOrder::NewestFirst] {
                assert_eq!(derive_title(name, order), derive_title(name, order));
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn unreachable_archive_degrades_to_empty_catalog() {
        let client = ArchiveClient::new(CatalogOptions {
            metadata_endpoint: "http://127.0.0.1:9/metadata".to_string(),
            ..CatalogOptions::default()
        });

        let load = client.load_catalog("example-item").await;
        assert!(load.tracks.is_empty());
        assert!(load.error.is_some());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn empty_identifier_is_rejected_without_a_request() {
        let client = ArchiveClient::new(CatalogOptions::default());
        assert!(matches!(
            client.fetch_catalog("   ").await,
            Err(ArchiveError::EmptyIdentifier)
        ));
        assert_eq!(client.load_catalog("").await, CatalogLoad::default());
    }
}
