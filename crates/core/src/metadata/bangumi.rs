//! Bangumi (bgm.tv) metadata resolver.
//!
//! Resolution takes three kinds of request:
//! - `GET /search/subject/{title}?type=2` to find the anime subject
//! - `GET /v0/subjects/{id}` and `GET /v0/subjects/{id}/subjects` for the
//!   subject and its related song entries
//! - `GET /v0/subjects/{song_id}` per song for the description text

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{extract_artist, placeholder_metadata, MetadataError, MetadataResolver, UNKNOWN_ARTIST};
use crate::config::MetadataConfig;
use crate::task::Metadata;

/// Bangumi subject type for anime.
const SUBJECT_TYPE_ANIME: u32 = 2;

/// Bangumi subject type for music.
const SUBJECT_TYPE_MUSIC: u32 = 3;

/// Bangumi-backed metadata resolver.
pub struct BangumiResolver {
    client: Client,
    base_url: String,
}

impl BangumiResolver {
    /// Create a new resolver.
    pub fn new(config: &MetadataConfig) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str, token: Option<&str>) -> RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match token {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, MetadataError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MetadataError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| MetadataError::ParseError(e.to_string()))
    }

    /// First anime subject matching the title, if any.
    async fn search_subject(
        &self,
        anime_title: &str,
        token: Option<&str>,
    ) -> Result<Option<u64>, MetadataError> {
        let path = format!("/search/subject/{}", urlencoding::encode(anime_title));
        let request = self
            .get(&path, token)
            .query(&[("type", SUBJECT_TYPE_ANIME.to_string())]);

        let response = request.send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(MetadataError::ApiError { status, message });
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| MetadataError::ParseError(e.to_string()))?;

        Ok(search.list.and_then(|list| list.first().map(|s| s.id)))
    }

    /// Look up a song entry and extract its artist.
    ///
    /// Lookup failures degrade to the unknown-artist sentinel.
    async fn song_metadata(
        &self,
        anime_title: &str,
        song: &RelatedSubject,
        song_type: &str,
        token: Option<&str>,
    ) -> Metadata {
        let song_title = song.song_title();
        let path = format!("/v0/subjects/{}", song.id);

        let artist = match self.fetch_json::<SubjectDetail>(self.get(&path, token)).await {
            Ok(detail) => extract_artist(&song_title, detail.summary.as_deref().unwrap_or("")),
            Err(e) => {
                warn!(song_id = song.id, error = %e, "Bangumi song lookup failed");
                UNKNOWN_ARTIST.to_string()
            }
        };

        Metadata {
            anime_title: anime_title.to_string(),
            song_title,
            artist,
            song_type: song_type.to_string(),
            bangumi_id: Some(song.id.to_string()),
        }
    }
}

#[async_trait]
impl MetadataResolver for BangumiResolver {
    async fn resolve(
        &self,
        anime_title: &str,
        token: Option<&str>,
    ) -> Result<Vec<Metadata>, MetadataError> {
        debug!(title = anime_title, "Bangumi search");

        let Some(subject_id) = self.search_subject(anime_title, token).await? else {
            debug!(title = anime_title, "No Bangumi subject found");
            return Ok(Vec::new());
        };

        let subject: SubjectDetail = self
            .fetch_json(self.get(&format!("/v0/subjects/{}", subject_id), token))
            .await?;
        let display_title = subject.display_name();

        let related: Vec<RelatedSubject> = self
            .fetch_json(self.get(&format!("/v0/subjects/{}/subjects", subject_id), token))
            .await?;

        let songs: Vec<(&RelatedSubject, &'static str)> = related
            .iter()
            .filter(|r| r.subject_type == SUBJECT_TYPE_MUSIC)
            .filter_map(|r| song_type_for_relation(&r.relation).map(|t| (r, t)))
            .collect();

        if songs.is_empty() {
            debug!(subject_id, "Subject has no song entries, returning placeholder");
            return Ok(vec![placeholder_metadata(
                &display_title,
                Some(subject_id.to_string()),
            )]);
        }

        let lookups = songs
            .into_iter()
            .map(|(song, song_type)| self.song_metadata(&display_title, song, song_type, token));
        let results = futures::future::join_all(lookups).await;

        debug!(subject_id, songs = results.len(), "Bangumi resolution complete");
        Ok(results)
    }
}

/// Map a Bangumi relation label to a song type.
fn song_type_for_relation(relation: &str) -> Option<&'static str> {
    if relation.contains("片头") || relation.contains("片頭") {
        Some("OP")
    } else if relation.contains("片尾") {
        Some("ED")
    } else if relation.contains("插入") {
        Some("IN")
    } else {
        None
    }
}

// ============================================================================
// Bangumi API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    list: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct SubjectDetail {
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_cn: String,
    #[serde(default)]
    summary: Option<String>,
}

impl SubjectDetail {
    fn display_name(&self) -> String {
        if self.name_cn.is_empty() {
            self.name.clone()
        } else {
            self.name_cn.clone()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RelatedSubject {
    id: u64,
    #[serde(rename = "type")]
    subject_type: u32,
    #[serde(default)]
    name: String,
    #[serde(default)]
    name_cn: String,
    #[serde(default)]
    relation: String,
}

impl RelatedSubject {
    /// Songs keep their original title; the translated one is a fallback.
    fn song_title(&self) -> String {
        if self.name.is_empty() {
            self.name_cn.clone()
        } else {
            self.name.clone()
        }
    }
}
