use super::gate::RequestGate;
use super::jsonapi::{
    AlbumAttributes, Document, ErrorBody, Identifier, NameAttributes, Resource, TrackAttributes,
};
use super::{Provider, TokenSource, PLAYLIST_BATCH_LIMIT};
use crate::models::{Album, Artist, ArtistId, Playlist, PlaylistResource, Track};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use urlencoding::encode;

const JSON_API: &str = "application/vnd.api+json";

/// TIDAL v2 (JSON:API) client. Every call goes through a single `RequestGate`,
/// so at most one request is in flight and each is followed by a short pause.
/// The base URL comes from `TIDAL_API_BASE` when set, which lets tests point
/// the client at a mockito server.
pub struct TidalClient {
    client: Client,
    base_url: String,
    country_code: String,
    tokens: Arc<dyn TokenSource>,
    gate: RequestGate,
    user_id: tokio::sync::Mutex<Option<String>>,
}

impl TidalClient {
    pub fn new(tokens: Arc<dyn TokenSource>, country_code: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: Self::default_base_url(),
            country_code: country_code.into(),
            tokens,
            gate: RequestGate::default(),
            user_id: tokio::sync::Mutex::new(None),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.gate = RequestGate::new(cooldown);
        self
    }

    fn default_base_url() -> String {
        std::env::var("TIDAL_API_BASE").unwrap_or_else(|_| "https://openapi.tidal.com/v2".into())
    }

    /// Issue one request through the gate and return the response body.
    async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        let url = format!("{}{}", self.base_url, path_and_query);
        self.gate
            .run(async {
                let bearer = self
                    .tokens
                    .bearer()
                    .await
                    .context("failed to get valid token")?;
                let mut req = self
                    .client
                    .request(method.clone(), &url)
                    .header(AUTHORIZATION, bearer)
                    .header(ACCEPT, JSON_API);
                if let Some(b) = &body {
                    req = req
                        .header(CONTENT_TYPE, JSON_API)
                        .body(serde_json::to_vec(b)?);
                }
                log::debug!("{} {}", method, url);
                let resp = req
                    .send()
                    .await
                    .with_context(|| format!("request failed: {} {}", method, path_and_query))?;
                let status = resp.status();
                let text = resp
                    .text()
                    .await
                    .context("failed to read response body")?;
                if !status.is_success() {
                    return Err(api_error(status, &text));
                }
                Ok::<String, anyhow::Error>(text)
            })
            .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let text = self.send(Method::GET, path_and_query, None).await?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse response of {}", path_and_query))
    }

    /// Id of the authenticated user, fetched once per client.
    pub async fn get_user_id(&self) -> Result<String> {
        {
            let g = self.user_id.lock().await;
            if let Some(u) = g.as_ref() {
                return Ok(u.clone());
            }
        }
        let doc: Document<Resource<serde_json::Value>> = self
            .get_json("/users/me")
            .await
            .context("failed to get user info")?;
        if doc.data.id.is_empty() {
            bail!("no user ID in /users/me response");
        }
        let mut g = self.user_id.lock().await;
        *g = Some(doc.data.id.clone());
        Ok(doc.data.id)
    }

    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Playlist> {
        let path = format!(
            "/playlists/{}?countryCode={}",
            encode(playlist_id),
            encode(&self.country_code)
        );
        let doc: Document<PlaylistResource> = self
            .get_json(&path)
            .await
            .context("failed to fetch playlist")?;
        Ok(Playlist::from(doc.data))
    }

    pub async fn update_playlist_metadata(
        &self,
        playlist_id: &str,
        title: &str,
        description: &str,
    ) -> Result<()> {
        let path = format!(
            "/playlists/{}?countryCode={}",
            encode(playlist_id),
            encode(&self.country_code)
        );
        let body = json!({
            "data": {
                "type": "playlists",
                "id": playlist_id,
                "attributes": {
                    "name": title,
                    "description": description
                }
            }
        });
        self.send(Method::PATCH, &path, Some(body))
            .await
            .context("failed to update playlist")?;
        Ok(())
    }
}

fn api_error(status: StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.summary())
    {
        Some(msg) => anyhow!("API error (status {}): {}", status.as_u16(), msg),
        None => anyhow!("HTTP error {}: {}", status.as_u16(), body),
    }
}

#[async_trait]
impl Provider for TidalClient {
    fn name(&self) -> &str {
        "tidal"
    }

    async fn get_favorite_artists(&self) -> Result<Vec<ArtistId>> {
        let user_id = self.get_user_id().await?;
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut path = format!(
                "/userCollections/{}/relationships/artists?countryCode={}",
                encode(&user_id),
                encode(&self.country_code)
            );
            if let Some(c) = &cursor {
                path.push_str(&format!("&page[cursor]={}", encode(c)));
            }
            let doc: Document<Vec<Identifier>> = self
                .get_json(&path)
                .await
                .context("failed to fetch favorite artists")?;

            all.extend(
                doc.data
                    .iter()
                    .filter(|i| i.kind.is_empty() || i.kind == "artists")
                    .map(|i| ArtistId::new(i.id.clone())),
            );

            match doc.next_cursor() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        log::debug!("fetched {} favorite artists", all.len());
        Ok(all)
    }

    async fn get_artist(&self, artist_id: &str) -> Result<Artist> {
        let path = format!(
            "/artists/{}?countryCode={}",
            encode(artist_id),
            encode(&self.country_code)
        );
        let doc: Document<Resource<NameAttributes>> = self
            .get_json(&path)
            .await
            .context("failed to fetch artist")?;
        Ok(Artist {
            id: doc.data.id,
            name: doc.data.attributes.name,
        })
    }

    async fn get_artist_albums(&self, artist_id: &str, limit: usize) -> Result<Vec<Album>> {
        let path = format!(
            "/artists/{}?include=albums&countryCode={}",
            encode(artist_id),
            encode(&self.country_code)
        );
        let doc: Document<Resource<NameAttributes>> = self
            .get_json(&path)
            .await
            .context("failed to fetch artist albums")?;
        let artist = Artist {
            id: doc.data.id.clone(),
            name: doc.data.attributes.name.clone(),
        };
        let albums = doc
            .included_of::<AlbumAttributes>("albums")
            .into_iter()
            .take(limit)
            .map(|r| Album {
                id: r.id,
                title: r.attributes.title,
                artists: vec![artist.clone()],
                number_of_tracks: r.attributes.number_of_items,
                release_date: r.attributes.release_date,
            })
            .collect();
        Ok(albums)
    }

    async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        let path = format!(
            "/albums/{}?include=items&countryCode={}",
            encode(album_id),
            encode(&self.country_code)
        );
        let doc: Document<Resource<serde_json::Value>> = self
            .get_json(&path)
            .await
            .context("failed to fetch album tracks")?;
        let tracks = doc
            .included_of::<TrackAttributes>("tracks")
            .into_iter()
            .map(|r| Track {
                id: r.id,
                title: r.attributes.title,
                duration: r.attributes.duration,
                album_id: Some(album_id.to_string()),
                artists: Vec::new(),
            })
            .collect();
        Ok(tracks)
    }

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        let user_id = self.get_user_id().await?;
        let mut playlists = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut path = format!(
                "/playlists?countryCode={}&filter[owners.id]={}",
                encode(&self.country_code),
                encode(&user_id)
            );
            if let Some(c) = &cursor {
                path.push_str(&format!("&page[cursor]={}", encode(c)));
            }
            let doc: Document<Vec<PlaylistResource>> = self
                .get_json(&path)
                .await
                .context("failed to fetch playlists")?;
            let next = doc.next_cursor().map(|c| c.to_string());
            playlists.extend(doc.data.into_iter().map(Playlist::from));

            match next {
                Some(n) => cursor = Some(n),
                None => break,
            }
        }

        Ok(playlists)
    }

    async fn create_playlist(&self, title: &str, description: &str) -> Result<Playlist> {
        let path = format!("/playlists?countryCode={}", encode(&self.country_code));
        let body = json!({
            "data": {
                "type": "playlists",
                "attributes": {
                    "name": title,
                    "description": description,
                    "accessType": "UNLISTED"
                }
            }
        });
        let text = self
            .send(Method::POST, &path, Some(body))
            .await
            .context("failed to create playlist")?;
        let doc: Document<PlaylistResource> =
            serde_json::from_str(&text).context("failed to parse created playlist")?;
        let playlist = Playlist::from(doc.data);
        if playlist.id.is_empty() {
            bail!("no playlist id in create response");
        }
        Ok(playlist)
    }

    async fn add_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        if track_ids.is_empty() {
            return Ok(());
        }
        if track_ids.len() > PLAYLIST_BATCH_LIMIT {
            bail!(
                "at most {} tracks may be added per call, got {}",
                PLAYLIST_BATCH_LIMIT,
                track_ids.len()
            );
        }
        let data: Vec<Identifier> = track_ids
            .iter()
            .map(|id| Identifier {
                kind: "tracks".into(),
                id: id.clone(),
            })
            .collect();
        let path = format!(
            "/playlists/{}/relationships/items?countryCode={}",
            encode(playlist_id),
            encode(&self.country_code)
        );
        self.send(Method::POST, &path, Some(json!({ "data": data })))
            .await
            .context("failed to add tracks to playlist")?;
        Ok(())
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        let path = format!("/playlists/{}", encode(playlist_id));
        self.send(Method::DELETE, &path, None)
            .await
            .context("failed to delete playlist")?;
        Ok(())
    }
}
