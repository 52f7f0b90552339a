use super::Provider;
use crate::models::{Album, Artist, ArtistId, Playlist, Track};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

/// One call received by the `MockProvider`, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetFavoriteArtists,
    GetArtist(String),
    GetArtistAlbums(String),
    GetAlbumTracks(String),
    GetUserPlaylists,
    CreatePlaylist(String),
    AddPlaylistTracks {
        playlist_id: String,
        track_ids: Vec<String>,
    },
    DeletePlaylist(String),
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Call::CreatePlaylist(_) | Call::AddPlaylistTracks { .. } | Call::DeletePlaylist(_)
        )
    }
}

/// In-memory catalog and playlist store used in tests and dry runs without
/// credentials. Records every call and returns deterministic ids.
#[derive(Default)]
pub struct MockProvider {
    favorites: Vec<ArtistId>,
    artists: HashMap<String, Artist>,
    albums: HashMap<String, Vec<Album>>,
    tracks: HashMap<String, Vec<Track>>,
    failing_artist_detail: HashSet<String>,
    failing_albums: HashSet<String>,
    failing_tracks: HashSet<String>,
    fail_add_call: Option<usize>,
    playlists: Mutex<Vec<Playlist>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    add_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a favorite artist with its albums, each album given as
    /// `(album_id, track_ids)`. Track titles are "<track id> title".
    pub fn with_artist(mut self, id: &str, name: &str, albums: &[(&str, &[&str])]) -> Self {
        self.favorites.push(ArtistId::new(id));
        self.artists.insert(
            id.to_string(),
            Artist {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
        let mut list = Vec::new();
        for (album_id, track_ids) in albums {
            list.push(Album {
                id: album_id.to_string(),
                title: format!("{} album", album_id),
                artists: Vec::new(),
                number_of_tracks: Some(track_ids.len() as u32),
                release_date: None,
            });
            let tracks = track_ids
                .iter()
                .map(|t| Track {
                    id: t.to_string(),
                    title: format!("{} title", t),
                    duration: None,
                    album_id: Some(album_id.to_string()),
                    artists: Vec::new(),
                })
                .collect();
            self.tracks.insert(album_id.to_string(), tracks);
        }
        self.albums.insert(id.to_string(), list);
        self
    }

    pub fn with_playlist(self, id: &str, title: &str) -> Self {
        self.lock_playlists().push(Playlist {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            number_of_tracks: None,
        });
        self
    }

    pub fn fail_artist_detail(mut self, artist_id: &str) -> Self {
        self.failing_artist_detail.insert(artist_id.to_string());
        self
    }

    pub fn fail_albums(mut self, artist_id: &str) -> Self {
        self.failing_albums.insert(artist_id.to_string());
        self
    }

    pub fn fail_tracks(mut self, album_id: &str) -> Self {
        self.failing_tracks.insert(album_id.to_string());
        self
    }

    /// Make the n-th (1-based) `add_playlist_tracks` call fail.
    pub fn fail_add_call(mut self, n: usize) -> Self {
        self.fail_add_call = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.lock_playlists().clone()
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn lock_playlists(&self) -> std::sync::MutexGuard<'_, Vec<Playlist>> {
        self.playlists.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_favorite_artists(&self) -> Result<Vec<ArtistId>> {
        self.record(Call::GetFavoriteArtists);
        Ok(self.favorites.clone())
    }

    async fn get_artist(&self, artist_id: &str) -> Result<Artist> {
        self.record(Call::GetArtist(artist_id.to_string()));
        if self.failing_artist_detail.contains(artist_id) {
            return Err(anyhow!("mock: artist {} unavailable", artist_id));
        }
        self.artists
            .get(artist_id)
            .cloned()
            .ok_or_else(|| anyhow!("mock: unknown artist {}", artist_id))
    }

    async fn get_artist_albums(&self, artist_id: &str, limit: usize) -> Result<Vec<Album>> {
        self.record(Call::GetArtistAlbums(artist_id.to_string()));
        if self.failing_albums.contains(artist_id) {
            return Err(anyhow!("mock: albums of {} unavailable", artist_id));
        }
        Ok(self
            .albums
            .get(artist_id)
            .map(|a| a.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<Track>> {
        self.record(Call::GetAlbumTracks(album_id.to_string()));
        if self.failing_tracks.contains(album_id) {
            return Err(anyhow!("mock: tracks of {} unavailable", album_id));
        }
        Ok(self.tracks.get(album_id).cloned().unwrap_or_default())
    }

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
        self.record(Call::GetUserPlaylists);
        Ok(self.playlists())
    }

    async fn create_playlist(&self, title: &str, description: &str) -> Result<Playlist> {
        self.record(Call::CreatePlaylist(title.to_string()));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let playlist = Playlist {
            id: format!("mock-playlist-{}", n),
            title: title.to_string(),
            description: description.to_string(),
            number_of_tracks: Some(0),
        };
        info!("MockProvider: create_playlist {} -> {}", title, playlist.id);
        self.lock_playlists().push(playlist.clone());
        Ok(playlist)
    }

    async fn add_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        self.record(Call::AddPlaylistTracks {
            playlist_id: playlist_id.to_string(),
            track_ids: track_ids.to_vec(),
        });
        let n = self.add_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_add_call == Some(n) {
            return Err(anyhow!("mock: add call {} rejected", n));
        }
        let mut playlists = self.lock_playlists();
        let playlist = playlists
            .iter_mut()
            .find(|p| p.id == playlist_id)
            .ok_or_else(|| anyhow!("mock: unknown playlist {}", playlist_id))?;
        let count = playlist.number_of_tracks.unwrap_or(0) + track_ids.len() as u32;
        playlist.number_of_tracks = Some(count);
        Ok(())
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.record(Call::DeletePlaylist(playlist_id.to_string()));
        let mut playlists = self.lock_playlists();
        let before = playlists.len();
        playlists.retain(|p| p.id != playlist_id);
        if playlists.len() == before {
            return Err(anyhow!("mock: unknown playlist {}", playlist_id));
        }
        Ok(())
    }
}
