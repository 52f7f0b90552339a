pub mod callback;
pub mod gate;
pub mod jsonapi;
pub mod mock;
pub mod pkce;
pub mod tidal;
pub mod tidal_auth;

use crate::models::{Album, Artist, ArtistId, Playlist, Track};
use anyhow::{Context, Result};
use tracing::info;

/// TIDAL accepts at most this many items per playlist write.
pub const PLAYLIST_BATCH_LIMIT: usize = 20;

/// Supplies the `Authorization` header value for API calls.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync {
    /// Returns `"Bearer <access token>"`, refreshing first if needed.
    async fn bearer(&self) -> Result<String>;
}

/// A fixed access token. Handy for tests and for tokens obtained elsewhere.
pub struct StaticToken(pub String);

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.0))
    }
}

/// Provider trait: the catalog and playlist operations the builder needs.
/// Implementations: tidal::TidalClient and mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// All favorite artists of the current user, every page.
    async fn get_favorite_artists(&self) -> Result<Vec<ArtistId>>;

    async fn get_artist(&self, artist_id: &str) -> Result<Artist>;

    /// Up to `limit` albums of the artist.
    async fn get_artist_albums(&self, artist_id: &str, limit: usize) -> Result<Vec<Album>>;

    async fn get_album_tracks(&self, album_id: &str) -> Result<Vec<Track>>;

    async fn get_user_playlists(&self) -> Result<Vec<Playlist>>;

    async fn create_playlist(&self, title: &str, description: &str) -> Result<Playlist>;

    /// One write call. Callers must keep `track_ids` within `PLAYLIST_BATCH_LIMIT`.
    async fn add_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;

    /// Return the provider's name (for logging)
    fn name(&self) -> &str;

    /// First playlist whose title equals `name` exactly.
    async fn find_playlist_by_name(&self, name: &str) -> Result<Option<Playlist>> {
        let playlists = self
            .get_user_playlists()
            .await
            .context("failed to get user playlists")?;
        Ok(playlists.into_iter().find(|p| p.title == name))
    }

    /// Every playlist whose title equals `name` exactly.
    async fn find_all_playlists_by_name(&self, name: &str) -> Result<Vec<Playlist>> {
        let playlists = self
            .get_user_playlists()
            .await
            .context("failed to get user playlists")?;
        Ok(playlists.into_iter().filter(|p| p.title == name).collect())
    }

    /// Append `track_ids` in order, `PLAYLIST_BATCH_LIMIT` per call.
    /// Batches already written stay written if a later one fails.
    async fn set_playlist_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let mut added = 0usize;
        for batch in track_ids.chunks(PLAYLIST_BATCH_LIMIT) {
            self.add_playlist_tracks(playlist_id, batch)
                .await
                .with_context(|| {
                    format!(
                        "failed to add tracks to playlist {} after {} were added",
                        playlist_id, added
                    )
                })?;
            added += batch.len();
            info!("{}: added {} tracks to playlist {}", self.name(), added, playlist_id);
        }
        Ok(())
    }

    /// Replace every playlist titled `name` with a fresh one holding `track_ids`.
    async fn create_or_update_playlist(
        &self,
        name: &str,
        description: &str,
        track_ids: &[String],
    ) -> Result<Playlist> {
        let existing = self
            .find_all_playlists_by_name(name)
            .await
            .context("failed to search for existing playlists")?;

        for playlist in &existing {
            info!("{}: deleting existing playlist {} ({})", self.name(), playlist.title, playlist.id);
            self.delete_playlist(&playlist.id)
                .await
                .with_context(|| format!("failed to delete playlist {}", playlist.id))?;
        }

        let playlist = self
            .create_playlist(name, description)
            .await
            .context("failed to create playlist")?;

        self.set_playlist_tracks(&playlist.id, track_ids).await?;
        Ok(playlist)
    }
}
