//! Playlist generation: favorite artists -> filter -> sample -> collect -> upsert.
use crate::api::Provider;
use crate::config::FiltersConfig;
use crate::models::{Album, ArtistId, Playlist, Track, Artist};
use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PLAYLIST_DESCRIPTION: &str = "Generated by tidal-playlist";
/// Albums fetched per artist.
pub const ALBUM_LIMIT: usize = 100;
/// Tracks shown in the dry-run preview.
pub const PREVIEW_LEN: usize = 10;

/// Draw `count` items uniformly at random, with replacement.
pub fn select_random_items<T: Clone, R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    source: &[T],
) -> Vec<T> {
    if source.is_empty() {
        return Vec::new();
    }
    (0..count)
        .map(|_| source[rng.gen_range(0..source.len())].clone())
        .collect()
}

/// Apply the whitelist (if any), otherwise the blacklist (if any).
/// Ids compare case-insensitively; input order is kept.
pub fn filter_artists(artists: &[ArtistId], filters: &FiltersConfig) -> Vec<ArtistId> {
    fn lowered(list: &[String]) -> HashSet<String> {
        list.iter().map(|s| s.to_lowercase()).collect()
    }

    if !filters.whitelist.is_empty() {
        let allowed = lowered(&filters.whitelist);
        return artists
            .iter()
            .filter(|a| allowed.contains(&a.id.to_lowercase()))
            .cloned()
            .collect();
    }

    if !filters.blacklist.is_empty() {
        let denied = lowered(&filters.blacklist);
        return artists
            .iter()
            .filter(|a| !denied.contains(&a.id.to_lowercase()))
            .cloned()
            .collect();
    }

    artists.to_vec()
}

/// Preview lines: `N. <first artist> - <title>`, then "..." if truncated.
pub fn preview_lines(tracks: &[Track]) -> Vec<String> {
    let mut lines: Vec<String> = tracks
        .iter()
        .take(PREVIEW_LEN)
        .enumerate()
        .map(|(i, t)| format!("{}. {} - {}", i + 1, t.first_artist_name(), t.title))
        .collect();
    if tracks.len() > PREVIEW_LEN {
        lines.push("...".to_string());
    }
    lines
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub playlist_name: String,
    pub favorite_count: usize,
    pub filtered_count: usize,
    pub tracks: Vec<Track>,
    /// `None` on a dry run.
    pub playlist: Option<Playlist>,
}

pub struct PlaylistBuilder {
    provider: Arc<dyn Provider>,
    filters: FiltersConfig,
    count: usize,
    rng: StdRng,
}

impl PlaylistBuilder {
    pub fn new(provider: Arc<dyn Provider>, filters: FiltersConfig, count: usize) -> Self {
        Self {
            provider,
            filters,
            count,
            rng: StdRng::from_entropy(),
        }
    }

    /// Same as `new` with a fixed seed, for reproducible selections.
    pub fn with_seed(provider: Arc<dyn Provider>, filters: FiltersConfig, count: usize, seed: u64) -> Self {
        Self {
            provider,
            filters,
            count,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn filter_artists(&self, artists: &[ArtistId]) -> Vec<ArtistId> {
        filter_artists(artists, &self.filters)
    }

    /// One random track from one random album per sampled artist.
    ///
    /// The result has one slot per entry of `artists`, in the same order. A
    /// slot is `None` when the artist's albums or the album's tracks could
    /// not be fetched; such failures are logged and never abort.
    pub async fn collect_tracks(&mut self, artists: &[ArtistId]) -> Vec<Option<Track>> {
        let mut result: Vec<Option<Track>> = vec![None; artists.len()];

        // Visit repeats of the same artist back to back so albums are fetched once.
        let mut order: Vec<usize> = (0..artists.len()).collect();
        order.sort_by(|&a, &b| artists[a].id.cmp(&artists[b].id));

        let mut last_artist: Option<String> = None;
        let mut albums: Vec<Album> = Vec::new();

        for slot in order {
            let artist_id = &artists[slot].id;
            let artist = match self.provider.get_artist(artist_id).await {
                Ok(a) => a,
                Err(e) => {
                    warn!("failed to get details of artist {}: {:#}", artist_id, e);
                    Artist::stub(artist_id)
                }
            };

            if last_artist.as_deref() != Some(artist_id.as_str()) {
                last_artist = Some(artist_id.clone());
                println!("{} ({})", artist.name, artist_id);
                albums = match self.provider.get_artist_albums(artist_id, ALBUM_LIMIT).await {
                    Ok(a) => a,
                    Err(e) => {
                        warn!("failed to get albums for {}: {:#}", artist_id, e);
                        Vec::new()
                    }
                };
                if albums.is_empty() {
                    warn!("no albums for artist {}, skipping", artist_id);
                }
            }

            if albums.is_empty() {
                continue;
            }

            let album = &albums[self.rng.gen_range(0..albums.len())];
            let tracks = match self.provider.get_album_tracks(&album.id).await {
                Ok(t) => t,
                Err(e) => {
                    warn!("failed to get tracks of album {}: {:#}", album.id, e);
                    continue;
                }
            };
            if tracks.is_empty() {
                debug!("album {} has no tracks", album.id);
                continue;
            }

            let mut track = tracks[self.rng.gen_range(0..tracks.len())].clone();
            if track.artists.is_empty() {
                track.artists.push(artist.clone());
            }
            println!("  {} - {}", album.title, track.title);
            result[slot] = Some(track);
        }

        result
    }

    /// Run the whole pipeline. With `dry_run` nothing is written remotely.
    pub async fn build_playlist(&mut self, playlist_name: &str, dry_run: bool) -> Result<BuildReport> {
        println!("Fetching favorite artists...");
        let favorites = self
            .provider
            .get_favorite_artists()
            .await
            .context("failed to fetch favorite artists")?;
        println!("Found {} favorite artists", favorites.len());

        let filtered = self.filter_artists(&favorites);
        println!("After filtering: {} artists", filtered.len());
        if filtered.is_empty() {
            bail!("no artists remaining after filtering");
        }

        let selected = select_random_items(&mut self.rng, self.count, &filtered);
        info!("selected {} artist slots from {} artists", selected.len(), filtered.len());

        println!("\nCollecting tracks from artists...");
        let slots = self.collect_tracks(&selected).await;
        let tracks: Vec<Track> = slots.into_iter().flatten().collect();
        println!("\nCollected {} of {} tracks", tracks.len(), selected.len());
        if tracks.is_empty() {
            bail!("no tracks collected from artists");
        }

        let mut report = BuildReport {
            playlist_name: playlist_name.to_string(),
            favorite_count: favorites.len(),
            filtered_count: filtered.len(),
            tracks,
            playlist: None,
        };

        if dry_run {
            println!("\n=== DRY RUN MODE ===");
            println!(
                "Would create/update playlist '{}' with {} tracks",
                playlist_name,
                report.tracks.len()
            );
            println!("\nTracks:");
            for line in preview_lines(&report.tracks) {
                println!("  {}", line);
            }
            return Ok(report);
        }

        let track_ids: Vec<String> = report.tracks.iter().map(|t| t.id.clone()).collect();
        println!("\nCreating/updating playlist '{}'...", playlist_name);
        let playlist = self
            .provider
            .create_or_update_playlist(playlist_name, PLAYLIST_DESCRIPTION, &track_ids)
            .await
            .context("failed to create/update playlist")?;
        println!(
            "\n✓ Success! Playlist '{}' created/updated with {} tracks",
            playlist.title,
            track_ids.len()
        );
        report.playlist = Some(playlist);
        Ok(report)
    }
}
