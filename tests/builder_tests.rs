use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::Arc;
use tidal_playlist::api::mock::{Call, MockProvider};
use tidal_playlist::builder::{self, filter_artists, select_random_items, PlaylistBuilder};
use tidal_playlist::config::FiltersConfig;
use tidal_playlist::models::{ArtistId, Track};

fn ids(list: &[&str]) -> Vec<ArtistId> {
    list.iter().map(|s| ArtistId::new(*s)).collect()
}

fn filters(whitelist: &[&str], blacklist: &[&str]) -> FiltersConfig {
    FiltersConfig {
        whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
        blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
    }
}

fn three_artists() -> MockProvider {
    MockProvider::new()
        .with_artist("A", "Artist A", &[("a1", &["ta1", "ta2"]), ("a2", &["ta3"])])
        .with_artist("B", "Artist B", &[("b1", &["tb1"])])
        .with_artist("C", "Artist C", &[("c1", &["tc1", "tc2", "tc3"])])
}

#[test]
fn filter_without_lists_is_identity() {
    let input = ids(&["x", "Y", "z"]);
    assert_eq!(filter_artists(&input, &filters(&[], &[])), input);
}

#[test]
fn whitelist_wins_and_ignores_case() {
    let input = ids(&["abc", "DEF", "ghi"]);
    let out = filter_artists(&input, &filters(&["def", "ABC", "missing"], &["abc"]));
    assert_eq!(out, ids(&["abc", "DEF"]));
}

#[test]
fn blacklist_removes_matches_and_keeps_order() {
    let input = ids(&["1", "Two", "3", "two"]);
    let out = filter_artists(&input, &filters(&[], &["TWO"]));
    assert_eq!(out, ids(&["1", "3"]));
}

#[test]
fn sampling_returns_exact_count_from_source() {
    let source = vec!["a", "b", "c"];
    let mut rng = StdRng::seed_from_u64(7);
    let picked = select_random_items(&mut rng, 10, &source);
    assert_eq!(picked.len(), 10);
    assert!(picked.iter().all(|p| source.contains(p)));

    // more draws than items means repeats
    let distinct: HashSet<_> = picked.iter().collect();
    assert!(distinct.len() < picked.len());
}

#[test]
fn sampling_with_replacement_repeats_across_seeds() {
    let source: Vec<u32> = (0..20).collect();
    let with_repeat = (0..50u64)
        .filter(|seed| {
            let mut rng = StdRng::seed_from_u64(*seed);
            let picked = select_random_items(&mut rng, 10, &source);
            picked.iter().collect::<HashSet<_>>().len() < picked.len()
        })
        .count();
    // birthday bound: ~90% of runs draw a duplicate
    assert!(with_repeat > 25, "only {} of 50 seeds repeated", with_repeat);
}

#[test]
fn sampling_empty_source_or_zero_count() {
    let mut rng = StdRng::seed_from_u64(1);
    let empty: Vec<u8> = Vec::new();
    assert!(select_random_items(&mut rng, 5, &empty).is_empty());
    assert!(select_random_items(&mut rng, 0, &[1, 2]).is_empty());
}

#[tokio::test]
async fn collect_keeps_draw_order_and_fetches_albums_once_per_artist() {
    let mock = Arc::new(
        MockProvider::new()
            .with_artist("a", "Alpha", &[("alb-a", &["track-a"])])
            .with_artist("b", "Beta", &[("alb-b", &["track-b"])]),
    );
    let mut b = PlaylistBuilder::with_seed(mock.clone(), FiltersConfig::default(), 3, 3);

    let slots = b.collect_tracks(&ids(&["b", "a", "b"])).await;
    let got: Vec<Option<&str>> = slots.iter().map(|s| s.as_ref().map(|t| t.id.as_str())).collect();
    assert_eq!(got, vec![Some("track-b"), Some("track-a"), Some("track-b")]);

    let album_calls = mock
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::GetArtistAlbums(_)))
        .count();
    assert_eq!(album_calls, 2);
}

#[tokio::test]
async fn collect_attaches_artist_when_track_has_none() {
    let mock = Arc::new(MockProvider::new().with_artist("a", "Alpha", &[("x", &["t1"])]));
    let mut b = PlaylistBuilder::with_seed(mock, FiltersConfig::default(), 1, 0);
    let slots = b.collect_tracks(&ids(&["a"])).await;
    let track = slots[0].as_ref().expect("track");
    assert_eq!(track.first_artist_name(), "Alpha");
}

#[tokio::test]
async fn collect_degrades_failed_items_to_empty_slots() {
    let mock = Arc::new(
        MockProvider::new()
            .with_artist("ok", "Fine", &[("alb-ok", &["t-ok"])])
            .with_artist("noalb", "No Albums", &[("alb-x", &["t-x"])])
            .with_artist("notracks", "No Tracks", &[("alb-bad", &["t-bad"])])
            .with_artist("nodetail", "Hidden", &[("alb-h", &["t-h"])])
            .fail_albums("noalb")
            .fail_tracks("alb-bad")
            .fail_artist_detail("nodetail"),
    );
    let mut b = PlaylistBuilder::with_seed(mock.clone(), FiltersConfig::default(), 6, 11);

    let input = ids(&["noalb", "ok", "notracks", "nodetail", "noalb", "ok"]);
    let slots = b.collect_tracks(&input).await;
    assert_eq!(slots.len(), input.len());

    assert!(slots[0].is_none());
    assert_eq!(slots[1].as_ref().map(|t| t.id.as_str()), Some("t-ok"));
    assert!(slots[2].is_none());
    // a failed detail lookup still yields a track, tagged with a stub artist
    let hidden = slots[3].as_ref().expect("track despite missing detail");
    assert_eq!(hidden.artists[0].id, "nodetail");
    assert_eq!(hidden.artists[0].name, "");
    // the cached failure covers the repeated entry without refetching
    assert!(slots[4].is_none());
    assert!(slots[5].is_some());

    let noalb_fetches = mock
        .calls()
        .into_iter()
        .filter(|c| *c == Call::GetArtistAlbums("noalb".into()))
        .count();
    assert_eq!(noalb_fetches, 1);

    let compacted: Vec<Track> = slots.into_iter().flatten().collect();
    assert!(compacted.len() <= input.len());
}

#[tokio::test]
async fn blacklist_scenario_dry_run_writes_nothing() {
    let mock = Arc::new(three_artists());
    let mut b = PlaylistBuilder::with_seed(mock.clone(), filters(&[], &["b"]), 2, 42);

    let report = b.build_playlist("Mix", true).await.expect("dry run");
    assert_eq!(report.favorite_count, 3);
    assert_eq!(report.filtered_count, 2);
    assert!(!report.tracks.is_empty() && report.tracks.len() <= 2);
    assert!(report.playlist.is_none());
    for t in &report.tracks {
        assert!(t.id.starts_with("ta") || t.id.starts_with("tc"), "unexpected {}", t.id);
    }

    assert!(mock.writes().is_empty());
    assert!(!mock.calls().contains(&Call::GetUserPlaylists));
}

#[tokio::test]
async fn empty_filter_result_is_an_error() {
    let mock = Arc::new(three_artists());
    let mut b = PlaylistBuilder::with_seed(mock.clone(), filters(&["nobody"], &[]), 5, 1);
    let err = b.build_playlist("Mix", false).await.unwrap_err();
    assert!(err.to_string().contains("no artists remaining after filtering"));
    assert!(mock.writes().is_empty());
}

#[tokio::test]
async fn no_collected_tracks_is_an_error() {
    let mock = Arc::new(
        MockProvider::new()
            .with_artist("a", "Alpha", &[("x", &["t"])])
            .fail_albums("a"),
    );
    let mut b = PlaylistBuilder::with_seed(mock.clone(), FiltersConfig::default(), 4, 1);
    let err = b.build_playlist("Mix", false).await.unwrap_err();
    assert!(err.to_string().contains("no tracks collected from artists"));
    assert!(mock.writes().is_empty());
}

#[tokio::test]
async fn build_writes_playlist_with_collected_tracks() {
    let mock = Arc::new(three_artists().with_playlist("old-1", "Mix"));
    let mut b = PlaylistBuilder::with_seed(mock.clone(), FiltersConfig::default(), 5, 9);

    let report = b.build_playlist("Mix", false).await.expect("build");
    let playlist = report.playlist.expect("written playlist");
    assert_eq!(playlist.title, "Mix");
    assert_eq!(playlist.description, builder::PLAYLIST_DESCRIPTION);

    let writes = mock.writes();
    assert_eq!(writes[0], Call::DeletePlaylist("old-1".into()));
    assert_eq!(writes[1], Call::CreatePlaylist("Mix".into()));
    let written: Vec<String> = writes[2..]
        .iter()
        .flat_map(|c| match c {
            Call::AddPlaylistTracks { track_ids, .. } => track_ids.clone(),
            _ => Vec::new(),
        })
        .collect();
    let expected: Vec<String> = report.tracks.iter().map(|t| t.id.clone()).collect();
    assert_eq!(written, expected);
}

#[test]
fn preview_truncates_after_ten() {
    let tracks: Vec<Track> = (1..=12)
        .map(|i| Track {
            id: i.to_string(),
            title: format!("Song {}", i),
            duration: None,
            album_id: None,
            artists: vec![tidal_playlist::models::Artist {
                id: "a".into(),
                name: "Alpha".into(),
            }],
        })
        .collect();

    let lines = builder::preview_lines(&tracks);
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[0], "1. Alpha - Song 1");
    assert_eq!(lines[9], "10. Alpha - Song 10");
    assert_eq!(lines[10], "...");

    assert_eq!(builder::preview_lines(&tracks[..10]).len(), 10);
}
