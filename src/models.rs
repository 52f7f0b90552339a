use serde::{Deserialize, Serialize};

/// A favorite artist as listed by the user's collection: the id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistId {
    pub id: String,
}

impl ArtistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl Artist {
    /// Stand-in used when the artist detail lookup fails.
    pub fn stub(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub number_of_tracks: Option<u32>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// ISO-8601 duration as served by TIDAL, e.g. "PT3M12S".
    pub duration: Option<String>,
    pub album_id: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
}

impl Track {
    pub fn first_artist_name(&self) -> &str {
        self.artists.first().map(|a| a.name.as_str()).unwrap_or("")
    }
}

/// Playlist with a single canonical id and title. Built from the raw
/// vendor resource via `From<PlaylistResource>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: String,
    pub number_of_tracks: Option<u32>,
}

/// Playlist as TIDAL returns it. Older shapes carry `uuid` instead of `id`
/// and `title` instead of `name`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub attributes: PlaylistAttributes,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistAttributes {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub number_of_items: Option<u32>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

impl From<PlaylistResource> for Playlist {
    fn from(raw: PlaylistResource) -> Self {
        let attrs = raw.attributes;
        Playlist {
            id: non_empty(raw.id).or_else(|| non_empty(raw.uuid)).unwrap_or_default(),
            title: non_empty(attrs.title)
                .or_else(|| non_empty(attrs.name))
                .unwrap_or_default(),
            description: attrs.description.unwrap_or_default(),
            number_of_tracks: attrs.number_of_items,
        }
    }
}
