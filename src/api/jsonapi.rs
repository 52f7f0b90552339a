//! Typed pieces of the JSON:API envelope TIDAL wraps every response in.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct Document<T> {
    pub data: T,
    #[serde(default)]
    pub included: Vec<Resource<serde_json::Value>>,
    #[serde(default)]
    pub links: Links,
}

impl<T> Document<T> {
    /// Included resources of the given type with their attributes decoded as `A`.
    /// Entries whose attributes do not decode are skipped.
    pub fn included_of<A>(&self, kind: &str) -> Vec<Resource<A>>
    where
        A: DeserializeOwned,
    {
        self.included
            .iter()
            .filter(|r| r.kind == kind)
            .filter_map(|r| {
                let attributes = serde_json::from_value(r.attributes.clone()).ok()?;
                Some(Resource {
                    id: r.id.clone(),
                    kind: r.kind.clone(),
                    attributes,
                })
            })
            .collect()
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.links
            .meta
            .next_cursor
            .as_deref()
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resource<A> {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: A,
}

/// Relationship linkage `{ "type": ..., "id": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub meta: LinksMeta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinksMeta {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameAttributes {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumAttributes {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub number_of_items: Option<u32>,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TrackAttributes {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: Option<String>,
}

/// Error body. JSON:API servers send `errors[]`; older endpoints send a flat
/// `status`/`message` pair.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn summary(&self) -> Option<String> {
        let from_errors: Vec<String> = self
            .errors
            .iter()
            .filter_map(|e| e.detail.clone().or_else(|| e.code.clone()))
            .collect();
        if !from_errors.is_empty() {
            return Some(from_errors.join("; "));
        }
        self.message.clone().filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_cursor_ends_paging() {
        let doc: Document<Vec<Identifier>> = serde_json::from_value(json!({
            "data": [],
            "links": { "meta": { "nextCursor": "" } }
        }))
        .unwrap();
        assert_eq!(doc.next_cursor(), None);

        let doc: Document<Vec<Identifier>> =
            serde_json::from_value(json!({ "data": [] })).unwrap();
        assert_eq!(doc.next_cursor(), None);
    }

    #[test]
    fn included_filters_by_type() {
        let doc: Document<serde_json::Value> = serde_json::from_value(json!({
            "data": null,
            "included": [
                { "id": "1", "type": "tracks", "attributes": { "title": "a" } },
                { "id": "2", "type": "videos", "attributes": { "title": "b" } }
            ]
        }))
        .unwrap();
        let tracks = doc.included_of::<TrackAttributes>("tracks");
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].attributes.title, "a");
    }

    #[test]
    fn error_summary_prefers_details() {
        let body: ErrorBody = serde_json::from_value(json!({
            "errors": [ { "code": "X", "detail": "first" }, { "code": "Y" } ]
        }))
        .unwrap();
        assert_eq!(body.summary().as_deref(), Some("first; Y"));

        let flat: ErrorBody = serde_json::from_value(json!({ "message": "nope" })).unwrap();
        assert_eq!(flat.summary().as_deref(), Some("nope"));
    }
}
