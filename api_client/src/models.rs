use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_metadata: Option<MediaMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Fields not modelled above (`contributorInfo`, ...), kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<String>,
    /// `photo` / `video` blocks.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_writeable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_items_count: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_photo_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_photo_media_item_id: Option<String>,
    /// `shareInfo` and anything newer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MediaItem {
    pub fn creation_time(&self) -> Option<&str> {
        self.media_metadata
            .as_ref()
            .and_then(|m| m.creation_time.as_deref())
    }

    /// `"W × H"` when both dimensions are known.
    pub fn dimensions(&self) -> Option<String> {
        let meta = self.media_metadata.as_ref()?;
        match (meta.width.as_deref(), meta.height.as_deref()) {
            (Some(w), Some(h)) if !w.is_empty() && !h.is_empty() => Some(format!("{} × {}", w, h)),
            _ => None,
        }
    }
}

impl Album {
    pub fn items_count(&self) -> u64 {
        self.media_items_count
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or(0)
    }

    pub fn is_writeable(&self) -> bool {
        self.is_writeable.unwrap_or(false)
    }
}

/// A list response: one page of records plus the continuation cursor.
pub(crate) trait PagedResponse: serde::de::DeserializeOwned {
    type Item;

    fn into_page(self) -> (Vec<Self::Item>, Option<String>);
}

/// An empty `nextPageToken` ends the listing just like a missing one.
fn cursor(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListMediaItemsResponse {
    media_items: Option<Vec<MediaItem>>,
    next_page_token: Option<String>,
}

impl PagedResponse for ListMediaItemsResponse {
    type Item = MediaItem;

    fn into_page(self) -> (Vec<MediaItem>, Option<String>) {
        (self.media_items.unwrap_or_default(), cursor(self.next_page_token))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListAlbumsResponse {
    albums: Option<Vec<Album>>,
    next_page_token: Option<String>,
}

impl PagedResponse for ListAlbumsResponse {
    type Item = Album;

    fn into_page(self) -> (Vec<Album>, Option<String>) {
        (self.albums.unwrap_or_default(), cursor(self.next_page_token))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListSharedAlbumsResponse {
    shared_albums: Option<Vec<Album>>,
    next_page_token: Option<String>,
}

impl PagedResponse for ListSharedAlbumsResponse {
    type Item = Album;

    fn into_page(self) -> (Vec<Album>, Option<String>) {
        (self.shared_albums.unwrap_or_default(), cursor(self.next_page_token))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchMediaItemsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<&'a str>,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<&'a str>,
}

/// Google's error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct GoogleErrorResponse {
    pub error: GoogleError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_albums_response() {
        let json = r#"{
            "albums": [
                {
                    "id": "1",
                    "title": "Test Album",
                    "productUrl": "http://example.com/album/1",
                    "isWriteable": true,
                    "mediaItemsCount": "10",
                    "coverPhotoBaseUrl": "http://example.com/base.jpg",
                    "coverPhotoMediaItemId": "cover1"
                }
            ],
            "nextPageToken": "token123"
        }"#;

        let parsed: ListAlbumsResponse = serde_json::from_str(json).unwrap();
        let (albums, next) = parsed.into_page();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].id, "1");
        assert_eq!(albums[0].title.as_deref(), Some("Test Album"));
        assert_eq!(albums[0].items_count(), 10);
        assert!(albums[0].is_writeable());
        assert_eq!(next, Some("token123".to_string()));
    }

    #[test]
    fn empty_body_is_an_empty_last_page() {
        let parsed: ListAlbumsResponse = serde_json::from_str("{}").unwrap();
        let (albums, next) = parsed.into_page();
        assert!(albums.is_empty());
        assert!(next.is_none());
    }

    #[test]
    fn empty_cursor_means_last_page() {
        let parsed: ListSharedAlbumsResponse =
            serde_json::from_str(r#"{"sharedAlbums": [{"id": "s"}], "nextPageToken": ""}"#).unwrap();
        let (albums, next) = parsed.into_page();
        assert_eq!(albums.len(), 1);
        assert!(next.is_none());
    }

    #[test]
    fn unknown_fields_survive_a_round_trip_to_json() {
        let json = r#"{
            "id": "m1",
            "filename": "a.jpg",
            "mediaMetadata": {
                "creationTime": "2023-01-01T00:00:00Z",
                "width": "4000",
                "height": "3000",
                "photo": {"cameraMake": "Pixel", "focalLength": 4.4}
            },
            "contributorInfo": {"displayName": "Ann"}
        }"#;
        let item: MediaItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.dimensions().as_deref(), Some("4000 × 3000"));
        assert_eq!(item.creation_time(), Some("2023-01-01T00:00:00Z"));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["contributorInfo"]["displayName"], "Ann");
        assert_eq!(value["mediaMetadata"]["photo"]["cameraMake"], "Pixel");
        assert!(value.get("description").is_none());
    }

    #[test]
    fn missing_dimension_yields_none() {
        let item: MediaItem =
            serde_json::from_str(r#"{"id": "v", "mediaMetadata": {"width": "10"}}"#).unwrap();
        assert!(item.dimensions().is_none());
    }

    #[test]
    fn album_without_count_defaults_to_zero() {
        let album: Album = serde_json::from_str(r#"{"id": "a"}"#).unwrap();
        assert_eq!(album.items_count(), 0);
        assert!(!album.is_writeable());
    }
}
