//! Row formatting for the media item and album tables.

use api_client::{Album, MediaItem};
use serde::Serialize;

pub const MEDIA_ITEM_COLUMNS: [&str; 5] = ["ID", "Filename", "MIME Type", "Created", "Dimensions"];
pub const ALBUM_COLUMNS: [&str; 4] = ["ID", "Title", "Items", "Writeable"];

pub fn media_item_row(item: &MediaItem) -> [String; 5] {
    [
        item.id.clone(),
        item.filename.clone().unwrap_or_default(),
        item.mime_type.clone().unwrap_or_default(),
        item.creation_time().unwrap_or_default().to_string(),
        item.dimensions().unwrap_or_default(),
    ]
}

pub fn album_row(album: &Album) -> [String; 4] {
    [
        album.id.clone(),
        album.title.clone().unwrap_or_default(),
        album.items_count().to_string(),
        if album.is_writeable() { "Yes" } else { "No" }.to_string(),
    ]
}

pub fn media_items_label(count: usize) -> String {
    format!("{} media items", count)
}

pub fn albums_label(count: usize) -> String {
    format!("{} albums", count)
}

pub fn shared_albums_label(count: usize) -> String {
    format!("{} shared albums", count)
}

/// Header line plus the pretty-printed record, as shown in the detail pane.
pub fn details_text<T: Serialize>(kind: &str, record: &T) -> String {
    match serde_json::to_string_pretty(record) {
        Ok(json) => format!("{} Details:\n\n{}", kind, json),
        Err(e) => {
            tracing::error!("Failed to format details: {}", e);
            format!("Error displaying {} details:\n{}", kind, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn media(value: serde_json::Value) -> MediaItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn media_row_fills_known_columns() {
        let item = media(json!({
            "id": "m1",
            "filename": "IMG_1.jpg",
            "mimeType": "image/jpeg",
            "mediaMetadata": {"creationTime": "2024-05-01T10:00:00Z", "width": "640", "height": "480"}
        }));
        assert_eq!(
            media_item_row(&item),
            [
                "m1".to_string(),
                "IMG_1.jpg".into(),
                "image/jpeg".into(),
                "2024-05-01T10:00:00Z".into(),
                "640 × 480".into()
            ]
        );
    }

    #[test]
    fn media_row_leaves_missing_fields_blank() {
        let row = media_item_row(&media(json!({"id": "bare"})));
        assert_eq!(row[0], "bare");
        assert!(row[1..].iter().all(String::is_empty));
    }

    #[test]
    fn album_row_defaults() {
        let album: Album = serde_json::from_value(json!({"id": "a1"})).unwrap();
        assert_eq!(album_row(&album), ["a1".to_string(), "".into(), "0".into(), "No".into()]);

        let album: Album = serde_json::from_value(
            json!({"id": "a2", "title": "Trip", "mediaItemsCount": "12", "isWriteable": true}),
        )
        .unwrap();
        assert_eq!(album_row(&album)[2..], ["12".to_string(), "Yes".into()]);
    }

    #[test]
    fn labels() {
        assert_eq!(media_items_label(3), "3 media items");
        assert_eq!(albums_label(0), "0 albums");
        assert_eq!(shared_albums_label(1), "1 shared albums");
    }

    #[test]
    fn details_show_the_whole_record() {
        let item = media(json!({
            "id": "m1",
            "contributorInfo": {"displayName": "Ann"}
        }));
        let text = details_text("Media Item", &item);
        assert!(text.starts_with("Media Item Details:\n\n{"));
        assert!(text.contains("\"displayName\": \"Ann\""));
    }
}
