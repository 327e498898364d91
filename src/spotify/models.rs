//! Wire shapes of the Spotify Web API and the playback snapshot derived from them.

use serde::{Deserialize, Serialize};

/// Token endpoint reply for both the code grant and the refresh grant.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub expires_in: i64,
    /// only present on the code grant (and sometimes on refresh)
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Token endpoint error body, e.g. `{"error":"invalid_grant"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// `GET /me`
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Track,
    Episode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub artists: Vec<String>,
    /// album art for tracks, show/episode art for episodes
    pub images: Vec<Image>,
}

impl PlaybackItem {
    /// Tallest image, first one wins on a tie. Missing heights count as 0.
    pub fn largest_image(&self) -> Option<&Image> {
        let mut best: Option<&Image> = None;
        for image in &self.images {
            let h = image.height.unwrap_or(0);
            if best.is_none_or(|b| h > b.height.unwrap_or(0)) {
                best = Some(image);
            }
        }
        best
    }

    pub fn artist_names(&self) -> String {
        self.artists.join(", ")
    }
}

/// One poll worth of playback state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub is_playing: bool,
    pub item: Option<PlaybackItem>,
    pub device_id: Option<String>,
}

impl PlaybackSnapshot {
    /// What a 204 from the currently-playing endpoint means.
    pub fn nothing() -> Self {
        Self { is_playing: false, item: None, device_id: None }
    }
}

// ---- raw currently-playing body ----

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentlyPlaying {
    #[serde(default)]
    is_playing: bool,
    item: Option<RawItem>,
    device: Option<RawDevice>,
}

#[derive(Debug, Deserialize)]
struct RawDevice {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: Option<String>,
    uri: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    artists: Vec<RawArtist>,
    album: Option<RawAlbum>,
    #[serde(default)]
    images: Vec<Image>,
    show: Option<RawShow>,
}

#[derive(Debug, Deserialize)]
struct RawArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawAlbum {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
struct RawShow {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
}

impl From<CurrentlyPlaying> for PlaybackSnapshot {
    fn from(raw: CurrentlyPlaying) -> Self {
        PlaybackSnapshot {
            is_playing: raw.is_playing,
            item: raw.item.and_then(RawItem::into_item),
            device_id: raw.device.and_then(|d| d.id),
        }
    }
}

impl RawItem {
    fn into_item(self) -> Option<PlaybackItem> {
        // local files have no id, the uri is still unique
        let id = self.id.or(self.uri)?;
        let (kind, artists, images) = if self.kind == "episode" {
            let mut images = self.images;
            let mut artists = Vec::new();
            if let Some(show) = self.show {
                if images.is_empty() {
                    images = show.images;
                }
                artists.push(show.name);
            }
            (ItemKind::Episode, artists, images)
        } else {
            let images = self.album.map(|a| a.images).unwrap_or_default();
            let artists = self.artists.into_iter().map(|a| a.name).collect();
            (ItemKind::Track, artists, images)
        };
        Some(PlaybackItem { id, name: self.name, kind, artists, images })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(url: &str, height: Option<u32>) -> Image {
        Image { url: url.into(), height, width: height }
    }

    fn item_with(images: Vec<Image>) -> PlaybackItem {
        PlaybackItem {
            id: "x".into(),
            name: "x".into(),
            kind: ItemKind::Track,
            artists: vec![],
            images,
        }
    }

    #[test]
    fn test_largest_image() {
        let item = item_with(vec![
            image("a", Some(64)),
            image("b", Some(300)),
            image("c", Some(150)),
        ]);
        assert_eq!(item.largest_image().unwrap().url, "b");
    }

    #[test]
    fn test_largest_image_tie_takes_first() {
        let item = item_with(vec![
            image("a", Some(300)),
            image("b", Some(300)),
            image("c", None),
        ]);
        assert_eq!(item.largest_image().unwrap().url, "a");
        assert!(item_with(vec![]).largest_image().is_none());
    }

    #[test]
    fn test_track_body() {
        let body = r#"{
            "is_playing": true,
            "device": {"id": "dev1"},
            "item": {
                "id": "track1", "name": "Song", "type": "track",
                "artists": [{"name": "A"}, {"name": "B"}],
                "album": {"images": [{"url": "u640", "height": 640, "width": 640}]}
            }
        }"#;
        let raw: CurrentlyPlaying = serde_json::from_str(body).unwrap();
        let snap = PlaybackSnapshot::from(raw);
        assert!(snap.is_playing);
        assert_eq!(snap.device_id.as_deref(), Some("dev1"));
        let item = snap.item.unwrap();
        assert_eq!(item.kind, ItemKind::Track);
        assert_eq!(item.artist_names(), "A, B");
        assert_eq!(item.images[0].url, "u640");
    }

    #[test]
    fn test_episode_body_uses_item_images() {
        let body = r#"{
            "is_playing": false,
            "item": {
                "id": "ep1", "name": "Episode", "type": "episode",
                "images": [{"url": "ep", "height": 300, "width": 300}],
                "show": {"name": "Show", "images": [{"url": "show", "height": 640, "width": 640}]}
            }
        }"#;
        let snap = PlaybackSnapshot::from(serde_json::from_str::<CurrentlyPlaying>(body).unwrap());
        let item = snap.item.unwrap();
        assert_eq!(item.kind, ItemKind::Episode);
        assert_eq!(item.images.len(), 1);
        assert_eq!(item.images[0].url, "ep");
        assert_eq!(item.artists, vec!["Show".to_string()]);
    }

    #[test]
    fn test_null_item() {
        let snap = PlaybackSnapshot::from(
            serde_json::from_str::<CurrentlyPlaying>(r#"{"is_playing": true, "item": null}"#).unwrap(),
        );
        assert!(snap.is_playing);
        assert!(snap.item.is_none());
    }
}
