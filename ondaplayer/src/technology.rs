//! Playback technology selection.
//!
//! Every matching rule lives in this module so that the choice between
//! native, adaptive and embed playback has a single, auditable source.

use crate::station::{MediaKind, StationDescriptor, StationId};

/// URL fragments that identify a source the adaptive engine must handle.
///
/// Manifest extensions first, then the relay paths the backend exposes for
/// broadcasters that need a same-origin hop.
pub const ADAPTIVE_STREAM_PATTERNS: &[&str] = &[
    ".m3u8",
    "/relay?url=",
    "/proxy-stream",
    "/repretel-stream",
    "/repretel-c6",
];

/// MIME type announced to the adaptive engine and probed on native elements.
pub const HLS_MIME_TYPE: &str = "application/x-mpegURL";
/// MIME type used to probe native HLS support (Safari, some TV browsers).
pub const NATIVE_HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Technology {
    /// Progressive media played straight by the media element.
    Native,
    /// Segmented stream driven by the adaptive-bitrate engine.
    Adaptive,
    /// Third-party iframe player.
    Embed,
}

impl Technology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Technology::Native => "native",
            Technology::Adaptive => "adaptive",
            Technology::Embed => "embed",
        }
    }
}

/// Picks the playback technology for a station.
///
/// Pure and deterministic: embed fields win, then adaptive URL patterns,
/// everything else is native.
pub fn select_technology(station: &StationDescriptor) -> Technology {
    if station.has_embed() {
        Technology::Embed
    } else if is_adaptive_source(&station.source_url) {
        Technology::Adaptive
    } else {
        Technology::Native
    }
}

/// True when `url` contains one of [`ADAPTIVE_STREAM_PATTERNS`] (case-insensitive).
pub fn is_adaptive_source(url: &str) -> bool {
    let url = url.to_ascii_lowercase();
    ADAPTIVE_STREAM_PATTERNS
        .iter()
        .any(|pattern| url.contains(pattern))
}

/// Whether a visual surface should be rendered for this station.
pub fn has_video(station: &StationDescriptor, technology: Technology) -> bool {
    match technology {
        Technology::Adaptive | Technology::Embed => true,
        Technology::Native => station.media_kind == MediaKind::Video,
    }
}

/// Rewrites `original` into the same-origin relay form `<relay_path>?url=<original>`.
pub fn relay_url(relay_path: &str, original: &str) -> String {
    format!("{}?url={}", relay_path, urlencoding::encode(original))
}

/// Source URL the session hands to the media primitive.
pub fn effective_source_url(station: &StationDescriptor, relay_path: &str) -> String {
    if station.use_relay && !station.source_url.is_empty() {
        relay_url(relay_path, &station.source_url)
    } else {
        station.source_url.clone()
    }
}

/// Identity of the rendering surface.
///
/// A host keys its media node on this value: a technology change forces a
/// fresh node while recomputing the same station is a no-op.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    pub station_id: StationId,
    pub technology: Technology,
}

impl SurfaceKey {
    pub fn for_station(station: &StationDescriptor) -> Self {
        Self {
            station_id: station.id.clone(),
            technology: select_technology(station),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://x/live.m3u8", Technology::Adaptive)]
    #[case("https://x/LIVE.M3U8?token=1", Technology::Adaptive)]
    #[case("/proxy-stream?url=https%3A%2F%2Fa%2Fb", Technology::Adaptive)]
    #[case("/repretel-c6/index.m3u8", Technology::Adaptive)]
    #[case("/repretel-stream/ch4", Technology::Adaptive)]
    #[case("https://x/stream.mp3", Technology::Native)]
    #[case("https://x/radio.aac", Technology::Native)]
    #[case("", Technology::Native)]
    fn test_source_url_decides_without_embed(#[case] url: &str, #[case] expected: Technology) {
        let station = StationDescriptor::new("s", "S", url);
        assert_eq!(select_technology(&station), expected);
    }

    #[rstest]
    #[case("https://x/live.m3u8")]
    #[case("https://x/stream.mp3")]
    #[case("")]
    fn test_embed_fields_always_win(#[case] url: &str) {
        let with_url = StationDescriptor::new("s", "S", url)
            .with_embed_url("https://www.youtube.com/embed/abc")
            .with_relay(true);
        assert_eq!(select_technology(&with_url), Technology::Embed);

        let with_code = StationDescriptor::new("s", "S", url).with_embed_channel_code("tnt");
        assert_eq!(select_technology(&with_code), Technology::Embed);
    }

    #[test]
    fn test_relay_url_embeds_original_as_query() {
        assert_eq!(
            relay_url("/relay", "https://cdn.example/a b/live.m3u8?x=1"),
            "/relay?url=https%3A%2F%2Fcdn.example%2Fa%20b%2Flive.m3u8%3Fx%3D1"
        );

        let station = StationDescriptor::new("s", "S", "https://x/live.m3u8").with_relay(true);
        assert_eq!(
            effective_source_url(&station, "/relay"),
            "/relay?url=https%3A%2F%2Fx%2Flive.m3u8"
        );
    }

    #[test]
    fn test_has_video_follows_technology_and_hint() {
        let audio = StationDescriptor::new("a", "A", "https://x/a.mp3");
        let video = audio.clone().with_media_kind(MediaKind::Video);
        assert!(!has_video(&audio, Technology::Native));
        assert!(has_video(&video, Technology::Native));
        assert!(has_video(&audio, Technology::Adaptive));
    }

    #[test]
    fn test_surface_key_is_stable_across_recomputes() {
        let station = StationDescriptor::new("s1", "S", "https://x/live.m3u8");
        assert_eq!(SurfaceKey::for_station(&station), SurfaceKey::for_station(&station));
        assert_eq!(SurfaceKey::for_station(&station).technology, Technology::Adaptive);
    }
}
