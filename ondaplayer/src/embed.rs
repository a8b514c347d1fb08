//! Bridge to the video platform's iframe player API.
//!
//! The platform script is injected once per page (keyed by a fixed element
//! id); every party waiting for it is released when the host reports the API
//! ready. Controllers are reused across embed stations when only the video
//! changes, which avoids a visible reload of the iframe.

use tracing::{debug, info, warn};
use url::Url;

use crate::capabilities::ListenerToken;
use crate::errors::{PlaybackError, PlayerError};
use crate::settings::EmbedSettings;
use crate::station::{StationDescriptor, StationDirectory};

/// Names the directory gives to embeds whose real title is still unknown.
pub const PLACEHOLDER_NAME_PREFIXES: &[&str] = &["Video de YouTube", "YouTube"];

/// Error codes meaning the owner disallowed playback in embedded players.
pub const EMBED_RESTRICTED_CODES: &[u16] = &[101, 150];

const PLATFORM_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];
const SHORT_LINK_HOST: &str = "youtu.be";

/// Player states, numbered like the platform API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmbedPlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl EmbedPlayerState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(EmbedPlayerState::Unstarted),
            0 => Some(EmbedPlayerState::Ended),
            1 => Some(EmbedPlayerState::Playing),
            2 => Some(EmbedPlayerState::Paused),
            3 => Some(EmbedPlayerState::Buffering),
            5 => Some(EmbedPlayerState::Cued),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbedEvent {
    StateChange(EmbedPlayerState),
    Error(u16),
}

/// Controller bound to one iframe.
pub trait EmbedController {
    fn load_video_by_id(&mut self, video_id: &str);

    /// Title from the player's video data, once known.
    fn video_title(&self) -> Option<String>;

    fn destroy(&mut self);
}

/// Page-side services needed to drive the platform API.
pub trait EmbedHost {
    /// An element with this id already exists in the document.
    fn has_script(&self, element_id: &str) -> bool;

    fn inject_script(&mut self, element_id: &str, src: &str) -> Result<(), PlayerError>;

    /// The platform's player constructor is available.
    fn is_api_ready(&self) -> bool;

    /// Builds a controller for the iframe showing `iframe_url`. Its
    /// `onStateChange`/`onError` callbacks must be forwarded tagged with `token`.
    fn create_controller(
        &mut self,
        iframe_url: &str,
        token: ListenerToken,
    ) -> Result<Box<dyn EmbedController>, PlayerError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiStatus {
    Ready,
    Pending,
}

/// Loads the platform API at most once per page lifetime.
#[derive(Debug, Default)]
pub struct EmbedApiLoader {
    injected: bool,
    ready: bool,
    waiters: Vec<ListenerToken>,
}

impl EmbedApiLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures the API script is present. When not ready yet, `waiter` is
    /// queued behind any earlier waiter and released by [`Self::on_ready`].
    pub fn request(
        &mut self,
        host: &mut dyn EmbedHost,
        settings: &EmbedSettings,
        waiter: ListenerToken,
    ) -> Result<ApiStatus, PlayerError> {
        if self.ready || host.is_api_ready() {
            self.ready = true;
            return Ok(ApiStatus::Ready);
        }
        if !self.injected && !host.has_script(&settings.api_element_id) {
            info!(src = %settings.api_script_url, "Injecting embed API script");
            host.inject_script(&settings.api_element_id, &settings.api_script_url)?;
        }
        self.injected = true;
        if !self.waiters.contains(&waiter) {
            self.waiters.push(waiter);
        }
        Ok(ApiStatus::Pending)
    }

    /// Marks the API ready and hands back every queued waiter, oldest first.
    pub fn on_ready(&mut self) -> Vec<ListenerToken> {
        self.ready = true;
        std::mem::take(&mut self.waiters)
    }
}

/// Video id from an embed, watch or short-link URL of the supported platform.
pub fn video_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let id = if host == SHORT_LINK_HOST {
        segments.next().map(str::to_string)
    } else if PLATFORM_HOSTS.contains(&host.as_str()) {
        match segments.next() {
            Some("embed") | Some("live") | Some("shorts") => segments.next().map(str::to_string),
            Some("watch") => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            _ => None,
        }
    } else {
        None
    };
    id.filter(|id| !id.is_empty())
}

/// Appends the API, autoplay and origin parameters the controller needs.
/// Parameters already present are left alone.
pub fn controller_url(embed_url: &str, origin: &str) -> Result<String, PlayerError> {
    let mut url = Url::parse(embed_url)
        .map_err(|err| PlayerError::embed_controller_build(&format!("{embed_url}: {err}")))?;
    let existing: Vec<String> = url.query_pairs().map(|(key, _)| key.into_owned()).collect();
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in [("enablejsapi", "1"), ("autoplay", "1"), ("origin", origin)] {
            if !existing.iter().any(|k| k == key) {
                pairs.append_pair(key, value);
            }
        }
    }
    Ok(url.to_string())
}

/// Whether `name` is a stand-in the directory used until the real title is known.
pub fn is_placeholder_name(name: &str, video_id: &str) -> bool {
    let name = name.trim();
    name.is_empty()
        || (!video_id.is_empty() && name.contains(video_id))
        || PLACEHOLDER_NAME_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

pub fn map_embed_error(code: u16) -> PlaybackError {
    if EMBED_RESTRICTED_CODES.contains(&code) {
        PlaybackError::EmbedRestricted
    } else {
        PlaybackError::EmbedGeneric
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmbedBinding {
    /// Plain iframe: not a platform video, nothing to control.
    Passive,
    /// New controller built.
    Created,
    /// Existing controller navigated to a new video.
    Navigated,
    /// Existing controller already shows this video.
    Unchanged,
    /// Waiting for the platform API.
    AwaitingApi,
}

#[derive(Default)]
pub struct EmbedBridge {
    controller: Option<Box<dyn EmbedController>>,
    controller_token: Option<ListenerToken>,
    video_id: Option<String>,
    station: Option<StationDescriptor>,
    pending: Option<ListenerToken>,
    title_synced: bool,
    controllers_built: usize,
}

impl std::fmt::Debug for EmbedBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbedBridge")
            .field("has_controller", &self.controller.is_some())
            .field("video_id", &self.video_id)
            .field("pending", &self.pending)
            .field("controllers_built", &self.controllers_built)
            .finish()
    }
}

impl EmbedBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of controllers constructed over the bridge lifetime.
    pub fn controllers_built(&self) -> usize {
        self.controllers_built
    }

    pub fn accepts(&self, token: ListenerToken) -> bool {
        self.controller_token == Some(token)
    }

    /// Binds the bridge to an embed station.
    pub fn bind(
        &mut self,
        station: &StationDescriptor,
        token: ListenerToken,
        host: &mut dyn EmbedHost,
        loader: &mut EmbedApiLoader,
        settings: &EmbedSettings,
    ) -> Result<EmbedBinding, PlayerError> {
        self.title_synced = false;
        self.pending = None;
        let Some(video_id) = station.embed_url.as_deref().and_then(video_id_from_url) else {
            debug!(station_id = %station.id, "Embed is not a platform video, no controller");
            self.teardown();
            self.station = Some(station.clone());
            return Ok(EmbedBinding::Passive);
        };
        self.station = Some(station.clone());

        if let Some(controller) = self.controller.as_mut() {
            if self.video_id.as_deref() == Some(video_id.as_str()) {
                return Ok(EmbedBinding::Unchanged);
            }
            info!(station_id = %station.id, video_id = %video_id, "Navigating embed in place");
            controller.load_video_by_id(&video_id);
            self.video_id = Some(video_id);
            return Ok(EmbedBinding::Navigated);
        }

        self.video_id = Some(video_id);
        match loader.request(host, settings, token)? {
            ApiStatus::Ready => {
                self.construct(host, settings, token)?;
                Ok(EmbedBinding::Created)
            }
            ApiStatus::Pending => {
                self.pending = Some(token);
                Ok(EmbedBinding::AwaitingApi)
            }
        }
    }

    /// Builds the controller that was waiting for the API, if `token` is
    /// still the one it waited with.
    pub fn on_api_ready(
        &mut self,
        released: &[ListenerToken],
        host: &mut dyn EmbedHost,
        settings: &EmbedSettings,
    ) -> Result<bool, PlayerError> {
        let Some(token) = self.pending else {
            return Ok(false);
        };
        if !released.contains(&token) {
            return Ok(false);
        }
        self.pending = None;
        self.construct(host, settings, token)?;
        Ok(true)
    }

    fn construct(
        &mut self,
        host: &mut dyn EmbedHost,
        settings: &EmbedSettings,
        token: ListenerToken,
    ) -> Result<(), PlayerError> {
        self.destroy_controller();
        let embed_url = self
            .station
            .as_ref()
            .and_then(|station| station.embed_url.clone())
            .ok_or_else(|| PlayerError::embed_controller_build("station has no embed url"))?;
        let iframe_url = controller_url(&embed_url, &settings.origin)?;
        let controller = host.create_controller(&iframe_url, token)?;
        self.controller = Some(controller);
        self.controller_token = Some(token);
        self.controllers_built += 1;
        info!(url = %iframe_url, "Embed controller created");
        Ok(())
    }

    /// Handles a forwarded controller event.
    ///
    /// Returns the error to surface, if any. Title corrections are pushed to
    /// `directory` and returned so the caller can broadcast them.
    pub fn handle_event(
        &mut self,
        event: &EmbedEvent,
        directory: &dyn StationDirectory,
    ) -> (Option<PlaybackError>, Option<StationDescriptor>) {
        match event {
            EmbedEvent::StateChange(EmbedPlayerState::Playing) => {
                (None, self.sync_title(directory))
            }
            EmbedEvent::StateChange(state) => {
                debug!(?state, "Embed state change");
                (None, None)
            }
            EmbedEvent::Error(code) => {
                let error = map_embed_error(*code);
                warn!(code, error = %error, "Embed player error");
                (Some(error), None)
            }
        }
    }

    fn sync_title(&mut self, directory: &dyn StationDirectory) -> Option<StationDescriptor> {
        if self.title_synced {
            return None;
        }
        let station = self.station.as_ref()?;
        let video_id = self.video_id.as_deref()?;
        if !is_placeholder_name(&station.name, video_id) {
            self.title_synced = true;
            return None;
        }
        let title = self
            .controller
            .as_ref()?
            .video_title()
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty() && *title != station.name)?;

        self.title_synced = true;
        let mut updated = station.clone();
        updated.name = title;
        info!(station_id = %updated.id, title = %updated.name, "Embed title resolved");
        directory.update_station(updated.clone());
        self.station = Some(updated.clone());
        Some(updated)
    }

    fn destroy_controller(&mut self) {
        if let Some(mut controller) = self.controller.take() {
            controller.destroy();
            debug!("Embed controller destroyed");
        }
        self.controller_token = None;
    }

    /// Drops the controller and every pending construction.
    pub fn teardown(&mut self) {
        self.destroy_controller();
        self.pending = None;
        self.video_id = None;
        self.station = None;
        self.title_synced = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_forms() {
        assert_eq!(
            video_id_from_url("https://www.youtube.com/embed/dQw4w9WgXcQ?si=x").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id_from_url("https://youtube.com/watch?v=abc123&t=4").as_deref(),
            Some("abc123")
        );
        assert_eq!(video_id_from_url("https://youtu.be/xyz").as_deref(), Some("xyz"));
        assert_eq!(video_id_from_url("https://player.example.tv/natgeo"), None);
        assert_eq!(video_id_from_url("/embed/relative"), None);
        assert_eq!(video_id_from_url("https://www.youtube.com/embed/"), None);
    }

    #[test]
    fn test_controller_url_appends_missing_params_only() {
        let url = controller_url(
            "https://www.youtube.com/embed/abc?autoplay=0",
            "https://onda.example",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://www.youtube.com/embed/abc?autoplay=0&enablejsapi=1&origin=https%3A%2F%2Fonda.example"
        );
        assert!(controller_url("not a url", "x").is_err());
    }

    #[test]
    fn test_placeholder_names() {
        assert!(is_placeholder_name("Video de YouTube", "abc"));
        assert!(is_placeholder_name("YouTube abc", "abc"));
        assert!(is_placeholder_name("shared: abc", "abc"));
        assert!(is_placeholder_name("  ", "abc"));
        assert!(!is_placeholder_name("Noticias 24h", "abc"));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(map_embed_error(150), PlaybackError::EmbedRestricted);
        assert_eq!(map_embed_error(101), PlaybackError::EmbedRestricted);
        assert_eq!(map_embed_error(100), PlaybackError::EmbedGeneric);
        assert_eq!(map_embed_error(2), PlaybackError::EmbedGeneric);
        assert_ne!(
            PlaybackError::EmbedRestricted.message(),
            PlaybackError::EmbedGeneric.message()
        );
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(EmbedPlayerState::from_code(1), Some(EmbedPlayerState::Playing));
        assert_eq!(EmbedPlayerState::from_code(-1), Some(EmbedPlayerState::Unstarted));
        assert_eq!(EmbedPlayerState::from_code(4), None);
    }
}
