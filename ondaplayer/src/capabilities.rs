// ondaplayer/src/capabilities.rs
//! Narrow capability interfaces over the media primitives the host owns.
//!
//! Hosts implement these once per underlying library (media element, HLS
//! engine). Whatever reflection the library needs to reach its rendition
//! list stays inside that adapter.

use crate::errors::{MediaFailure, PlayerError};
use crate::settings::AdaptiveEngineConfig;

/// Media element readiness, numbered like `HTMLMediaElement.readyState`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => ReadyState::HaveNothing,
            1 => ReadyState::HaveMetadata,
            2 => ReadyState::HaveCurrentData,
            3 => ReadyState::HaveFutureData,
            _ => ReadyState::HaveEnoughData,
        }
    }

    /// At least one frame of data is available.
    pub fn has_usable_data(&self) -> bool {
        *self >= ReadyState::HaveCurrentData
    }
}

/// Identifies one attachment of session listeners to a primitive.
///
/// Hosts tag every forwarded [`MediaEvent`] with the token they were given;
/// events carrying a token the session no longer owns are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub(crate) u64);

impl ListenerToken {
    pub fn epoch(&self) -> u64 {
        self.0
    }
}

/// Error codes numbered like `MediaError.code`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    Other(u16),
}

impl MediaErrorCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => MediaErrorCode::Aborted,
            2 => MediaErrorCode::Network,
            3 => MediaErrorCode::Decode,
            4 => MediaErrorCode::SourceNotSupported,
            other => MediaErrorCode::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            MediaErrorCode::Aborted => 1,
            MediaErrorCode::Network => 2,
            MediaErrorCode::Decode => 3,
            MediaErrorCode::SourceNotSupported => 4,
            MediaErrorCode::Other(code) => *code,
        }
    }

    /// Codes after which the engine cannot be reused.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            MediaErrorCode::Network | MediaErrorCode::Decode | MediaErrorCode::SourceNotSupported
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaErrorInfo {
    pub code: MediaErrorCode,
    pub fatal: bool,
    pub message: String,
}

impl MediaErrorInfo {
    pub fn fatal(code: u16, message: &str) -> Self {
        Self {
            code: MediaErrorCode::from_code(code),
            fatal: true,
            message: message.to_string(),
        }
    }

    pub fn recoverable(code: u16, message: &str) -> Self {
        Self {
            code: MediaErrorCode::from_code(code),
            fatal: false,
            message: message.to_string(),
        }
    }
}

/// Events a host forwards from the media element or the adaptive engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    LoadedMetadata,
    LoadedData,
    Resize,
    Playing,
    Play,
    Pause,
    /// Engine-internal rendition list changed.
    RepresentationsChanged,
    /// Engine switched the active rendition.
    RenditionChanged,
    /// Engine is retrying the playlist fetch.
    Retrying,
    Error(MediaErrorInfo),
}

/// One quality variant as reported by the adaptive engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Representation {
    /// Vertical resolution, 0 when the manifest does not announce one.
    pub height: u32,
    /// Announced bandwidth in bits per second.
    pub bandwidth: u64,
}

impl Representation {
    pub fn new(height: u32, bandwidth: u64) -> Self {
        Self { height, bandwidth }
    }
}

/// Start / pause control shared by the media element and the adaptive engine.
pub trait TransportControl {
    /// Starts or resumes playback. Hosts report rejections instead of panicking.
    fn play(&mut self) -> Result<(), MediaFailure>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;
}

/// Volume control, linear scale 0.0 to 1.0.
pub trait VolumeControl {
    fn volume(&self) -> f64;

    fn set_volume(&mut self, volume: f64);
}

/// The rendering surface: a media element owned and mounted by the UI.
pub trait MediaElement: TransportControl + VolumeControl {
    fn set_source(&mut self, url: &str);

    /// Removes the source attribute so the element stops any background fetch.
    fn clear_source(&mut self);

    fn load(&mut self);

    fn ready_state(&self) -> ReadyState;

    /// Intrinsic height of the decoded picture, 0 when unknown.
    fn video_height(&self) -> u32;

    fn can_play_type(&self, mime_type: &str) -> bool;

    /// Starts forwarding play/pause/load events tagged with `token`.
    fn attach_listeners(&mut self, token: ListenerToken);

    fn detach_listeners(&mut self, token: ListenerToken);
}

/// Adaptive-bitrate engine bound to a surface.
pub trait AdaptiveEngine: TransportControl + VolumeControl {
    fn load_source(&mut self, url: &str, mime_type: &str);

    fn ready_state(&self) -> ReadyState;

    /// Renditions from the engine's rich representation API.
    fn representations(&self) -> Vec<Representation>;

    /// Variants listed in the master manifest. Used when
    /// [`AdaptiveEngine::representations`] comes back empty.
    fn master_variants(&self) -> Vec<Representation>;

    /// Height of the rendition currently being played.
    fn active_height(&self) -> Option<u32>;

    /// Restricts the engine to one representation, or re-enables all of them
    /// with `None`.
    fn enable_only(&mut self, index: Option<usize>);

    /// Engine's current bandwidth estimate in bits per second.
    fn system_bandwidth(&self) -> Option<u64>;

    /// Drops the source so no further playlist retries go out.
    fn clear_source(&mut self);

    /// Detaches every listener the engine registered.
    fn detach_listeners(&mut self);

    /// Releases the media resource. The engine is unusable afterwards.
    fn dispose(&mut self);
}

/// Builds adaptive engines for the session.
pub trait EngineFactory {
    /// Whether the host can run the adaptive engine at all.
    fn is_supported(&self) -> bool;

    /// Constructs an engine bound to `surface`. Events emitted by the engine
    /// must be forwarded tagged with `token`.
    fn create(
        &mut self,
        surface: &mut dyn MediaElement,
        token: ListenerToken,
        config: &AdaptiveEngineConfig,
    ) -> Result<Box<dyn AdaptiveEngine>, PlayerError>;
}
