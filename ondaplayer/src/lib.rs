//! Adaptive playback session manager for the Onda radio / IPTV player.
//!
//! Given the station selected in the UI, [`Player`] picks the playback
//! technology, provisions the matching media primitive, keeps it aligned
//! with the desired play/pause/volume state, exposes the quality ladder of
//! adaptive streams and funnels every failure into one user-facing error.
//!
//! The crate performs no I/O of its own. Hosts implement the traits of
//! [`capabilities`] and [`embed`] over their real media stack, forward
//! primitive events and advance the virtual clock.

pub mod bandwidth;
pub mod capabilities;
pub mod embed;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod quality;
pub mod reconciler;
pub mod scheduler;
pub mod session;
pub mod settings;
#[cfg(feature = "sim")]
pub mod sim;
pub mod station;
pub mod technology;
pub mod watchdog;

pub use bandwidth::{BandwidthStore, ConfigBandwidthStore, MemoryBandwidthStore};
pub use capabilities::{
    AdaptiveEngine, EngineFactory, ListenerToken, MediaElement, MediaErrorCode, MediaErrorInfo,
    MediaEvent, ReadyState, Representation, TransportControl, VolumeControl,
};
pub use embed::{EmbedController, EmbedEvent, EmbedHost, EmbedPlayerState};
pub use errors::{MediaFailure, PlaybackError, PlayerError};
pub use events::{PlayerEvent, PlayerEventBus};
pub use lifecycle::PlaybackPath;
pub use quality::{AUTO_LEVEL, QualityLevel};
pub use session::Player;
pub use settings::{AdaptiveEngineConfig, AdaptiveTuning, EmbedSettings, PlayerSettings};
pub use station::{MediaKind, StationDescriptor, StationDirectory, StationId};
pub use technology::{SurfaceKey, Technology, select_technology};
