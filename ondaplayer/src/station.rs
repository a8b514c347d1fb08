//! Station descriptors as handed over by the station directory.
//!
//! The player only ever reads a [`StationDescriptor`]; corrections (such as a
//! resolved embed title) flow back through [`StationDirectory::update_station`].

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(pub String);

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(value: &str) -> Self {
        StationId(value.to_string())
    }
}

/// Author's hint about whether a station carries a picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Audio,
    Video,
}

/// Station as delivered by the directory (JSON or YAML).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StationDescriptor {
    /// Sole key for "did the station change" decisions.
    pub id: StationId,
    /// Display name, also used to detect placeholder embed titles.
    pub name: String,
    /// Primary media locator. May be empty for embed-only stations.
    #[serde(default)]
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    /// Broadcaster channel code resolved by the directory into an embed page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_channel_code: Option<String>,
    #[serde(default)]
    pub media_kind: MediaKind,
    /// Source must be fetched through the same-origin relay.
    #[serde(default)]
    pub use_relay: bool,
}

impl StationDescriptor {
    pub fn new(id: &str, name: &str, source_url: &str) -> Self {
        Self {
            id: StationId::from(id),
            name: name.to_string(),
            source_url: source_url.to_string(),
            embed_url: None,
            embed_channel_code: None,
            media_kind: MediaKind::Audio,
            use_relay: false,
        }
    }

    pub fn with_media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = kind;
        self
    }

    pub fn with_embed_url(mut self, url: &str) -> Self {
        self.embed_url = Some(url.to_string());
        self
    }

    pub fn with_embed_channel_code(mut self, code: &str) -> Self {
        self.embed_channel_code = Some(code.to_string());
        self
    }

    pub fn with_relay(mut self, use_relay: bool) -> Self {
        self.use_relay = use_relay;
        self
    }

    /// True when either embed field carries a non-blank value.
    pub fn has_embed(&self) -> bool {
        let present = |field: &Option<String>| {
            field
                .as_deref()
                .map(|value| !value.trim().is_empty())
                .unwrap_or(false)
        };
        present(&self.embed_url) || present(&self.embed_channel_code)
    }
}

/// Write-back channel into the station directory.
///
/// The directory owns persistence of the update; the player never mutates
/// the descriptor it was given.
pub trait StationDirectory {
    fn update_station(&self, station: StationDescriptor);
}

/// Directory that drops every update. Used when the host does not care
/// about title synchronisation.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedDirectory;

impl StationDirectory for DetachedDirectory {
    fn update_station(&self, _station: StationDescriptor) {}
}
