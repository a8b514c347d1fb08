//! Simulated media primitives.
//!
//! Every simulated primitive shares its state behind an `Arc<Mutex<_>>`, so a
//! test (or the demo) keeps a clone to drive and inspect what the player
//! boxed. Construction and disposal are counted to check the single-engine
//! guarantee.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::capabilities::{
    AdaptiveEngine, EngineFactory, ListenerToken, MediaElement, ReadyState, Representation,
    TransportControl, VolumeControl,
};
use crate::embed::{EmbedController, EmbedHost};
use crate::errors::{MediaFailure, PlayerError};
use crate::settings::AdaptiveEngineConfig;
use crate::station::{StationDescriptor, StationDirectory};
use crate::technology::NATIVE_HLS_MIME_TYPE;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ----------------------------------------------------------------------
// Media element
// ----------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ElementState {
    pub paused: bool,
    pub volume: f64,
    pub source: Option<String>,
    pub loads: usize,
    pub plays: usize,
    pub pauses: usize,
    pub ready_state: ReadyState,
    pub video_height: u32,
    pub native_hls: bool,
    pub listeners: Option<ListenerToken>,
    pub reject_play: Option<MediaFailure>,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            paused: true,
            volume: 1.0,
            source: None,
            loads: 0,
            plays: 0,
            pauses: 0,
            ready_state: ReadyState::HaveNothing,
            video_height: 0,
            native_hls: false,
            listeners: None,
            reject_play: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimElement {
    state: Arc<Mutex<ElementState>>,
}

impl SimElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Element that advertises native HLS playback.
    pub fn with_native_hls(self) -> Self {
        lock(&self.state).native_hls = true;
        self
    }

    pub fn with_video_height(self, height: u32) -> Self {
        lock(&self.state).video_height = height;
        self
    }

    pub fn reject_play(&self, failure: Option<MediaFailure>) {
        lock(&self.state).reject_play = failure;
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        lock(&self.state).ready_state = ready_state;
    }

    pub fn snapshot(&self) -> ElementState {
        lock(&self.state).clone()
    }

    pub fn listeners(&self) -> Option<ListenerToken> {
        lock(&self.state).listeners
    }
}

impl TransportControl for SimElement {
    fn play(&mut self) -> Result<(), MediaFailure> {
        let mut state = lock(&self.state);
        state.plays += 1;
        if let Some(failure) = state.reject_play.clone() {
            return Err(failure);
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = lock(&self.state);
        state.pauses += 1;
        state.paused = true;
    }

    fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }
}

impl VolumeControl for SimElement {
    fn volume(&self) -> f64 {
        lock(&self.state).volume
    }

    fn set_volume(&mut self, volume: f64) {
        lock(&self.state).volume = volume;
    }
}

impl MediaElement for SimElement {
    fn set_source(&mut self, url: &str) {
        lock(&self.state).source = Some(url.to_string());
    }

    fn clear_source(&mut self) {
        lock(&self.state).source = None;
    }

    fn load(&mut self) {
        let mut state = lock(&self.state);
        state.loads += 1;
        state.ready_state = ReadyState::HaveNothing;
    }

    fn ready_state(&self) -> ReadyState {
        lock(&self.state).ready_state
    }

    fn video_height(&self) -> u32 {
        lock(&self.state).video_height
    }

    fn can_play_type(&self, mime_type: &str) -> bool {
        lock(&self.state).native_hls && mime_type.eq_ignore_ascii_case(NATIVE_HLS_MIME_TYPE)
    }

    fn attach_listeners(&mut self, token: ListenerToken) {
        lock(&self.state).listeners = Some(token);
    }

    fn detach_listeners(&mut self, token: ListenerToken) {
        let mut state = lock(&self.state);
        if state.listeners == Some(token) {
            state.listeners = None;
        }
    }
}

// ----------------------------------------------------------------------
// Adaptive engine
// ----------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct EngineState {
    pub token: Option<ListenerToken>,
    pub autoplay: bool,
    pub paused: bool,
    pub volume: f64,
    pub source: Option<String>,
    pub mime_type: Option<String>,
    pub ready_state: ReadyState,
    pub representations: Vec<Representation>,
    pub master_variants: Vec<Representation>,
    pub active_height: Option<u32>,
    /// Representation the engine is restricted to, `None` when free to adapt.
    pub enabled: Option<usize>,
    pub enable_calls: usize,
    pub system_bandwidth: Option<u64>,
    pub plays: usize,
    pub pauses: usize,
    pub listeners_attached: bool,
    pub disposed: bool,
}

#[derive(Debug, Default)]
struct FactoryState {
    supported: bool,
    fail_next_build: bool,
    created: usize,
    disposed: usize,
    configs: Vec<AdaptiveEngineConfig>,
    representations: Vec<Representation>,
    master_variants: Vec<Representation>,
    engines: Vec<SimEngineHandle>,
}

/// Factory producing [`SimEngine`]s. Clones share counters.
#[derive(Clone, Debug)]
pub struct SimEngineFactory {
    state: Arc<Mutex<FactoryState>>,
}

impl Default for SimEngineFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEngineFactory {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FactoryState {
                supported: true,
                ..Default::default()
            })),
        }
    }

    /// Factory of a host without adaptive engine support.
    pub fn unsupported() -> Self {
        let factory = Self::new();
        lock(&factory.state).supported = false;
        factory
    }

    /// Representations announced by every engine built from now on.
    pub fn with_representations(self, heights: &[u32]) -> Self {
        lock(&self.state).representations = heights
            .iter()
            .map(|height| Representation::new(*height, u64::from(*height) * 2_000))
            .collect();
        self
    }

    /// Master playlist variants, for engines without the representation API.
    pub fn with_master_variants(self, heights: &[u32]) -> Self {
        lock(&self.state).master_variants = heights
            .iter()
            .map(|height| Representation::new(*height, u64::from(*height) * 2_000))
            .collect();
        self
    }

    pub fn fail_next_build(&self) {
        lock(&self.state).fail_next_build = true;
    }

    pub fn created(&self) -> usize {
        lock(&self.state).created
    }

    pub fn disposed(&self) -> usize {
        lock(&self.state).disposed
    }

    pub fn live(&self) -> usize {
        let state = lock(&self.state);
        state.created - state.disposed
    }

    pub fn configs(&self) -> Vec<AdaptiveEngineConfig> {
        lock(&self.state).configs.clone()
    }

    pub fn last_engine(&self) -> Option<SimEngineHandle> {
        lock(&self.state).engines.last().cloned()
    }
}

impl EngineFactory for SimEngineFactory {
    fn is_supported(&self) -> bool {
        lock(&self.state).supported
    }

    fn create(
        &mut self,
        _surface: &mut dyn MediaElement,
        token: ListenerToken,
        config: &AdaptiveEngineConfig,
    ) -> Result<Box<dyn AdaptiveEngine>, PlayerError> {
        let mut factory = lock(&self.state);
        if !factory.supported {
            return Err(PlayerError::AdaptiveUnsupported);
        }
        if factory.fail_next_build {
            factory.fail_next_build = false;
            return Err(PlayerError::engine_build("simulated construction failure"));
        }

        let handle = SimEngineHandle {
            state: Arc::new(Mutex::new(EngineState {
                token: Some(token),
                autoplay: config.autoplay,
                paused: true,
                volume: config.volume,
                representations: factory.representations.clone(),
                master_variants: factory.master_variants.clone(),
                system_bandwidth: Some(config.initial_bandwidth),
                listeners_attached: true,
                ..Default::default()
            })),
        };
        factory.created += 1;
        factory.configs.push(config.clone());
        factory.engines.push(handle.clone());
        Ok(Box::new(SimEngine {
            handle,
            factory: Arc::clone(&self.state),
        }))
    }
}

/// Test-side view on one engine.
#[derive(Clone, Debug)]
pub struct SimEngineHandle {
    state: Arc<Mutex<EngineState>>,
}

impl SimEngineHandle {
    pub fn token(&self) -> Option<ListenerToken> {
        lock(&self.state).token
    }

    pub fn snapshot(&self) -> EngineState {
        lock(&self.state).clone()
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        lock(&self.state).ready_state = ready_state;
    }

    /// Simulates the ABR controller switching rendition.
    pub fn switch_to(&self, height: u32, system_bandwidth: u64) {
        let mut state = lock(&self.state);
        state.active_height = Some(height);
        state.system_bandwidth = Some(system_bandwidth);
    }

    pub fn set_representations(&self, heights: &[u32]) {
        lock(&self.state).representations = heights
            .iter()
            .map(|height| Representation::new(*height, u64::from(*height) * 2_000))
            .collect();
    }
}

pub struct SimEngine {
    handle: SimEngineHandle,
    factory: Arc<Mutex<FactoryState>>,
}

impl SimEngine {
    fn state(&self) -> MutexGuard<'_, EngineState> {
        lock(&self.handle.state)
    }
}

impl TransportControl for SimEngine {
    fn play(&mut self) -> Result<(), MediaFailure> {
        let mut state = self.state();
        state.plays += 1;
        if state.source.is_none() {
            return Err(MediaFailure::Other("no source loaded".to_string()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        let mut state = self.state();
        state.pauses += 1;
        state.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state().paused
    }
}

impl VolumeControl for SimEngine {
    fn volume(&self) -> f64 {
        self.state().volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.state().volume = volume;
    }
}

impl AdaptiveEngine for SimEngine {
    fn load_source(&mut self, url: &str, mime_type: &str) {
        let mut state = self.state();
        state.source = Some(url.to_string());
        state.mime_type = Some(mime_type.to_string());
    }

    fn ready_state(&self) -> ReadyState {
        self.state().ready_state
    }

    fn representations(&self) -> Vec<Representation> {
        self.state().representations.clone()
    }

    fn master_variants(&self) -> Vec<Representation> {
        self.state().master_variants.clone()
    }

    fn active_height(&self) -> Option<u32> {
        self.state().active_height
    }

    fn enable_only(&mut self, index: Option<usize>) {
        let mut state = self.state();
        state.enable_calls += 1;
        state.enabled = index;
        if let Some(height) = index.and_then(|i| state.representations.get(i).map(|r| r.height)) {
            state.active_height = Some(height);
        }
    }

    fn system_bandwidth(&self) -> Option<u64> {
        self.state().system_bandwidth
    }

    fn clear_source(&mut self) {
        let mut state = self.state();
        state.source = None;
        state.ready_state = ReadyState::HaveNothing;
    }

    fn detach_listeners(&mut self) {
        self.state().listeners_attached = false;
    }

    fn dispose(&mut self) {
        let newly_disposed = {
            let mut state = self.state();
            let first = !state.disposed;
            state.disposed = true;
            first
        };
        if newly_disposed {
            lock(&self.factory).disposed += 1;
        }
    }
}

// ----------------------------------------------------------------------
// Embed platform
// ----------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct ControllerState {
    pub iframe_url: String,
    pub token: Option<ListenerToken>,
    pub loaded_videos: Vec<String>,
    pub title: Option<String>,
    pub destroyed: bool,
}

#[derive(Clone, Debug)]
pub struct SimControllerHandle {
    state: Arc<Mutex<ControllerState>>,
}

impl SimControllerHandle {
    pub fn token(&self) -> Option<ListenerToken> {
        lock(&self.state).token
    }

    pub fn snapshot(&self) -> ControllerState {
        lock(&self.state).clone()
    }

    /// Title the controller reports once the video data is known.
    pub fn set_title(&self, title: &str) {
        lock(&self.state).title = Some(title.to_string());
    }
}

struct SimController {
    handle: SimControllerHandle,
}

impl EmbedController for SimController {
    fn load_video_by_id(&mut self, video_id: &str) {
        lock(&self.handle.state)
            .loaded_videos
            .push(video_id.to_string());
    }

    fn video_title(&self) -> Option<String> {
        lock(&self.handle.state).title.clone()
    }

    fn destroy(&mut self) {
        lock(&self.handle.state).destroyed = true;
    }
}

#[derive(Debug, Default)]
struct EmbedHostState {
    api_ready: bool,
    fail_injection: bool,
    scripts: Vec<(String, String)>,
    controllers: Vec<SimControllerHandle>,
    next_title: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SimEmbedHost {
    state: Arc<Mutex<EmbedHostState>>,
}

impl SimEmbedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose page already loaded the platform API.
    pub fn with_api_ready(self) -> Self {
        lock(&self.state).api_ready = true;
        self
    }

    pub fn set_api_ready(&self) {
        lock(&self.state).api_ready = true;
    }

    pub fn fail_injection(&self) {
        lock(&self.state).fail_injection = true;
    }

    /// Title given to the next controller built.
    pub fn set_next_title(&self, title: &str) {
        lock(&self.state).next_title = Some(title.to_string());
    }

    /// `(element_id, src)` of every injected script.
    pub fn injected_scripts(&self) -> Vec<(String, String)> {
        lock(&self.state).scripts.clone()
    }

    pub fn controllers(&self) -> Vec<SimControllerHandle> {
        lock(&self.state).controllers.clone()
    }

    pub fn last_controller(&self) -> Option<SimControllerHandle> {
        lock(&self.state).controllers.last().cloned()
    }
}

impl EmbedHost for SimEmbedHost {
    fn has_script(&self, element_id: &str) -> bool {
        lock(&self.state)
            .scripts
            .iter()
            .any(|(id, _)| id == element_id)
    }

    fn inject_script(&mut self, element_id: &str, src: &str) -> Result<(), PlayerError> {
        let mut state = lock(&self.state);
        if state.fail_injection {
            return Err(PlayerError::EmbedScript(format!("{src} blocked")));
        }
        state.scripts.push((element_id.to_string(), src.to_string()));
        Ok(())
    }

    fn is_api_ready(&self) -> bool {
        lock(&self.state).api_ready
    }

    fn create_controller(
        &mut self,
        iframe_url: &str,
        token: ListenerToken,
    ) -> Result<Box<dyn EmbedController>, PlayerError> {
        let mut state = lock(&self.state);
        if !state.api_ready {
            return Err(PlayerError::embed_controller_build("platform API not loaded"));
        }
        let handle = SimControllerHandle {
            state: Arc::new(Mutex::new(ControllerState {
                iframe_url: iframe_url.to_string(),
                token: Some(token),
                title: state.next_title.take(),
                ..Default::default()
            })),
        };
        state.controllers.push(handle.clone());
        Ok(Box::new(SimController { handle }))
    }
}

// ----------------------------------------------------------------------
// Station directory
// ----------------------------------------------------------------------

/// Directory that records every update it receives.
#[derive(Clone, Debug, Default)]
pub struct RecordingDirectory {
    updates: Arc<Mutex<Vec<StationDescriptor>>>,
}

impl RecordingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<StationDescriptor> {
        lock(&self.updates).clone()
    }
}

impl StationDirectory for RecordingDirectory {
    fn update_station(&self, station: StationDescriptor) {
        lock(&self.updates).push(station);
    }
}
