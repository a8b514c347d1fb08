//! Playback session façade.
//!
//! [`Player`] is the only type a host talks to. It owns the surface, the
//! adaptive engine, the embed controller and every timer of the current
//! station, and turns whatever goes wrong into the single user-facing error
//! slot. Nothing here blocks: the host forwards primitive events and drives
//! time through [`Player::advance`].
//!
//! Every station change bumps an epoch. Timers and listener tokens carry the
//! epoch they were created under, so anything belonging to a previous
//! station is dropped on arrival instead of being raced against.

use std::sync::Arc;
use std::time::Duration;

use ondaconfig::Config;
use tracing::{debug, error, info, warn};

use crate::bandwidth::{BandwidthStore, ConfigBandwidthStore, MemoryBandwidthStore};
use crate::capabilities::{
    EngineFactory, ListenerToken, MediaElement, MediaErrorCode, MediaErrorInfo, MediaEvent,
    ReadyState,
};
use crate::embed::{EmbedApiLoader, EmbedBridge, EmbedEvent, EmbedHost, EmbedPlayerState};
use crate::errors::{PlaybackError, PlayerError};
use crate::events::{PlayerEvent, PlayerEventBus};
use crate::lifecycle::{MediaEngineLifecycle, PlaybackPath};
use crate::quality::{AUTO_LEVEL, LadderUpdate, QualityLadderTracker, QualityLevel, QualityRequest};
use crate::reconciler::PlaybackReconciler;
use crate::scheduler::{Scheduler, TimerId};
use crate::settings::PlayerSettings;
use crate::station::{DetachedDirectory, StationDescriptor, StationDirectory, StationId};
use crate::technology::{
    NATIVE_HLS_MIME_TYPE, SurfaceKey, Technology, effective_source_url, has_video,
    select_technology,
};
use crate::watchdog::FailureWatchdog;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionTask {
    Provision { epoch: u64 },
    LoadWatchdog { epoch: u64 },
    LadderRefresh { epoch: u64 },
    QualityRecheck { epoch: u64 },
    /// Deferred so the engine is never disposed from inside its own error callback.
    DisposeEngine { epoch: u64 },
}

impl SessionTask {
    fn epoch(&self) -> u64 {
        match *self {
            SessionTask::Provision { epoch }
            | SessionTask::LoadWatchdog { epoch }
            | SessionTask::LadderRefresh { epoch }
            | SessionTask::QualityRecheck { epoch }
            | SessionTask::DisposeEngine { epoch } => epoch,
        }
    }
}

/// Per-station state. Dropped wholesale on station change.
#[derive(Debug)]
struct PlaybackSession {
    station: StationDescriptor,
    technology: Technology,
    epoch: u64,
    /// Set once provisioning wired a primitive.
    path: Option<PlaybackPath>,
    /// Provisioning ran before the host attached a surface.
    awaiting_surface: bool,
    quality: QualityLadderTracker,
    watchdog: FailureWatchdog,
    rechecks: Vec<TimerId>,
}

impl PlaybackSession {
    fn token(&self) -> ListenerToken {
        ListenerToken(self.epoch)
    }
}

/// What the wired primitive actually loads for `station`.
fn playback_source(
    station: &StationDescriptor,
    technology: Technology,
    relay_path: &str,
) -> String {
    match technology {
        Technology::Embed => station.embed_url.clone().unwrap_or_default(),
        Technology::Native | Technology::Adaptive => effective_source_url(station, relay_path),
    }
}

pub struct Player {
    settings: PlayerSettings,
    scheduler: Scheduler<SessionTask>,
    epoch: u64,
    session: Option<PlaybackSession>,
    lifecycle: MediaEngineLifecycle,
    reconciler: PlaybackReconciler,
    embed: EmbedBridge,
    embed_loader: EmbedApiLoader,
    error: Option<PlaybackError>,
    is_playing: bool,
    event_bus: PlayerEventBus,
    factory: Box<dyn EngineFactory>,
    embed_host: Box<dyn EmbedHost>,
    directory: Box<dyn StationDirectory>,
    bandwidth: Box<dyn BandwidthStore>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("epoch", &self.epoch)
            .field("session", &self.session)
            .field("lifecycle", &self.lifecycle)
            .field("embed", &self.embed)
            .field("error", &self.error)
            .field("is_playing", &self.is_playing)
            .finish()
    }
}

impl Player {
    pub fn new(
        settings: PlayerSettings,
        factory: Box<dyn EngineFactory>,
        embed_host: Box<dyn EmbedHost>,
    ) -> Self {
        Self {
            settings,
            scheduler: Scheduler::new(),
            epoch: 0,
            session: None,
            lifecycle: MediaEngineLifecycle::new(),
            reconciler: PlaybackReconciler::new(),
            embed: EmbedBridge::new(),
            embed_loader: EmbedApiLoader::new(),
            error: None,
            is_playing: false,
            event_bus: PlayerEventBus::new(),
            factory,
            embed_host,
            directory: Box::new(DetachedDirectory),
            bandwidth: Box::new(MemoryBandwidthStore::new()),
        }
    }

    /// Player tuned from `config`, persisting the bandwidth estimate in it.
    pub fn with_config(
        config: Arc<Config>,
        factory: Box<dyn EngineFactory>,
        embed_host: Box<dyn EmbedHost>,
    ) -> Result<Self, PlayerError> {
        let settings = PlayerSettings::from_config(&config)?;
        Ok(Self::new(settings, factory, embed_host)
            .with_bandwidth_store(Box::new(ConfigBandwidthStore::new(config))))
    }

    pub fn with_directory(mut self, directory: Box<dyn StationDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn with_bandwidth_store(mut self, store: Box<dyn BandwidthStore>) -> Self {
        self.bandwidth = store;
        self
    }

    /// Shares an existing bus instead of the private one.
    pub fn with_event_bus(mut self, bus: PlayerEventBus) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn subscribe(&self) -> crossbeam_channel::Receiver<PlayerEvent> {
        self.event_bus.subscribe()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Host entry points
    // ------------------------------------------------------------------

    /// Hands the rendering surface to the player.
    ///
    /// A previous surface is released first, along with any engine bound to it.
    pub fn attach_surface(&mut self, surface: Box<dyn MediaElement>) {
        if self.lifecycle.has_surface() {
            self.detach_surface();
        }
        self.lifecycle.attach_surface(surface);
        debug!("Surface attached");

        if let Some(session) = self.session.as_mut() {
            if session.awaiting_surface {
                session.awaiting_surface = false;
                let epoch = session.epoch;
                self.scheduler
                    .schedule(self.settings.provision_delay, SessionTask::Provision { epoch });
            }
        }
    }

    /// Takes the surface back. The engine bound to it is disposed and the
    /// session waits for the next surface.
    pub fn detach_surface(&mut self) -> Option<Box<dyn MediaElement>> {
        let had_engine = self.lifecycle.has_engine();
        let surface = self.lifecycle.detach_surface();

        if let Some(session) = self.session.as_mut() {
            if matches!(
                session.path,
                Some(PlaybackPath::Element) | Some(PlaybackPath::Engine)
            ) {
                session.path = None;
                session.awaiting_surface = true;
                // fresh epoch so the next engine never shares a token with the old one
                self.epoch += 1;
                session.epoch = self.epoch;
                session.watchdog.disarm(&mut self.scheduler);
                for timer in session.rechecks.drain(..) {
                    self.scheduler.cancel(timer);
                }
            }
        }
        if had_engine {
            self.announce_disposal();
        }
        debug!("Surface detached");
        surface
    }

    /// Binds the station selected in the UI, or unbinds with `None`.
    ///
    /// A new station id, a new technology or a new source URL restarts
    /// playback. Any other refresh of the same entry just replaces the stored
    /// descriptor.
    pub fn bind_station(&mut self, station: Option<StationDescriptor>) {
        let Some(station) = station else {
            if self.session.is_some() {
                info!("Station unbound");
                self.end_session(true);
                self.set_error(None);
            }
            return;
        };

        let technology = select_technology(&station);
        if let Some(session) = self.session.as_mut() {
            if session.station.id == station.id {
                let same_source = session.technology == technology
                    && playback_source(&session.station, technology, &self.settings.relay_path)
                        == playback_source(&station, technology, &self.settings.relay_path);
                if same_source {
                    debug!(station_id = %station.id, "Same station, descriptor refreshed");
                    session.station = station;
                    return;
                }
                info!(
                    station_id = %station.id,
                    from = session.technology.as_str(),
                    to = technology.as_str(),
                    "Station source changed, re-provisioning"
                );
            }
        }

        info!(
            station_id = %station.id,
            technology = technology.as_str(),
            "Binding station"
        );
        self.end_session(technology != Technology::Embed);
        self.set_error(None);

        let epoch = self.epoch;
        self.session = Some(PlaybackSession {
            station,
            technology,
            epoch,
            path: None,
            awaiting_surface: false,
            quality: QualityLadderTracker::new(),
            watchdog: FailureWatchdog::new(self.settings.load_timeout, self.settings.max_retries),
            rechecks: Vec::new(),
        });
        self.scheduler
            .schedule(self.settings.provision_delay, SessionTask::Provision { epoch });
    }

    /// Records the UI's play/pause and volume intent and applies it to the
    /// active primitive.
    pub fn set_desired(&mut self, playing: bool, volume: f64) {
        self.reconciler.set_desired(playing, volume);
        self.reconcile();
    }

    /// Pins a quality level, or returns to Auto with `-1`.
    ///
    /// Ignored when no adaptive engine is live. Unknown indexes are ignored.
    pub fn set_quality_level(&mut self, index: i32) {
        let Some(session) = self.session.as_mut() else {
            debug!(index, "No station bound, ignoring quality request");
            return;
        };
        let Some(engine) = self.lifecycle.engine_mut() else {
            debug!(index, "No adaptive engine, ignoring quality request");
            return;
        };

        let request = session.quality.set_quality_level(index, engine);
        if request == QualityRequest::Rejected {
            return;
        }
        for timer in session.rechecks.drain(..) {
            self.scheduler.cancel(timer);
        }
        match request {
            QualityRequest::Auto => {
                info!(station_id = %session.station.id, "Quality back to Auto");
                let epoch = session.epoch;
                for delay in &self.settings.quality_recheck_delays {
                    if delay.is_zero() {
                        continue;
                    }
                    let timer = self
                        .scheduler
                        .schedule(*delay, SessionTask::QualityRecheck { epoch });
                    session.rechecks.push(timer);
                }
            }
            QualityRequest::Pinned(level) => {
                info!(station_id = %session.station.id, level, "Quality pinned");
            }
            QualityRequest::Rejected => {}
        }
        self.publish_quality(LadderUpdate {
            levels_changed: false,
            selection_changed: true,
        });
    }

    /// Forwards an event from the media element or the adaptive engine.
    pub fn handle_media_event(&mut self, token: ListenerToken, event: MediaEvent) {
        if !self.lifecycle.accepts(token) {
            debug!(epoch = token.epoch(), ?event, "Dropping event from a released listener");
            return;
        }
        let Some(path) = self.session.as_ref().and_then(|session| session.path) else {
            return;
        };

        match event {
            MediaEvent::Play => self.update_playing(true),
            MediaEvent::Pause => self.update_playing(false),
            MediaEvent::Playing => {
                self.update_playing(true);
                if path == PlaybackPath::Engine {
                    self.refresh_ladder();
                }
            }
            MediaEvent::LoadedMetadata => {
                if path == PlaybackPath::Engine {
                    if let Some(session) = self.session.as_mut() {
                        session.watchdog.on_metadata_loaded(&mut self.scheduler);
                        info!(station_id = %session.station.id, "Stream metadata loaded");
                    }
                    self.refresh_ladder();
                }
            }
            MediaEvent::LoadedData => {
                if path == PlaybackPath::Element && self.reconciler.should_play() {
                    self.reconcile();
                }
            }
            MediaEvent::Resize | MediaEvent::RepresentationsChanged => {
                if path == PlaybackPath::Engine {
                    self.refresh_ladder();
                }
            }
            MediaEvent::RenditionChanged => {
                if path == PlaybackPath::Engine {
                    self.on_rendition_changed();
                }
            }
            MediaEvent::Retrying => {
                if path == PlaybackPath::Engine {
                    self.on_retry();
                }
            }
            MediaEvent::Error(info) => self.on_media_error(path, info),
        }
    }

    /// Forwards an event from the embed controller.
    pub fn handle_embed_event(&mut self, token: ListenerToken, event: EmbedEvent) {
        if !self.embed.accepts(token) {
            debug!(epoch = token.epoch(), ?event, "Dropping event from a destroyed controller");
            return;
        }

        let (failure, updated) = self.embed.handle_event(&event, self.directory.as_ref());
        if let Some(failure) = failure {
            self.set_error(Some(failure));
        }
        if let Some(station) = updated {
            if let Some(session) = self.session.as_mut() {
                if session.station.id == station.id {
                    session.station = station.clone();
                }
            }
            self.event_bus.broadcast(PlayerEvent::StationUpdated { station });
        }

        match event {
            EmbedEvent::StateChange(EmbedPlayerState::Playing) => self.update_playing(true),
            EmbedEvent::StateChange(EmbedPlayerState::Paused)
            | EmbedEvent::StateChange(EmbedPlayerState::Ended) => self.update_playing(false),
            _ => {}
        }
    }

    /// The host saw the embed API become available.
    pub fn embed_api_ready(&mut self) {
        let released = self.embed_loader.on_ready();
        info!(waiters = released.len(), "Embed API ready");
        match self
            .embed
            .on_api_ready(&released, self.embed_host.as_mut(), &self.settings.embed)
        {
            Ok(true) => debug!("Deferred embed controller built"),
            Ok(false) => {}
            Err(err) => {
                error!(error = %err, "Embed controller construction failed");
                self.set_error(Some(PlaybackError::EmbedGeneric));
            }
        }
    }

    /// Moves the clock forward, running every timer that falls due.
    pub fn advance(&mut self, elapsed: Duration) {
        let until = self.scheduler.now() + elapsed;
        while let Some((timer, task)) = self.scheduler.pop_due(until) {
            self.run_task(timer, task);
        }
        self.scheduler.settle(until);
    }

    /// Releases everything, as when the player view goes away.
    pub fn unmount(&mut self) {
        info!("Player unmounted");
        self.end_session(true);
        self.set_error(None);
        drop(self.lifecycle.detach_surface());
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn station(&self) -> Option<&StationDescriptor> {
        self.session.as_ref().map(|session| &session.station)
    }

    pub fn technology(&self) -> Option<Technology> {
        self.session.as_ref().map(|session| session.technology)
    }

    /// Primitive actually wired, once provisioning ran.
    pub fn playback_path(&self) -> Option<PlaybackPath> {
        self.session.as_ref().and_then(|session| session.path)
    }

    pub fn has_video(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| has_video(&session.station, session.technology))
    }

    pub fn surface_key(&self) -> Option<SurfaceKey> {
        self.session.as_ref().map(|session| SurfaceKey {
            station_id: session.station.id.clone(),
            technology: session.technology,
        })
    }

    pub fn error(&self) -> Option<&PlaybackError> {
        self.error.as_ref()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(PlaybackError::message)
    }

    pub fn quality_levels(&self) -> &[QualityLevel] {
        self.session
            .as_ref()
            .map(|session| session.quality.levels())
            .unwrap_or(&[])
    }

    pub fn current_level_index(&self) -> i32 {
        self.session
            .as_ref()
            .map(|session| session.quality.current_level())
            .unwrap_or(AUTO_LEVEL)
    }

    pub fn is_auto_mode(&self) -> bool {
        self.session
            .as_ref()
            .is_none_or(|session| session.quality.is_auto_mode())
    }

    pub fn current_quality_label(&self) -> Option<String> {
        self.session
            .as_ref()
            .and_then(|session| session.quality.current_label())
    }

    /// Playing as confirmed by the primitive's own events.
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn retry_count(&self) -> u32 {
        self.session
            .as_ref()
            .map(|session| session.watchdog.retry_count())
            .unwrap_or(0)
    }

    pub fn live_engines(&self) -> usize {
        self.lifecycle.live_engines()
    }

    pub fn engines_created(&self) -> usize {
        self.lifecycle.engines_created()
    }

    pub fn embed_controllers_built(&self) -> usize {
        self.embed.controllers_built()
    }

    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn station_id(&self) -> Option<StationId> {
        self.session.as_ref().map(|session| session.station.id.clone())
    }

    /// Cancels every timer, bumps the epoch and releases the primitives of
    /// the current station. The embed controller survives when
    /// `release_embed` is false so the next embed can navigate in place.
    fn end_session(&mut self, release_embed: bool) {
        let cancelled = self.scheduler.cancel_all();
        self.epoch += 1;
        if cancelled > 0 {
            debug!(cancelled, epoch = self.epoch, "Pending session timers cancelled");
        }

        let had_engine = self.lifecycle.has_engine();
        self.lifecycle.teardown();
        if release_embed {
            self.embed.teardown();
        }
        if had_engine {
            self.announce_disposal();
        }
        self.update_playing(false);

        if let Some(session) = self.session.take() {
            if !session.quality.levels().is_empty() {
                self.event_bus.broadcast(PlayerEvent::QualityLevelsChanged {
                    station_id: session.station.id,
                    levels: Vec::new(),
                });
            }
        }
    }

    fn run_task(&mut self, timer: TimerId, task: SessionTask) {
        let current = self.session.as_ref().map(|session| session.epoch);
        if current != Some(task.epoch()) {
            debug!(?task, "Dropping timer of a previous station");
            return;
        }

        match task {
            SessionTask::Provision { .. } => self.provision(),
            SessionTask::LoadWatchdog { .. } => self.on_load_timeout(),
            SessionTask::LadderRefresh { .. } => self.refresh_ladder(),
            SessionTask::QualityRecheck { .. } => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                session.rechecks.retain(|pending| *pending != timer);
                let Some(engine) = self.lifecycle.engine() else {
                    return;
                };
                if session.quality.track_active(engine) {
                    self.publish_quality(LadderUpdate {
                        levels_changed: false,
                        selection_changed: true,
                    });
                }
            }
            SessionTask::DisposeEngine { .. } => {
                if !self.lifecycle.has_engine() {
                    return;
                }
                self.lifecycle.dispose_engine();
                self.announce_disposal();
                if let Some(session) = self.session.as_mut() {
                    session.path = None;
                    session.quality.reset();
                    self.event_bus.broadcast(PlayerEvent::QualityLevelsChanged {
                        station_id: session.station.id.clone(),
                        levels: Vec::new(),
                    });
                }
            }
        }
    }

    fn provision(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let station = session.station.clone();
        let token = session.token();
        let technology = session.technology;

        match technology {
            Technology::Embed => self.provision_embed(&station, token),
            Technology::Native => {
                if self.ensure_surface() {
                    self.provision_element(&station, token);
                }
            }
            Technology::Adaptive => {
                if self.ensure_surface() {
                    self.provision_adaptive(&station, token);
                }
            }
        }
    }

    /// True when a surface is attached; otherwise parks the session until one is.
    fn ensure_surface(&mut self) -> bool {
        if self.lifecycle.has_surface() {
            return true;
        }
        if let Some(session) = self.session.as_mut() {
            debug!(station_id = %session.station.id, "No surface yet, provisioning deferred");
            session.awaiting_surface = true;
        }
        false
    }

    fn provision_embed(&mut self, station: &StationDescriptor, token: ListenerToken) {
        let bound = self.embed.bind(
            station,
            token,
            self.embed_host.as_mut(),
            &mut self.embed_loader,
            &self.settings.embed,
        );
        match bound {
            Ok(binding) => {
                debug!(station_id = %station.id, ?binding, "Embed bound");
                self.mark_provisioned(PlaybackPath::Embed, Technology::Embed);
            }
            Err(err) => {
                error!(station_id = %station.id, error = %err, "Embed provisioning failed");
                self.set_error(Some(PlaybackError::EmbedGeneric));
            }
        }
    }

    fn provision_element(&mut self, station: &StationDescriptor, token: ListenerToken) {
        let url = effective_source_url(station, &self.settings.relay_path);
        match self
            .lifecycle
            .provision_native(&url, self.reconciler.desired(), token)
        {
            Ok(()) => self.mark_provisioned(PlaybackPath::Element, Technology::Native),
            Err(err) => {
                error!(station_id = %station.id, error = %err, "Native provisioning failed");
                self.set_error(Some(PlaybackError::Media));
            }
        }
    }

    fn provision_adaptive(&mut self, station: &StationDescriptor, token: ListenerToken) {
        if !self.factory.is_supported() {
            let native_hls = self
                .lifecycle
                .surface()
                .is_some_and(|surface| surface.can_play_type(NATIVE_HLS_MIME_TYPE));
            if native_hls {
                info!(station_id = %station.id, "Adaptive engine unavailable, using native HLS");
                self.provision_element(station, token);
            } else {
                warn!(
                    station_id = %station.id,
                    error = %PlayerError::AdaptiveUnsupported,
                    "Cannot play adaptive station"
                );
                self.set_error(Some(PlaybackError::Unsupported));
            }
            return;
        }

        let url = effective_source_url(station, &self.settings.relay_path);
        let desired = self.reconciler.desired();
        let config = self.settings.adaptive.engine_config(
            self.bandwidth.last_bandwidth(),
            desired.playing,
            desired.volume,
        );
        if let Err(err) =
            self.lifecycle
                .provision_adaptive(self.factory.as_mut(), &url, &config, token)
        {
            error!(station_id = %station.id, error = %err, "Adaptive provisioning failed");
            self.set_error(Some(PlaybackError::Stream));
            return;
        }

        if let Some(session) = self.session.as_mut() {
            let epoch = session.epoch;
            session
                .watchdog
                .arm(&mut self.scheduler, SessionTask::LoadWatchdog { epoch });
            for delay in &self.settings.ladder_refresh_delays {
                self.scheduler
                    .schedule(*delay, SessionTask::LadderRefresh { epoch });
            }
        }
        self.mark_provisioned(PlaybackPath::Engine, Technology::Adaptive);
    }

    fn mark_provisioned(&mut self, path: PlaybackPath, technology: Technology) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.path = Some(path);
        self.event_bus.broadcast(PlayerEvent::EngineProvisioned {
            station_id: session.station.id.clone(),
            technology,
        });
    }

    fn reconcile(&mut self) {
        let Some(path) = self.playback_path() else {
            return;
        };
        if let Some(outcome) = self.lifecycle.reconcile(path, &self.reconciler) {
            if outcome.play_requested || outcome.pause_requested {
                debug!(?path, ?outcome, "Desired playback applied");
            }
        }
    }

    fn on_load_timeout(&mut self) {
        let ready_state = self
            .lifecycle
            .engine()
            .map(|engine| engine.ready_state())
            .unwrap_or(ReadyState::HaveNothing);
        let should_play = self.reconciler.should_play();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(failure) = session.watchdog.on_load_timeout(ready_state, should_play) {
            self.lifecycle.pause(PlaybackPath::Engine);
            self.set_error(Some(failure));
        }
    }

    fn on_retry(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(failure) = session.watchdog.on_retry() {
            session.watchdog.disarm(&mut self.scheduler);
            self.lifecycle.halt_engine();
            self.set_error(Some(failure));
        }
    }

    fn on_media_error(&mut self, path: PlaybackPath, info: MediaErrorInfo) {
        let code = info.code.code();
        match path {
            PlaybackPath::Element => {
                error!(code, message = %info.message, "Media element error");
                self.set_error(Some(PlaybackError::Media));
                self.update_playing(false);
            }
            PlaybackPath::Engine => {
                if info.fatal && info.code.is_unrecoverable() {
                    error!(code, message = %info.message, "Fatal adaptive engine error");
                    if let Some(session) = self.session.as_mut() {
                        session.watchdog.disarm(&mut self.scheduler);
                        let epoch = session.epoch;
                        self.scheduler
                            .schedule(Duration::ZERO, SessionTask::DisposeEngine { epoch });
                    }
                    self.set_error(Some(PlaybackError::Stream));
                } else if info.code == MediaErrorCode::Decode {
                    debug!(code, message = %info.message, "Adaptive engine decode hiccup");
                } else {
                    warn!(
                        code,
                        fatal = info.fatal,
                        message = %info.message,
                        "Adaptive engine error"
                    );
                }
            }
            PlaybackPath::Embed => {}
        }
    }

    fn on_rendition_changed(&mut self) {
        let Some(engine) = self.lifecycle.engine() else {
            return;
        };
        if let Some(bandwidth) = engine.system_bandwidth() {
            debug!(bandwidth, "Recording bandwidth estimate");
            self.bandwidth.record(bandwidth);
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.quality.track_active(engine) {
            self.publish_quality(LadderUpdate {
                levels_changed: false,
                selection_changed: true,
            });
        }
    }

    fn refresh_ladder(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(engine) = self.lifecycle.engine() else {
            return;
        };
        let surface_height = self
            .lifecycle
            .surface()
            .map(|surface| surface.video_height())
            .unwrap_or(0);
        let update = session.quality.refresh(engine, surface_height);
        self.publish_quality(update);
    }

    fn publish_quality(&self, update: LadderUpdate) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if update.levels_changed {
            self.event_bus.broadcast(PlayerEvent::QualityLevelsChanged {
                station_id: session.station.id.clone(),
                levels: session.quality.levels().to_vec(),
            });
        }
        if update.levels_changed || update.selection_changed {
            self.event_bus.broadcast(PlayerEvent::QualityChanged {
                station_id: session.station.id.clone(),
                current_level: session.quality.current_level(),
                auto_mode: session.quality.is_auto_mode(),
            });
        }
    }

    fn announce_disposal(&self) {
        if let Some(station_id) = self.station_id() {
            self.event_bus
                .broadcast(PlayerEvent::EngineDisposed { station_id });
        }
    }

    fn update_playing(&mut self, playing: bool) {
        if self.is_playing == playing {
            return;
        }
        self.is_playing = playing;
        if let Some(station_id) = self.station_id() {
            self.event_bus
                .broadcast(PlayerEvent::PlayStateChanged { station_id, playing });
        }
    }

    /// Single error slot. Last writer wins.
    fn set_error(&mut self, error: Option<PlaybackError>) {
        if self.error == error {
            return;
        }
        if let Some(error) = error.as_ref() {
            warn!(error = %error, "Playback error surfaced");
        }
        self.error = error.clone();
        self.event_bus.broadcast(PlayerEvent::ErrorChanged {
            station_id: self.station_id(),
            error,
        });
    }
}
