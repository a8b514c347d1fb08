//! Ownership of the rendering surface and of the adaptive engine.
//!
//! At most one engine is alive at any time. Engines are never reused across
//! stations: the previous one is disposed synchronously before a new one is
//! even scheduled.

use tracing::{debug, info, warn};

use crate::capabilities::{
    AdaptiveEngine, EngineFactory, ListenerToken, MediaElement, TransportControl, VolumeControl,
};
use crate::errors::PlayerError;
use crate::reconciler::{DesiredPlayback, PlaybackReconciler, ReconcileOutcome, log_play_failure};
use crate::settings::AdaptiveEngineConfig;
use crate::technology::HLS_MIME_TYPE;

/// Primitive actually carrying the station.
///
/// Usually follows the technology, except that an adaptive station falls back
/// to the element when the host has no adaptive engine but plays HLS natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackPath {
    Element,
    Engine,
    Embed,
}

#[derive(Default)]
pub struct MediaEngineLifecycle {
    surface: Option<Box<dyn MediaElement>>,
    engine: Option<Box<dyn AdaptiveEngine>>,
    /// Token of the listeners currently attached to the surface (native path).
    surface_token: Option<ListenerToken>,
    /// Token handed to the live engine.
    engine_token: Option<ListenerToken>,
    engines_created: usize,
    engines_disposed: usize,
}

impl std::fmt::Debug for MediaEngineLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaEngineLifecycle")
            .field("has_surface", &self.surface.is_some())
            .field("has_engine", &self.engine.is_some())
            .field("surface_token", &self.surface_token)
            .field("engine_token", &self.engine_token)
            .field("engines_created", &self.engines_created)
            .field("engines_disposed", &self.engines_disposed)
            .finish()
    }
}

impl MediaEngineLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_surface(
        &mut self,
        surface: Box<dyn MediaElement>,
    ) -> Option<Box<dyn MediaElement>> {
        self.surface.replace(surface)
    }

    /// Removes the surface. Any engine bound to it is disposed first.
    pub fn detach_surface(&mut self) -> Option<Box<dyn MediaElement>> {
        self.dispose_engine();
        self.release_surface();
        self.surface.take()
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&dyn MediaElement> {
        self.surface.as_deref()
    }

    pub fn engine(&self) -> Option<&dyn AdaptiveEngine> {
        self.engine.as_deref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut (dyn AdaptiveEngine + 'static)> {
        self.engine.as_deref_mut()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Engines constructed minus engines disposed. Never above one.
    pub fn live_engines(&self) -> usize {
        self.engines_created - self.engines_disposed
    }

    pub fn engines_created(&self) -> usize {
        self.engines_created
    }

    /// True when `token` belongs to the primitive currently wired.
    pub fn accepts(&self, token: ListenerToken) -> bool {
        self.surface_token == Some(token) || self.engine_token == Some(token)
    }

    /// Releases whatever the previous station used. Synchronous.
    pub fn teardown(&mut self) {
        self.dispose_engine();
        self.release_surface();
    }

    /// Detaches listeners and disposes the adaptive engine, if any.
    pub fn dispose_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            info!("Disposing adaptive engine");
            engine.detach_listeners();
            engine.clear_source();
            engine.dispose();
            self.engines_disposed += 1;
        }
        self.engine_token = None;
    }

    /// Stops the native element and drops its source so no background
    /// fetch survives the station.
    fn release_surface(&mut self) {
        let token = self.surface_token.take();
        if let Some(surface) = self.surface.as_mut() {
            if let Some(token) = token {
                surface.detach_listeners(token);
                surface.pause();
                surface.clear_source();
                surface.load();
                debug!("Native source released");
            }
        }
    }

    /// Wires the surface for progressive playback.
    pub fn provision_native(
        &mut self,
        url: &str,
        desired: DesiredPlayback,
        token: ListenerToken,
    ) -> Result<(), PlayerError> {
        let surface = self.surface.as_mut().ok_or(PlayerError::NoSurface)?;
        surface.attach_listeners(token);
        self.surface_token = Some(token);
        surface.set_source(url);
        surface.set_volume(desired.volume);
        surface.load();
        info!(url = %url, "Native source loaded");

        if desired.playing {
            if let Err(failure) = surface.play() {
                log_play_failure(&failure);
            }
        }
        Ok(())
    }

    /// Builds the adaptive engine on the surface.
    pub fn provision_adaptive(
        &mut self,
        factory: &mut dyn EngineFactory,
        url: &str,
        config: &AdaptiveEngineConfig,
        token: ListenerToken,
    ) -> Result<(), PlayerError> {
        if self.engine.is_some() {
            warn!("Adaptive engine still alive at provisioning, disposing it first");
            self.dispose_engine();
        }
        let surface = self.surface.as_deref_mut().ok_or(PlayerError::NoSurface)?;
        let mut engine = factory.create(surface, token, config)?;
        self.engines_created += 1;
        engine.set_volume(config.volume);
        engine.load_source(url, HLS_MIME_TYPE);
        info!(
            url = %url,
            initial_bandwidth = config.initial_bandwidth,
            "Adaptive engine provisioned"
        );
        self.engine = Some(engine);
        self.engine_token = Some(token);
        Ok(())
    }

    /// Stops the engine after an unrecoverable failure and drops its source.
    pub fn halt_engine(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.pause();
            engine.clear_source();
        }
    }

    /// Applies desired state to whichever primitive `path` uses.
    pub fn reconcile(
        &mut self,
        path: PlaybackPath,
        reconciler: &PlaybackReconciler,
    ) -> Option<ReconcileOutcome> {
        match path {
            PlaybackPath::Engine => {
                let engine = self.engine.as_deref_mut()?;
                Some(reconciler.apply(engine))
            }
            PlaybackPath::Element => {
                self.surface_token?;
                let surface = self.surface.as_deref_mut()?;
                Some(reconciler.apply(surface))
            }
            PlaybackPath::Embed => None,
        }
    }

    /// Pauses the primitive `path` uses.
    pub fn pause(&mut self, path: PlaybackPath) {
        match path {
            PlaybackPath::Engine => {
                if let Some(engine) = self.engine.as_deref_mut() {
                    engine.pause();
                }
            }
            PlaybackPath::Element => {
                if let Some(surface) = self.surface.as_deref_mut() {
                    surface.pause();
                }
            }
            PlaybackPath::Embed => {}
        }
    }
}
