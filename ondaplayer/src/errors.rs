use thiserror::Error;

/// Internal failures. Never leaves the public [`crate::Player`] entry points:
/// the session converts them into a [`PlaybackError`] or logs them.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Adaptive engine is not supported on this host")]
    AdaptiveUnsupported,
    #[error("Cannot build adaptive engine: {0}")]
    EngineBuild(String),
    #[error("Cannot build embed controller: {0}")]
    EmbedControllerBuild(String),
    #[error("Embed API script injection failed: {0}")]
    EmbedScript(String),
    #[error("No rendering surface attached")]
    NoSurface,
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl PlayerError {
    pub fn engine_build(message: &str) -> Self {
        PlayerError::EngineBuild(message.to_string())
    }

    pub fn embed_controller_build(message: &str) -> Self {
        PlayerError::EmbedControllerBuild(message.to_string())
    }
}

/// Why a media element or engine refused a play request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaFailure {
    /// The request was superseded by a newer load. Expected during fast
    /// station switching.
    #[error("play() request was interrupted by a new load request")]
    Aborted,
    /// The host blocked playback (autoplay policy).
    #[error("play() is not allowed by the host: {0}")]
    NotAllowed(String),
    #[error("{0}")]
    Other(String),
}

impl MediaFailure {
    pub fn is_benign(&self) -> bool {
        matches!(self, MediaFailure::Aborted)
    }
}

/// User-facing error slot content. Only one is shown at a time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The adaptive engine never produced usable data inside the load window.
    #[error("No se pudo conectar con la emisora. Inténtalo de nuevo más tarde.")]
    Connection,
    /// Retry budget exhausted.
    #[error("La emisora no responde tras varios intentos. Selecciónala de nuevo para reintentar.")]
    PersistentLoad,
    /// The content owner disallows embedding.
    #[error("El propietario de este contenido no permite reproducirlo fuera de su plataforma.")]
    EmbedRestricted,
    #[error("No se pudo reproducir el video incrustado.")]
    EmbedGeneric,
    #[error("Tu navegador no soporta HLS streams.")]
    Unsupported,
    /// Fatal adaptive engine error.
    #[error("Error al cargar el stream HLS.")]
    Stream,
    /// Native media element error.
    #[error("Error al reproducir la emisora.")]
    Media,
}

impl PlaybackError {
    pub fn message(&self) -> String {
        self.to_string()
    }
}
