use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::errors::PlaybackError;
use crate::quality::QualityLevel;
use crate::station::{StationDescriptor, StationId};
use crate::technology::Technology;

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// Confirmed by the media primitive, never by the desired state.
    PlayStateChanged {
        station_id: StationId,
        playing: bool,
    },
    ErrorChanged {
        station_id: Option<StationId>,
        error: Option<PlaybackError>,
    },
    QualityLevelsChanged {
        station_id: StationId,
        levels: Vec<QualityLevel>,
    },
    QualityChanged {
        station_id: StationId,
        current_level: i32,
        auto_mode: bool,
    },
    EngineProvisioned {
        station_id: StationId,
        technology: Technology,
    },
    EngineDisposed {
        station_id: StationId,
    },
    /// Corrected descriptor pushed back to the directory.
    StationUpdated {
        station: StationDescriptor,
    },
}

/// Fan-out of [`PlayerEvent`]s to every live subscriber.
#[derive(Clone, Default)]
pub struct PlayerEventBus {
    subscribers: Arc<Mutex<Vec<Sender<PlayerEvent>>>>,
}

impl PlayerEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded::<PlayerEvent>();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    /// Sends `event` to every subscriber, forgetting the ones whose receiver
    /// was dropped.
    pub(crate) fn broadcast(&self, event: PlayerEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = PlayerEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.broadcast(PlayerEvent::EngineDisposed {
            station_id: StationId::from("s1"),
        });

        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
        assert_eq!(
            kept.try_recv().unwrap(),
            PlayerEvent::EngineDisposed {
                station_id: StationId::from("s1")
            }
        );
    }
}
