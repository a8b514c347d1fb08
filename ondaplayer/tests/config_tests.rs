use std::sync::Arc;
use std::time::Duration;

use ondaconfig::Config;
use ondaplayer::sim::{SimElement, SimEmbedHost, SimEngineFactory};
use ondaplayer::{MediaEvent, Player, StationDescriptor};
use tempfile::TempDir;

fn load(dir: &TempDir) -> Arc<Config> {
    Arc::new(Config::load_config(dir.path().to_str().unwrap()).unwrap())
}

fn player(config: Arc<Config>, factory: &SimEngineFactory) -> Player {
    let mut player = Player::with_config(
        config,
        Box::new(factory.clone()),
        Box::new(SimEmbedHost::new().with_api_ready()),
    )
    .unwrap();
    player.attach_surface(Box::new(SimElement::new()));
    player
}

fn station() -> StationDescriptor {
    StationDescriptor::new("s1", "Canal Uno", "https://cdn.example.com/s1.m3u8")
}

#[test]
fn test_configured_delays_drive_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = load(&dir);
    config.set_provision_delay_ms(250).unwrap();
    config.set_load_timeout_secs(4).unwrap();

    let factory = SimEngineFactory::new();
    let mut player = player(config, &factory);
    assert_eq!(player.settings().provision_delay, Duration::from_millis(250));

    player.set_desired(true, 1.0);
    player.bind_station(Some(station()));
    player.advance(Duration::from_millis(200));
    assert_eq!(factory.created(), 0);
    player.advance(Duration::from_millis(50));
    assert_eq!(factory.created(), 1);

    player.advance(Duration::from_secs(4));
    assert!(player.error().is_some());
}

#[test]
fn test_bandwidth_estimate_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let factory = SimEngineFactory::new().with_representations(&[720, 360]);

    {
        let mut first = player(load(&dir), &factory);
        first.bind_station(Some(station()));
        first.advance(Duration::from_millis(100));
        let engine = factory.last_engine().unwrap();
        engine.switch_to(720, 3_300_000);
        first.handle_media_event(engine.token().unwrap(), MediaEvent::RenditionChanged);
    }

    let mut second = player(load(&dir), &factory);
    second.bind_station(Some(station()));
    second.advance(Duration::from_millis(100));
    let configs = factory.configs();
    assert_eq!(configs[1].seeded_bandwidth, Some(3_300_000));
    assert_eq!(configs[1].initial_bandwidth, 3_300_000);
}
