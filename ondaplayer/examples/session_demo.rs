// examples/session_demo.rs
//
// Scripted walk through a playback session on simulated primitives:
//   - an HLS station with three renditions, pinned then back to Auto
//   - a retry storm ending in the persistent load error
//   - a switch to a progressive radio station
//   - two embedded videos sharing one controller
//
// Run from the ondaplayer crate:
//   RUST_LOG=debug cargo run --features sim --example session_demo
//
// Without RUST_LOG the filter comes from `logger.min_level` in the Onda
// configuration (ONDA_CONFIG, ./.onda or ~/.onda).

use std::time::Duration;

use ondaplayer::sim::{RecordingDirectory, SimElement, SimEmbedHost, SimEngineFactory};
use ondaplayer::{
    EmbedEvent, EmbedPlayerState, MediaEvent, Player, PlayerEvent, StationDescriptor,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = ondaconfig::get_config()?;
    let min_level = config.get_log_min_level()?.to_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&min_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let factory = SimEngineFactory::new().with_representations(&[1080, 720, 480]);
    let host = SimEmbedHost::new().with_api_ready();
    host.set_next_title("Concierto en vivo");
    let element = SimElement::new().with_video_height(720);

    let mut player = Player::with_config(
        config,
        Box::new(factory.clone()),
        Box::new(host.clone()),
    )?
    .with_directory(Box::new(RecordingDirectory::new()));
    let events = player.subscribe();
    player.attach_surface(Box::new(element.clone()));
    player.set_desired(true, 0.8);

    // 1. Adaptive station
    player.bind_station(Some(StationDescriptor::new(
        "canal-1",
        "Canal Uno",
        "https://cdn.example.com/canal1/index.m3u8",
    )));
    player.advance(Duration::from_millis(100));
    let engine = factory
        .last_engine()
        .ok_or_else(|| anyhow::anyhow!("no engine was provisioned"))?;
    let token = engine
        .token()
        .ok_or_else(|| anyhow::anyhow!("engine has no listener token"))?;
    player.handle_media_event(token, MediaEvent::LoadedMetadata);
    player.handle_media_event(token, MediaEvent::Play);

    engine.switch_to(1080, 6_000_000);
    player.handle_media_event(token, MediaEvent::RenditionChanged);
    println!("Quality: {:?}", player.current_quality_label());

    player.set_quality_level(2);
    println!("Quality: {:?}", player.current_quality_label());
    player.set_quality_level(-1);
    player.advance(Duration::from_secs(2));
    println!("Quality: {:?}", player.current_quality_label());

    for _ in 0..3 {
        player.handle_media_event(token, MediaEvent::Retrying);
    }
    println!("Error: {:?}", player.error_message());

    // 2. Progressive radio
    player.bind_station(Some(StationDescriptor::new(
        "radio-1",
        "Radio Uno",
        "https://radio.example.com/stream.mp3",
    )));
    player.advance(Duration::from_millis(100));
    println!(
        "Element source: {:?}, live engines: {}",
        element.snapshot().source,
        player.live_engines()
    );

    // 3. Embedded videos
    for (id, video) in [("yt-AAA", "AAA"), ("yt-BBB", "BBB")] {
        player.bind_station(Some(
            StationDescriptor::new(id, "Video de YouTube", "")
                .with_embed_url(&format!("https://www.youtube.com/embed/{video}")),
        ));
        player.advance(Duration::from_millis(100));
    }
    if let Some(token) = host.last_controller().and_then(|controller| controller.token()) {
        player.handle_embed_event(token, EmbedEvent::StateChange(EmbedPlayerState::Playing));
    }
    println!(
        "Embed controllers built: {}, station: {:?}",
        player.embed_controllers_built(),
        player.station().map(|station| station.name.clone())
    );

    player.unmount();

    println!("\nEvents:");
    for event in events.try_iter() {
        match event {
            PlayerEvent::QualityLevelsChanged { station_id, levels } => {
                let labels: Vec<&str> = levels.iter().map(|level| level.label.as_str()).collect();
                println!("  [{station_id}] levels {labels:?}");
            }
            other => println!("  {other:?}"),
        }
    }
    Ok(())
}
