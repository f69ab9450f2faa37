use legato::common::banner::{BannerInfo, print_banner};
use legato::common::logger;
use legato::configs::Config;
use legato::player::{Player, PlayerEvent};
use legato::types::{FileTrackProvider, TrackProvider};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    print_banner(&BannerInfo::default());

    let config = Config::load()?;
    logger::init(&config);

    let player = Player::new(config.clone())?;
    let events = player.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv_async().await {
            match event {
                PlayerEvent::StateChanged(state) => info!("state: {}", state),
                PlayerEvent::TrackChanged { index, url } => match index {
                    Some(i) => info!("track {}: {}", i, url),
                    None => info!("track (unqueued): {}", url),
                },
                PlayerEvent::Progress {
                    buffered_seconds,
                    state,
                } => debug!("buffered {:.2}s while {}", buffered_seconds, state),
                PlayerEvent::Error { message } => warn!("{}", message),
            }
        }
    });
    let poll = player.spawn_poll_task();

    match config.tracks_file.as_deref() {
        Some(path) => {
            let tracks = FileTrackProvider::new(path).load_tracks().await?;
            info!("loaded {} tracks from {}", tracks.len(), path);
            let first = tracks.first().map(|t| t.url.clone());
            player.set_tracks(tracks);
            if let Some(url) = first {
                if let Err(err) = player.play(&url) {
                    warn!("cannot start playback: {}", err);
                }
            }
        }
        None => info!("no tracks_file configured, player is idle"),
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    player.stop();
    poll.abort();

    Ok(())
}
