use std::sync::Arc;
use std::time::Duration;

use cohost_room::api::MeetingApiClient;
use cohost_room::lobby::JoinPreferences;
use cohost_room::logging::setup_logging;
use cohost_room::report;
use cohost_room::room_session::{self, ConnectRequest, RoomSession, SessionOptions, SessionStatus};
use cohost_room::transport::livekit::LiveKitTransport;
use cohost_room::{Config, ScreenSize};
use log::{error, info};
use tokio::runtime::Runtime;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env_variables();
    setup_logging(&config)?;

    let mut args = std::env::args().skip(1);
    let (Some(meeting_id), Some(user_id)) = (args.next(), args.next()) else {
        eprintln!("usage: cohost-room <meeting-id> <user-id>");
        std::process::exit(2);
    };

    let rt = Runtime::new()?;
    info!("Tokio runtime created.");

    let (ctrlc_tx, mut ctrlc_rx) = tokio::sync::watch::channel(());
    ctrlc::set_handler(move || {
        info!("Received Ctrl-C signal. Shutting down...");
        let _ = ctrlc_tx.send(());
    })?;

    rt.block_on(async move {
        let api = MeetingApiClient::from_config(&config);
        let (detail, joined) = api.prepare_join(&meeting_id, &user_id).await?;
        let (url, token) = joined.transport_credentials(config.livekit_url.as_deref())?;
        info!("Joining '{}' ({})", detail.summary.title, detail.summary.status);

        let mut session = RoomSession::new(
            Arc::new(LiveKitTransport::new()),
            SessionOptions::from(&config),
        );
        session.set_voice_profile(detail.voice_profile());
        let session = session.shared();

        let preferences = JoinPreferences::default();
        let request = ConnectRequest {
            url,
            token,
            audio_enabled: preferences.audio_enabled,
            video_enabled: preferences.video_enabled,
        };
        room_session::connect(&session, request).await?;

        let mut interval = tokio::time::interval(POLL_INTERVAL);
        let mut last_seen = Vec::new();

        loop {
            tokio::select! {
                _ = ctrlc_rx.changed() => break,
                _ = interval.tick() => {
                    let guard = session.lock().await;
                    if let SessionStatus::Failed(err) = guard.status() {
                        error!("Meeting session ended: {}", err);
                        break;
                    }

                    let view = guard.roster_view();
                    let digest: Vec<(String, bool, bool)> = view
                        .iter()
                        .map(|p| (p.id.clone(), p.audio_enabled, p.video_enabled))
                        .collect();
                    if digest == last_seen {
                        continue;
                    }
                    last_seen = digest;

                    report::roster_table(&view).printstd();
                    let plan = guard.stage(ScreenSize::Desktop, config.stage_capacity);
                    println!("{}", report::stage_summary(&plan));
                }
            }
        }

        room_session::disconnect(&session).await;
        info!("Left meeting {}", meeting_id);
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
