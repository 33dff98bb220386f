use anyhow::Context;
use circle_arena::config::{Config, TransportKind};
use circle_arena::game::autopilot::steer_to_nearest_food;
use circle_arena::game::constants::FRAME_RATE;
use circle_arena::game::player::InputIntent;
use circle_arena::session::{Coordinator, SessionConfig, SessionPhase};
use circle_arena::transport::memory::MemoryBroker;
use circle_arena::transport::mqtt::MqttConnector;
use circle_arena::transport::{Connector, Transport};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

const PLAY_AGAIN_DELAY: Duration = Duration::from_secs(3);
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    match config.transport {
        TransportKind::Mqtt => {
            run_peers(&config, Arc::new(MqttConnector::default()), 1, shutdown_rx).await
        }
        TransportKind::Memory => {
            let count = config.local_peers;
            run_peers(&config, Arc::new(MemoryBroker::new()), count, shutdown_rx).await
        }
    }
}

async fn run_peers<C>(
    config: &Config,
    connector: Arc<C>,
    count: usize,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    C: Connector + 'static,
{
    let session_config = SessionConfig::from(config);
    let mut first = Coordinator::new(session_config.clone());
    let room = match &config.room {
        Some(room) => {
            first
                .join(connector.as_ref(), room)
                .await
                .with_context(|| format!("failed to join room {room} via {}", config.broker))?;
            first
                .session()
                .map(|session| session.room_token.clone())
                .unwrap_or_else(|| room.clone())
        }
        None => first
            .create_room(connector.as_ref())
            .await
            .with_context(|| format!("failed to create a room via {}", config.broker))?,
    };
    tracing::info!(room = %room, broker = %config.broker, peers = count, "room ready");

    let mut tasks = Vec::with_capacity(count);
    tasks.push(tokio::spawn(drive(first, config.status_interval, shutdown.clone())));
    for _ in 1..count {
        let mut peer = Coordinator::new(session_config.clone());
        peer.join(connector.as_ref(), &room)
            .await
            .with_context(|| format!("failed to join room {room}"))?;
        tasks.push(tokio::spawn(drive(peer, config.status_interval, shutdown.clone())));
    }

    for task in tasks {
        task.await.context("peer task failed")?;
    }
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    Ok(())
}

async fn drive<T: Transport>(
    mut coordinator: Coordinator<T>,
    status_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut frame = tokio::time::interval(Duration::from_millis(1000 / FRAME_RATE));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut status = tokio::time::interval(status_interval);
    let mut round_over_at: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = frame.tick() => {
                let input = match (coordinator.local(), coordinator.food()) {
                    (Some(local), Some(food)) => steer_to_nearest_food(local, food),
                    _ => InputIntent::default(),
                };
                let now = Instant::now();
                coordinator.tick(input, SystemTime::now(), now);
                match (coordinator.phase(), round_over_at) {
                    (SessionPhase::Terminal, None) => round_over_at = Some(now),
                    (SessionPhase::Terminal, Some(since))
                        if now.duration_since(since) >= PLAY_AGAIN_DELAY =>
                    {
                        coordinator.play_again(now);
                        round_over_at = None;
                    }
                    (SessionPhase::Active, Some(_)) => round_over_at = None,
                    _ => {}
                }
            }
            _ = status.tick() => log_status(&coordinator),
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    coordinator.leave();
}

fn log_status<T: Transport>(coordinator: &Coordinator<T>) {
    let Some(frame) = coordinator.frame() else { return };
    tracing::info!(
        peer_id = %coordinator.local_id(),
        phase = ?frame.phase,
        size = frame.local.size,
        peers = frame.peers.len(),
        food = frame.food.len(),
        "status"
    );
    match serde_json::to_string(&frame) {
        Ok(json) => tracing::debug!(frame = %json, "frame"),
        Err(error) => tracing::warn!(?error, "failed to serialize frame"),
    }
}
