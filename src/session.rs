//! Session lifecycle: joining a room, running the local player, publishing
//! its state and converging on the shared "round over" state.

use crate::config::{BrokerAddress, Config, Variant};
use crate::game::constants::BROADCAST_INTERVAL_MS;
use crate::game::player::{random_color, InputIntent, LocalState};
use crate::game::registry::{Applied, PeerRegistry, PeerState};
use crate::game::types::{PeerId, Rgb};
use crate::game::world::{FoodSet, World};
use crate::protocol::{decode_message, encode_message, encode_remove, encode_state, Message};
use crate::shared::room_token::{generate_room_token, sanitize_room_token, topic_for};
use crate::transport::{
    ConnectError, ConnectOptions, Connector, InboundMessage, LastWill, Transport, TransportError,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;


#[derive(Debug, Error)]
pub enum JoinError {
    #[error("already joined room {room}")]
    AlreadyJoined { room: String },

    #[error("room token {0:?} has no usable characters")]
    InvalidRoomToken(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("failed to subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: TransportError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NotJoined,
    Active,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub room_token: String,
    pub topic: String,
}

/// State shared between the simulation loop and the inbound pump task.
#[derive(Debug)]
pub struct SharedView {
    registry: StdMutex<PeerRegistry>,
    terminal: AtomicBool,
    accepting: AtomicBool,
}

impl SharedView {
    fn new(local_id: PeerId) -> Self {
        Self {
            registry: StdMutex::new(PeerRegistry::new(local_id)),
            terminal: AtomicBool::new(false),
            accepting: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> MutexGuard<'_, PeerRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.load(Ordering::SeqCst)
    }

    /// Returns true the first time the flag flips for this round.
    fn enter_terminal(&self) -> bool {
        !self.terminal.swap(true, Ordering::SeqCst)
    }

    fn clear_terminal(&self) {
        self.terminal.store(false, Ordering::SeqCst);
    }

    /// Resets the view for a new session, or detaches it when `accepting` is
    /// false so late inbound messages are dropped.
    fn reset(&self, accepting: bool) {
        let mut registry = self.registry();
        registry.clear();
        self.clear_terminal();
        self.accepting.store(accepting, Ordering::SeqCst);
        drop(registry);
    }

    pub fn handle_payload(&self, payload: &[u8]) -> Applied {
        let Some(message) = decode_message(payload) else {
            tracing::trace!(len = payload.len(), "dropping unparseable payload");
            return Applied::Ignored;
        };
        // The flag only flips while the registry guard is held, so a frame
        // holding the guard sees a stable value.
        let mut registry = self.registry();
        if !self.accepting.load(Ordering::SeqCst) {
            return Applied::Ignored;
        }
        let applied = registry.apply(message);
        if applied == Applied::Stop && self.enter_terminal() {
            tracing::info!("round over");
        }
        drop(registry);
        applied
    }
}

/// Decides when the local state goes out: on every change, and otherwise
/// once the last publish is older than the interval.
#[derive(Debug, Clone)]
pub struct PublishPolicy {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl PublishPolicy {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn should_publish(&self, changed: bool, now: Instant) -> bool {
        if changed {
            return true;
        }
        match self.last_sent {
            Some(last_sent) => now.saturating_duration_since(last_sent) > self.interval,
            None => true,
        }
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(BROADCAST_INTERVAL_MS))
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub broker: BrokerAddress,
    pub topic_prefix: String,
    pub variant: Variant,
    pub keep_alive: Duration,
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            broker: config.broker.clone(),
            topic_prefix: config.topic_prefix.clone(),
            variant: config.variant,
            keep_alive: config.keep_alive,
        }
    }
}

/// Everything a presentation layer needs to draw one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameView {
    pub session: Session,
    pub phase: SessionPhase,
    pub local: LocalState,
    pub peers: Vec<PeerState>,
    pub food: FoodSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub published: bool,
    pub eaten: usize,
    pub stopped_round: bool,
}

struct ActiveSession<T: Transport> {
    session: Session,
    transport: T,
    local: LocalState,
    world: World,
    policy: PublishPolicy,
    pump: JoinHandle<()>,
}

impl<T: Transport> ActiveSession<T> {
    fn publish(&self, payload: String) {
        if let Err(error) = self.transport.publish(&self.session.topic, payload) {
            tracing::warn!(%error, topic = %self.session.topic, "publish failed");
        }
    }

    fn publish_state(&mut self, now: Instant) {
        self.publish(encode_state(&self.local.to_update()));
        self.policy.mark_sent(now);
    }
}

impl<T: Transport> Drop for ActiveSession<T> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

pub struct Coordinator<T: Transport> {
    config: SessionConfig,
    local_id: PeerId,
    color: Rgb,
    shared: Arc<SharedView>,
    active: Option<ActiveSession<T>>,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(config: SessionConfig) -> Self {
        let local_id = PeerId::generate();
        Self {
            config,
            shared: Arc::new(SharedView::new(local_id.clone())),
            local_id,
            color: random_color(),
            active: None,
        }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn shared(&self) -> &Arc<SharedView> {
        &self.shared
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.active {
            None => SessionPhase::NotJoined,
            Some(_) if self.shared.is_terminal() => SessionPhase::Terminal,
            Some(_) => SessionPhase::Active,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.active.as_ref().map(|active| &active.session)
    }

    pub fn local(&self) -> Option<&LocalState> {
        self.active.as_ref().map(|active| &active.local)
    }

    pub fn food(&self) -> Option<&FoodSet> {
        self.active.as_ref().map(|active| active.world.food())
    }

    pub async fn join<C>(&mut self, connector: &C, room: &str) -> Result<(), JoinError>
    where
        C: Connector<Transport = T>,
    {
        if let Some(active) = &self.active {
            return Err(JoinError::AlreadyJoined {
                room: active.session.room_token.clone(),
            });
        }
        let room_token =
            sanitize_room_token(room).ok_or_else(|| JoinError::InvalidRoomToken(room.to_string()))?;
        let topic = topic_for(&self.config.topic_prefix, self.config.variant, &room_token);

        let options = ConnectOptions {
            client_id: format!("circle-arena-{}", self.local_id),
            broker: self.config.broker.clone(),
            last_will: LastWill {
                topic: topic.clone(),
                payload: encode_remove(&self.local_id),
            },
            keep_alive: self.config.keep_alive,
        };
        let connection = connector.connect(options).await?;
        if let Err(source) = connection.transport.subscribe(&topic) {
            connection.transport.disconnect();
            return Err(JoinError::Subscribe { topic, source });
        }

        self.shared.reset(true);
        let pump = spawn_inbound_pump(Arc::clone(&self.shared), connection.inbound, topic.clone());
        let local = LocalState::spawn(self.local_id.clone(), self.color);
        let world = World::new(self.config.variant, &room_token, SystemTime::now());
        tracing::info!(room = %room_token, topic = %topic, peer_id = %self.local_id, "joined room");

        self.active = Some(ActiveSession {
            session: Session { room_token, topic },
            transport: connection.transport,
            local,
            world,
            policy: PublishPolicy::default(),
            pump,
        });
        Ok(())
    }

    /// Joins a freshly generated room token and returns it.
    pub async fn create_room<C>(&mut self, connector: &C) -> Result<String, JoinError>
    where
        C: Connector<Transport = T>,
    {
        let room_token = generate_room_token();
        self.join(connector, &room_token).await?;
        Ok(room_token)
    }

    /// One simulation frame. Smoothing of remote peers runs in every joined
    /// phase; movement and publishing only while the round is live.
    ///
    /// The registry guard is held for the whole frame so an inbound
    /// `GAME_STOP` cannot end the round between the terminal check and the
    /// publish.
    pub fn tick(&mut self, input: InputIntent, wall: SystemTime, now: Instant) -> TickReport {
        let mut report = TickReport::default();
        let Some(active) = self.active.as_mut() else { return report };

        let smoothing = self.config.variant.smoothing();
        let mut registry = self.shared.registry();
        if self.shared.is_terminal() {
            registry.smooth(smoothing);
            return report;
        }

        active.world.refresh(wall);
        let outcome = active
            .local
            .step(input, active.world.food_mut(), registry.iter());
        registry.smooth(smoothing);
        report.eaten = outcome.eaten;

        if let Some(victim) = &outcome.eliminated {
            active.publish(encode_message(&Message::GameStop));
            if self.shared.enter_terminal() {
                tracing::info!(
                    peer_id = %self.local_id,
                    victim = %victim,
                    size = active.local.size,
                    "eliminated a peer, round over"
                );
            }
            report.stopped_round = true;
            return report;
        }

        if active.policy.should_publish(outcome.changed(), now) {
            active.publish_state(now);
            report.published = true;
        }
        report
    }

    /// Restarts the local player after a round ended. Returns false when
    /// there is no finished round to restart.
    pub fn play_again(&mut self, now: Instant) -> bool {
        let Some(active) = self.active.as_mut() else { return false };
        let registry = self.shared.registry();
        if !self.shared.is_terminal() {
            return false;
        }
        active.local.reset();
        self.shared.clear_terminal();
        active.publish_state(now);
        drop(registry);
        tracing::info!(peer_id = %self.local_id, "playing again");
        true
    }

    /// Graceful leave: announce the departure and close the connection.
    pub fn leave(&mut self) {
        let Some(active) = self.active.take() else { return };
        active.pump.abort();
        active.publish(encode_remove(&self.local_id));
        active.transport.disconnect();
        self.shared.reset(false);
        tracing::info!(room = %active.session.room_token, peer_id = %self.local_id, "left room");
    }

    pub fn frame(&self) -> Option<FrameView> {
        let active = self.active.as_ref()?;
        Some(FrameView {
            session: active.session.clone(),
            phase: self.phase(),
            local: active.local.clone(),
            peers: self.shared.registry().snapshot(),
            food: active.world.food().clone(),
        })
    }

    #[cfg(test)]
    fn active_mut(&mut self) -> Option<&mut ActiveSession<T>> {
        self.active.as_mut()
    }

    #[cfg(test)]
    fn transport(&self) -> Option<&T> {
        self.active.as_ref().map(|active| &active.transport)
    }
}

fn spawn_inbound_pump(
    shared: Arc<SharedView>,
    mut inbound: UnboundedReceiver<InboundMessage>,
    topic: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            if message.topic != topic {
                continue;
            }
            shared.handle_payload(&message.payload);
        }
    })
}
