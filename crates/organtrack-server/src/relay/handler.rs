use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use organtrack_engine::{PositionResult, Undeterminable};
use organtrack_protocol::codec::{parse_control, to_payload, WireCodec};
use organtrack_protocol::{ControlMessage, Role, ServerMessage};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::relay::arbiter::HostStatus;
use crate::relay::outbox::{outbox, Outbox, OUTBOUND_CAPACITY};
use crate::relay::registry::{Registered, Registration};
use crate::relay::worker::{process_frame, FrameOutcome};
use crate::state::AppState;

type FrameReader = FramedRead<OwnedReadHalf, WireCodec>;

/// Run one peer connection until it closes, errors, is evicted or the server
/// shuts down.
///
/// Each tick reads one control frame and one image frame, then registers the
/// sender, evicts idle sessions, checks the Host count and, on the Host's own
/// connection, processes the image and forwards its transform to Guests.
pub async fn handle_connection(
    stream: TcpStream,
    remote: SocketAddr,
    state: AppState,
    closer: CancellationToken,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(%remote, error = %e, "Failed to set TCP_NODELAY");
    }

    let max_frame_length = state.settings.server.max_frame_length;
    let (reader, writer) = stream.into_split();
    let mut frames = FramedRead::new(reader, WireCodec::new(max_frame_length));
    let mut sink = FramedWrite::new(writer, WireCodec::new(max_frame_length));

    // Bounded replies plus a latest-only transform slot
    let (tx, mut inbox) = outbox(OUTBOUND_CAPACITY);

    // Spawn task to forward messages from channel to the socket
    let writer_closer = closer.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = writer_closer.cancelled() => break,
                message = inbox.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let payload = match to_payload(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(payload).await {
                tracing::debug!(%remote, error = %e, "Write failed");
                break;
            }
        }
    });

    let mut connection = Connection {
        id: Uuid::new_v4(),
        remote,
        session: None,
        organ: state.settings.position.default_organ.clone(),
        rejected_organ: None,
        tx,
        closer: closer.clone(),
    };
    tracing::info!(%remote, connection_id = %connection.id, "Connection opened");

    let tick_interval = state.settings.server.tick_interval();
    loop {
        let Some(control) = next_frame(&mut frames, &closer, remote).await else {
            break;
        };
        let Some(image) = next_frame(&mut frames, &closer, remote).await else {
            break;
        };

        connection.tick(&state, control, image).await;

        tokio::select! {
            _ = closer.cancelled() => break,
            _ = tokio::time::sleep(tick_interval) => {}
        }
    }

    // Cleanup on disconnect
    if let Some(id) = &connection.session {
        state.registry.release(id, connection.id).await;
    }
    state.arbiter.check(&state.registry).await;

    closer.cancel();
    let _ = send_task.await;

    tracing::info!(%remote, connection_id = %connection.id, "Connection closed");
}

/// Next frame of the lockstep stream, or `None` once the connection is done
async fn next_frame(
    frames: &mut FrameReader,
    closer: &CancellationToken,
    remote: SocketAddr,
) -> Option<BytesMut> {
    tokio::select! {
        _ = closer.cancelled() => None,
        next = frames.next() => match next {
            Some(Ok(frame)) => Some(frame),
            Some(Err(e)) => {
                tracing::warn!(%remote, error = %e, "Connection error");
                None
            }
            None => None,
        },
    }
}

/// State one connection carries from tick to tick
struct Connection {
    id: Uuid,
    remote: SocketAddr,
    /// Session most recently registered through this connection
    session: Option<String>,
    organ: String,
    rejected_organ: Option<String>,
    tx: Outbox,
    closer: CancellationToken,
}

impl Connection {
    async fn tick(&mut self, state: &AppState, control: BytesMut, image: BytesMut) {
        let message = match parse_control(&control) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(remote = %self.remote, error = %e, "Skipping undecodable control message");
                None
            }
        };

        if let Some(message) = &message {
            self.register(state, message).await;
        }

        state
            .registry
            .evict_stale(state.settings.server.session_ttl())
            .await;

        if state.arbiter.check(&state.registry).await != HostStatus::Single {
            return;
        }
        if !self.owns_host(state).await {
            return;
        }

        if let Some(message) = message.as_ref().filter(|m| m.has_transform()) {
            self.forward_transform(state, message).await;
        }
        if !image.is_empty() {
            self.process(state, image.freeze()).await;
        }
    }

    async fn register(&mut self, state: &AppState, message: &ControlMessage) {
        if message.uuid.is_empty() {
            tracing::debug!(remote = %self.remote, "Control message without uuid");
            return;
        }

        // A connection that switches identity gives up its previous session
        if let Some(previous) = self.session.as_deref().filter(|id| *id != message.uuid) {
            state.registry.release(previous, self.id).await;
        }

        let outcome = state
            .registry
            .register(Registration {
                id: message.uuid.clone(),
                role: message.role,
                remote: self.remote,
                connection_id: self.id,
                sender: self.tx.clone(),
                closer: self.closer.clone(),
            })
            .await;
        self.session = Some(message.uuid.clone());

        // Guests joining late start from the latest Host transform
        if outcome != Registered::Refreshed {
            let is_guest = state
                .registry
                .get(&message.uuid)
                .await
                .is_some_and(|entry| entry.role == Role::Guest);
            if is_guest {
                if let Some(transform) = state.transforms.latest().await {
                    self.send(transform);
                }
            }
        }

        if let Some(selector) = message.organ_selector() {
            self.select_organ(state, selector);
        }
    }

    fn select_organ(&mut self, state: &AppState, selector: &str) {
        let organ = selector.to_lowercase();
        if organ == self.organ {
            return;
        }

        if state.engine.supports(&organ) {
            tracing::info!(session_id = ?self.session, %organ, "Tracking organ");
            self.organ = organ;
            self.rejected_organ = None;
        } else if self.rejected_organ.as_deref() != Some(organ.as_str()) {
            tracing::warn!(session_id = ?self.session, %organ, "Unsupported organ requested");
            self.send(ServerMessage::Error {
                message: format!("unsupported organ `{}`", organ),
            });
            self.rejected_organ = Some(organ);
        }
    }

    /// Whether this connection holds the registered Host session
    async fn owns_host(&self, state: &AppState) -> bool {
        let Some(id) = &self.session else {
            return false;
        };
        state
            .registry
            .get(id)
            .await
            .is_some_and(|entry| entry.role == Role::Host && entry.connection_id == self.id)
    }

    async fn forward_transform(&self, state: &AppState, message: &ControlMessage) {
        let transform = ServerMessage::Transform {
            uuid: message.uuid.clone(),
            position: message.position,
            rotation: message.rotation,
        };
        state.transforms.store(transform.clone()).await;

        let guests = state.registry.broadcast_to_role(Role::Guest, &transform).await;
        tracing::debug!(guests, "Forwarded Host transform");
    }

    async fn process(&self, state: &AppState, image: Bytes) {
        let started = Instant::now();
        let engine = state.engine.clone();
        let detector = state.detector.clone();
        let organ = self.organ.clone();

        let outcome = state
            .pool
            .run(move || process_frame(&engine, detector.as_ref(), &image, &organ))
            .await;

        match outcome {
            Ok(FrameOutcome::Computed {
                size,
                result,
                gesture,
            }) => {
                tracing::debug!(width = size.width, height = size.height, "Frame computed");
                self.deliver(state, result);
                if let Some(gesture) = gesture {
                    self.send(ServerMessage::Gesture { gesture });
                }
            }
            Ok(FrameOutcome::NoSubject) => {
                tracing::debug!(remote = %self.remote, "No subject detected");
            }
            Ok(FrameOutcome::Undecodable(reason)) => {
                tracing::debug!(remote = %self.remote, %reason, "Skipping undecodable image");
            }
            Err(e) => {
                tracing::error!(remote = %self.remote, error = %e, "Frame processing failed");
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(organ = %self.organ, elapsed_ms, "Frame processed");
    }

    fn deliver(&self, state: &AppState, result: PositionResult) {
        let message = match result {
            PositionResult::Target(point) => ServerMessage::Position(point),
            PositionResult::Pixel(point) => ServerMessage::PixelPosition(point),
            PositionResult::Body(landmarks) => ServerMessage::Body { landmarks },
            PositionResult::OutOfRange(distance) => {
                tracing::info!(organ = %self.organ, distance, "Subject outside calibrated range");
                ServerMessage::Advisory {
                    message: state.engine.settings().out_of_range_advisory.clone(),
                    distance,
                }
            }
            PositionResult::Undeterminable(reason @ Undeterminable::UnknownAspectRatio { .. }) => {
                tracing::warn!(organ = %self.organ, %reason, "Position undeterminable");
                return;
            }
            PositionResult::Undeterminable(reason) => {
                tracing::debug!(organ = %self.organ, %reason, "Position undeterminable");
                return;
            }
        };
        self.send(message);
    }

    fn send(&self, message: ServerMessage) {
        if let Err(e) = self.tx.send(message) {
            tracing::debug!(remote = %self.remote, error = %e, "Dropped outbound message");
        }
    }
}
