use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify, RwLock};

use crate::config::ListenerConfig;
use crate::error::ListenerError;
use crate::event::TrackEvent;
use crate::id::{base62_uuid, ClientId};
use crate::logging::{Logger, LoggerFactory};
use crate::metrics;
use crate::session::{is_closed_pipe, LocalMediaTrack, OnTrackHandler, PeerSession, RemoteMediaTrack};

/// Channel capacity for `events`. True rendezvous (capacity 0) is not
/// expressible with `tokio::sync::mpsc`; capacity 1 is the closest
/// approximation, documented in SPEC_FULL.md §9.
const EVENTS_CHANNEL_CAPACITY: usize = 1;

/// Owns one peer's media session: ingests inbound remote tracks,
/// republishes each as a locally-owned forwarding track, drives PLI
/// feedback to the publisher, and announces lifecycle events on
/// [`TrackListener::events`].
///
/// `S` is the `PeerSession` this listener is attached to; swapping it for
/// the `testing` feature's fake session lets unit tests drive `on_track`
/// and inspect forwarded bytes without a live ICE/DTLS handshake.
pub struct TrackListener<S: PeerSession> {
    client_id: ClientId,
    session: Arc<S>,
    config: ListenerConfig,
    logger: Arc<dyn Logger>,

    local_tracks: RwLock<Vec<S::LocalTrack>>,
    sender_by_track: RwLock<HashMap<String, S::Sender>>,

    // `Close` takes this `Option`, dropping the sender, which is how the
    // "close vs emit race" design flag is resolved (SPEC_FULL.md §9,
    // option (a)): there is no second close of an already-closed channel,
    // only an emitter racing a `select!` against `close_notify`.
    events_tx: RwLock<Option<mpsc::Sender<TrackEvent<S::LocalTrack>>>>,
    events_rx: tokio::sync::Mutex<Option<mpsc::Receiver<TrackEvent<S::LocalTrack>>>>,

    closed: AtomicBool,
    close_notify: Notify,
}

impl<S: PeerSession> TrackListener<S> {
    /// Registers the inbound-track handler on `session` and returns a new
    /// listener with default tunables. Must not block; no I/O happens here.
    pub fn new(logger_factory: &dyn LoggerFactory, client_id: ClientId, session: Arc<S>) -> Arc<Self> {
        Self::with_config(logger_factory, client_id, session, ListenerConfig::default())
    }

    pub fn with_config(
        logger_factory: &dyn LoggerFactory,
        client_id: ClientId,
        session: Arc<S>,
        config: ListenerConfig,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(EVENTS_CHANNEL_CAPACITY);

        let listener = Arc::new(TrackListener {
            client_id,
            session: session.clone(),
            config,
            logger: logger_factory.get_logger("peer"),
            local_tracks: RwLock::new(Vec::new()),
            sender_by_track: RwLock::new(HashMap::new()),
            events_tx: RwLock::new(Some(tx)),
            events_rx: tokio::sync::Mutex::new(Some(rx)),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        });

        let handler_listener = listener.clone();
        let handler: OnTrackHandler<S::RemoteTrack> = Box::new(move |remote_track| {
            let listener = handler_listener.clone();
            Box::pin(async move {
                listener.handle_new_track(remote_track).await;
            })
        });
        session.on_track(handler);

        listener
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Takes ownership of the receive half of `events`. Returns `None` if
    /// already taken; a `TrackListener` has exactly one consumer.
    pub async fn events(&self) -> Option<mpsc::Receiver<TrackEvent<S::LocalTrack>>> {
        self.events_rx.lock().await.take()
    }

    /// A defensive snapshot of the live local-track list (SPEC_FULL.md §9:
    /// `Tracks()` must not alias the live, appendable vector).
    pub async fn tracks(&self) -> Vec<S::LocalTrack> {
        self.local_tracks.read().await.clone()
    }

    /// Attaches `track` to the session as a send-only stream and records
    /// its sender. Duplicate attach of the same track identity is the
    /// caller's responsibility to avoid; it is not guarded against here.
    pub async fn add_track(&self, track: S::LocalTrack) -> Result<(), ListenerError> {
        let sender = self
            .session
            .add_track(track.clone())
            .await
            .map_err(ListenerError::AttachFailed)?;

        self.sender_by_track.write().await.insert(track.id(), sender);
        Ok(())
    }

    /// Detaches a previously-attached track, removing its sender mapping.
    pub async fn remove_track(&self, track: &S::LocalTrack) -> Result<(), ListenerError> {
        let sender = {
            let mut map = self.sender_by_track.write().await;
            map.remove(&track.id())
        };

        let sender = sender.ok_or(ListenerError::UnknownTrack)?;

        self.session
            .remove_track(sender)
            .await
            .map_err(ListenerError::DetachFailed)
    }

    /// Idempotent teardown: signals `close_notify`, takes (and drops) the
    /// events sender, and marks the listener closed. Safe to call any
    /// number of times; only the first call has an effect.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.close_notify.notify_waiters();
        self.events_tx.write().await.take();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Emits `event`, racing a `select!` against the close signal instead
    /// of pre-checking `closed` and sending separately — closing the gap
    /// the source's "check-then-send" race left open (SPEC_FULL.md §9).
    /// Drops the event if the listener closes first.
    async fn emit(&self, event: TrackEvent<S::LocalTrack>) {
        let tx = { self.events_tx.read().await.clone() };
        let Some(tx) = tx else {
            metrics::TRACK_EVENTS_DROPPED_TOTAL.inc();
            return;
        };

        let kind_label = if event.is_add() { "add" } else { "remove" };
        let notified = self.close_notify.notified();
        tokio::select! {
            result = tx.send(event) => {
                if result.is_ok() {
                    metrics::TRACK_EVENTS_TOTAL.with_label_values(&[kind_label]).inc();
                } else {
                    metrics::TRACK_EVENTS_DROPPED_TOTAL.inc();
                }
            }
            _ = notified => {
                metrics::TRACK_EVENTS_DROPPED_TOTAL.inc();
            }
        }
    }

    async fn handle_new_track(self: Arc<Self>, remote_track: Arc<S::RemoteTrack>) {
        let remote_id = remote_track.id();
        let remote_label = remote_track.stream_id();
        let payload_type = remote_track.payload_type();
        let ssrc = remote_track.ssrc();
        let kind = remote_track.kind();

        let remote_id = if remote_id.is_empty() { base62_uuid() } else { remote_id };
        let remote_label = if remote_label.is_empty() { base62_uuid() } else { remote_label };

        let local_id = format!("sfu_{remote_id}");
        let local_label = format!("sfu_{}_{remote_label}", self.client_id);

        self.logger
            .info(&format!("received {kind} track from publisher, local_id={local_id}"));

        let local_track = match self
            .session
            .new_track(payload_type, ssrc, local_id.clone(), local_label)
            .await
        {
            Ok(track) => track,
            Err(err) => {
                self.logger
                    .error(&format!("failed to create local track for {local_id}: {err}"));
                return;
            }
        };

        self.local_tracks.write().await.push(local_track.clone());

        self.emit(TrackEvent::add(self.client_id.clone(), local_track.clone()))
            .await;

        let stop_notify = Arc::new(Notify::new());

        tokio::spawn(Self::run_pli_worker(
            self.session.clone(),
            ssrc,
            self.config.pli_interval,
            self.logger.clone(),
            stop_notify.clone(),
            self.clone(),
        ));

        tokio::spawn(Self::run_forwarding_worker(
            self.clone(),
            remote_track,
            local_track,
            self.config.mtu_bytes,
            stop_notify,
        ));
    }

    async fn run_pli_worker(
        session: Arc<S>,
        ssrc: u32,
        interval: std::time::Duration,
        logger: Arc<dyn Logger>,
        stop: Arc<Notify>,
        listener: Arc<Self>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; PLI must go out at t=0 (spec §4.1.3).
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = session.send_pli(ssrc).await {
                        logger.warn(&format!("PLI write failed for ssrc={ssrc}: {err}"));
                    } else {
                        metrics::KEYFRAMES_REQUESTED_TOTAL.inc();
                    }
                }
                _ = stop.notified() => return,
                _ = listener.close_notify.notified() => return,
            }
        }
    }

    async fn run_forwarding_worker(
        self: Arc<Self>,
        remote_track: Arc<S::RemoteTrack>,
        local_track: S::LocalTrack,
        mtu_bytes: usize,
        stop: Arc<Notify>,
    ) {
        let mut buf = vec![0u8; mtu_bytes];

        loop {
            let n = tokio::select! {
                result = remote_track.read(&mut buf) => match result {
                    Ok(n) => n,
                    Err(err) => {
                        self.logger
                            .warn(&format!("remote track read failed, stopping forward: {err}"));
                        break;
                    }
                },
                _ = stop.notified() => break,
                _ = self.close_notify.notified() => break,
            };

            match local_track.write(&buf[..n]).await {
                Ok(_) => {
                    metrics::TRACKS_FORWARDED_TOTAL
                        .with_label_values(&[&remote_track.kind()])
                        .inc();
                }
                Err(err) if is_closed_pipe(&err) => {
                    metrics::PACKETS_DROPPED_TOTAL.with_label_values(&["closed_pipe"]).inc();
                }
                Err(err) => {
                    self.logger
                        .error(&format!("local track write failed, stopping forward: {err}"));
                    metrics::PACKETS_DROPPED_TOTAL.with_label_values(&["write_failed"]).inc();
                    break;
                }
            }
        }

        stop.notify_waiters();

        if !self.is_closed() {
            self.emit(TrackEvent::remove(self.client_id.clone(), local_track))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::TracingLoggerFactory;
    use crate::testing::{FakeLocalTrack, FakeRemoteTrack, FakeSession};

    fn factory() -> TracingLoggerFactory {
        TracingLoggerFactory
    }

    #[tokio::test]
    async fn test_inbound_track_emits_add_event() {
        let session = Arc::new(FakeSession::new());
        let listener = TrackListener::new(&factory(), ClientId::from("pub1"), session.clone());
        let mut events = listener.events().await.unwrap();

        session
            .push_remote_track(FakeRemoteTrack::new("vid", "stream-A", 96, 12345, "video"))
            .await;

        let event = events.recv().await.expect("expected an Add event");
        assert!(event.is_add());
        assert_eq!(event.client_id.as_ref(), "pub1");
        assert_eq!(event.track.id(), "sfu_vid");
    }

    #[tokio::test]
    async fn test_missing_ids_get_synthesised() {
        let session = Arc::new(FakeSession::new());
        let listener = TrackListener::new(&factory(), ClientId::from("pub1"), session.clone());
        let mut events = listener.events().await.unwrap();

        session
            .push_remote_track(FakeRemoteTrack::new("", "", 96, 1, "video"))
            .await;

        let event = events.recv().await.unwrap();
        let local_id = event.track.id();
        assert!(local_id.starts_with("sfu_"));
        assert!(local_id.len() > "sfu_".len());
    }

    #[tokio::test]
    async fn test_add_remove_cycle() {
        let session = Arc::new(FakeSession::new());
        let listener = TrackListener::new(&factory(), ClientId::from("pub1"), session.clone());
        let track = FakeLocalTrack::new("t1");

        listener.add_track(track.clone()).await.unwrap();
        listener.remove_track(&track).await.unwrap();

        let err = listener.remove_track(&track).await.unwrap_err();
        assert!(matches!(err, ListenerError::UnknownTrack));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let session = Arc::new(FakeSession::new());
        let listener = TrackListener::new(&factory(), ClientId::from("pub1"), session.clone());
        listener.close().await;
        listener.close().await;
        listener.close().await;
    }

    #[tokio::test]
    async fn test_no_events_after_close() {
        let session = Arc::new(FakeSession::new());
        let listener = TrackListener::new(&factory(), ClientId::from("pub1"), session.clone());
        let mut events = listener.events().await.unwrap();

        listener.close().await;

        session
            .push_remote_track(FakeRemoteTrack::new("vid", "stream-A", 96, 1, "video"))
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forwarding_worker_stops_on_close_without_read_error() {
        let session = Arc::new(FakeSession::new());
        let listener = TrackListener::new(&factory(), ClientId::from("pub1"), session.clone());
        let mut events = listener.events().await.unwrap();

        let remote = FakeRemoteTrack::new("vid", "stream-A", 96, 12345, "video");
        let packet_tx = remote.sender();
        session.push_remote_track(remote).await;

        let add = events.recv().await.unwrap();
        let local_track = add.track.clone();

        // The remote channel stays open (no read error); the forwarding
        // worker must still stop once `Close` fires.
        listener.close().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let _ = packet_tx.send(vec![9, 9, 9]).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(local_track.written_packets().await.is_empty());
    }
}
