//! In-memory `PeerSession`/`RemoteMediaTrack` fakes for unit tests and
//! benchmarks, enabled by the `testing` feature (always on under `cfg(test)`).
//! Mirrors the teacher's own `MockTrack` pattern in `track_handler.rs`'s test
//! module, generalized from a single mock type to a full fake session so
//! `TrackListener` can be driven end-to-end without a live ICE/DTLS session.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

use crate::error::SessionError;
use crate::session::{is_closed_pipe, LocalMediaTrack, OnTrackHandler, PeerSession, RemoteMediaTrack};

/// A remote track whose packets are fed in by the test via [`push_packet`].
pub struct FakeRemoteTrack {
    id: String,
    stream_id: String,
    payload_type: u8,
    ssrc: u32,
    kind: String,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    tx: mpsc::Sender<Vec<u8>>,
}

impl FakeRemoteTrack {
    pub fn new(id: &str, stream_id: &str, payload_type: u8, ssrc: u32, kind: &str) -> Self {
        let (tx, rx) = mpsc::channel(64);
        FakeRemoteTrack {
            id: id.to_string(),
            stream_id: stream_id.to_string(),
            payload_type,
            ssrc,
            kind: kind.to_string(),
            rx: Mutex::new(rx),
            tx,
        }
    }

    /// Feeds one packet to the next `read` call. Closing the listener's
    /// fake equivalent of EOF is done by dropping every sender clone.
    pub async fn push_packet(&self, bytes: Vec<u8>) {
        let _ = self.tx.send(bytes).await;
    }

    pub fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.tx.clone()
    }
}

#[async_trait]
impl RemoteMediaTrack for FakeRemoteTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn stream_id(&self) -> String {
        self.stream_id.clone()
    }

    fn kind(&self) -> String {
        self.kind.clone()
    }

    fn ssrc(&self) -> u32 {
        self.ssrc
    }

    fn payload_type(&self) -> u8 {
        self.payload_type
    }

    fn codec_capability(&self) -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: format!("{}/fake", self.kind),
            ..Default::default()
        }
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            None => Err(SessionError::msg("fake remote track closed")),
        }
    }
}

/// A locally-owned forwarding track whose written bytes are recorded for
/// test assertions.
#[derive(Clone)]
pub struct FakeLocalTrack {
    id: Arc<str>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    closed_pipe: Arc<AtomicBool>,
}

impl FakeLocalTrack {
    pub fn new(id: &str) -> Self {
        FakeLocalTrack {
            id: Arc::from(id),
            written: Arc::new(Mutex::new(Vec::new())),
            closed_pipe: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes subsequent writes report the benign "no subscribers" error,
    /// for exercising the closed-pipe tolerance path.
    pub fn simulate_no_subscribers(&self) {
        self.closed_pipe.store(true, Ordering::SeqCst);
    }

    pub async fn written_packets(&self) -> Vec<Vec<u8>> {
        self.written.lock().await.clone()
    }
}

#[async_trait]
impl LocalMediaTrack for FakeLocalTrack {
    fn id(&self) -> String {
        self.id.to_string()
    }

    async fn write(&self, buf: &[u8]) -> Result<usize, SessionError> {
        if self.closed_pipe.load(Ordering::SeqCst) {
            return Err(SessionError::new(webrtc::Error::ErrClosedPipe));
        }
        self.written.lock().await.push(buf.to_vec());
        Ok(buf.len())
    }
}

/// An opaque handle standing in for `Arc<RTCRtpSender>` in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeSender(u64);

/// In-memory `PeerSession` used by `TrackListener`'s unit tests and by
/// `benches/track_listener_benchmarks.rs`.
pub struct FakeSession {
    handler: Mutex<Option<OnTrackHandler<FakeRemoteTrack>>>,
    next_sender_id: AtomicU32,
    pli_calls: AtomicU32,
    fail_pli: AtomicBool,
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSession {
    pub fn new() -> Self {
        FakeSession {
            handler: Mutex::new(None),
            next_sender_id: AtomicU32::new(0),
            pli_calls: AtomicU32::new(0),
            fail_pli: AtomicBool::new(false),
        }
    }

    /// Makes every subsequent `send_pli` call fail, for exercising
    /// scenario 5 (RTCP failure tolerance).
    pub fn fail_pli_writes(&self) {
        self.fail_pli.store(true, Ordering::SeqCst);
    }

    pub fn pli_call_count(&self) -> u32 {
        self.pli_calls.load(Ordering::SeqCst)
    }

    /// Invokes the registered `on_track` handler, simulating the session
    /// delivering a new inbound remote track.
    pub async fn push_remote_track(&self, track: FakeRemoteTrack) {
        let handler = self.handler.lock().await;
        if let Some(handler) = handler.as_ref() {
            (handler)(Arc::new(track)).await;
        }
    }
}

#[async_trait]
impl PeerSession for FakeSession {
    type RemoteTrack = FakeRemoteTrack;
    type LocalTrack = FakeLocalTrack;
    type Sender = FakeSender;

    fn on_track(&self, handler: OnTrackHandler<Self::RemoteTrack>) {
        // `on_track` is documented as non-blocking; a `try_lock` here
        // would panic under real contention, but construction is the only
        // caller and happens before the session can be shared.
        if let Ok(mut slot) = self.handler.try_lock() {
            *slot = Some(handler);
        }
    }

    async fn new_track(
        &self,
        _payload_type: u8,
        _ssrc: u32,
        id: String,
        _label: String,
    ) -> Result<Self::LocalTrack, SessionError> {
        Ok(FakeLocalTrack::new(&id))
    }

    async fn add_track(&self, _track: Self::LocalTrack) -> Result<Self::Sender, SessionError> {
        let id = self.next_sender_id.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(FakeSender(id))
    }

    async fn remove_track(&self, _sender: Self::Sender) -> Result<(), SessionError> {
        Ok(())
    }

    async fn send_pli(&self, _ssrc: u32) -> Result<(), SessionError> {
        self.pli_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pli.load(Ordering::SeqCst) {
            return Err(SessionError::msg("simulated RTCP write failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_remote_track_roundtrip() {
        let track = FakeRemoteTrack::new("vid", "stream-A", 96, 12345, "video");
        track.push_packet(vec![1, 2, 3]).await;
        let mut buf = vec![0u8; 16];
        let n = RemoteMediaTrack::read(&track, &mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fake_local_track_records_writes() {
        let track = FakeLocalTrack::new("t1");
        track.write(&[1, 2, 3]).await.unwrap();
        track.write(&[4, 5]).await.unwrap();
        let written = track.written_packets().await;
        assert_eq!(written, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[tokio::test]
    async fn test_fake_local_track_closed_pipe_is_recognised() {
        let track = FakeLocalTrack::new("t1");
        track.simulate_no_subscribers();
        let err = track.write(&[1]).await.unwrap_err();
        assert!(is_closed_pipe(&err));
    }

    #[tokio::test]
    async fn test_fake_session_pli_failure_is_tolerated() {
        let session = FakeSession::new();
        session.fail_pli_writes();
        assert!(session.send_pli(1).await.is_err());
        assert_eq!(session.pli_call_count(), 1);
    }
}
