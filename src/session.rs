use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::error::SessionError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A remote (inbound) media track, as read by the forwarding worker.
///
/// Mirrors `track_handler.rs`'s `RemoteTrackSource`, generalized to a raw
/// byte read instead of a parsed `rtp::packet::Packet`, per spec.md
/// §4.1.4 ("Read up to 1400 bytes ... into a reusable buffer").
#[async_trait]
pub trait RemoteMediaTrack: Send + Sync {
    fn id(&self) -> String;
    fn stream_id(&self) -> String;
    fn kind(&self) -> String;
    fn ssrc(&self) -> u32;
    fn payload_type(&self) -> u8;
    fn codec_capability(&self) -> RTCRtpCodecCapability;

    /// Reads one packet's worth of bytes into `buf`, returning the number
    /// of bytes read. Mirrors pion/webrtc-rs's raw `TrackRemote::read`.
    async fn read(&self, buf: &mut [u8]) -> Result<usize, SessionError>;
}

#[async_trait]
impl RemoteMediaTrack for TrackRemote {
    fn id(&self) -> String {
        TrackRemote::id(self)
    }

    fn stream_id(&self) -> String {
        TrackRemote::stream_id(self)
    }

    fn kind(&self) -> String {
        TrackRemote::kind(self).to_string()
    }

    fn ssrc(&self) -> u32 {
        TrackRemote::ssrc(self)
    }

    fn payload_type(&self) -> u8 {
        TrackRemote::payload_type(self)
    }

    fn codec_capability(&self) -> RTCRtpCodecCapability {
        self.codec().capability.clone()
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let (n, _attributes) = TrackRemote::read(self, buf).await?;
        Ok(n)
    }
}

/// A locally-owned forwarding track, as stored in `TrackListener::localTracks`
/// and keyed in `senderByTrack`. `id()` must be stable for the track's
/// lifetime; it is the only thing the listener uses to resolve a sender on
/// `RemoveTrack`.
#[async_trait]
pub trait LocalMediaTrack: Send + Sync + Clone + 'static {
    fn id(&self) -> String;

    /// Writes `buf` (a single raw RTP packet) to the track. A "no
    /// subscribers yet" condition is reported as `Ok` with
    /// `is_closed_pipe` distinguishing it from a genuine write; callers
    /// use that to decide whether the error is benign (spec.md §4.1.4).
    async fn write(&self, buf: &[u8]) -> Result<usize, SessionError>;
}

/// True when `err` is webrtc-rs's "closed pipe / no subscribers" error,
/// the one benign write failure the forwarding worker must ignore.
pub fn is_closed_pipe(err: &SessionError) -> bool {
    matches!(
        err.downcast_ref::<webrtc::Error>(),
        Some(webrtc::Error::ErrClosedPipe)
    )
}

#[async_trait]
impl LocalMediaTrack for Arc<TrackLocalStaticRTP> {
    fn id(&self) -> String {
        TrackLocal::id(self.as_ref()).to_string()
    }

    async fn write(&self, buf: &[u8]) -> Result<usize, SessionError> {
        use webrtc::track::track_local::TrackLocalWriter;
        TrackLocalWriter::write(self.as_ref(), buf)
            .await
            .map_err(SessionError::from)
    }
}

/// Callback registered with a `PeerSession` at `TrackListener` construction
/// time; invoked once per new inbound remote track (spec.md §4.1.2).
pub type OnTrackHandler<R> = Box<dyn Fn(Arc<R>) -> BoxFuture<'static, ()> + Send + Sync>;

/// The WebRTC session abstraction a `TrackListener` attaches to
/// (spec.md §6). Associated types let production code plug in real
/// `webrtc-rs` handles and let tests plug in an in-memory fake without
/// either side paying for dynamic dispatch (see DESIGN.md: "Dynamic
/// dispatch into the session").
#[async_trait]
pub trait PeerSession: Send + Sync + 'static {
    type RemoteTrack: RemoteMediaTrack + 'static;
    type LocalTrack: LocalMediaTrack;
    type Sender: Send + Sync + 'static;

    /// Registers the inbound-track handler. Called exactly once, during
    /// `TrackListener` construction; must not block.
    fn on_track(&self, handler: OnTrackHandler<Self::RemoteTrack>);

    /// Constructs a locally-owned forwarding track with the given codec
    /// parameters.
    async fn new_track(
        &self,
        payload_type: u8,
        ssrc: u32,
        id: String,
        label: String,
    ) -> Result<Self::LocalTrack, SessionError>;

    /// Attaches `track` to this session as a send-only stream, returning a
    /// handle used later to detach it.
    async fn add_track(&self, track: Self::LocalTrack) -> Result<Self::Sender, SessionError>;

    /// Detaches a previously attached track.
    async fn remove_track(&self, sender: Self::Sender) -> Result<(), SessionError>;

    /// Writes a Picture Loss Indication for `ssrc` upstream to the
    /// publisher.
    async fn send_pli(&self, ssrc: u32) -> Result<(), SessionError>;
}

/// Production `PeerSession`, wrapping a live `RTCPeerConnection`.
///
/// Grounded on `track_handler.rs::attach_track_handler` (the `on_track`
/// registration) and `broadcaster.rs::request_keyframe` (the PLI write).
///
/// `PeerSession::new_track` takes only `(payload_type, ssrc, id, label)`,
/// per spec.md §6 — no codec capability. The remote `TrackRemote` handed
/// to `on_track` carries one, though, so `on_track` records it here keyed
/// by SSRC before invoking the caller's handler; `new_track` then looks it
/// up instead of constructing a codec-less local track.
pub struct WebrtcSession {
    pc: Arc<RTCPeerConnection>,
    codec_capabilities: Arc<Mutex<HashMap<u32, RTCRtpCodecCapability>>>,
}

impl WebrtcSession {
    pub fn new(pc: Arc<RTCPeerConnection>) -> Self {
        WebrtcSession {
            pc,
            codec_capabilities: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl PeerSession for WebrtcSession {
    type RemoteTrack = TrackRemote;
    type LocalTrack = Arc<TrackLocalStaticRTP>;
    type Sender = Arc<RTCRtpSender>;

    fn on_track(&self, handler: OnTrackHandler<Self::RemoteTrack>) {
        let capabilities = self.codec_capabilities.clone();
        let handler = Arc::new(handler);
        self.pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let handler = handler.clone();
            let capabilities = capabilities.clone();
            Box::pin(async move {
                capabilities
                    .lock()
                    .await
                    .insert(RemoteMediaTrack::ssrc(track.as_ref()), track.codec().capability.clone());
                (handler)(track).await;
            })
        }));
    }

    async fn new_track(
        &self,
        payload_type: u8,
        ssrc: u32,
        id: String,
        label: String,
    ) -> Result<Self::LocalTrack, SessionError> {
        let _ = payload_type;
        // TrackLocalStaticRTP negotiates its own payload type during
        // renegotiation; webrtc-rs does not take it as a constructor arg.
        let capability = self
            .codec_capabilities
            .lock()
            .await
            .get(&ssrc)
            .cloned()
            .unwrap_or_default();

        Ok(Arc::new(TrackLocalStaticRTP::new(capability, id, label)))
    }

    async fn add_track(&self, track: Self::LocalTrack) -> Result<Self::Sender, SessionError> {
        self.pc
            .add_track(track as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(SessionError::from)
    }

    async fn remove_track(&self, sender: Self::Sender) -> Result<(), SessionError> {
        self.pc.remove_track(&sender).await.map_err(SessionError::from)
    }

    async fn send_pli(&self, ssrc: u32) -> Result<(), SessionError> {
        let pli = PictureLossIndication {
            sender_ssrc: 0,
            media_ssrc: ssrc,
        };
        self.pc
            .write_rtcp(&[Box::new(pli)])
            .await
            .map_err(SessionError::from)
    }
}
