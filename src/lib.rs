pub mod config;
pub mod error;
pub mod event;
pub mod id;
pub mod logging;
pub mod metrics;
pub mod session;
pub mod track_listener;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ConfigError, ListenerConfig};
pub use error::{ListenerError, SessionError};
pub use event::{TrackEvent, TrackEventKind};
pub use id::{base62_uuid, ClientId};
pub use logging::{Logger, LoggerFactory, TracingLoggerFactory};
pub use session::{LocalMediaTrack, OnTrackHandler, PeerSession, RemoteMediaTrack, WebrtcSession};
pub use track_listener::TrackListener;
