use std::fmt;

/// Failure carried up from the `PeerSession` collaborator.
///
/// Kept as an open `anyhow::Error` rather than a closed enum: the session
/// is a trait boundary and the listener never needs to branch on *which*
/// underlying webrtc failure occurred, only that attach/detach/RTCP-write
/// failed (mirrors `track_handler.rs`'s `RemoteTrackSource` returning
/// `anyhow::Result`).
pub type SessionError = anyhow::Error;

/// Errors surfaced to callers of `TrackListener`'s public operations.
///
/// Contract/configuration errors in the sense of spec.md §7 category 1:
/// the listener remains fully operational after any of these.
#[derive(Debug)]
pub enum ListenerError {
    /// `add_track` failed because the session refused attachment.
    AttachFailed(SessionError),
    /// `remove_track` failed because the session refused detachment.
    DetachFailed(SessionError),
    /// `remove_track` was called for a track with no recorded sender.
    UnknownTrack,
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerError::AttachFailed(e) => write!(f, "failed to attach track to session: {e}"),
            ListenerError::DetachFailed(e) => write!(f, "failed to detach track from session: {e}"),
            ListenerError::UnknownTrack => write!(f, "no sender recorded for this track"),
        }
    }
}

impl std::error::Error for ListenerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListenerError::AttachFailed(e) => Some(e.as_ref()),
            ListenerError::DetachFailed(e) => Some(e.as_ref()),
            ListenerError::UnknownTrack => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_track_display() {
        let err = ListenerError::UnknownTrack;
        assert_eq!(err.to_string(), "no sender recorded for this track");
    }

    #[test]
    fn test_attach_failed_display_wraps_source() {
        let err = ListenerError::AttachFailed(anyhow::anyhow!("dtls torn down"));
        assert!(err.to_string().contains("dtls torn down"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
