use crate::id::ClientId;

/// Whether a `TrackEvent` announces a new local track or the end of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEventKind {
    Add,
    Remove,
}

/// An add-or-remove announcement delivered to the Router when a local
/// forwarding track begins or ends its life (spec.md §3).
///
/// `S::LocalTrack` is whatever handle the concrete `PeerSession`
/// implementation uses for its locally-owned tracks (a real
/// `Arc<TrackLocalStaticRTP>` in production, an in-memory stand-in under
/// the `testing` feature).
#[derive(Debug, Clone)]
pub struct TrackEvent<T> {
    pub client_id: ClientId,
    pub track: T,
    pub kind: TrackEventKind,
}

impl<T> TrackEvent<T> {
    pub fn add(client_id: ClientId, track: T) -> Self {
        TrackEvent {
            client_id,
            track,
            kind: TrackEventKind::Add,
        }
    }

    pub fn remove(client_id: ClientId, track: T) -> Self {
        TrackEvent {
            client_id,
            track,
            kind: TrackEventKind::Remove,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self.kind, TrackEventKind::Add)
    }

    pub fn is_remove(&self) -> bool {
        matches!(self.kind, TrackEventKind::Remove)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_event_kind() {
        let ev = TrackEvent::add(ClientId::from("pub1"), "track-handle");
        assert!(ev.is_add());
        assert!(!ev.is_remove());
        assert_eq!(ev.client_id.as_ref(), "pub1");
    }

    #[test]
    fn test_remove_event_kind() {
        let ev = TrackEvent::remove(ClientId::from("pub1"), "track-handle");
        assert!(ev.is_remove());
        assert!(!ev.is_add());
    }
}
