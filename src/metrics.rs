use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};

lazy_static! {
    pub static ref TRACKS_FORWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tracklistener_packets_forwarded_total",
        "Total number of RTP packets forwarded to a local track",
        &["media_type"] // "video" or "audio"
    )
    .unwrap();
    pub static ref PACKETS_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tracklistener_packets_dropped_total",
        "Total number of RTP packets dropped on write",
        &["reason"] // "closed_pipe", "write_failed"
    )
    .unwrap();
    pub static ref KEYFRAMES_REQUESTED_TOTAL: IntCounter = register_int_counter!(
        "tracklistener_keyframes_requested_total",
        "Total number of PLIs (keyframe requests) sent to publishers"
    )
    .unwrap();
    pub static ref TRACK_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tracklistener_track_events_total",
        "Total number of TrackEvents emitted to the Router",
        &["kind"] // "add" or "remove"
    )
    .unwrap();
    pub static ref TRACK_EVENTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "tracklistener_track_events_dropped_total",
        "Total number of TrackEvents suppressed because the listener was closed"
    )
    .unwrap();
}

/// Forces initialization of the lazy statics above. Production callers run
/// this once at startup, before `prometheus::gather()` is first scraped,
/// the way the teacher's `main` calls `register_metrics()`.
pub fn register_metrics() {
    let _ = TRACKS_FORWARDED_TOTAL.with_label_values(&["video"]).get();
    let _ = PACKETS_DROPPED_TOTAL.with_label_values(&["closed_pipe"]).get();
    let _ = KEYFRAMES_REQUESTED_TOTAL.get();
    let _ = TRACK_EVENTS_TOTAL.with_label_values(&["add"]).get();
    let _ = TRACK_EVENTS_DROPPED_TOTAL.get();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        register_metrics();
        KEYFRAMES_REQUESTED_TOTAL.inc();
        assert!(KEYFRAMES_REQUESTED_TOTAL.get() >= 1);
    }

    #[test]
    fn test_track_events_counter_by_kind() {
        register_metrics();
        TRACK_EVENTS_TOTAL.with_label_values(&["add"]).inc();
        TRACK_EVENTS_TOTAL.with_label_values(&["remove"]).inc();
        assert!(TRACK_EVENTS_TOTAL.with_label_values(&["add"]).get() >= 1);
        assert!(TRACK_EVENTS_TOTAL.with_label_values(&["remove"]).get() >= 1);
    }
}
