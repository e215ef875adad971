use std::fmt;
use std::sync::Arc;

/// A strongly typed identifier for the publisher a `TrackListener` belongs to.
///
/// Wraps an `Arc<str>` so clones handed to per-track tasks are cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(Arc<str>);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        ClientId(Arc::from(s))
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        ClientId(Arc::from(s))
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Encodes a `uuid::Uuid`'s 128 bits as a base-62 string (`[0-9A-Za-z]+`).
///
/// Used to synthesise a remote track's id/label when the publisher's
/// browser omits one (spec calls this "UUID-base62").
pub fn base62_uuid() -> String {
    const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
    let mut n = uuid::Uuid::new_v4().as_u128();
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(22);
    while n > 0 {
        let rem = (n % 62) as usize;
        digits.push(ALPHABET[rem]);
        n /= 62;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base62 alphabet is ASCII")
}
