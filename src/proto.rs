//! Wire format.
//!
//! Payloads are raw text with no header or length prefix; one datagram is one
//! message. A request is `<prefix><worker>_<index>`, a response is `"Hello, "`
//! followed by the exact bytes of the request it answers.

use std::borrow::Cow;
use std::time::Duration;

/// Text the responder puts in front of every echoed payload.
pub const RESPONSE_PREFIX: &str = "Hello, ";

/// Receive buffer size. Longer datagrams get truncated by the OS.
pub const MAX_DATAGRAM: usize = 65536;

/// How long a requester waits for a response before sending again.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(400);

/// Request text for request `index` of worker `worker`.
pub fn request_payload(prefix: &str, worker: usize, index: usize) -> String {
    format!("{}{}_{}", prefix, worker, index)
}

/// Response datagram for a received request datagram.
///
/// Works on bytes so the echo is exact even for payloads that are not UTF-8.
pub fn response_payload(received: &[u8]) -> Vec<u8> {
    let mut ret = Vec::with_capacity(RESPONSE_PREFIX.len() + received.len());
    ret.extend_from_slice(RESPONSE_PREFIX.as_bytes());
    ret.extend_from_slice(received);
    ret
}

/// Decode a received datagram as text.
pub fn decode(datagram: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(datagram)
}

/// Whether `response` answers `request`.
///
/// Plain containment: a response to an earlier attempt of the same request
/// is indistinguishable from a response to the current one.
pub fn is_response_to(response: &str, request: &str) -> bool {
    response.contains(request)
}
