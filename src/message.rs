//! Published messages and their Server-Sent Events encoding

use bytes::{BufMut, Bytes, BytesMut};

use crate::router::Namespace;

/// Comment line written periodically to keep idle connections open.
///
/// Lines starting with `:` are ignored by event-stream parsers.
pub const KEEPALIVE: &[u8] = b":keepalive\n";

/// A message to broadcast to subscribers
///
/// The namespace is not part of the event stream format; it only decides
/// which subscribers receive the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Event name (`event:` field), omitted when `None` or empty
    pub event: Option<String>,
    /// Payload (`data:` field), written verbatim
    pub data: Bytes,
    /// Target namespace, e.g. `/pets/cats`
    pub namespace: String,
}

impl Message {
    /// Create an unnamed message for a namespace
    pub fn new(namespace: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            event: None,
            data: data.into(),
            namespace: namespace.into(),
        }
    }

    /// Set the event name
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Parsed target namespace
    pub fn target(&self) -> Namespace {
        Namespace::parse(&self.namespace)
    }

    /// Render the message in event-stream wire format
    ///
    /// ```text
    /// event:<name>\n   (only with a non-empty event name)
    /// data:<payload>\n
    /// \n
    /// ```
    pub fn sse_format(&self) -> Bytes {
        let event = self.event.as_deref().filter(|e| !e.is_empty());
        let event_len = event.map_or(0, |e| "event:".len() + e.len() + 1);

        let mut buf = BytesMut::with_capacity(event_len + "data:".len() + self.data.len() + 2);
        if let Some(event) = event {
            buf.put_slice(b"event:");
            buf.put_slice(event.as_bytes());
            buf.put_u8(b'\n');
        }
        buf.put_slice(b"data:");
        buf.put_slice(&self.data);
        buf.put_slice(b"\n\n");
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_with_event() {
        let msg = Message::new("/test", "foobar").with_event("e12");
        assert_eq!(&msg.sse_format()[..], b"event:e12\ndata:foobar\n\n");
    }

    #[test]
    fn test_format_without_event() {
        let msg = Message::new("/test", "foobar");
        assert_eq!(&msg.sse_format()[..], b"data:foobar\n\n");
    }

    #[test]
    fn test_format_empty_event_is_omitted() {
        let msg = Message::new("/test", "foobar").with_event("");
        assert_eq!(&msg.sse_format()[..], b"data:foobar\n\n");
    }

    #[test]
    fn test_format_empty_payload() {
        let msg = Message::new("/", Bytes::new());
        assert_eq!(&msg.sse_format()[..], b"data:\n\n");
    }

    #[test]
    fn test_target() {
        let msg = Message::new("/pets/cats/", "meow");
        assert_eq!(msg.target(), Namespace::parse("pets/cats"));
    }

    #[test]
    fn test_keepalive_is_comment() {
        assert!(KEEPALIVE.starts_with(b":"));
        assert!(KEEPALIVE.ends_with(b"\n"));
    }
}
