//! Generic serial link: framing and dispatch over an unstructured byte stream
//!
//! The framing algorithm is identical on both endpoints; only two primitives
//! differ between them, captured by the [`ByteStream`] trait:
//!
//! - the firmware reassembles USB CDC packet chunks in a [`MessageBuffer`]
//!   and surfaces only whole messages
//! - the host checks the OS serial buffer and reads with a timeout
//!
//! Because no delimiter or length prefix exists on the wire, a read that
//! comes up short after a type id has been consumed means the endpoints have
//! lost framing. That is unrecoverable within the session and surfaces as
//! [`LinkError::Incomplete`]; the owning loop treats it like a disconnect.

use crate::messages::{Message, MessageKind, ProtocolError, MAX_PAYLOAD_SIZE};

/// Byte-level primitives supplied by each endpoint
pub trait ByteStream {
    type Error: core::fmt::Debug;

    /// Whether at least one byte is waiting. Must not block.
    fn bytes_available(&mut self) -> Result<bool, Self::Error>;

    /// Read up to `buf.len()` bytes, returning how many were read.
    ///
    /// May block briefly while the remainder of an in-flight message
    /// arrives. Returning 0 means no further bytes will arrive within the
    /// endpoint's read deadline.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write the whole buffer
    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error>;
}

/// Receiver for decoded inbound messages.
///
/// Implementations simply ignore kinds they don't care about; an unhandled
/// message is dropped silently, not an error.
pub trait MessageSink {
    fn on_message(&mut self, msg: Message);
}

impl<F: FnMut(Message)> MessageSink for F {
    fn on_message(&mut self, msg: Message) {
        self(msg)
    }
}

/// Link-level errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
    /// Decode failure (unknown type id, bad payload)
    Protocol(ProtocolError),
    /// A type id was read but its payload never fully arrived; framing is
    /// lost and the session must be torn down
    Incomplete {
        kind: MessageKind,
        expected: usize,
        got: usize,
    },
    /// Underlying stream failure
    Io(E),
}

impl<E: core::fmt::Debug> core::fmt::Display for LinkError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LinkError::Protocol(e) => write!(f, "protocol error: {}", e),
            LinkError::Incomplete { kind, expected, got } => write!(
                f,
                "incomplete {:?} message: expected {} payload byte(s), got {}",
                kind, expected, got
            ),
            LinkError::Io(e) => write!(f, "stream error: {:?}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug> std::error::Error for LinkError<E> {}

/// Reassembly buffer for packet-oriented transports.
///
/// USB CDC hands the device byte chunks with no relation to message
/// boundaries. A [`ByteStream`] built on this buffer accumulates those
/// chunks and only reports bytes available once the message at the front
/// is complete, so the link never blocks waiting for the tail of a
/// payload.
pub struct MessageBuffer<const N: usize> {
    bytes: heapless::Deque<u8, N>,
}

impl<const N: usize> MessageBuffer<N> {
    pub const fn new() -> Self {
        Self {
            bytes: heapless::Deque::new(),
        }
    }

    /// Room left for incoming bytes
    pub fn free(&self) -> usize {
        N - self.bytes.len()
    }

    /// Append a received chunk, returning how many bytes fit
    pub fn extend(&mut self, chunk: &[u8]) -> usize {
        let mut accepted = 0;
        for &b in chunk {
            if self.bytes.push_back(b).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Whether the message at the front of the buffer is complete.
    ///
    /// An unknown type id also reports ready so the link consumes it and
    /// fails with its usual protocol error.
    pub fn message_ready(&self) -> bool {
        match self.bytes.front() {
            Some(&id) => match MessageKind::from_id(id) {
                Some(kind) => self.bytes.len() > kind.payload_len(),
                None => true,
            },
            None => false,
        }
    }

    /// Pop buffered bytes into `buf`, returning the count
    pub fn take(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.bytes.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

impl<const N: usize> Default for MessageBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Message-oriented wrapper around a [`ByteStream`]
pub struct SerialLink<S: ByteStream> {
    stream: S,
}

impl<S: ByteStream> SerialLink<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Access the underlying stream (host needs this for port teardown)
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Encode and write one message
    pub fn send(&mut self, msg: &Message) -> Result<(), LinkError<S::Error>> {
        self.stream.write_all(&msg.encode()).map_err(LinkError::Io)
    }

    /// Drain every fully-available inbound message, dispatching each to the
    /// sink. Called once per control-loop tick.
    ///
    /// The availability check only gates the type id read; once an id is in
    /// hand, the payload read is allowed to block briefly because its length
    /// is known and the sender commits to the whole message.
    pub fn update<H: MessageSink>(&mut self, sink: &mut H) -> Result<(), LinkError<S::Error>> {
        loop {
            if !self.stream.bytes_available().map_err(LinkError::Io)? {
                return Ok(());
            }

            let mut id = [0u8; 1];
            if self.read_full(&mut id)? == 0 {
                // Lost a race with the availability check; nothing consumed
                return Ok(());
            }

            let kind = MessageKind::from_id(id[0])
                .ok_or(LinkError::Protocol(ProtocolError::UnknownType(id[0])))?;

            let expected = kind.payload_len();
            let mut payload = [0u8; MAX_PAYLOAD_SIZE];
            let got = self.read_full(&mut payload[..expected])?;
            if got < expected {
                return Err(LinkError::Incomplete { kind, expected, got });
            }

            let msg = Message::decode(id[0], &payload[..expected]).map_err(LinkError::Protocol)?;
            sink.on_message(msg);
        }
    }

    /// Read until `buf` is full or the stream gives up, returning the count
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, LinkError<S::Error>> {
        let mut got = 0;
        while got < buf.len() {
            let n = self.stream.read(&mut buf[got..]).map_err(LinkError::Io)?;
            if n == 0 {
                break;
            }
            got += n;
        }
        Ok(got)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::REGISTRY;

    /// In-memory stream for exercising the framing algorithm
    struct MockStream {
        data: std::vec::Vec<u8>,
        pos: usize,
    }

    impl MockStream {
        fn new(data: &[u8]) -> Self {
            Self { data: data.to_vec(), pos: 0 }
        }
    }

    impl ByteStream for MockStream {
        type Error = core::convert::Infallible;

        fn bytes_available(&mut self) -> Result<bool, Self::Error> {
            Ok(self.pos < self.data.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }

        fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
            self.data.extend_from_slice(buf);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectSink {
        msgs: std::vec::Vec<Message>,
    }

    impl MessageSink for CollectSink {
        fn on_message(&mut self, msg: Message) {
            self.msgs.push(msg);
        }
    }

    #[test]
    fn test_update_drains_all_messages() {
        let mut bytes = std::vec::Vec::new();
        bytes.extend_from_slice(&Message::VolumeRequest.encode());
        bytes.extend_from_slice(&Message::volume(0.5).unwrap().encode());
        bytes.extend_from_slice(&Message::Skip { forward: true }.encode());

        let mut link = SerialLink::new(MockStream::new(&bytes));
        let mut sink = CollectSink::default();
        link.update(&mut sink).unwrap();

        assert_eq!(sink.msgs.len(), 3);
        assert_eq!(sink.msgs[0], Message::VolumeRequest);
        assert_eq!(sink.msgs[2], Message::Skip { forward: true });
        // Stream fully consumed
        link.update(&mut sink).unwrap();
        assert_eq!(sink.msgs.len(), 3);
    }

    #[test]
    fn test_short_payload_is_fatal_and_dispatches_nothing() {
        // Valid Spectrum id followed by only 3 of 24 payload bytes
        let bytes = [MessageKind::Spectrum.id(), 1, 2, 3];
        let mut link = SerialLink::new(MockStream::new(&bytes));
        let mut sink = CollectSink::default();

        let err = link.update(&mut sink).unwrap_err();
        assert_eq!(
            err,
            LinkError::Incomplete {
                kind: MessageKind::Spectrum,
                expected: crate::SPECTRUM_BINS * 2,
                got: 3
            }
        );
        assert!(sink.msgs.is_empty());
    }

    #[test]
    fn test_unknown_type_id_is_fatal() {
        let bytes = [REGISTRY.len() as u8, 0, 0];
        let mut link = SerialLink::new(MockStream::new(&bytes));
        let mut sink = CollectSink::default();

        let err = link.update(&mut sink).unwrap_err();
        assert_eq!(
            err,
            LinkError::Protocol(ProtocolError::UnknownType(REGISTRY.len() as u8))
        );
        assert!(sink.msgs.is_empty());
    }

    #[test]
    fn test_valid_message_before_bad_one_still_dispatched() {
        let mut bytes = std::vec::Vec::new();
        bytes.extend_from_slice(&Message::TogglePlayback.encode());
        bytes.push(0xEE); // garbage id
        let mut link = SerialLink::new(MockStream::new(&bytes));
        let mut sink = CollectSink::default();

        let err = link.update(&mut sink).unwrap_err();
        assert!(matches!(err, LinkError::Protocol(ProtocolError::UnknownType(0xEE))));
        assert_eq!(sink.msgs, [Message::TogglePlayback]);
    }

    #[test]
    fn test_send_writes_wire_encoding() {
        let mut link = SerialLink::new(MockStream::new(&[]));
        link.send(&Message::LikeStatus { liked: true }).unwrap();
        let stream = link.into_inner();
        assert_eq!(stream.data, [MessageKind::LikeStatus.id(), 1]);
    }

    /// Stream shaped like the device's CDC transport: chunks land in a
    /// reassembly buffer and availability means a whole message is queued
    struct PacketStream {
        buf: MessageBuffer<128>,
    }

    impl ByteStream for PacketStream {
        type Error = core::convert::Infallible;

        fn bytes_available(&mut self) -> Result<bool, Self::Error> {
            Ok(self.buf.message_ready())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            Ok(self.buf.take(buf))
        }

        fn write_all(&mut self, _buf: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn test_buffer_holds_back_partial_messages() {
        let mut buf: MessageBuffer<128> = MessageBuffer::new();
        assert!(!buf.message_ready());

        // Spectrum id plus only half its payload
        let wire = Message::spectrum([0.5; 12], [0.5; 12]).unwrap().encode();
        buf.extend(&wire[..13]);
        assert!(!buf.message_ready());

        buf.extend(&wire[13..]);
        assert!(buf.message_ready());
    }

    #[test]
    fn test_buffer_reports_unknown_id_ready() {
        // Garbage must reach the link so it can fail the session
        let mut buf: MessageBuffer<128> = MessageBuffer::new();
        buf.extend(&[0xEE]);
        assert!(buf.message_ready());
    }

    #[test]
    fn test_buffer_rejects_overflow_bytes() {
        let mut buf: MessageBuffer<4> = MessageBuffer::new();
        assert_eq!(buf.extend(&[1, 2, 3, 4, 5, 6]), 4);
        assert_eq!(buf.free(), 0);
        let mut out = [0u8; 8];
        assert_eq!(buf.take(&mut out), 4);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_link_over_packet_chunks_dispatches_whole_messages_only() {
        let mut link = SerialLink::new(PacketStream {
            buf: MessageBuffer::new(),
        });
        let mut sink = CollectSink::default();

        // First chunk splits a Volume message after its id byte
        let wire = Message::volume(1.0).unwrap().encode();
        link.stream_mut().buf.extend(&wire[..1]);
        link.update(&mut sink).unwrap();
        assert!(sink.msgs.is_empty());

        // The rest arrives in a later chunk together with a second message
        link.stream_mut().buf.extend(&wire[1..]);
        link.stream_mut().buf.extend(&Message::TogglePlayback.encode());
        link.update(&mut sink).unwrap();
        assert_eq!(
            sink.msgs,
            [Message::Volume { level: 1.0 }, Message::TogglePlayback]
        );
    }

    #[test]
    fn test_unhandled_kinds_dropped_silently() {
        // A sink that only cares about Volume; everything else is ignored
        let bytes = {
            let mut b = std::vec::Vec::new();
            b.extend_from_slice(&Message::Vu { left: 0.1, right: 0.2 }.encode());
            b.extend_from_slice(&Message::volume(1.0).unwrap().encode());
            b
        };
        let mut link = SerialLink::new(MockStream::new(&bytes));
        let mut volumes = 0;
        let mut sink = |msg: Message| {
            if let Message::Volume { .. } = msg {
                volumes += 1;
            }
        };
        link.update(&mut sink).unwrap();
        assert_eq!(volumes, 1);
    }
}
