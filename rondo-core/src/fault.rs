//! Fault categories for the ring display
//!
//! The device has no text output, so an unhandled fault is shown as the
//! alert colour followed by the fault's code as a binary pattern on the
//! ring (see [`crate::ring::LedRing::display_bytes`]). Codes are part of
//! the troubleshooting procedure and must stay stable.

use rondo_protocol::LinkError;

/// Category of a firmware fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// Type id outside the registry: the endpoints disagree on protocol
    ProtocolDesync,
    /// A message body arrived shorter than its declared size
    TruncatedMessage,
    /// Serial transport read or write failure
    SerialIo,
    /// LED driver failed to accept a frame
    LedDriver,
}

impl FaultKind {
    /// Stable code displayed as a bit pattern on the ring
    pub fn code(self) -> u8 {
        match self {
            FaultKind::ProtocolDesync => 1,
            FaultKind::TruncatedMessage => 2,
            FaultKind::SerialIo => 3,
            FaultKind::LedDriver => 4,
        }
    }

    pub fn from_link_error<E>(err: &LinkError<E>) -> Self {
        match err {
            LinkError::Protocol(_) => FaultKind::ProtocolDesync,
            LinkError::Incomplete { .. } => FaultKind::TruncatedMessage,
            LinkError::Io(_) => FaultKind::SerialIo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rondo_protocol::ProtocolError;

    #[test]
    fn test_codes_are_distinct_and_stable() {
        let kinds = [
            FaultKind::ProtocolDesync,
            FaultKind::TruncatedMessage,
            FaultKind::SerialIo,
            FaultKind::LedDriver,
        ];
        for (i, k) in kinds.iter().enumerate() {
            assert_eq!(k.code(), i as u8 + 1);
        }
    }

    #[test]
    fn test_link_error_mapping() {
        let err: LinkError<()> = LinkError::Protocol(ProtocolError::UnknownType(200));
        assert_eq!(FaultKind::from_link_error(&err), FaultKind::ProtocolDesync);
        let err: LinkError<()> = LinkError::Io(());
        assert_eq!(FaultKind::from_link_error(&err), FaultKind::SerialIo);
    }
}
