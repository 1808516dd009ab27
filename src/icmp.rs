use std::ops::Range;

use bytes::{Buf, BufMut, BytesMut};

use crate::{checksum, ProbeError, ProbeResult};

/// Length of the ICMP header common to echo request and reply.
pub const HEADER_LEN: usize = 8;

/// The Internet Control Message Protocol (ICMP) is a supporting protocol in the Internet protocol
/// suite. It is used by network devices, including routers, to send error messages and operational
/// information indicating success or failure when communicating with another IP address. ICMP
/// differs from transport protocols such as TCP and UDP in that it is not typically used to
/// exchange data between systems, with the exception of some diagnostic tools like ping and
/// traceroute.
///
/// `Icmp<BytesMut>` is what [`Icmp::new`] builds; `Icmp<&[u8]>` is a borrowed view over a
/// captured message.
#[derive(Debug, Clone)]
pub struct Icmp<T: AsRef<[u8]>> {
    buffer: T,
}

impl<T: AsRef<[u8]>> AsRef<[u8]> for Icmp<T> {
    fn as_ref(&self) -> &[u8] {
        self.buffer.as_ref()
    }
}

/// Internet protocol control message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageType {
    /// Echo reply
    EchoReply,
    /// Destination unreachable
    DstUnreachable,
    /// Message redirect
    Redirect,
    /// Echo request
    EchoRequest,
    /// Time exceeded
    TimeExceeded,
    /// Parameter problem
    ParamProblem,
    /// Anything else seen on the wire
    Unknown(u8),
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value {
            0 => MessageType::EchoReply,
            3 => MessageType::DstUnreachable,
            5 => MessageType::Redirect,
            8 => MessageType::EchoRequest,
            11 => MessageType::TimeExceeded,
            12 => MessageType::ParamProblem,
            other => MessageType::Unknown(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::EchoReply => 0,
            MessageType::DstUnreachable => 3,
            MessageType::Redirect => 5,
            MessageType::EchoRequest => 8,
            MessageType::TimeExceeded => 11,
            MessageType::ParamProblem => 12,
            MessageType::Unknown(other) => other,
        }
    }
}

/// A high-level representation of an Internet Control Message Protocol version 4 echo message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum Message<'a> {
    EchoRequest {
        ident: u16,
        seq_no: u16,
        data: &'a [u8],
    },
    EchoReply {
        ident: u16,
        seq_no: u16,
        data: &'a [u8],
    },
}

impl Message<'_> {
    pub fn r#type(&self) -> MessageType {
        match *self {
            Message::EchoRequest { .. } => MessageType::EchoRequest,
            Message::EchoReply { .. } => MessageType::EchoReply,
        }
    }

    pub fn code(&self) -> u8 {
        match *self {
            Message::EchoRequest { .. } | Message::EchoReply { .. } => 0,
        }
    }
}

impl Icmp<BytesMut> {
    /// Serialize `msg` and fill in its checksum.
    pub fn new(msg: Message) -> ProbeResult<Self> {
        let (ident, seq_no, data) = match msg {
            Message::EchoRequest {
                ident,
                seq_no,
                data,
            }
            | Message::EchoReply {
                ident,
                seq_no,
                data,
            } => (ident, seq_no, data),
        };

        let mut buffer = BytesMut::with_capacity(HEADER_LEN + data.len());
        // message type
        buffer.put_u8(msg.r#type().into());
        // message code
        buffer.put_u8(msg.code());
        // checksum
        buffer.put_u16(0);
        buffer.put_u16(ident);
        buffer.put_u16(seq_no);
        buffer.put_slice(data);

        let mut icmp = Icmp::new_checked(buffer)?;
        icmp.fill_checksum();

        Ok(icmp)
    }
}

impl<T: AsRef<[u8]>> Icmp<T> {
    const TYPE: usize = 0;
    const CODE: usize = 1;
    const CHECKSUM: Range<usize> = 2..4;
    const ECHO_IDENT: Range<usize> = 4..6;
    const ECHO_SEQNO: Range<usize> = 6..HEADER_LEN;

    pub fn new_checked(buffer: T) -> ProbeResult<Self> {
        let icmp = Icmp { buffer };
        icmp.check_len()?;
        Ok(icmp)
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(BufferTooShort)` if the buffer is too short.
    pub fn check_len(&self) -> ProbeResult<()> {
        if self.buffer.as_ref().len() < HEADER_LEN {
            Err(ProbeError::BufferTooShort)
        } else {
            Ok(())
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.as_ref().is_empty()
    }

    /// Return the message type field.
    ///
    /// See also [Control messages](https://en.wikipedia.org/wiki/Internet_Control_Message_Protocol#Control_messages)
    #[inline]
    pub fn message_type(&self) -> MessageType {
        self.buffer.as_ref()[Self::TYPE].into()
    }

    /// Return the message code field.
    #[inline]
    pub fn message_code(&self) -> u8 {
        self.buffer.as_ref()[Self::CODE]
    }

    /// Return the checksum field.
    #[inline]
    pub fn checksum(&self) -> u16 {
        (&self.buffer.as_ref()[Self::CHECKSUM]).get_u16()
    }

    /// Return the identifier field (for echo request and reply packets).
    #[inline]
    pub fn echo_ident(&self) -> u16 {
        (&self.buffer.as_ref()[Self::ECHO_IDENT]).get_u16()
    }

    /// Return the sequence number field (for echo request and reply packets).
    #[inline]
    pub fn echo_seq_no(&self) -> u16 {
        (&self.buffer.as_ref()[Self::ECHO_SEQNO]).get_u16()
    }

    /// Echo payload following the header.
    pub fn echo_data(&self) -> &[u8] {
        &self.buffer.as_ref()[HEADER_LEN..]
    }

    /// Validate the checksum over the whole message.
    pub fn verify_checksum(&self) -> bool {
        checksum::data(self.buffer.as_ref()) == !0
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> Icmp<T> {
    /// Set the checksum field.
    #[inline]
    pub fn set_checksum(&mut self, value: u16) {
        (&mut self.buffer.as_mut()[Self::CHECKSUM]).put_u16(value)
    }

    /// Set the sequence number field (for echo request and reply packets).
    #[inline]
    pub fn set_echo_seq_no(&mut self, value: u16) {
        (&mut self.buffer.as_mut()[Self::ECHO_SEQNO]).put_u16(value)
    }

    /// Compute and fill in the checksum. The field is zeroed first so it does not contribute
    /// to the sum.
    pub fn fill_checksum(&mut self) {
        self.set_checksum(0);
        let checksum = checksum::checksum16(self.buffer.as_ref());
        self.set_checksum(checksum)
    }
}

impl<T: AsRef<[u8]>> std::fmt::Display for Icmp<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg_type = self.message_type();
        write!(
            f,
            "message type: {:?}, message code: {}",
            msg_type,
            self.message_code()
        )?;
        match msg_type {
            MessageType::EchoRequest | MessageType::EchoReply => {
                write!(
                    f,
                    ", ident: {}, sequence number: {}",
                    self.echo_ident(),
                    self.echo_seq_no()
                )?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Icmp, Message, MessageType, HEADER_LEN};
    use crate::ProbeError;

    #[test]
    fn echo_request_layout() {
        let icmp = Icmp::new(Message::EchoRequest {
            ident: 0x1234,
            seq_no: 0xabcd,
            data: b"hello world",
        })
        .unwrap();

        assert_eq!(icmp.len(), HEADER_LEN + 11);
        assert_eq!(&icmp.as_ref()[..2], &[8, 0]);
        assert_eq!(&icmp.as_ref()[4..8], &[0x12, 0x34, 0xab, 0xcd]);
        assert_eq!(icmp.message_type(), MessageType::EchoRequest);
        assert_eq!(icmp.message_code(), 0);
        assert_eq!(icmp.echo_ident(), 0x1234);
        assert_eq!(icmp.echo_seq_no(), 0xabcd);
        assert_eq!(icmp.echo_data(), b"hello world");
        assert!(icmp.verify_checksum());
    }

    #[test]
    fn echo_reply_type() {
        let icmp = Icmp::new(Message::EchoReply {
            ident: 7,
            seq_no: 9,
            data: &[],
        })
        .unwrap();
        assert_eq!(icmp.as_ref()[0], 0);
        assert_eq!(icmp.message_type(), MessageType::EchoReply);
        assert!(icmp.verify_checksum());
        assert_eq!(
            icmp.to_string(),
            "message type: EchoReply, message code: 0, ident: 7, sequence number: 9"
        );
    }

    #[test]
    fn corrupted_message_fails_verification() {
        let mut icmp = Icmp::new(Message::EchoRequest {
            ident: 1,
            seq_no: 1,
            data: &[0; 56],
        })
        .unwrap();
        icmp.set_echo_seq_no(2);
        assert!(!icmp.verify_checksum());
        icmp.fill_checksum();
        assert!(icmp.verify_checksum());
    }

    #[test]
    fn borrowed_view() {
        let bytes = [3u8, 1, 0xfc, 0xfe, 0, 0, 0, 0];
        let icmp = Icmp::new_checked(&bytes[..]).unwrap();
        assert_eq!(icmp.message_type(), MessageType::DstUnreachable);
        assert_eq!(icmp.message_code(), 1);
        assert_eq!(icmp.checksum(), 0xfcfe);
        assert_eq!(MessageType::from(42u8), MessageType::Unknown(42));

        assert!(matches!(
            Icmp::new_checked(&bytes[..7]),
            Err(ProbeError::BufferTooShort)
        ));
    }
}
