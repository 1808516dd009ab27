use std::time::{Duration, Instant};

use nix::errno::Errno;
use tracing::{debug, trace};

use crate::{
    ethernet::{self, EtherType, EthernetAddress, EthernetFrame},
    icmp::{self, Icmp, MessageType},
    ipv4::{self, IpProtocol, Ipv4Packet},
    FrameSource, Probe, ProbeError, ProbeResult,
};

/// Receive buffer size; larger frames are truncated by the kernel, which is harmless since only
/// the headers are inspected.
const FRAME_BUFFER_LEN: usize = 2048;

/// Smallest frame that can hold an Ethernet, a minimal IPv4 and an ICMP header.
pub const MIN_FRAME_LEN: usize = ethernet::HEADER_LEN + ipv4::MIN_HEADER_LEN + icmp::HEADER_LEN;

/// Why a captured frame is not the reply we are waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    /// Shorter than [`MIN_FRAME_LEN`].
    TooShort(usize),
    NotIpv4(EtherType),
    /// IHL below the 20-byte minimum, in octets.
    BadHeaderLen(usize),
    NotIcmp(IpProtocol),
    /// IPv4 options push the ICMP header past the end of the frame.
    Truncated {
        header_len: usize,
        frame_len: usize,
    },
    NotEchoReply {
        kind: MessageType,
        code: u8,
    },
    /// An echo reply for somebody else's identifier or sequence number.
    ForeignEcho {
        ident: u16,
        seq_no: u16,
    },
}

/// Check one captured frame against `probe`, in order: length, EtherType, IHL, protocol, ICMP
/// bounds, message type and code, identifier and sequence number. Returns the Ethernet source
/// address of a matching echo reply.
pub fn match_reply(frame: &[u8], probe: &Probe) -> Result<EthernetAddress, Reject> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(Reject::TooShort(frame.len()));
    }

    let eth = EthernetFrame::new_checked(frame)
        .map_err(|_| Reject::TooShort(frame.len()))?;
    match eth.ether_type() {
        EtherType::Ipv4 => {}
        other => return Err(Reject::NotIpv4(other)),
    }

    let ip = Ipv4Packet::new_checked(eth.payload())
        .map_err(|_| Reject::TooShort(frame.len()))?;
    let header_len = ip.header_len();
    if header_len < ipv4::MIN_HEADER_LEN {
        return Err(Reject::BadHeaderLen(header_len));
    }
    match ip.protocol() {
        IpProtocol::Icmp => {}
        other => return Err(Reject::NotIcmp(other)),
    }

    let truncated = Reject::Truncated {
        header_len,
        frame_len: frame.len(),
    };
    let icmp = ip
        .payload()
        .ok_or(truncated)
        .and_then(|payload| Icmp::new_checked(payload).map_err(|_| truncated))?;

    let (kind, code) = (icmp.message_type(), icmp.message_code());
    if kind != MessageType::EchoReply || code != 0 {
        return Err(Reject::NotEchoReply { kind, code });
    }

    let (ident, seq_no) = (icmp.echo_ident(), icmp.echo_seq_no());
    if ident != probe.ident || seq_no != probe.seq_no {
        return Err(Reject::ForeignEcho { ident, seq_no });
    }

    let mac_addr = eth.source_mac_address();
    debug!(
        "echo reply for {} from {} (ttl {}) via {}",
        probe,
        ip.source_ip_address(),
        ip.ttl(),
        mac_addr
    );
    Ok(mac_addr)
}

/// `recv` failures that lose one frame but leave the socket usable.
fn is_dropped_frame(errno: Errno) -> bool {
    matches!(errno, Errno::EINTR | Errno::EAGAIN | Errno::ENETDOWN)
}

/// Read frames from `source` until one matches `probe` or `timeout` has passed.
///
/// `timeout` is a deadline for the whole call: every wait on the source gets only what is left
/// of it, so a steady stream of unrelated traffic cannot keep the loop alive. The source is
/// always asked at least once, so a zero timeout still picks up a reply that is already queued.
pub fn wait_for_reply<S: FrameSource>(
    source: &mut S,
    probe: &Probe,
    timeout: Duration,
) -> ProbeResult<EthernetAddress> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; FRAME_BUFFER_LEN];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if source.wait_readable(remaining)? {
            match source.recv_frame(&mut buf) {
                Ok(len) => match match_reply(&buf[..len], probe) {
                    Ok(mac_addr) => return Ok(mac_addr),
                    Err(reject) => trace!("dropped {} byte frame: {:?}", len, reject),
                },
                Err(ProbeError::Capture { stage, source: errno }) if is_dropped_frame(errno) => {
                    trace!("dropped frame, {}: {}", stage, errno)
                }
                Err(err) => return Err(err),
            }
        }

        if Instant::now() >= deadline {
            return Err(ProbeError::Timeout(timeout));
        }
    }
}
