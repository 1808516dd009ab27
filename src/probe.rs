use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use caps::{CapSet, Capability};
use nix::unistd::geteuid;
use tracing::debug;

use crate::{
    capture::wait_for_reply,
    icmp::{self, Icmp, Message},
    socket::{send_echo, CaptureSocket, IcmpSender},
    Config, EthernetAddress, ProbeError, ProbeResult,
};

/// Size of the echo request on the wire: 8-byte header plus 56 bytes of payload, as `ping` sends.
pub const ECHO_PACKET_LEN: usize = 64;

/// Identifier and sequence number of the one echo exchange in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Probe {
    pub ident: u16,
    pub seq_no: u16,
}

impl Probe {
    pub const fn new(ident: u16, seq_no: u16) -> Self {
        Self { ident, seq_no }
    }

    /// Build the 64-byte echo request. The payload starts with the current Unix time in seconds
    /// (big-endian) and is zero-padded; the checksum covers all of it.
    pub fn build_request(&self) -> ProbeResult<Icmp<BytesMut>> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();

        let mut payload = BytesMut::zeroed(ECHO_PACKET_LEN - icmp::HEADER_LEN);
        (&mut payload[..]).put_u64(secs);

        Icmp::new(Message::EchoRequest {
            ident: self.ident,
            seq_no: self.seq_no,
            data: &payload,
        })
    }
}

impl std::fmt::Display for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ident: {}, sequence number: {}", self.ident, self.seq_no)
    }
}

/// The kernel hands out raw and packet sockets to root or to any process holding
/// `CAP_NET_RAW` in its effective set.
fn may_open_raw_sockets(is_root: bool, has_net_raw: bool) -> bool {
    is_root || has_net_raw
}

pub fn check_privilege() -> ProbeResult<()> {
    let has_net_raw = caps::has_cap(None, CapSet::Effective, Capability::CAP_NET_RAW)
        .unwrap_or_else(|err| {
            debug!("cannot read effective capabilities: {}", err);
            false
        });

    if may_open_raw_sockets(geteuid().is_root(), has_net_raw) {
        Ok(())
    } else {
        Err(ProbeError::InsufficientPrivilege)
    }
}

/// Ping `config.target` once and return the MAC address the echo reply arrived from.
///
/// Both sockets are opened before the request goes out so the reply cannot slip past the
/// capture, and both are closed on every return path.
pub fn run(config: &Config) -> ProbeResult<EthernetAddress> {
    check_privilege()?;

    let probe = config.probe();
    let request = probe.build_request()?;

    let sender = IcmpSender::open()?;
    let mut capture = CaptureSocket::open()?;

    send_echo(&sender, config.target, request.as_ref())?;
    debug!("sent echo request to {}: {}", config.target, request);

    wait_for_reply(&mut capture, &probe, config.timeout)
}

#[cfg(test)]
mod tests {
    use caps::{CapSet, Capability};
    use nix::unistd::geteuid;

    use super::{check_privilege, may_open_raw_sockets, Probe, ECHO_PACKET_LEN};
    use crate::{checksum, MessageType};

    #[test]
    fn request_is_64_bytes_and_verifies() {
        let request = Probe::new(1234, 1).build_request().unwrap();

        assert_eq!(request.len(), ECHO_PACKET_LEN);
        assert_eq!(request.message_type(), MessageType::EchoRequest);
        assert_eq!(request.message_code(), 0);
        assert_eq!(request.echo_ident(), 1234);
        assert_eq!(request.echo_seq_no(), 1);
        assert!(request.verify_checksum());
        assert_eq!(checksum::checksum16(request.as_ref()), 0);
    }

    #[test]
    fn identity_extremes() {
        for (ident, seq_no) in [(0, 0), (u16::MAX, u16::MAX), (0, u16::MAX), (u16::MAX, 0)] {
            let request = Probe::new(ident, seq_no).build_request().unwrap();
            assert_eq!(request.len(), ECHO_PACKET_LEN);
            assert_eq!(request.as_ref()[0], 8);
            assert_eq!(request.as_ref()[1], 0);
            assert_eq!(&request.as_ref()[4..6], &ident.to_be_bytes());
            assert_eq!(&request.as_ref()[6..8], &seq_no.to_be_bytes());
            assert!(request.verify_checksum());
        }
    }

    #[test]
    fn payload_is_timestamp_then_zeros() {
        let request = Probe::new(1, 1).build_request().unwrap();
        let data = request.echo_data();

        assert_eq!(data.len(), 56);
        let mut secs = [0u8; 8];
        secs.copy_from_slice(&data[..8]);
        assert!(u64::from_be_bytes(secs) > 1_600_000_000);
        assert!(data[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn display() {
        assert_eq!(Probe::new(7, 9).to_string(), "ident: 7, sequence number: 9");
    }

    #[test]
    fn net_raw_without_root_is_enough() {
        assert!(may_open_raw_sockets(true, false));
        assert!(may_open_raw_sockets(false, true));
        assert!(may_open_raw_sockets(true, true));
        assert!(!may_open_raw_sockets(false, false));
    }

    #[test]
    fn privilege_check_follows_current_process() {
        let has_net_raw =
            caps::has_cap(None, CapSet::Effective, Capability::CAP_NET_RAW).unwrap_or(false);
        let allowed = geteuid().is_root() || has_net_raw;

        match check_privilege() {
            Ok(()) => assert!(allowed),
            Err(err) => {
                assert!(!allowed);
                assert_eq!(err.to_string(), "Raw sockets need root or CAP_NET_RAW");
            }
        }
    }
}
