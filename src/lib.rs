mod capture;
pub use capture::{match_reply, wait_for_reply, Reject, MIN_FRAME_LEN};

pub mod checksum;

mod config;
pub use config::Config;

mod error;
pub use error::{ProbeError, ProbeResult};

mod ethernet;
pub use ethernet::{EtherType, EthernetAddress, EthernetFrame};

mod icmp;
pub use icmp::{Icmp, Message, MessageType};

mod ipv4;
pub use ipv4::{IpProtocol, Ipv4Packet};

mod probe;
pub use probe::{check_privilege, run, Probe, ECHO_PACKET_LEN};

mod socket;
pub use socket::{send_echo, CaptureSocket, FrameSource, IcmpSender, PacketSink};
