use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
    os::fd::RawFd,
    time::Duration,
};

use nix::{
    errno::Errno,
    poll::{poll, PollFd, PollFlags},
    sys::socket::{recv, socket, AddressFamily, MsgFlags, SockFlag, SockProtocol, SockType},
    unistd::close,
};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, warn};

use crate::{ProbeError, ProbeResult};

/// Anything a raw ICMP message can be written to.
pub trait PacketSink {
    /// Write `packet` as a single datagram addressed to `target`, returning the number of bytes
    /// accepted.
    fn send_packet(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<usize>;
}

/// Anything link-layer frames can be read from.
pub trait FrameSource {
    /// Block until a frame is ready or `timeout` elapses. `Ok(false)` means nothing became
    /// readable, either because the timeout elapsed or because the wait was interrupted.
    fn wait_readable(&mut self, timeout: Duration) -> ProbeResult<bool>;

    /// Read one frame into `buf`, returning its length. `EINTR`, `EAGAIN` and `ENETDOWN` are
    /// passed up as `ProbeError::Capture` like any other failure; the wait loop drops the frame
    /// and keeps going.
    fn recv_frame(&mut self, buf: &mut [u8]) -> ProbeResult<usize>;
}

/// Transmit `packet` to `target` in one write.
///
/// Anything other than the whole packet being accepted is an error.
pub fn send_echo<S: PacketSink>(sink: &S, target: Ipv4Addr, packet: &[u8]) -> ProbeResult<usize> {
    let written = sink
        .send_packet(packet, target)
        .map_err(|source| ProbeError::Send { target, source })?;
    if written != packet.len() {
        return Err(ProbeError::ShortWrite {
            target,
            written,
            expected: packet.len(),
        });
    }
    debug!("sent {} bytes to {}", written, target);
    Ok(written)
}

/// Raw `AF_INET` socket bound to the ICMP protocol. The kernel builds the IP header and routes
/// the datagram.
pub struct IcmpSender {
    socket: Socket,
}

impl IcmpSender {
    pub fn open() -> ProbeResult<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).map_err(
            |source| ProbeError::Socket {
                kind: "AF_INET, SOCK_RAW, IPPROTO_ICMP",
                source,
            },
        )?;
        Ok(Self { socket })
    }
}

impl PacketSink for IcmpSender {
    fn send_packet(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<usize> {
        let addr = SockAddr::from(SocketAddrV4::new(target, 0));
        self.socket.send_to(packet, &addr)
    }
}

struct FileDesc {
    fd: RawFd,
}

impl FileDesc {
    fn new(fd: RawFd) -> Self {
        Self { fd }
    }
}

impl Drop for FileDesc {
    fn drop(&mut self) {
        if let Err(err) = close(self.fd) {
            warn!("close({}): {}", self.fd, err);
        }
    }
}

/// `AF_PACKET` socket receiving every frame on every interface (`ETH_P_ALL`).
///
/// The descriptor is closed when the value is dropped.
pub struct CaptureSocket {
    socket: FileDesc,
}

impl CaptureSocket {
    pub fn open() -> ProbeResult<Self> {
        let fd = socket(
            AddressFamily::Packet,
            SockType::Raw,
            SockFlag::SOCK_CLOEXEC,
            SockProtocol::EthAll,
        )
        .map_err(|errno| ProbeError::Socket {
            kind: "AF_PACKET, SOCK_RAW, ETH_P_ALL",
            source: io::Error::from(errno),
        })?;
        Ok(Self {
            socket: FileDesc::new(fd),
        })
    }
}

impl FrameSource for CaptureSocket {
    fn wait_readable(&mut self, timeout: Duration) -> ProbeResult<bool> {
        let mut fds = [PollFd::new(self.socket.fd, PollFlags::POLLIN)];
        // Round up so a sub-millisecond remainder still waits instead of spinning.
        let millis = timeout.as_micros().div_ceil(1000).min(libc::c_int::MAX as u128);
        match poll(&mut fds, millis as libc::c_int) {
            Ok(ready) => Ok(ready > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(source) => Err(ProbeError::Capture {
                stage: "poll",
                source,
            }),
        }
    }

    fn recv_frame(&mut self, buf: &mut [u8]) -> ProbeResult<usize> {
        recv(self.socket.fd, buf, MsgFlags::empty()).map_err(|source| ProbeError::Capture {
            stage: "recv",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io, net::Ipv4Addr};

    use super::{send_echo, PacketSink};
    use crate::ProbeError;

    struct Recorder {
        accept: Option<usize>,
        sent: RefCell<Vec<(Vec<u8>, Ipv4Addr)>>,
    }

    impl PacketSink for Recorder {
        fn send_packet(&self, packet: &[u8], target: Ipv4Addr) -> io::Result<usize> {
            self.sent.borrow_mut().push((packet.to_vec(), target));
            match self.accept {
                Some(n) => Ok(n.min(packet.len())),
                None => Err(io::Error::from_raw_os_error(libc::ENETUNREACH)),
            }
        }
    }

    const TARGET: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    #[test]
    fn whole_packet_is_sent_once() {
        let sink = Recorder {
            accept: Some(usize::MAX),
            sent: RefCell::new(vec![]),
        };
        assert_eq!(send_echo(&sink, TARGET, &[1, 2, 3, 4]).unwrap(), 4);
        assert_eq!(*sink.sent.borrow(), vec![(vec![1, 2, 3, 4], TARGET)]);
    }

    #[test]
    fn short_write_is_an_error() {
        let sink = Recorder {
            accept: Some(3),
            sent: RefCell::new(vec![]),
        };
        match send_echo(&sink, TARGET, &[0; 64]) {
            Err(ProbeError::ShortWrite {
                target,
                written,
                expected,
            }) => {
                assert_eq!(target, TARGET);
                assert_eq!(written, 3);
                assert_eq!(expected, 64);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn send_failure_names_the_target() {
        let sink = Recorder {
            accept: None,
            sent: RefCell::new(vec![]),
        };
        let err = send_echo(&sink, TARGET, &[0; 64]).unwrap_err();
        assert!(matches!(err, ProbeError::Send { target, .. } if target == TARGET));
        assert!(err.to_string().starts_with("sendto 10.0.0.1: "));
    }
}
