use std::{io, net::Ipv4Addr, time::Duration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Raw sockets need root or CAP_NET_RAW")]
    InsufficientPrivilege,
    #[error("socket({kind}): {source}")]
    Socket {
        kind: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("sendto {target}: {source}")]
    Send {
        target: Ipv4Addr,
        #[source]
        source: io::Error,
    },
    #[error("sendto {target}: short write, {written} of {expected} bytes")]
    ShortWrite {
        target: Ipv4Addr,
        written: usize,
        expected: usize,
    },
    #[error("{stage}: {source}")]
    Capture {
        stage: &'static str,
        #[source]
        source: nix::errno::Errno,
    },
    #[error("Timeout waiting for Echo Reply ({0:?})")]
    Timeout(Duration),
    #[error("Buffer too short")]
    BufferTooShort,
}

impl ProbeError {
    /// No matching reply arrived before the deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }
}

pub type ProbeResult<T> = std::result::Result<T, ProbeError>;
