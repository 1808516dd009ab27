use std::{net::Ipv4Addr, num::ParseIntError, time::Duration};

use clap::Parser;

use crate::Probe;

fn parse_millis(arg: &str) -> Result<Duration, ParseIntError> {
    Ok(Duration::from_millis(arg.parse()?))
}

/// Send one ICMP echo request and print the MAC address the reply arrived from.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// IPv4 address to ping, dotted-decimal
    pub target: Ipv4Addr,

    /// How long to wait for the echo reply, in milliseconds; 0 only picks up a reply that is
    /// already queued
    #[arg(short, long, value_parser = parse_millis, default_value = "3000")]
    pub timeout: Duration,

    /// ICMP identifier (defaults to the low 16 bits of the process id)
    #[arg(short, long)]
    pub ident: Option<u16>,

    /// ICMP sequence number
    #[arg(short, long, default_value_t = 1)]
    pub sequence: u16,
}

impl Config {
    pub fn probe(&self) -> Probe {
        let ident = self.ident.unwrap_or_else(|| std::process::id() as u16);
        Probe::new(ident, self.sequence)
    }
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, time::Duration};

    use clap::Parser;

    use super::Config;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["echomac", "192.168.1.1"]).unwrap();
        assert_eq!(config.target, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(config.timeout, Duration::from_millis(3000));
        assert_eq!(config.sequence, 1);
        assert_eq!(config.probe().ident, std::process::id() as u16);
        assert_eq!(config.probe().seq_no, 1);
    }

    #[test]
    fn overrides() {
        let config = Config::try_parse_from([
            "echomac", "-t", "250", "--ident", "1234", "-s", "2", "10.0.0.7",
        ])
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.target, Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(config.probe().ident, 1234);
        assert_eq!(config.probe().seq_no, 2);
    }

    #[test]
    fn malformed_address_is_rejected() {
        assert!(Config::try_parse_from(["echomac", "192.168.1"]).is_err());
        assert!(Config::try_parse_from(["echomac", "::1"]).is_err());
        assert!(Config::try_parse_from(["echomac"]).is_err());
        assert!(Config::try_parse_from(["echomac", "1.2.3.4", "5.6.7.8"]).is_err());
    }

    #[test]
    fn zero_timeout_is_accepted() {
        let config = Config::try_parse_from(["echomac", "-t", "0", "1.2.3.4"]).unwrap();
        assert!(config.timeout.is_zero());
    }

    #[test]
    fn malformed_timeout_is_rejected() {
        assert!(Config::try_parse_from(["echomac", "-t", "soon", "1.2.3.4"]).is_err());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
