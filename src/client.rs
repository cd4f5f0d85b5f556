/*
 * This file is part of netprobe.
 *
 * netprobe is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * netprobe is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with netprobe.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Mutex;

use crate::args::{validate_duration, validate_interval, validate_rate, Args};
use crate::recorder::StatRecorder;
use crate::stream::{tcp, udp};
use crate::{Error, Result};

/// runs the selected probe against the target until the duration elapses
pub fn run(args: &Args, recorder: &Mutex<StatRecorder>) -> Result<()> {
    let target = resolve_target(args)?;
    let duration = validate_duration(args.duration);
    let interval = validate_interval(args.interval);

    if args.udp {
        let rate = validate_rate(args.rate);
        udp::sender::UdpSender::new(target, duration, interval, rate, args.ack).run(recorder)
    } else {
        if args.ack {
            log::warn!("acknowledgment mode applies only to UDP probes; ignoring");
        }
        tcp::sender::TcpSender::new(target, duration, interval).run(recorder)
    }
}

fn resolve_target(args: &Args) -> Result<SocketAddr> {
    let host = args.client.as_deref().ok_or("client mode requires a target host")?;
    let mut addrs = (host, args.port).to_socket_addrs()?;
    addrs
        .next()
        .ok_or_else(|| Error::from(format!("unable to resolve {}", host)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn numeric_targets_resolve_directly() {
        let args = Args::try_parse_from(["netprobe", "-c", "127.0.0.1", "-p", "6000"]).unwrap();
        let target = resolve_target(&args).unwrap();
        assert_eq!(target, "127.0.0.1:6000".parse().unwrap());
    }

    #[test]
    fn a_missing_target_is_rejected() {
        let args = Args::try_parse_from(["netprobe", "--server"]).unwrap();
        assert!(resolve_target(&args).is_err());
    }
}
