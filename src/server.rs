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

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::args::{validate_interval, Args};
use crate::recorder::StatRecorder;
use crate::stream::{tcp, udp};
use crate::Result;

const POLL_TIMEOUT: Duration = Duration::from_millis(500);

#[cfg(unix)]
const KEEPALIVE_DURATION: Duration = Duration::from_secs(5);

/// when false, the system is shutting down
static ALIVE: AtomicBool = AtomicBool::new(true);

/// a count of in-flight TCP transfers
static CLIENTS: AtomicU16 = AtomicU16::new(0);

/// flags the server loops to wind down; returns whether the system was
/// previously alive
pub fn kill() -> bool {
    ALIVE.swap(false, Ordering::Relaxed)
}

pub(crate) fn is_alive() -> bool {
    ALIVE.load(Ordering::Relaxed)
}

/// a panic-tolerant means of accounting for a finished transfer
struct ClientThreadMonitor {
    client_address: String,
}

impl Drop for ClientThreadMonitor {
    fn drop(&mut self) {
        CLIENTS.fetch_sub(1, Ordering::Relaxed);
        if thread::panicking() {
            log::warn!("[{}] handler terminated by panic", self.client_address);
        } else {
            log::info!("[{}] disconnected", self.client_address);
        }
    }
}

/// runs the selected receiver until the process is interrupted; bind failures
/// are fatal and propagate
pub fn serve(args: &Args, recorder: Arc<Mutex<StatRecorder>>) -> Result<()> {
    if args.udp {
        serve_udp(args, recorder)
    } else {
        serve_tcp(args, recorder)
    }
}

fn serve_tcp(args: &Args, recorder: Arc<Mutex<StatRecorder>>) -> Result<()> {
    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port))?;
    //non-blocking accept so the shutdown flag is observed between clients
    listener.set_nonblocking(true)?;
    log::info!("TCP server listening on {}", listener.local_addr()?);

    while is_alive() {
        let (stream, address) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                //no pending clients
                thread::sleep(POLL_TIMEOUT);
                continue;
            }
            Err(e) => {
                return Err(e.into());
            }
        };

        log::info!("connection from {}", address);

        #[cfg(unix)]
        {
            let keepalive_parameters = socket2::TcpKeepalive::new().with_time(KEEPALIVE_DURATION);
            let raw_socket = socket2::SockRef::from(&stream);
            if let Err(e) = raw_socket.set_tcp_keepalive(&keepalive_parameters) {
                log::warn!("unable to set keepalive on [{}]: {}", address, e);
            }
        }

        CLIENTS.fetch_add(1, Ordering::Relaxed);
        let c_recorder = Arc::clone(&recorder);
        let thread_builder = thread::Builder::new().name(address.to_string());
        thread_builder.spawn(move || {
            //ensure the transfer is accounted for even if the handler panics
            let _client_thread_monitor = ClientThreadMonitor {
                client_address: address.to_string(),
            };
            tcp::receiver::handle_connection(stream, address, c_recorder);
        })?;
    }

    //handlers are left to finish on their own; the process-exit path does not
    //depend on them
    let in_flight = CLIENTS.load(Ordering::Relaxed);
    if in_flight > 0 {
        log::info!("shutting down with {} transfers still in flight", in_flight);
    } else {
        log::info!("server shutdown complete");
    }
    Ok(())
}

fn serve_udp(args: &Args, recorder: Arc<Mutex<StatRecorder>>) -> Result<()> {
    let interval = validate_interval(args.interval);
    let mut receiver = udp::receiver::UdpStreamReceiver::new(args.port, interval, args.ack)?;
    //the configured rate is informational on this side
    log::info!("expecting paced streams of about {} Kbit/s", args.rate);
    receiver.run(&recorder, is_alive)
}
