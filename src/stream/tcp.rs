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

/// size of the block pushed repeatedly by the client and of the server's read buffer
pub const BLOCK_SIZE: usize = 32 * 1024;

pub mod sender {
    use std::io::Write;
    use std::net::{SocketAddr, TcpStream};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use crate::recorder::StatRecorder;
    use crate::utils::unix_timestamp;
    use crate::Result;

    const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    const WRITE_TIMEOUT: Duration = Duration::from_millis(50);

    /// client role: pushes a continuous byte stream and reports sent-bandwidth
    /// over fixed intervals
    pub struct TcpSender {
        target: SocketAddr,
        duration: f64,
        interval: f64,
        staged_block: Vec<u8>,
    }

    impl TcpSender {
        pub fn new(target: SocketAddr, duration: f64, interval: f64) -> TcpSender {
            let mut staged_block = vec![0_u8; super::BLOCK_SIZE];
            for (i, block_i) in staged_block.iter_mut().enumerate() {
                //fill the block with a fixed sequence
                *block_i = (i % 256) as u8;
            }
            TcpSender {
                target,
                duration,
                interval,
                staged_block,
            }
        }

        /// runs the probe to completion; connection and transfer failures are
        /// logged and end the attempt early, with no retry
        pub fn run(&self, recorder: &Mutex<StatRecorder>) -> Result<()> {
            log::debug!("connecting to {}...", self.target);
            let mut stream = match TcpStream::connect_timeout(&self.target, CONNECT_TIMEOUT) {
                Ok(stream) => stream,
                Err(e) => {
                    log::error!("unable to connect to {}: {}", self.target, e);
                    return Ok(());
                }
            };
            // a bounded write keeps the duration check responsive when the
            // transport stops draining
            stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
            log::info!("connected to {}; sending for {} seconds", self.target, self.duration);

            let start = Instant::now();
            let total_duration = Duration::from_secs_f64(self.duration);
            let mut interval_start = Instant::now();
            let mut bytes_sent: u64 = 0;

            while start.elapsed() < total_duration {
                match stream.write(&self.staged_block) {
                    Ok(0) => {
                        log::warn!("{} closed the connection", self.target);
                        break;
                    }
                    Ok(size) => bytes_sent += size as u64,
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        //send-buffer is full; fall through to the interval check
                    }
                    Err(e) => {
                        log::error!("send failure to {}: {}", self.target, e);
                        break;
                    }
                }

                let elapsed = interval_start.elapsed().as_secs_f64();
                if elapsed >= self.interval {
                    let bandwidth = bytes_sent as f64 * 8.0 / elapsed / 1e6;
                    recorder
                        .lock()
                        .unwrap()
                        .record(unix_timestamp(), self.target, Some(bandwidth), None, None);
                    bytes_sent = 0;
                    interval_start = Instant::now();
                }
            }

            log::info!("probe complete; closing connection to {}", self.target);
            Ok(())
        }
    }

}

pub mod receiver {
    use std::io::Read;
    use std::net::{Shutdown, SocketAddr, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use crate::recorder::StatRecorder;
    use crate::utils::unix_timestamp;

    /// server role: drains one accepted connection until the peer closes,
    /// then records a single bandwidth sample over the connection's lifetime
    ///
    /// failures are swallowed here; a broken connection only costs its own
    /// remaining statistics
    pub fn handle_connection(mut stream: TcpStream, peer_addr: SocketAddr, recorder: Arc<Mutex<StatRecorder>>) {
        let mut buf = vec![0_u8; super::BLOCK_SIZE];
        let start = Instant::now();
        let mut bytes_received: u64 = 0;

        loop {
            match stream.read(&mut buf) {
                Ok(0) => break, //peer closed the stream
                Ok(size) => bytes_received += size as u64,
                Err(e) => {
                    log::debug!("[{}] transfer ended by error: {}", peer_addr, e);
                    break;
                }
            }
        }
        let elapsed = start.elapsed().as_secs_f64();

        //a connection that died before carrying any data yields no sample
        if bytes_received > 0 && elapsed > 0.0 {
            let bandwidth = bytes_received as f64 * 8.0 / elapsed / 1e6;
            log::info!(
                "[{}] received {} bytes over {:.3} seconds",
                peer_addr,
                bytes_received,
                elapsed
            );
            recorder
                .lock()
                .unwrap()
                .record(unix_timestamp(), peer_addr, Some(bandwidth), None, None);
        }
        let _ = stream.shutdown(Shutdown::Both);
    }
}
