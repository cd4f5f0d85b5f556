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

/// wire header: a 4-byte sequence number followed by an 8-byte send
/// timestamp, both big-endian
pub const HEADER_SIZE: usize = 12;
/// total datagram payload: header plus fixed padding
pub const PAYLOAD_SIZE: usize = 1024;
/// acknowledgments carry just the echoed sequence number
pub const ACK_SIZE: usize = 4;
/// reserved for the end-of-stream sentinel; data sequences start at 1
pub const TERMINATION_SEQUENCE: u32 = 0;

pub(crate) fn encode_header(buf: &mut [u8], sequence: u32, timestamp: f64) {
    buf[0..4].copy_from_slice(&sequence.to_be_bytes());
    buf[4..12].copy_from_slice(&timestamp.to_be_bytes());
}

/// returns the sequence number and send timestamp, or None for datagrams too
/// short to carry the header
pub(crate) fn decode_header(buf: &[u8]) -> Option<(u32, f64)> {
    if buf.len() < HEADER_SIZE {
        return None;
    }
    let sequence = u32::from_be_bytes(buf[0..4].try_into().ok()?);
    let timestamp = f64::from_be_bytes(buf[4..12].try_into().ok()?);
    Some((sequence, timestamp))
}

pub mod sender {
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
    use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
    use std::sync::{Arc, Mutex};
    use std::thread::{self, sleep};
    use std::time::{Duration, Instant};

    use crate::recorder::StatRecorder;
    use crate::utils::unix_timestamp;
    use crate::Result;

    const ACK_READ_TIMEOUT: Duration = Duration::from_millis(10);
    /// pending sends older than this are treated as lost and pruned
    const ACK_RETENTION: Duration = Duration::from_secs(2);

    /// correlation state shared between the pacing loop and the ack-listener
    /// thread; holding the table behind a mutex keeps the send cadence free of
    /// receive-side stalls
    #[derive(Default)]
    pub(crate) struct AckTracker {
        pending: HashMap<u32, f64>,
        acked_packets: u64,
        acked_bytes: u64,
        jitter_sum: f64,
        expired: u64,
        last_ack_arrival: Option<f64>,
        last_acked_send: Option<f64>,
    }

    impl AckTracker {
        fn stage(&mut self, sequence: u32, send_timestamp: f64) {
            self.pending.insert(sequence, send_timestamp);
        }

        fn acknowledge(&mut self, sequence: u32, arrival: f64) {
            let Some(send_timestamp) = self.pending.remove(&sequence) else {
                log::debug!("ack for unknown or expired sequence {}", sequence);
                return;
            };
            self.acked_packets += 1;
            self.acked_bytes += super::PAYLOAD_SIZE as u64;
            if let (Some(last_arrival), Some(last_send)) = (self.last_ack_arrival, self.last_acked_send) {
                //spread between consecutive ack arrivals versus the original send spacing
                self.jitter_sum += ((arrival - last_arrival) - (send_timestamp - last_send)).abs();
            }
            self.last_ack_arrival = Some(arrival);
            self.last_acked_send = Some(send_timestamp);
        }

        /// drops pending entries older than the retention window, counting
        /// them as unacknowledged
        fn prune(&mut self, now: f64) {
            let horizon = now - ACK_RETENTION.as_secs_f64();
            let before = self.pending.len();
            self.pending.retain(|_, sent| *sent >= horizon);
            self.expired += (before - self.pending.len()) as u64;
        }

        /// takes and resets the per-interval counters; the pending table and
        /// the jitter chain survive across intervals
        fn take_interval(&mut self) -> (u64, u64, f64, u64) {
            let taken = (self.acked_packets, self.acked_bytes, self.jitter_sum, self.expired);
            self.acked_packets = 0;
            self.acked_bytes = 0;
            self.jitter_sum = 0.0;
            self.expired = 0;
            taken
        }
    }

    /// client role: emits fixed-size datagrams at a target bit rate and, when
    /// acknowledgments are requested, derives round-trip loss and jitter from
    /// the echoes
    pub struct UdpSender {
        target: SocketAddr,
        duration: f64,
        interval: f64,
        rate_kbps: u64,
        ack_mode: bool,
        staged_packet: Vec<u8>,
    }

    impl UdpSender {
        pub fn new(target: SocketAddr, duration: f64, interval: f64, rate_kbps: u64, ack_mode: bool) -> UdpSender {
            let mut staged_packet = vec![0_u8; super::PAYLOAD_SIZE];
            for (i, packet_i) in staged_packet.iter_mut().enumerate().skip(super::HEADER_SIZE) {
                //fill the padding with a fixed sequence
                *packet_i = (i % 256) as u8;
            }
            UdpSender {
                target,
                duration,
                interval,
                rate_kbps,
                ack_mode,
                staged_packet,
            }
        }

        /// seconds between sends that approximate the target rate for the
        /// fixed payload size
        pub fn send_interval(rate_kbps: u64) -> f64 {
            (super::PAYLOAD_SIZE * 8) as f64 / (rate_kbps as f64 * 1000.0)
        }

        pub fn run(&mut self, recorder: &Mutex<StatRecorder>) -> Result<()> {
            let socket = match UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)) {
                Ok(socket) => socket,
                Err(e) => {
                    log::error!("unable to open a UDP socket: {}", e);
                    return Ok(());
                }
            };
            if let Err(e) = socket.connect(self.target) {
                log::error!("unable to address {}: {}", self.target, e);
                return Ok(());
            }

            let pacing = Duration::from_secs_f64(Self::send_interval(self.rate_kbps));
            log::info!(
                "sending to {} at {} Kbit/s ({}-byte datagrams every {:.4}s) for {} seconds",
                self.target,
                self.rate_kbps,
                super::PAYLOAD_SIZE,
                pacing.as_secs_f64(),
                self.duration
            );

            let tracker = Arc::new(Mutex::new(AckTracker::default()));
            let listener_stop = Arc::new(AtomicBool::new(false));
            let mut listener_handle = None;
            if self.ack_mode {
                let c_socket = socket.try_clone()?;
                c_socket.set_read_timeout(Some(ACK_READ_TIMEOUT))?;
                let c_tracker = Arc::clone(&tracker);
                let c_stop = Arc::clone(&listener_stop);
                listener_handle = Some(
                    thread::Builder::new()
                        .name("ack-listener".to_string())
                        .spawn(move || ack_listener(c_socket, c_tracker, c_stop))?,
                );
            }

            let start = Instant::now();
            let total_duration = Duration::from_secs_f64(self.duration);
            let mut interval_start = Instant::now();
            let mut sequence: u32 = 1;
            let mut sent_in_interval: u64 = 0;

            while start.elapsed() < total_duration {
                let send_timestamp = unix_timestamp();
                super::encode_header(&mut self.staged_packet, sequence, send_timestamp);
                if let Err(e) = socket.send(&self.staged_packet) {
                    log::error!("unable to send datagram to {}: {}", self.target, e);
                    break;
                }
                if self.ack_mode {
                    tracker.lock().unwrap().stage(sequence, send_timestamp);
                }
                sent_in_interval += 1;
                sequence = sequence.wrapping_add(1);
                if sequence == super::TERMINATION_SEQUENCE {
                    //the sentinel is never a data sequence
                    sequence = 1;
                }

                if self.ack_mode {
                    let elapsed = interval_start.elapsed().as_secs_f64();
                    if elapsed >= self.interval {
                        self.report_interval(recorder, &tracker, elapsed, sent_in_interval);
                        sent_in_interval = 0;
                        interval_start = Instant::now();
                    }
                }

                sleep(pacing);
            }

            //best-effort end-of-stream signal; the receiver absorbs it silently
            super::encode_header(&mut self.staged_packet, super::TERMINATION_SEQUENCE, unix_timestamp());
            if let Err(e) = socket.send(&self.staged_packet) {
                log::warn!("unable to send the termination datagram: {}", e);
            }

            listener_stop.store(true, Relaxed);
            if let Some(handle) = listener_handle {
                if handle.join().is_err() {
                    log::error!("ack-listener thread panicked");
                }
            }
            log::info!("probe complete; {} datagrams sent to {}", sequence - 1, self.target);
            Ok(())
        }

        fn report_interval(
            &self,
            recorder: &Mutex<StatRecorder>,
            tracker: &Mutex<AckTracker>,
            elapsed: f64,
            sent_in_interval: u64,
        ) {
            let (acked, acked_bytes, jitter_sum, expired) = {
                let mut tracker = tracker.lock().unwrap();
                tracker.prune(unix_timestamp());
                tracker.take_interval()
            };
            if expired > 0 {
                log::debug!("{} pending sends expired unacknowledged", expired);
            }

            let bandwidth = acked_bytes as f64 * 8.0 / elapsed / 1e6;
            let jitter_ms = if acked > 1 {
                jitter_sum / (acked - 1) as f64 * 1000.0
            } else {
                0.0
            };
            let loss = (1.0 - acked as f64 / sent_in_interval as f64) * 100.0;
            if loss < 0.0 {
                //more acks than sends in the window: arrivals straddled the
                //interval boundary, which reads as reordering rather than loss
                log::debug!("negative loss estimate ({:.2}%) across an interval boundary", loss);
            }
            recorder
                .lock()
                .unwrap()
                .record(unix_timestamp(), self.target, Some(bandwidth), Some(loss), Some(jitter_ms));
        }
    }

    fn ack_listener(socket: UdpSocket, tracker: Arc<Mutex<AckTracker>>, stop: Arc<AtomicBool>) {
        let mut buf = [0_u8; super::ACK_SIZE];
        while !stop.load(Relaxed) {
            let size = match socket.recv(&mut buf) {
                Ok(size) => size,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                    //receive timeout; check the stop flag again
                    continue;
                }
                Err(e) => {
                    log::debug!("ack socket closed: {}", e);
                    break;
                }
            };
            if size < super::ACK_SIZE {
                log::debug!("ignoring undersized {}-byte acknowledgment", size);
                continue;
            }
            let sequence = u32::from_be_bytes(buf);
            tracker.lock().unwrap().acknowledge(sequence, unix_timestamp());
        }
    }

}

pub mod receiver {
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::recorder::StatRecorder;
    use crate::utils::unix_timestamp;
    use crate::Result;

    const READ_TIMEOUT: Duration = Duration::from_millis(250);
    /// peers silent for this long are dropped from the tracking table
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
    const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

    /// per-sender running state, keyed by the sender's address; counters cover
    /// the current report interval, the sequence mark and jitter chain span
    /// the peer's lifetime
    struct PeerState {
        packets_received: u64,
        bytes_received: u64,
        highest_sequence: u32,
        interval_start_sequence: u32,
        lost_packets: u64,
        jitter_sum: f64,
        last_arrival: Option<f64>,
        last_send_timestamp: Option<f64>,
        interval_start: f64,
        last_activity: f64,
    }

    impl PeerState {
        fn new(now: f64) -> PeerState {
            PeerState {
                packets_received: 0,
                bytes_received: 0,
                highest_sequence: 0,
                interval_start_sequence: 0,
                lost_packets: 0,
                jitter_sum: 0.0,
                last_arrival: None,
                last_send_timestamp: None,
                interval_start: now,
                last_activity: now,
            }
        }
    }

    /// server role: receives paced datagrams from any number of peers,
    /// tracking loss and jitter independently per sender address
    pub struct UdpStreamReceiver {
        socket: UdpSocket,
        interval: f64,
        ack_mode: bool,
        peers: HashMap<SocketAddr, PeerState>,
        last_sweep: f64,
    }

    impl UdpStreamReceiver {
        pub fn new(port: u16, interval: f64, ack_mode: bool) -> Result<UdpStreamReceiver> {
            let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))?;
            //a bounded read keeps the shutdown flag responsive
            socket.set_read_timeout(Some(READ_TIMEOUT))?;
            log::info!("UDP server listening on {}", socket.local_addr()?);
            Ok(UdpStreamReceiver {
                socket,
                interval,
                ack_mode,
                peers: HashMap::new(),
                last_sweep: unix_timestamp(),
            })
        }

        pub fn local_addr(&self) -> Result<SocketAddr> {
            Ok(self.socket.local_addr()?)
        }

        /// receive loop; runs until the liveness check fails
        pub fn run(&mut self, recorder: &Mutex<StatRecorder>, is_alive: impl Fn() -> bool) -> Result<()> {
            let mut buf = vec![0_u8; 65535];
            while is_alive() {
                let (size, peer_addr) = match self.socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {
                        self.maybe_sweep(unix_timestamp());
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };

                let arrival = unix_timestamp();
                if let Some(sequence) = self.process_datagram(peer_addr, &buf[..size], arrival, recorder) {
                    if self.ack_mode {
                        if let Err(e) = self.socket.send_to(&sequence.to_be_bytes(), peer_addr) {
                            log::debug!("unable to acknowledge {} to {}: {}", sequence, peer_addr, e);
                        }
                    }
                }
                self.maybe_sweep(arrival);
            }
            log::info!("UDP server shutting down; {} peers tracked", self.peers.len());
            Ok(())
        }

        /// applies one datagram to the per-peer state and returns the sequence
        /// to acknowledge, if the datagram was well-formed probe data
        fn process_datagram(
            &mut self,
            peer_addr: SocketAddr,
            payload: &[u8],
            arrival: f64,
            recorder: &Mutex<StatRecorder>,
        ) -> Option<u32> {
            let Some((sequence, send_timestamp)) = super::decode_header(payload) else {
                log::debug!("ignoring undersized {}-byte datagram from {}", payload.len(), peer_addr);
                return None;
            };
            if sequence == super::TERMINATION_SEQUENCE {
                //end-of-stream signal; absorbed without touching peer state
                log::debug!("end-of-stream sentinel from {}", peer_addr);
                return None;
            }

            let state = self.peers.entry(peer_addr).or_insert_with(|| {
                log::info!("new probe stream from {}", peer_addr);
                PeerState::new(arrival)
            });

            state.packets_received += 1;
            state.bytes_received += payload.len() as u64;
            state.last_activity = arrival;

            if sequence > state.highest_sequence {
                let gap = sequence - state.highest_sequence - 1;
                if gap > 0 {
                    //everything between the mark and this arrival is assumed lost
                    log::debug!("sequence gap of {} packets from {}", gap, peer_addr);
                    state.lost_packets += gap as u64;
                }
                state.highest_sequence = sequence;
            }
            //a late or duplicate sequence leaves the mark alone but still
            //counts as received, so interval loss can go negative before the
            //report-time clamp

            if let (Some(last_arrival), Some(last_send)) = (state.last_arrival, state.last_send_timestamp) {
                state.jitter_sum += ((arrival - last_arrival) - (send_timestamp - last_send)).abs();
            }
            state.last_arrival = Some(arrival);
            state.last_send_timestamp = Some(send_timestamp);

            let elapsed = arrival - state.interval_start;
            if elapsed >= self.interval {
                flush_peer(recorder, peer_addr, state, arrival, elapsed);
            }
            Some(sequence)
        }

        /// drops peers that have gone quiet, at most once per sweep interval
        fn maybe_sweep(&mut self, now: f64) {
            if now - self.last_sweep < SWEEP_INTERVAL.as_secs_f64() {
                return;
            }
            self.last_sweep = now;
            self.evict_idle(now);
        }

        fn evict_idle(&mut self, now: f64) {
            let idle = IDLE_TIMEOUT.as_secs_f64();
            self.peers.retain(|peer_addr, state| {
                if now - state.last_activity >= idle {
                    log::info!("dropping idle peer {}", peer_addr);
                    false
                } else {
                    true
                }
            });
        }
    }

    /// records one sample for the peer and resets its interval counters
    fn flush_peer(recorder: &Mutex<StatRecorder>, peer_addr: SocketAddr, state: &mut PeerState, now: f64, elapsed: f64) {
        let bandwidth = state.bytes_received as f64 * 8.0 / elapsed / 1e6;
        let jitter_ms = if state.packets_received > 1 {
            state.jitter_sum / (state.packets_received - 1) as f64 * 1000.0
        } else {
            0.0
        };
        //sequences expected this interval: movement of the high-water mark
        let expected = f64::from(state.highest_sequence - state.interval_start_sequence);
        let loss = if expected > 0.0 {
            ((expected - state.packets_received as f64) / expected * 100.0).max(0.0)
        } else {
            0.0
        };
        log::debug!("[{}] {} packets lost to gaps so far", peer_addr, state.lost_packets);

        recorder
            .lock()
            .unwrap()
            .record(now, peer_addr, Some(bandwidth), Some(loss), Some(jitter_ms));

        state.packets_received = 0;
        state.bytes_received = 0;
        state.jitter_sum = 0.0;
        state.interval_start = now;
        state.interval_start_sequence = state.highest_sequence;
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::stream::udp::{encode_header, HEADER_SIZE, PAYLOAD_SIZE, TERMINATION_SEQUENCE};

        fn receiver(interval: f64) -> UdpStreamReceiver {
            UdpStreamReceiver::new(0, interval, false).unwrap()
        }

        fn peer() -> SocketAddr {
            "10.0.0.7:40000".parse().unwrap()
        }

        fn datagram(sequence: u32, timestamp: f64) -> Vec<u8> {
            let mut payload = vec![0_u8; PAYLOAD_SIZE];
            encode_header(&mut payload, sequence, timestamp);
            payload
        }

        #[test]
        fn gapless_uniform_stream_reports_zero_loss_and_jitter() {
            let mut receiver = receiver(1.0);
            let recorder = Mutex::new(StatRecorder::new());

            //sends 0.1s apart, arriving with a constant 0.5s one-way delay
            for i in 0..10_u32 {
                let send = 100.0 + f64::from(i) * 0.1;
                let ack = receiver.process_datagram(peer(), &datagram(i + 1, send), send + 0.5, &recorder);
                assert_eq!(ack, Some(i + 1));
            }
            //the 11th arrival crosses the interval boundary and flushes
            receiver.process_datagram(peer(), &datagram(11, 101.1), 101.6, &recorder);

            let recorder = recorder.lock().unwrap();
            let samples = recorder.samples();
            assert_eq!(samples.len(), 1);
            assert_eq!(samples[0].loss, Some(0.0));
            //constant one-way delay contributes nothing to the estimator
            assert!(samples[0].jitter.unwrap().abs() < 1e-6);
            assert!(samples[0].bandwidth.unwrap() > 0.0);
            assert_eq!(samples[0].peer, peer());
        }

        #[test]
        fn sequence_gaps_read_as_loss() {
            let mut receiver = receiver(1.0);
            let recorder = Mutex::new(StatRecorder::new());

            //sequences 3 and 4 never arrive
            receiver.process_datagram(peer(), &datagram(1, 100.0), 100.0, &recorder);
            receiver.process_datagram(peer(), &datagram(2, 100.1), 100.1, &recorder);
            receiver.process_datagram(peer(), &datagram(5, 100.4), 101.2, &recorder);

            let recorder = recorder.lock().unwrap();
            let samples = recorder.samples();
            assert_eq!(samples.len(), 1);
            //5 sequences expected, 3 received
            assert_eq!(samples[0].loss, Some(40.0));
        }

        #[test]
        fn wider_gaps_report_more_loss() {
            let losses: Vec<f64> = [3_u32, 5, 9]
                .iter()
                .map(|&last| {
                    let mut receiver = receiver(1.0);
                    let recorder = Mutex::new(StatRecorder::new());
                    receiver.process_datagram(peer(), &datagram(1, 100.0), 100.0, &recorder);
                    receiver.process_datagram(peer(), &datagram(last, 100.1), 101.2, &recorder);
                    let recorder = recorder.lock().unwrap();
                    recorder.samples()[0].loss.unwrap()
                })
                .collect();
            assert!(losses[0] < losses[1] && losses[1] < losses[2]);
        }

        #[test]
        fn late_sequences_leave_the_mark_but_count_as_received() {
            let mut receiver = receiver(10.0);
            let recorder = Mutex::new(StatRecorder::new());

            receiver.process_datagram(peer(), &datagram(5, 100.0), 100.0, &recorder);
            receiver.process_datagram(peer(), &datagram(3, 100.1), 100.2, &recorder);

            let state = receiver.peers.get(&peer()).unwrap();
            assert_eq!(state.highest_sequence, 5);
            assert_eq!(state.packets_received, 2);
            //the first arrival opened a gap of four assumed-lost packets
            assert_eq!(state.lost_packets, 4);
        }

        #[test]
        fn undersized_datagrams_change_nothing() {
            let mut receiver = receiver(1.0);
            let recorder = Mutex::new(StatRecorder::new());

            let runt = vec![0_u8; HEADER_SIZE - 1];
            assert_eq!(receiver.process_datagram(peer(), &runt, 100.0, &recorder), None);
            assert!(receiver.peers.is_empty());
            assert!(recorder.lock().unwrap().samples().is_empty());
        }

        #[test]
        fn the_sentinel_is_absorbed_silently() {
            let mut receiver = receiver(1.0);
            let recorder = Mutex::new(StatRecorder::new());

            let sentinel = datagram(TERMINATION_SEQUENCE, 100.0);
            assert_eq!(receiver.process_datagram(peer(), &sentinel, 100.0, &recorder), None);
            assert!(receiver.peers.is_empty());

            //established peers are equally untouched
            receiver.process_datagram(peer(), &datagram(1, 100.0), 100.0, &recorder);
            receiver.process_datagram(peer(), &sentinel, 100.1, &recorder);
            assert_eq!(receiver.peers.get(&peer()).unwrap().packets_received, 1);
        }

        #[test]
        fn peers_are_tracked_independently() {
            let mut receiver = receiver(1.0);
            let recorder = Mutex::new(StatRecorder::new());
            let other: SocketAddr = "10.0.0.8:40001".parse().unwrap();

            receiver.process_datagram(peer(), &datagram(1, 100.0), 100.0, &recorder);
            receiver.process_datagram(other, &datagram(7, 100.0), 100.0, &recorder);

            assert_eq!(receiver.peers.get(&peer()).unwrap().highest_sequence, 1);
            assert_eq!(receiver.peers.get(&other).unwrap().highest_sequence, 7);
        }

        #[test]
        fn interval_counters_reset_after_a_flush() {
            let mut receiver = receiver(1.0);
            let recorder = Mutex::new(StatRecorder::new());

            receiver.process_datagram(peer(), &datagram(1, 100.0), 100.0, &recorder);
            receiver.process_datagram(peer(), &datagram(2, 100.1), 101.1, &recorder);

            let state = receiver.peers.get(&peer()).unwrap();
            assert_eq!(state.packets_received, 0);
            assert_eq!(state.bytes_received, 0);
            assert_eq!(state.interval_start_sequence, 2);
            assert_eq!(state.interval_start, 101.1);

            //the next interval only answers for sequences beyond the new mark
            receiver.process_datagram(peer(), &datagram(3, 100.2), 101.2, &recorder);
            receiver.process_datagram(peer(), &datagram(4, 100.3), 102.2, &recorder);
            let recorder = recorder.lock().unwrap();
            let samples = recorder.samples();
            assert_eq!(samples.len(), 2);
            assert_eq!(samples[1].loss, Some(0.0));
        }

        #[test]
        fn idle_peers_are_evicted() {
            let mut receiver = receiver(1.0);
            let recorder = Mutex::new(StatRecorder::new());

            receiver.process_datagram(peer(), &datagram(1, 100.0), 100.0, &recorder);
            receiver.evict_idle(130.0);
            assert_eq!(receiver.peers.len(), 1);
            receiver.evict_idle(161.0);
            assert!(receiver.peers.is_empty());
        }
    }
}
