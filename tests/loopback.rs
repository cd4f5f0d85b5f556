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

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use netprobe::recorder::StatRecorder;
use netprobe::stream::tcp;
use netprobe::stream::tcp::sender::TcpSender;
use netprobe::stream::udp::receiver::UdpStreamReceiver;
use netprobe::stream::udp::sender::UdpSender;

#[test]
fn tcp_probe_reports_from_both_ends() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let target = listener.local_addr().unwrap();
    let server_recorder = Arc::new(Mutex::new(StatRecorder::new()));

    let c_recorder = Arc::clone(&server_recorder);
    let server = thread::spawn(move || {
        let (stream, address) = listener.accept().unwrap();
        tcp::receiver::handle_connection(stream, address, c_recorder);
    });

    let client_recorder = Mutex::new(StatRecorder::new());
    TcpSender::new(target, 2.0, 1.0).run(&client_recorder).unwrap();
    server.join().unwrap();

    let client_recorder = client_recorder.lock().unwrap();
    let client_samples = client_recorder.samples();
    assert!(!client_samples.is_empty(), "the client should report at least one interval");
    for sample in client_samples {
        assert!(sample.bandwidth.unwrap() > 0.0);
        assert!(sample.loss.is_none());
        assert!(sample.jitter.is_none());
    }

    //the server reports exactly once, over the connection's whole lifetime
    let server_recorder = server_recorder.lock().unwrap();
    let server_samples = server_recorder.samples();
    assert_eq!(server_samples.len(), 1);
    let server_bandwidth = server_samples[0].bandwidth.unwrap();
    assert!(server_bandwidth > 0.0);

    //both ends watched the same transfer, so the figures should be in the
    //same ballpark
    let client_average = client_samples.iter().filter_map(|s| s.bandwidth).sum::<f64>() / client_samples.len() as f64;
    let ratio = server_bandwidth / client_average;
    assert!(ratio > 0.2 && ratio < 5.0, "bandwidth ratio out of range: {}", ratio);
}

#[test]
fn udp_ack_round_trip_measures_clean_delivery() {
    let server_recorder = Arc::new(Mutex::new(StatRecorder::new()));
    let mut receiver = UdpStreamReceiver::new(0, 0.5, true).unwrap();
    let target = SocketAddr::new(
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        receiver.local_addr().unwrap().port(),
    );

    let alive = Arc::new(AtomicBool::new(true));
    let c_alive = Arc::clone(&alive);
    let c_recorder = Arc::clone(&server_recorder);
    let server = thread::spawn(move || {
        receiver.run(&c_recorder, move || c_alive.load(Ordering::Relaxed)).unwrap();
    });

    let client_recorder = Mutex::new(StatRecorder::new());
    UdpSender::new(target, 1.6, 0.5, 2000, true)
        .run(&client_recorder)
        .unwrap();

    alive.store(false, Ordering::Relaxed);
    server.join().unwrap();

    let client_recorder = client_recorder.lock().unwrap();
    let client_samples = client_recorder.samples();
    assert!(client_samples.len() >= 2, "expected several ack-mode intervals");
    for sample in client_samples {
        assert!(sample.bandwidth.unwrap() > 0.0);
        //acks straddling an interval boundary shift the estimate slightly in
        //either direction, but loopback delivery itself is lossless
        assert!(sample.loss.unwrap().abs() < 5.0, "loss estimate too large: {:?}", sample.loss);
        assert!(sample.jitter.unwrap() >= 0.0);
    }

    let server_recorder = server_recorder.lock().unwrap();
    let server_samples = server_recorder.samples();
    assert!(!server_samples.is_empty(), "the receiver should flush at least one interval");
    for sample in server_samples {
        assert_eq!(sample.loss, Some(0.0), "loopback delivery saw a sequence gap");
        assert!(sample.bandwidth.unwrap() > 0.0);
        assert!(sample.jitter.unwrap() < 50.0, "implausible loopback jitter: {:?}", sample.jitter);
    }
}
