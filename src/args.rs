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

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "netprobe",
    version,
    about = "generates synthetic TCP or UDP traffic between two endpoints and reports bandwidth, loss and jitter"
)]
pub struct Args {
    /// run in server mode, receiving probe traffic until interrupted
    #[arg(short, long, conflicts_with = "client")]
    pub server: bool,

    /// run in client mode, probing the given host
    #[arg(short, long, value_name = "HOST")]
    pub client: Option<String>,

    /// generate UDP traffic instead of TCP
    #[arg(short, long)]
    pub udp: bool,

    /// port to listen on (server) or connect to (client)
    #[arg(short, long, default_value_t = 5001)]
    pub port: u16,

    /// test duration in seconds (client only)
    #[arg(short = 't', long, default_value_t = 60.0)]
    pub duration: f64,

    /// seconds between statistics reports
    #[arg(short, long, default_value_t = 1.0)]
    pub interval: f64,

    /// target send rate in Kbit/s (UDP client only)
    #[arg(short, long, default_value_t = 1000)]
    pub rate: u64,

    /// acknowledge every datagram, enabling sender-side loss and jitter estimates (UDP only)
    #[arg(short, long)]
    pub ack: bool,

    /// file receiving one CSV row per recorded sample
    #[arg(long, value_name = "PATH", default_value = "net-stats.csv")]
    pub csv: PathBuf,

    /// disable the CSV sink entirely
    #[arg(long)]
    pub no_csv: bool,

    /// print the final summary as a JSON document
    #[arg(long)]
    pub json: bool,
}

pub(crate) fn validate_duration(duration: f64) -> f64 {
    if duration > 0.0 {
        duration
    } else {
        log::warn!("test duration must be positive; defaulting to 60 seconds");
        60.0
    }
}

pub(crate) fn validate_interval(interval: f64) -> f64 {
    if interval > 0.0 {
        interval
    } else {
        log::warn!("report interval must be positive; defaulting to 1 second");
        1.0
    }
}

pub(crate) fn validate_rate(rate: u64) -> u64 {
    if rate > 0 {
        rate
    } else {
        log::warn!("target rate must be positive; defaulting to 1000 Kbit/s");
        1000
    }
}
