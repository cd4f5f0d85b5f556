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

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::net::SocketAddr;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::Result;

const SINK_HEADER: &str = "source_ip,source_port,timestamp,elapsed_seconds,bandwidth_mbps,loss_percent,jitter_ms";

/// one timestamped measurement; any subset of the metrics may be present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// wall-clock seconds since the UNIX epoch
    pub timestamp: f64,
    /// the peer this measurement describes
    pub peer: SocketAddr,
    /// megabits per second
    pub bandwidth: Option<f64>,
    /// percent of expected packets that never arrived
    pub loss: Option<f64>,
    /// milliseconds of delay variation
    pub jitter: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub samples: usize,
}

/// running statistics over everything recorded so far; metrics are summarized
/// independently, so a sample missing one metric still contributes the others
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub started: f64,
    pub duration: f64,
    pub samples: usize,
    pub bandwidth: Option<MetricSummary>,
    pub loss: Option<MetricSummary>,
    pub jitter: Option<MetricSummary>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.samples == 0 {
            return write!(f, "no statistics recorded");
        }
        write!(f, "test summary:")?;
        let nanoseconds = (self.started.fract() * 1_000_000_000.0) as u32;
        if let Some(started) = NaiveDateTime::from_timestamp_opt(self.started as i64, nanoseconds) {
            write!(f, "\n  started:   {} UTC", started.format("%Y-%m-%d %H:%M:%S"))?;
        }
        write!(f, "\n  duration:  {:.3} seconds over {} samples", self.duration, self.samples)?;
        if let Some(m) = &self.bandwidth {
            write!(
                f,
                "\n  bandwidth: average {:.2} Mbit/s, minimum {:.2}, maximum {:.2} ({} samples)",
                m.average, m.minimum, m.maximum, m.samples
            )?;
        }
        if let Some(m) = &self.loss {
            write!(
                f,
                "\n  loss:      average {:.2}%, minimum {:.2}, maximum {:.2} ({} samples)",
                m.average, m.minimum, m.maximum, m.samples
            )?;
        }
        if let Some(m) = &self.jitter {
            write!(
                f,
                "\n  jitter:    average {:.2} ms, minimum {:.2}, maximum {:.2} ({} samples)",
                m.average, m.minimum, m.maximum, m.samples
            )?;
        }
        Ok(())
    }
}

/// append-only store for measurement samples, with an optional row-oriented
/// sink; shared across handler threads behind a mutex, which also serializes
/// the sink writes
#[derive(Default)]
pub struct StatRecorder {
    samples: Vec<Sample>,
    sink: Option<BufWriter<File>>,
}

impl StatRecorder {
    pub fn new() -> StatRecorder {
        StatRecorder::default()
    }

    /// creates the sink file, truncating anything already there, and writes the header row
    pub fn with_sink<P: AsRef<Path>>(path: P) -> Result<StatRecorder> {
        let file = File::create(path.as_ref())?;
        let mut sink = BufWriter::new(file);
        writeln!(sink, "{}", SINK_HEADER)?;
        sink.flush()?;
        Ok(StatRecorder {
            samples: Vec::new(),
            sink: Some(sink),
        })
    }

    /// appends a sample, mirrors it to the sink if one is configured, and
    /// prints a single human-readable line with whichever metrics are present
    pub fn record(
        &mut self,
        timestamp: f64,
        peer: SocketAddr,
        bandwidth: Option<f64>,
        loss: Option<f64>,
        jitter: Option<f64>,
    ) {
        let elapsed = match self.samples.first() {
            Some(first) => timestamp - first.timestamp,
            None => 0.0,
        };
        self.samples.push(Sample {
            timestamp,
            peer,
            bandwidth,
            loss,
            jitter,
        });

        if let Some(sink) = self.sink.as_mut() {
            // flushed per row so completed measurements survive an abrupt shutdown
            let outcome = writeln!(
                sink,
                "{},{},{:.3},{:.3},{},{},{}",
                peer.ip(),
                peer.port(),
                timestamp,
                elapsed,
                format_metric(bandwidth),
                format_metric(loss),
                format_metric(jitter)
            )
            .and_then(|_| sink.flush());
            if let Err(e) = outcome {
                log::warn!("unable to write statistics row: {}", e);
            }
        }

        let mut line = format!("[{}] {:.3}s", peer, elapsed);
        if let Some(bandwidth) = bandwidth {
            line.push_str(&format!("  bandwidth {:.2} Mbit/s", bandwidth));
        }
        if let Some(loss) = loss {
            line.push_str(&format!("  loss {:.2}%", loss));
        }
        if let Some(jitter) = jitter {
            line.push_str(&format!("  jitter {:.2} ms", jitter));
        }
        println!("{}", line);
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn summarize(&self) -> Summary {
        let (started, duration) = match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp - first.timestamp),
            _ => (0.0, 0.0),
        };
        Summary {
            started,
            duration,
            samples: self.samples.len(),
            bandwidth: summarize_metric(self.samples.iter().filter_map(|s| s.bandwidth)),
            loss: summarize_metric(self.samples.iter().filter_map(|s| s.loss)),
            jitter: summarize_metric(self.samples.iter().filter_map(|s| s.jitter)),
        }
    }

    /// releases the sink; safe to call more than once
    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                log::warn!("unable to flush statistics sink: {}", e);
            }
            log::debug!("statistics sink closed");
        }
    }
}

impl Drop for StatRecorder {
    fn drop(&mut self) {
        self.close();
    }
}

fn format_metric(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn summarize_metric(values: impl Iterator<Item = f64>) -> Option<MetricSummary> {
    let mut count = 0_usize;
    let mut sum = 0.0;
    let mut minimum = f64::INFINITY;
    let mut maximum = f64::NEG_INFINITY;
    for value in values {
        count += 1;
        sum += value;
        minimum = minimum.min(value);
        maximum = maximum.max(value);
    }
    if count == 0 {
        None
    } else {
        Some(MetricSummary {
            average: sum / count as f64,
            minimum,
            maximum,
            samples: count,
        })
    }
}
