//! # Sensor Stream Reconstruction
//!
//! Drives the incremental parsers over every byte read from the transport,
//! reassembles checksummed (temperature, humidity, checksum) records,
//! aggregates accepted records over a sliding time window and emits one
//! rendered line per elapsed interval.
//!
//! The device link is noisy: bytes of different lines may be malformed or
//! interleaved, so every byte is offered to both the error-token parser and
//! the float parser, and any line terminator forces a full resynchronization
//! regardless of partial-token state. Malformed data never corrupts the
//! aggregation window; it only costs the record it belonged to.

use crate::config::Config;
use crate::parse::{ErrTokenParser, ErrTokenState, FloatParser, ParseStatus};
use crate::render::{RenderError, TemplateRenderer};
use chrono::{Local, Utc};
use log::{debug, error, info};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Size of the transport read buffer in bytes.
pub const INPUT_BUFFER_SIZE: usize = 64;

/// Bounded read timeout. This also bounds the worst-case shutdown latency,
/// since the shutdown flag is polled once per read.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Soft integrity tolerance for the additive record checksum. A framing
/// check for a noisy link, not a security control.
const CHECKSUM_TOLERANCE: f32 = 0.001;

/// Outcome of one bounded-timeout transport read.
#[derive(Debug)]
pub enum ReadEvent {
    /// The buffer prefix of this length holds fresh bytes.
    Data(usize),
    /// The timeout elapsed without data; not an error.
    TimedOut,
    /// The read was interrupted by an external shutdown signal.
    Interrupted,
}

/// Boundary to the byte-oriented transport.
///
/// Implementations must return within a bounded time (see [`READ_TIMEOUT`])
/// and distinguish an explicit interruption from a real read failure.
pub trait ByteSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<ReadEvent>;
}

/// Fatal reconstruction-loop errors.
#[derive(Error, Debug)]
pub enum ReconstructError {
    /// A transport read failed for a reason other than interruption.
    #[error("failed to read data from remote device")]
    Read(#[source] io::Error),

    /// The output template is statically misconfigured.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The rendered line could not be written to the sink.
    #[error("failed to write formatted sensor data")]
    Write(#[source] io::Error),
}

/// Position in the 3-field record cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Field {
    Temperature,
    Humidity,
    Checksum,
}

/// Sums and count covering one emission interval.
#[derive(Debug)]
struct AggregationWindow {
    sum_temperature: f32,
    sum_humidity: f32,
    accepted_count: usize,
    started_at: Instant,
}

impl AggregationWindow {
    fn new(now: Instant) -> Self {
        AggregationWindow {
            sum_temperature: 0.0,
            sum_humidity: 0.0,
            accepted_count: 0,
            started_at: now,
        }
    }

    fn accept(&mut self, temperature: f32, humidity: f32) {
        self.sum_temperature += temperature;
        self.sum_humidity += humidity;
        self.accepted_count += 1;
    }

    fn means(&self) -> (f32, f32) {
        let n = self.accepted_count as f32;
        (self.sum_temperature / n, self.sum_humidity / n)
    }

    fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }
}

/// Reassembles checksummed sensor records from the raw byte stream and
/// emits aggregated results through a [`TemplateRenderer`].
///
/// All mutable state (parser states, record fields, aggregation window) is
/// owned exclusively by this struct; the loop is strictly single-threaded
/// and only the transport read may block.
pub struct StreamReconstructor<W: Write> {
    interval: Duration,
    utc: bool,
    renderer: TemplateRenderer,
    sink: W,
    float: FloatParser,
    err_token: ErrTokenParser,
    field: Field,
    temperature: f32,
    humidity: f32,
    window: AggregationWindow,
}

impl<W: Write> StreamReconstructor<W> {
    pub fn new(config: &Config, sink: W) -> Self {
        StreamReconstructor {
            interval: Duration::from_secs(config.interval_secs),
            utc: config.utc,
            renderer: TemplateRenderer::new(config.template.clone()),
            sink,
            float: FloatParser::new(),
            err_token: ErrTokenParser::new(),
            field: Field::Temperature,
            temperature: 0.0,
            humidity: 0.0,
            window: AggregationWindow::new(Instant::now()),
        }
    }

    /// Number of records accepted into the current window.
    pub fn accepted_count(&self) -> usize {
        self.window.accepted_count
    }

    /// Current window sums as (temperature, humidity).
    pub fn window_sums(&self) -> (f32, f32) {
        (self.window.sum_temperature, self.window.sum_humidity)
    }

    /// Borrow the output sink.
    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Process one byte from the transport.
    ///
    /// The dispatch order is fixed: the error-token parser sees the byte
    /// first, then the float parser, and finally the byte is re-tested for
    /// line terminators. The parsers consume their terminating character
    /// without re-dispatching it, so the line-terminator test here is
    /// required for resynchronization and must stay independent.
    pub fn feed(&mut self, c: u8) {
        // 1. Device-side error report?
        self.err_token.step(c);
        match self.err_token.state() {
            ErrTokenState::Stop => {
                error!(
                    "remote device returned error code {}",
                    self.err_token.result()
                );
                self.err_token.reset();
            }
            ErrTokenState::ErrorToken | ErrTokenState::ErrorOverflow => {
                self.err_token.reset();
            }
            _ => {}
        }

        // 2./3. Sensor value?
        match self.float.step(c) {
            ParseStatus::Stop => {
                self.on_value(self.float.result());
                self.float.reset();
                self.err_token.reset();
            }
            ParseStatus::Failed => {
                // Malformed or out-of-range token: abandon the partial
                // record, it must never reach the window.
                self.float.reset();
                self.field = Field::Temperature;
            }
            ParseStatus::Continue => {}
        }

        // 4. Line boundaries always resynchronize, whatever the parsers
        // were doing.
        if c == b'\r' || c == b'\n' {
            self.float.reset();
            self.err_token.reset();
            self.field = Field::Temperature;
        }
    }

    /// Assign a completed float token to the next field of the record
    /// cycle; validate and accumulate when the checksum field completes.
    fn on_value(&mut self, value: f32) {
        match self.field {
            Field::Temperature => {
                self.temperature = value;
                self.field = Field::Humidity;
            }
            Field::Humidity => {
                self.humidity = value;
                self.field = Field::Checksum;
            }
            Field::Checksum => {
                self.field = Field::Temperature;
                if (self.temperature + self.humidity - value).abs() > CHECKSUM_TOLERANCE {
                    error!("checksum of the remote data failed");
                    return;
                }
                self.window.accept(self.temperature, self.humidity);
                debug!(
                    "accepted record: {} degC, {} %RH ({} in window)",
                    self.temperature, self.humidity, self.window.accepted_count
                );
            }
        }
    }

    /// Check the aggregation interval once, emitting if it elapsed.
    ///
    /// An empty window only has its start time pushed forward; this
    /// prevents a spurious emission the moment data starts flowing.
    pub fn check_interval(&mut self, now: Instant) -> Result<(), ReconstructError> {
        if now.duration_since(self.window.started_at) < self.interval {
            return Ok(());
        }
        if self.window.accepted_count == 0 {
            self.window.started_at = now;
            return Ok(());
        }

        let (mean_temperature, mean_humidity) = self.window.means();
        let when = if self.utc {
            Utc::now().fixed_offset()
        } else {
            Local::now().fixed_offset()
        };
        let line = self.renderer.render(&when, mean_temperature, mean_humidity)?;
        self.sink
            .write_all(line.as_bytes())
            .map_err(ReconstructError::Write)?;
        self.sink.flush().map_err(ReconstructError::Write)?;
        self.window.reset(now);
        Ok(())
    }

    /// Run the reconstruction loop until shutdown or a fatal error.
    ///
    /// Returns `Ok(())` when the shutdown flag is observed or the source
    /// reports an explicit interruption; a partial aggregation window is
    /// discarded in that case.
    pub fn run<S: ByteSource>(
        &mut self,
        source: &mut S,
        shutdown: &AtomicBool,
    ) -> Result<(), ReconstructError> {
        let mut buf = [0u8; INPUT_BUFFER_SIZE];
        while !shutdown.load(Ordering::Relaxed) {
            match source.read_bytes(&mut buf) {
                Ok(ReadEvent::Data(n)) => {
                    for &c in &buf[..n] {
                        self.feed(c);
                    }
                }
                Ok(ReadEvent::TimedOut) => {}
                Ok(ReadEvent::Interrupted) => {
                    info!("read interrupted, finishing current operation");
                    return Ok(());
                }
                Err(e) => return Err(ReconstructError::Read(e)),
            }
            self.check_interval(Instant::now())?;
        }
        Ok(())
    }
}
