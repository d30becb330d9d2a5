//! # Serial Byte Source
//!
//! serialport-backed implementation of the transport boundary. The sensor
//! device streams ASCII lines at 9600 baud 8N1 without flow control; reads
//! are bounded by [`READ_TIMEOUT`] so the reconstruction loop can poll its
//! shutdown flag between batches.

use crate::reconstruct::{ByteSource, ReadEvent, READ_TIMEOUT};
use std::io::{self, Read};
use std::thread;
use std::time::Duration;

/// Wire speed of the sensor device.
pub const BAUD_RATE: u32 = 9600;

/// Grace period after opening the port before the device talks sense.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// A configured serial connection to the sensor device.
pub struct SerialSource {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialSource {
    /// Open and configure the device, give it time to settle, then drop
    /// whatever stale input accumulated meanwhile.
    pub fn open(device: &str) -> Result<Self, serialport::Error> {
        let port = serialport::new(device, BAUD_RATE)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()?;
        thread::sleep(SETTLE_DELAY);
        port.clear(serialport::ClearBuffer::Input)?;
        Ok(SerialSource { port })
    }
}

impl ByteSource for SerialSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<ReadEvent> {
        match self.port.read(buf) {
            Ok(0) => Ok(ReadEvent::TimedOut),
            Ok(n) => Ok(ReadEvent::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(ReadEvent::TimedOut),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadEvent::TimedOut),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(ReadEvent::Interrupted),
            Err(e) => Err(e),
        }
    }
}
