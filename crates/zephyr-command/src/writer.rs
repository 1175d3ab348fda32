use std::io::{ErrorKind, Write};

use bytes::Bytes;
use tracing::debug;

use crate::error::{CommandError, Result};
use crate::message::{Command, TelemetryBuilder};

/// Message ids restart at this value for every writer.
pub const FIRST_MESSAGE_ID: u32 = 1;

/// A message that has been written, for display and session logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub kind: &'static str,
    pub msg_id: u32,
    pub summary: String,
    pub wire: Bytes,
}

/// Writes outbound messages to one port, numbering them as it goes.
pub struct CommandWriter<T> {
    inner: T,
    instrument: String,
    next_id: u32,
}

impl<T: Write> CommandWriter<T> {
    pub fn new(inner: T, instrument: impl Into<String>) -> Self {
        Self {
            inner,
            instrument: instrument.into(),
            next_id: FIRST_MESSAGE_ID,
        }
    }

    /// Encode `command` with the next message id and write it (blocking).
    ///
    /// The id is only used up when the message encodes successfully.
    pub fn send(&mut self, command: &Command) -> Result<Sent> {
        let msg_id = self.next_id;
        let wire = command.encode(&self.instrument, msg_id)?;
        self.next_id = self.next_id.wrapping_add(1);

        self.write_all(&wire)?;
        debug!(kind = command.kind(), msg_id, bytes = wire.len(), "command sent");
        Ok(Sent {
            kind: command.kind(),
            msg_id,
            summary: command.summary(),
            wire,
        })
    }

    /// Write an instrument-side telemetry report.
    pub fn send_telemetry(&mut self, report: &TelemetryBuilder) -> Result<Sent> {
        let msg_id = self.next_id;
        let wire = report.encode(&self.instrument, msg_id)?;
        self.next_id = self.next_id.wrapping_add(1);

        self.write_all(&wire)?;
        Ok(Sent {
            kind: zephyr_frame::tags::TELEMETRY,
            msg_id,
            summary: format!("TM ({} bytes)", wire.len()),
            wire,
        })
    }

    fn write_all(&mut self, wire: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < wire.len() {
            match self.inner.write(&wire[offset..]) {
                Ok(0) => return Err(CommandError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(CommandError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying port.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(CommandError::Io(err)),
            }
        }
    }

    /// Id the next message will carry.
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::message::{Ack, InstrumentMode};

    #[test]
    fn ids_count_up_from_one() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::new()), "LPC");

        let first = writer.send(&Command::Mode(InstrumentMode::Standby)).unwrap();
        let second = writer.send(&Command::SafetyAck(Ack::Ack)).unwrap();

        assert_eq!((first.kind, first.msg_id), ("IM", 1));
        assert_eq!((second.kind, second.msg_id), ("SAck", 2));
        assert_eq!(writer.next_id(), 3);

        let wire = writer.into_inner().into_inner();
        let text = String::from_utf8(wire).unwrap();
        assert!(text.starts_with("<IM>\n\t<Msg>1</Msg>"));
        assert!(text.contains("<SAck>\n\t<Msg>2</Msg>"));
    }

    #[test]
    fn writers_do_not_share_ids() {
        let mut a = CommandWriter::new(Cursor::new(Vec::new()), "A");
        let mut b = CommandWriter::new(Cursor::new(Vec::new()), "B");
        a.send(&Command::ShutdownWarning).unwrap();
        a.send(&Command::ShutdownWarning).unwrap();

        assert_eq!(b.send(&Command::ShutdownWarning).unwrap().msg_id, 1);
    }

    #[test]
    fn failed_encode_keeps_id() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::new()), "LPC");
        assert!(writer
            .send(&Command::Telecommand("\u{2603}".to_string()))
            .is_err());
        assert_eq!(writer.next_id(), 1);
        assert!(writer.get_ref().get_ref().is_empty());
    }

    #[test]
    fn telemetry_reports_are_numbered_too() {
        let mut writer = CommandWriter::new(Cursor::new(Vec::new()), "LPC");
        let sent = writer.send_telemetry(&TelemetryBuilder::new(vec![0u8; 4])).unwrap();
        assert_eq!((sent.kind, sent.msg_id), ("TM", 1));
        assert_eq!(writer.next_id(), 2);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = CommandWriter::new(sink, "LPC");

        writer.send(&Command::TelemetryAck(Ack::Ack)).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write() {
        let mut writer = CommandWriter::new(
            InterruptedOnce {
                interrupted: false,
                data: Vec::new(),
            },
            "LPC",
        );
        let sent = writer.send(&Command::ShutdownWarning).unwrap();
        assert_eq!(writer.into_inner().data, sent.wire.to_vec());
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = CommandWriter::new(ZeroWriter, "LPC");
        let err = writer.send(&Command::ShutdownWarning).unwrap_err();
        assert!(matches!(err, CommandError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = buf.len().min(5);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
