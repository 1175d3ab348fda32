use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::NaiveDateTime;
use zephyr_frame::markup::Element;
use zephyr_frame::tags;
use zephyr_frame::CommandEvent;

use crate::crc::zephyr_crc;
use crate::error::{CommandError, Result};

/// Defaults reported by the simulated gondola GPS.
pub const DEFAULT_LONGITUDE: f64 = -105.0;
pub const DEFAULT_LATITUDE: f64 = 40.0;
pub const DEFAULT_ALTITUDE: f64 = 1620.3;
pub const DEFAULT_BATTERY_VOLTS: f64 = 16.2;
pub const DEFAULT_DIFF: f64 = 0.00453;
pub const DEFAULT_QUALITY: u8 = 3;
/// Sun below the horizon.
pub const DEFAULT_ZENITH: f64 = 120.0;

/// Instrument operating modes the gondola can command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentMode {
    Standby,
    Flight,
    LowPower,
    Safety,
    EndOfFlight,
}

impl InstrumentMode {
    pub const ALL: [InstrumentMode; 5] = [
        InstrumentMode::Standby,
        InstrumentMode::Flight,
        InstrumentMode::LowPower,
        InstrumentMode::Safety,
        InstrumentMode::EndOfFlight,
    ];

    /// Two-letter wire code.
    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentMode::Standby => "SB",
            InstrumentMode::Flight => "FL",
            InstrumentMode::LowPower => "LP",
            InstrumentMode::Safety => "SA",
            InstrumentMode::EndOfFlight => "EF",
        }
    }
}

impl FromStr for InstrumentMode {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CommandError::InvalidMode(s.to_string()))
    }
}

impl fmt::Display for InstrumentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positive or negative acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Ack {
    #[default]
    Ack,
    Nak,
}

impl Ack {
    pub fn as_str(self) -> &'static str {
        match self {
            Ack::Ack => "ACK",
            Ack::Nak => "NAK",
        }
    }
}

impl FromStr for Ack {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACK" => Ok(Ack::Ack),
            "NAK" => Ok(Ack::Nak),
            _ => Err(CommandError::InvalidAck(s.to_string())),
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position and housekeeping sent in a `GPS` message.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsFix {
    pub time: NaiveDateTime,
    pub longitude: f64,
    pub latitude: f64,
    pub altitude: f64,
    /// Solar zenith angle in degrees, 0..=180.
    pub zenith: f64,
    pub battery_volts: f64,
    pub diff: f64,
    pub quality: u8,
}

impl GpsFix {
    /// A fix at `time` with the default position and the given zenith angle.
    pub fn at(time: NaiveDateTime, zenith: f64) -> Result<Self> {
        validate_zenith(zenith)?;
        Ok(Self {
            time,
            longitude: DEFAULT_LONGITUDE,
            latitude: DEFAULT_LATITUDE,
            altitude: DEFAULT_ALTITUDE,
            zenith,
            battery_volts: DEFAULT_BATTERY_VOLTS,
            diff: DEFAULT_DIFF,
            quality: DEFAULT_QUALITY,
        })
    }

    /// A fix stamped with the local wall clock.
    pub fn now(zenith: f64) -> Result<Self> {
        Self::at(chrono::Local::now().naive_local(), zenith)
    }
}

pub fn validate_zenith(zenith: f64) -> Result<f64> {
    if (0.0..=180.0).contains(&zenith) {
        Ok(zenith)
    } else {
        Err(CommandError::InvalidZenith(zenith))
    }
}

/// A message the gondola sends to an instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `IM`: switch instrument mode.
    Mode(InstrumentMode),
    /// `GPS`: position and time broadcast.
    Gps(GpsFix),
    /// `TC`: telecommand text, carried in a binary section.
    Telecommand(String),
    /// `SW`: imminent power-down.
    ShutdownWarning,
    SafetyAck(Ack),
    ReturnActionAck(Ack),
    TelemetryAck(Ack),
}

impl Command {
    /// The reply to a command event raised by the parser.
    pub fn reply_to(event: CommandEvent, ack: Ack) -> Self {
        match event {
            CommandEvent::TelemetryAckNeeded => Command::TelemetryAck(ack),
            CommandEvent::SafetyAckNeeded => Command::SafetyAck(ack),
            CommandEvent::ReturnAckNeeded => Command::ReturnActionAck(ack),
        }
    }

    /// Element name on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Mode(_) => tags::MODE,
            Command::Gps(_) => tags::GPS,
            Command::Telecommand(_) => tags::TELECOMMAND,
            Command::ShutdownWarning => tags::SHUTDOWN_WARNING,
            Command::SafetyAck(_) => tags::SAFETY_ACK,
            Command::ReturnActionAck(_) => tags::RETURN_ACTION_ACK,
            Command::TelemetryAck(_) => tags::TELEMETRY_ACK,
        }
    }

    /// One-line summary for session logs.
    pub fn summary(&self) -> String {
        match self {
            Command::Mode(mode) => format!("IM {mode}"),
            Command::Gps(fix) => format!("GPS, SZA = {:?}", fix.zenith),
            Command::Telecommand(text) => format!("TC: {text}"),
            Command::SafetyAck(ack) | Command::ReturnActionAck(ack) | Command::TelemetryAck(ack) => {
                format!("{} {ack}", self.kind())
            }
            Command::ShutdownWarning => self.kind().to_string(),
        }
    }

    /// Build the element for this command.
    pub fn element(&self, instrument: &str, msg_id: u32) -> Result<Element> {
        let element = Element::new(self.kind()).with_field("Msg", msg_id.to_string());

        if let Command::Gps(fix) = self {
            validate_zenith(fix.zenith)?;
            return Ok(element
                .with_field("Date", fix.time.format("%Y/%m/%d").to_string())
                .with_field("Time", fix.time.format("%H:%M:%S").to_string())
                .with_field("Lon", format!("{:.6}", fix.longitude))
                .with_field("Lat", format!("{:.6}", fix.latitude))
                .with_field("Alt", format!("{:.1}", fix.altitude))
                .with_field("SZA", format!("{:?}", fix.zenith))
                .with_field("VBAT", format!("{:.1}", fix.battery_volts))
                .with_field("Diff", format!("{:.5}", fix.diff))
                .with_field("Quality", fix.quality.to_string()));
        }

        if instrument.is_empty() {
            return Err(CommandError::EmptyInstrument);
        }
        let element = element.with_field("Inst", instrument);

        Ok(match self {
            Command::Mode(mode) => element.with_field("Mode", mode.as_str()),
            Command::Telecommand(text) => {
                if !text.is_ascii() {
                    return Err(CommandError::NonAsciiTelecommand);
                }
                element.with_field("Length", text.len().to_string())
            }
            Command::SafetyAck(ack) | Command::ReturnActionAck(ack) | Command::TelemetryAck(ack) => {
                element.with_field("Ack", ack.as_str())
            }
            Command::ShutdownWarning | Command::Gps(_) => element,
        })
    }

    /// Complete wire bytes: element text, CRC line and any binary section.
    pub fn encode(&self, instrument: &str, msg_id: u32) -> Result<Bytes> {
        let element = self.element(instrument, msg_id)?;
        let text = seal(&element);

        let mut out = BytesMut::with_capacity(text.len() + 64);
        out.put_slice(text.as_bytes());
        if let Command::Telecommand(command) = self {
            put_binary_section(&mut out, command.as_bytes());
        }
        Ok(out.freeze())
    }
}

/// Instrument-side `TM` report: header fields plus a binary payload.
///
/// Produces the same layout instruments send, for capture files and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryBuilder {
    fields: Vec<(String, String)>,
    data: Vec<u8>,
}

impl TelemetryBuilder {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            fields: Vec::new(),
            data: data.into(),
        }
    }

    /// Add a header field between `Inst` and `Length`.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn encode(&self, instrument: &str, msg_id: u32) -> Result<Bytes> {
        if instrument.is_empty() {
            return Err(CommandError::EmptyInstrument);
        }
        let mut element = Element::new(tags::TELEMETRY)
            .with_field("Msg", msg_id.to_string())
            .with_field("Inst", instrument);
        for (name, value) in &self.fields {
            element = element.with_field(name.as_str(), value.as_str());
        }
        let element = element.with_field("Length", self.data.len().to_string());

        let text = seal(&element);
        let mut out = BytesMut::with_capacity(text.len() + self.data.len() + tags::BINARY_OVERHEAD);
        out.put_slice(text.as_bytes());
        put_binary_section(&mut out, &self.data);
        Ok(out.freeze())
    }
}

/// Tab-indented element text followed by its `<CRC>` line.
pub fn seal(element: &Element) -> String {
    let body = element.to_pretty_string("\t");
    let crc = zephyr_crc(body.as_bytes());
    format!("{body}<{0}>{crc}</{0}>\n", tags::CRC)
}

/// `START` + data + big-endian CRC of data + `END`.
pub fn binary_section(data: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(data.len() + tags::BINARY_OVERHEAD);
    put_binary_section(&mut out, data);
    out.freeze()
}

fn put_binary_section(out: &mut BytesMut, data: &[u8]) {
    out.put_slice(tags::BINARY_START_MARKER);
    out.put_slice(data);
    out.put_u16(zephyr_crc(data));
    out.put_slice(tags::BINARY_END_MARKER);
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, 15)
            .unwrap()
            .and_hms_opt(12, 30, 5)
            .unwrap()
    }

    #[test]
    fn mode_message_layout() {
        let wire = Command::Mode(InstrumentMode::Flight).encode("LPC", 1).unwrap();
        assert_eq!(
            wire.as_ref(),
            b"<IM>\n\t<Msg>1</Msg>\n\t<Inst>LPC</Inst>\n\t<Mode>FL</Mode>\n</IM>\n<CRC>61239</CRC>\n"
        );
    }

    #[test]
    fn gps_message_fields() {
        let fix = GpsFix::at(noon(), DEFAULT_ZENITH).unwrap();
        let wire = Command::Gps(fix).encode("ignored", 4).unwrap();
        let text = std::str::from_utf8(&wire).unwrap();

        assert!(text.starts_with(
            "<GPS>\n\t<Msg>4</Msg>\n\t<Date>2024/08/15</Date>\n\t<Time>12:30:05</Time>\n"
        ));
        for field in [
            "<Lon>-105.000000</Lon>",
            "<Lat>40.000000</Lat>",
            "<Alt>1620.3</Alt>",
            "<SZA>120.0</SZA>",
            "<VBAT>16.2</VBAT>",
            "<Diff>0.00453</Diff>",
            "<Quality>3</Quality>",
        ] {
            assert!(text.contains(field), "{field} missing from {text}");
        }
        assert!(!text.contains("<Inst>"));
    }

    #[test]
    fn zenith_is_validated() {
        assert!(matches!(
            GpsFix::at(noon(), 180.5),
            Err(CommandError::InvalidZenith(_))
        ));
        assert!(GpsFix::at(noon(), 0.0).is_ok());
        assert!(GpsFix::at(noon(), 180.0).is_ok());
    }

    #[test]
    fn telecommand_carries_binary_section() {
        let wire = Command::Telecommand("ABC".to_string())
            .encode("LPC", 2)
            .unwrap();

        let header = "<TC>\n\t<Msg>2</Msg>\n\t<Inst>LPC</Inst>\n\t<Length>3</Length>\n</TC>\n<CRC>60791</CRC>\n";
        let mut expected = header.as_bytes().to_vec();
        expected.extend_from_slice(b"START");
        expected.extend_from_slice(b"ABC");
        expected.extend_from_slice(&0x4F20u16.to_be_bytes());
        expected.extend_from_slice(b"END");
        assert_eq!(wire.as_ref(), expected.as_slice());
    }

    #[test]
    fn telecommand_must_be_ascii() {
        let err = Command::Telecommand("d\u{e9}part".to_string())
            .encode("LPC", 1)
            .unwrap_err();
        assert!(matches!(err, CommandError::NonAsciiTelecommand));
    }

    #[test]
    fn acks_and_shutdown() {
        let wire = Command::TelemetryAck(Ack::Ack).encode("RACHUTS", 7).unwrap();
        assert_eq!(
            wire.as_ref(),
            b"<TMAck>\n\t<Msg>7</Msg>\n\t<Inst>RACHUTS</Inst>\n\t<Ack>ACK</Ack>\n</TMAck>\n<CRC>59443</CRC>\n"
        );

        let wire = Command::ShutdownWarning.encode("LPC", 1).unwrap();
        assert_eq!(
            wire.as_ref(),
            b"<SW>\n\t<Msg>1</Msg>\n\t<Inst>LPC</Inst>\n</SW>\n<CRC>56987</CRC>\n"
        );
    }

    #[test]
    fn empty_instrument_rejected() {
        let err = Command::SafetyAck(Ack::Nak).encode("", 1).unwrap_err();
        assert!(matches!(err, CommandError::EmptyInstrument));
    }

    #[test]
    fn replies_match_events() {
        assert_eq!(
            Command::reply_to(CommandEvent::SafetyAckNeeded, Ack::Ack).kind(),
            CommandEvent::SafetyAckNeeded.reply_kind()
        );
        assert_eq!(
            Command::reply_to(CommandEvent::ReturnAckNeeded, Ack::Nak),
            Command::ReturnActionAck(Ack::Nak)
        );
        assert_eq!(
            Command::reply_to(CommandEvent::TelemetryAckNeeded, Ack::Ack).kind(),
            "TMAck"
        );
    }

    #[test]
    fn parses_modes_and_acks() {
        assert_eq!("fl".parse::<InstrumentMode>().unwrap(), InstrumentMode::Flight);
        assert_eq!("EF".parse::<InstrumentMode>().unwrap(), InstrumentMode::EndOfFlight);
        assert!("XX".parse::<InstrumentMode>().is_err());
        assert_eq!("nak".parse::<Ack>().unwrap(), Ack::Nak);
        assert!("maybe".parse::<Ack>().is_err());
    }

    #[test]
    fn encoded_messages_parse_back() {
        use zephyr_frame::{Channel, ChannelMode, Event, Message, ProtocolDemux};

        let mut demux = ProtocolDemux::new(ChannelMode::Separate, Vec::new());
        let report = TelemetryBuilder::new(b"</CRC>\n".to_vec()).encode("LPC", 1).unwrap();
        let tc = Command::Telecommand("HEAT ON".to_string()).encode("LPC", 2).unwrap();
        demux.on_bytes_available(Channel::Zephyr, &report);
        demux.on_bytes_available(Channel::Zephyr, &tc);

        let kinds: Vec<String> = demux
            .sink()
            .iter()
            .filter_map(|event| match event {
                Event::Message(message) => Some(message.kind().to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec!["TM", "TM-DATA", "TC"]);

        let Some(Event::Message(Message::Telemetry(tm))) = demux.sink().get(1) else {
            panic!("expected telemetry capture");
        };
        assert_eq!(tm.data(), Some(&b"</CRC>\n"[..]));
        assert_eq!(tm.trailing_crc(), Some(zephyr_crc(b"</CRC>\n")));
    }

    #[test]
    fn telemetry_report_layout() {
        let wire = TelemetryBuilder::new(b"\x01\x02".to_vec())
            .field("StateFlag1", "FINE")
            .encode("LPC", 9)
            .unwrap();
        let text_end = wire
            .windows(7)
            .position(|w| w == b"</CRC>\n")
            .unwrap()
            + 7;
        let text = std::str::from_utf8(&wire[..text_end]).unwrap();

        assert!(text.starts_with("<TM>\n\t<Msg>9</Msg>\n\t<Inst>LPC</Inst>\n\t<StateFlag1>FINE</StateFlag1>\n\t<Length>2</Length>\n</TM>\n<CRC>"));
        assert_eq!(&wire[text_end..], binary_section(b"\x01\x02").as_ref());
        assert_eq!(wire.len() - text_end, 2 + tags::BINARY_OVERHEAD);
    }
}
