use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use zephyr_command::Sent;
use zephyr_frame::{tags, DemuxStats, Event, Message};
use zephyr_transport::PortInfo;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Wall-clock stamp used on screen and in session files.
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

#[derive(Serialize)]
struct EventOutput<'a> {
    timestamp: &'a str,
    event: &'static str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    crc: Option<u16>,
}

pub fn print_event(event: &Event, format: OutputFormat) {
    let ts = timestamp();
    match format {
        OutputFormat::Json => {
            let out = event_output(event, &ts);
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIME", "KIND", "DETAIL"])
                .add_row(vec![ts, event_kind(event).to_string(), detail(event)]);
            println!("{table}");
        }
        OutputFormat::Pretty => match event {
            Event::Message(Message::LogLine(text)) => println!("[{ts}] {text}"),
            Event::Message(Message::Envelope(envelope)) => {
                println!("[{ts}]  (FROM){}", envelope.rendered)
            }
            Event::Message(Message::Telemetry(_)) => println!("[{ts}] {}", detail(event)),
            Event::Command(command) => println!("[{ts}] -> {} needed", command.reply_kind()),
            Event::Diagnostic(diag) => println!("[{ts}] warning: {diag}"),
        },
        OutputFormat::Raw => match event {
            Event::Message(Message::LogLine(text)) => print_raw(format!("{text}\n").as_bytes()),
            Event::Message(Message::Envelope(envelope)) => {
                print_raw(format!("{}\n", envelope.text).as_bytes())
            }
            Event::Message(Message::Telemetry(tm)) => print_raw(&tm.payload),
            Event::Command(_) | Event::Diagnostic(_) => {}
        },
    }
}

fn event_output<'a>(event: &'a Event, ts: &'a str) -> EventOutput<'a> {
    let mut out = EventOutput {
        timestamp: ts,
        event: "",
        kind: event_kind(event),
        text: None,
        message: None,
        payload_size: None,
        crc: None,
    };
    match event {
        Event::Message(Message::LogLine(text)) => {
            out.event = "log";
            out.text = Some(text.as_str());
        }
        Event::Message(Message::Envelope(envelope)) => {
            out.event = "envelope";
            out.message = serde_json::from_str(&envelope.rendered).ok();
        }
        Event::Message(Message::Telemetry(tm)) => {
            out.event = "telemetry";
            out.payload_size = Some(tm.payload.len());
            out.crc = tm.trailing_crc();
        }
        Event::Command(_) => out.event = "command",
        Event::Diagnostic(_) => out.event = "diagnostic",
    }
    out
}

fn event_kind(event: &Event) -> &str {
    match event {
        Event::Message(message) => message.kind(),
        Event::Command(command) => command.as_str(),
        Event::Diagnostic(diag) => diag.class(),
    }
}

fn detail(event: &Event) -> String {
    match event {
        Event::Message(Message::LogLine(text)) => text.clone(),
        Event::Message(Message::Envelope(envelope)) => {
            format!("{} ({})", envelope.rendered, tags::describe(&envelope.kind))
        }
        Event::Message(Message::Telemetry(tm)) => match (tm.data(), tm.trailing_crc()) {
            (Some(data), Some(crc)) => {
                format!("TM data: {} bytes, crc {crc}", data.len())
            }
            _ => format!("TM data: {} bytes without START/END markers", tm.payload.len()),
        },
        Event::Command(command) => format!("reply with {}", command.reply_kind()),
        Event::Diagnostic(diag) => diag.to_string(),
    }
}

#[derive(Serialize)]
struct SentOutput<'a> {
    timestamp: &'a str,
    event: &'static str,
    kind: &'a str,
    msg_id: u32,
    summary: &'a str,
    bytes: usize,
}

pub fn print_sent(sent: &Sent, format: OutputFormat) {
    let ts = timestamp();
    match format {
        OutputFormat::Json => {
            let out = SentOutput {
                timestamp: &ts,
                event: "sent",
                kind: sent.kind,
                msg_id: sent.msg_id,
                summary: &sent.summary,
                bytes: sent.wire.len(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TIME", "SENT", "MSG", "BYTES"])
                .add_row(vec![
                    ts,
                    sent.summary.clone(),
                    sent.msg_id.to_string(),
                    sent.wire.len().to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("[{ts}] (TO) {} [msg {}]", sent.summary, sent.msg_id),
        OutputFormat::Raw => print_raw(&sent.wire),
    }
}

pub fn print_stats(stats: &DemuxStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&serde_json::json!({ "event": "summary", "stats": stats }))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("log lines", stats.log_lines),
                ("envelopes", stats.envelopes),
                ("telemetry captures", stats.telemetry),
                ("command events", stats.command_events),
                ("malformed envelopes", stats.malformed_envelopes),
                ("invalid length fields", stats.invalid_length_fields),
                ("non-ASCII bytes dropped", stats.non_ascii_bytes),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Raw => {}
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: port.kind,
                    description: port.description.as_deref(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                match &port.description {
                    Some(description) => println!("{} ({}, {description})", port.name, port.kind),
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use zephyr_frame::{CommandEvent, Envelope, Telemetry};

    use super::*;

    #[test]
    fn json_output_embeds_rendered_message() {
        let event = Event::Message(Message::Envelope(Envelope {
            kind: "IMR".to_string(),
            rendered: r#"{"IMR":{"Msg":"1"},"CRC":"7"}"#.to_string(),
            text: "<IMR><Msg>1</Msg></IMR><CRC>7</CRC>".to_string(),
        }));
        let value = serde_json::to_value(event_output(&event, "12:00:00.000")).unwrap();
        assert_eq!(value["event"], "envelope");
        assert_eq!(value["kind"], "IMR");
        assert_eq!(value["message"]["IMR"]["Msg"], "1");
        assert!(value.get("text").is_none());
    }

    #[test]
    fn telemetry_detail_reports_data_size() {
        let event = Event::Message(Message::Telemetry(Telemetry {
            header: String::new(),
            payload: b"STARTabc\x00\x01END".to_vec().into(),
        }));
        assert_eq!(detail(&event), "TM data: 3 bytes, crc 1");
        let value = serde_json::to_value(event_output(&event, "t")).unwrap();
        assert_eq!(value["payload_size"], 13);
    }

    #[test]
    fn command_kind_is_event_name() {
        let event = Event::Command(CommandEvent::SafetyAckNeeded);
        assert_eq!(event_kind(&event), "safety-ack-needed");
        assert_eq!(detail(&event), "reply with SAck");
    }
}
