use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::warn;
use zephyr_command::Sent;
use zephyr_frame::{CommandEvent, Diagnostic, Envelope, Event, Message, MessageSink, Telemetry};

use crate::output::{print_event, print_sent, timestamp, OutputFormat};
use crate::session::SessionFiles;

/// Which envelope kinds reach the screen.
#[derive(Debug, Clone, Default)]
pub struct DisplayFilter {
    only: Option<Vec<String>>,
    hidden: BTreeMap<String, bool>,
}

impl DisplayFilter {
    /// `only` (from `--only`) wins; otherwise kinds mapped to `false` are hidden.
    pub fn new(only: Option<Vec<String>>, hidden: BTreeMap<String, bool>) -> Self {
        let only = only.filter(|kinds| !kinds.is_empty());
        Self { only, hidden }
    }

    pub fn shows(&self, kind: &str) -> bool {
        if let Some(only) = &self.only {
            return only.iter().any(|k| k.eq_ignore_ascii_case(kind));
        }
        self.hidden.get(kind).copied().unwrap_or(true)
    }
}

/// Sink used by `monitor` and `replay`: prints, records and queues acks.
pub struct MonitorSink {
    format: OutputFormat,
    filter: DisplayFilter,
    session: Option<SessionFiles>,
    auto_ack: bool,
    pending_acks: VecDeque<CommandEvent>,
    last_message: Instant,
}

impl MonitorSink {
    pub fn new(format: OutputFormat, filter: DisplayFilter) -> Self {
        Self {
            format,
            filter,
            session: None,
            auto_ack: false,
            pending_acks: VecDeque::new(),
            last_message: Instant::now(),
        }
    }

    pub fn with_session(mut self, session: Option<SessionFiles>) -> Self {
        self.session = session;
        self
    }

    /// Queue command events for the caller to answer.
    pub fn with_auto_ack(mut self, auto_ack: bool) -> Self {
        self.auto_ack = auto_ack;
        self
    }

    /// Events waiting for an acknowledgement, oldest first.
    pub fn take_pending(&mut self) -> Vec<CommandEvent> {
        self.pending_acks.drain(..).collect()
    }

    /// Time since the last complete message.
    pub fn idle_for(&self) -> Duration {
        self.last_message.elapsed()
    }

    /// Print and record a message this side wrote.
    pub fn sent(&mut self, sent: &Sent) {
        print_sent(sent, self.format);
        if let Some(session) = &mut self.session {
            session.record_sent(&timestamp(), sent);
        }
    }

    fn touch(&mut self) {
        self.last_message = Instant::now();
    }

    fn show(&self, event: Event) {
        print_event(&event, self.format);
    }
}

impl MessageSink for MonitorSink {
    fn log_line(&mut self, text: &str) {
        self.touch();
        if let Some(session) = &mut self.session {
            session.record_log_line(&timestamp(), text);
        }
        self.show(Event::Message(Message::LogLine(text.to_string())));
    }

    fn envelope(&mut self, envelope: &Envelope) {
        self.touch();
        if let Some(session) = &mut self.session {
            session.record_envelope(&timestamp(), envelope);
        }
        if self.filter.shows(&envelope.kind) {
            self.show(Event::Message(Message::Envelope(envelope.clone())));
        }
    }

    fn telemetry(&mut self, telemetry: &Telemetry) {
        self.touch();
        if let Some(session) = &mut self.session {
            session.record_telemetry(chrono::Local::now(), telemetry);
        }
        if self.filter.shows("TM") {
            self.show(Event::Message(Message::Telemetry(telemetry.clone())));
        }
    }

    fn command_event(&mut self, event: CommandEvent) {
        if self.auto_ack {
            self.pending_acks.push_back(event);
        } else {
            self.show(Event::Command(event));
        }
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        warn!(class = diagnostic.class(), "{diagnostic}");
        if matches!(self.format, OutputFormat::Json) {
            self.show(Event::Diagnostic(diagnostic.clone()));
        }
    }
}
