use std::collections::VecDeque;

use crate::error::Diagnostic;
use crate::message::{CommandEvent, Envelope, Event, Message, Telemetry};

/// Receives everything the demultiplexer reconstructs.
///
/// Calls arrive in byte-arrival order for each channel. Implementations must
/// not block for long: the engine runs inside the transport's read loop.
pub trait MessageSink {
    fn log_line(&mut self, text: &str);

    fn envelope(&mut self, envelope: &Envelope);

    /// `telemetry.payload` is exactly `10 + Length` bytes.
    fn telemetry(&mut self, telemetry: &Telemetry);

    fn command_event(&mut self, event: CommandEvent);

    /// A recovered condition. Ignored unless overridden.
    fn diagnostic(&mut self, _diagnostic: &Diagnostic) {}
}

impl<S: MessageSink + ?Sized> MessageSink for &mut S {
    fn log_line(&mut self, text: &str) {
        (**self).log_line(text);
    }

    fn envelope(&mut self, envelope: &Envelope) {
        (**self).envelope(envelope);
    }

    fn telemetry(&mut self, telemetry: &Telemetry) {
        (**self).telemetry(telemetry);
    }

    fn command_event(&mut self, event: CommandEvent) {
        (**self).command_event(event);
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        (**self).diagnostic(diagnostic);
    }
}

impl MessageSink for Vec<Event> {
    fn log_line(&mut self, text: &str) {
        self.push(Event::Message(Message::LogLine(text.to_string())));
    }

    fn envelope(&mut self, envelope: &Envelope) {
        self.push(Event::Message(Message::Envelope(envelope.clone())));
    }

    fn telemetry(&mut self, telemetry: &Telemetry) {
        self.push(Event::Message(Message::Telemetry(telemetry.clone())));
    }

    fn command_event(&mut self, event: CommandEvent) {
        self.push(Event::Command(event));
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.push(Event::Diagnostic(diagnostic.clone()));
    }
}

impl MessageSink for VecDeque<Event> {
    fn log_line(&mut self, text: &str) {
        self.push_back(Event::Message(Message::LogLine(text.to_string())));
    }

    fn envelope(&mut self, envelope: &Envelope) {
        self.push_back(Event::Message(Message::Envelope(envelope.clone())));
    }

    fn telemetry(&mut self, telemetry: &Telemetry) {
        self.push_back(Event::Message(Message::Telemetry(telemetry.clone())));
    }

    fn command_event(&mut self, event: CommandEvent) {
        self.push_back(Event::Command(event));
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.push_back(Event::Diagnostic(diagnostic.clone()));
    }
}
