use crate::error::{FrameError, Result};
use crate::markup::{self, Element};
use crate::message::{CommandEvent, Envelope};
use crate::tags::{BINARY_OVERHEAD, RETURN_ACTION, SAFETY, TELEMETRY};

/// Synthetic outer element; raw frames are a root element plus a `<CRC>`
/// sibling and only parse as a document once wrapped.
const WRAPPER: &str = "ZephyrFrame";

/// What the engine must do besides emitting the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    /// Capture `remaining` binary bytes before scanning further.
    BeginTelemetry { remaining: usize },
    /// Telemetry header whose length could not be used; nothing is captured.
    InvalidLength(FrameError),
    /// Emit this command event before the envelope.
    Command(CommandEvent),
}

/// A classified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub envelope: Envelope,
    pub action: Action,
}

/// Parses frames and decides their kind.
#[derive(Debug, Clone)]
pub struct MessageClassifier {
    max_declared_length: usize,
}

impl MessageClassifier {
    pub fn new(max_declared_length: usize) -> Self {
        Self {
            max_declared_length,
        }
    }

    /// Classify one decoded frame (text through `</CRC>`).
    pub fn classify(&self, frame: &str) -> Result<Classified> {
        let root = markup::parse(&format!("<{WRAPPER}>{frame}</{WRAPPER}>"))?;
        let top = root.elements().next().ok_or(FrameError::EmptyEnvelope)?;
        let kind = top.name().to_string();

        let action = match kind.as_str() {
            TELEMETRY => match self.declared_length(top) {
                Ok(length) => Action::BeginTelemetry {
                    remaining: length + BINARY_OVERHEAD,
                },
                Err(err) => Action::InvalidLength(err),
            },
            SAFETY => Action::Command(CommandEvent::SafetyAckNeeded),
            RETURN_ACTION => Action::Command(CommandEvent::ReturnAckNeeded),
            _ => Action::None,
        };

        Ok(Classified {
            envelope: Envelope {
                kind,
                rendered: format!("{:#}", root.to_json()),
                text: frame.to_string(),
            },
            action,
        })
    }

    fn declared_length(&self, header: &Element) -> Result<usize> {
        let invalid = |reason: &str| FrameError::InvalidLengthField(reason.to_string());

        let mut fields = header.elements().filter(|element| element.name() == "Length");
        let field = fields.next().ok_or_else(|| invalid("no Length element"))?;
        if fields.next().is_some() {
            return Err(invalid("repeated Length element"));
        }
        // Only a bare text leaf is a byte count.
        if !field.attributes().is_empty() {
            return Err(invalid("Length carries attributes"));
        }
        if field.elements().next().is_some() {
            return Err(invalid("Length has nested elements"));
        }

        let text = field.text();
        let length: usize = text
            .parse()
            .map_err(|_| FrameError::InvalidLengthField(format!("{text:?} is not a byte count")))?;

        if length > self.max_declared_length || length.checked_add(BINARY_OVERHEAD).is_none() {
            return Err(FrameError::InvalidLengthField(format!(
                "{length} exceeds maximum of {}",
                self.max_declared_length
            )));
        }
        Ok(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_DECLARED_LENGTH;

    fn classifier() -> MessageClassifier {
        MessageClassifier::new(DEFAULT_MAX_DECLARED_LENGTH)
    }

    #[test]
    fn telemetry_header_starts_capture() {
        let classified = classifier()
            .classify("<TM>\n\t<Msg>3</Msg>\n\t<Length>42</Length>\n</TM>\n<CRC>1234</CRC>")
            .unwrap();

        assert_eq!(classified.envelope.kind, "TM");
        assert_eq!(classified.action, Action::BeginTelemetry { remaining: 52 });
        assert_eq!(
            classified.envelope.rendered,
            "{\n  \"TM\": {\n    \"Msg\": \"3\",\n    \"Length\": \"42\"\n  },\n  \"CRC\": \"1234\"\n}"
        );
    }

    #[test]
    fn safety_and_return_action_need_acks() {
        let safety = classifier().classify("<S><Msg>1</Msg></S><CRC>1</CRC>").unwrap();
        assert_eq!(
            safety.action,
            Action::Command(CommandEvent::SafetyAckNeeded)
        );

        let ra = classifier().classify("<RA><Msg>2</Msg></RA><CRC>1</CRC>").unwrap();
        assert_eq!(ra.action, Action::Command(CommandEvent::ReturnAckNeeded));
    }

    #[test]
    fn other_kinds_only_render() {
        let classified = classifier()
            .classify("<IMR><Msg>5</Msg><Inst>LPC</Inst></IMR><CRC>9</CRC>")
            .unwrap();
        assert_eq!(classified.envelope.kind, "IMR");
        assert_eq!(classified.action, Action::None);
    }

    #[test]
    fn invalid_length_fields_do_not_start_capture() {
        for frame in [
            "<TM><Length>abc</Length></TM><CRC>1</CRC>",
            "<TM><Length>-4</Length></TM><CRC>1</CRC>",
            "<TM><Msg>1</Msg></TM><CRC>1</CRC>",
            "<TM><Length>99999999999</Length></TM><CRC>1</CRC>",
        ] {
            let classified = classifier().classify(frame).unwrap();
            assert_eq!(classified.envelope.kind, "TM");
            assert!(
                matches!(classified.action, Action::InvalidLength(_)),
                "{frame}"
            );
        }
    }

    #[test]
    fn length_must_be_a_single_plain_leaf() {
        for frame in [
            "<TM><Length>3</Length><Length>4</Length></TM><CRC>1</CRC>",
            "<TM><Length unit='B'>3</Length></TM><CRC>1</CRC>",
            "<TM><Length><X/>3</Length></TM><CRC>1</CRC>",
        ] {
            let classified = classifier().classify(frame).unwrap();
            assert_eq!(classified.envelope.kind, "TM");
            let Action::InvalidLength(FrameError::InvalidLengthField(reason)) = classified.action
            else {
                panic!("{frame} started a capture");
            };
            assert!(!reason.is_empty());
        }
    }

    #[test]
    fn length_is_trimmed() {
        let classified = classifier()
            .classify("<TM><Length> 7 </Length></TM><CRC>1</CRC>")
            .unwrap();
        assert_eq!(classified.action, Action::BeginTelemetry { remaining: 17 });
    }

    #[test]
    fn respects_configured_maximum() {
        let classified = MessageClassifier::new(8)
            .classify("<TM><Length>9</Length></TM><CRC>1</CRC>")
            .unwrap();
        assert!(matches!(classified.action, Action::InvalidLength(_)));
    }

    #[test]
    fn malformed_markup_is_an_error() {
        let err = classifier()
            .classify("<TM><Length>3</Length></TM></CRC>")
            .unwrap_err();
        assert!(matches!(err, FrameError::MalformedEnvelope(_)));
    }

    #[test]
    fn frame_without_elements_is_empty() {
        let err = classifier().classify("just text").unwrap_err();
        assert_eq!(err, FrameError::EmptyEnvelope);
    }
}
