//! Minimal markup tree: enough XML to read Zephyr envelopes and to write
//! the commands sent back to the instrument.
//!
//! Supported: elements, attributes (single or double quoted), text with the
//! five predefined entities and numeric character references, comments,
//! CDATA sections and processing instructions (skipped). DTDs are rejected.

use serde_json::{Map, Value};

/// Errors produced while parsing markup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unexpected {found:?} at offset {offset}")]
    Unexpected { found: char, offset: usize },

    #[error("mismatched end tag </{found}> for <{expected}> at offset {offset}")]
    MismatchedTag {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("unknown entity &{name}; at offset {offset}")]
    UnknownEntity { name: String, offset: usize },

    #[error("duplicate attribute {name:?} at offset {offset}")]
    DuplicateAttribute { name: String, offset: usize },

    #[error("content after root element at offset {0}")]
    TrailingContent(usize),

    #[error("document has no root element")]
    NoRootElement,
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A parsed (or programmatically built) element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: append an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: append a leaf child `<name>text</name>`.
    pub fn with_field(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.with_child(Element::new(name).with_text(text))
    }

    /// Builder: append a text node.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|element| element.name == name)
    }

    /// Concatenated direct text content with surrounding whitespace removed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(text) = node {
                out.push_str(text);
            }
        }
        out.trim().to_string()
    }

    /// Convert the element's content to JSON.
    ///
    /// Leaves become strings (or null when empty), attributes are keyed
    /// `@name`, repeated children collapse into arrays and text mixed with
    /// elements is stored under `#text`. Key order follows the document.
    pub fn to_json(&self) -> Value {
        let text = self.text();
        if self.attributes.is_empty() && self.elements().next().is_none() {
            return if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
        }

        let mut map = Map::new();
        for (name, value) in &self.attributes {
            map.insert(format!("@{name}"), Value::String(value.clone()));
        }
        for child in self.elements() {
            let value = child.to_json();
            match map.get_mut(child.name()) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    map.insert(child.name.clone(), value);
                }
            }
        }
        if !text.is_empty() {
            map.insert("#text".to_string(), Value::String(text));
        }
        Value::Object(map)
    }

    /// Render as indented markup, one element per line.
    ///
    /// Leaves holding only text stay on one line (`<Msg>1</Msg>`), empty
    /// elements self-close, and every line ends with `\n`.
    pub fn to_pretty_string(&self, indent: &str) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, indent, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, indent: &str, depth: usize) {
        let pad = indent.repeat(depth);
        out.push_str(&pad);
        out.push('<');
        out.push_str(&self.name);
        for (name, value) in &self.attributes {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(out, value);
            out.push('"');
        }

        match self.children.as_slice() {
            [] => out.push_str("/>\n"),
            [Node::Text(text)] => {
                out.push('>');
                escape_into(out, text);
                out.push_str("</");
                out.push_str(&self.name);
                out.push_str(">\n");
            }
            children => {
                out.push_str(">\n");
                for child in children {
                    match child {
                        Node::Element(element) => element.write_pretty(out, indent, depth + 1),
                        Node::Text(text) => {
                            let trimmed = text.trim();
                            if !trimmed.is_empty() {
                                out.push_str(&indent.repeat(depth + 1));
                                escape_into(out, trimmed);
                                out.push('\n');
                            }
                        }
                    }
                }
                out.push_str(&pad);
                out.push_str("</");
                out.push_str(&self.name);
                out.push_str(">\n");
            }
        }
    }
}

fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Parse a document holding exactly one root element.
pub fn parse(text: &str) -> Result<Element, MarkupError> {
    let mut parser = Parser { src: text, pos: 0 };
    parser.skip_misc()?;
    if parser.at_end() {
        return Err(MarkupError::NoRootElement);
    }
    let root = parser.element()?;
    parser.skip_misc()?;
    if !parser.at_end() {
        return Err(MarkupError::TrailingContent(parser.pos));
    }
    Ok(root)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn unexpected(&self) -> MarkupError {
        match self.peek() {
            Some(found) => MarkupError::Unexpected {
                found,
                offset: self.pos,
            },
            None => MarkupError::UnexpectedEof,
        }
    }

    fn expect(&mut self, ch: char) -> Result<(), MarkupError> {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Consume everything up to and including `terminator`.
    fn skip_past(&mut self, terminator: &str) -> Result<&'a str, MarkupError> {
        let rest = self.rest();
        let idx = rest.find(terminator).ok_or(MarkupError::UnexpectedEof)?;
        self.pos += idx + terminator.len();
        Ok(&rest[..idx])
    }

    /// Whitespace, comments and processing instructions outside the root.
    fn skip_misc(&mut self) -> Result<(), MarkupError> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<&'a str, MarkupError> {
        let rest = self.rest();
        let mut end = 0;
        for (idx, ch) in rest.char_indices() {
            let valid = if idx == 0 {
                ch.is_ascii_alphabetic() || ch == '_' || ch == ':'
            } else {
                ch.is_ascii_alphanumeric() || matches!(ch, '_' | ':' | '-' | '.')
            };
            if !valid {
                break;
            }
            end = idx + ch.len_utf8();
        }
        if end == 0 {
            return Err(self.unexpected());
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    fn element(&mut self) -> Result<Element, MarkupError> {
        self.expect('<')?;
        let mut element = Element::new(self.name()?);

        loop {
            let before = self.pos;
            self.skip_whitespace();
            match self.peek() {
                Some('/') => {
                    self.pos += 1;
                    self.expect('>')?;
                    return Ok(element);
                }
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                Some(_) if self.pos > before => {
                    let offset = self.pos;
                    let name = self.name()?;
                    self.skip_whitespace();
                    self.expect('=')?;
                    self.skip_whitespace();
                    let value = self.quoted()?;
                    if element.attribute(name).is_some() {
                        return Err(MarkupError::DuplicateAttribute {
                            name: name.to_string(),
                            offset,
                        });
                    }
                    element.attributes.push((name.to_string(), value));
                }
                _ => return Err(self.unexpected()),
            }
        }

        self.content(&mut element)?;
        Ok(element)
    }

    fn quoted(&mut self) -> Result<String, MarkupError> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        let start = self.pos;
        let rest = self.rest();
        let idx = rest.find(quote).ok_or(MarkupError::UnexpectedEof)?;
        let raw = &rest[..idx];
        if let Some(lt) = raw.find('<') {
            self.pos = start + lt;
            return Err(self.unexpected());
        }
        self.pos = start + idx + 1;
        decode_entities(raw, start)
    }

    /// Children up to and including the matching end tag.
    fn content(&mut self, element: &mut Element) -> Result<(), MarkupError> {
        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(MarkupError::UnexpectedEof);
            }

            if rest.starts_with("</") {
                let offset = self.pos;
                self.pos += 2;
                let name = self.name()?;
                self.skip_whitespace();
                self.expect('>')?;
                if name != element.name {
                    return Err(MarkupError::MismatchedTag {
                        expected: element.name.clone(),
                        found: name.to_string(),
                        offset,
                    });
                }
                return Ok(());
            } else if rest.starts_with("<!--") {
                self.skip_past("-->")?;
            } else if rest.starts_with("<![CDATA[") {
                self.pos += "<![CDATA[".len();
                let data = self.skip_past("]]>")?;
                element.children.push(Node::Text(data.to_string()));
            } else if rest.starts_with("<?") {
                self.skip_past("?>")?;
            } else if rest.starts_with('<') {
                let child = self.element()?;
                element.children.push(Node::Element(child));
            } else {
                let start = self.pos;
                let end = rest.find('<').unwrap_or(rest.len());
                self.pos += end;
                let text = decode_entities(&rest[..end], start)?;
                element.children.push(Node::Text(text));
            }
        }
    }
}

fn decode_entities(raw: &str, base_offset: usize) -> Result<String, MarkupError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let offset = base_offset + (raw.len() - rest.len()) + amp;
        let after = &rest[amp + 1..];
        let semi = after.find(';').ok_or(MarkupError::UnknownEntity {
            name: after.chars().take(8).collect(),
            offset,
        })?;
        let name = &after[..semi];
        let decoded = match name {
            "lt" => Some('<'),
            "gt" => Some('>'),
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => name
                .strip_prefix("#x")
                .or_else(|| name.strip_prefix("#X"))
                .map(|hex| u32::from_str_radix(hex, 16))
                .or_else(|| name.strip_prefix('#').map(str::parse::<u32>))
                .and_then(|code| code.ok())
                .and_then(char::from_u32),
        };
        match decoded {
            Some(ch) => out.push(ch),
            None => {
                return Err(MarkupError::UnknownEntity {
                    name: name.to_string(),
                    offset,
                })
            }
        }
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
