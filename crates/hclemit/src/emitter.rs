//! The output state machine.
//!
//! [`HclEmitter`] drains a preprocessed event queue and writes formatted
//! configuration text. Formatting state lives on a frame stack: entering
//! a compound value pushes a frame naming the shape being rendered, and
//! the matching end event pops it. Shape decisions are made at each
//! mapping key by the same lookahead classification the preprocessor
//! uses; the events themselves carry no shape information.
//!
//! Writer mechanics track the current column plus two flags, whether the
//! last character written was whitespace and whether the line so far is
//! pure indentation. `write_indent` breaks the line only when something
//! has been written past the indent column, which lets indicators such
//! as `{` share the line with the key that introduced them.

use std::fmt::Write;

use tracing::trace;

use crate::{
    content::AttributeContent,
    error::{ErrorKind, HclError},
    event::{AttributeKey, HclEvent, ScalarValue},
    path::PathStack,
    queue::EventQueue,
    traits::ResourceTraits,
};

/// Spaces added per nesting level.
const INDENT_STEP: usize = 2;

/// Delimiter word for here-documents.
const HEREDOC_TAG: &str = "EOT";

/// Rendering context for the innermost open compound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Directly inside a resource body or a configuration block body.
    Block,
    /// Inside an inline `{ ... }` mapping.
    Mapping,
    /// Inside a `[ ... ]` sequence.
    Sequence,
    /// Inside a `jsonencode( ... )` wrapper.
    Json,
    /// Inside a repeated-block sequence; each element re-emits the key.
    BlockList,
    /// A sequence wrapper swallowed because its single element renders
    /// as one block.
    OmitSequence,
}

/// Shape resolved for the value about to start, decided at its key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Mapping,
    Sequence,
    BlockObject,
    BlockList(String),
    Json,
}

#[derive(Debug)]
struct Frame {
    state: State,
    /// Key re-emitted for every element of a repeated block list.
    block_key: Option<String>,
    /// Whether closing this frame completes an attribute value and must
    /// pop the path stack.
    owns_key: bool,
}

/// Writes one or more resources from an event queue to a text sink.
pub struct HclEmitter<'a, W> {
    out: &'a mut W,
    traits: &'a ResourceTraits,
    frames: Vec<Frame>,
    pending: Option<Pending>,
    path: PathStack,
    indents: Vec<usize>,
    indent: usize,
    column: usize,
    is_whitespace: bool,
    is_indentation: bool,
    resource_type: Option<String>,
    resource_name: Option<String>,
}

impl<'a, W: Write> HclEmitter<'a, W> {
    /// An emitter writing to `out`, classifying attributes with the
    /// given trait entry.
    pub fn new(out: &'a mut W, traits: &'a ResourceTraits) -> Self {
        Self {
            out,
            traits,
            frames: Vec::new(),
            pending: None,
            path: PathStack::new(),
            indents: Vec::new(),
            indent: 0,
            column: 0,
            is_whitespace: true,
            is_indentation: true,
            resource_type: None,
            resource_name: None,
        }
    }

    /// Drains the queue, writing every buffered resource.
    ///
    /// # Errors
    ///
    /// Any [`ErrorKind`] raised mid-resource is returned wrapped with
    /// the identity of the resource being written. Output already
    /// produced for that resource is unusable and should be discarded.
    pub fn emit(&mut self, queue: &mut EventQueue) -> Result<(), HclError> {
        while !queue.is_empty() {
            if let Err(kind) = self.emit_next(queue) {
                return Err(match (&self.resource_type, &self.resource_name) {
                    (Some(t), Some(n)) => kind.for_resource(t, n),
                    _ => kind.into(),
                });
            }
        }
        Ok(())
    }

    fn emit_next(&mut self, queue: &mut EventQueue) -> Result<(), ErrorKind> {
        match queue.dequeue()? {
            HclEvent::ResourceStart { resource_type, name } => {
                self.begin_resource(&resource_type, &name)?;
            }
            HclEvent::ResourceEnd => self.end_resource()?,
            HclEvent::MappingKey(key) => self.handle_key(key, queue)?,
            HclEvent::Scalar(scalar) => self.emit_sequence_element(&scalar)?,
            HclEvent::MappingStart => self.begin_mapping()?,
            HclEvent::MappingEnd => self.end_mapping()?,
            HclEvent::SequenceStart => self.begin_sequence()?,
            HclEvent::SequenceEnd => self.end_sequence()?,
            HclEvent::JsonStart => self.begin_json()?,
            HclEvent::JsonEnd => self.end_json()?,
        }
        Ok(())
    }

    fn state(&self) -> Option<State> {
        self.frames.last().map(|f| f.state)
    }

    // ---- resources ----------------------------------------------------

    fn begin_resource(&mut self, resource_type: &str, name: &str) -> Result<(), ErrorKind> {
        trace!(resource_type, name, "emitting resource");
        self.resource_type = Some(resource_type.to_owned());
        self.resource_name = Some(name.to_owned());
        self.write_word("resource")?;
        self.emit_scalar(&ScalarValue::string(resource_type))?;
        self.emit_scalar(&ScalarValue::string(name))?;
        self.write_indicator("{", true, false, false)?;
        self.increase_indent();
        self.frames.push(Frame {
            state: State::Block,
            block_key: None,
            owns_key: false,
        });
        Ok(())
    }

    fn end_resource(&mut self) -> Result<(), ErrorKind> {
        if !self.path.is_empty() {
            return Err(ErrorKind::DanglingPath {
                path: self.path.current().as_str().to_owned(),
            });
        }
        if self.frames.pop().is_none() {
            return Err(ErrorKind::UnexpectedEvent {
                expected: "ResourceStart",
                actual: "ResourceEnd",
            });
        }
        self.indent = self.indents.pop().ok_or(ErrorKind::UnbalancedEvents)?;
        self.write_indent()?;
        self.write_indicator("}", false, false, true)?;
        self.write_break()?;
        self.write_break()?;
        self.resource_type = None;
        self.resource_name = None;
        self.is_whitespace = true;
        self.is_indentation = true;
        Ok(())
    }

    // ---- keys ---------------------------------------------------------

    fn handle_key(&mut self, key: AttributeKey, queue: &mut EventQueue) -> Result<(), ErrorKind> {
        match self.state() {
            Some(State::Block) => self.handle_block_key(&key, queue),
            Some(State::Mapping | State::Json) => self.handle_inline_key(&key, queue),
            other => Err(ErrorKind::UnexpectedEvent {
                expected: "a state accepting keys",
                actual: state_name(other),
            }),
        }
    }

    /// A key in a resource body or block body: classify the pending
    /// value, suppress or substitute it per the trait table, and set up
    /// the shape for the events that follow.
    fn handle_block_key(
        &mut self,
        key: &AttributeKey,
        queue: &mut EventQueue,
    ) -> Result<(), ErrorKind> {
        if self.traits.is_computed_only(&key.path) {
            queue.skip_value()?;
            return Ok(());
        }

        let content = AttributeContent::analyze_at(queue, 0, &key.path, self.traits)?;
        if content.is_empty() {
            if let Some(default) = self.traits.default_for(&key.path).cloned() {
                queue.skip_value()?;
                self.write_indent()?;
                self.write_word(&key.name)?;
                self.write_indicator("=", true, false, false)?;
                self.emit_default(&default)?;
                return Ok(());
            }
            if !self.traits.is_required(&key.path) {
                trace!(path = key.path.as_str(), "suppressing empty attribute");
                queue.skip_value()?;
                return Ok(());
            }
            // Required and empty: falls through and renders literally.
        }

        self.path.push_key(&key.name);
        match content {
            AttributeContent::Value | AttributeContent::Null | AttributeContent::Empty
            | AttributeContent::EmptyString => {
                if matches!(queue.peek(), Some(HclEvent::JsonStart)) {
                    self.write_indent()?;
                    self.write_word(&key.name)?;
                    self.write_indicator("=", true, false, false)?;
                    self.pending = Some(Pending::Json);
                    return Ok(());
                }
                let HclEvent::Scalar(scalar) = queue.dequeue()? else {
                    return Err(ErrorKind::UnexpectedEvent {
                        expected: "Scalar",
                        actual: "a compound start",
                    });
                };
                self.write_indent()?;
                self.write_word(&key.name)?;
                self.write_indicator("=", true, false, false)?;
                self.emit_value_scalar(&scalar)?;
                self.path.pop();
            }
            AttributeContent::EmptyCollection => {
                // Required empty collections render as a literal.
                let literal = if matches!(queue.peek(), Some(HclEvent::SequenceStart)) {
                    "[]"
                } else {
                    "{}"
                };
                queue.skip_value()?;
                self.write_indent()?;
                self.write_word(&key.name)?;
                self.write_indicator("=", true, false, false)?;
                self.write_indicator(literal, true, false, false)?;
                self.path.pop();
            }
            AttributeContent::Mapping => {
                self.write_indent()?;
                self.write_word(&key.name)?;
                self.write_indicator("=", true, false, false)?;
                self.pending = Some(Pending::Mapping);
            }
            AttributeContent::Sequence => {
                self.write_indent()?;
                self.write_word(&key.name)?;
                self.write_indicator("=", true, false, false)?;
                self.pending = Some(Pending::Sequence);
            }
            AttributeContent::BlockObject => {
                self.write_indent()?;
                self.write_word(&key.name)?;
                self.pending = Some(Pending::BlockObject);
            }
            AttributeContent::BlockList => {
                self.pending = Some(Pending::BlockList(key.name.clone()));
            }
            AttributeContent::NoValue => {
                return Err(ErrorKind::UnexpectedEvent {
                    expected: "a value event",
                    actual: "end of queue",
                });
            }
        }
        Ok(())
    }

    /// A key inside an inline mapping or an embedded JSON document:
    /// always emitted, quoted when it is not a bare identifier.
    fn handle_inline_key(
        &mut self,
        key: &AttributeKey,
        queue: &mut EventQueue,
    ) -> Result<(), ErrorKind> {
        self.path.push_key(&key.name);
        self.write_indent()?;
        self.write_word(&format_key(&key.name))?;
        self.write_indicator("=", true, false, false)?;

        match queue.peek() {
            Some(HclEvent::Scalar(_)) => {
                if let HclEvent::Scalar(scalar) = queue.dequeue()? {
                    self.emit_value_scalar(&scalar)?;
                }
                self.path.pop();
            }
            Some(HclEvent::MappingStart) => self.pending = Some(Pending::Mapping),
            Some(HclEvent::SequenceStart) => self.pending = Some(Pending::Sequence),
            Some(other) => {
                return Err(ErrorKind::UnexpectedEvent {
                    expected: "a value event",
                    actual: other.kind_name(),
                });
            }
            None => return Err(ErrorKind::QueueExhausted),
        }
        Ok(())
    }

    // ---- compound starts and ends --------------------------------------

    fn begin_mapping(&mut self) -> Result<(), ErrorKind> {
        match self.pending.take() {
            Some(Pending::Mapping) => {
                self.open_braces(State::Mapping, true)?;
            }
            Some(Pending::BlockObject) => {
                self.open_braces(State::Block, !matches!(self.state(), Some(State::OmitSequence)))?;
            }
            None => match self.state() {
                Some(State::OmitSequence) => {
                    // The unwrapped sequence form admits exactly one
                    // element; a second would emit an anonymous block.
                    return Err(ErrorKind::UnexpectedEvent {
                        expected: "SequenceEnd",
                        actual: "MappingStart",
                    });
                }
                Some(State::BlockList) => {
                    let block_key = self
                        .frames
                        .last()
                        .and_then(|f| f.block_key.clone())
                        .ok_or(ErrorKind::UnexpectedEvent {
                            expected: "a block list key",
                            actual: "MappingStart",
                        })?;
                    self.write_indent()?;
                    self.write_word(&block_key)?;
                    self.open_braces(State::Block, false)?;
                }
                Some(State::Sequence | State::Json) => {
                    self.write_indent()?;
                    self.open_braces(State::Mapping, false)?;
                }
                other => {
                    return Err(ErrorKind::UnexpectedEvent {
                        expected: "a state accepting mappings",
                        actual: state_name(other),
                    });
                }
            },
            Some(_) => {
                return Err(ErrorKind::UnexpectedEvent {
                    expected: "SequenceStart or JsonStart",
                    actual: "MappingStart",
                });
            }
        }
        Ok(())
    }

    fn open_braces(&mut self, state: State, owns_key: bool) -> Result<(), ErrorKind> {
        self.write_indicator("{", true, false, false)?;
        self.increase_indent();
        self.frames.push(Frame {
            state,
            block_key: None,
            owns_key,
        });
        Ok(())
    }

    fn end_mapping(&mut self) -> Result<(), ErrorKind> {
        let frame = self.frames.pop().ok_or(ErrorKind::UnbalancedEvents)?;
        self.indent = self.indents.pop().ok_or(ErrorKind::UnbalancedEvents)?;
        self.write_indent()?;
        self.write_indicator("}", false, false, true)?;
        if self.state() == Some(State::Sequence) {
            self.write(",")?;
        }
        if frame.owns_key {
            self.path.pop();
        }
        Ok(())
    }

    fn begin_sequence(&mut self) -> Result<(), ErrorKind> {
        match self.pending.take() {
            Some(Pending::BlockList(block_key)) => {
                self.frames.push(Frame {
                    state: State::BlockList,
                    block_key: Some(block_key),
                    owns_key: true,
                });
            }
            Some(Pending::BlockObject) => {
                // Keep the block pending for the element mapping; this
                // wrapper produces no output.
                self.pending = Some(Pending::BlockObject);
                self.frames.push(Frame {
                    state: State::OmitSequence,
                    block_key: None,
                    owns_key: true,
                });
            }
            Some(Pending::Sequence) => self.open_brackets(true)?,
            None => match self.state() {
                Some(State::Sequence | State::Json) => {
                    self.write_indent()?;
                    self.open_brackets(false)?;
                }
                other => {
                    return Err(ErrorKind::UnexpectedEvent {
                        expected: "a state accepting sequences",
                        actual: state_name(other),
                    });
                }
            },
            Some(_) => {
                return Err(ErrorKind::UnexpectedEvent {
                    expected: "MappingStart or JsonStart",
                    actual: "SequenceStart",
                });
            }
        }
        Ok(())
    }

    fn open_brackets(&mut self, owns_key: bool) -> Result<(), ErrorKind> {
        self.write_indicator("[", true, false, true)?;
        self.increase_indent();
        self.frames.push(Frame {
            state: State::Sequence,
            block_key: None,
            owns_key,
        });
        Ok(())
    }

    fn end_sequence(&mut self) -> Result<(), ErrorKind> {
        let frame = self.frames.pop().ok_or(ErrorKind::UnbalancedEvents)?;
        match frame.state {
            State::BlockList | State::OmitSequence => {
                if frame.owns_key {
                    self.path.pop();
                }
            }
            State::Sequence => {
                self.indent = self.indents.pop().ok_or(ErrorKind::UnbalancedEvents)?;
                self.write_indent()?;
                self.write_indicator("]", false, false, false)?;
                if self.state() == Some(State::Sequence) {
                    self.write(",")?;
                }
                if frame.owns_key {
                    self.path.pop();
                }
            }
            _ => return Err(ErrorKind::UnbalancedEvents),
        }
        Ok(())
    }

    fn begin_json(&mut self) -> Result<(), ErrorKind> {
        match self.pending.take() {
            Some(Pending::Json) => {
                self.write_indicator("jsonencode(", true, false, true)?;
                self.increase_indent();
                self.write_indent()?;
                self.frames.push(Frame {
                    state: State::Json,
                    block_key: None,
                    owns_key: true,
                });
                Ok(())
            }
            _ => Err(ErrorKind::UnexpectedEvent {
                expected: "a scalar-position JsonStart",
                actual: "JsonStart",
            }),
        }
    }

    fn end_json(&mut self) -> Result<(), ErrorKind> {
        let frame = self.frames.pop().ok_or(ErrorKind::UnbalancedEvents)?;
        if frame.state != State::Json {
            return Err(ErrorKind::UnbalancedEvents);
        }
        self.indent = self.indents.pop().ok_or(ErrorKind::UnbalancedEvents)?;
        self.write_indent()?;
        self.write_indicator(")", false, false, false)?;
        if self.state() == Some(State::Sequence) {
            self.write(",")?;
        }
        if frame.owns_key {
            self.path.pop();
        }
        Ok(())
    }

    // ---- scalars -------------------------------------------------------

    /// A bare scalar event: an element of the current sequence.
    fn emit_sequence_element(&mut self, scalar: &ScalarValue) -> Result<(), ErrorKind> {
        if self.state() != Some(State::Sequence) {
            return Err(ErrorKind::UnexpectedEvent {
                expected: "Sequence",
                actual: state_name(self.state()),
            });
        }
        self.write_indent()?;
        self.emit_scalar(scalar)?;
        Ok(())
    }

    /// A scalar in value position. Multi-line values render as an
    /// indented here-document instead of a quoted literal.
    fn emit_value_scalar(&mut self, scalar: &ScalarValue) -> Result<(), ErrorKind> {
        if let Some(raw) = &scalar.raw {
            if raw.contains('\n') {
                return self.emit_heredoc(raw);
            }
        }
        self.emit_scalar(scalar)?;
        Ok(())
    }

    fn emit_scalar(&mut self, scalar: &ScalarValue) -> Result<(), ErrorKind> {
        if !self.is_whitespace {
            self.write(" ")?;
        }
        match &scalar.raw {
            None => self.write("null")?,
            Some(raw) => {
                if scalar.quoted {
                    self.write("\"")?;
                    let escaped = escape_quoted(raw);
                    self.write(&escaped)?;
                    self.write("\"")?;
                } else {
                    self.write(raw)?;
                }
            }
        }
        if self.state() == Some(State::Sequence) {
            self.write(",")?;
        }
        self.is_whitespace = false;
        Ok(())
    }

    fn emit_heredoc(&mut self, raw: &str) -> Result<(), ErrorKind> {
        self.write_indicator(&format!("<<-{HEREDOC_TAG}"), true, false, false)?;
        let body_indent = self.indent + INDENT_STEP;
        for line in raw.lines() {
            self.write_break()?;
            for _ in 0..body_indent {
                self.write(" ")?;
            }
            self.write(&escape_template(line))?;
        }
        self.write_break()?;
        for _ in 0..self.indent {
            self.write(" ")?;
        }
        self.write(HEREDOC_TAG)?;
        self.is_whitespace = false;
        self.is_indentation = false;
        Ok(())
    }

    /// Writes a default-substitution value in place of an empty one.
    fn emit_default(&mut self, value: &serde_json::Value) -> Result<(), ErrorKind> {
        match value {
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                self.write_indicator("jsonencode(", true, false, true)?;
                let rendered = serde_json::to_string(value)
                    .map_err(|e| ErrorKind::UnexpectedNode(e.to_string()))?;
                self.write(&rendered)?;
                self.write_indicator(")", false, false, false)?;
            }
            other => self.emit_value_scalar(&ScalarValue::from_json(other))?,
        }
        Ok(())
    }

    // ---- writer mechanics ---------------------------------------------

    fn increase_indent(&mut self) {
        self.indents.push(self.indent);
        self.indent += INDENT_STEP;
    }

    /// Writes a bare token, separated from the previous one by a space.
    fn write_word(&mut self, word: &str) -> Result<(), ErrorKind> {
        if !self.is_whitespace {
            self.write(" ")?;
        }
        self.write(word)?;
        self.is_whitespace = false;
        Ok(())
    }

    fn write(&mut self, value: &str) -> Result<(), ErrorKind> {
        self.out.write_str(value)?;
        self.column += value.chars().count();
        Ok(())
    }

    fn write_break(&mut self) -> Result<(), ErrorKind> {
        self.out.write_char('\n')?;
        self.column = 0;
        Ok(())
    }

    /// Moves to the indent column, breaking the line when anything
    /// beyond indentation is already on it.
    fn write_indent(&mut self) -> Result<(), ErrorKind> {
        let break_required = !self.is_indentation
            || self.column > self.indent
            || (self.column == self.indent && !self.is_whitespace);
        if break_required {
            self.write_break()?;
        }
        while self.column < self.indent {
            self.write(" ")?;
        }
        self.is_whitespace = true;
        self.is_indentation = true;
        Ok(())
    }

    fn write_indicator(
        &mut self,
        indicator: &str,
        need_whitespace: bool,
        whitespace: bool,
        indentation: bool,
    ) -> Result<(), ErrorKind> {
        if need_whitespace && !self.is_whitespace {
            self.write(" ")?;
        }
        self.write(indicator)?;
        self.is_whitespace = whitespace;
        self.is_indentation &= indentation;
        Ok(())
    }
}

fn state_name(state: Option<State>) -> &'static str {
    match state {
        None => "no open frame",
        Some(State::Block) => "Block",
        Some(State::Mapping) => "Mapping",
        Some(State::Sequence) => "Sequence",
        Some(State::Json) => "Json",
        Some(State::BlockList) => "BlockList",
        Some(State::OmitSequence) => "OmitSequence",
    }
}

/// Quotes a mapping key when it contains punctuation or is all digits.
fn format_key(key: &str) -> String {
    let needs_quotes = key.chars().any(|c| c.is_ascii_punctuation() && c != '_')
        || key.chars().all(|c| c.is_ascii_digit());
    if needs_quotes {
        format!("\"{key}\"")
    } else {
        key.to_owned()
    }
}

/// Escapes a quoted literal: backslashes, quotes, and template
/// introducers that would otherwise be interpreted as interpolation.
fn escape_quoted(raw: &str) -> String {
    escape_template(&raw.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Escapes `${` and `%{` so they render literally.
fn escape_template(raw: &str) -> String {
    raw.replace("${", "$${").replace("%{", "%%{")
}
