use std::fmt;

use thiserror::Error;

/// Prefix that marks a result string as an exception rather than a value.
pub const EXCEPTION_TAG: &str = "__EXCEPTION__:";

/// Acknowledgement token returned by `import` and `make`.
pub const OK: &str = "OK";

/// One operand or result on the wire: a string, or a list of them.
///
/// Lists nest. The executor passes lists through untouched when the
/// target parameter or return type is a generic list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    Text(String),
    List(Vec<WireValue>),
}

impl WireValue {
    #[inline]
    pub fn text(value: impl Into<String>) -> Self {
        WireValue::Text(value.into())
    }

    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            WireValue::Text(text) => Some(text),
            WireValue::List(_) => None,
        }
    }

    /// True when this result carries the reserved exception tag.
    #[inline]
    pub fn is_exception(&self) -> bool {
        match self {
            WireValue::Text(text) => text.starts_with(EXCEPTION_TAG),
            WireValue::List(_) => false,
        }
    }

    /// Flat text rendering: strings as-is, lists as `[a, b, c]`.
    pub fn render_text(&self) -> String {
        match self {
            WireValue::Text(text) => text.clone(),
            WireValue::List(items) => {
                let rendered: Vec<String> =
                    items.iter().map(WireValue::render_text).collect();
                format!("[{}]", rendered.join(", "))
            }
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_text())
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::Text(value.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::Text(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Import,
    Make,
    Call,
    CallAndAssign,
}

impl Verb {
    pub fn parse(text: &str) -> Option<Verb> {
        match text {
            "import" => Some(Verb::Import),
            "make" => Some(Verb::Make),
            "call" => Some(Verb::Call),
            "callAndAssign" => Some(Verb::CallAndAssign),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Import => "import",
            Verb::Make => "make",
            Verb::Call => "call",
            Verb::CallAndAssign => "callAndAssign",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Structurally broken statement. Aborts the whole batch; contrast
    /// with `UnknownVerb`, which only fails its own instruction.
    #[error("malformed instruction: {0}")]
    Malformed(String),
    #[error("unknown operation {verb:?} in instruction {id:?}")]
    UnknownVerb { id: String, verb: String },
}

/// One symbolic operation. Created by the table compiler or parsed from
/// the wire, consumed exactly once by the statement executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub id: String,
    pub verb: Verb,
    pub operands: Vec<WireValue>,
}

impl Instruction {
    pub fn new(id: impl Into<String>, verb: Verb, operands: Vec<WireValue>) -> Self {
        Self {
            id: id.into(),
            verb,
            operands,
        }
    }

    /// Parses the `[id, verb, ...operands]` wire form.
    pub fn from_wire(statement: &WireValue) -> Result<Instruction, WireError> {
        let items = match statement {
            WireValue::List(items) => items,
            WireValue::Text(text) => {
                return Err(WireError::Malformed(format!(
                    "expected a list, got the string {text:?}"
                )));
            }
        };
        let id = match items.first().and_then(WireValue::as_text) {
            Some(id) => id.to_owned(),
            None => return Err(WireError::Malformed("missing instruction id".into())),
        };
        let verb_text = match items.get(1).and_then(WireValue::as_text) {
            Some(verb) => verb,
            None => {
                return Err(WireError::Malformed(format!(
                    "instruction {id:?} has no operation"
                )));
            }
        };
        let verb = Verb::parse(verb_text).ok_or_else(|| WireError::UnknownVerb {
            id: id.clone(),
            verb: verb_text.to_owned(),
        })?;
        let operands = items[2..].to_vec();
        if operands.len() < Self::minimum_operands(verb) {
            return Err(WireError::Malformed(format!(
                "instruction {id:?}: {} takes at least {} operands, got {}",
                verb.as_str(),
                Self::minimum_operands(verb),
                operands.len()
            )));
        }
        Ok(Instruction { id, verb, operands })
    }

    fn minimum_operands(verb: Verb) -> usize {
        match verb {
            Verb::Import => 1,
            Verb::Make => 2,
            Verb::Call => 2,
            Verb::CallAndAssign => 3,
        }
    }

    pub fn to_wire(&self) -> WireValue {
        let mut items = Vec::with_capacity(self.operands.len() + 2);
        items.push(WireValue::text(self.id.clone()));
        items.push(WireValue::text(self.verb.as_str()));
        items.extend(self.operands.iter().cloned());
        WireValue::List(items)
    }
}
