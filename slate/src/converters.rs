use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

/// Wire form of a void result. Reserved; no legitimate string value may
/// collide with it.
pub const VOID_TAG: &str = "/__VOID__/";

/// Boolean wire forms, shared by the executor and the annotation engine.
pub const TRUE: &str = "true";
pub const FALSE: &str = "false";

const DATE_FORMAT: &str = "%d-%b-%Y";

/// Target type of a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Void,
    Text,
    Int,
    Double,
    Bool,
    Char,
    Date,
    /// Generic list: passed through untouched, never converted.
    List,
    IntList,
    DoubleList,
    BoolList,
    TextList,
}

impl TypeDescriptor {
    pub fn name(&self) -> &'static str {
        match self {
            TypeDescriptor::Void => "void",
            TypeDescriptor::Text => "string",
            TypeDescriptor::Int => "int",
            TypeDescriptor::Double => "double",
            TypeDescriptor::Bool => "boolean",
            TypeDescriptor::Char => "char",
            TypeDescriptor::Date => "date",
            TypeDescriptor::List => "list",
            TypeDescriptor::IntList => "int[]",
            TypeDescriptor::DoubleList => "double[]",
            TypeDescriptor::BoolList => "boolean[]",
            TypeDescriptor::TextList => "string[]",
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A converted, typed value as seen by fixture code.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Text(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Char(char),
    Date(NaiveDate),
    List(Vec<Value>),
}

impl Value {
    /// Default text rendering used when no converter is registered for a
    /// return type.
    pub fn render_text(&self) -> String {
        match self {
            Value::Void => VOID_TAG.to_owned(),
            Value::Text(text) => text.clone(),
            Value::Int(n) => n.to_string(),
            Value::Double(d) => d.to_string(),
            Value::Bool(true) => TRUE.to_owned(),
            Value::Bool(false) => FALSE.to_owned(),
            Value::Char(c) => c.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::List(items) => {
                let rendered: Vec<String> =
                    items.iter().map(Value::render_text).collect();
                format!("[{}]", rendered.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {text:?} to {target}")]
pub struct ConvertError {
    pub text: String,
    pub target: &'static str,
}

impl ConvertError {
    fn new(text: &str, target: &'static str) -> Self {
        Self {
            text: text.to_owned(),
            target,
        }
    }
}

/// Bidirectional string/value transformer for one type.
pub trait Converter {
    fn encode(&self, value: &Value) -> String;
    fn decode(&self, text: &str) -> Result<Value, ConvertError>;
}

pub struct VoidConverter;

impl Converter for VoidConverter {
    fn encode(&self, _value: &Value) -> String {
        VOID_TAG.to_owned()
    }

    fn decode(&self, _text: &str) -> Result<Value, ConvertError> {
        Ok(Value::Void)
    }
}

pub struct TextConverter;

impl Converter for TextConverter {
    fn encode(&self, value: &Value) -> String {
        value.render_text()
    }

    fn decode(&self, text: &str) -> Result<Value, ConvertError> {
        Ok(Value::Text(text.to_owned()))
    }
}

pub struct IntConverter;

impl Converter for IntConverter {
    fn encode(&self, value: &Value) -> String {
        value.render_text()
    }

    fn decode(&self, text: &str) -> Result<Value, ConvertError> {
        text.trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| ConvertError::new(text, "int"))
    }
}

pub struct DoubleConverter;

impl Converter for DoubleConverter {
    fn encode(&self, value: &Value) -> String {
        value.render_text()
    }

    fn decode(&self, text: &str) -> Result<Value, ConvertError> {
        text.trim()
            .parse::<f64>()
            .map(Value::Double)
            .map_err(|_| ConvertError::new(text, "double"))
    }
}

/// `"true"` (any case) decodes to true, everything else to false. The
/// permissive decode matches the wire contract: ensure/reject cells key
/// off the exact `true`/`false` tokens, never off a decode error.
pub struct BoolConverter;

impl Converter for BoolConverter {
    fn encode(&self, value: &Value) -> String {
        value.render_text()
    }

    fn decode(&self, text: &str) -> Result<Value, ConvertError> {
        let text = text.trim();
        let truthy = text.eq_ignore_ascii_case(TRUE) || text.eq_ignore_ascii_case("yes");
        Ok(Value::Bool(truthy))
    }
}

pub struct CharConverter;

impl Converter for CharConverter {
    fn encode(&self, value: &Value) -> String {
        value.render_text()
    }

    fn decode(&self, text: &str) -> Result<Value, ConvertError> {
        text.chars()
            .next()
            .map(Value::Char)
            .ok_or_else(|| ConvertError::new(text, "char"))
    }
}

/// Dates travel as `dd-Mon-yyyy`, e.g. `05-Jan-2009`.
pub struct DateConverter;

impl Converter for DateConverter {
    fn encode(&self, value: &Value) -> String {
        value.render_text()
    }

    fn decode(&self, text: &str) -> Result<Value, ConvertError> {
        NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .map(Value::Date)
            .map_err(|_| ConvertError::new(text, "date"))
    }
}

/// Typed list converter: `[a, b, c]` (brackets optional on decode),
/// elements converted through the given element converter.
pub struct ListOf<C> {
    element: C,
}

impl<C> ListOf<C> {
    pub fn new(element: C) -> Self {
        Self { element }
    }
}

impl<C: Converter> Converter for ListOf<C> {
    fn encode(&self, value: &Value) -> String {
        match value {
            Value::List(items) => {
                let rendered: Vec<String> =
                    items.iter().map(|item| self.element.encode(item)).collect();
                format!("[{}]", rendered.join(", "))
            }
            other => other.render_text(),
        }
    }

    fn decode(&self, text: &str) -> Result<Value, ConvertError> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .unwrap_or(trimmed);
        if inner.trim().is_empty() {
            return Ok(Value::List(Vec::new()));
        }
        let mut items = Vec::new();
        for piece in inner.split(',') {
            items.push(self.element.decode(piece.trim())?);
        }
        Ok(Value::List(items))
    }
}

/// Per-executor converter registry. Owned by one statement executor,
/// never shared between sessions.
pub struct ConverterRegistry {
    converters: HashMap<TypeDescriptor, Box<dyn Converter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Registry with every builtin converter installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TypeDescriptor::Void, Box::new(VoidConverter));
        registry.register(TypeDescriptor::Text, Box::new(TextConverter));
        registry.register(TypeDescriptor::Int, Box::new(IntConverter));
        registry.register(TypeDescriptor::Double, Box::new(DoubleConverter));
        registry.register(TypeDescriptor::Bool, Box::new(BoolConverter));
        registry.register(TypeDescriptor::Char, Box::new(CharConverter));
        registry.register(TypeDescriptor::Date, Box::new(DateConverter));
        registry.register(TypeDescriptor::IntList, Box::new(ListOf::new(IntConverter)));
        registry.register(
            TypeDescriptor::DoubleList,
            Box::new(ListOf::new(DoubleConverter)),
        );
        registry.register(TypeDescriptor::BoolList, Box::new(ListOf::new(BoolConverter)));
        registry.register(TypeDescriptor::TextList, Box::new(ListOf::new(TextConverter)));
        registry
    }

    pub fn register(&mut self, ty: TypeDescriptor, converter: Box<dyn Converter>) {
        self.converters.insert(ty, converter);
    }

    pub fn lookup(&self, ty: TypeDescriptor) -> Option<&dyn Converter> {
        self.converters.get(&ty).map(Box::as_ref)
    }

    /// Encodes through the registered converter, falling back to the
    /// value's default rendering when none is registered.
    pub fn encode(&self, value: &Value, ty: TypeDescriptor) -> String {
        match self.lookup(ty) {
            Some(converter) => converter.encode(value),
            None => value.render_text(),
        }
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ConverterRegistry {
        ConverterRegistry::with_defaults()
    }

    fn round_trip(ty: TypeDescriptor, value: Value) {
        let registry = defaults();
        let converter = registry.lookup(ty).unwrap();
        let encoded = converter.encode(&value);
        let decoded = converter.decode(&encoded).unwrap();
        assert_eq!(decoded, value, "round trip through {ty} via {encoded:?}");
    }

    #[test]
    fn every_default_converter_round_trips() {
        round_trip(TypeDescriptor::Text, Value::Text("some string".into()));
        round_trip(TypeDescriptor::Int, Value::Int(-42));
        round_trip(TypeDescriptor::Double, Value::Double(3.5));
        round_trip(TypeDescriptor::Bool, Value::Bool(true));
        round_trip(TypeDescriptor::Bool, Value::Bool(false));
        round_trip(TypeDescriptor::Char, Value::Char('x'));
        round_trip(
            TypeDescriptor::Date,
            Value::Date(NaiveDate::from_ymd_opt(2009, 1, 5).unwrap()),
        );
        round_trip(
            TypeDescriptor::IntList,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        );
        round_trip(
            TypeDescriptor::DoubleList,
            Value::List(vec![Value::Double(1.5), Value::Double(2.5)]),
        );
        round_trip(
            TypeDescriptor::BoolList,
            Value::List(vec![Value::Bool(true), Value::Bool(false)]),
        );
        round_trip(
            TypeDescriptor::TextList,
            Value::List(vec![Value::Text("one".into()), Value::Text("two".into())]),
        );
    }

    #[test]
    fn void_encodes_to_the_reserved_tag() {
        let registry = defaults();
        assert_eq!(registry.encode(&Value::Void, TypeDescriptor::Void), VOID_TAG);
    }

    #[test]
    fn bool_decode_is_case_insensitive_and_permissive() {
        let converter = BoolConverter;
        assert_eq!(converter.decode("TRUE").unwrap(), Value::Bool(true));
        assert_eq!(converter.decode("yes").unwrap(), Value::Bool(true));
        assert_eq!(converter.decode("false").unwrap(), Value::Bool(false));
        assert_eq!(converter.decode("whatever").unwrap(), Value::Bool(false));
    }

    #[test]
    fn date_parses_the_wire_format() {
        let converter = DateConverter;
        assert_eq!(
            converter.decode("05-Jan-2009").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2009, 1, 5).unwrap())
        );
        assert!(converter.decode("2009-01-05").is_err());
    }

    #[test]
    fn int_decode_rejects_garbage() {
        assert!(IntConverter.decode("seven").is_err());
    }

    #[test]
    fn empty_list_decodes_to_an_empty_vec() {
        let converter = ListOf::new(IntConverter);
        assert_eq!(converter.decode("[]").unwrap(), Value::List(Vec::new()));
        assert_eq!(converter.decode("").unwrap(), Value::List(Vec::new()));
    }

    #[test]
    fn list_decode_accepts_bare_comma_form() {
        let converter = ListOf::new(IntConverter);
        assert_eq!(
            converter.decode("1, 2, 3").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn lookup_misses_for_unregistered_types() {
        let registry = ConverterRegistry::new();
        assert!(registry.lookup(TypeDescriptor::Int).is_none());
    }
}
