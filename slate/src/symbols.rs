use std::collections::HashMap;

use crate::WireValue;

/// Symbol bindings created by `callAndAssign` and read back by `$name`
/// substitution in later instruction arguments.
#[derive(Debug, Default)]
pub struct SymbolTable {
    bindings: HashMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    /// Replaces every `$name` occurrence with its bound value.
    ///
    /// Single left-to-right pass over a snapshot of the table:
    /// substituted output is never rescanned, so self-referential values
    /// cannot loop. Unknown symbols are left verbatim.
    pub fn substitute(&self, text: &str) -> String {
        self.scan(text, |name, value| match value {
            Some(value) => value.to_owned(),
            None => format!("${name}"),
        })
    }

    /// Annotation form: bound symbols render as `$name->[value]` so a
    /// reader sees both the symbol and what it expanded to.
    pub fn expand_for_display(&self, text: &str) -> String {
        self.scan(text, |name, value| match value {
            Some(value) => format!("${name}->[{value}]"),
            None => format!("${name}"),
        })
    }

    fn scan(&self, text: &str, mut replace: impl FnMut(&str, Option<&str>) -> String) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(dollar) = rest.find('$') {
            out.push_str(&rest[..dollar]);
            let after = &rest[dollar + 1..];
            let name_len = symbol_name_len(after);
            if name_len == 0 {
                out.push('$');
                rest = after;
                continue;
            }
            let name = &after[..name_len];
            out.push_str(&replace(name, self.get(name)));
            rest = &after[name_len..];
        }
        out.push_str(rest);
        out
    }

    /// Recursive substitution over wire operands; list structure is kept.
    pub fn substitute_value(&self, value: &WireValue) -> WireValue {
        match value {
            WireValue::Text(text) => WireValue::Text(self.substitute(text)),
            WireValue::List(items) => {
                WireValue::List(items.iter().map(|item| self.substitute_value(item)).collect())
            }
        }
    }

    pub fn substitute_values(&self, values: &[WireValue]) -> Vec<WireValue> {
        values.iter().map(|value| self.substitute_value(value)).collect()
    }
}

// `$` followed by a letter, then letters, digits or underscores.
fn symbol_name_len(text: &str) -> usize {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return 0,
    }
    let mut len = 1;
    for c in chars {
        if c.is_ascii_alphanumeric() || c == '_' {
            len += 1;
        } else {
            break;
        }
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols.set("v", "5");
        symbols.set("v1", "Bob");
        symbols.set("v2", "Martin");
        symbols
    }

    #[test]
    fn substitutes_a_single_symbol() {
        assert_eq!(table().substitute("$v"), "5");
    }

    #[test]
    fn substitutes_multiple_symbols_in_one_argument() {
        assert_eq!(table().substitute("name: $v1 $v2"), "name: Bob Martin");
    }

    #[test]
    fn unknown_symbols_are_left_verbatim() {
        assert_eq!(table().substitute("$unknown stays"), "$unknown stays");
    }

    #[test]
    fn bare_dollar_is_not_a_symbol() {
        assert_eq!(table().substitute("$ $1 $$v"), "$ $1 $5");
    }

    #[test]
    fn substituted_output_is_never_rescanned() {
        let mut symbols = SymbolTable::new();
        symbols.set("a", "$a");
        assert_eq!(symbols.substitute("$a"), "$a");

        symbols.set("b", "$c");
        symbols.set("c", "done");
        // one pass only: $b becomes $c, which is not expanded further
        assert_eq!(symbols.substitute("$b"), "$c");
    }

    #[test]
    fn longest_name_wins_at_each_position() {
        // v1 is bound, so "$v1" must not be read as "$v" followed by "1"
        assert_eq!(table().substitute("$v1"), "Bob");
    }

    #[test]
    fn expansion_shows_symbol_and_value() {
        assert_eq!(table().expand_for_display("$v"), "$v->[5]");
        assert_eq!(table().expand_for_display("plain"), "plain");
    }

    #[test]
    fn lists_are_substituted_element_wise() {
        let symbols = table();
        let arg = WireValue::List(vec![WireValue::text("$v"), WireValue::text("x")]);
        assert_eq!(
            symbols.substitute_value(&arg),
            WireValue::List(vec![WireValue::text("5"), WireValue::text("x")])
        );
    }

    #[test]
    fn rebinding_overwrites_the_previous_value() {
        let mut symbols = table();
        symbols.set("v", "6");
        assert_eq!(symbols.substitute("$v"), "6");
    }
}
