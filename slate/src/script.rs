use thiserror::Error;

use crate::{Expectation, ExpectationKind, Instruction, Table, Verb, WireValue};

/// Name the compiled instructions register and call the actor under.
pub const ACTOR_INSTANCE: &str = "scriptTableActor";

/// Compile-time structural error. Fatal to this one table, reported
/// immediately; never surfaces as a runtime exception marker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("script table syntax error: {0}")]
pub struct SyntaxError(pub String);

/// Output of compiling one script table: the ordered instruction list
/// plus the expectations binding instruction ids back to cells.
#[derive(Debug)]
pub struct CompiledScript {
    pub instructions: Vec<Instruction>,
    pub expectations: Vec<Expectation>,
}

/// Walks a script table row by row, recognizing the leading keyword of
/// each row and emitting instructions for the statement executor.
pub struct ScriptTable<'a, T: Table> {
    table: &'a T,
    table_id: String,
    instructions: Vec<Instruction>,
    expectations: Vec<Expectation>,
}

impl<'a, T: Table> ScriptTable<'a, T> {
    pub fn compile(table: &'a T, table_id: &str) -> Result<CompiledScript, SyntaxError> {
        if table.row_count() < 2 {
            return Err(SyntaxError(
                "script tables need a header row and at least one statement row".into(),
            ));
        }
        let mut script = Self {
            table,
            table_id: table_id.to_owned(),
            instructions: Vec::new(),
            expectations: Vec::new(),
        };
        for row in 1..table.row_count() {
            script.compile_row(row);
        }
        Ok(CompiledScript {
            instructions: script.instructions,
            expectations: script.expectations,
        })
    }

    fn compile_row(&mut self, row: usize) {
        let first_cell = self.cell(0, row).to_owned();
        if first_cell.eq_ignore_ascii_case("start") {
            self.start_actor(row);
        } else if first_cell.eq_ignore_ascii_case("check") {
            self.check(row);
        } else if first_cell.eq_ignore_ascii_case("reject") {
            self.keyword_action(ExpectationKind::Reject, row);
        } else if first_cell.eq_ignore_ascii_case("ensure") {
            self.keyword_action(ExpectationKind::Ensure, row);
        } else if first_cell.eq_ignore_ascii_case("show") {
            self.keyword_action(ExpectationKind::Show, row);
        } else if first_cell.eq_ignore_ascii_case("note") {
            // comment row
        } else if let Some(symbol) = symbol_assignment_name(&first_cell) {
            self.action_and_assign(symbol.to_owned(), row);
        } else {
            self.action(row);
        }
    }

    fn start_actor(&mut self, row: usize) {
        let class_name = disgrace_class_name(self.cell(1, row));
        if class_name.is_empty() {
            return;
        }
        let last_col = self.last_col(row);
        let mut operands = vec![
            WireValue::text(ACTOR_INSTANCE),
            WireValue::text(class_name),
        ];
        // constructor arguments: every cell after the class name
        for col in 2..=last_col {
            operands.push(WireValue::text(self.cell(col, row)));
        }
        let id = self.next_instruction_id();
        self.instructions.push(Instruction::new(id, Verb::Make, operands));
    }

    fn check(&mut self, row: usize) {
        let last_col = self.last_col(row);
        let expected = self.cell(last_col, row).to_owned();
        self.expect(ExpectationKind::ReturnedValue(expected), last_col, row);
        if last_col >= 2 {
            self.invoke_action(1, last_col - 1, row);
        }
    }

    fn keyword_action(&mut self, kind: ExpectationKind, row: usize) {
        self.expect(kind, 0, row);
        let last_col = self.last_col(row);
        if last_col >= 1 {
            self.invoke_action(1, last_col, row);
        }
    }

    fn action(&mut self, row: usize) {
        self.expect(ExpectationKind::Action, 0, row);
        self.invoke_action(0, self.last_col(row), row);
    }

    fn action_and_assign(&mut self, symbol: String, row: usize) {
        self.expect(ExpectationKind::SymbolAssignment(symbol.clone()), 0, row);
        let last_col = self.last_col(row);
        if last_col < 1 {
            return;
        }
        let action_name = self.action_name(1, last_col, row);
        if action_name.is_empty() {
            return;
        }
        let mut operands = vec![
            WireValue::text(symbol),
            WireValue::text(ACTOR_INSTANCE),
            WireValue::text(action_name),
        ];
        operands.extend(self.arguments(2, last_col, row));
        let id = self.next_instruction_id();
        self.instructions
            .push(Instruction::new(id, Verb::CallAndAssign, operands));
    }

    fn invoke_action(&mut self, starting_col: usize, ending_col: usize, row: usize) {
        let action_name = self.action_name(starting_col, ending_col, row);
        if action_name.is_empty() {
            return;
        }
        let mut operands = vec![
            WireValue::text(ACTOR_INSTANCE),
            WireValue::text(action_name),
        ];
        operands.extend(self.arguments(starting_col + 1, ending_col, row));
        let id = self.next_instruction_id();
        self.instructions.push(Instruction::new(id, Verb::Call, operands));
    }

    /// Concatenates the cells at every second column from `starting_col`
    /// through `ending_col`, then normalizes the result into one name.
    fn action_name(&self, starting_col: usize, ending_col: usize, row: usize) -> String {
        let mut words = Vec::new();
        let mut col = starting_col;
        while col <= ending_col {
            words.push(self.cell(col, row).to_owned());
            col += 2;
        }
        disgrace_method_name(&words.join(" "))
    }

    /// Cells at odd offsets are arguments; each gets an expectation so
    /// symbol expansion can be shown regardless of outcome.
    fn arguments(&mut self, starting_col: usize, ending_col: usize, row: usize) -> Vec<WireValue> {
        let mut args = Vec::new();
        let mut col = starting_col;
        while col <= ending_col {
            args.push(WireValue::text(self.cell(col, row)));
            self.expect(ExpectationKind::Argument, col, row);
            col += 2;
        }
        args
    }

    fn expect(&mut self, kind: ExpectationKind, col: usize, row: usize) {
        let instruction_id = self.next_instruction_id();
        self.expectations.push(Expectation {
            instruction_id,
            col,
            row,
            kind,
        });
    }

    // Expectations are recorded before their instruction is appended, so
    // the pending id is always instructions.len().
    fn next_instruction_id(&self) -> String {
        format!("scriptTable_{}_{}", self.table_id, self.instructions.len())
    }

    fn last_col(&self, row: usize) -> usize {
        self.table.column_count_in_row(row).saturating_sub(1)
    }

    fn cell(&self, col: usize, row: usize) -> &str {
        if col < self.table.column_count_in_row(row) {
            self.table.cell_contents(col, row)
        } else {
            ""
        }
    }
}

/// `$name=` in the first cell marks a symbol assignment row.
fn symbol_assignment_name(cell: &str) -> Option<&str> {
    let name = cell.strip_prefix('$')?.strip_suffix('=')?;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(name)
}

/// Strips characters that are illegal in an identifier and re-cases at
/// word boundaries: "bob martin" becomes "BobMartin".
pub fn disgrace_class_name(name: &str) -> String {
    disgrace(name, true)
}

/// Method-name form keeps the first character as written:
/// "eat meals with" becomes "eatMealsWith".
pub fn disgrace_method_name(name: &str) -> String {
    disgrace(name, false)
}

fn disgrace(name: &str, capitalize_first: bool) -> String {
    let mut out = String::with_capacity(name.len());
    let mut capitalize_next = capitalize_first;
    for c in name.chars() {
        if !c.is_ascii_alphanumeric() {
            capitalize_next = true;
            continue;
        }
        if capitalize_next {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        capitalize_next = false;
    }
    out
}
