use std::collections::HashMap;

use log::warn;

use crate::{SymbolTable, Table, WireValue, FALSE, TRUE, VOID_TAG};

/// How a result should be folded back into the table cell it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectationKind {
    /// Plain script action: void leaves the cell alone, a boolean colors
    /// it, anything else is itself a failure.
    Action,
    Ensure,
    Reject,
    Show,
    SymbolAssignment(String),
    ReturnedValue(String),
    /// Argument cell, re-rendered with symbol expansion regardless of
    /// the instruction's outcome.
    Argument,
}

/// Deferred binding between an instruction's result and one table cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub instruction_id: String,
    pub col: usize,
    pub row: usize,
    pub kind: ExpectationKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSummary {
    pub right: usize,
    pub wrong: usize,
    pub ignores: usize,
    pub exceptions: usize,
}

impl TestSummary {
    pub fn all_passed(&self) -> bool {
        self.wrong == 0 && self.exceptions == 0
    }

    pub fn add(&mut self, other: &TestSummary) {
        self.right += other.right;
        self.wrong += other.wrong;
        self.ignores += other.ignores;
        self.exceptions += other.exceptions;
    }
}

/// Wraps authored text so markup characters inside it stay literal.
pub fn literalize(text: &str) -> String {
    format!("!<{text}>!")
}

pub fn pass(text: &str) -> String {
    format!("!style_pass({text})")
}

pub fn fail(text: &str) -> String {
    format!("!style_fail({text})")
}

pub fn ignore(text: &str) -> String {
    format!("!style_ignore({text})")
}

/// Failure layout that shows the offending value next to the message.
pub fn fail_message(value: &str, message: &str) -> String {
    format!("[{value}] {}", fail(message))
}

// Pulls the `message:<<...>>` payload out of an exception marker, or
// falls back to the full marker text.
fn exception_message(marker: &str) -> &str {
    if let Some(start) = marker.find("message:<<") {
        let rest = &marker[start + "message:<<".len()..];
        if let Some(end) = rest.find(">>") {
            return &rest[..end];
        }
    }
    marker
}

/// Rewrites table cells according to the result of each expectation.
///
/// Missing result ids leave the cell as authored; results are never
/// fabricated. Nothing here propagates: annotation failures degrade to
/// fail-styled cells.
pub fn evaluate_expectations(
    table: &mut impl Table,
    expectations: &[Expectation],
    results: &HashMap<String, WireValue>,
    symbols: &SymbolTable,
) -> TestSummary {
    let mut summary = TestSummary::default();
    for expectation in expectations {
        evaluate_one(table, expectation, results, symbols, &mut summary);
    }
    summary
}

fn evaluate_one(
    table: &mut impl Table,
    expectation: &Expectation,
    results: &HashMap<String, WireValue>,
    symbols: &SymbolTable,
    summary: &mut TestSummary,
) {
    let (col, row) = (expectation.col, expectation.row);
    let original = table.cell_contents(col, row).to_owned();

    if expectation.kind == ExpectationKind::Argument {
        let expanded = symbols.expand_for_display(&original);
        if expanded != original {
            table.set_cell_contents(col, row, literalize(&expanded));
        }
        return;
    }

    let Some(result) = results.get(&expectation.instruction_id) else {
        return;
    };
    let actual = result.render_text();

    if result.is_exception() {
        warn!(
            "instruction {} raised: {}",
            expectation.instruction_id, actual
        );
        let message = exception_message(&actual);
        table.set_cell_contents(
            col,
            row,
            fail_message(&literalize(&original), message),
        );
        summary.exceptions += 1;
        return;
    }

    match &expectation.kind {
        ExpectationKind::ReturnedValue(expected) => {
            // the expected cell may reference symbols; compare against
            // the substituted form, display the expansion
            let substituted = symbols.substitute(expected);
            let expanded = symbols.expand_for_display(expected);
            if actual == substituted {
                table.set_cell_contents(col, row, pass(&literalize(&expanded)));
                summary.right += 1;
            } else {
                let message = format!("expected [{}]", literalize(&expanded));
                table.set_cell_contents(
                    col,
                    row,
                    fail_message(&literalize(&actual), &message),
                );
                summary.wrong += 1;
            }
        }
        ExpectationKind::Ensure => {
            if actual == TRUE {
                table.set_cell_contents(col, row, pass(&literalize(&original)));
                summary.right += 1;
            } else {
                table.set_cell_contents(col, row, fail(&literalize(&original)));
                summary.wrong += 1;
            }
        }
        ExpectationKind::Reject => {
            if actual == FALSE {
                table.set_cell_contents(col, row, pass(&literalize(&original)));
                summary.right += 1;
            } else {
                table.set_cell_contents(col, row, fail(&literalize(&original)));
                summary.wrong += 1;
            }
        }
        ExpectationKind::SymbolAssignment(name) => {
            // assignment is not a pass/fail concept
            table.set_cell_contents(
                col,
                row,
                format!("${name}<-[{}]", literalize(&actual)),
            );
        }
        ExpectationKind::Action => {
            if actual == VOID_TAG {
                // void leaves the cell as authored
            } else if actual == TRUE {
                table.set_cell_contents(col, row, pass(&literalize(&original)));
                summary.right += 1;
            } else if actual == FALSE {
                table.set_cell_contents(col, row, fail(&literalize(&original)));
                summary.wrong += 1;
            } else {
                let message = format!("returned unexpected value: [{actual}]");
                table.set_cell_contents(
                    col,
                    row,
                    fail_message(&literalize(&original), &message),
                );
                summary.wrong += 1;
            }
        }
        ExpectationKind::Show => {
            match table.append_cell(row, ignore(&literalize(&actual))) {
                Ok(()) => summary.ignores += 1,
                Err(error) => {
                    table.set_cell_contents(col, row, fail(&error.to_string()));
                    summary.wrong += 1;
                }
            }
        }
        ExpectationKind::Argument => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ScriptTable, TextTable};

    // Compiles the statements, pairs the pseudo results with the ids the
    // compiler generated, and returns the annotated table text.
    fn annotated(statements: &str, pseudo_results: &[(&str, &str)], symbols: &SymbolTable) -> String {
        let text = format!("|Script|\n{statements}");
        let mut table = TextTable::parse(&text).unwrap();
        let compiled = ScriptTable::compile(&table, "id").unwrap();
        let results: HashMap<String, WireValue> = pseudo_results
            .iter()
            .map(|(id, value)| (id.to_string(), WireValue::text(*value)))
            .collect();
        evaluate_expectations(&mut table, &compiled.expectations, &results, symbols);
        table.render()
    }

    fn annotate(statements: &str, pseudo_results: &[(&str, &str)]) -> String {
        annotated(statements, pseudo_results, &SymbolTable::new())
    }

    #[test]
    fn void_action_leaves_the_cell_unchanged() {
        let rendered = annotate("|func|\n", &[("scriptTable_id_0", VOID_TAG)]);
        assert_eq!(rendered, "|Script|\n|func|\n");
    }

    #[test]
    fn true_action_passes() {
        let rendered = annotate("|func|\n", &[("scriptTable_id_0", TRUE)]);
        assert_eq!(rendered, "|Script|\n|!style_pass(!<func>!)|\n");
    }

    #[test]
    fn false_action_fails() {
        let rendered = annotate("|func|\n", &[("scriptTable_id_0", FALSE)]);
        assert_eq!(rendered, "|Script|\n|!style_fail(!<func>!)|\n");
    }

    #[test]
    fn other_action_value_is_its_own_failure() {
        let rendered = annotate("|func|\n", &[("scriptTable_id_0", "7")]);
        assert_eq!(
            rendered,
            "|Script|\n|[!<func>!] !style_fail(returned unexpected value: [7])|\n"
        );
    }

    #[test]
    fn check_passes_on_an_exact_match() {
        let rendered = annotate("|check|func|3|\n", &[("scriptTable_id_0", "3")]);
        assert_eq!(rendered, "|Script|\n|check|func|!style_pass(!<3>!)|\n");
    }

    #[test]
    fn check_fails_showing_actual_and_expected() {
        let rendered = annotate("|check|func|3|\n", &[("scriptTable_id_0", "4")]);
        assert_eq!(
            rendered,
            "|Script|\n|check|func|[!<4>!] !style_fail(expected [!<3>!])|\n"
        );
    }

    #[test]
    fn check_is_case_sensitive() {
        let rendered = annotate("|check|func|ok|\n", &[("scriptTable_id_0", "OK")]);
        assert!(rendered.contains("!style_fail(expected [!<ok>!])"), "{rendered}");
    }

    #[test]
    fn ensure_passes_on_true_and_fails_on_false() {
        let passed = annotate("|ensure|func|3|\n", &[("scriptTable_id_0", TRUE)]);
        assert_eq!(passed, "|Script|\n|!style_pass(!<ensure>!)|func|3|\n");
        let failed = annotate("|ensure|func|3|\n", &[("scriptTable_id_0", FALSE)]);
        assert_eq!(failed, "|Script|\n|!style_fail(!<ensure>!)|func|3|\n");
    }

    #[test]
    fn reject_passes_on_false_and_fails_on_true() {
        let passed = annotate("|reject|func|3|\n", &[("scriptTable_id_0", FALSE)]);
        assert_eq!(passed, "|Script|\n|!style_pass(!<reject>!)|func|3|\n");
        let failed = annotate("|reject|func|3|\n", &[("scriptTable_id_0", TRUE)]);
        assert_eq!(failed, "|Script|\n|!style_fail(!<reject>!)|func|3|\n");
    }

    #[test]
    fn show_appends_an_ignored_cell() {
        let rendered = annotate("|show|func|3|\n", &[("scriptTable_id_0", "kawabunga")]);
        assert_eq!(
            rendered,
            "|Script|\n|show|func|3|!style_ignore(!<kawabunga>!)|\n"
        );
    }

    #[test]
    fn symbol_assignment_and_expansion_are_annotated() {
        let mut symbols = SymbolTable::new();
        symbols.set("V", "3");
        let rendered = annotated(
            "|$V=|function|\n|check|funcion|$V|$V|\n",
            &[("scriptTable_id_0", "3"), ("scriptTable_id_1", "3")],
            &symbols,
        );
        assert_eq!(
            rendered,
            "|Script|\n\
             |$V<-[!<3>!]|function|\n\
             |check|funcion|!<$V->[3]>!|!style_pass(!<$V->[3]>!)|\n"
        );
    }

    #[test]
    fn missing_results_leave_cells_as_authored() {
        let rendered = annotate("|check|func|3|\n", &[]);
        assert_eq!(rendered, "|Script|\n|check|func|3|\n");
    }

    #[test]
    fn exception_markers_render_as_failures() {
        let marker = format!(
            "{}message:<<NO_METHOD_IN_CLASS func[0] Bob.>>",
            crate::EXCEPTION_TAG
        );
        let rendered = annotate("|func|\n", &[("scriptTable_id_0", marker.as_str())]);
        assert_eq!(
            rendered,
            "|Script|\n|[!<func>!] !style_fail(NO_METHOD_IN_CLASS func[0] Bob.)|\n"
        );
    }

    #[test]
    fn summary_counts_outcomes() {
        let text = "|Script|\n|check|func|3|\n|show|func|\n";
        let mut table = TextTable::parse(text).unwrap();
        let compiled = ScriptTable::compile(&table, "id").unwrap();
        let results: HashMap<String, WireValue> = [
            ("scriptTable_id_0".to_string(), WireValue::text("4")),
            ("scriptTable_id_1".to_string(), WireValue::text("x")),
        ]
        .into();
        let summary = evaluate_expectations(
            &mut table,
            &compiled.expectations,
            &results,
            &SymbolTable::new(),
        );
        assert_eq!(summary.wrong, 1);
        assert_eq!(summary.ignores, 1);
        assert!(!summary.all_passed());
    }
}
