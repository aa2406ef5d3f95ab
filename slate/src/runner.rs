use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::{
    exception_to_string, ClassRegistry, ExecError, Instruction, StatementExecutor,
    WireError, WireValue,
};

/// Runs an ordered instruction list against one statement executor.
///
/// Fail-soft: an instruction that fails yields an exception-marker
/// result under its own id and never halts the rest of the list.
pub struct ListRunner {
    executor: StatementExecutor,
}

impl ListRunner {
    pub fn new(classes: Arc<ClassRegistry>) -> Self {
        Self {
            executor: StatementExecutor::new(classes),
        }
    }

    pub fn with_executor(executor: StatementExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &StatementExecutor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut StatementExecutor {
        &mut self.executor
    }

    /// Executes compiled instructions strictly in order.
    pub fn execute(&mut self, instructions: &[Instruction]) -> Vec<(String, WireValue)> {
        debug!("executing {} instructions", instructions.len());
        instructions
            .iter()
            .map(|instruction| (instruction.id.clone(), self.executor.execute(instruction)))
            .collect()
    }

    /// Executes raw wire statements. A structurally malformed statement
    /// aborts the batch; an unknown operation only fails its own id.
    pub fn execute_wire(
        &mut self,
        statements: &[WireValue],
    ) -> Result<Vec<(String, WireValue)>, WireError> {
        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            match Instruction::from_wire(statement) {
                Ok(instruction) => {
                    let result = self.executor.execute(&instruction);
                    results.push((instruction.id, result));
                }
                Err(WireError::UnknownVerb { id, verb }) => {
                    let marker = exception_to_string(&ExecError::InvalidStatement(verb));
                    results.push((id, WireValue::Text(marker)));
                }
                Err(malformed @ WireError::Malformed(_)) => return Err(malformed),
            }
        }
        Ok(results)
    }
}

/// Results keyed by instruction id; order-independent by construction.
pub fn results_to_map(results: &[(String, WireValue)]) -> HashMap<String, WireValue> {
    results
        .iter()
        .map(|(id, value)| (id.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::test_registry;
    use crate::{EXCEPTION_TAG, OK};

    fn wire(items: &[&str]) -> WireValue {
        WireValue::List(items.iter().map(|s| WireValue::text(*s)).collect())
    }

    fn runner() -> ListRunner {
        ListRunner::new(Arc::new(test_registry()))
    }

    fn preamble() -> Vec<WireValue> {
        vec![
            wire(&["i1", "import", "slate.test"]),
            wire(&["m1", "make", "echoer", "EchoFixture"]),
        ]
    }

    #[test]
    fn empty_list_returns_empty_results() {
        let results = runner().execute_wire(&[]).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn import_and_make_acknowledge() {
        let results = runner().execute_wire(&preamble()).unwrap();
        let map = results_to_map(&results);
        assert_eq!(map["i1"], WireValue::text(OK));
        assert_eq!(map["m1"], WireValue::text(OK));
    }

    #[test]
    fn multiple_calls_each_get_their_own_result() {
        let mut statements = preamble();
        statements.push(wire(&["id1", "call", "echoer", "addTo", "1", "2"]));
        statements.push(wire(&["id2", "call", "echoer", "addTo", "3", "4"]));
        let map = results_to_map(&runner().execute_wire(&statements).unwrap());
        assert_eq!(map["id1"], WireValue::text("3"));
        assert_eq!(map["id2"], WireValue::text("7"));
    }

    #[test]
    fn call_and_assign_feeds_later_statements() {
        let mut statements = preamble();
        statements.push(wire(&["id1", "callAndAssign", "v", "echoer", "addTo", "5", "6"]));
        statements.push(wire(&["id2", "call", "echoer", "echoInt", "$v"]));
        let map = results_to_map(&runner().execute_wire(&statements).unwrap());
        assert_eq!(map["id1"], WireValue::text("11"));
        assert_eq!(map["id2"], WireValue::text("11"));
    }

    #[test]
    fn unknown_operation_fails_only_its_own_id() {
        let mut statements = preamble();
        statements.push(wire(&["inv1", "invalidOperation"]));
        statements.push(wire(&["id", "call", "echoer", "returnString"]));
        let map = results_to_map(&runner().execute_wire(&statements).unwrap());
        assert!(map["inv1"].as_text().unwrap().starts_with(EXCEPTION_TAG));
        assert_eq!(map["id"], WireValue::text("string"));
    }

    #[test]
    fn malformed_statement_aborts_the_batch() {
        let statements = vec![wire(&["id", "call", "notEnoughArguments"])];
        assert!(matches!(
            runner().execute_wire(&statements),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn a_failing_instruction_does_not_halt_the_list() {
        let mut statements = preamble();
        statements.push(wire(&["bad", "call", "noSuchInstance", "method"]));
        statements.push(wire(&["good", "call", "echoer", "returnString"]));
        let map = results_to_map(&runner().execute_wire(&statements).unwrap());
        assert!(map["bad"].is_exception());
        assert_eq!(map["good"], WireValue::text("string"));
    }
}
