use std::sync::Arc;
use std::thread;

use log::{debug, info};
use parking_lot::Mutex;

use crate::{
    evaluate_expectations, results_to_map, ClassRegistry, ListRunner, ScriptTable,
    TestSummary, TextTable,
};

/// One table to run: a name for reporting plus its pipe-text form.
#[derive(Debug, Clone)]
pub struct TableSource {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct TableRun {
    pub rendered: String,
    pub summary: TestSummary,
}

#[derive(Debug, Clone)]
pub struct TableOutcome {
    pub name: String,
    /// Err carries a compile-time (structural) error description.
    pub result: Result<TableRun, String>,
}

/// Runs independent tables in parallel sessions.
///
/// Each table gets its own thread with its own statement executor,
/// symbol table and instance registry; only the class registry is
/// shared, read-only. No state crosses sessions.
pub struct SuiteRunner {
    classes: Arc<ClassRegistry>,
    paths: Vec<String>,
}

impl SuiteRunner {
    pub fn new(classes: Arc<ClassRegistry>) -> Self {
        Self {
            classes,
            paths: Vec::new(),
        }
    }

    /// Pre-registers a search path in every session this suite starts.
    pub fn add_path(&mut self, path: impl Into<String>) {
        self.paths.push(path.into());
    }

    pub fn run(&self, sources: &[TableSource]) -> Vec<TableOutcome> {
        info!("running {} tables", sources.len());
        let outcomes = Mutex::new(Vec::with_capacity(sources.len()));
        thread::scope(|scope| {
            for (index, source) in sources.iter().enumerate() {
                let outcomes = &outcomes;
                scope.spawn(move || {
                    let outcome = self.run_one(source);
                    outcomes.lock().push((index, outcome));
                });
            }
        });
        let mut collected = outcomes.into_inner();
        collected.sort_by_key(|(index, _)| *index);
        collected.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn run_one(&self, source: &TableSource) -> TableOutcome {
        debug!("session start for table {}", source.name);
        let result = self.run_table(source);
        TableOutcome {
            name: source.name.clone(),
            result,
        }
    }

    fn run_table(&self, source: &TableSource) -> Result<TableRun, String> {
        let mut table = TextTable::parse(&source.text).map_err(|e| e.to_string())?;
        let compiled = ScriptTable::compile(&table, &source.name).map_err(|e| e.to_string())?;
        let mut runner = ListRunner::new(Arc::clone(&self.classes));
        for path in &self.paths {
            runner.executor_mut().add_path(path);
        }
        let results = runner.execute(&compiled.instructions);
        let results = results_to_map(&results);
        let summary = evaluate_expectations(
            &mut table,
            &compiled.expectations,
            &results,
            runner.executor().symbols(),
        );
        Ok(TableRun {
            rendered: table.render(),
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::test_registry;

    fn source(name: &str, text: &str) -> TableSource {
        TableSource {
            name: name.into(),
            text: text.into(),
        }
    }

    fn suite() -> SuiteRunner {
        let mut suite = SuiteRunner::new(Arc::new(test_registry()));
        suite.add_path("slate.test");
        suite
    }

    #[test]
    fn runs_a_table_end_to_end() {
        let outcomes = suite().run(&[source(
            "t1",
            "|Script|\n|start|echo fixture|\n|check|add|1|to|2|3|\n",
        )]);
        let run = outcomes[0].result.as_ref().unwrap();
        assert_eq!(run.summary.right, 1);
        assert_eq!(run.summary.wrong, 0);
        assert!(run.rendered.contains("!style_pass(!<3>!)"), "{}", run.rendered);
    }

    #[test]
    fn sessions_do_not_share_symbols_or_instances() {
        let tables = [
            source(
                "a",
                "|Script|\n|start|echo fixture|\n|$V=|echo int|1|\n|check|echo int|$V|1|\n",
            ),
            // no `start` here: the actor made by table "a" must not leak in
            source("b", "|Script|\n|check|echo int|2|2|\n"),
        ];
        let outcomes = suite().run(&tables);
        let a = outcomes[0].result.as_ref().unwrap();
        assert!(a.summary.all_passed(), "{}", a.rendered);
        let b = outcomes[1].result.as_ref().unwrap();
        assert_eq!(b.summary.exceptions, 1, "{}", b.rendered);
        assert!(b.rendered.contains("NO_INSTANCE"), "{}", b.rendered);
    }

    #[test]
    fn outcomes_come_back_in_submission_order() {
        let tables: Vec<TableSource> = (0..8)
            .map(|i| source(&format!("t{i}"), "|Script|\n|start|echo fixture|\n"))
            .collect();
        let outcomes = suite().run(&tables);
        let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"]);
    }

    #[test]
    fn structural_errors_are_reported_per_table() {
        let outcomes = suite().run(&[
            source("bad", "|Script|\n"),
            source("good", "|Script|\n|start|echo fixture|\n"),
        ]);
        assert!(outcomes[0].result.is_err());
        assert!(outcomes[1].result.is_ok());
    }
}
