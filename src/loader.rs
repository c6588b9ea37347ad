//! Concurrent loading of both tables and the completed list.

use std::collections::HashSet;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::data::{Item, Row};
use crate::errors::AnnotateError;
use crate::join::{JoinReport, Joiner};
use crate::oracle::CompletionOracle;
use crate::source::TableSource;
use crate::types::ItemId;

/// Parsed rows of both tables.
#[derive(Clone, Debug, Default)]
pub struct LoadedTables {
    /// Rows of the evaluations table.
    pub evaluations: Vec<Row>,
    /// Rows of the questions table.
    pub questions: Vec<Row>,
}

/// Joined working set plus the completed list observed at load time.
#[derive(Clone, Debug, Default)]
pub struct WorkingSet {
    /// Items eligible for annotation by someone.
    pub items: Vec<Item>,
    /// How the join treated each evaluation row.
    pub report: JoinReport,
    /// Globally completed ids fetched alongside the tables.
    pub completed: HashSet<ItemId>,
}

/// Load both tables concurrently.
///
/// Fails when either load fails; the error names every table that failed.
pub fn load_tables(
    evaluations: &dyn TableSource,
    questions: &dyn TableSource,
) -> Result<LoadedTables, AnnotateError> {
    let (evaluations_result, questions_result) =
        thread::scope(|scope| {
            let eval_handle = scope.spawn(|| timed_load(evaluations));
            let question_handle = scope.spawn(|| timed_load(questions));
            (
                join_load(evaluations.id(), eval_handle.join()),
                join_load(questions.id(), question_handle.join()),
            )
        });
    combine(evaluations_result, questions_result)
}

/// Load tables and the completed list concurrently, then join.
///
/// The oracle runs in the same fan-out as the table loads; its failures never
/// fail the load.
pub fn load_working_set(
    evaluations: &dyn TableSource,
    questions: &dyn TableSource,
    oracle: &dyn CompletionOracle,
    joiner: &Joiner,
) -> Result<WorkingSet, AnnotateError> {
    let started = Instant::now();
    let (tables, completed) = thread::scope(|scope| {
        let completed_handle = scope.spawn(|| oracle.fetch_completed());
        let tables = load_tables(evaluations, questions);
        let completed = completed_handle.join().unwrap_or_else(|_| {
            warn!("[annotator:loader] completion oracle thread panicked");
            HashSet::new()
        });
        (tables, completed)
    });
    let tables = tables?;
    let outcome = joiner.join(&tables.evaluations, &tables.questions);
    info!(
        valid = outcome.items.len(),
        skipped = outcome.report.total_skipped(),
        completed = completed.len(),
        elapsed_ms = started.elapsed().as_millis(),
        "[annotator:loader] load complete"
    );
    Ok(WorkingSet {
        items: outcome.items,
        report: outcome.report,
        completed,
    })
}

fn timed_load(source: &dyn TableSource) -> Result<Vec<Row>, AnnotateError> {
    let started = Instant::now();
    let result = source.load_table();
    debug!(
        table = %source.id(),
        ok = result.is_ok(),
        load_ms = started.elapsed().as_millis(),
        "[annotator:loader] table load finished"
    );
    result
}

fn join_load(
    table: &str,
    joined: thread::Result<Result<Vec<Row>, AnnotateError>>,
) -> Result<Vec<Row>, AnnotateError> {
    joined.unwrap_or_else(|_| {
        Err(AnnotateError::Load {
            table: table.to_string(),
            reason: "table load thread panicked".into(),
        })
    })
}

fn combine(
    evaluations: Result<Vec<Row>, AnnotateError>,
    questions: Result<Vec<Row>, AnnotateError>,
) -> Result<LoadedTables, AnnotateError> {
    match (evaluations, questions) {
        (Ok(evaluations), Ok(questions)) => Ok(LoadedTables {
            evaluations,
            questions,
        }),
        (Err(err), Ok(_)) | (Ok(_), Err(err)) => Err(err),
        (Err(first), Err(second)) => {
            let (first_table, first_reason) = load_parts(first);
            let (second_table, second_reason) = load_parts(second);
            Err(AnnotateError::Load {
                table: format!("{first_table}, {second_table}"),
                reason: format!("{first_reason}; {second_reason}"),
            })
        }
    }
}

fn load_parts(err: AnnotateError) -> (String, String) {
    match err {
        AnnotateError::Load { table, reason } => (table, reason),
        other => ("unknown".to_string(), other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::StaticCompletionOracle;
    use crate::source::{FailingTable, InMemoryTable};

    fn tables() -> (InMemoryTable, InMemoryTable) {
        let evaluations = InMemoryTable::from_text(
            "evaluations",
            "question_id,evaluation_id,response_A,response_B,domain,language\n\
             q1,q1_minimum_1,a,b,Technical,\n\
             q2,q2_detailed_1,a,b,Creative,pt-BR\n\
             q9,q9_minimum_1,a,b,Creative,en\n",
        )
        .unwrap();
        let questions = InMemoryTable::from_text(
            "questions",
            "question_id,prompt_minimum_en,prompt_detailed_pt\nq1,Hello?,\nq2,,Olá?\n",
        )
        .unwrap();
        (evaluations, questions)
    }

    #[test]
    fn working_set_joins_tables_and_carries_completed() {
        let (evaluations, questions) = tables();
        let oracle = StaticCompletionOracle::new(["q1_minimum_1"]);
        let set =
            load_working_set(&evaluations, &questions, &oracle, &Joiner::default()).unwrap();
        assert_eq!(set.items.len(), 2);
        assert_eq!(set.report.total_rows, 3);
        assert!(set.completed.contains("q1_minimum_1"));
    }

    #[test]
    fn one_failing_table_names_that_table() {
        let (evaluations, _) = tables();
        let questions = FailingTable::new("questions", "404");
        let err = load_tables(&evaluations, &questions).unwrap_err();
        assert!(matches!(err, AnnotateError::Load { ref table, .. } if table == "questions"));
    }

    #[test]
    fn both_failing_tables_are_reported() {
        let evaluations = FailingTable::new("evaluations", "timeout");
        let questions = FailingTable::new("questions", "404");
        let err = load_tables(&evaluations, &questions).unwrap_err();
        match err {
            AnnotateError::Load { table, reason } => {
                assert_eq!(table, "evaluations, questions");
                assert!(reason.contains("timeout"));
                assert!(reason.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
