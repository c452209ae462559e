//! Behaviour-driven step definitions driving the CLI end to end.

use super::helpers::Workspace;
use super::*;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;
use std::cell::RefCell;

/// Scenario state: a scratch workspace plus the output of the last command.
struct CliWorld {
    workspace: Workspace,
    document: RefCell<Option<Utf8PathBuf>>,
    output: RefCell<Option<Result<Value, CliError>>>,
}

impl CliWorld {
    fn new() -> Self {
        Self {
            workspace: Workspace::new(),
            document: RefCell::new(None),
            output: RefCell::new(None),
        }
    }

    fn database_arg(&self) -> String {
        self.workspace.database().into_string()
    }

    fn invoke(&self, args: &[&str]) {
        let mut invocation = vec!["homescore"];
        invocation.extend_from_slice(args);
        let mut buffer = Vec::new();
        let outcome = run_with(invocation, &mut buffer).map(|()| {
            serde_json::from_slice(&buffer)
                .unwrap_or_else(|err| panic!("command printed invalid JSON: {err}"))
        });
        self.output.replace(Some(outcome));
    }

    fn invoke_ok(&self, args: &[&str]) -> Value {
        self.invoke(args);
        self.last_value()
    }

    fn last_value(&self) -> Value {
        let borrowed = self.output.borrow();
        match borrowed.as_ref() {
            Some(Ok(value)) => value.clone(),
            Some(Err(err)) => panic!("command failed: {err}"),
            None => panic!("no command has run"),
        }
    }
}

#[fixture]
fn world() -> CliWorld {
    CliWorld::new()
}

#[given("an import document with three listings around one park")]
fn import_document(#[from(world)] world: &CliWorld) {
    let path = world.workspace.write_seoul_document();
    world.document.replace(Some(path));
}

#[when("I import the document")]
fn import(#[from(world)] world: &CliWorld) {
    let document = world
        .document
        .borrow()
        .clone()
        .unwrap_or_else(|| panic!("document must be written first"));
    let database = world.database_arg();
    let imported = world.invoke_ok(&["import", document.as_str(), "--database", &database]);
    assert_eq!(imported["listings"], 3);
    assert_eq!(imported["amenities"], 1);
    assert_eq!(imported["score_types"], 1);
}

#[when("I run the full pipeline")]
fn run_full_pipeline(#[from(world)] world: &CliWorld) {
    let database = world.database_arg();
    world.invoke(&["run", "--database", &database, "--batch-size", "2"]);
}

#[when("I archive the live scores")]
fn archive(#[from(world)] world: &CliWorld) {
    let database = world.database_arg();
    world.invoke(&["archive", "--database", &database]);
}

#[when("I ask for the summary of listing 1")]
fn summary_without_database(#[from(world)] world: &CliWorld) {
    let database = world.database_arg();
    world.invoke(&["summary", "1", "--database", &database]);
}

#[then("the run report shows both stages completed")]
fn both_stages_completed(#[from(world)] world: &CliWorld) {
    let report = world.last_value();
    assert_eq!(report["raw"]["state"], "completed");
    assert_eq!(report["raw"]["listings_seen"], 3);
    assert_eq!(report["raw"]["scores_written"], 6);
    assert_eq!(report["normalization"]["state"], "completed");
    assert_eq!(report["normalization"]["score_types"][0]["status"], "normalized");
    assert_eq!(report["normalization"]["score_types"][0]["updated"], 3);
}

#[then("the summary of listing 1 totals 10.0")]
fn summary_totals_ten(#[from(world)] world: &CliWorld) {
    let database = world.database_arg();
    let summary = world.invoke_ok(&["summary", "1", "--database", &database]);
    assert_eq!(summary["listing_id"], 1);
    assert_eq!(summary["total"], 10.0);
    assert_eq!(summary["top_factors"][0]["score_type_id"], 1);
}

#[then("the archive report counts 6 rows")]
fn archive_counts(#[from(world)] world: &CliWorld) {
    assert_eq!(world.last_value()["archived"], 6);
}

#[then("the CLI reports that the database is missing")]
fn reports_missing_database(#[from(world)] world: &CliWorld) {
    let borrowed = world.output.borrow();
    match borrowed.as_ref() {
        Some(Err(CliError::MissingSourceFile { field, .. })) => assert_eq!(*field, ARG_DATABASE),
        other => panic!("expected MissingSourceFile, found {other:?}"),
    }
}

macro_rules! register_cli_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/cli.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: CliWorld) {
            let _ = world;
        }
    };
}

register_cli_scenario!(import_score_summarize, "importing, scoring and summarizing a listing");
register_cli_scenario!(archive_after_run, "archiving the live scores after a run");
register_cli_scenario!(summary_without_db, "summarizing without a database");
