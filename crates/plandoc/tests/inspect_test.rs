
use plandoc_core::schema::PlanOpTable;
use plandoc_core::{PlanBuilder, SqlPlanArgs, create_sql_plan};

use crate::setup::{DEFAULT_TIMEOUT, make_cli, plan_file, scenario_file};

#[test]
fn test_inspect_text() {
    let file = scenario_file();
    let output = make_cli()
        .timeout(DEFAULT_TIMEOUT)
        .arg("inspect")
        .arg(file.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("Failed to read stdout");
    assert!(stdout.contains("version: v2\n"), "{stdout}");
    assert!(stdout.contains("ops: 2\n"), "{stdout}");
    assert!(stdout.contains("exec_params: 1\n"), "{stdout}");
    assert!(stdout.contains("  timeout = 30\n"), "{stdout}");
}

#[test]
fn test_inspect_json() {
    let file = scenario_file();
    let output = make_cli()
        .timeout(DEFAULT_TIMEOUT)
        .arg("inspect")
        .arg("--verify")
        .arg("--format")
        .arg("json")
        .arg(file.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Failed to parse output");
    assert_eq!("v2", summary["rel_plan_version"]);
    assert_eq!(0, summary["op_list"][0]["index"]);
    assert_eq!("30", summary["exec_params"]["timeout"]);
}

#[test]
fn test_inspect_empty_vs_absent() {
    let mut builder = PlanBuilder::new();
    let ops = builder
        .create_vector_of_offsets::<PlanOpTable>(&[])
        .unwrap();
    let root = create_sql_plan(
        &mut builder,
        &SqlPlanArgs {
            op_list: Some(ops),
            ..Default::default()
        },
    )
    .unwrap();
    builder.finish(root).unwrap();
    let file = plan_file(builder.finished_data().unwrap());

    let output = make_cli()
        .timeout(DEFAULT_TIMEOUT)
        .arg("inspect")
        .arg(file.path())
        .output()
        .expect("Failed to run command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("Failed to read stdout");
    assert!(stdout.contains("version: <absent>\n"), "{stdout}");
    assert!(stdout.contains("ops: 0\n"), "{stdout}");
    assert!(stdout.contains("exec_params: <absent>\n"), "{stdout}");
}

#[test]
fn test_inspect_missing_file() {
    make_cli()
        .timeout(DEFAULT_TIMEOUT)
        .arg("inspect")
        .arg("does-not-exist.plan")
        .assert()
        .code(1);
}
