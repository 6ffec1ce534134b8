//! Integration test harness
//!
//! End-to-end runs of the binary against the mock backend: simulate, then
//! aggregate, then check the artifacts and the report against each other.

mod common;

use std::collections::BTreeSet;
use std::fs;

use predicates::prelude::*;
use serde_json::Value;

use common::{normalize, PilotEnv};

const DROPOUT_P003: &str = "dropouts = [{ persona = \"P003\", stage = 4 }]";

fn stage_numbers(artifact: &Value) -> Vec<u64> {
    artifact["stageResults"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["stageNumber"].as_u64().unwrap())
        .collect()
}

fn composite(stage: &Value) -> f64 {
    let score = |k: &str| stage[k].as_f64().unwrap();
    (score("easeOfUse") + score("clarity") + score("value")) / 3.0
}

/// Strip the one wall-clock field
fn without_timestamp(mut report: Value) -> Value {
    report.as_object_mut().unwrap().remove("generatedAt");
    report
}

// ─────────────────────────────────────────────────────────────────
// Simulation Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_group_run_with_dropout() {
    let env = PilotEnv::with_mock_settings(DROPOUT_P003);
    env.run(&["--count", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed:     4"))
        .stdout(predicate::str::contains("Dropped out:   1"));

    for id in ["P001", "P002", "P004", "P005"] {
        let artifact = env.read_json(format!("group1/{}_result.json", id));
        assert_eq!(stage_numbers(&artifact), (1..=11).collect::<Vec<_>>());
        assert_eq!(artifact["outcome"]["status"], "completed");
    }

    let dropped = env.read_json("group1/P003_result.json");
    assert_eq!(stage_numbers(&dropped), vec![1, 2, 3, 4]);
    assert_eq!(dropped["dropout"], true);
    assert_eq!(dropped["dropoutStage"], 4);
    assert_eq!(dropped["outcome"]["status"], "droppedOut");

    let summary = env.read_json("group1/group_summary.json");
    assert_eq!(summary["personaCount"], 5);
    assert_eq!(summary["completed"], 4);
    assert_eq!(summary["droppedOut"], 1);
    assert_eq!(summary["dropoutStages"]["4"], 1);
    assert_eq!(summary["artifacts"].as_array().unwrap().len(), 5);
    assert!(summary["topSuggestions"].as_array().unwrap().len() <= 5);
}

#[test]
fn test_groups_partitioned_in_order() {
    let env = PilotEnv::new();
    env.run(&["--count", "5", "--group-size", "2"]).assert().success();

    assert!(env.artifact_path("group1", "P001").is_file());
    assert!(env.artifact_path("group1", "P002").is_file());
    assert!(env.artifact_path("group2", "P003").is_file());
    assert!(env.artifact_path("group3", "P005").is_file());
    assert!(!env.output_dir.join("group4").exists());
    assert_eq!(env.read_json("group3/group_summary.json")["groupName"], "Group 3");
}

#[test]
fn test_selected_personas_only() {
    let env = PilotEnv::new();
    env.run(&["--persona", "P010", "--persona", "P002"]).assert().success();

    assert!(env.artifact_path("group1", "P010").is_file());
    assert!(env.artifact_path("group1", "P002").is_file());
    assert!(!env.artifact_path("group1", "P001").exists());
}

#[test]
fn test_rejected_persona_is_errored() {
    let env = PilotEnv::with_mock_settings("reject_personas = [\"P002\"]");
    env.run(&["--count", "3"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Errored:       1"));

    let errored = env.read_json("group1/P002_result.json");
    assert_eq!(errored["outcome"]["status"], "errored");
    assert!(errored["error"]["message"].as_str().unwrap().contains("rejected"));
    assert_eq!(env.read_json("group1/P001_result.json")["outcome"]["status"], "completed");
}

#[test]
fn test_malformed_replies_degrade() {
    let env = PilotEnv::with_mock_settings("malformed_percent = 100");
    env.run(&["--count", "1"]).assert().success();

    let artifact = env.read_json("group1/P001_result.json");
    let stages = artifact["stageResults"].as_array().unwrap();
    assert_eq!(stages.len(), 11);
    for stage in stages {
        assert_eq!(stage["degraded"], true);
        assert_eq!(stage["easeOfUse"], 7);
        assert_eq!(stage["emotionalState"], "neutral");
    }
    assert_eq!(artifact["degradedStages"], 11);
}

// ─────────────────────────────────────────────────────────────────
// Aggregation Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_aggregate_excludes_dropout_from_later_stages() {
    let env = PilotEnv::with_mock_settings(DROPOUT_P003);
    env.run(&["--count", "5"]).assert().success();
    env.aggregate(&[]).assert().success();

    let report = env.read_json("final_report.json");
    assert!(env.output_dir.join("final_report.md").is_file());
    assert_eq!(report["totals"]["personas"], 5);
    assert_eq!(report["totals"]["droppedOut"], 1);

    let stages = report["stages"].as_array().unwrap();
    assert_eq!(stages.len(), 11);
    assert_eq!(stages[3]["participants"], 5);
    assert_eq!(stages[3]["dropouts"], 1);
    for stage in &stages[4..] {
        assert_eq!(stage["participants"], 4);
        for entry in stage["painPoints"].as_array().unwrap() {
            assert!(entry["personas"].as_array().unwrap().iter().all(|p| p["id"] != "P003"));
        }
    }
}

#[test]
fn test_report_matches_artifacts() {
    let env = PilotEnv::new();
    env.run(&["--count", "10", "--group-size", "4"]).assert().success();
    env.aggregate(&[]).assert().success();

    let mut artifacts = Vec::new();
    for group in ["group1", "group2", "group3"] {
        for entry in fs::read_dir(env.output_dir.join(group)).unwrap() {
            let path = entry.unwrap().path();
            if path.to_string_lossy().ends_with("_result.json") {
                artifacts.push(serde_json::from_str::<Value>(&fs::read_to_string(path).unwrap()).unwrap());
            }
        }
    }
    assert_eq!(artifacts.len(), 10);

    let report = env.read_json("final_report.json");
    for stage in report["stages"].as_array().unwrap() {
        let number = stage["stageNumber"].as_u64().unwrap();
        let results: Vec<&Value> = artifacts
            .iter()
            .filter_map(|a| {
                a["stageResults"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .find(|s| s["stageNumber"].as_u64() == Some(number))
            })
            .collect();

        // Composite satisfaction is the mean of the per-persona composites
        let expected = results.iter().map(|s| composite(s)).sum::<f64>() / results.len() as f64;
        let actual = stage["compositeSatisfaction"].as_f64().unwrap();
        assert!((expected - actual).abs() < 1e-6, "stage {}: {} vs {}", number, expected, actual);

        // Each pain point counts the stage results that mention it at least once
        for entry in stage["painPoints"].as_array().unwrap() {
            let key = entry["key"].as_str().unwrap();
            let mentioning = results
                .iter()
                .filter(|s| {
                    s["painPoints"]
                        .as_array()
                        .unwrap()
                        .iter()
                        .any(|p| normalize(p.as_str().unwrap()) == key)
                })
                .count();
            assert_eq!(entry["count"].as_u64().unwrap() as usize, mentioning, "stage {} '{}'", number, key);
        }
    }
}

#[test]
fn test_reports_are_reproducible() {
    let env = PilotEnv::with_mock_settings(DROPOUT_P003);
    env.run(&["--count", "7"]).assert().success();

    env.aggregate(&[]).assert().success();
    let first = env.read_json("final_report.json");
    env.aggregate(&[]).assert().success();
    let second = env.read_json("final_report.json");

    assert_eq!(first["inputFingerprint"], second["inputFingerprint"]);
    assert_eq!(
        serde_json::to_string(&without_timestamp(first)).unwrap(),
        serde_json::to_string(&without_timestamp(second)).unwrap()
    );
}

#[test]
fn test_missing_artifact_is_skipped() {
    let env = PilotEnv::new();
    env.run(&["--count", "5"]).assert().success();
    fs::remove_file(env.artifact_path("group1", "P004")).unwrap();

    env.aggregate(&[])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 skipped artifacts"));

    let report = env.read_json("final_report.json");
    let skipped = report["skippedArtifacts"].as_array().unwrap();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0]["path"], "group1/P004_result.json");
    assert_eq!(report["totals"]["personas"], 4);
}

#[test]
fn test_rerun_into_same_directory_counts_latest_run_only() {
    let env = PilotEnv::new();
    env.run(&["--count", "10", "--group-size", "5"]).assert().success();
    env.run(&["--count", "6", "--group-size", "3"]).assert().success();
    env.aggregate(&[]).assert().success();

    let report = env.read_json("final_report.json");
    assert_eq!(report["totals"]["personas"], 6);
    assert_eq!(report["stages"][0]["participants"], 6);

    // group1 keeps P004/P005 and group2 keeps P007..P010 from the first run
    let skipped: BTreeSet<&str> = report["skippedArtifacts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["path"].as_str().unwrap())
        .collect();
    let expected: BTreeSet<&str> = [
        "group1/P004_result.json",
        "group1/P005_result.json",
        "group2/P007_result.json",
        "group2/P008_result.json",
        "group2/P009_result.json",
        "group2/P010_result.json",
    ]
    .into_iter()
    .collect();
    assert_eq!(skipped, expected);
}

#[test]
fn test_problematic_stages_ranked() {
    let env = PilotEnv::new();
    env.run(&["--count", "6"]).assert().success();
    env.aggregate(&["--no-markdown"]).assert().success();
    assert!(!env.output_dir.join("final_report.md").exists());

    let report = env.read_json("final_report.json");
    let ranked = report["problematicStages"].as_array().unwrap();
    assert_eq!(ranked.len(), 3);
    let keys: Vec<(f64, u64)> = ranked
        .iter()
        .map(|p| (p["compositeSatisfaction"].as_f64().unwrap(), p["stageNumber"].as_u64().unwrap()))
        .collect();
    for pair in keys.windows(2) {
        assert!(pair[0].0 < pair[1].0 || (pair[0].0 == pair[1].0 && pair[0].1 < pair[1].1));
    }

    let maturities: BTreeSet<&str> = report["maturityCrossTab"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["maturity"].as_str().unwrap())
        .collect();
    assert_eq!(maturities.len(), 4);
}

#[test]
fn test_run_with_report_flag() {
    let env = PilotEnv::new();
    env.run(&["--count", "2", "--report"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Final report (2 personas"));
    assert!(env.output_dir.join("final_report.json").is_file());
}

#[test]
fn test_aggregate_without_artifacts_fails() {
    let env = PilotEnv::new();
    fs::create_dir_all(&env.output_dir).unwrap();
    env.aggregate(&[])
        .assert()
        .code(60)
        .stderr(predicate::str::contains("No result artifacts"));
}
