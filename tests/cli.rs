#![cfg(feature = "cli")]

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_analogies28"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run CLI")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn json_of(output: &Output) -> serde_json::Value {
    serde_json::from_str(&stdout_of(output)).expect("valid JSON on stdout")
}

#[test]
fn annotate_bolds_terms_and_lists_definitions() {
    let stdout = stdout_of(&run(&["annotate", "Fund mutual aid now"]));
    assert!(stdout.contains("Fund **mutual aid** now"), "{stdout}");
    assert!(stdout.contains("- Mutual Aid: Community-based support systems"), "{stdout}");
}

#[test]
fn annotate_leaves_markdown_characters_alone() {
    let stdout = stdout_of(&run(&["annotate", "use snake_case and a*b with mutual aid"]));
    assert!(
        stdout.contains("\nuse snake_case and a*b with **mutual aid**\n"),
        "{stdout}"
    );
    assert!(!stdout.contains('\\'), "{stdout}");
}

#[test]
fn annotate_without_terms_says_so() {
    let stdout = stdout_of(&run(&["annotate", "Nothing to see here"]));
    assert!(stdout.contains("No glossary terms found."), "{stdout}");
}

#[test]
fn annotate_reads_stdin_when_no_text_given() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_analogies28"))
        .args(["--json", "annotate"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn CLI");
    child
        .stdin
        .as_mut()
        .expect("stdin open")
        .write_all(b"We back worker cooperatives.")
        .expect("write stdin");
    let output = child.wait_with_output().expect("read CLI output");

    let value = json_of(&output);
    assert_eq!(value["strategy"], "longest_at_position");
    let segments = value["segments"].as_array().expect("segments array");
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1]["kind"], "term");
    assert_eq!(segments[1]["text"], "worker cooperatives");
    assert_eq!(segments[1]["entry"]["term"], "Worker Cooperatives");
    assert_eq!(value["terms"][0]["term"], "Worker Cooperatives");
}

#[test]
fn annotate_accepts_a_custom_glossary() {
    let path = std::path::Path::new(env!("CARGO_TARGET_TMPDIR")).join("cli-glossary.json");
    std::fs::write(
        &path,
        r#"[{"term": "Commons", "definition": "Shared resources."}]"#,
    )
    .expect("write glossary");

    let output = run(&[
        "--json",
        "annotate",
        "--glossary",
        path.to_str().expect("utf-8 path"),
        "Protect the commons and mutual aid.",
    ]);
    let value = json_of(&output);
    let terms: Vec<_> = value["terms"]
        .as_array()
        .expect("terms array")
        .iter()
        .map(|entry| entry["term"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(terms, vec!["Commons"]);
}

#[test]
fn glossary_show_is_case_insensitive() {
    let stdout = stdout_of(&run(&["glossary", "show", "MUTUAL AID"]));
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("Mutual Aid"));
    assert!(lines.next().unwrap_or_default().starts_with("Community-based"));
}

#[test]
fn glossary_list_json_has_every_term() {
    let value = json_of(&run(&["--json", "glossary", "list"]));
    assert_eq!(value.as_array().map(Vec::len), Some(9));
}

#[test]
fn section_list_keeps_document_order() {
    let value = json_of(&run(&["--json", "section", "list"]));
    let ids: Vec<_> = value
        .as_array()
        .expect("section array")
        .iter()
        .map(|row| row["id"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        ids,
        vec!["introduction", "equity", "environment", "education", "democracy", "community"]
    );
}

#[test]
fn unknown_section_fails() {
    let output = run(&["section", "show", "nowhere"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nowhere"), "{stderr}");
}

#[test]
fn track_replays_offsets() {
    let value = json_of(&run(&[
        "--json",
        "track",
        "--anchors",
        "0,800,1600",
        "0",
        "750",
        "1400",
    ]));
    let active: Vec<_> = value
        .as_array()
        .expect("row array")
        .iter()
        .map(|row| row["active"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(active, vec!["introduction", "equity", "environment"]);
    assert_eq!(value[1]["probe"].as_f64(), Some(1050.0));
}

#[test]
fn track_keeps_section_indices_with_missing_anchors() {
    let value = json_of(&run(&["--json", "track", "--anchors", "0,,1600", "750", "1400"]));
    assert_eq!(value[0]["active"], "introduction");
    assert_eq!(value[1]["active"], "environment");
}

#[test]
fn track_rejects_bad_anchors() {
    let output = run(&["track", "--anchors", "0,abc", "10"]);
    assert!(!output.status.success());
}
