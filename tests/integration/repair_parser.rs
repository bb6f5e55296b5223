//! Structured-output recovery on the kinds of text models actually return.

use serde::Deserialize;
use tether::repair::parse_structured_output;
use tether::{OutputRepairParser, ParseError, RecoveryStrategy};

#[derive(Debug, Deserialize, PartialEq)]
struct Slide {
    title: String,
    #[serde(rename = "imagePrompt")]
    image_prompt: Option<String>,
}

#[test]
fn fenced_array_with_trailing_comma() {
    let text = "Here you go:\n```json\n[\n  {\"title\": \"Intro\"},\n  {\"title\": \"Outro\"},\n]\n```\n";
    let report = OutputRepairParser::default().parse_with_report(text);
    assert_eq!(report.winner(), Some(RecoveryStrategy::Sanitized));
    let records = report.into_result().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1]["title"], "Outro");
}

#[test]
fn raw_newlines_inside_strings() {
    let text = "[{\"title\": \"Line one\nLine two\", \"imagePrompt\": \"a cat\"}]";
    let slides: Vec<Slide> = OutputRepairParser::default().parse_as(text).unwrap();
    assert_eq!(
        slides,
        vec![Slide {
            title: "Line one\nLine two".to_string(),
            image_prompt: Some("a cat".to_string()),
        }]
    );
}

#[test]
fn truncated_response_keeps_complete_objects() {
    let text = r#"```json
[
  {"title": "One", "imagePrompt": "sunrise"},
  {"title": "Two", "imagePrompt": "noon"},
  {"title": "Thr"#;
    let report = OutputRepairParser::default().parse_with_report(text);
    assert_eq!(report.winner(), Some(RecoveryStrategy::SalvageObjects));
    let records = report.into_result().unwrap();
    let titles: Vec<_> = records.iter().map(|r| r["title"].clone()).collect();
    assert_eq!(titles, vec!["One", "Two"]);
}

#[test]
fn records_inside_truncated_wrapper_object() {
    let text = r#"{"scenes": [{"title":"A","imagePrompt":"p"}, {"title":"B","imagePrompt":"tru"#;
    let report = OutputRepairParser::default().parse_with_report(text);
    assert_eq!(report.winner(), Some(RecoveryStrategy::SalvageObjects));
    let records = report.into_result().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], "A");
    assert_eq!(records[0]["imagePrompt"], "p");
}

#[test]
fn stray_brace_in_leading_prose() {
    let text = "Fields use the form {title, id.\n[{\"title\":\"A\"}, {\"title\":\"B";
    let records = OutputRepairParser::new().parse(text).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["title"], "A");
}

#[test]
fn deeply_nested_input_fails_cleanly() {
    for text in ["[".repeat(200_000), "[{a:".repeat(100_000), "{".repeat(200_000)] {
        match OutputRepairParser::new().parse(&text) {
            Err(ParseError::UnrecoverableOutput { attempts, .. }) => {
                assert_eq!(attempts, RecoveryStrategy::ALL.len());
            }
            other => panic!("expected UnrecoverableOutput, got {:?}", other.map(|r| r.len())),
        }
    }
}

#[test]
fn object_literal_notation() {
    let text = "[{title: 'Intro', imagePrompt: 'a \"quoted\" fox', order: 1,}, {title: 'End', order: 2}]";
    let report = OutputRepairParser::default().parse_with_report(text);
    assert_eq!(report.winner(), Some(RecoveryStrategy::Literal));
    let records = report.into_result().unwrap();
    assert_eq!(records[0]["imagePrompt"], "a \"quoted\" fox");
    assert_eq!(records[1]["order"], 2);
}

#[test]
fn prose_without_records_is_unrecoverable() {
    let err = parse_structured_output("I'm sorry, I can't help with that.").unwrap_err();
    match err {
        ParseError::UnrecoverableOutput { attempts, preview } => {
            assert_eq!(attempts, RecoveryStrategy::ALL.len());
            assert!(preview.starts_with("I'm sorry"));
        }
        other => panic!("expected UnrecoverableOutput, got {:?}", other),
    }
}

#[test]
fn long_input_preview_is_truncated() {
    let text = "x".repeat(500);
    match parse_structured_output(&text).unwrap_err() {
        ParseError::UnrecoverableOutput { preview, .. } => {
            assert_eq!(preview.len(), 203);
            assert!(preview.ends_with("..."));
        }
        other => panic!("expected UnrecoverableOutput, got {:?}", other),
    }
}
