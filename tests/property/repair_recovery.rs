//! Well-formed output must come back unchanged from the first strategy, and
//! no input may make the parser panic.

use proptest::prelude::*;
use serde_json::{Map, Value};
use tether::{OutputRepairParser, RecoveryStrategy};

fn record() -> impl Strategy<Value = Map<String, Value>> {
    (
        "[a-zA-Z][a-zA-Z0-9 ]{0,24}",
        any::<String>(),
        any::<i32>(),
        any::<bool>(),
    )
        .prop_map(|(title, body, order, draft)| {
            let mut map = Map::new();
            map.insert("title".to_string(), Value::from(title));
            map.insert("body".to_string(), Value::from(body));
            map.insert("order".to_string(), Value::from(order));
            map.insert("draft".to_string(), Value::from(draft));
            map
        })
}

proptest! {
    #[test]
    fn well_formed_arrays_parse_strictly(records in prop::collection::vec(record(), 1..6)) {
        let text = serde_json::to_string(&records).unwrap();
        let report = OutputRepairParser::default().parse_with_report(&text);
        prop_assert_eq!(report.winner(), Some(RecoveryStrategy::Strict));
        prop_assert_eq!(report.into_result().unwrap(), records);
    }

    #[test]
    fn fenced_pretty_output_matches_plain(records in prop::collection::vec(record(), 1..6)) {
        let pretty = serde_json::to_string_pretty(&records).unwrap();
        let fenced = format!("```json\n{}\n```", pretty);
        let parsed = OutputRepairParser::default().parse(&fenced).unwrap();
        prop_assert_eq!(parsed, records);
    }

    #[test]
    fn truncated_wrapper_keeps_complete_records(records in prop::collection::vec(record(), 1..6)) {
        let items: Vec<String> = records
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();
        let text = format!(r#"{{"scenes": [{}, {{"title": "cut"#, items.join(", "));
        let report = OutputRepairParser::default().parse_with_report(&text);
        prop_assert_eq!(report.winner(), Some(RecoveryStrategy::SalvageObjects));
        prop_assert_eq!(report.into_result().unwrap(), records);
    }

    #[test]
    fn nested_brackets_never_panic(opens in "[\\[{]{1,64}", depth in 0usize..200) {
        let text = format!("{}{}", opens.repeat(depth + 1), "]".repeat(depth));
        let _ = OutputRepairParser::default().parse(&text);
    }

    #[test]
    fn arbitrary_text_never_panics(text in any::<String>()) {
        let report = OutputRepairParser::default().parse_with_report(&text);
        prop_assert!(!report.attempts.is_empty());
        prop_assert!(report.attempts.len() <= RecoveryStrategy::ALL.len());
    }
}
