use super::executor::{ExecutionResult, FunctionResult};
use super::value::Value;
use crate::agent::{ChatEntry, TRANSFER_TOOL_NAME};
use tracing::debug;

const RESULTS_VARIABLE: &str = "results";
const HISTORY_VARIABLE: &str = "history";
const TRANSFER_PLACEHOLDER: &str = "transfer result";

const FRAMING_ENTRIES: usize = 2;

pub fn correlate(result: ExecutionResult) -> (ExecutionResult, Vec<ChatEntry>) {
    let mut cleaned = result;

    if let Some(entry) = cleaned.function_results.get(TRANSFER_TOOL_NAME) {
        if !matches!(entry, FunctionResult::Summary(_)) {
            let summary = match cleaned.variables.get(RESULTS_VARIABLE) {
                Some(value) => match value.as_transfer_record() {
                    Some((answer, _)) => answer,
                    None => value.to_string(),
                },
                None => TRANSFER_PLACEHOLDER.to_string(),
            };
            cleaned
                .function_results
                .insert(TRANSFER_TOOL_NAME.to_string(), FunctionResult::Summary(summary));
        }
    }

    let mut sequences: Vec<Vec<ChatEntry>> = Vec::new();
    let mut removed = Vec::new();
    for (name, value) in &cleaned.variables {
        if name == HISTORY_VARIABLE {
            continue;
        }
        if let Some(entries) = history_shaped(value) {
            sequences.push(entries);
            removed.push(name.clone());
        }
    }
    if let Some(value) = cleaned.variables.get(HISTORY_VARIABLE) {
        if let Some(entries) = value
            .as_entries()
            .or_else(|| value.as_transfer_record().map(|(_, entries)| entries))
        {
            sequences.push(entries);
            removed.push(HISTORY_VARIABLE.to_string());
        }
    }
    for name in &removed {
        cleaned.variables.remove(name);
    }

    let mut extracted = Vec::new();
    let mut seen: Vec<&Vec<ChatEntry>> = Vec::new();
    for sequence in &sequences {
        if seen.contains(&sequence) {
            continue;
        }
        seen.push(sequence);
        extracted.extend(sequence.iter().skip(FRAMING_ENTRIES).cloned());
    }

    if !removed.is_empty() {
        debug!(
            removed = ?removed,
            entries = extracted.len(),
            "extracted conversation history from execution result"
        );
    }
    (cleaned, extracted)
}

fn history_shaped(value: &Value) -> Option<Vec<ChatEntry>> {
    if let Some(entries) = value.as_entries() {
        return (!entries.is_empty()).then_some(entries);
    }
    value.as_transfer_record().map(|(_, entries)| entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Message;
    use std::collections::BTreeMap;

    fn entries(sender: &str, n: usize) -> Vec<ChatEntry> {
        (0..n)
            .map(|i| ChatEntry::new(sender, Message::user(format!("{sender} {i}"))))
            .collect()
    }

    fn as_list(entries: &[ChatEntry]) -> Value {
        Value::List(entries.iter().cloned().map(Value::from).collect())
    }

    #[test]
    fn history_variable_is_removed_and_trimmed() {
        let history = entries("b", 4);
        let result = ExecutionResult {
            variables: BTreeMap::from([
                ("history".to_string(), as_list(&history)),
                ("x".to_string(), Value::Int(1)),
            ]),
            ..ExecutionResult::default()
        };

        let (cleaned, extracted) = correlate(result);
        assert_eq!(extracted, history[2..].to_vec());
        assert_eq!(cleaned.variables.len(), 1);
        assert!(cleaned.variables.contains_key("x"));
    }

    #[test]
    fn transfer_record_is_summarized() {
        let sub = entries("seller", 3);
        let record = Value::Tuple(vec![Value::from("Sold for $3"), as_list(&sub)]);
        let result = ExecutionResult {
            function_results: BTreeMap::from([(
                TRANSFER_TOOL_NAME.to_string(),
                FunctionResult::Variable("results".into()),
            )]),
            variables: BTreeMap::from([("results".to_string(), record)]),
            ..ExecutionResult::default()
        };

        let (cleaned, extracted) = correlate(result);
        assert_eq!(
            cleaned.function_results[TRANSFER_TOOL_NAME],
            FunctionResult::Summary("Sold for $3".into())
        );
        assert!(cleaned.variables.is_empty());
        assert_eq!(extracted, sub[2..].to_vec());
    }

    #[test]
    fn transfer_without_results_variable_uses_placeholder() {
        let result = ExecutionResult {
            function_results: BTreeMap::from([(
                TRANSFER_TOOL_NAME.to_string(),
                FunctionResult::Values(vec![Value::None]),
            )]),
            ..ExecutionResult::default()
        };
        let (cleaned, _) = correlate(result);
        assert_eq!(
            cleaned.function_results[TRANSFER_TOOL_NAME],
            FunctionResult::Summary("transfer result".into())
        );
    }

    #[test]
    fn transfer_named_in_json_without_binding_uses_placeholder() {
        let result = ExecutionResult::from_json(serde_json::json!({
            "function_results": {"transfer_to_agent": "results"},
            "variables": {"x": 1},
        }))
        .unwrap();
        let (cleaned, _) = correlate(result);
        assert_eq!(
            cleaned.function_results[TRANSFER_TOOL_NAME],
            FunctionResult::Summary("transfer result".into())
        );

        let (again, _) = correlate(cleaned.clone());
        assert_eq!(again, cleaned);
    }

    #[test]
    fn identical_sequences_are_merged_once() {
        let sub = entries("b", 3);
        let record = Value::Tuple(vec![Value::from("done"), as_list(&sub)]);
        let result = ExecutionResult {
            variables: BTreeMap::from([
                ("answer".to_string(), record),
                ("history".to_string(), as_list(&sub)),
            ]),
            ..ExecutionResult::default()
        };
        let (_, extracted) = correlate(result);
        assert_eq!(extracted, sub[2..].to_vec());
    }

    #[test]
    fn correlate_is_idempotent() {
        let sub = entries("b", 5);
        let result = ExecutionResult {
            function_results: BTreeMap::from([
                (
                    TRANSFER_TOOL_NAME.to_string(),
                    FunctionResult::Variable("results".into()),
                ),
                ("get".to_string(), FunctionResult::Values(vec![Value::Int(1)])),
            ]),
            variables: BTreeMap::from([
                (
                    "results".to_string(),
                    Value::Tuple(vec![Value::from("ok"), as_list(&sub)]),
                ),
                ("n".to_string(), Value::Int(3)),
            ]),
            errors: vec!["ValueError: x".into()],
            output: Vec::new(),
        };

        let (once, _) = correlate(result);
        let (twice, extracted_again) = correlate(once.clone());
        assert_eq!(once, twice);
        assert!(extracted_again.is_empty());
    }

    #[test]
    fn empty_lists_are_not_history() {
        let result = ExecutionResult {
            variables: BTreeMap::from([("items".to_string(), Value::List(Vec::new()))]),
            ..ExecutionResult::default()
        };
        let (cleaned, extracted) = correlate(result);
        assert!(extracted.is_empty());
        assert!(cleaned.variables.contains_key("items"));
    }
}
