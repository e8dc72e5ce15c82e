use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{
    ChatEntry, ContextVariables, ExecutionResult, FnTool, FunctionResult, Message, Parameter,
    SandboxOptions, Tool, TypeTag, Value, correlate, execute, extract,
};

fn history_entry(sender: &str, role: &str, content: &str) -> serde_json::Value {
    json!({"sender": sender, "message": {"role": role, "content": content}})
}

#[test]
fn serialized_bundle_with_history_is_cleaned() {
    let bundle = json!({
        "function_results": {"transfer_to_agent": "results"},
        "variables": {
            "x": 1,
            "history": [
                history_entry("system", "system", "prompt"),
                history_entry("user", "user", "task"),
                history_entry("Seller Agent", "assistant", "sold"),
            ],
        },
        "errors": [],
    });

    let result = ExecutionResult::from_json(bundle).unwrap();
    let (cleaned, extracted) = correlate(result);

    assert_eq!(extracted.len(), 1);
    assert_eq!(extracted[0].sender, "Seller Agent");
    assert_eq!(cleaned.variables.keys().collect::<Vec<_>>(), vec!["x"]);
    assert_eq!(
        cleaned.function_results["transfer_to_agent"],
        FunctionResult::Summary("transfer result".into())
    );

    let (again, none) = correlate(cleaned.clone());
    assert_eq!(again, cleaned);
    assert!(none.is_empty());
}

#[test]
fn missing_keys_are_configuration_errors() {
    for bundle in [json!({"variables": {}}), json!({"function_results": {}}), json!([])] {
        let err = ExecutionResult::from_json(bundle).unwrap_err();
        assert!(err.is_config(), "{err}");
    }
}

#[test]
fn extracted_code_runs_against_tools() {
    let split: Arc<dyn Tool> = Arc::new(
        FnTool::new("split_words", "Split text into words.", |args| {
            Ok(Value::List(
                args.str("text")?.split_whitespace().map(Value::from).collect(),
            ))
        })
        .param(Parameter::new("text", TypeTag::Str))
        .returns(TypeTag::list_of(TypeTag::Str)),
    );

    let reply = "Here you go:\n```python\nwords = split_words('a b c')\ncount = len(words)\n```\n";
    let (code, found) = extract(reply);
    assert!(found);

    let result = execute(&code, &[split], &ContextVariables::new(), &SandboxOptions::default());
    assert_eq!(result.function_results["split_words"], FunctionResult::Variable("words".into()));
    assert_eq!(result.variables["count"], Value::Int(3));
}

#[test]
fn runaway_code_times_out() {
    let options = SandboxOptions {
        timeout: Some(Duration::from_millis(100)),
        ..SandboxOptions::default()
    };
    let code = "try:\n    while True:\n        pass\nexcept Exception:\n    caught = True\n";
    let result = execute(code, &[], &ContextVariables::new(), &options);

    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("TimeoutError"));
    assert!(!result.variables.contains_key("caught"));
}

#[test]
fn restricted_builtins_are_missing() {
    let options = SandboxOptions {
        restrict_builtins: true,
        ..SandboxOptions::default()
    };
    let result = execute("x = eval('1 + 1')\n", &[], &ContextVariables::new(), &options);
    assert!(result.errors[0].starts_with("NameError"), "{:?}", result.errors);

    let result = execute(
        "x = eval('1 + 1')\n",
        &[],
        &ContextVariables::new(),
        &SandboxOptions::default(),
    );
    assert_eq!(result.variables["x"], Value::Int(2));
}

#[test]
fn extreme_ranges_do_not_escape_as_panics() {
    let code = "r = range(-9223372036854775807, 9223372036854775807)\ntry:\n    n = len(r)\nexcept OverflowError:\n    n = -1\n";
    let result = execute(code, &[], &ContextVariables::new(), &SandboxOptions::default());
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.variables["n"], Value::Int(-1));
    assert_eq!(
        result.variables["r"],
        Value::from("range(-9223372036854775807, 9223372036854775807)")
    );
}

#[test]
fn chat_entries_cross_the_boundary_as_entries() {
    let entry = ChatEntry::new("Seller Agent", Message::assistant("sold"));
    let mut context = ContextVariables::new();
    context.insert("log".to_string(), Value::List(vec![Value::from(entry.clone())]));

    let code = "last = log[-1]\nsender = last['sender']\n";
    let result = execute(code, &[], &context, &SandboxOptions::default());
    assert_eq!(result.variables["sender"], Value::from("Seller Agent"));
    assert_eq!(result.variables["last"], Value::from(entry));
}
