use super::exception::{Exception, exception_from_error};
use super::python::{describe, from_py, is_binding_result, raise, to_py};
use super::value::Value;
use super::watchdog::{Clock, Stop, watch};
use crate::error::{Error, Result};
use crate::tools::ToolArgs;
use crate::traits::Tool;
use rustpython_vm::builtins::PyStr;
use rustpython_vm::function::FuncArgs;
use rustpython_vm::scope::Scope;
use rustpython_vm::{Interpreter, PyResult, Settings, VirtualMachine, signal};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

pub const DENY_LIST: &[&str] = &[
    "exec", "eval", "compile", "__import__", "open", "input", "globals", "locals", "vars",
    "getattr", "setattr", "delattr", "breakpoint", "exit", "quit", "help",
];

const SOURCE_PATH: &str = "<sandbox>";

pub type ContextVariables = BTreeMap<String, Value>;

#[derive(Debug, Clone)]
pub struct SandboxOptions {
    pub restrict_builtins: bool,
    /// Interpreter time only; tool calls do not count against it.
    pub timeout: Option<Duration>,
    pub max_call_depth: usize,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            restrict_builtins: false,
            timeout: Some(Duration::from_secs(30)),
            max_call_depth: 50,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FunctionResult {
    Variable(String),
    Values(Vec<Value>),
    Summary(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub function_results: BTreeMap<String, FunctionResult>,
    pub variables: BTreeMap<String, Value>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output: Vec<String>,
}

impl ExecutionResult {
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(mut map) = json else {
            return Err(Error::config("execution result must be a JSON object"));
        };
        let function_results = map
            .remove("function_results")
            .ok_or_else(|| Error::config("execution result is missing 'function_results'"))?;
        let variables = map
            .remove("variables")
            .ok_or_else(|| Error::config("execution result is missing 'variables'"))?;

        let serde_json::Value::Object(function_results) = function_results else {
            return Err(Error::config("'function_results' must be an object"));
        };
        let serde_json::Value::Object(variables) = variables else {
            return Err(Error::config("'variables' must be an object"));
        };

        let function_results = function_results
            .into_iter()
            .map(|(tool, value)| {
                let entry = match value {
                    serde_json::Value::String(name) => FunctionResult::Variable(name),
                    serde_json::Value::Array(values) => {
                        FunctionResult::Values(values.into_iter().map(Value::from_json).collect())
                    }
                    other => FunctionResult::Values(vec![Value::from_json(other)]),
                };
                (tool, entry)
            })
            .collect();
        let variables = variables
            .into_iter()
            .map(|(name, value)| (name, Value::from_json(value)))
            .collect();
        let strings = |value: Option<serde_json::Value>| -> Vec<String> {
            match value {
                Some(serde_json::Value::Array(items)) => items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                _ => Vec::new(),
            }
        };

        Ok(Self {
            function_results,
            variables,
            errors: strings(map.remove("errors")),
            output: strings(map.remove("output")),
        })
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A tool's result resolves to the variable holding an equal value; when
/// several do, the one bound last in the namespace wins.
pub fn execute(
    code: &str,
    tools: &[Arc<dyn Tool>],
    context: &ContextVariables,
    options: &SandboxOptions,
) -> ExecutionResult {
    let session = Arc::new(Session {
        clock: Clock::new(options.timeout, options.cancel.clone()),
        calls: Mutex::default(),
        output: Mutex::default(),
    });
    let (sender, receiver) = signal::user_signal_channel();
    let interpreter = Interpreter::with_init(Settings::default(), |vm| {
        vm.set_user_signal_channel(receiver);
    });
    let done = AtomicBool::new(false);

    let (bindings, error) = std::thread::scope(|scope| {
        if session.clock.is_limited() {
            scope.spawn(|| watch(&session.clock, &sender, &done));
        }
        let outcome = interpreter.enter(|vm| run(vm, code, tools, context, options, &session));
        done.store(true, Ordering::Release);
        outcome
    });

    let mut errors = Vec::new();
    if let Some(exc) = error {
        let exc = session.clock.stopped().map(Stop::exception).unwrap_or(exc);
        debug!(error = %exc, "sandbox execution raised");
        errors.push(exc.to_string());
    }

    let mut recorded: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for (tool, value) in session.take_calls() {
        recorded.entry(tool).or_default().push(value);
    }
    let function_results = recorded
        .into_iter()
        .map(|(tool, values)| {
            let matched = bindings
                .iter()
                .filter(|(_, value)| values.contains(value))
                .map(|(name, _)| name.clone())
                .last();
            let entry = match matched {
                Some(name) => FunctionResult::Variable(name),
                None => FunctionResult::Values(values),
            };
            (tool, entry)
        })
        .collect();
    let variables: BTreeMap<String, Value> = bindings.into_iter().collect();

    debug!(
        variables = variables.len(),
        errors = errors.len(),
        "sandbox execution finished"
    );
    ExecutionResult {
        function_results,
        variables,
        errors,
        output: session.take_output(),
    }
}

struct Session {
    clock: Clock,
    calls: Mutex<Vec<(String, Value)>>,
    output: Mutex<Vec<String>>,
}

impl Session {
    fn record(&self, tool: &str, value: Value) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((tool.to_string(), value));
    }

    fn print(&self, line: String) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    fn take_calls(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn take_output(&self) -> Vec<String> {
        std::mem::take(&mut *self.output.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn run(
    vm: &VirtualMachine,
    code: &str,
    tools: &[Arc<dyn Tool>],
    context: &ContextVariables,
    options: &SandboxOptions,
    session: &Arc<Session>,
) -> (Vec<(String, Value)>, Option<Exception>) {
    let scope = vm.new_scope_with_builtins();
    let globals = scope.globals.clone();

    let error = match prepare(vm, &scope, tools, context, options, session) {
        Ok(()) => {
            session.clock.start();
            vm.run_code_string(scope, code, SOURCE_PATH.to_owned())
                .err()
                .map(|exc| describe(&exc, vm))
        }
        Err(exc) => Some(describe(&exc, vm)),
    };

    let reserved: HashSet<&str> = context
        .keys()
        .map(String::as_str)
        .chain(tools.iter().map(|tool| tool.name()))
        .collect();
    let mut bindings = Vec::new();
    for (key, object) in &globals {
        let Some(name) = key.payload::<PyStr>().map(|name| name.as_str().to_owned()) else {
            continue;
        };
        if name.starts_with("__") || reserved.contains(name.as_str()) || !is_binding_result(&object)
        {
            continue;
        }
        match from_py(&object, vm) {
            Ok(value) => bindings.push((name, value)),
            Err(exc) => debug!(variable = %name, error = %describe(&exc, vm), "skipping binding"),
        }
    }
    (bindings, error)
}

fn prepare(
    vm: &VirtualMachine,
    scope: &Scope,
    tools: &[Arc<dyn Tool>],
    context: &ContextVariables,
    options: &SandboxOptions,
    session: &Arc<Session>,
) -> PyResult<()> {
    vm.recursion_limit.set(options.max_call_depth.max(8));

    let builtins = vm.builtins.dict();
    if options.restrict_builtins {
        for name in DENY_LIST {
            if builtins.contains_key(*name, vm) {
                builtins.del_item(*name, vm)?;
            }
        }
    }
    let printer = Arc::clone(session);
    let print = vm.new_function("print", move |args: FuncArgs, vm: &VirtualMachine| -> PyResult {
        let sep = match args.kwargs.get("sep") {
            Some(sep) if !vm.is_none(sep) => sep.str(vm)?.as_str().to_owned(),
            _ => " ".to_owned(),
        };
        let parts = args
            .args
            .iter()
            .map(|arg| arg.str(vm).map(|text| text.as_str().to_owned()))
            .collect::<PyResult<Vec<_>>>()?;
        printer.print(parts.join(&sep));
        Ok(vm.ctx.none())
    });
    builtins.set_item("print", print.into(), vm)?;

    for (name, value) in context {
        scope.globals.set_item(name.as_str(), to_py(value, vm)?, vm)?;
    }
    for tool in tools {
        let name = tool.name().to_string();
        let tool = Arc::clone(tool);
        let session = Arc::clone(session);
        let function = vm.new_function("tool", move |args: FuncArgs, vm: &VirtualMachine| -> PyResult {
            call_tool(tool.as_ref(), &session, args, vm)
        });
        scope.globals.set_item(name.as_str(), function.into(), vm)?;
    }
    Ok(())
}

fn call_tool(tool: &dyn Tool, session: &Session, args: FuncArgs, vm: &VirtualMachine) -> PyResult {
    let name = tool.name();
    let positional = args
        .args
        .iter()
        .map(|arg| from_py(arg, vm))
        .collect::<PyResult<Vec<_>>>()?;
    let keywords = args
        .kwargs
        .iter()
        .map(|(key, arg)| Ok((key.clone(), from_py(arg, vm)?)))
        .collect::<PyResult<Vec<_>>>()?;
    let bound = bind_arguments(tool, positional, keywords).map_err(|exc| raise(&exc, vm))?;

    debug!(tool = %name, "calling tool");
    match session.clock.paused(|| tool.call(ToolArgs::new(name, bound))) {
        Ok(value) => {
            session.record(name, value.clone());
            to_py(&value, vm)
        }
        Err(err) => {
            debug!(tool = %name, error = %err, "tool call failed");
            Err(raise(&exception_from_error(&err), vm))
        }
    }
}

fn bind_arguments(
    tool: &dyn Tool,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> std::result::Result<Vec<(String, Value)>, Exception> {
    let name = tool.name();
    let params = tool.parameters();
    let type_error = |message: String| Exception::new("TypeError", format!("{name}() {message}"));

    if args.len() > params.len() {
        return Err(type_error(format!(
            "takes {} positional arguments but {} were given",
            params.len(),
            args.len()
        )));
    }
    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, arg) in slots.iter_mut().zip(args) {
        *slot = Some(arg);
    }
    for (key, value) in kwargs {
        let Some(position) = params.iter().position(|param| param.name == key) else {
            return Err(type_error(format!("got an unexpected keyword argument '{key}'")));
        };
        if slots[position].is_some() {
            return Err(type_error(format!("got multiple values for argument '{key}'")));
        }
        slots[position] = Some(value);
    }

    let mut bound = Vec::with_capacity(params.len());
    let mut missing = Vec::new();
    for (param, slot) in params.iter().zip(slots) {
        match slot {
            Some(Value::None) if !param.required => {}
            Some(value) => bound.push((param.name.clone(), value)),
            None if param.required => missing.push(format!("'{}'", param.name)),
            None => {}
        }
    }
    if !missing.is_empty() {
        return Err(type_error(format!(
            "missing {} required argument{}: {}",
            missing.len(),
            if missing.len() == 1 { "" } else { "s" },
            missing.join(", ")
        )));
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use crate::traits::{Parameter, TypeTag};
    use std::thread;

    fn double_tool() -> Arc<dyn Tool> {
        Arc::new(
            FnTool::new("double", "Double a number.", |args| Ok(Value::Int(args.int("n")? * 2)))
                .param(Parameter::new("n", TypeTag::Int))
                .returns(TypeTag::Int),
        )
    }

    fn slow_tool(delay: Duration) -> Arc<dyn Tool> {
        Arc::new(FnTool::new("slow", "Take a while.", move |_| {
            thread::sleep(delay);
            Ok(Value::from("late"))
        }))
    }

    fn run(code: &str) -> ExecutionResult {
        execute(code, &[double_tool()], &ContextVariables::new(), &SandboxOptions::default())
    }

    fn with_timeout(millis: u64) -> SandboxOptions {
        SandboxOptions {
            timeout: Some(Duration::from_millis(millis)),
            ..SandboxOptions::default()
        }
    }

    #[test]
    fn plain_variables_without_tool_calls() {
        let result = run("a = 1\nb = 'two'\nc = [a, b]\n");
        assert!(result.function_results.is_empty());
        assert!(result.errors.is_empty());
        assert_eq!(
            result.variables.keys().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            result.variables["c"],
            Value::List(vec![Value::Int(1), Value::from("two")])
        );
    }

    #[test]
    fn bound_tool_result_resolves_to_variable_name() {
        let result = run("x = double(4)\n");
        assert_eq!(
            result.function_results["double"],
            FunctionResult::Variable("x".into())
        );

        let result = run("double(n=4)\n");
        assert_eq!(
            result.function_results["double"],
            FunctionResult::Values(vec![Value::Int(8)])
        );
    }

    #[test]
    fn equal_values_resolve_to_the_last_bound_name() {
        let result = run("zeta = double(2)\nalpha = double(2)\n");
        assert_eq!(
            result.function_results["double"],
            FunctionResult::Variable("alpha".into())
        );

        let result = run("alpha = double(2)\nzeta = double(2)\n");
        assert_eq!(
            result.function_results["double"],
            FunctionResult::Variable("zeta".into())
        );
    }

    #[test]
    fn errors_are_captured_with_partial_state() {
        let result = run("ok = double(1)\nbad = double('x')\n");
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("TypeError"), "{:?}", result.errors);
        assert_eq!(result.variables.get("ok"), Some(&Value::Int(2)));
        assert!(!result.variables.contains_key("bad"));

        let result = run("x = (\n");
        assert!(result.errors[0].starts_with("SyntaxError"), "{:?}", result.errors);
    }

    #[test]
    fn bad_arguments_are_type_errors() {
        let result = run("double(1, 2)\n");
        assert!(result.errors[0].starts_with("TypeError: double() takes 1 positional"));

        let result = run("double(m=1)\n");
        assert!(result.errors[0].contains("unexpected keyword argument 'm'"));

        let result = run("double()\n");
        assert!(result.errors[0].contains("missing 1 required argument: 'n'"));
    }

    #[test]
    fn tool_errors_can_be_handled_by_the_code() {
        let result = run("try:\n    double('x')\nexcept TypeError as e:\n    why = str(e)\n");
        assert!(result.errors.is_empty());
        assert_eq!(
            result.variables["why"],
            Value::from("double(): argument 'n' must be int, not str")
        );
    }

    #[test]
    fn context_tools_and_functions_are_not_variables() {
        let mut context = ContextVariables::new();
        context.insert("budget".into(), Value::Int(10));
        let result = execute(
            "def helper():\n    return budget\nclass Box:\n    pass\nspent = helper()\n",
            &[double_tool()],
            &context,
            &SandboxOptions::default(),
        );
        assert_eq!(
            result.variables,
            BTreeMap::from([("spent".to_string(), Value::Int(10))])
        );
    }

    #[test]
    fn print_output_is_captured_and_serialized() {
        let result = run("print('total:', double(3))\nprint('a', 'b', sep='-')\n");
        assert_eq!(result.output, vec!["total: 6", "a-b"]);
        let json: serde_json::Value = serde_json::from_str(&result.to_json_pretty()).unwrap();
        assert_eq!(json["output"][0], "total: 6");

        let quiet = run("x = 1\n");
        let json: serde_json::Value = serde_json::from_str(&quiet.to_json_pretty()).unwrap();
        assert!(json.get("output").is_none());
    }

    #[test]
    fn time_inside_tools_is_not_charged() {
        let result = execute(
            "a = slow()\nb = 2\n",
            &[slow_tool(Duration::from_millis(300))],
            &ContextVariables::new(),
            &with_timeout(150),
        );
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        assert_eq!(result.variables["b"], Value::Int(2));
    }

    #[test]
    fn runaway_loops_time_out_past_handlers() {
        let code = "try:\n    while True:\n        pass\nexcept Exception:\n    caught = True\n";
        let result = execute(code, &[], &ContextVariables::new(), &with_timeout(100));
        assert_eq!(result.errors, vec!["TimeoutError: execution timed out"]);
        assert!(!result.variables.contains_key("caught"));
    }

    #[test]
    fn cancellation_stops_execution() {
        let flag = Arc::new(AtomicBool::new(false));
        let options = SandboxOptions {
            timeout: None,
            cancel: Some(Arc::clone(&flag)),
            ..SandboxOptions::default()
        };
        let trigger = Arc::clone(&flag);
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.store(true, Ordering::Relaxed);
        });
        let result = execute("n = 0\nwhile True:\n    n += 1\n", &[], &ContextVariables::new(), &options);
        canceller.join().unwrap();

        assert_eq!(result.errors, vec!["CancelledError: execution cancelled"]);
        assert!(matches!(result.variables["n"], Value::Int(n) if n > 0));
    }

    #[test]
    fn deep_recursion_is_bounded() {
        let result = run("def down(n):\n    return down(n + 1)\ndown(0)\n");
        assert!(result.errors[0].starts_with("RecursionError"), "{:?}", result.errors);
    }

    #[test]
    fn restricted_builtins_are_removed() {
        let options = SandboxOptions {
            restrict_builtins: true,
            ..SandboxOptions::default()
        };
        let result = execute("x = eval('1 + 1')\n", &[], &ContextVariables::new(), &options);
        assert!(result.errors[0].starts_with("NameError"), "{:?}", result.errors);

        let result = execute("y = len([1, 2])\n", &[], &ContextVariables::new(), &options);
        assert_eq!(result.variables["y"], Value::Int(2));
    }

    #[test]
    fn from_json_requires_both_keys() {
        let err = ExecutionResult::from_json(serde_json::json!({"variables": {}})).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("function_results"));

        let err = ExecutionResult::from_json(serde_json::json!({"function_results": {}})).unwrap_err();
        assert!(err.to_string().contains("variables"));

        let ok = ExecutionResult::from_json(serde_json::json!({
            "function_results": {"double": "x", "transfer_to_agent": "results"},
            "variables": {"x": 8},
        }))
        .unwrap();
        assert_eq!(ok.function_results["double"], FunctionResult::Variable("x".into()));
        assert_eq!(
            ok.function_results["transfer_to_agent"],
            FunctionResult::Variable("results".into())
        );
    }
}
