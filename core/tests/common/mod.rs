#![allow(dead_code)]

use std::sync::Arc;
use tandem_core::{Agent, FnTool, Parameter, Provider, Tool, TypeTag, Value};

pub fn get_apples() -> Arc<dyn Tool> {
    Arc::new(
        FnTool::new("get_apples", "Get a certain quantity of apples.", |args| {
            let quantity = args.int("quantity")?.max(0);
            Ok(Value::List((0..quantity).map(|_| Value::from("Apple")).collect()))
        })
        .param(Parameter::new("quantity", TypeTag::Int))
        .returns(TypeTag::list_of(TypeTag::Str)),
    )
}

pub fn eat_apples() -> Arc<dyn Tool> {
    Arc::new(
        FnTool::new(
            "eat_apples",
            "Eat a certain quantity of apples and return the remaining ones.",
            |args| {
                let apples = args.list("apples")?;
                let quantity = usize::try_from(args.int("quantity")?).unwrap_or(0);
                let remaining = apples.get(quantity..).unwrap_or_default();
                Ok(Value::List(remaining.to_vec()))
            },
        )
        .param(Parameter::new("apples", TypeTag::list_of(TypeTag::Str)))
        .param(Parameter::new("quantity", TypeTag::Int))
        .returns(TypeTag::list_of(TypeTag::Str)),
    )
}

pub fn sell_apples() -> Arc<dyn Tool> {
    Arc::new(
        FnTool::new("sell_apples", "Sell all the apples provided.", |args| {
            Ok(Value::from(format!("${}", args.list("apples")?.len())))
        })
        .param(Parameter::new("apples", TypeTag::list_of(TypeTag::Str)))
        .returns(TypeTag::Str),
    )
}

pub fn seller(provider: Arc<dyn Provider>) -> Arc<Agent> {
    Arc::new(
        Agent::builder("Seller Agent")
            .instructions("You are an apple seller. You can sell apples.")
            .provider(provider)
            .tool(sell_apples())
            .build()
            .unwrap(),
    )
}

pub fn apple_agent(provider: Arc<dyn Provider>) -> Agent {
    Agent::builder("Apple Agent")
        .instructions("You can get and eat apples. You can also transfer the task to the seller agent.")
        .provider(Arc::clone(&provider))
        .tool(get_apples())
        .tool(eat_apples())
        .teammate(seller(provider))
        .build()
        .unwrap()
}

/// The JSON payload of a `<|function_results|>` message.
pub fn function_results(content: &str) -> serde_json::Value {
    let body = content
        .trim()
        .trim_start_matches("<|function_results|>")
        .trim_end_matches("<|end_function_results|>")
        .trim();
    serde_json::from_str(body).unwrap()
}
