use std::sync::Arc;
use tandem_core::{Agent, Config, FnTool, Parameter, Provider, Tool, TypeTag, Value};

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
            "Eat a certain quantity of apples. Returns the remaining apples.",
            |args| {
                let apples = args.list("apples")?;
                let quantity = usize::try_from(args.int("quantity")?).unwrap_or(0);
                Ok(Value::List(apples.get(quantity..).unwrap_or_default().to_vec()))
            },
        )
        .param(Parameter::new("apples", TypeTag::list_of(TypeTag::Str)))
        .param(Parameter::new("quantity", TypeTag::Int))
        .returns(TypeTag::list_of(TypeTag::Str)),
    )
}

pub fn sell_apples() -> Arc<dyn Tool> {
    Arc::new(
        FnTool::new(
            "sell_apples",
            "Sell all the apples provided. Returns the money earned.",
            |args| Ok(Value::from(format!("${}", args.list("apples")?.len()))),
        )
        .param(Parameter::new("apples", TypeTag::list_of(TypeTag::Str)))
        .returns(TypeTag::Str),
    )
}

pub fn single_agent(config: &Config, provider: Arc<dyn Provider>) -> tandem_core::Result<Agent> {
    Agent::builder("Apple Agent")
        .config(config)
        .instructions("You are an apple seller. You can get, eat or sell apples.")
        .provider(provider)
        .tools([get_apples(), eat_apples(), sell_apples()])
        .build()
}

pub fn team(config: &Config, provider: Arc<dyn Provider>) -> tandem_core::Result<Agent> {
    let seller = Agent::builder("Seller Agent")
        .config(config)
        .instructions("You are an apple seller. You can sell apples.")
        .provider(Arc::clone(&provider))
        .tool(sell_apples())
        .build()?;

    Agent::builder("Apple Agent")
        .config(config)
        .instructions(
            "You can get and eat apples. You can also transfer the task to the seller agent.",
        )
        .provider(provider)
        .tools([get_apples(), eat_apples()])
        .teammate(Arc::new(seller))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_core::ToolArgs;

    fn list(n: usize) -> Value {
        Value::List(vec![Value::from("Apple"); n])
    }

    #[test]
    fn eating_more_than_available_leaves_nothing() {
        let args = ToolArgs::new(
            "eat_apples",
            vec![("apples".into(), list(2)), ("quantity".into(), Value::Int(5))],
        );
        assert_eq!(eat_apples().call(args).unwrap(), list(0));
    }

    #[test]
    fn selling_earns_a_dollar_per_apple() {
        let args = ToolArgs::new("sell_apples", vec![("apples".into(), list(3))]);
        assert_eq!(sell_apples().call(args).unwrap(), Value::from("$3"));
    }

    #[test]
    fn team_exposes_transfer_tool() {
        let provider: Arc<dyn Provider> =
            Arc::new(tandem_core::ScriptedProvider::new(Vec::<String>::new()));
        let agent = team(&Config::default(), provider).unwrap();
        let names: Vec<String> = agent.tool_specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["get_apples", "eat_apples", "transfer_to_agent"]);
    }
}
