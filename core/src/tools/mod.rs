use crate::sandbox::{Exception, Value};
use crate::traits::{Parameter, Tool, TypeTag};

#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs {
    tool: String,
    values: Vec<(String, Value)>,
}

impl ToolArgs {
    pub fn new(tool: impl Into<String>, values: Vec<(String, Value)>) -> Self {
        Self {
            tool: tool.into(),
            values,
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn opt(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn value(&self, name: &str) -> anyhow::Result<&Value> {
        self.opt(name)
            .ok_or_else(|| self.type_error(format!("missing argument '{name}'")))
    }

    pub fn int(&self, name: &str) -> anyhow::Result<i64> {
        let value = self.value(name)?;
        value
            .as_int()
            .ok_or_else(|| self.expected(name, "int", value))
    }

    pub fn str(&self, name: &str) -> anyhow::Result<&str> {
        let value = self.value(name)?;
        value
            .as_str()
            .ok_or_else(|| self.expected(name, "str", value))
    }

    pub fn list(&self, name: &str) -> anyhow::Result<&[Value]> {
        let value = self.value(name)?;
        value
            .as_seq()
            .ok_or_else(|| self.expected(name, "list", value))
    }

    fn expected(&self, name: &str, ty: &str, got: &Value) -> anyhow::Error {
        self.type_error(format!(
            "argument '{name}' must be {ty}, not {}",
            got.type_name()
        ))
    }

    fn type_error(&self, message: String) -> anyhow::Error {
        Exception::new("TypeError", format!("{}(): {message}", self.tool)).into()
    }
}

type Handler = dyn Fn(ToolArgs) -> anyhow::Result<Value> + Send + Sync;

pub struct FnTool {
    name: String,
    description: String,
    parameters: Vec<Parameter>,
    returns: TypeTag,
    handler: Box<Handler>,
}

impl FnTool {
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolArgs) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            returns: TypeTag::Any,
            handler: Box::new(handler),
        }
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn returns(mut self, returns: TypeTag) -> Self {
        self.returns = returns;
        self
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.parameters.clone()
    }

    fn returns(&self) -> TypeTag {
        self.returns.clone()
    }

    fn call(&self, args: ToolArgs) -> anyhow::Result<Value> {
        (self.handler)(args)
    }
}
