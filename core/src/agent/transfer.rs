use crate::agent::{Agent, History};
use crate::error::{Error, Result};
use crate::sandbox::{ContextVariables, Exception, Value};
use crate::tools::ToolArgs;
use crate::traits::{Parameter, Tool, TypeTag};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub const TRANSFER_TOOL_NAME: &str = "transfer_to_agent";

pub const DEFAULT_MAX_TRANSFER_DEPTH: usize = 8;

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

#[derive(Debug, Clone, Default)]
pub struct TeamRegistry {
    members: BTreeMap<String, Arc<Agent>>,
}

impl TeamRegistry {
    pub fn new(team: impl IntoIterator<Item = Arc<Agent>>) -> Result<Self> {
        let mut members: BTreeMap<String, Arc<Agent>> = BTreeMap::new();
        for agent in team {
            let key = normalize_name(agent.name());
            if let Some(existing) = members.get(&key) {
                return Err(Error::config(format!(
                    "team members '{}' and '{}' share the name '{key}'",
                    existing.name(),
                    agent.name()
                )));
            }
            members.insert(key, agent);
        }
        Ok(Self { members })
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.members
            .values()
            .map(|agent| agent.name().to_string())
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Agent>> {
        self.members
            .get(&normalize_name(name))
            .ok_or_else(|| Error::UnknownAgent {
                name: name.to_string(),
                available: self.names(),
            })
    }
}

pub struct TransferTool {
    team: Arc<TeamRegistry>,
    description: String,
    depth: usize,
    max_depth: usize,
}

impl TransferTool {
    /// `depth` is the nesting level of the turn the tool is bound into.
    pub fn new(team: Arc<TeamRegistry>, depth: usize, max_depth: usize) -> Self {
        let description = format!(
            "Transfer a task to another agent of your team and get back its final answer and \
             its conversation history. Available agents: {}.",
            team.names().join(", ")
        );
        Self {
            team,
            description,
            depth,
            max_depth,
        }
    }
}

impl Tool for TransferTool {
    fn name(&self) -> &str {
        TRANSFER_TOOL_NAME
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            Parameter::new("task", TypeTag::Str),
            Parameter::new("agent_name", TypeTag::Str),
            Parameter::optional(
                "context_variables",
                TypeTag::dict_of(TypeTag::Str, TypeTag::Any),
            ),
        ]
    }

    fn returns(&self) -> TypeTag {
        TypeTag::Tuple(vec![TypeTag::Str, TypeTag::list_of(TypeTag::Entry)])
    }

    fn call(&self, args: ToolArgs) -> anyhow::Result<Value> {
        let task = args.str("task")?;
        let agent_name = args.str("agent_name")?;
        let context = match args.opt("context_variables") {
            Some(value) => context_from(value)?,
            None => ContextVariables::new(),
        };

        let agent = self.team.get(agent_name)?;
        if self.depth >= self.max_depth {
            return Err(Error::TransferDepth(self.max_depth).into());
        }

        info!(to = %agent.name(), depth = self.depth + 1, "transferring task");
        let history = agent.run_at_depth(task, History::new(), &context, self.depth + 1)?;
        let answer = history
            .last_message()
            .map(|entry| entry.content().to_string())
            .unwrap_or_default();

        Ok(Value::Tuple(vec![Value::Str(answer), history.to_value()]))
    }
}

fn context_from(value: &Value) -> anyhow::Result<ContextVariables> {
    let Value::Dict(dict) = value else {
        return Err(Exception::new(
            "TypeError",
            format!(
                "{TRANSFER_TOOL_NAME}(): context_variables must be dict, not {}",
                value.type_name()
            ),
        )
        .into());
    };
    dict.iter()
        .map(|(key, value)| match key {
            Value::Str(name) => Ok((name.clone(), value.clone())),
            other => Err(Exception::new(
                "TypeError",
                format!("context variable names must be str, not {}", other.type_name()),
            )
            .into()),
        })
        .collect()
}
