use crate::sandbox::ContextVariables;
use crate::traits::ToolSpec;
use std::path::PathBuf;
use tracing::warn;

const DEFAULT_TEMPLATE: &str = include_str!("system_prompt.txt");

const PLAIN_BEGINNING: &str = "You are an expert AI assistant that specializes in providing Python code to solve the task/problem at hand provided by the user.";
const ORCHESTRATOR_BEGINNING: &str = "You are an expert orchestrator AI assistant that specializes in providing Python code to solve the task/problem at hand provided by the user and/or transfer the task to the appropriate team member.";

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    template_path: Option<PathBuf>,
    instructions: String,
    tool_specs: Vec<ToolSpec>,
    context: ContextVariables,
    orchestrator: bool,
}

impl PromptBuilder {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            ..Self::default()
        }
    }

    pub fn with_template_path(mut self, path: Option<PathBuf>) -> Self {
        self.template_path = path;
        self
    }

    pub fn with_tool_specs(mut self, tool_specs: Vec<ToolSpec>) -> Self {
        self.tool_specs = tool_specs;
        self
    }

    pub fn with_context(mut self, context: ContextVariables) -> Self {
        self.context = context;
        self
    }

    pub fn orchestrator(mut self, orchestrator: bool) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn build(&self) -> String {
        let template = match &self.template_path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "system prompt template not readable");
                    return String::new();
                }
            },
            None => DEFAULT_TEMPLATE.to_string(),
        };

        let beginning = if self.orchestrator {
            ORCHESTRATOR_BEGINNING
        } else {
            PLAIN_BEGINNING
        };

        template
            .replace("{{prompt_beginning}}", beginning)
            .replace("{{instructions}}", &self.instructions)
            .replace("{{functions_schema}}", &functions_schema(&self.tool_specs))
            .replace("{{context_variables}}", &self.context_text())
    }

    fn context_text(&self) -> String {
        if self.context.is_empty() {
            return "None".to_string();
        }
        self.context
            .iter()
            .map(|(name, value)| format!("- {name} = {}", value.repr()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn functions_schema(specs: &[ToolSpec]) -> String {
    let schema: Vec<serde_json::Value> = specs.iter().map(ToolSpec::to_json).collect();
    serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "[]".to_string())
}
