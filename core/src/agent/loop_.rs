use crate::agent::history::{ChatEntry, History, USER_SENDER};
use crate::agent::prompt::PromptBuilder;
use crate::agent::transfer::{DEFAULT_MAX_TRANSFER_DEPTH, TeamRegistry, TransferTool};
use crate::agent::ToolRegistry;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::sandbox::{ContextVariables, SandboxOptions, correlate, execute, extract};
use crate::traits::{Message, Provider, Tool, ToolSpec};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "qwen2.5-coder:7b-instruct-fp16";

const RESULTS_OPEN: &str = "<|function_results|>";
const RESULTS_CLOSE: &str = "<|end_function_results|>";

pub struct Agent {
    name: String,
    instructions: String,
    model: String,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    team: Arc<TeamRegistry>,
    history: History,
    template_path: Option<PathBuf>,
    sandbox: SandboxOptions,
    max_transfer_depth: usize,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn team(&self) -> &TeamRegistry {
        &self.team
    }

    pub fn is_orchestrator(&self) -> bool {
        !self.team.is_empty()
    }

    pub fn start(&self, task: &str) -> Result<History> {
        self.run(task, self.history.clone(), &ContextVariables::new())
    }

    pub fn run(&self, task: &str, history: History, context: &ContextVariables) -> Result<History> {
        self.run_at_depth(task, history, context, 0)
    }

    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.sandbox_tools(0).iter().map(|t| t.spec()).collect()
    }

    pub fn system_prompt(&self, context: &ContextVariables) -> String {
        PromptBuilder::new(self.instructions.clone())
            .with_template_path(self.template_path.clone())
            .with_tool_specs(self.tool_specs())
            .with_context(context.clone())
            .orchestrator(self.is_orchestrator())
            .build()
    }

    pub(crate) fn run_at_depth(
        &self,
        task: &str,
        history: History,
        context: &ContextVariables,
        depth: usize,
    ) -> Result<History> {
        info!(agent = %self.name, depth, "starting turn");
        let mut history = history.init_or_extend(task, || self.system_prompt(context));

        let reply = self.complete(&history)?;
        let (code, found) = extract(&reply);
        if !found {
            debug!(agent = %self.name, "reply carries no code");
            history.push(self.entry(reply));
            return Ok(history);
        }

        debug!(agent = %self.name, lines = code.lines().count(), "executing reply code");
        let tools = self.sandbox_tools(depth);
        let result = execute(&code, &tools, context, &self.sandbox);
        let (cleaned, extracted) = correlate(result);
        if !cleaned.errors.is_empty() {
            debug!(agent = %self.name, errors = ?cleaned.errors, "code raised");
        }

        history.push(self.entry(reply));
        history.merge_foreign(extracted);
        history.push(ChatEntry::new(
            USER_SENDER,
            Message::user(format!(
                "\n{RESULTS_OPEN}\n{}\n{RESULTS_CLOSE}",
                cleaned.to_json_pretty()
            )),
        ));

        let reply = self.complete(&history)?;
        history.push(self.entry(reply));
        info!(agent = %self.name, entries = history.len(), "turn finished");
        Ok(history)
    }

    fn complete(&self, history: &History) -> Result<String> {
        let messages = history.chat_messages();
        debug!(
            agent = %self.name,
            provider = self.provider.name(),
            messages = messages.len(),
            "requesting completion"
        );
        self.provider
            .chat(&self.model, &messages)
            .map_err(Error::Provider)
    }

    fn entry(&self, reply: String) -> ChatEntry {
        ChatEntry::new(self.name.clone(), Message::assistant(reply))
    }

    fn sandbox_tools(&self, depth: usize) -> Vec<Arc<dyn Tool>> {
        let mut tools = self.tools.tools().to_vec();
        if self.is_orchestrator() {
            tools.push(Arc::new(TransferTool::new(
                Arc::clone(&self.team),
                depth,
                self.max_transfer_depth,
            )));
        }
        tools
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("provider", &self.provider.name())
            .field("tools", &self.tools)
            .field("team", &self.team.names())
            .finish_non_exhaustive()
    }
}

pub struct AgentBuilder {
    name: String,
    instructions: String,
    model: String,
    provider: Option<Arc<dyn Provider>>,
    tools: Vec<Arc<dyn Tool>>,
    team: Vec<Arc<Agent>>,
    history: History,
    template_path: Option<PathBuf>,
    sandbox: SandboxOptions,
    max_transfer_depth: usize,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: String::new(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            tools: Vec::new(),
            team: Vec::new(),
            history: History::new(),
            template_path: None,
            sandbox: SandboxOptions::default(),
            max_transfer_depth: DEFAULT_MAX_TRANSFER_DEPTH,
        }
    }

    pub fn config(mut self, config: &Config) -> Self {
        self.model = config.model.clone();
        self.template_path = config.system_prompt_path.clone();
        self.sandbox = SandboxOptions::from(&config.sandbox);
        self.max_transfer_depth = config.max_transfer_depth;
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn teammate(mut self, agent: Arc<Agent>) -> Self {
        self.team.push(agent);
        self
    }

    pub fn history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn sandbox(mut self, options: SandboxOptions) -> Self {
        self.sandbox = options;
        self
    }

    pub fn max_transfer_depth(mut self, depth: usize) -> Self {
        self.max_transfer_depth = depth;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| Error::config(format!("agent '{}' has no provider", self.name)))?;

        let mut tools = ToolRegistry::new();
        for tool in self.tools {
            tools.register(tool)?;
        }
        let team = TeamRegistry::new(self.team)?;

        Ok(Agent {
            name: self.name,
            instructions: self.instructions,
            model: self.model,
            provider,
            tools,
            team: Arc::new(team),
            history: self.history,
            template_path: self.template_path,
            sandbox: self.sandbox,
            max_transfer_depth: self.max_transfer_depth,
        })
    }
}
