//! The agent control loop.
//!
//! Each turn queries the model with the full history, records its raw output,
//! parses it, dispatches at most one action and records the observation. The
//! loop ends when the model gives a final answer, when the turn budget runs
//! out, or when code cannot be executed at all.

use super::dispatch::{select, Dispatch};
use super::state::{AbortReason, LoopState, Outcome, RunStatus};
use crate::action::{ActionKind, ActionRequest, ActionResult};
use crate::config::AgentConfig;
use crate::conversation::{ConversationState, Role};
use crate::error::CodeActError;
use crate::execution::ExecutionPort;
use crate::model::ModelProvider;
use crate::parser::{ActionParser, ParsedOutput};
use crate::research::{render_observation, ResearchPort, ResiliencePolicy, ResilientResearch};
use crate::types::RunId;
use serde_json::json;
use std::sync::Arc;

/// Note recorded when a turn neither acts nor answers.
pub const NO_ACTION_NOTE: &str = "Observation: No specific action taken. Please proceed.";

/// Prefix of the final text of a completed run.
pub const FINISHED_PREFIX: &str = "Task Finished. Final Answer: ";

/// Final text of a run that used its whole turn budget.
pub const MAX_TURNS_TEXT: &str = "Agent stopped: Max turns reached.";

/// The collaborators a controller drives.
#[derive(Debug, Clone)]
pub struct AgentDependencies {
    /// Produces the next model output from the history
    pub model: Arc<dyn ModelProvider>,
    /// Runs `<code>` payloads
    pub executor: Arc<dyn ExecutionPort>,
    /// Serves `<search>`, `<navigate>` and `<research>` payloads; the
    /// controller adds retries, timeouts and caching on top
    pub research: Arc<dyn ResearchPort>,
}

impl AgentDependencies {
    /// Bundles the three collaborators.
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelProvider>,
        executor: Arc<dyn ExecutionPort>,
        research: Arc<dyn ResearchPort>,
    ) -> Self {
        Self {
            model,
            executor,
            research,
        }
    }
}

/// What a single turn decided.
enum TurnResult {
    Continue,
    Finished(String),
    Abort(AbortReason),
}

/// Drives interactions between a model and the capability ports.
///
/// The configuration is validated once, at construction, and the research
/// port is wrapped in a [`ResilientResearch`] built from it. Each call to
/// [`run_interaction`](Self::run_interaction) starts from an empty history;
/// the research cache and error log persist across calls.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use codeact::agent::{AgentController, AgentDependencies};
/// use codeact::config::AgentConfig;
/// use codeact::execution::ProcessExecutor;
/// use codeact::model::ScriptedModel;
/// use codeact::research::SimulatedResearch;
///
/// # tokio_test::block_on(async {
/// let deps = AgentDependencies::new(
///     Arc::new(ScriptedModel::new(["<solution>42</solution>"])),
///     Arc::new(ProcessExecutor::new()),
///     Arc::new(SimulatedResearch::new()),
/// );
/// let controller = AgentController::new(deps, AgentConfig::default()).unwrap();
/// let outcome = controller.run_interaction("What is six times seven?").await;
///
/// assert!(outcome.is_completed());
/// assert_eq!(outcome.final_text, "Task Finished. Final Answer: 42");
/// # });
/// ```
#[derive(Debug)]
pub struct AgentController {
    model: Arc<dyn ModelProvider>,
    executor: Arc<dyn ExecutionPort>,
    research: ResilientResearch<Arc<dyn ResearchPort>>,
    config: AgentConfig,
    parser: ActionParser,
}

impl AgentController {
    /// Creates a controller.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(deps: AgentDependencies, config: AgentConfig) -> Result<Self, CodeActError> {
        config.validate()?;
        let policy = ResiliencePolicy::from_config(&config);
        Ok(Self {
            model: deps.model,
            executor: deps.executor,
            research: ResilientResearch::new(deps.research, policy),
            config,
            parser: ActionParser::new(),
        })
    }

    /// The configuration this controller runs with.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The decorated research port, for its error log and cache.
    #[must_use]
    pub fn research(&self) -> &ResilientResearch<Arc<dyn ResearchPort>> {
        &self.research
    }

    /// Runs one interaction to a terminal state.
    ///
    /// Always returns an [`Outcome`] carrying a non-empty final text and the
    /// complete history, whatever the terminal state.
    pub async fn run_interaction(&self, instruction: &str) -> Outcome {
        let run_id = RunId::new();
        let mut history = ConversationState::new();
        history.append(Role::User, instruction);

        tracing::info!(
            run_id = %run_id,
            max_turns = self.config.max_turns,
            research = self.config.enable_research,
            "interaction started"
        );

        let mut state = LoopState::Running;
        let mut turns_used = 0;
        let mut status = RunStatus::Aborted(AbortReason::TurnBudgetExhausted {
            max_turns: self.config.max_turns,
        });
        let mut final_text = MAX_TURNS_TEXT.to_string();

        while state == LoopState::Running && turns_used < self.config.max_turns {
            turns_used += 1;
            match self.turn(&run_id, turns_used, &mut history).await {
                TurnResult::Continue => {}
                TurnResult::Finished(answer) => {
                    final_text = format!("{FINISHED_PREFIX}{answer}");
                    status = RunStatus::Completed;
                    state = LoopState::Completed;
                }
                TurnResult::Abort(reason) => {
                    final_text = format!("Agent stopped: {reason}");
                    status = RunStatus::Aborted(reason);
                    state = LoopState::Aborted;
                }
            }
        }

        let degraded_actions = history
            .turns()
            .iter()
            .filter(|t| t.role == Role::Tool && t.metadata["degraded"] == true)
            .count();
        let degraded_actions = u32::try_from(degraded_actions).unwrap_or(u32::MAX);

        tracing::info!(
            run_id = %run_id,
            status = %status,
            turns = turns_used,
            history = history.len(),
            degraded_actions,
            "interaction ended"
        );

        Outcome {
            run_id,
            status,
            final_text,
            history: history.into_turns(),
            turns_used,
            degraded_actions,
        }
    }

    async fn turn(&self, run_id: &RunId, turn: u32, history: &mut ConversationState) -> TurnResult {
        tracing::debug!(run_id = %run_id, turn, "querying model");
        let raw = match self.model.generate(history.turns()).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::error!(run_id = %run_id, turn, error = %error, "model failed");
                return TurnResult::Abort(AbortReason::ModelFailure(error));
            }
        };

        let parsed = self.parser.parse(&raw);
        let selection = select(&parsed.actions, self.config.enable_research);
        for lost in &selection.discarded {
            tracing::debug!(
                run_id = %run_id,
                turn,
                kind = %lost.kind,
                "discarding action; only one action runs per turn"
            );
        }

        history.append_with(
            Role::Assistant,
            raw.as_str(),
            json!({
                "turn": turn,
                "actions": parsed.actions.iter().map(|a| a.kind).collect::<Vec<_>>(),
                "dispatched": selection.dispatch.request().map(|r| r.kind),
                "discarded": selection.discarded.iter().map(|r| r.raw_span.as_str()).collect::<Vec<_>>(),
                "solution": parsed.solution.is_some(),
            }),
        );

        match selection.dispatch {
            Dispatch::Execute(request) => self.execute(run_id, turn, request, history).await,
            Dispatch::Research(request) => {
                self.run_research(run_id, turn, request, history).await;
                TurnResult::Continue
            }
            Dispatch::Suppressed(request) => {
                tracing::info!(run_id = %run_id, turn, kind = %request.kind, "research disabled; not dispatched");
                history.append_with(
                    Role::Tool,
                    format!(
                        "Research is disabled; this request was not executed:\n{}",
                        request.raw_span
                    ),
                    json!({ "kind": request.kind, "dispatched": false }),
                );
                Self::settle(&parsed)
            }
            Dispatch::Idle => {
                let settled = Self::settle(&parsed);
                if matches!(settled, TurnResult::Continue) {
                    tracing::warn!(run_id = %run_id, turn, "model gave no action or final answer");
                    history.append_with(
                        Role::Tool,
                        NO_ACTION_NOTE,
                        json!({ "kind": ActionKind::None, "dispatched": false }),
                    );
                }
                settled
            }
        }
    }

    /// Decides completion for a turn that dispatched nothing.
    fn settle(parsed: &ParsedOutput) -> TurnResult {
        if let Some(answer) = &parsed.solution {
            return TurnResult::Finished(answer.clone());
        }
        if !parsed.has_tags() && !parsed.leftover.is_empty() {
            return TurnResult::Finished(parsed.leftover.clone());
        }
        TurnResult::Continue
    }

    async fn execute(
        &self,
        run_id: &RunId,
        turn: u32,
        request: &ActionRequest,
        history: &mut ConversationState,
    ) -> TurnResult {
        tracing::info!(run_id = %run_id, turn, bytes = request.payload.len(), "executing code");
        match self.executor.execute(&request.payload).await {
            Ok(output) => {
                Self::record(history, request.kind, output.into_action_result());
                TurnResult::Continue
            }
            Err(error) if error.is_fatal() => {
                tracing::error!(run_id = %run_id, turn, error = %error, "execution environment failed");
                history.append_with(
                    Role::Tool,
                    format!("Observation: Code could not be executed: {error}"),
                    json!({ "kind": request.kind, "success": false, "fatal": true }),
                );
                TurnResult::Abort(AbortReason::FatalExecution(error))
            }
            Err(error) => {
                tracing::warn!(run_id = %run_id, turn, error = %error, "execution failed");
                history.append_with(
                    Role::Tool,
                    format!("Observation: Code execution failed.\n{error}"),
                    json!({ "kind": request.kind, "success": false, "fatal": false }),
                );
                TurnResult::Continue
            }
        }
    }

    async fn run_research(
        &self,
        run_id: &RunId,
        turn: u32,
        request: &ActionRequest,
        history: &mut ConversationState,
    ) {
        let port = &self.research;
        let payload = request.payload.as_str();
        tracing::info!(run_id = %run_id, turn, kind = %request.kind, payload, "dispatching research");

        let result = match request.kind {
            ActionKind::Search => port.search(payload).await,
            ActionKind::Navigate => port.navigate(payload).await,
            _ => port.execute_research_plan(payload).await,
        };

        match result {
            Ok(result) => Self::record(history, request.kind, result),
            Err(error) => {
                tracing::warn!(run_id = %run_id, turn, error = %error, "research failed");
                let current = port.current_url().await;
                history.append_with(
                    Role::Tool,
                    render_observation(Err(&error.to_string()), current.as_deref(), &[]),
                    json!({ "kind": request.kind, "success": false }),
                );
            }
        }
    }

    /// Appends a tool turn whose content is the result's output verbatim.
    fn record(history: &mut ConversationState, kind: ActionKind, result: ActionResult) {
        let metadata = json!({
            "kind": kind,
            "success": result.success,
            "source": result.source.to_string(),
            "degraded": result.is_degraded(),
            "error": result.error.as_ref().map(ToString::to_string),
        });
        history.append_with(Role::Tool, result.output, metadata);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityError;
    use crate::execution::ExecutionOutput;
    use crate::model::ScriptedModel;
    use crate::research::SimulatedResearch;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingExecutor {
        runs: Mutex<Vec<String>>,
        fatal: bool,
    }

    #[async_trait]
    impl ExecutionPort for RecordingExecutor {
        async fn execute(&self, code: &str) -> Result<ExecutionOutput, CapabilityError> {
            self.runs.lock().unwrap().push(code.to_string());
            if self.fatal {
                return Err(CapabilityError::fatal_execution("interpreter missing"));
            }
            Ok(ExecutionOutput::exited("ok\n", "", 0))
        }
    }

    fn controller(
        responses: &[&str],
        executor: Arc<RecordingExecutor>,
        config: AgentConfig,
    ) -> AgentController {
        let deps = AgentDependencies::new(
            Arc::new(ScriptedModel::new(responses.iter().copied())),
            executor,
            Arc::new(SimulatedResearch::new()),
        );
        AgentController::new(deps, config).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let deps = AgentDependencies::new(
            Arc::new(ScriptedModel::new(Vec::<String>::new())),
            Arc::new(RecordingExecutor::default()),
            Arc::new(SimulatedResearch::new()),
        );
        let err = AgentController::new(deps, AgentConfig::new().with_max_turns(0)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn code_then_solution() {
        let executor = Arc::new(RecordingExecutor::default());
        let controller = controller(
            &["<code>print('ok')</code>", "<solution>done</solution>"],
            executor.clone(),
            AgentConfig::default(),
        );

        let outcome = controller.run_interaction("say ok").await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.final_text, "Task Finished. Final Answer: done");
        assert_eq!(outcome.turns_used, 2);
        assert_eq!(*executor.runs.lock().unwrap(), vec!["print('ok')".to_string()]);

        let roles: Vec<Role> = outcome.history.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn solution_with_action_keeps_running() {
        let executor = Arc::new(RecordingExecutor::default());
        let controller = controller(
            &[
                "<code>print(1)</code><solution>early</solution>",
                "<solution>late</solution>",
            ],
            executor.clone(),
            AgentConfig::default(),
        );

        let outcome = controller.run_interaction("go").await;

        assert_eq!(outcome.final_text, "Task Finished. Final Answer: late");
        assert_eq!(executor.runs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn untagged_text_is_the_final_answer() {
        let controller = controller(
            &["The answer is 4."],
            Arc::new(RecordingExecutor::default()),
            AgentConfig::default(),
        );

        let outcome = controller.run_interaction("2 + 2?").await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.final_text, "Task Finished. Final Answer: The answer is 4.");
    }

    #[tokio::test]
    async fn thought_only_adds_a_note_and_continues() {
        let controller = controller(
            &["<thought>thinking</thought>", "<solution>ok</solution>"],
            Arc::new(RecordingExecutor::default()),
            AgentConfig::default(),
        );

        let outcome = controller.run_interaction("go").await;

        assert!(outcome.is_completed());
        let notes: Vec<&str> = outcome
            .turns_by(Role::Tool)
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(notes, vec![NO_ACTION_NOTE]);
    }

    #[tokio::test]
    async fn fatal_execution_aborts() {
        let executor = Arc::new(RecordingExecutor {
            fatal: true,
            ..Default::default()
        });
        let controller = controller(
            &["<code>print(1)</code>", "<solution>never</solution>"],
            executor,
            AgentConfig::default(),
        );

        let outcome = controller.run_interaction("go").await;

        assert!(matches!(
            outcome.status,
            RunStatus::Aborted(AbortReason::FatalExecution(_))
        ));
        assert_eq!(outcome.turns_used, 1);
        assert!(outcome.final_text.contains("interpreter missing"));
    }

    #[tokio::test]
    async fn model_failure_aborts() {
        let controller = controller(
            &["<thought>one</thought>"],
            Arc::new(RecordingExecutor::default()),
            AgentConfig::default(),
        );

        let outcome = controller.run_interaction("go").await;

        assert!(matches!(
            outcome.status,
            RunStatus::Aborted(AbortReason::ModelFailure(_))
        ));
        assert_eq!(outcome.turns_used, 2);
        assert!(outcome.final_text.starts_with("Agent stopped: model failure"));
    }

    #[tokio::test]
    async fn page_budget_comes_from_config() {
        let controller = controller(
            &[
                "<research>\nNavigate to https://x.example/1\nNavigate to https://x.example/2\nNavigate to https://x.example/3\n</research>",
                "<solution>partial</solution>",
            ],
            Arc::new(RecordingExecutor::default()),
            AgentConfig::new().with_max_pages_per_task(1),
        );

        let outcome = controller.run_interaction("read three pages").await;
        let tool = outcome.turns_by(Role::Tool).next().unwrap();

        assert_eq!(tool.metadata["success"], false);
        assert!(tool.content.contains("completed 1 of 3 steps"));
        assert!(!tool.content.contains("https://x.example/2"));
        assert!(!outcome.is_degraded());
    }

    #[tokio::test]
    async fn research_cache_is_reachable_from_the_controller() {
        let controller = controller(
            &["<search>rust</search>", "<solution>a</solution>"],
            Arc::new(RecordingExecutor::default()),
            AgentConfig::default(),
        );

        controller.run_interaction("first").await;
        assert_eq!(controller.research().cache_len().await, 1);
        assert!(controller.research().get_error_log().await.is_empty());
    }

    #[tokio::test]
    async fn assistant_metadata_lists_discarded_actions() {
        let controller = controller(
            &["<search>a</search><code>print(1)</code>", "<solution>x</solution>"],
            Arc::new(RecordingExecutor::default()),
            AgentConfig::default(),
        );

        let outcome = controller.run_interaction("go").await;
        let first = outcome.turns_by(Role::Assistant).next().unwrap();

        assert_eq!(first.metadata["dispatched"], "code");
        assert_eq!(first.metadata["discarded"][0], "<search>a</search>");
    }
}
