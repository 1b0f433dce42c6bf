//! The capture -> decide -> execute loop.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::artifacts::ScreenshotStore;
use crate::brain::{Conversation, Model};
use crate::decode::decode_response;
use crate::error::AgentError;
use crate::executor::execute;
use crate::hands::{Session, SessionProvider};
use crate::prompts::{SYSTEM_PROMPT, observation_text};
use crate::report::{self, TaskReport};
use crate::types::{Continuation, DEFAULT_MAX_STEPS, DEFAULT_START_URL};
use crate::workflow::{NoWorkflow, WorkflowPolicy};

/// Progress events for whoever is watching the run.
#[derive(Clone, Debug)]
pub enum AgentEvent {
    Step { number: usize, decision: String },
    StepSkipped { number: usize, message: String },
    TaskComplete { result: String },
    TaskError { message: String },
    StepLimit { max_steps: usize },
}

#[derive(Debug, Clone)]
pub struct Task {
    pub description: String,
    /// Scheme optional; `https://` is assumed.
    pub start_url: String,
    pub max_steps: usize,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            start_url: DEFAULT_START_URL.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentOptions {
    /// Pause after the initial navigation.
    pub settle_delay: Duration,
    /// Pause between steps.
    pub step_delay: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            step_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub enum Termination {
    /// The model returned `done`.
    Success { result: String, report: TaskReport },
    Aborted(AgentError),
    /// The step budget ran out.
    Exhausted,
}

/// Outcome of one task.
#[derive(Debug)]
pub struct TaskRun {
    pub session_id: Option<String>,
    /// Steps started, including the one that ended the run.
    pub steps: usize,
    pub termination: Termination,
    pub conversation: Conversation,
}

impl TaskRun {
    pub fn is_success(&self) -> bool {
        matches!(self.termination, Termination::Success { .. })
    }
}

pub struct Agent {
    provider: Box<dyn SessionProvider>,
    model: Box<dyn Model>,
    workflow: Box<dyn WorkflowPolicy>,
    screenshots: Option<ScreenshotStore>,
    events: Option<UnboundedSender<AgentEvent>>,
    options: AgentOptions,
}

impl Agent {
    pub fn new(provider: Box<dyn SessionProvider>, model: Box<dyn Model>) -> Self {
        Self {
            provider,
            model,
            workflow: Box::new(NoWorkflow),
            screenshots: None,
            events: None,
            options: AgentOptions::default(),
        }
    }

    pub fn with_workflow(mut self, workflow: Box<dyn WorkflowPolicy>) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn with_screenshots(mut self, store: ScreenshotStore) -> Self {
        self.screenshots = Some(store);
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one task to completion. The session, once acquired, is closed
    /// exactly once whatever happens.
    pub async fn run(&mut self, task: &Task) -> TaskRun {
        let mut conversation = Conversation::default();
        let mut steps = 0;

        info!("[Agent] Acquiring session...");
        let mut session = match self.provider.create().await {
            Ok(session) => session,
            Err(e) => {
                let error = AgentError::SessionAcquisition(e);
                self.emit(AgentEvent::TaskError {
                    message: error.to_string(),
                });
                return TaskRun {
                    session_id: None,
                    steps,
                    termination: Termination::Aborted(error),
                    conversation,
                };
            }
        };
        let session_id = session.id().to_string();

        let driven =
            AssertUnwindSafe(self.drive(session.as_mut(), task, &mut conversation, &mut steps))
                .catch_unwind()
                .await;
        let termination = match driven {
            Ok(outcome) => outcome.unwrap_or_else(Termination::Aborted),
            Err(panic) => {
                warn!("[Agent] Run panicked; releasing session {}", session_id);
                if let Err(e) = session.close().await {
                    warn!("[Agent] Failed to close session {}: {}", session_id, e);
                }
                std::panic::resume_unwind(panic);
            }
        };

        match &termination {
            Termination::Success { result, .. } => self.emit(AgentEvent::TaskComplete {
                result: result.clone(),
            }),
            Termination::Aborted(e) => self.emit(AgentEvent::TaskError {
                message: e.to_string(),
            }),
            Termination::Exhausted => self.emit(AgentEvent::StepLimit {
                max_steps: task.max_steps,
            }),
        }

        if let Err(e) = session.close().await {
            warn!("[Agent] Failed to close session {}: {}", session_id, e);
        }

        TaskRun {
            session_id: Some(session_id),
            steps,
            termination,
            conversation,
        }
    }

    async fn drive(
        &mut self,
        session: &mut dyn Session,
        task: &Task,
        conversation: &mut Conversation,
        steps: &mut usize,
    ) -> Result<Termination, AgentError> {
        let start_url = with_scheme(&task.start_url);
        info!("[Agent] Navigating to {}", start_url);
        session
            .navigate(&start_url)
            .await
            .map_err(|source| AgentError::Navigation {
                url: start_url.clone(),
                source,
            })?;
        tokio::time::sleep(self.options.settle_delay).await;

        let mut system_prompt = SYSTEM_PROMPT.to_string();
        if let Some(guidance) = self.workflow.guidance(&task.description) {
            debug!("[Agent] Adding workflow guidance to the system prompt");
            system_prompt.push_str(&guidance);
        }
        *conversation = Conversation::new(system_prompt);

        let mut note: Option<String> = None;
        for step in 1..=task.max_steps {
            *steps = step;

            let shot = session
                .screenshot()
                .await
                .map_err(|source| AgentError::Capture { step, source })?;
            self.persist(session.id(), step, &shot.image_url).await;

            conversation.push_observation(
                observation_text(
                    &task.description,
                    shot.viewport.width,
                    shot.viewport.height,
                    note.take().as_deref(),
                ),
                shot.image_url.clone(),
            );

            let decision = self
                .model
                .decide(conversation)
                .await
                .map_err(AgentError::Model)?;
            info!("[Agent] Step {}: {}", step, decision);
            self.emit(AgentEvent::Step {
                number: step,
                decision: decision.clone(),
            });
            conversation.push_assistant(decision.clone());

            match decode_response(&decision) {
                Ok(action) => match execute(session, &action, shot.viewport).await {
                    Ok(Continuation::Stop { result }) => {
                        let report = report::extract(&result);
                        return Ok(Termination::Success { result, report });
                    }
                    Ok(Continuation::Continue) => {}
                    Err(e) if e.is_rejection() => {
                        let message = format!("`{}` failed: {}", action.name(), e);
                        warn!("[Agent] Step {}: {}", step, message);
                        self.emit(AgentEvent::StepSkipped {
                            number: step,
                            message: message.clone(),
                        });
                        note = Some(message);
                    }
                    Err(source) => {
                        return Err(AgentError::Session {
                            step,
                            action: action.name().to_string(),
                            source,
                        });
                    }
                },
                Err(e) if e.is_fatal() => {
                    return Err(AgentError::MalformedResponse {
                        step,
                        text: decision,
                    });
                }
                Err(e) => {
                    let message = format!("not executed: {e}");
                    warn!("[Agent] Step {}: {}", step, message);
                    self.emit(AgentEvent::StepSkipped {
                        number: step,
                        message: message.clone(),
                    });
                    note = Some(message);
                }
            }

            tokio::time::sleep(self.options.step_delay).await;
        }

        info!("[Agent] Step limit ({}) reached", task.max_steps);
        Ok(Termination::Exhausted)
    }

    async fn persist(&self, session_id: &str, step: usize, image_url: &str) {
        let Some(store) = &self.screenshots else {
            return;
        };
        match store.save(session_id, step, image_url).await {
            Ok(path) => debug!("[Agent] Saved screenshot {}", path.display()),
            Err(e) => warn!("[Agent] Could not save screenshot for step {}: {:#}", step, e),
        }
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Prefix `https://` when the URL carries no scheme.
pub fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_https_only_when_missing() {
        assert_eq!(with_scheme("example.com"), "https://example.com");
        assert_eq!(with_scheme(" example.com/path "), "https://example.com/path");
        assert_eq!(with_scheme("http://example.com"), "http://example.com");
        assert_eq!(with_scheme("https://example.com"), "https://example.com");
        assert_eq!(with_scheme("about:blank"), "about:blank");
    }
}
