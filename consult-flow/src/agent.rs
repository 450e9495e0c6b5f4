use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::Result};

/// Result of a single agent step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// Response to send to the user, if any
    pub response: Option<String>,
    /// What the flow should do next
    pub next_action: NextAction,
    /// Optional progress note persisted on the session
    pub status_message: Option<String>,
    /// Filled in by the flow to track which agent produced this result
    #[serde(default)]
    pub agent_id: String,
}

impl AgentResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            status_message: None,
            agent_id: String::new(),
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            response,
            next_action,
            status_message,
            agent_id: String::new(),
        }
    }
}

/// Defines what should happen after an agent completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NextAction {
    /// Advance to the next agent along the edges, then wait for input
    Continue,
    /// Advance to the next agent and execute it immediately
    ContinueAndExecute,
    /// Park the session at a specific agent and wait for input
    GoTo(String),
    /// Stay at the current agent and wait for user input
    WaitForInput,
    /// End the flow
    End,
}

/// Core trait implemented by every conversational agent
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique identifier for this agent within a flow
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Execute one step with the shared session context
    async fn run(&self, context: Context) -> Result<AgentResult>;
}
