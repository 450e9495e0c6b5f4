use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::{
    agent::{Agent, AgentResult, NextAction},
    context::Context,
    error::{FlowError, Result},
    storage::Session,
};

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Edge between agents in the flow. A conditional edge routes to `to` when the
/// condition holds and to `otherwise` when it does not.
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
    pub otherwise: Option<String>,
}

/// A directed graph of conversational agents executed one session step at a time
pub struct Flow {
    pub id: String,
    agents: DashMap<String, Arc<dyn Agent>>,
    edges: Mutex<Vec<Edge>>,
    start_agent_id: Mutex<Option<String>>,
}

impl Flow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agents: DashMap::new(),
            edges: Mutex::new(Vec::new()),
            start_agent_id: Mutex::new(None),
        }
    }

    /// Add an agent to the flow. The first agent added becomes the start agent.
    pub fn add_agent(&self, agent: Arc<dyn Agent>) -> &Self {
        let agent_id = agent.id().to_string();
        let is_first = self.agents.is_empty();
        self.agents.insert(agent_id.clone(), agent);

        if is_first {
            *self.start_agent_id.lock().unwrap() = Some(agent_id);
        }

        self
    }

    pub fn set_start_agent(&self, agent_id: impl Into<String>) -> &Self {
        let agent_id = agent_id.into();
        if self.agents.contains_key(&agent_id) {
            *self.start_agent_id.lock().unwrap() = Some(agent_id);
        }
        self
    }

    pub fn add_edge(&self, from: impl Into<String>, to: impl Into<String>) -> &Self {
        self.edges.lock().unwrap().push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
            otherwise: None,
        });
        self
    }

    /// Add a conditional edge: route to `to` when the condition holds,
    /// to `otherwise` when it does not.
    pub fn add_conditional_edge<F>(
        &self,
        from: impl Into<String>,
        condition: F,
        to: impl Into<String>,
        otherwise: impl Into<String>,
    ) -> &Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.edges.lock().unwrap().push(Edge {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
            otherwise: Some(otherwise.into()),
        });
        self
    }

    /// Execute exactly one step of the flow for the given session, updating the
    /// session's current agent according to the returned [`NextAction`].
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        let result = self
            .execute_single_agent(&session.current_agent_id, session.context.clone())
            .await?;

        session.status_message = result.status_message.clone();

        match &result.next_action {
            NextAction::Continue => {
                if let Some(next_agent_id) = self.find_next_agent(&result.agent_id, &session.context)
                {
                    session.current_agent_id = next_agent_id;
                } else {
                    session.current_agent_id = result.agent_id.clone();
                }

                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::WaitingForInput,
                })
            }
            NextAction::ContinueAndExecute => {
                if let Some(next_agent_id) = self.find_next_agent(&result.agent_id, &session.context)
                {
                    debug!(
                        from = %result.agent_id,
                        to = %next_agent_id,
                        "continuing execution with next agent"
                    );
                    session.current_agent_id = next_agent_id;
                    // Recurse in session mode so context updates stay visible
                    return Box::pin(self.execute_session(session)).await;
                }

                session.current_agent_id = result.agent_id.clone();
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::WaitingForInput,
                })
            }
            NextAction::GoTo(target_id) => {
                if self.agents.contains_key(target_id) {
                    session.current_agent_id = target_id.clone();
                    Ok(ExecutionResult {
                        response: result.response,
                        status: ExecutionStatus::WaitingForInput,
                    })
                } else {
                    Err(FlowError::AgentNotFound(target_id.clone()))
                }
            }
            NextAction::WaitForInput => {
                session.current_agent_id = result.agent_id.clone();
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::WaitingForInput,
                })
            }
            NextAction::End => {
                session.current_agent_id = result.agent_id.clone();
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::Completed,
                })
            }
        }
    }

    async fn execute_single_agent(&self, agent_id: &str, context: Context) -> Result<AgentResult> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| FlowError::AgentNotFound(agent_id.to_string()))?;

        let mut result = agent.run(context).await?;
        result.agent_id = agent_id.to_string();

        Ok(result)
    }

    /// Find the next agent based on edges and conditions
    pub fn find_next_agent(&self, current_agent_id: &str, context: &Context) -> Option<String> {
        let edges = self.edges.lock().unwrap();

        for edge in edges.iter() {
            if edge.from != current_agent_id {
                continue;
            }
            match &edge.condition {
                Some(condition) => {
                    if condition(context) {
                        return Some(edge.to.clone());
                    }
                    if let Some(otherwise) = &edge.otherwise {
                        return Some(otherwise.clone());
                    }
                }
                None => return Some(edge.to.clone()),
            }
        }
        None
    }

    pub fn start_agent_id(&self) -> Option<String> {
        self.start_agent_id.lock().unwrap().clone()
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(agent_id).map(|entry| entry.clone())
    }
}

/// Builder for creating flows
pub struct FlowBuilder {
    flow: Flow,
}

impl FlowBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            flow: Flow::new(id),
        }
    }

    pub fn add_agent(self, agent: Arc<dyn Agent>) -> Self {
        self.flow.add_agent(agent);
        self
    }

    pub fn add_edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.flow.add_edge(from, to);
        self
    }

    pub fn add_conditional_edge<F>(
        self,
        from: impl Into<String>,
        condition: F,
        to: impl Into<String>,
        otherwise: impl Into<String>,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.flow.add_conditional_edge(from, condition, to, otherwise);
        self
    }

    pub fn set_start_agent(self, agent_id: impl Into<String>) -> Self {
        self.flow.set_start_agent(agent_id);
        self
    }

    pub fn build(self) -> Flow {
        self.flow
    }
}

/// Outcome of one session step
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Waiting for user input to continue
    WaitingForInput,
    /// Flow completed
    Completed,
}
