pub mod agent;
pub mod context;
pub mod error;
pub mod flow;
pub mod runner;
pub mod storage;

// Re-export commonly used types
pub use agent::{Agent, AgentResult, NextAction};
pub use context::{ChatMessage, ChatRole, Context};
pub use error::{FlowError, Result};
pub use flow::{ExecutionResult, ExecutionStatus, Flow, FlowBuilder};
pub use runner::FlowRunner;
pub use storage::{InMemorySessionStorage, Session, SessionStorage};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        fn id(&self) -> &str {
            "echo"
        }

        async fn run(&self, context: Context) -> Result<AgentResult> {
            let input: String = context.get("input").await.unwrap_or_default();
            context.set("output", format!("Processed: {input}")).await;

            Ok(AgentResult::new(
                Some("done".to_string()),
                NextAction::End,
            ))
        }
    }

    /// Routes to `ask` or `finish` based on a flag set by the caller
    struct RouterAgent;

    #[async_trait]
    impl Agent for RouterAgent {
        fn id(&self) -> &str {
            "router"
        }

        async fn run(&self, _context: Context) -> Result<AgentResult> {
            Ok(AgentResult::new(None, NextAction::ContinueAndExecute))
        }
    }

    /// Replies with a question and parks the session back at the router
    struct AskAgent;

    #[async_trait]
    impl Agent for AskAgent {
        fn id(&self) -> &str {
            "ask"
        }

        async fn run(&self, _context: Context) -> Result<AgentResult> {
            Ok(AgentResult::new(
                Some("tell me more?".to_string()),
                NextAction::GoTo("router".to_string()),
            ))
        }
    }

    struct FinishAgent;

    #[async_trait]
    impl Agent for FinishAgent {
        fn id(&self) -> &str {
            "finish"
        }

        async fn run(&self, _context: Context) -> Result<AgentResult> {
            Ok(AgentResult::new_with_status(
                Some("all done".to_string()),
                NextAction::End,
                Some("flow finished".to_string()),
            ))
        }
    }

    fn routed_flow() -> Flow {
        FlowBuilder::new("routed")
            .add_agent(Arc::new(RouterAgent))
            .add_agent(Arc::new(AskAgent))
            .add_agent(Arc::new(FinishAgent))
            .add_conditional_edge(
                "router",
                |ctx| ctx.get_sync::<bool>("needs_more").unwrap_or(true),
                "ask",
                "finish",
            )
            .build()
    }

    #[tokio::test]
    async fn test_single_step_execution() {
        let flow = FlowBuilder::new("echo_flow")
            .add_agent(Arc::new(EchoAgent))
            .build();

        let mut session = Session::new_from_agent("s1".to_string(), "echo");
        session.context.set("input", "hello").await;

        let result = flow.execute_session(&mut session).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.response.as_deref(), Some("done"));

        let output: String = session.context.get("output").await.unwrap();
        assert_eq!(output, "Processed: hello");
    }

    #[tokio::test]
    async fn test_conditional_routing_and_goto_parks_session() {
        let flow = routed_flow();
        let mut session = Session::new_from_agent("s1".to_string(), "router");
        session.context.set("needs_more", true).await;

        // Router continues into AskAgent, which replies and parks us back at the router
        let result = flow.execute_session(&mut session).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert_eq!(result.response.as_deref(), Some("tell me more?"));
        assert_eq!(session.current_agent_id, "router");

        // Flip the flag: next step should run straight through to FinishAgent
        session.context.set("needs_more", false).await;
        let result = flow.execute_session(&mut session).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.response.as_deref(), Some("all done"));
        assert_eq!(session.status_message.as_deref(), Some("flow finished"));
    }

    #[tokio::test]
    async fn test_unknown_goto_target_errors() {
        struct LostAgent;

        #[async_trait]
        impl Agent for LostAgent {
            fn id(&self) -> &str {
                "lost"
            }

            async fn run(&self, _context: Context) -> Result<AgentResult> {
                Ok(AgentResult::new(
                    None,
                    NextAction::GoTo("nowhere".to_string()),
                ))
            }
        }

        let flow = FlowBuilder::new("broken")
            .add_agent(Arc::new(LostAgent))
            .build();
        let mut session = Session::new_from_agent("s1".to_string(), "lost");

        let err = flow.execute_session(&mut session).await.unwrap_err();
        assert!(matches!(err, FlowError::AgentNotFound(id) if id == "nowhere"));
    }

    #[tokio::test]
    async fn test_session_storage_roundtrip() {
        let storage = InMemorySessionStorage::new();

        let session = Session::new_from_agent("session1".to_string(), "router");
        session.context.add_patient_message("I have a headache").await;
        storage.save(session.clone()).await.unwrap();

        let retrieved = storage.get("session1").await.unwrap().unwrap();
        assert_eq!(retrieved.current_agent_id, "router");
        assert_eq!(
            retrieved.context.patient_messages(),
            vec!["I have a headache".to_string()]
        );

        storage.delete("session1").await.unwrap();
        assert!(storage.get("session1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_flow_runner_persists_between_steps() {
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
        let flow = Arc::new(routed_flow());
        let runner = FlowRunner::new(flow, storage.clone());

        let session = Session::new_from_agent("s1".to_string(), "router");
        session.context.set("needs_more", true).await;
        storage.save(session).await.unwrap();

        let result = runner.run("s1").await.unwrap();
        assert_eq!(result.status, ExecutionStatus::WaitingForInput);

        // The parked position survived the save/load roundtrip
        let stored = storage.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.current_agent_id, "router");

        let err = runner.run("missing").await.unwrap_err();
        assert!(matches!(err, FlowError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn test_transcript_views() {
        let context = Context::new();
        context.add_patient_message("I have a cough").await;
        context.add_assistant_message("How long has it lasted?").await;
        context.add_patient_message("About a week").await;

        assert_eq!(context.patient_turns(), 2);
        assert_eq!(
            context.patient_messages(),
            vec!["I have a cough".to_string(), "About a week".to_string()]
        );

        let recent = context.recent_transcript(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].role, ChatRole::Assistant);
        assert_eq!(recent[1].content, "About a week");
    }
}
