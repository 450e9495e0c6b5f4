use consult_flow::{ExecutionStatus, Flow, FlowError, FlowRunner, Session, SessionStorage};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::agents::utils::Generator;
use crate::agents::{
    HybridValidator, PatientContext, ReportAgent, ValidationAgent, ValidationResult, session_keys,
};
use crate::workflow::build_consultation_flow;

/// Opening line for a fresh consultation
pub const OPENING: &str = "Hello! I'm here to help assess your medical condition. \
Please start by telling me what brings you in today and what symptoms you're experiencing.";

/// Uniform response envelope returned to HTTP and CLI callers
#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub role: &'static str,
    pub content: String,
    pub completed: bool,
    pub metadata: serde_json::Value,
}

/// Snapshot of where a consultation stands
#[derive(Debug, Clone, Serialize)]
pub struct ConversationStatus {
    pub message_count: usize,
    pub validation: Option<ValidationResult>,
    pub is_complete: bool,
}

/// Facade over the consultation flow: one call per patient message, plus
/// status and stateless completeness checks for the API layer.
pub struct ConsultationManager {
    storage: Arc<dyn SessionStorage>,
    runner: FlowRunner,
    validator: HybridValidator,
}

impl ConsultationManager {
    pub fn new(generator: Option<Arc<dyn Generator>>, storage: Arc<dyn SessionStorage>) -> Self {
        let flow: Arc<Flow> = Arc::new(build_consultation_flow(generator.clone()));
        Self {
            runner: FlowRunner::new(flow, storage.clone()),
            storage,
            validator: HybridValidator::new(generator),
        }
    }

    /// Greeting shown before the first patient message
    pub fn start_conversation(&self) -> AgentReply {
        AgentReply {
            role: "assistant",
            content: OPENING.to_string(),
            completed: false,
            metadata: json!({ "agent": "system", "conversation_length": 0 }),
        }
    }

    /// Run one consultation turn: append the patient message, decide whether
    /// to keep asking, and return the follow-up question or the final report.
    pub async fn process_message(
        &self,
        session_id: &str,
        content: &str,
        patient_context: Option<PatientContext>,
    ) -> consult_flow::Result<AgentReply> {
        let session = match self.storage.get(session_id).await? {
            Some(session) => session,
            None => {
                info!(session_id = %session_id, "creating new consultation session");
                Session::new_from_agent(session_id.to_string(), ValidationAgent::ID)
            }
        };

        if let Some(patient_context) = patient_context {
            session
                .context
                .set(session_keys::PATIENT_CONTEXT, patient_context)
                .await;
        }
        session.context.set(session_keys::USER_INPUT, content).await;
        self.storage.save(session).await?;

        let result = self.runner.run(session_id).await?;

        let session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| FlowError::SessionNotFound(session_id.to_string()))?;
        let validation: Option<ValidationResult> =
            session.context.get(session_keys::VALIDATION).await;
        let completed = result.status == ExecutionStatus::Completed;

        Ok(AgentReply {
            role: "assistant",
            content: result.response.unwrap_or_else(|| OPENING.to_string()),
            completed,
            metadata: json!({
                "agent": if completed { ReportAgent::ID } else { "question_generator" },
                "conversation_length": session.context.patient_turns(),
                "validation": validation,
            }),
        })
    }

    /// Stateless completeness check over an arbitrary message history - the
    /// same verdict the flow's validation agent would produce.
    pub async fn evaluate_completeness(
        &self,
        history: &[String],
        patient_context: Option<&PatientContext>,
    ) -> ValidationResult {
        self.validator
            .evaluate_completeness(history, patient_context, None)
            .await
    }

    pub async fn session_exists(&self, session_id: &str) -> consult_flow::Result<bool> {
        Ok(self.storage.get(session_id).await?.is_some())
    }

    pub async fn conversation_status(
        &self,
        session_id: &str,
    ) -> consult_flow::Result<Option<ConversationStatus>> {
        let Some(session) = self.storage.get(session_id).await? else {
            return Ok(None);
        };

        let validation: Option<ValidationResult> =
            session.context.get(session_keys::VALIDATION).await;
        let is_complete = validation
            .as_ref()
            .map(|v| !v.should_continue_asking)
            .unwrap_or(false);

        Ok(Some(ConversationStatus {
            message_count: session.context.patient_turns(),
            validation,
            is_complete,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_flow::InMemorySessionStorage;

    fn manager() -> ConsultationManager {
        ConsultationManager::new(None, Arc::new(InMemorySessionStorage::new()))
    }

    #[tokio::test]
    async fn first_message_gets_a_follow_up_question() {
        let manager = manager();

        let reply = manager
            .process_message("s1", "I have a headache", None)
            .await
            .unwrap();

        assert!(!reply.completed);
        assert_eq!(reply.role, "assistant");
        assert!(reply.content.ends_with('?'));
        assert_eq!(reply.metadata["conversation_length"], 1);
    }

    #[tokio::test]
    async fn informative_conversation_ends_with_a_report() {
        let manager = manager();
        let turns = [
            "I have a headache",
            "started 3 days ago",
            "severe, 8 out of 10",
            "no other history",
        ];

        let mut last = None;
        for turn in turns {
            last = Some(manager.process_message("s1", turn, None).await.unwrap());
        }

        let reply = last.unwrap();
        assert!(reply.completed);
        assert!(reply.content.contains("MEDICAL ASSESSMENT REPORT"));

        let status = manager.conversation_status("s1").await.unwrap().unwrap();
        assert!(status.is_complete);
        assert_eq!(status.message_count, 4);
    }

    #[tokio::test]
    async fn patient_context_reaches_the_session() {
        let manager = manager();
        let patient = PatientContext {
            age: Some(31),
            ..Default::default()
        };

        manager
            .process_message("s1", "I feel dizzy", Some(patient))
            .await
            .unwrap();

        let status = manager.conversation_status("s1").await.unwrap().unwrap();
        assert_eq!(status.message_count, 1);
        assert!(!status.is_complete);
        assert!(status.validation.is_some());
    }

    #[tokio::test]
    async fn evaluate_completeness_matches_the_spec_example() {
        let manager = manager();

        let verdict = manager
            .evaluate_completeness(&["I have a headache".to_string()], None)
            .await;
        assert!(verdict.should_continue_asking);

        let history: Vec<String> = [
            "I have a headache",
            "started 3 days ago",
            "severe, 8 out of 10",
            "no other history",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let verdict = manager.evaluate_completeness(&history, None).await;
        assert!(!verdict.should_continue_asking);
    }

    #[tokio::test]
    async fn unknown_session_has_no_status() {
        let manager = manager();
        assert!(manager.conversation_status("nope").await.unwrap().is_none());
        assert!(!manager.session_exists("nope").await.unwrap());
    }

    #[test]
    fn opening_greets_the_patient() {
        let manager = manager();
        let reply = manager.start_conversation();
        assert!(!reply.completed);
        assert!(reply.content.contains("symptoms"));
    }
}
