use consult_flow::{Flow, FlowBuilder};
use std::sync::Arc;

use crate::agents::{
    QuestionAgent, ReportAgent, ValidationAgent, ValidationResult, session_keys,
};
use crate::agents::utils::Generator;

/// Build the consultation flow: every patient message enters at the validator,
/// which routes to the question generator while information is missing and to
/// the report generator once the conversation is complete. The question agent
/// parks the session back at the validator, so the gathering loop has exactly
/// two live states: waiting at the validator, or ended after the report.
pub fn build_consultation_flow(generator: Option<Arc<dyn Generator>>) -> Flow {
    FlowBuilder::new("medical_consultation")
        .add_agent(Arc::new(ValidationAgent::new(generator.clone())))
        .add_agent(Arc::new(QuestionAgent::new(generator.clone())))
        .add_agent(Arc::new(ReportAgent::new(generator)))
        .add_conditional_edge(
            ValidationAgent::ID,
            |context| {
                context
                    .get_sync::<ValidationResult>(session_keys::VALIDATION)
                    .map(|v| v.should_continue_asking)
                    .unwrap_or(true)
            },
            QuestionAgent::ID,
            ReportAgent::ID,
        )
        .set_start_agent(ValidationAgent::ID)
        .build()
}
