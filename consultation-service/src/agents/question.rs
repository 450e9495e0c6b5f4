use async_trait::async_trait;
use consult_flow::{Agent, AgentResult, ChatRole, Context, NextAction};
use std::sync::Arc;
use tracing::{info, warn};

use super::types::{Category, PatientContext, ValidationResult, session_keys};
use super::utils::Generator;
use super::validation::ValidationAgent;

const QUESTION_PROMPT: &str = r#"You are a helpful medical assistant. Based on the patient conversation, generate ONE natural follow-up question to learn about the patient's {category}.

{profile}
Conversation so far:
{conversation}

Guidelines:
- Ask one clear, specific question
- Use simple, patient-friendly language
- Do not repeat questions already asked
- Be empathetic and supportive
- If asking about pain, ask for a scale of 1 to 10

Generate only the question, no explanation."#;

/// Static question per category, used whenever generation is unavailable or
/// fails. Total over [`Category`] by construction.
pub fn fallback_question(category: Category) -> &'static str {
    match category {
        Category::Symptoms => "Can you describe your main symptom in more detail?",
        Category::Duration => "When did you first notice this symptom?",
        Category::Severity => "On a scale of 1 to 10, how severe is it right now?",
        Category::Location => "Which part of your body is affected?",
        Category::History => "Do you have any medical conditions or take any medications?",
        Category::Additional => "Is there anything else about your condition I should know?",
    }
}

/// Pull one clean question out of raw model output: drop a "Question:" prefix,
/// take the first sentence containing a question mark, strip quotes. Returns
/// `None` when nothing usable is found.
fn extract_question(text: &str) -> Option<String> {
    let text = text
        .rsplit_once("Question:")
        .map(|(_, tail)| tail)
        .unwrap_or(text)
        .trim();

    for sentence in text.split('.') {
        if let Some(pos) = sentence.find('?') {
            let question = sentence[..=pos].trim().trim_matches(['"', '\'']).trim();
            if !question.is_empty() {
                return Some(question.to_string());
            }
        }
    }

    // No question mark anywhere: take the first non-empty line and add one
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = line.trim_matches(['"', '\'']);
    if line.is_empty() {
        return None;
    }
    Some(format!("{line}?"))
}

/// Generates the next follow-up question for the category the validator found
/// missing, falling back to the static table on any generation failure.
pub struct QuestionAgent {
    generator: Option<Arc<dyn Generator>>,
}

impl QuestionAgent {
    pub const ID: &'static str = "question";

    pub fn new(generator: Option<Arc<dyn Generator>>) -> Self {
        Self { generator }
    }

    pub async fn generate_question(
        &self,
        context: &Context,
        category: Category,
        patient_context: Option<&PatientContext>,
    ) -> String {
        let Some(generator) = &self.generator else {
            return fallback_question(category).to_string();
        };

        let conversation = context
            .recent_transcript(5)
            .iter()
            .map(|m| match m.role {
                ChatRole::Patient => format!("Patient: {}", m.content),
                ChatRole::Assistant => format!("Doctor: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let profile = patient_context.map(|c| c.summary()).unwrap_or_default();

        let prompt = QUESTION_PROMPT
            .replace("{category}", category.label())
            .replace("{profile}", &profile)
            .replace("{conversation}", &conversation);

        match generator.generate(&prompt, 100).await {
            Ok(response) => extract_question(&response).unwrap_or_else(|| {
                warn!("model output contained no usable question, using template");
                fallback_question(category).to_string()
            }),
            Err(e) => {
                warn!(error = %e, "question generation failed, using template");
                fallback_question(category).to_string()
            }
        }
    }
}

#[async_trait]
impl Agent for QuestionAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn run(&self, context: Context) -> consult_flow::Result<AgentResult> {
        let category = context
            .get::<ValidationResult>(session_keys::VALIDATION)
            .await
            .and_then(|v| v.missing_category)
            .unwrap_or(Category::Additional);
        let patient_context: Option<PatientContext> =
            context.get(session_keys::PATIENT_CONTEXT).await;

        let question = self
            .generate_question(&context, category, patient_context.as_ref())
            .await;

        info!(category = %category, "follow-up question ready");
        context.add_assistant_message(question.clone()).await;

        // Park the session back at the validator for the patient's answer
        Ok(AgentResult::new_with_status(
            Some(question),
            NextAction::GoTo(ValidationAgent::ID.to_string()),
            Some(format!("Asked about {category}")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::types::InformationStatus;

    struct StaticGenerator(String);

    #[async_trait]
    impl Generator for StaticGenerator {
        async fn generate(&self, _prompt: &str, _max_tokens: u64) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl Generator for FailingGenerator {
        async fn generate(&self, _prompt: &str, _max_tokens: u64) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("timeout"))
        }
    }

    #[test]
    fn fallback_table_covers_every_category() {
        for category in Category::ALL {
            let question = fallback_question(category);
            assert!(!question.is_empty());
            assert!(question.ends_with('?'), "{category} fallback is a question");
        }
    }

    #[test]
    fn extracts_first_question_sentence() {
        let text = "Question: Where exactly is the pain? It helps to know. Thanks.";
        assert_eq!(
            extract_question(text).as_deref(),
            Some("Where exactly is the pain?")
        );
    }

    #[test]
    fn appends_question_mark_to_plain_line() {
        assert_eq!(
            extract_question("\"How long has this been going on\"").as_deref(),
            Some("How long has this been going on?")
        );
        assert_eq!(extract_question("   \n  "), None);
    }

    #[tokio::test]
    async fn generation_failure_uses_template() {
        let agent = QuestionAgent::new(Some(Arc::new(FailingGenerator)));
        let context = Context::new();

        let question = agent
            .generate_question(&context, Category::Duration, None)
            .await;
        assert_eq!(question, fallback_question(Category::Duration));
    }

    #[tokio::test]
    async fn question_agent_replies_and_parks_at_validator() {
        let agent = QuestionAgent::new(Some(Arc::new(StaticGenerator(
            "On a scale of 1 to 10, how bad is the pain? Let me know.".to_string(),
        ))));
        let context = Context::new();
        context
            .set(
                session_keys::VALIDATION,
                ValidationResult::continue_with(
                    InformationStatus::Gathering,
                    Category::Severity,
                    0.9,
                    "test",
                ),
            )
            .await;

        let result = agent.run(context.clone()).await.unwrap();

        assert_eq!(
            result.response.as_deref(),
            Some("On a scale of 1 to 10, how bad is the pain?")
        );
        assert!(
            matches!(result.next_action, NextAction::GoTo(id) if id == ValidationAgent::ID)
        );
        // The question joined the transcript for later prompts
        assert_eq!(context.transcript().len(), 1);
    }

    #[tokio::test]
    async fn no_generator_uses_template_for_missing_category() {
        let agent = QuestionAgent::new(None);
        let context = Context::new();

        let question = agent
            .generate_question(&context, Category::History, None)
            .await;
        assert_eq!(question, fallback_question(Category::History));
    }
}
