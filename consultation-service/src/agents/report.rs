use async_trait::async_trait;
use consult_flow::{Agent, AgentResult, Context, NextAction};
use std::sync::Arc;
use tracing::{info, warn};

use super::keywords;
use super::types::{PatientContext, session_keys};
use super::utils::Generator;

const REPORT_PROMPT: &str = r#"You are an experienced medical doctor. Based on the patient information provided, generate a comprehensive medical assessment report.

{profile}
Patient conversation:
{conversation}

Generate a structured medical report with the following sections:

1. CHIEF COMPLAINT
   - Main symptom presented

2. HISTORY OF PRESENT ILLNESS
   - Timeline of symptoms
   - Duration and severity
   - Associated symptoms

3. PRELIMINARY ASSESSMENT
   - 2-3 most likely explanations and the reasoning for each

4. RECOMMENDATIONS
   - Immediate actions
   - When to seek emergency care
   - Follow-up care suggestions

5. CONFIDENCE LEVEL
   - Rate your confidence and note important limitations

Format the report professionally but in language easy for the patient to understand. Include a disclaimer that this is not a substitute for professional medical evaluation."#;

const DISCLAIMER: &str = "IMPORTANT DISCLAIMER\nThis assessment is based on patient-reported information only and is NOT a substitute for professional medical evaluation. Please consult a licensed healthcare provider for definitive diagnosis and treatment.";

/// Keyword-group to condition mapping for the heuristic report path
struct ConditionProfile {
    keywords: &'static [&'static str],
    condition: &'static str,
    likely_causes: &'static [&'static str],
    recommendations: &'static [&'static str],
}

const CONDITION_PROFILES: &[ConditionProfile] = &[
    ConditionProfile {
        keywords: &["cough", "respiratory", "throat", "congestion", "runny", "sneez", "wheez"],
        condition: "an upper respiratory infection",
        likely_causes: &["Viral infection (common cold, flu)", "Seasonal allergies"],
        recommendations: &[
            "Rest and stay well hydrated",
            "Monitor temperature for fever",
            "Seek care if breathing becomes difficult or symptoms last beyond 10 days",
        ],
    },
    ConditionProfile {
        keywords: &["stomach", "nausea", "vomit", "diarrhea", "abdomen", "belly", "cramp"],
        condition: "a gastrointestinal upset",
        likely_causes: &["Viral gastroenteritis", "Food intolerance or foodborne illness"],
        recommendations: &[
            "Take small sips of fluid to avoid dehydration",
            "Prefer bland foods until symptoms settle",
            "Seek care for blood in stool, high fever, or symptoms beyond 48 hours",
        ],
    },
    ConditionProfile {
        keywords: &["headache", "migraine", "dizzy", "dizziness", "vertigo"],
        condition: "a tension-type headache or migraine",
        likely_causes: &["Stress or poor sleep", "Dehydration", "Migraine predisposition"],
        recommendations: &[
            "Rest in a quiet, dark room",
            "Keep a log of triggers and timing",
            "Seek immediate care for a sudden, worst-ever headache or neurological changes",
        ],
    },
    ConditionProfile {
        keywords: &["back", "joint", "muscle", "shoulder", "knee", "sprain", "strain"],
        condition: "a musculoskeletal strain",
        likely_causes: &["Overuse or sudden exertion", "Poor posture"],
        recommendations: &[
            "Relative rest, avoiding aggravating movements",
            "Apply ice for the first 48 hours, then heat",
            "Seek care for numbness, weakness, or pain that does not improve",
        ],
    },
    ConditionProfile {
        keywords: &["fever", "chills", "fatigue", "tired", "ache"],
        condition: "a viral illness",
        likely_causes: &["Seasonal viral infection"],
        recommendations: &[
            "Rest and fluids",
            "Monitor temperature twice daily",
            "Seek care if fever exceeds 39C or lasts more than three days",
        ],
    },
];

/// Strip markdown emphasis and heading markers from model output
fn strip_markdown(text: &str) -> String {
    text.replace("**", "")
        .replace("##", "")
        .replace('#', "")
        .trim()
        .to_string()
}

/// Soften absolute phrasing and make sure a disclaimer is present
fn sanitize(report: String) -> String {
    let mut report = report
        .replace("diagnosis is", "may be related to")
        .replace("diagnosed with", "symptoms consistent with");

    if !report.to_lowercase().contains("disclaimer") {
        report.push_str("\n\n");
        report.push_str(DISCLAIMER);
    }

    report
}

fn chief_complaint(messages: &[String]) -> &str {
    messages
        .first()
        .map(String::as_str)
        .unwrap_or("Patient consultation")
}

/// Rule-based report: match the conversation against the condition table and
/// assemble the associated causes and recommendations. `None` when no
/// condition group matches.
fn heuristic_report(messages: &[String]) -> Option<String> {
    let text = keywords::combined_text(messages);
    let profile = CONDITION_PROFILES
        .iter()
        .find(|p| keywords::contains_any(&text, p.keywords))?;

    let causes = profile
        .likely_causes
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    let recommendations = profile
        .recommendations
        .iter()
        .map(|r| format!("- {r}"))
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!(
        "MEDICAL ASSESSMENT REPORT\n\
         \n\
         CHIEF COMPLAINT\n\
         {complaint}\n\
         \n\
         PRELIMINARY ASSESSMENT\n\
         The reported symptoms are consistent with {condition}.\n\
         \n\
         POSSIBLE CONTRIBUTING FACTORS\n\
         {causes}\n\
         \n\
         RECOMMENDATIONS\n\
         {recommendations}\n\
         \n\
         {disclaimer}",
        complaint = chief_complaint(messages),
        condition = profile.condition,
        causes = causes,
        recommendations = recommendations,
        disclaimer = DISCLAIMER,
    ))
}

/// Last-resort template report; always succeeds, even for an empty conversation
fn template_report(messages: &[String], patient_context: Option<&PatientContext>) -> String {
    let profile = patient_context
        .map(|c| c.summary())
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s}\n\n"))
        .unwrap_or_default();

    format!(
        "MEDICAL ASSESSMENT REPORT\n\
         \n\
         {profile}\
         CHIEF COMPLAINT\n\
         {complaint}\n\
         \n\
         HISTORY OF PRESENT ILLNESS\n\
         Duration, severity and relevant history were discussed during the consultation.\n\
         \n\
         RECOMMENDATIONS\n\
         - Continue monitoring symptoms and keep a record of their progression\n\
         - Seek immediate medical attention if symptoms worsen significantly\n\
         - Arrange a follow-up evaluation with a healthcare provider\n\
         \n\
         {disclaimer}",
        profile = profile,
        complaint = chief_complaint(messages),
        disclaimer = DISCLAIMER,
    )
}

/// Produces the final assessment report from the full conversation. Prefers
/// the model, degrades to the heuristic condition table, then to the static
/// template. Never fails and never returns an empty string.
pub struct ReportAgent {
    generator: Option<Arc<dyn Generator>>,
}

impl ReportAgent {
    pub const ID: &'static str = "report";

    pub fn new(generator: Option<Arc<dyn Generator>>) -> Self {
        Self { generator }
    }

    pub async fn generate_report(
        &self,
        messages: &[String],
        patient_context: Option<&PatientContext>,
    ) -> String {
        let body = self.generate_body(messages, patient_context).await;
        format!(
            "{body}\n\nReference: MED-{:08X}\nGenerated: {}",
            rand::random::<u32>(),
            chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"),
        )
    }

    async fn generate_body(
        &self,
        messages: &[String],
        patient_context: Option<&PatientContext>,
    ) -> String {
        if let Some(generator) = &self.generator {
            let conversation = messages
                .iter()
                .map(|m| format!("Patient: {m}"))
                .collect::<Vec<_>>()
                .join("\n");
            let profile = patient_context
                .map(|c| c.summary())
                .unwrap_or_else(|| "Patient information: not provided".to_string());

            let prompt = REPORT_PROMPT
                .replace("{profile}", &profile)
                .replace("{conversation}", &conversation);

            match generator.generate(&prompt, 800).await {
                Ok(response) if !response.trim().is_empty() => {
                    return sanitize(strip_markdown(&response));
                }
                Ok(_) => warn!("model returned an empty report, using fallback"),
                Err(e) => warn!(error = %e, "report generation failed, using fallback"),
            }
        }

        heuristic_report(messages).unwrap_or_else(|| template_report(messages, patient_context))
    }
}

#[async_trait]
impl Agent for ReportAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn run(&self, context: Context) -> consult_flow::Result<AgentResult> {
        let messages = context.patient_messages();
        let patient_context: Option<PatientContext> =
            context.get(session_keys::PATIENT_CONTEXT).await;

        let report = self
            .generate_report(&messages, patient_context.as_ref())
            .await;

        info!(turns = messages.len(), "assessment report generated");
        context.set(session_keys::REPORT, report.clone()).await;

        Ok(AgentResult::new_with_status(
            Some(report),
            NextAction::End,
            Some("Report generated - consultation complete".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            Err(anyhow::anyhow!("model unavailable"))
        }
    }

    fn msgs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_conversation_still_produces_a_report() {
        let agent = ReportAgent::new(None);
        let report = agent.generate_report(&[], None).await;

        assert!(!report.is_empty());
        assert!(report.contains("MEDICAL ASSESSMENT REPORT"));
        assert!(report.contains("DISCLAIMER"));
    }

    #[tokio::test]
    async fn respiratory_conversation_matches_condition_table() {
        let agent = ReportAgent::new(None);
        let messages = msgs(&["I have a bad cough and sore throat", "started a week ago"]);
        let report = agent.generate_report(&messages, None).await;

        assert!(report.contains("respiratory infection"));
        assert!(report.contains("I have a bad cough and sore throat"));
    }

    #[tokio::test]
    async fn model_output_is_stripped_and_sanitized() {
        let agent = ReportAgent::new(Some(Arc::new(StaticGenerator(
            "## Assessment\n**CHIEF COMPLAINT**\nThe diagnosis is tension headache.".to_string(),
        ))));
        let report = agent.generate_report(&msgs(&["headache"]), None).await;

        assert!(!report.contains("**"));
        assert!(!report.contains('#'));
        assert!(report.contains("may be related to tension headache"));
        assert!(report.contains("DISCLAIMER"));
    }

    #[tokio::test]
    async fn generation_failure_falls_back_without_error() {
        let agent = ReportAgent::new(Some(Arc::new(FailingGenerator)));
        let messages = msgs(&["my stomach hurts and I feel nausea"]);
        let report = agent.generate_report(&messages, None).await;

        assert!(!report.is_empty());
        assert!(report.contains("gastrointestinal"));
    }

    #[tokio::test]
    async fn unmatched_symptoms_use_the_template() {
        let agent = ReportAgent::new(None);
        let messages = msgs(&["I have a strange rash"]);
        let report = agent.generate_report(&messages, None).await;

        assert!(report.contains("I have a strange rash"));
        assert!(report.contains("RECOMMENDATIONS"));
    }

    #[tokio::test]
    async fn report_agent_ends_the_flow_and_stores_the_report() {
        let agent = ReportAgent::new(None);
        let context = Context::new();
        context.add_patient_message("I have a headache").await;

        let result = agent.run(context.clone()).await.unwrap();

        assert!(matches!(result.next_action, NextAction::End));
        let stored: String = context.get(session_keys::REPORT).await.unwrap();
        assert_eq!(result.response.as_deref(), Some(stored.as_str()));
        assert!(stored.contains("Reference: MED-"));
    }
}
