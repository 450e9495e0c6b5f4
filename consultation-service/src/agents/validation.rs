use async_trait::async_trait;
use consult_flow::{Agent, AgentResult, Context, FlowError, NextAction};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

use super::keywords::{self, CategoryPresence};
use super::types::{
    Category, InformationStatus, MIN_EXCHANGES, PatientContext, ValidationResult, session_keys,
};
use super::utils::Generator;

/// Rule results at or above this confidence are final; anything below may be
/// delegated to the model.
const CONFIDENT: f32 = 0.9;

/// Fast, deterministic completeness checks over the patient's messages.
///
/// Scans for five information categories (symptoms, duration, severity,
/// location, history) and applies turn-count thresholds. Pure function of the
/// message list and the previously suggested category.
pub struct RuleValidator {
    min_exchanges: usize,
}

impl Default for RuleValidator {
    fn default() -> Self {
        Self {
            min_exchanges: MIN_EXCHANGES,
        }
    }
}

impl RuleValidator {
    pub fn new(min_exchanges: usize) -> Self {
        Self { min_exchanges }
    }

    pub fn validate(
        &self,
        messages: &[String],
        last_category: Option<Category>,
    ) -> ValidationResult {
        let num_exchanges = messages.len();
        let text = keywords::combined_text(messages);
        let found = keywords::analyze(&text);
        let pain = keywords::mentions_pain(&text);

        // Rule 1: minimum exchanges before a report is considered
        if num_exchanges < self.min_exchanges {
            let missing = suggest_missing(num_exchanges, found, pain);
            return ValidationResult::continue_with(
                InformationStatus::Insufficient,
                missing,
                1.0,
                format!(
                    "Need at least {} exchanges, currently {}",
                    self.min_exchanges, num_exchanges
                ),
            );
        }

        // Rule 2: must have symptoms
        if !found.symptoms {
            return ValidationResult::continue_with(
                InformationStatus::Insufficient,
                Category::Symptoms,
                1.0,
                "No specific symptoms identified",
            );
        }

        // Rule 3: must have duration
        if !found.duration {
            return ValidationResult::continue_with(
                InformationStatus::Insufficient,
                Category::Duration,
                1.0,
                "No symptom duration provided",
            );
        }

        // Rule 4: pain complaints additionally need severity or location
        if pain {
            if !found.severity && !found.location {
                return self.rotate(
                    ValidationResult::continue_with(
                        InformationStatus::Gathering,
                        Category::Severity,
                        0.95,
                        "Pain reported without severity or location",
                    ),
                    last_category,
                    num_exchanges,
                );
            }
            if !found.severity {
                return self.rotate(
                    ValidationResult::continue_with(
                        InformationStatus::Gathering,
                        Category::Severity,
                        0.9,
                        "Pain reported without a severity level",
                    ),
                    last_category,
                    num_exchanges,
                );
            }
            if !found.location {
                return self.rotate(
                    ValidationResult::continue_with(
                        InformationStatus::Gathering,
                        Category::Location,
                        0.9,
                        "Pain reported without a location",
                    ),
                    last_category,
                    num_exchanges,
                );
            }
        }

        // Rule 5: after five exchanges, round out the medical history
        if num_exchanges >= 5 && !found.history {
            return self.rotate(
                ValidationResult::continue_with(
                    InformationStatus::Gathering,
                    Category::History,
                    0.85,
                    "Medical history would round out the assessment",
                ),
                last_category,
                num_exchanges,
            );
        }

        // Rule 6: symptoms and duration present past the threshold
        if num_exchanges > self.min_exchanges {
            return ValidationResult::complete("Sufficient information gathered");
        }

        // Default: continue gathering
        let missing = suggest_missing(num_exchanges, found, pain);
        self.rotate(
            ValidationResult::continue_with(
                InformationStatus::Gathering,
                missing,
                0.85,
                "Continue gathering information",
            ),
            last_category,
            num_exchanges,
        )
    }

    /// Forced category rotation: a suggestion that repeats the previous one on
    /// a conversation that is already under way advances to the next category,
    /// so a stuck conversation never asks for the same detail forever.
    fn rotate(
        &self,
        mut result: ValidationResult,
        last_category: Option<Category>,
        num_exchanges: usize,
    ) -> ValidationResult {
        if num_exchanges > 2 && result.confidence < 1.0 {
            if let Some(category) = result.missing_category {
                if Some(category) == last_category {
                    let next = category.next();
                    result.reasoning =
                        format!("{} (rotating focus to {})", result.reasoning, next);
                    result.missing_category = Some(next);
                }
            }
        }
        result
    }
}

/// Progressive questioning strategy by turn count
fn suggest_missing(num_exchanges: usize, found: CategoryPresence, pain: bool) -> Category {
    match num_exchanges {
        0 => Category::Symptoms,
        1 => Category::Duration,
        2 => {
            if !found.duration {
                Category::Duration
            } else {
                Category::Symptoms
            }
        }
        3 => {
            if pain && !found.severity {
                Category::Severity
            } else if pain && !found.location {
                Category::Location
            } else {
                Category::Additional
            }
        }
        4 => {
            if !found.severity {
                Category::Severity
            } else if !found.history {
                Category::History
            } else {
                Category::Additional
            }
        }
        _ => {
            if !found.history {
                Category::History
            } else {
                Category::Additional
            }
        }
    }
}

const VALIDATION_PROMPT: &str = r#"You are a medical assistant. Analyze this conversation to determine whether enough information has been gathered for an assessment report.

{profile}
Patient messages:
{messages}

Required for a complete assessment:
1. Clear description of the main symptoms
2. Duration (when the symptoms started)
3. Severity (pain level, intensity)
4. Location (if applicable)
5. Relevant medical history (conditions, medications, allergies)

Respond with ONLY a JSON object (no markdown):
{"should_continue_asking": true/false, "missing_category": "symptoms/duration/severity/location/medical_history/none", "confidence": 0.0-1.0, "reasoning": "brief explanation"}"#;

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct ModelVerdict {
    #[serde(default = "default_true")]
    should_continue_asking: bool,
    #[serde(default)]
    missing_category: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Extract the first JSON object from model output and turn it into a verdict.
/// Anything unusable becomes an inconclusive "keep gathering" result.
fn parse_model_verdict(response: &str) -> ValidationResult {
    static JSON_BLOCK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));

    let Some(block) = JSON_BLOCK.find(response) else {
        return inconclusive();
    };

    match serde_json::from_str::<ModelVerdict>(block.as_str()) {
        Ok(verdict) => {
            if verdict.should_continue_asking {
                let missing = verdict
                    .missing_category
                    .as_deref()
                    .and_then(Category::parse_label)
                    .unwrap_or(Category::Additional);
                ValidationResult {
                    status: InformationStatus::Gathering,
                    should_continue_asking: true,
                    missing_category: Some(missing),
                    confidence: verdict.confidence.unwrap_or(0.7),
                    reasoning: verdict
                        .reasoning
                        .unwrap_or_else(|| "Model validation".to_string()),
                }
            } else {
                ValidationResult {
                    status: InformationStatus::Complete,
                    should_continue_asking: false,
                    missing_category: None,
                    confidence: verdict.confidence.unwrap_or(0.7),
                    reasoning: verdict
                        .reasoning
                        .unwrap_or_else(|| "Model validation".to_string()),
                }
            }
        }
        Err(_) => inconclusive(),
    }
}

fn inconclusive() -> ValidationResult {
    ValidationResult::continue_with(
        InformationStatus::Uncertain,
        Category::Additional,
        0.5,
        "Model verdict could not be parsed, continuing to gather information",
    )
}

/// Two-layer completeness validator: the rule layer answers confidently most
/// of the time; low-confidence results may be delegated to the model when one
/// is configured. Never errors - every failure path degrades to a rule or
/// "keep gathering" result.
pub struct HybridValidator {
    rules: RuleValidator,
    generator: Option<Arc<dyn Generator>>,
}

impl HybridValidator {
    pub fn new(generator: Option<Arc<dyn Generator>>) -> Self {
        Self {
            rules: RuleValidator::default(),
            generator,
        }
    }

    pub async fn evaluate_completeness(
        &self,
        messages: &[String],
        patient_context: Option<&PatientContext>,
        last_category: Option<Category>,
    ) -> ValidationResult {
        let rule_result = self.rules.validate(messages, last_category);
        debug!(
            status = ?rule_result.status,
            confidence = rule_result.confidence,
            "rule validation"
        );

        if rule_result.confidence >= CONFIDENT {
            return rule_result;
        }

        let Some(generator) = &self.generator else {
            return rule_result;
        };

        debug!("delegating to model validation");
        match self
            .model_verdict(generator.as_ref(), messages, patient_context)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "model validation failed, using rule result");
                rule_result
            }
        }
    }

    async fn model_verdict(
        &self,
        generator: &dyn Generator,
        messages: &[String],
        patient_context: Option<&PatientContext>,
    ) -> anyhow::Result<ValidationResult> {
        let start = messages.len().saturating_sub(5);
        let recent = messages[start..]
            .iter()
            .map(|m| format!("- {m}"))
            .collect::<Vec<_>>()
            .join("\n");
        let profile = patient_context.map(|c| c.summary()).unwrap_or_default();

        let prompt = VALIDATION_PROMPT
            .replace("{profile}", &profile)
            .replace("{messages}", &recent);

        let response = generator.generate(&prompt, 150).await?;
        Ok(parse_model_verdict(&response))
    }
}

/// Flow agent that appends the incoming patient message to the transcript,
/// runs the hybrid validator, and records the verdict for the edge routing.
pub struct ValidationAgent {
    validator: HybridValidator,
}

impl ValidationAgent {
    pub const ID: &'static str = "validation";

    pub fn new(generator: Option<Arc<dyn Generator>>) -> Self {
        Self {
            validator: HybridValidator::new(generator),
        }
    }
}

#[async_trait]
impl Agent for ValidationAgent {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn run(&self, context: Context) -> consult_flow::Result<AgentResult> {
        let user_input: String = context
            .get(session_keys::USER_INPUT)
            .await
            .ok_or_else(|| FlowError::ContextError("user_input not found".to_string()))?;
        context.add_patient_message(user_input).await;

        let last_category: Option<Category> = context.get(session_keys::LAST_CATEGORY).await;
        let patient_context: Option<PatientContext> =
            context.get(session_keys::PATIENT_CONTEXT).await;
        let messages = context.patient_messages();

        let verdict = self
            .validator
            .evaluate_completeness(&messages, patient_context.as_ref(), last_category)
            .await;

        info!(
            status = ?verdict.status,
            confidence = verdict.confidence,
            missing = verdict.missing_category.map(|c| c.label()).unwrap_or("none"),
            turns = messages.len(),
            "completeness check"
        );

        let status_message = match verdict.missing_category {
            Some(category) if verdict.should_continue_asking => {
                context.set(session_keys::LAST_CATEGORY, category).await;
                format!("Gathering information - asking about {category}")
            }
            _ => "Information complete - generating report".to_string(),
        };

        context.set(session_keys::VALIDATION, verdict).await;

        Ok(AgentResult::new_with_status(
            None,
            NextAction::ContinueAndExecute,
            Some(status_message),
        ))
    }
}
