use serde::{Deserialize, Serialize};

/// Minimum patient messages before a report is considered at all
pub const MIN_EXCHANGES: usize = 3;

/// Hard cap on patient turns in a single consultation
pub const MAX_EXCHANGES: usize = 10;

/// The fixed vocabulary of clinical information categories the validator
/// reasons about. Keeping this closed (rather than free-text labels) is what
/// lets the fallback question table be checked for totality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Symptoms,
    Duration,
    Severity,
    Location,
    History,
    Additional,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Symptoms,
        Category::Duration,
        Category::Severity,
        Category::Location,
        Category::History,
        Category::Additional,
    ];

    /// Human label used in prompts and API responses
    pub fn label(&self) -> &'static str {
        match self {
            Category::Symptoms => "symptoms",
            Category::Duration => "duration",
            Category::Severity => "severity",
            Category::Location => "location",
            Category::History => "medical history",
            Category::Additional => "additional information",
        }
    }

    /// Next category in the fixed rotation order, cycling at the end
    pub fn next(&self) -> Category {
        match self {
            Category::Symptoms => Category::Duration,
            Category::Duration => Category::Severity,
            Category::Severity => Category::Location,
            Category::Location => Category::History,
            Category::History => Category::Additional,
            Category::Additional => Category::Symptoms,
        }
    }

    /// Lenient parse of the label spellings seen in model output
    pub fn parse_label(label: &str) -> Option<Category> {
        let label = label.trim().to_lowercase();
        if label.is_empty() || label == "none" {
            return None;
        }
        if label.contains("symptom") {
            Some(Category::Symptoms)
        } else if label.contains("duration") || label.contains("how long") {
            Some(Category::Duration)
        } else if label.contains("severity") || label.contains("scale") {
            Some(Category::Severity)
        } else if label.contains("location") || label.contains("where") {
            Some(Category::Location)
        } else if label.contains("history")
            || label.contains("medication")
            || label.contains("condition")
        {
            Some(Category::History)
        } else {
            Some(Category::Additional)
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Completeness of the gathered information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationStatus {
    /// Required information is missing
    Insufficient,
    /// Some information present, keep asking
    Gathering,
    /// Ready for report generation
    Complete,
    /// Model was consulted but gave no usable verdict
    Uncertain,
}

/// Verdict of one completeness check. Produced fresh every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: InformationStatus,
    pub should_continue_asking: bool,
    pub missing_category: Option<Category>,
    pub confidence: f32,
    pub reasoning: String,
}

impl ValidationResult {
    pub fn continue_with(
        status: InformationStatus,
        missing: Category,
        confidence: f32,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            status,
            should_continue_asking: true,
            missing_category: Some(missing),
            confidence,
            reasoning: reasoning.into(),
        }
    }

    pub fn complete(reasoning: impl Into<String>) -> Self {
        Self {
            status: InformationStatus::Complete,
            should_continue_asking: false,
            missing_category: None,
            confidence: 1.0,
            reasoning: reasoning.into(),
        }
    }
}

/// Optional patient demographics attached to a session. Purely advisory input
/// to prompt construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientContext {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub weight_kg: Option<f32>,
    pub medical_history: Option<String>,
    pub medications: Option<String>,
    pub allergies: Option<String>,
}

impl PatientContext {
    /// Render the known fields as prompt lines; empty string when nothing is known
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if let Some(name) = &self.name {
            lines.push(format!("- Name: {name}"));
        }
        if let Some(age) = self.age {
            lines.push(format!("- Age: {age}"));
        }
        if let Some(sex) = &self.sex {
            lines.push(format!("- Sex: {sex}"));
        }
        if let Some(weight) = self.weight_kg {
            lines.push(format!("- Weight: {weight}kg"));
        }
        if let Some(history) = &self.medical_history {
            lines.push(format!("- Past Medical History: {history}"));
        }
        if let Some(medications) = &self.medications {
            lines.push(format!("- Current Medications: {medications}"));
        }
        if let Some(allergies) = &self.allergies {
            lines.push(format!("- Allergies: {allergies}"));
        }

        if lines.is_empty() {
            String::new()
        } else {
            format!("Patient Profile:\n{}", lines.join("\n"))
        }
    }
}

// Context keys shared by the agents, instead of scattered string literals
pub mod session_keys {
    pub const USER_INPUT: &str = "user_input";
    pub const PATIENT_CONTEXT: &str = "patient_context";
    pub const VALIDATION: &str = "validation";
    pub const LAST_CATEGORY: &str = "last_category";
    pub const REPORT: &str = "report";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_cycles_through_all_categories() {
        let mut seen = vec![Category::Symptoms];
        let mut current = Category::Symptoms;
        for _ in 0..Category::ALL.len() - 1 {
            current = current.next();
            seen.push(current);
        }
        assert_eq!(seen, Category::ALL.to_vec());
        assert_eq!(current.next(), Category::Symptoms);
    }

    #[test]
    fn parse_label_accepts_model_spellings() {
        assert_eq!(
            Category::parse_label("medical_history"),
            Some(Category::History)
        );
        assert_eq!(Category::parse_label("symptoms"), Some(Category::Symptoms));
        assert_eq!(
            Category::parse_label("severity scale"),
            Some(Category::Severity)
        );
        assert_eq!(Category::parse_label("none"), None);
        assert_eq!(Category::parse_label(""), None);
        assert_eq!(
            Category::parse_label("clinical context"),
            Some(Category::Additional)
        );
    }

    #[test]
    fn patient_context_summary_is_empty_when_unknown() {
        assert!(PatientContext::default().summary().is_empty());

        let ctx = PatientContext {
            age: Some(44),
            sex: Some("female".to_string()),
            ..Default::default()
        };
        let summary = ctx.summary();
        assert!(summary.contains("Age: 44"));
        assert!(summary.contains("Sex: female"));
    }
}
