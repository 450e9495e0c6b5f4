// Consultation workflow agents
pub mod keywords;
pub mod question;
pub mod report;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export agent implementations
pub use question::QuestionAgent;
pub use report::ReportAgent;
pub use validation::{HybridValidator, RuleValidator, ValidationAgent};

// Re-export shared types and session keys
pub use types::{
    Category, InformationStatus, PatientContext, ValidationResult, session_keys,
};
pub use utils::{Generator, generator_from_env};
