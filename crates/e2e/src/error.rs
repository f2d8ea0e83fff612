//! Error types for scenario testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Engine error: {0}")]
    Engine(#[from] bomwalk_engine::Error),

    #[error("Scenario parse error: {0}")]
    ScenarioParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Unknown context entry: {0}")]
    MissingContext(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
