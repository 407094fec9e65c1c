use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Bloom's-taxonomy bands, ordered low to high.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Type,
)]
#[sqlx(type_name = "cognitivelevel")]
pub(crate) enum CognitiveLevel {
    Remember,
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl CognitiveLevel {
    pub(crate) const ALL: [CognitiveLevel; 6] = [
        CognitiveLevel::Remember,
        CognitiveLevel::Understand,
        CognitiveLevel::Apply,
        CognitiveLevel::Analyze,
        CognitiveLevel::Evaluate,
        CognitiveLevel::Create,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CognitiveLevel::Remember => "Remember",
            CognitiveLevel::Understand => "Understand",
            CognitiveLevel::Apply => "Apply",
            CognitiveLevel::Analyze => "Analyze",
            CognitiveLevel::Evaluate => "Evaluate",
            CognitiveLevel::Create => "Create",
        }
    }

    /// Short report code, `C1` (Remember) through `C6` (Create).
    pub(crate) fn code(self) -> &'static str {
        match self {
            CognitiveLevel::Remember => "C1",
            CognitiveLevel::Understand => "C2",
            CognitiveLevel::Apply => "C3",
            CognitiveLevel::Analyze => "C4",
            CognitiveLevel::Evaluate => "C5",
            CognitiveLevel::Create => "C6",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "classificationscope", rename_all = "lowercase")]
pub(crate) enum ClassificationScope {
    Material,
    Course,
}

impl ClassificationScope {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ClassificationScope::Material => "material",
            ClassificationScope::Course => "course",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "classificationmethod", rename_all = "snake_case")]
pub(crate) enum ClassificationMethod {
    Topsis,
}

impl ClassificationMethod {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ClassificationMethod::Topsis => "topsis",
        }
    }
}
