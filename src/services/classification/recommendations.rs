use super::criteria::{
    CriterionColumn, CODING_TIME, COMPILE_COUNT, COMPLETION_RATIO, COMPLETION_STATUS,
    FUNCTION_COUNT, MATERIAL_SCORE, TEST_CASE_COMPLETION_RATE, TRIAL_STATUS, VARIABLE_COUNT,
};
use crate::db::types::CognitiveLevel;

const MAX_WEAK_AREAS: usize = 2;
const GAP_EPSILON: f64 = 1e-12;

/// Criteria the units sit furthest from the ideal on, worst first.
pub(crate) fn weak_areas(columns: &[CriterionColumn], gaps: &[f64]) -> Vec<String> {
    let mut ranked: Vec<(usize, f64)> = gaps
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, gap)| *gap > GAP_EPSILON)
        .collect();
    // Stable sort keeps canonical order on ties.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    ranked
        .into_iter()
        .take(MAX_WEAK_AREAS)
        .filter_map(|(index, _)| columns.get(index).map(|column| column.name.clone()))
        .collect()
}

pub(crate) fn recommendations(weak_areas: &[String], level: CognitiveLevel) -> Vec<String> {
    weak_areas
        .iter()
        .filter_map(|area| criterion_advice(area))
        .chain(std::iter::once(level_advice(level)))
        .map(str::to_string)
        .collect()
}

fn criterion_advice(criterion: &str) -> Option<&'static str> {
    let advice = match criterion {
        COMPILE_COUNT => "Plan the solution before running it; frequent compile attempts point to trial-and-error coding.",
        CODING_TIME => "Practise similar exercises to shorten the time needed to reach a working solution.",
        TRIAL_STATUS => "Finish the attempts that are still in trial state.",
        COMPLETION_STATUS => "Complete the remaining questions of this material.",
        VARIABLE_COUNT => "Name intermediate values explicitly to make the solution logic clearer.",
        FUNCTION_COUNT => "Decompose solutions into small, reusable functions.",
        TEST_CASE_COMPLETION_RATE => "Review the failing test cases and handle the edge cases they cover.",
        MATERIAL_SCORE => "Revisit the materials with the weakest classification.",
        COMPLETION_RATIO => "Finish the open questions across the course materials.",
        _ => return None,
    };
    Some(advice)
}

fn level_advice(level: CognitiveLevel) -> &'static str {
    match level {
        CognitiveLevel::Remember => "Revisit the fundamentals: syntax, basic constructs and worked examples.",
        CognitiveLevel::Understand => "Explain sample solutions in your own words before writing new code.",
        CognitiveLevel::Apply => "Apply familiar patterns to new problems of growing difficulty.",
        CognitiveLevel::Analyze => "Compare alternative solutions and reason about their trade-offs.",
        CognitiveLevel::Evaluate => "Review other solutions critically for correctness and efficiency.",
        CognitiveLevel::Create => "Design original programs that combine several concepts.",
    }
}
