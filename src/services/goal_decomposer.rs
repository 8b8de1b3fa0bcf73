//! Deterministic goal decomposition.
//!
//! Turns a workspace's free-text goal into one or more measurable `Goal`
//! rows. This is the fallback path used when no AI-assisted decomposer is
//! wired in; it is also what every unit test exercises since it has no
//! external dependency, matching the priority-scoring and agent-affinity
//! services' split between an AI-assisted concept and the deterministic rule
//! that actually runs.

use crate::domain::models::MetricType;

/// One clause of a decomposed goal: a human-readable description, the metric
/// it's measured by, and the numeric target that satisfies it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecomposedGoal {
    pub description: String,
    pub metric_type: MetricType,
    pub target_value: f64,
}

/// Fallback target when a goal carries no discoverable quantity at all.
const DEFAULT_TARGET: f64 = 100.0;

/// Splits `goal_text` on its conjunctions and pulls a leading numeric target
/// out of each clause, e.g. `"100 B2B leads and 3-email sequence"` becomes
/// two count goals (`target=100`, `target=3`). A clause with no number is
/// kept as a qualitative goal measured against `DEFAULT_TARGET`. If nothing
/// in the text carries a number at all, the whole text becomes one
/// catch-all count goal — the same shape this crate produced before
/// decomposition existed, now reached only when there's truly nothing to
/// split on.
pub fn decompose(goal_text: &str) -> Vec<DecomposedGoal> {
    let clauses = split_clauses(goal_text);

    let mut goals: Vec<DecomposedGoal> = clauses
        .iter()
        .filter(|clause| !clause.trim().is_empty())
        .map(|clause| match leading_number(clause) {
            Some(target) => DecomposedGoal { description: clause.trim().to_string(), metric_type: MetricType::Count, target_value: target },
            None => DecomposedGoal { description: clause.trim().to_string(), metric_type: MetricType::Count, target_value: DEFAULT_TARGET },
        })
        .collect();

    if goals.is_empty() {
        goals.push(DecomposedGoal { description: goal_text.trim().to_string(), metric_type: MetricType::Count, target_value: DEFAULT_TARGET });
    }

    goals
}

/// Splits on top-level `"and"`/`","` conjunctions. Deliberately does not
/// split inside a number (`"1,000 leads"` stays one clause) by only treating
/// a comma as a separator when it isn't immediately surrounded by digits.
fn split_clauses(text: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == ',' {
            let prev_digit = current.trim_end().chars().last().map(|c| c.is_ascii_digit()).unwrap_or(false);
            let next_digit = chars.get(i + 1).map(|c| c.is_ascii_digit()).unwrap_or(false);
            if prev_digit && next_digit {
                current.push(c);
                i += 1;
                continue;
            }
            clauses.push(std::mem::take(&mut current));
            i += 1;
            continue;
        }
        current.push(c);
        i += 1;
    }
    clauses.push(current);

    clauses
        .into_iter()
        .flat_map(|clause| split_on_word(&clause, " and "))
        .collect()
}

fn split_on_word(text: &str, needle: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut parts = Vec::new();
    let mut rest = text;
    let mut rest_lower = lower.as_str();

    while let Some(idx) = rest_lower.find(needle) {
        parts.push(rest[..idx].to_string());
        rest = &rest[idx + needle.len()..];
        rest_lower = &rest_lower[idx + needle.len()..];
    }
    parts.push(rest.to_string());
    parts
}

/// First whole number found in the clause, scanning word by word. Handles a
/// digit run glued to the rest of the word (`"3-email"`, `"100%"`) by reading
/// only the leading digits (and thousands separators).
fn leading_number(clause: &str) -> Option<f64> {
    for word in clause.split_whitespace() {
        let digits: String = word.chars().take_while(|c| c.is_ascii_digit() || *c == ',').collect();
        let digits: String = digits.chars().filter(|c| *c != ',').collect();
        if !digits.is_empty() {
            if let Ok(value) = digits.parse::<f64>() {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_quantities_become_two_goals() {
        let goals = decompose("100 B2B leads and 3-email sequence");
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].target_value, 100.0);
        assert_eq!(goals[1].target_value, 3.0);
        assert!(goals.iter().all(|g| g.metric_type == MetricType::Count));
    }

    #[test]
    fn comma_inside_a_number_does_not_split_the_clause() {
        let goals = decompose("1,000 newsletter signups");
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].target_value, 1000.0);
    }

    #[test]
    fn comma_separated_clauses_each_decompose() {
        let goals = decompose("50 leads, 10 demos booked");
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].target_value, 50.0);
        assert_eq!(goals[1].target_value, 10.0);
    }

    #[test]
    fn quantity_free_text_falls_back_to_one_catch_all_goal() {
        let goals = decompose("improve customer satisfaction");
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].target_value, DEFAULT_TARGET);
        assert_eq!(goals[0].description, "improve customer satisfaction");
    }

    #[test]
    fn clause_with_no_number_still_gets_a_qualitative_goal() {
        let goals = decompose("100 leads and a polished landing page");
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].target_value, 100.0);
        assert_eq!(goals[1].target_value, DEFAULT_TARGET);
    }
}
