//! Deterministic task priority scoring.
//!
//! `priority_score = base_priority + urgency_boost(age) + goal_priority_weight
//! + recovery_penalty(recovery_count)`. This is the fallback path used when no
//! AI-assisted scorer is wired in; it is also what every unit test exercises
//! since it has no external dependency.

use chrono::{DateTime, Utc};

use crate::domain::models::{GoalPriority, Task, TaskPriority};

/// Aging boost grows sublinearly with time pending, so a task doesn't
/// eventually dominate scoring purely by sitting in the queue.
fn urgency_boost(pending_since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let minutes_pending = (now - pending_since).num_seconds().max(0) as f64 / 60.0;
    minutes_pending.sqrt()
}

/// Penalty that discourages chronically failing work from dominating the
/// ready queue; `0.1` per prior recovery attempt.
fn recovery_penalty(recovery_count: u32) -> f64 {
    0.1 * recovery_count as f64
}

/// Recompute `task.priority_score` from its current fields plus its goal's
/// priority weight. Does not persist; callers write the result back through
/// the task repository.
pub fn score(task: &Task, goal_priority: GoalPriority, now: DateTime<Utc>) -> f64 {
    let base = task.priority.base_priority();
    let urgency = urgency_boost(task.created_at, now);
    let penalty = recovery_penalty(task.recovery_count);
    base + urgency + goal_priority.priority_weight() - penalty
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn aged_task(minutes_old: i64, recovery_count: u32) -> Task {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4(), "n", "d").with_priority(TaskPriority::Medium);
        task.created_at = Utc::now() - chrono::Duration::minutes(minutes_old);
        task.recovery_count = recovery_count;
        task
    }

    #[test]
    fn fresh_task_has_no_urgency_boost() {
        let task = aged_task(0, 0);
        let s = score(&task, GoalPriority::Medium, Utc::now());
        assert!((s - (TaskPriority::Medium.base_priority() + GoalPriority::Medium.priority_weight())).abs() < 0.05);
    }

    #[test]
    fn urgency_grows_sublinearly() {
        let t1 = aged_task(4, 0);
        let t4 = aged_task(16, 0);
        let now = Utc::now();
        let s1 = score(&t1, GoalPriority::Medium, now);
        let s4 = score(&t4, GoalPriority::Medium, now);
        // 16 minutes is 4x the age of 4 minutes; sqrt scaling means boost only ~2x, not 4x.
        let base = TaskPriority::Medium.base_priority() + GoalPriority::Medium.priority_weight();
        let boost1 = s1 - base;
        let boost4 = s4 - base;
        assert!(boost4 < boost1 * 3.0);
        assert!(boost4 > boost1);
    }

    #[test]
    fn recovery_penalty_reduces_score() {
        let clean = aged_task(0, 0);
        let retried = aged_task(0, 3);
        let now = Utc::now();
        assert!(score(&retried, GoalPriority::Medium, now) < score(&clean, GoalPriority::Medium, now));
    }

    #[test]
    fn critical_goal_outranks_low_priority_task_on_fresh_tasks() {
        let low_task = Task::new(Uuid::new_v4(), Uuid::new_v4(), "n", "d").with_priority(TaskPriority::Low);
        let now = Utc::now();
        let s = score(&low_task, GoalPriority::Critical, now);
        let baseline = score(&low_task, GoalPriority::Low, now);
        assert!(s > baseline);
    }
}
