//! Derived task metrics.
//!
//! Everything here is a pure function of its inputs. `today` is always passed
//! explicitly so results are reproducible.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Task;

/// Signed number of days from `today` until the task is due.
pub fn days_until_due(task: &Task, today: NaiveDate) -> i64 {
    (task.due_date - today).num_days()
}

/// Urgency/priority score for a task.
///
/// - completed: `priority * 10 + max(0, days_until_due) * 2`
/// - overdue: `max(0, priority * 10 + days_until_due * 3)`
/// - otherwise: `priority * 10 + max(0, 10 - days_until_due)`
pub fn velocity_points(task: &Task, today: NaiveDate) -> u32 {
    let base = i64::from(task.priority) * 10;
    let days = days_until_due(task, today);

    let points = if task.is_completed() {
        base + days.max(0) * 2
    } else if days < 0 {
        (base + days * 3).max(0)
    } else {
        base + (10 - days).max(0)
    };

    u32::try_from(points).unwrap_or(u32::MAX)
}

/// Completion percentage of a task set, rounded to the nearest integer.
///
/// Returns 0 for an empty set.
pub fn progress<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> u8 {
    let (total, completed) = tasks.into_iter().fold((0u64, 0u64), |(t, c), task| {
        (t + 1, c + u64::from(task.is_completed()))
    });
    if total == 0 {
        return 0;
    }
    // round half up: (100c / t) + 0.5
    ((200 * completed + total) / (2 * total)) as u8
}

/// Named due-date bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueWindow {
    Overdue,
    #[serde(rename = "next_7")]
    Next7,
    #[serde(rename = "next_30")]
    Next30,
}

impl DueWindow {
    /// Parse a filter value. Unknown values (including empty) yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "overdue" => Some(DueWindow::Overdue),
            "next_7" => Some(DueWindow::Next7),
            "next_30" => Some(DueWindow::Next30),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DueWindow::Overdue => "overdue",
            DueWindow::Next7 => "next_7",
            DueWindow::Next30 => "next_30",
        }
    }

    /// Whether `days_until_due` falls inside this window.
    pub fn contains(&self, days_until_due: i64) -> bool {
        match self {
            DueWindow::Overdue => days_until_due < 0,
            DueWindow::Next7 => (0..=7).contains(&days_until_due),
            DueWindow::Next30 => (0..=30).contains(&days_until_due),
        }
    }
}

impl std::fmt::Display for DueWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Summary figures for a task set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub total: usize,
    pub completed: usize,
    /// Tasks not yet completed
    pub open: usize,
    /// Open tasks whose due date has passed
    pub overdue: usize,
    /// Sum of velocity points
    pub velocity: u64,
    /// Mean velocity points per task (0 when empty)
    pub average_velocity: f64,
}

impl Insights {
    pub fn compute<'a>(tasks: impl IntoIterator<Item = &'a Task>, today: NaiveDate) -> Self {
        let mut insights = Insights::default();
        for task in tasks {
            insights.total += 1;
            if task.is_completed() {
                insights.completed += 1;
            } else {
                insights.open += 1;
                if days_until_due(task, today) < 0 {
                    insights.overdue += 1;
                }
            }
            insights.velocity += u64::from(velocity_points(task, today));
        }
        if insights.total > 0 {
            insights.average_velocity = insights.velocity as f64 / insights.total as f64;
        }
        insights
    }

    /// Completion percentage (0-100).
    pub fn completion(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((200 * self.completed as u64 + self.total as u64) / (2 * self.total as u64)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use crate::test_utils::{day, today};

    fn task(priority: u8, due_in: i64, status: &str) -> Task {
        let mut new = NewTask::new("t", today());
        new.priority = priority;
        new.due_date = day(due_in);
        new.status = status.to_string();
        new.into_task(1)
    }

    #[test]
    fn test_velocity_completed_due_today_is_base() {
        for priority in 1..=5 {
            let t = task(priority, 0, "Completed");
            assert_eq!(velocity_points(&t, today()), u32::from(priority) * 10);
        }
    }

    #[test]
    fn test_velocity_completed_early_bonus() {
        assert_eq!(velocity_points(&task(3, 4, "completed"), today()), 38);
        // late completion is not penalized
        assert_eq!(velocity_points(&task(3, -4, "COMPLETED"), today()), 30);
    }

    #[test]
    fn test_velocity_overdue_penalty() {
        for priority in 1..=5u8 {
            for d in 1..=30i64 {
                let t = task(priority, -d, "Started");
                let expected = (i64::from(priority) * 10 - d * 3).max(0);
                assert_eq!(i64::from(velocity_points(&t, today())), expected);
            }
        }
    }

    #[test]
    fn test_velocity_overdue_can_invert_priority() {
        // Formula preserved as-is: a p5 task 20 days late scores below a fresh p1 task.
        let late_high = task(5, -20, "Assigned");
        let fresh_low = task(1, 3, "Assigned");
        assert_eq!(velocity_points(&late_high, today()), 0);
        assert_eq!(velocity_points(&fresh_low, today()), 17);
    }

    #[test]
    fn test_velocity_urgency_bonus_decays() {
        assert_eq!(velocity_points(&task(2, 0, "Assigned"), today()), 30);
        assert_eq!(velocity_points(&task(2, 3, "Assigned"), today()), 27);
        assert_eq!(velocity_points(&task(2, 10, "Assigned"), today()), 20);
        assert_eq!(velocity_points(&task(2, 45, "Assigned"), today()), 20);
    }

    #[test]
    fn test_progress_empty_is_zero() {
        assert_eq!(progress(std::iter::empty::<&Task>()), 0);
    }

    #[test]
    fn test_progress_rounds() {
        let tasks = vec![
            task(3, 0, "Completed"),
            task(3, 0, "Started"),
            task(3, 0, "Assigned"),
        ];
        assert_eq!(progress(&tasks), 33);

        let tasks = vec![
            task(3, 0, "Completed"),
            task(3, 0, "completed"),
            task(3, 0, "Assigned"),
        ];
        assert_eq!(progress(&tasks), 67);

        let all_done = vec![task(3, 0, "Completed"), task(3, 0, "Completed")];
        assert_eq!(progress(&all_done), 100);
    }

    #[test]
    fn test_progress_requires_exact_completed_status() {
        let tasks = vec![task(3, 0, "Completed soon"), task(3, 0, "done")];
        assert_eq!(progress(&tasks), 0);
    }

    #[test]
    fn test_due_window_bounds() {
        assert!(DueWindow::Overdue.contains(-1));
        assert!(!DueWindow::Overdue.contains(0));
        assert!(DueWindow::Next7.contains(0));
        assert!(DueWindow::Next7.contains(7));
        assert!(!DueWindow::Next7.contains(8));
        assert!(DueWindow::Next30.contains(30));
        assert!(!DueWindow::Next30.contains(-1));
    }

    #[test]
    fn test_due_window_parse() {
        assert_eq!(DueWindow::parse("next_7"), Some(DueWindow::Next7));
        assert_eq!(DueWindow::parse(""), None);
        assert_eq!(DueWindow::parse("next_90"), None);
        assert_eq!(DueWindow::parse(" overdue "), Some(DueWindow::Overdue));
    }

    #[test]
    fn test_insights() {
        let tasks = vec![
            task(4, -2, "Started"),
            task(3, 5, "Assigned"),
            task(2, 0, "Completed"),
        ];
        let insights = Insights::compute(&tasks, today());
        assert_eq!(insights.total, 3);
        assert_eq!(insights.completed, 1);
        assert_eq!(insights.open, 2);
        assert_eq!(insights.overdue, 1);
        assert_eq!(insights.velocity, 34 + 35 + 20);
        assert_eq!(insights.completion(), 33);
    }

    #[test]
    fn test_insights_empty() {
        let insights = Insights::compute(std::iter::empty::<&Task>(), today());
        assert_eq!(insights, Insights::default());
        assert_eq!(insights.completion(), 0);
    }
}
