use clap::ValueEnum;
use itertools::Itertools;

use crate::session::SessionRecord;

/// How many of the newest results count toward improvement
const IMPROVEMENT_WINDOW: usize = 5;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Distance,
    Frequency,
    Improvement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub requirement: f64,
    pub progress: f64,
    pub category: Category,
}

impl Achievement {
    pub fn is_unlocked(&self) -> bool {
        self.progress >= self.requirement
    }

    /// Progress toward the requirement as a percentage, capped at 100.
    pub fn progress_percent(&self) -> f64 {
        (self.progress / self.requirement * 100.0).clamp(0.0, 100.0)
    }
}

/// Percentage change from the oldest to the newest of the last five results.
///
/// Zero with fewer than two results, or when the oldest of them is zero meters.
pub fn improvement_percent(records: &[SessionRecord]) -> f64 {
    let latest: Vec<&SessionRecord> = records
        .iter()
        .sorted_by(|a, b| b.started_at.cmp(&a.started_at))
        .take(IMPROVEMENT_WINDOW)
        .collect();

    match (latest.first(), latest.last()) {
        (Some(newest), Some(oldest)) if latest.len() > 1 && oldest.distance_meters > 0 => {
            let newest = newest.distance_meters as f64;
            let oldest = oldest.distance_meters as f64;
            (newest - oldest) / oldest * 100.0
        }
        _ => 0.0,
    }
}

/// Evaluates every achievement against the full result history.
pub fn evaluate(records: &[SessionRecord]) -> Vec<Achievement> {
    let total_tests = records.len() as f64;
    let total_distance = records.iter().map(|r| r.distance_meters as f64).sum::<f64>();
    let improvement = improvement_percent(records);

    vec![
        Achievement {
            id: "first_walk",
            title: "First Steps",
            description: "Complete your first 6-minute walk test",
            requirement: 1.0,
            progress: total_tests,
            category: Category::Frequency,
        },
        Achievement {
            id: "distance_1km",
            title: "Distance Warrior",
            description: "Accumulate 1km in total distance",
            requirement: 1000.0,
            progress: total_distance,
            category: Category::Distance,
        },
        Achievement {
            id: "distance_5km",
            title: "Distance Master",
            description: "Accumulate 5km in total distance",
            requirement: 5000.0,
            progress: total_distance,
            category: Category::Distance,
        },
        Achievement {
            id: "tests_5",
            title: "Dedicated Walker",
            description: "Complete 5 walk tests",
            requirement: 5.0,
            progress: total_tests,
            category: Category::Frequency,
        },
        Achievement {
            id: "tests_10",
            title: "Walking Expert",
            description: "Complete 10 walk tests",
            requirement: 10.0,
            progress: total_tests,
            category: Category::Frequency,
        },
        Achievement {
            id: "improvement_10",
            title: "Steady Progress",
            description: "Improve your distance by 10% over 5 tests",
            requirement: 10.0,
            progress: improvement,
            category: Category::Improvement,
        },
    ]
}

/// `None` keeps every category.
pub fn filter_by_category(achievements: &[Achievement], category: Option<Category>) -> Vec<Achievement> {
    achievements
        .iter()
        .filter(|a| category.map_or(true, |c| a.category == c))
        .cloned()
        .collect()
}

/// Achievements unlocked in `after` that were still locked in `before`.
pub fn newly_unlocked(before: &[Achievement], after: &[Achievement]) -> Vec<Achievement> {
    after
        .iter()
        .filter(|a| a.is_unlocked())
        .filter(|a| !before.iter().any(|b| b.id == a.id && b.is_unlocked()))
        .cloned()
        .collect()
}
