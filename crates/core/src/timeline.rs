//! Scene timeline validation.
//!
//! Checks the temporal invariants of a manifest draft: strictly positive
//! durations, non-decreasing starts, pairwise non-overlapping intervals,
//! no gaps, and exact duration-sum equality against the declared total.
//! All violations are collected and reported together; input is never
//! mutated and a failed report blocks only the one manifest.

use serde::Serialize;

use crate::manifest::Scene;

// ---------------------------------------------------------------------------
// Violations
// ---------------------------------------------------------------------------

/// One timeline violation, carrying the offending scene id(s).
///
/// Durations are integer seconds throughout, so the duration-sum check is
/// exact equality, never a floating tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TimelineViolation {
    /// `durationSeconds` must be strictly positive.
    NonPositiveDuration {
        scene_id: String,
        duration_seconds: i64,
    },
    /// `startAtSec` must not be negative.
    NegativeStart { scene_id: String, start_at_sec: i64 },
    /// Scene starts must be non-decreasing in declared order.
    OutOfOrder {
        scene_id: String,
        previous_id: String,
    },
    /// Two scene intervals `[start, start+duration)` intersect.
    Overlap { first_id: String, second_id: String },
    /// The earliest scene does not start at 0.
    LeadingGap { scene_id: String, start_at_sec: i64 },
    /// Unused time between two consecutive scenes.
    Gap {
        previous_id: String,
        scene_id: String,
        gap_seconds: i64,
    },
    /// Scene durations do not sum to the declared total.
    DurationMismatch {
        declared_seconds: i64,
        actual_seconds: i64,
    },
}

/// Aggregated result of a timeline validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineReport {
    pub valid: bool,
    pub violations: Vec<TimelineViolation>,
}

impl TimelineReport {
    /// Build a report from a flat list of violations.
    pub fn from_violations(violations: Vec<TimelineViolation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate scene timing against the declared total duration.
///
/// Checks run in order and all violations are collected: per-scene bounds
/// first, then an interval sweep over scenes sorted by start (overlaps and
/// gaps), then the exact duration-sum comparison.
pub fn validate_timeline(scenes: &[Scene], declared_total_seconds: i64) -> TimelineReport {
    let mut violations = Vec::new();

    // Per-scene bounds.
    for scene in scenes {
        if scene.duration_seconds <= 0 {
            violations.push(TimelineViolation::NonPositiveDuration {
                scene_id: scene.id.clone(),
                duration_seconds: scene.duration_seconds,
            });
        }
        if scene.start_at_sec < 0 {
            violations.push(TimelineViolation::NegativeStart {
                scene_id: scene.id.clone(),
                start_at_sec: scene.start_at_sec,
            });
        }
    }

    // Declared order: starts must be non-decreasing as listed.
    for pair in scenes.windows(2) {
        if pair[1].start_at_sec < pair[0].start_at_sec {
            violations.push(TimelineViolation::OutOfOrder {
                scene_id: pair[1].id.clone(),
                previous_id: pair[0].id.clone(),
            });
        }
    }

    // Interval sweep over scenes sorted by start. Tracks the furthest end
    // seen so far and which scene produced it, so overlaps spanning more
    // than one neighbor are still attributed correctly.
    let mut order: Vec<usize> = (0..scenes.len()).collect();
    order.sort_by_key(|&i| (scenes[i].start_at_sec, i));

    if let Some(&first) = order.first() {
        if scenes[first].start_at_sec > 0 {
            violations.push(TimelineViolation::LeadingGap {
                scene_id: scenes[first].id.clone(),
                start_at_sec: scenes[first].start_at_sec,
            });
        }

        // Degenerate durations are already reported above; clamp so the
        // sweep cannot produce phantom overlaps from negative ends.
        let end_of = |i: usize| scenes[i].start_at_sec + scenes[i].duration_seconds.max(0);

        let mut max_end = end_of(first);
        let mut max_end_id = &scenes[first].id;
        for &i in &order[1..] {
            let scene = &scenes[i];
            if scene.start_at_sec < max_end {
                violations.push(TimelineViolation::Overlap {
                    first_id: max_end_id.clone(),
                    second_id: scene.id.clone(),
                });
            } else if scene.start_at_sec > max_end {
                violations.push(TimelineViolation::Gap {
                    previous_id: max_end_id.clone(),
                    scene_id: scene.id.clone(),
                    gap_seconds: scene.start_at_sec - max_end,
                });
            }
            if end_of(i) > max_end {
                max_end = end_of(i);
                max_end_id = &scene.id;
            }
        }
    }

    // Exact duration-sum equality.
    let actual: i64 = scenes.iter().map(|s| s.duration_seconds).sum();
    if actual != declared_total_seconds {
        violations.push(TimelineViolation::DurationMismatch {
            declared_seconds: declared_total_seconds,
            actual_seconds: actual,
        });
    }

    TimelineReport::from_violations(violations)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
