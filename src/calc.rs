use crate::model::{ClassRecord, ScoreValue};

const CUTOFF_A: f64 = 89.45;
const CUTOFF_B: f64 = 79.45;
const CUTOFF_C: f64 = 69.45;
const CUTOFF_D: f64 = 59.45;

/// Assignments sharing one exact weight value, with earned and possible
/// points summed independently. Derived per calculation, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightGroup {
    pub weight: f64,
    pub earned: f64,
    pub total: f64,
}

impl WeightGroup {
    /// None when the group has no possible points; such groups are excluded
    /// from the grade instead of penalizing it.
    pub fn percentage(&self) -> Option<f64> {
        if self.total > 0.0 {
            Some(self.earned / self.total * 100.0)
        } else {
            None
        }
    }
}

/// Coerce an editable score cell to points for aggregation. Blank cells count
/// as 0. This is the single coercion point between interactive edits and the
/// grade math.
pub fn score_points(v: ScoreValue) -> f64 {
    match v {
        ScoreValue::Empty => 0.0,
        ScoreValue::Number(n) => n,
    }
}

/// Group assignments by exact weight value, ordered by ascending weight.
pub fn weight_groups(record: &ClassRecord) -> Vec<WeightGroup> {
    let mut groups: Vec<WeightGroup> = Vec::new();
    for a in &record.assignments {
        let earned = score_points(a.earned_score);
        let total = score_points(a.total_score);
        match groups
            .iter_mut()
            .find(|g| g.weight.to_bits() == a.weight.to_bits())
        {
            Some(g) => {
                g.earned += earned;
                g.total += total;
            }
            None => groups.push(WeightGroup {
                weight: a.weight,
                earned,
                total,
            }),
        }
    }
    groups.sort_by(|a, b| a.weight.total_cmp(&b.weight));
    groups
}

/// Weighted class percentage in [0, 100], rounded to 2 decimal places.
///
/// Each weight group contributes its percentage scaled by its weight; groups
/// with zero possible points contribute to neither accumulator. An empty
/// class, or one where every group is empty, is 0.
pub fn compute_grade(record: &ClassRecord) -> f64 {
    let mut weighted_sum = 0.0_f64;
    let mut weight_total = 0.0_f64;

    for g in weight_groups(record) {
        let Some(percentage) = g.percentage() else {
            continue;
        };
        weighted_sum += percentage * g.weight;
        weight_total += g.weight;
    }

    if weight_total == 0.0 {
        0.0
    } else {
        round2(weighted_sum / weight_total)
    }
}

pub fn letter_grade(percentage: f64) -> &'static str {
    if percentage >= CUTOFF_A {
        return "A";
    }
    if percentage >= CUTOFF_B {
        return "B";
    }
    if percentage >= CUTOFF_C {
        return "C";
    }
    if percentage >= CUTOFF_D {
        return "D";
    }
    "E"
}

pub fn gpa_value(percentage: f64) -> f64 {
    if percentage >= CUTOFF_A {
        return 4.0;
    }
    if percentage >= CUTOFF_B {
        return 3.0;
    }
    if percentage >= CUTOFF_C {
        return 2.0;
    }
    if percentage >= CUTOFF_D {
        return 1.0;
    }
    0.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
