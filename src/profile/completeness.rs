//! Profile completeness: which fields a profile must carry before the
//! matching features are unlocked.
//!
//! Pure functions of the profile value. The same input always yields the
//! same answer, with no I/O and no clock.

use serde_json::Value;

use super::Profile;

/// Fields (backend wire names) a profile needs to count as complete.
pub const REQUIRED_FIELDS: &[&str] = &["gpa"];

const PLACEHOLDERS: &[&str] = &["", "n/a", "tbd", "placeholder"];

#[must_use]
pub fn is_complete(profile: &Profile) -> bool {
    REQUIRED_FIELDS.iter().all(|field| has_value(profile, field))
}

/// Required fields that are absent, empty, or placeholders, in declaration order.
#[must_use]
pub fn missing_fields(profile: &Profile) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !has_value(profile, field))
        .collect()
}

fn has_value(profile: &Profile, field: &str) -> bool {
    match field {
        "gpa" => positive(profile.gpa),
        "familyIncome" => profile.family_income.is_some_and(f64::is_finite),
        "satScore" => profile.sat_score.is_some_and(|s| s > 0),
        "actScore" => profile.act_score.is_some_and(|s| s > 0),
        "firstGeneration" => profile.first_generation.is_some(),
        "extracurriculars" => profile.extracurriculars.iter().any(|e| meaningful(e)),
        "email" => text(profile.email.as_deref()),
        "fullName" => text(profile.full_name.as_deref()),
        "gradeLevel" => text(profile.grade_level.as_deref()),
        "intendedMajor" => text(profile.intended_major.as_deref()),
        "careerGoals" => text(profile.career_goals.as_deref()),
        "location" => text(profile.location.as_deref()),
        "state" => text(profile.state.as_deref()),
        other => profile.extra.get(other).is_some_and(extra_has_value),
    }
}

fn positive(value: Option<f64>) -> bool {
    value.is_some_and(|v| v.is_finite() && v > 0.0)
}

fn text(value: Option<&str>) -> bool {
    value.is_some_and(meaningful)
}

fn meaningful(s: &str) -> bool {
    let s = s.trim().to_ascii_lowercase();
    !PLACEHOLDERS.contains(&s.as_str())
}

fn extra_has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => meaningful(s),
        Value::Number(n) => n.as_f64().is_some_and(f64::is_finite),
        Value::Array(items) => !items.is_empty(),
        Value::Bool(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
#[path = "completeness_test.rs"]
mod tests;
