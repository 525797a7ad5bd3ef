//! Course schedule resolver: day parity, course-name deduplication and the
//! alternating two-day display order.

use chrono::{Datelike, NaiveDate};
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::error::AppError;
use crate::store;

/// Fixed number of course slots in the schedule form.
pub const COURSE_SLOTS: usize = 4;

/// Even day-of-month is schedule day 2, odd is day 1. Recomputed on every
/// load, never persisted.
pub fn day_parity(date: NaiveDate) -> u8 {
    if date.day() % 2 == 0 { 2 } else { 1 }
}

/// Display order effective on the given schedule day. Day 2 with a full
/// four-slot schedule swaps each adjacent pair; every other input is
/// returned unchanged.
pub fn effective_order(courses: &[String], current_day: u8) -> Vec<String> {
    if current_day == 2 && courses.len() == COURSE_SLOTS {
        vec![
            courses[1].clone(),
            courses[0].clone(),
            courses[3].clone(),
            courses[2].clone(),
        ]
    } else {
        courses.to_vec()
    }
}

/// Disambiguates repeated non-empty names with an occurrence counter: the
/// first occurrence keeps the bare name, later ones get `name2`, `name3`, …
/// in input order. Empty slots are preserved positionally as-is.
pub fn dedupe_courses(inputs: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    inputs
        .iter()
        .map(|name| {
            if name.is_empty() {
                return String::new();
            }
            let count = seen.entry(name.as_str()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name.clone()
            } else {
                format!("{}{}", name, count)
            }
        })
        .collect()
}

/// Replaces any prior course list wholesale with the deduplicated inputs.
pub async fn set_courses(db: &SqlitePool, inputs: &[String]) -> Result<Vec<String>, AppError> {
    if inputs.len() != COURSE_SLOTS {
        return Err(AppError::Validation(format!(
            "Expected {} course slots, got {}",
            COURSE_SLOTS,
            inputs.len()
        )));
    }
    let courses = dedupe_courses(inputs);
    store::save_courses(db, &courses).await?;
    Ok(courses)
}

/// Clears the persisted course list entirely.
pub async fn reset_courses(db: &SqlitePool) -> Result<(), AppError> {
    store::clear_courses(db).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn courses(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_day_parity() {
        assert_eq!(day_parity(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()), 2);
        assert_eq!(day_parity(NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()), 1);
        assert_eq!(day_parity(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()), 1);
    }

    #[test]
    fn test_effective_order_day_two_swaps_pairs() {
        let input = courses(&["Math", "Bio", "Chem", "Eng"]);
        assert_eq!(
            effective_order(&input, 2),
            courses(&["Bio", "Math", "Eng", "Chem"])
        );
    }

    #[test]
    fn test_effective_order_day_one_is_identity() {
        let input = courses(&["Math", "Bio", "Chem", "Eng"]);
        assert_eq!(effective_order(&input, 1), input);
    }

    #[test]
    fn test_effective_order_wrong_length_is_identity() {
        let three = courses(&["Math", "Bio", "Chem"]);
        assert_eq!(effective_order(&three, 2), three);
        let empty: Vec<String> = vec![];
        assert_eq!(effective_order(&empty, 2), empty);
    }

    #[test]
    fn test_dedupe_appends_occurrence_counter() {
        let input = courses(&["Math", "Bio", "Math", "Math"]);
        assert_eq!(
            dedupe_courses(&input),
            courses(&["Math", "Bio", "Math2", "Math3"])
        );
    }

    #[test]
    fn test_dedupe_leaves_empty_slots_alone() {
        let input = courses(&["Math", "", "", "Math"]);
        assert_eq!(dedupe_courses(&input), courses(&["Math", "", "", "Math2"]));
    }
}
