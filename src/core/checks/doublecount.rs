//! Cross-station double-count pairing.
//!
//! A bird logged by both stations is entered twice with count type `D`. In
//! table order, such records should come in adjacent pairs: same bird, other
//! station, overlapping zone, at most ten minutes apart. The walk below only
//! ever compares a record with its immediate successor in the double-count
//! subsequence; a matched pair is consumed as a whole, a mismatch flags the
//! first record and moves on by one.

use crate::domain::catalog::ExpectationCatalog;
use crate::domain::model::Observation;
use chrono::Duration;

pub const MAX_PAIR_GAP_MINUTES: i64 = 10;

/// Row indices (into `records`) of double-counts that do not pair up with
/// their successor. The final double-count has no successor and is never
/// flagged by this check.
pub fn erroneous_doublecounts(records: &[Observation], catalog: &ExpectationCatalog) -> Vec<usize> {
    let doublecounts: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_double_count())
        .map(|(index, _)| index)
        .collect();

    let mut flagged = Vec::new();
    let mut cursor = 0;
    while cursor + 1 < doublecounts.len() {
        let current = &records[doublecounts[cursor]];
        let next = &records[doublecounts[cursor + 1]];

        if is_suspicious_pair(current, next, catalog) {
            flagged.push(doublecounts[cursor]);
            cursor += 1;
        } else {
            cursor += 2;
        }
    }
    flagged
}

/// Age and sex are not compared. The historical comparison of the partners'
/// age and sex never reported a difference, so partners that disagree on
/// them still pair up.
fn is_suspicious_pair(current: &Observation, next: &Observation, catalog: &ExpectationCatalog) -> bool {
    let too_far_apart = match (current.datetime, next.datetime) {
        (Some(a), Some(b)) => b - a > Duration::minutes(MAX_PAIR_GAP_MINUTES),
        _ => false,
    };

    let same_station = matches!(
        (current.station, next.station),
        (Some(a), Some(b)) if a == b
    );

    let zones_overlap = match (current.station, &current.location, &next.location) {
        (Some(station), Some(zone), Some(next_zone)) => {
            catalog.overlap(station, zone).contains(next_zone)
        }
        _ => false,
    };

    too_far_apart
        || !both_equal(&current.species, &next.species)
        || !both_equal(&current.count, &next.count)
        || !both_equal(&current.countback, &next.countback)
        || same_station
        || !zones_overlap
}

/// Equal only when both sides are present; an empty field never matches.
fn both_equal<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checks::test_support::{at, double};
    use crate::domain::model::{Age, Sex, Station};

    fn catalog() -> ExpectationCatalog {
        ExpectationCatalog::builtin()
    }

    #[test]
    fn test_matched_pair_is_consumed() {
        let a = double(Station::Sakhalvasho, at(1, 9, 0), "StepBuz", 4, "W3");
        let b = double(Station::Shuamta, at(1, 9, 5), "StepBuz", 4, "W3");
        assert!(erroneous_doublecounts(&[a, b], &catalog()).is_empty());
    }

    #[test]
    fn test_mismatch_flags_current_and_steps_by_one() {
        // a/b differ in count, so a is flagged and b is compared with c.
        let a = double(Station::Sakhalvasho, at(1, 9, 0), "StepBuz", 4, "W3");
        let b = double(Station::Shuamta, at(1, 9, 2), "StepBuz", 5, "W3");
        let c = double(Station::Sakhalvasho, at(1, 9, 4), "StepBuz", 5, "W3");
        let flagged = erroneous_doublecounts(&[a, b, c], &catalog());
        assert_eq!(flagged, vec![0]);
    }

    #[test]
    fn test_never_compares_non_adjacent_records() {
        // a and b pair up; c is the unmatched tail and stays unflagged.
        let a = double(Station::Sakhalvasho, at(1, 9, 0), "StepBuz", 4, "W3");
        let b = double(Station::Shuamta, at(1, 9, 5), "StepBuz", 4, "W3");
        let c = double(Station::Shuamta, at(1, 11, 0), "BlackV", 1, "E3");
        assert!(erroneous_doublecounts(&[a, b, c], &catalog()).is_empty());
    }

    #[test]
    fn test_indices_refer_to_the_full_table() {
        let mut plain = double(Station::Sakhalvasho, at(1, 8, 0), "HB", 100, "O");
        plain.counttype = None;
        let a = double(Station::Sakhalvasho, at(1, 9, 0), "StepBuz", 4, "W3");
        let b = double(Station::Sakhalvasho, at(1, 9, 1), "StepBuz", 4, "W3");
        let c = double(Station::Shuamta, at(1, 9, 3), "StepBuz", 4, "W3");
        let flagged = erroneous_doublecounts(&[plain, a, b, c], &catalog());
        // a and b share a station; b then pairs with c.
        assert_eq!(flagged, vec![1]);
    }

    #[test]
    fn test_each_criterion_marks_pair_suspicious() {
        let base_a = double(Station::Sakhalvasho, at(1, 9, 0), "StepBuz", 4, "W3");
        let base_b = double(Station::Shuamta, at(1, 9, 5), "StepBuz", 4, "W3");
        let cat = catalog();
        assert!(!is_suspicious_pair(&base_a, &base_b, &cat));

        let mut late = base_b.clone();
        late.datetime = Some(at(1, 9, 11));
        assert!(is_suspicious_pair(&base_a, &late, &cat));

        let mut exactly_ten = base_b.clone();
        exactly_ten.datetime = Some(at(1, 9, 10));
        assert!(!is_suspicious_pair(&base_a, &exactly_ten, &cat));

        let mut other_species = base_b.clone();
        other_species.species = Some("BlackV".to_string());
        assert!(is_suspicious_pair(&base_a, &other_species, &cat));

        let mut countback = base_b.clone();
        countback.countback = Some(1);
        assert!(is_suspicious_pair(&base_a, &countback, &cat));

        let mut same_station = base_b.clone();
        same_station.station = Some(Station::Sakhalvasho);
        assert!(is_suspicious_pair(&base_a, &same_station, &cat));

        // Station 1 W3 only overlaps Station 2 W3.
        let mut far_zone = base_b.clone();
        far_zone.location = Some(crate::domain::model::DistanceZone::E3);
        assert!(is_suspicious_pair(&base_a, &far_zone, &cat));
    }

    #[test]
    fn test_age_and_sex_differences_do_not_break_a_pair() {
        let mut a = double(Station::Sakhalvasho, at(1, 9, 0), "Hen", 1, "W3");
        a.age = Some(Age::Adult);
        a.sex = Some(Sex::Male);
        let mut b = double(Station::Shuamta, at(1, 9, 1), "Hen", 1, "W3");
        b.age = None;
        b.sex = Some(Sex::Female);
        assert!(!is_suspicious_pair(&a, &b, &catalog()));
    }

    #[test]
    fn test_empty_species_never_match() {
        let mut a = double(Station::Sakhalvasho, at(1, 9, 0), "HB", 1, "W3");
        a.species = None;
        let mut b = double(Station::Shuamta, at(1, 9, 1), "HB", 1, "W3");
        b.species = None;
        assert!(is_suspicious_pair(&a, &b, &catalog()));
    }
}
