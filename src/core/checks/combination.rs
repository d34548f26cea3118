use super::UnknownSpeciesPolicy;
use crate::domain::catalog::{ExpectationCatalog, ExpectationSpec};
use crate::domain::model::{Age, DistanceZone, Observation};
use crate::utils::error::{CheckError, Result};

/// Pseudo-species marking the start and end of a count session.
pub const COUNT_TIME_MARKERS: [&str; 2] = ["START", "END"];

/// Harriers whose juveniles cannot be told apart at the far zones.
const AGEABLE_HARRIERS: [&str; 4] = ["Mon", "Pal", "Hen", "Marsh"];
const FAR_ZONES: [DistanceZone; 2] = [DistanceZone::W3, DistanceZone::E3];

#[derive(Debug, Default, PartialEq)]
pub struct CombinationFindings {
    pub unexpected_age: Vec<usize>,
    pub unexpected_sex: Vec<usize>,
    pub unexpected_combination: Vec<usize>,
}

/// Checks every record's age and sex against its species' catalog entry.
pub fn check_combinations(
    records: &[Observation],
    catalog: &ExpectationCatalog,
    policy: UnknownSpeciesPolicy,
) -> Result<CombinationFindings> {
    let mut findings = CombinationFindings::default();

    for (index, record) in records.iter().enumerate() {
        let Some(species) = record.species.as_deref() else {
            continue;
        };
        let Some(spec) = catalog.lookup(species) else {
            if policy == UnknownSpeciesPolicy::Reject && !COUNT_TIME_MARKERS.contains(&species) {
                return Err(CheckError::UnknownSpeciesError {
                    row: index,
                    species: species.to_string(),
                });
            }
            continue;
        };

        match spec {
            ExpectationSpec::Independent { age, sex } => {
                if !age.permits(record.age.as_ref()) {
                    findings.unexpected_age.push(index);
                }
                if !sex.permits(record.sex.as_ref()) {
                    findings.unexpected_sex.push(index);
                }
            }
            ExpectationSpec::Joint(_) => {
                if !spec.permits_combination(record.age.as_ref(), record.sex.as_ref()) {
                    findings.unexpected_combination.push(index);
                }
            }
        }
    }

    Ok(findings)
}

pub fn unreliable_juvenile_ageing(records: &[Observation]) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.species_in(&AGEABLE_HARRIERS)
                && r.zone_in(&FAR_ZONES)
                && r.age == Some(Age::Juvenile)
        })
        .map(|(index, _)| index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checks::test_support::obs;
    use crate::domain::catalog::FieldConstraint;
    use crate::domain::catalog::OverlapMap;
    use crate::domain::model::Sex;
    use std::collections::BTreeMap;

    fn aged(species: &str, age: Option<Age>, sex: Option<Sex>) -> Observation {
        let mut record = obs(species, 1, "O");
        record.age = age;
        record.sex = sex;
        record
    }

    #[test]
    fn test_independent_constraints() {
        let mut species = BTreeMap::new();
        species.insert(
            "X".to_string(),
            ExpectationSpec::Independent {
                age: FieldConstraint::OneOf {
                    allowed: vec![Age::Juvenile, Age::Adult],
                    nullable: false,
                },
                sex: FieldConstraint::OneOf {
                    allowed: vec![Sex::Male, Sex::Female],
                    nullable: false,
                },
            },
        );
        let catalog = ExpectationCatalog::new(species, OverlapMap::builtin());

        let records = [
            aged("X", Some(Age::Immature), Some(Sex::Male)),
            aged("X", Some(Age::Juvenile), Some(Sex::Male)),
            aged("X", Some(Age::Adult), None),
        ];
        let findings =
            check_combinations(&records, &catalog, UnknownSpeciesPolicy::Ignore).unwrap();
        assert_eq!(findings.unexpected_age, vec![0]);
        assert_eq!(findings.unexpected_sex, vec![2]);
        assert!(findings.unexpected_combination.is_empty());
    }

    #[test]
    fn test_required_absent_fields() {
        let catalog = ExpectationCatalog::builtin();
        let records = [
            aged("HB", None, None),
            aged("HB", Some(Age::Juvenile), None),
            aged("HB", None, Some(Sex::Female)),
            aged("HB", Some(Age::Other("2cy".to_string())), None),
        ];
        let findings =
            check_combinations(&records, &catalog, UnknownSpeciesPolicy::Ignore).unwrap();
        assert_eq!(findings.unexpected_age, vec![1, 3]);
        assert_eq!(findings.unexpected_sex, vec![2]);
    }

    #[test]
    fn test_harrier_tuples() {
        let catalog = ExpectationCatalog::builtin();
        let records = [
            aged("Hen", None, None),
            aged("Hen", Some(Age::Juvenile), Some(Sex::Male)),
            aged("Marsh", None, Some(Sex::FemaleColoured)),
            aged("Pal", None, Some(Sex::FemaleColoured)),
        ];
        let findings =
            check_combinations(&records, &catalog, UnknownSpeciesPolicy::Ignore).unwrap();
        assert_eq!(findings.unexpected_combination, vec![1, 3]);
        assert!(findings.unexpected_age.is_empty());
        assert!(findings.unexpected_sex.is_empty());
    }

    #[test]
    fn test_unknown_species_policy() {
        let catalog = ExpectationCatalog::builtin();
        let records = [obs("START", 1, "O"), aged("Dodo", Some(Age::Adult), None)];

        let ignored =
            check_combinations(&records, &catalog, UnknownSpeciesPolicy::Ignore).unwrap();
        assert_eq!(ignored, CombinationFindings::default());

        match check_combinations(&records, &catalog, UnknownSpeciesPolicy::Reject) {
            Err(CheckError::UnknownSpeciesError { row, species }) => {
                assert_eq!(row, 1);
                assert_eq!(species, "Dodo");
            }
            other => panic!("expected unknown species error, got {:?}", other),
        }
    }

    #[test]
    fn test_unreliable_juvenile_ageing() {
        let mut far_juv = aged("Mon", Some(Age::Juvenile), None);
        far_juv.location = Some(DistanceZone::E3);
        let mut near_juv = aged("Mon", Some(Age::Juvenile), None);
        near_juv.location = Some(DistanceZone::E2);
        let mut far_adult = aged("Pal", Some(Age::Adult), Some(Sex::Male));
        far_adult.location = Some(DistanceZone::W3);
        let mut lumped = aged("MonPalHen", Some(Age::Juvenile), None);
        lumped.location = Some(DistanceZone::W3);

        assert_eq!(
            unreliable_juvenile_ageing(&[far_juv, near_juv, far_adult, lumped]),
            vec![0]
        );
    }
}
