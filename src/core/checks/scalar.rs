use super::FocusPeriod;
use crate::domain::model::{DistanceZone, Observation, Station};

/// The only species expected to show dark and light morphs.
const MORPH_SPECIES: &str = "BootedE";
const MORPH_CODES: [&str; 2] = ["D", "L"];

const AGED_COMPOSITES: [&str; 4] = ["HB_JUV", "HB_NONJUV", "BK_JUV", "BK_NONJUV"];

/// Zones too far out to age honey buzzards and black kites reliably.
const AGEING_OUT_OF_RANGE: [DistanceZone; 5] = [
    DistanceZone::W3,
    DistanceZone::W2,
    DistanceZone::E2,
    DistanceZone::E3,
    DistanceZone::BeyondE3,
];

fn matching(records: &[Observation], predicate: impl Fn(&Observation) -> bool) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| predicate(record))
        .map(|(index, _)| index)
        .collect()
}

/// A kill/injury marker on a record of more than one bird.
pub fn excess_kill(records: &[Observation]) -> Vec<usize> {
    matching(records, |r| r.migtype.is_some() && r.count.is_some_and(|c| c > 1))
}

pub fn incomplete(records: &[Observation]) -> Vec<usize> {
    matching(records, |r| {
        r.datetime.is_none()
            || r.station.is_none()
            || r.species.is_none()
            || r.count.is_none()
            || r.location.is_none()
    })
}

pub fn out_of_range(records: &[Observation]) -> Vec<usize> {
    matching(records, |r| r.location == Some(DistanceZone::BeyondE3))
}

pub fn nonstandard_morph(records: &[Observation]) -> Vec<usize> {
    matching(records, |r| {
        !r.species_is(MORPH_SPECIES)
            && r
                .plumage
                .as_deref()
                .is_some_and(|p| MORPH_CODES.contains(&p))
    })
}

pub fn missing_timestamp(records: &[Observation]) -> Vec<usize> {
    matching(records, Observation::has_midnight_timestamp)
}

/// Station 2 honey buzzard totals in the focus period are expected to be
/// single counts.
pub fn singlecount_missing(records: &[Observation], focus: &FocusPeriod) -> Vec<usize> {
    matching(records, |r| {
        r.species_is("HB")
            && !r.is_single_count()
            && r.datetime.is_some_and(|dt| focus.contains(dt))
            && r.station == Some(Station::Shuamta)
    })
}

pub fn ageing_distance(records: &[Observation]) -> Vec<usize> {
    matching(records, |r| {
        r.species_in(&AGED_COMPOSITES) && r.zone_in(&AGEING_OUT_OF_RANGE)
    })
}
