use crate::domain::model::Observation;
use chrono::Duration;

/// A species recorded as a total plus aged sub-counts of the same birds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeciesGroup {
    pub total: &'static str,
    pub non_juvenile: &'static str,
    pub juvenile: &'static str,
}

pub const HONEY_BUZZARD: SpeciesGroup = SpeciesGroup {
    total: "HB",
    non_juvenile: "HB_NONJUV",
    juvenile: "HB_JUV",
};

pub const BLACK_KITE: SpeciesGroup = SpeciesGroup {
    total: "BK",
    non_juvenile: "BK_NONJUV",
    juvenile: "BK_JUV",
};

impl SpeciesGroup {
    fn member(&self, record: &Observation) -> bool {
        record.species_in(&[self.total, self.non_juvenile, self.juvenile])
    }
}

#[derive(Debug, Default)]
struct WindowTotals {
    total: u64,
    non_juvenile: u64,
    juvenile: u64,
}

/// Flags aged sub-count records whose window holds more aged birds than the
/// total for the same station and zone.
///
/// The window is `[t - half_width, t + half_width]`, inclusive. Records for
/// which `skip` returns true are neither evaluated nor flagged, but still
/// contribute to the windows of other records. Total records are never flagged.
pub fn count_age_mismatches(
    records: &[Observation],
    group: &SpeciesGroup,
    half_width: Duration,
    skip: impl Fn(&Observation) -> bool,
) -> Vec<usize> {
    let members: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| group.member(r))
        .map(|(index, _)| index)
        .collect();

    let mut flagged = Vec::new();
    for &index in &members {
        let record = &records[index];
        if record.species_is(group.total) || skip(record) {
            continue;
        }

        let (Some(datetime), Some(station), Some(zone)) =
            (record.datetime, record.station, record.location.as_ref())
        else {
            continue;
        };
        let window_start = datetime - half_width;
        let window_end = datetime + half_width;

        let mut totals = WindowTotals::default();
        for other in members.iter().map(|&i| &records[i]) {
            let in_window = other
                .datetime
                .is_some_and(|dt| dt >= window_start && dt <= window_end);
            if !in_window || other.station != Some(station) || other.location.as_ref() != Some(zone) {
                continue;
            }

            let count = u64::from(other.count.unwrap_or(0));
            if other.species_is(group.total) {
                totals.total += count;
            } else if other.species_is(group.non_juvenile) {
                totals.non_juvenile += count;
            } else {
                totals.juvenile += count;
            }
        }

        if totals.non_juvenile + totals.juvenile > totals.total {
            flagged.push(index);
        }
    }
    flagged
}
