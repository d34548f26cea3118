use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The two count stations of the Batumi bottleneck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Station {
    /// Station 1, Trektellen site 1047.
    Sakhalvasho,
    /// Station 2, Trektellen site 1048.
    Shuamta,
}

impl Station {
    pub const ALL: [Station; 2] = [Station::Sakhalvasho, Station::Shuamta];

    pub fn label(&self) -> &'static str {
        match self {
            Station::Sakhalvasho => "1. Sakhalvasho",
            Station::Shuamta => "2. Shuamta",
        }
    }

    pub fn trektellen_id(&self) -> u32 {
        match self {
            Station::Sakhalvasho => 1047,
            Station::Shuamta => 1048,
        }
    }

    /// Suffix used in persisted file names (`20190901_S1.csv`).
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Station::Sakhalvasho => "S1",
            Station::Shuamta => "S2",
        }
    }

    pub fn from_trektellen_id(id: u32) -> Option<Self> {
        Station::ALL.into_iter().find(|s| s.trektellen_id() == id)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Station::ALL.into_iter().find(|s| s.label() == label)
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Age {
    Juvenile,
    Immature,
    Adult,
    NonJuvenile,
    /// A code outside the recording vocabulary, kept so it can be flagged.
    Other(String),
}

impl Age {
    pub fn from_code(code: &str) -> Self {
        match code {
            "J" => Age::Juvenile,
            "I" => Age::Immature,
            "A" => Age::Adult,
            "Non-Juv" => Age::NonJuvenile,
            other => Age::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Age::Juvenile => "J",
            Age::Immature => "I",
            Age::Adult => "A",
            Age::NonJuvenile => "Non-Juv",
            Age::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sex {
    Male,
    Female,
    /// Female-coloured ("ringtail") harrier that cannot be sexed further.
    FemaleColoured,
    Other(String),
}

impl Sex {
    pub fn from_code(code: &str) -> Self {
        match code {
            "M" => Sex::Male,
            "F" => Sex::Female,
            "FC" => Sex::FemaleColoured,
            other => Sex::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::FemaleColoured => "FC",
            Sex::Other(code) => code,
        }
    }
}

/// Lateral distance bin of a sighting relative to the station, west to east.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DistanceZone {
    W3,
    W2,
    W1,
    O,
    E1,
    E2,
    E3,
    BeyondE3,
    Other(String),
}

impl DistanceZone {
    pub fn from_code(code: &str) -> Self {
        match code {
            "W3" => DistanceZone::W3,
            "W2" => DistanceZone::W2,
            "W1" => DistanceZone::W1,
            "O" => DistanceZone::O,
            "E1" => DistanceZone::E1,
            "E2" => DistanceZone::E2,
            "E3" => DistanceZone::E3,
            ">E3" => DistanceZone::BeyondE3,
            other => DistanceZone::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            DistanceZone::W3 => "W3",
            DistanceZone::W2 => "W2",
            DistanceZone::W1 => "W1",
            DistanceZone::O => "O",
            DistanceZone::E1 => "E1",
            DistanceZone::E2 => "E2",
            DistanceZone::E3 => "E3",
            DistanceZone::BeyondE3 => ">E3",
            DistanceZone::Other(code) => code,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CountType {
    DoubleCount,
    SingleCount,
    Other(String),
}

impl CountType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "D" => CountType::DoubleCount,
            "S" => CountType::SingleCount,
            other => CountType::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            CountType::DoubleCount => "D",
            CountType::SingleCount => "S",
            CountType::Other(code) => code,
        }
    }
}

/// One normalised count record.
///
/// Every column may be absent in the source data; absence is a data quality
/// issue reported by the completeness check, never a reason to drop the row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub datetime: Option<NaiveDateTime>,
    pub station: Option<Station>,
    pub species: Option<String>,
    pub count: Option<u32>,
    pub countback: Option<i32>,
    pub local: bool,
    pub age: Option<Age>,
    pub sex: Option<Sex>,
    pub plumage: Option<String>,
    pub remark: Option<String>,
    pub location: Option<DistanceZone>,
    pub migtype: Option<String>,
    pub counttype: Option<CountType>,
}

impl Observation {
    pub fn species_is(&self, name: &str) -> bool {
        self.species.as_deref() == Some(name)
    }

    pub fn species_in(&self, names: &[&str]) -> bool {
        self.species
            .as_deref()
            .is_some_and(|species| names.contains(&species))
    }

    pub fn is_double_count(&self) -> bool {
        self.counttype == Some(CountType::DoubleCount)
    }

    /// Absent count types are not single counts.
    pub fn is_single_count(&self) -> bool {
        self.counttype == Some(CountType::SingleCount)
    }

    pub fn zone_in(&self, zones: &[DistanceZone]) -> bool {
        self.location.as_ref().is_some_and(|zone| zones.contains(zone))
    }

    /// Ingestion substitutes midnight for a missing clock time.
    pub fn has_midnight_timestamp(&self) -> bool {
        self.datetime
            .is_some_and(|dt| dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0)
    }
}

/// Review labels, declared in the order they appear in the `check` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flag {
    UnexpectedAge,
    UnexpectedSex,
    UnexpectedAgeSexCombination,
    AgeingDistance,
    SinglecountMissing,
    CountAgeMismatch,
    UnexpectedMorph,
    IncorrectTimestamp,
    UnusualLocation,
    EssentialGaps,
    ErroneousDoublecount,
    UnusualKilledInjured,
    UnreliableAgeing,
}

impl Flag {
    pub const ALL: [Flag; 13] = [
        Flag::UnexpectedAge,
        Flag::UnexpectedSex,
        Flag::UnexpectedAgeSexCombination,
        Flag::AgeingDistance,
        Flag::SinglecountMissing,
        Flag::CountAgeMismatch,
        Flag::UnexpectedMorph,
        Flag::IncorrectTimestamp,
        Flag::UnusualLocation,
        Flag::EssentialGaps,
        Flag::ErroneousDoublecount,
        Flag::UnusualKilledInjured,
        Flag::UnreliableAgeing,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Flag::UnexpectedAge => "unexpected age",
            Flag::UnexpectedSex => "unexpected sex",
            Flag::UnexpectedAgeSexCombination => "unexpected age + sex combination",
            Flag::AgeingDistance => "ageing distance",
            Flag::SinglecountMissing => "singlecount missing? (leave as is)",
            Flag::CountAgeMismatch => "mismatch number of counted and aged birds",
            Flag::UnexpectedMorph => "unexpected morph",
            Flag::IncorrectTimestamp => "incorrect timestamp",
            Flag::UnusualLocation => "unusual location",
            Flag::EssentialGaps => "gaps in essential columns",
            Flag::ErroneousDoublecount => "erroneous doublecount",
            Flag::UnusualKilledInjured => "unusual nr of killed/injured birds",
            Flag::UnreliableAgeing => "unreliable ageing",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Flag::ALL.into_iter().find(|flag| flag.label() == label)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered, duplicate-free set of flags for one record.
pub type FlagSet = BTreeSet<Flag>;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckedObservation {
    pub observation: Observation,
    pub check: FlagSet,
}

impl CheckedObservation {
    /// The `check` column: labels in fixed order joined by `", "`.
    pub fn check_label(&self) -> String {
        self.check
            .iter()
            .map(Flag::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Which slice of the export a run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSelection {
    /// One calendar day, `[date 00:00, date+1 00:00)`.
    Day(NaiveDate),
    /// A whole season, `(start, end]`.
    Season {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl RunSelection {
    pub fn contains(&self, datetime: NaiveDateTime) -> bool {
        match self {
            RunSelection::Day(date) => datetime.date() == *date,
            RunSelection::Season { start, end } => datetime > *start && datetime <= *end,
        }
    }

    /// `YYYYMMDD` for a day, `YYYYMMDD-YYYYMMDD` for a season.
    pub fn file_stem(&self) -> String {
        match self {
            RunSelection::Day(date) => date.format("%Y%m%d").to_string(),
            RunSelection::Season { start, end } => {
                format!("{}-{}", start.format("%Y%m%d"), end.format("%Y%m%d"))
            }
        }
    }

    /// The calendar year whose Trektellen export holds this selection.
    pub fn export_year(&self) -> i32 {
        use chrono::Datelike;
        match self {
            RunSelection::Day(date) => date.year(),
            RunSelection::Season { start, .. } => start.year(),
        }
    }
}

/// Per-run totals, written next to the annotated tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub records: usize,
    pub flagged_records: usize,
    pub flags: BTreeMap<String, usize>,
}

impl CheckSummary {
    pub fn from_checked(checked: &[CheckedObservation]) -> Self {
        let mut summary = CheckSummary {
            records: checked.len(),
            ..Default::default()
        };
        for record in checked {
            if !record.check.is_empty() {
                summary.flagged_records += 1;
            }
            for flag in &record.check {
                *summary.flags.entry(flag.label().to_string()).or_insert(0) += 1;
            }
        }
        summary
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub checked: Vec<CheckedObservation>,
    pub summary: CheckSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_known_vocabulary() {
        for code in ["W3", "W2", "W1", "O", "E1", "E2", "E3", ">E3"] {
            assert_eq!(DistanceZone::from_code(code).code(), code);
        }
        assert_eq!(Age::from_code("Non-Juv"), Age::NonJuvenile);
        assert_eq!(Sex::from_code("FC"), Sex::FemaleColoured);
        assert_eq!(Age::from_code("2cy"), Age::Other("2cy".to_string()));
    }

    #[test]
    fn test_station_lookup() {
        assert_eq!(Station::from_trektellen_id(1048), Some(Station::Shuamta));
        assert_eq!(Station::from_trektellen_id(9999), None);
        assert_eq!(Station::from_label("1. Sakhalvasho"), Some(Station::Sakhalvasho));
    }

    #[test]
    fn test_check_label_follows_declaration_order() {
        let checked = CheckedObservation {
            observation: Observation::default(),
            check: [Flag::UnreliableAgeing, Flag::UnexpectedAge, Flag::EssentialGaps]
                .into_iter()
                .collect(),
        };
        assert_eq!(
            checked.check_label(),
            "unexpected age, gaps in essential columns, unreliable ageing"
        );
    }

    #[test]
    fn test_midnight_sentinel() {
        let midnight = NaiveDate::from_ymd_opt(2019, 9, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let obs = Observation {
            datetime: Some(midnight),
            ..Default::default()
        };
        assert!(obs.has_midnight_timestamp());
        assert!(!Observation::default().has_midnight_timestamp());
    }

    #[test]
    fn test_season_selection_excludes_start() {
        let at = |d, h| {
            NaiveDate::from_ymd_opt(2019, 8, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
        };
        let season = RunSelection::Season {
            start: at(15, 0),
            end: at(31, 0),
        };
        assert!(!season.contains(at(15, 0)));
        assert!(season.contains(at(15, 9)));
        assert!(season.contains(at(31, 0)));
        assert_eq!(season.file_stem(), "20190815-20190831");
    }
}
