//! Reference data for the combination and double-count checks: which age/sex
//! values each species may carry, and which distance zones of the two
//! stations look at the same stretch of sky.
//!
//! Both tables are built once (from the built-in defaults or a TOML reference
//! file) and never mutated afterwards.

use crate::domain::model::{Age, DistanceZone, Sex, Station};
use crate::utils::error::{CheckError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Species validated with joint (age, sex) tuples.
pub const HARRIERS: [&str; 5] = ["MonPalHen", "Mon", "Pal", "Hen", "Marsh"];

/// Constraint on a single optional field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldConstraint<T> {
    /// The field must be empty.
    RequiredAbsent,
    /// The field must hold one of `allowed`; if `nullable`, it may also be empty.
    OneOf { allowed: Vec<T>, nullable: bool },
}

impl<T: PartialEq> FieldConstraint<T> {
    pub fn permits(&self, value: Option<&T>) -> bool {
        match (self, value) {
            (FieldConstraint::RequiredAbsent, None) => true,
            (FieldConstraint::RequiredAbsent, Some(_)) => false,
            (FieldConstraint::OneOf { nullable, .. }, None) => *nullable,
            (FieldConstraint::OneOf { allowed, .. }, Some(v)) => allowed.contains(v),
        }
    }

    /// Builds a constraint from reference codes. No codes means the field must
    /// stay empty; an empty string among the codes makes the field nullable.
    fn from_codes<S: AsRef<str>>(codes: &[S], parse: impl Fn(&str) -> T) -> Self {
        if codes.is_empty() {
            return FieldConstraint::RequiredAbsent;
        }
        let nullable = codes.iter().any(|c| c.as_ref().is_empty());
        let allowed = codes
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| !c.is_empty())
            .map(parse)
            .collect();
        FieldConstraint::OneOf { allowed, nullable }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpectationSpec {
    Independent {
        age: FieldConstraint<Age>,
        sex: FieldConstraint<Sex>,
    },
    /// Exhaustive list of permitted (age, sex) pairs; `None` means the field is empty.
    Joint(Vec<(Option<Age>, Option<Sex>)>),
}

impl ExpectationSpec {
    /// True when a joint spec lists exactly this pair. Always false for
    /// independent specs.
    pub fn permits_combination(&self, age: Option<&Age>, sex: Option<&Sex>) -> bool {
        match self {
            ExpectationSpec::Joint(tuples) => tuples
                .iter()
                .any(|(a, s)| a.as_ref() == age && s.as_ref() == sex),
            ExpectationSpec::Independent { .. } => false,
        }
    }

    fn independent(ages: &[&str], sexes: &[&str]) -> Self {
        ExpectationSpec::Independent {
            age: FieldConstraint::from_codes(ages, Age::from_code),
            sex: FieldConstraint::from_codes(sexes, Sex::from_code),
        }
    }

    fn joint<S: AsRef<str>>(pairs: &[[S; 2]]) -> Self {
        fn code<S: AsRef<str>>(c: &S) -> Option<&str> {
            Some(c.as_ref()).filter(|c| !c.is_empty())
        }
        ExpectationSpec::Joint(
            pairs
                .iter()
                .map(|[age, sex]| (code(age).map(Age::from_code), code(sex).map(Sex::from_code)))
                .collect(),
        )
    }
}

/// Zones of the *other* station that overlap a given zone. The map is not
/// symmetric: the two stations sit at different points along the flyway.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapMap {
    zones: BTreeMap<(Station, DistanceZone), Vec<DistanceZone>>,
}

impl OverlapMap {
    pub fn builtin() -> Self {
        use DistanceZone::*;
        let station1 = [
            (W3, vec![W3]),
            (W2, vec![W3]),
            (W1, vec![W3]),
            (O, vec![W3]),
            (E1, vec![W3]),
            (E2, vec![W3, W2]),
            (E3, vec![W2, W1, O, E1, E2, E3]),
        ];
        let station2 = [
            (W3, vec![W3, W2, W1, O, E1, E2]),
            (W2, vec![E3, E2]),
            (W1, vec![E3]),
            (O, vec![E3]),
            (E1, vec![E3]),
            (E2, vec![E3]),
            (E3, vec![E3]),
        ];

        let zones = station1
            .into_iter()
            .map(|(zone, other)| ((Station::Sakhalvasho, zone), other))
            .chain(
                station2
                    .into_iter()
                    .map(|(zone, other)| ((Station::Shuamta, zone), other)),
            )
            .collect();
        Self { zones }
    }

    /// Zones on the other station seen from `zone` at `station`. Unknown zones
    /// (including `>E3`) overlap nothing.
    pub fn overlap(&self, station: Station, zone: &DistanceZone) -> &[DistanceZone] {
        self.zones
            .get(&(station, zone.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn from_file(file: OverlapFile) -> Self {
        let convert = |station: Station, table: BTreeMap<String, Vec<String>>| {
            table.into_iter().map(move |(zone, others)| {
                (
                    (station, DistanceZone::from_code(&zone)),
                    others.iter().map(|z| DistanceZone::from_code(z)).collect(),
                )
            })
        };
        let zones = convert(Station::Sakhalvasho, file.station1)
            .chain(convert(Station::Shuamta, file.station2))
            .collect();
        Self { zones }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationCatalog {
    species: BTreeMap<String, ExpectationSpec>,
    overlap: OverlapMap,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    species: BTreeMap<String, SpeciesEntry>,
    overlap: Option<OverlapFile>,
}

#[derive(Debug, Deserialize)]
struct SpeciesEntry {
    age: Option<Vec<String>>,
    sex: Option<Vec<String>>,
    combinations: Option<Vec<[String; 2]>>,
}

#[derive(Debug, Deserialize)]
struct OverlapFile {
    station1: BTreeMap<String, Vec<String>>,
    station2: BTreeMap<String, Vec<String>>,
}

impl ExpectationCatalog {
    pub fn new(species: BTreeMap<String, ExpectationSpec>, overlap: OverlapMap) -> Self {
        Self { species, overlap }
    }

    /// The reference table used at the count since the 2019 season.
    pub fn builtin() -> Self {
        const ALL_AGES: &[&str] = &["J", "I", "A", "Non-Juv"];
        const ALL_AGES_OR_NONE: &[&str] = &["J", "I", "A", "Non-Juv", ""];
        const NONE: &[&str] = &[];

        let mut species = BTreeMap::new();
        let mut add = |names: &[&str], spec: ExpectationSpec| {
            for name in names {
                species.insert(name.to_string(), spec.clone());
            }
        };

        add(
            &[
                "BK", "BK_JUV", "BK_NONJUV", "HB", "HB_JUV", "large FALCON", "Roller", "StockD",
                "TurtleD", "WoodP",
            ],
            ExpectationSpec::independent(NONE, NONE),
        );
        add(
            &[
                "BlackV", "BlaStork", "DalPel", "DemCrane", "EuCrane", "GriffonV", "Lanner",
                "Large EAGLE", "Peregrine", "ShortTE", "StepBuz", "WhitePel",
            ],
            ExpectationSpec::independent(ALL_AGES_OR_NONE, NONE),
        );
        add(
            &[
                "EgyptianV", "GoldenE", "GreaterSE", "ImperialE", "LesserSE", "SakerF", "SteppeE",
                "WhiteTE",
            ],
            ExpectationSpec::independent(ALL_AGES, NONE),
        );
        add(&["BootedE"], ExpectationSpec::independent(&["J", "Non-Juv", ""], NONE));
        add(&["CrestedHB"], ExpectationSpec::independent(&["J", "A"], &["M", "F"]));
        add(&["HB_NONJUV"], ExpectationSpec::independent(NONE, &["M", "F", ""]));
        add(&["Osprey"], ExpectationSpec::independent(ALL_AGES_OR_NONE, &["M", "F", ""]));
        add(&["WhiStork"], ExpectationSpec::independent(&["J", "A", "Non-Juv", ""], NONE));

        let sexed = [
            ["J", ""],
            ["I", "M"],
            ["A", "M"],
            ["Non-Juv", "M"],
            ["I", "F"],
            ["A", "F"],
            ["Non-Juv", "F"],
        ];
        let ringtails = [["", "FC"], ["", ""]];
        let with_ringtails: Vec<[&str; 2]> = sexed.iter().chain(ringtails.iter()).copied().collect();

        add(&["Hen", "Marsh"], ExpectationSpec::joint(&with_ringtails));
        add(&["Mon", "Pal"], ExpectationSpec::joint(&sexed));
        add(
            &["MonPalHen"],
            ExpectationSpec::joint(&[
                ["J", ""],
                ["Non-Juv", "M"],
                ["Non-Juv", "F"],
                ["", "FC"],
                ["", ""],
            ]),
        );

        Self {
            species,
            overlap: OverlapMap::builtin(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| CheckError::ConfigValidationError {
                field: "catalog".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        if file.species.is_empty() {
            return Err(CheckError::ConfigValidationError {
                field: "catalog.species".to_string(),
                message: "catalog must define at least one species".to_string(),
            });
        }

        let mut species = BTreeMap::new();
        for (name, entry) in file.species {
            let spec = match entry {
                SpeciesEntry {
                    combinations: Some(pairs),
                    age: None,
                    sex: None,
                } => ExpectationSpec::joint(&pairs),
                SpeciesEntry {
                    combinations: None,
                    age,
                    sex,
                } => ExpectationSpec::Independent {
                    age: FieldConstraint::from_codes(&age.unwrap_or_default(), Age::from_code),
                    sex: FieldConstraint::from_codes(&sex.unwrap_or_default(), Sex::from_code),
                },
                _ => {
                    return Err(CheckError::ConfigValidationError {
                        field: format!("catalog.species.{}", name),
                        message: "use either age/sex or combinations, not both".to_string(),
                    })
                }
            };
            species.insert(name, spec);
        }

        let overlap = file
            .overlap
            .map(OverlapMap::from_file)
            .unwrap_or_else(OverlapMap::builtin);

        Ok(Self { species, overlap })
    }

    pub fn lookup(&self, species: &str) -> Option<&ExpectationSpec> {
        self.species.get(species)
    }

    pub fn contains(&self, species: &str) -> bool {
        self.species.contains_key(species)
    }

    pub fn species(&self) -> impl Iterator<Item = (&str, &ExpectationSpec)> {
        self.species.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn overlap(&self, station: Station, zone: &DistanceZone) -> &[DistanceZone] {
        self.overlap.overlap(station, zone)
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

impl Default for ExpectationCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
