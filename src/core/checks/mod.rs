//! The flagging engine: independent rule checks over one ordered table of
//! observations, merged into a per-record set of review flags.
//!
//! Every rule reads the same immutable slice and reports row indices; the
//! [`Annotator`] folds those into ordered [`FlagSet`]s. No rule mutates or
//! drops data.

pub mod aggregation;
pub mod annotator;
pub mod combination;
pub mod doublecount;
pub mod scalar;

pub use annotator::Annotator;

use crate::domain::catalog::ExpectationCatalog;
use crate::domain::model::{CheckedObservation, Flag, FlagSet, Observation, Station};
use crate::utils::error::{CheckError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Inclusive date-time range with special expectations for Station 2 honey
/// buzzards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl FocusPeriod {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Bounds are dates (`2019-08-20`, read as midnight) or full date-times.
    /// A date-only end therefore excludes the rest of that day.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Ok(Self {
            start: parse_datetime_bound("focus_start", start)?,
            end: parse_datetime_bound("focus_end", end)?,
        })
    }

    pub fn contains(&self, datetime: NaiveDateTime) -> bool {
        datetime >= self.start && datetime <= self.end
    }
}

pub fn parse_datetime_bound(field: &str, value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| CheckError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS".to_string(),
        })
}

/// What to do with a species that has no catalog entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownSpeciesPolicy {
    /// Skip the age/sex checks for the record.
    #[default]
    Ignore,
    /// Abort the run with a structural error.
    Reject,
}

impl FromStr for UnknownSpeciesPolicy {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ignore" => Ok(UnknownSpeciesPolicy::Ignore),
            "reject" => Ok(UnknownSpeciesPolicy::Reject),
            other => Err(CheckError::InvalidConfigValueError {
                field: "unknown_species".to_string(),
                value: other.to_string(),
                reason: "expected 'ignore' or 'reject'".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckParameters {
    /// Half-width of the aged-count window, in minutes.
    pub window_minutes: i64,
    pub focus_period: FocusPeriod,
    pub unknown_species: UnknownSpeciesPolicy,
}

impl CheckParameters {
    pub fn new(window_minutes: i64, focus_period: FocusPeriod) -> Self {
        Self {
            window_minutes,
            focus_period,
            unknown_species: UnknownSpeciesPolicy::default(),
        }
    }
}

pub struct FlaggingEngine {
    catalog: ExpectationCatalog,
    params: CheckParameters,
}

impl FlaggingEngine {
    pub fn new(catalog: ExpectationCatalog, params: CheckParameters) -> Self {
        Self { catalog, params }
    }

    pub fn catalog(&self) -> &ExpectationCatalog {
        &self.catalog
    }

    pub fn parameters(&self) -> &CheckParameters {
        &self.params
    }

    /// One flag set per input record, in input order. `records` must already
    /// be sorted by (datetime, station).
    pub fn evaluate(&self, records: &[Observation]) -> Result<Vec<FlagSet>> {
        let focus = self.params.focus_period;
        let window = Duration::minutes(self.params.window_minutes);

        let combinations =
            combination::check_combinations(records, &self.catalog, self.params.unknown_species)?;

        // Station 2 honey buzzards in the focus period are expected to be
        // single-counted; their aged records are judged by the undercount
        // heuristic instead.
        let hb_mismatches =
            aggregation::count_age_mismatches(records, &aggregation::HONEY_BUZZARD, window, |r| {
                r.station == Some(Station::Shuamta)
                    && !r.is_single_count()
                    && r.datetime.is_some_and(|dt| focus.contains(dt))
            });
        let bk_mismatches =
            aggregation::count_age_mismatches(records, &aggregation::BLACK_KITE, window, |_| false);

        let mut annotator = Annotator::new(records.len());
        annotator.mark(Flag::UnexpectedAge, combinations.unexpected_age);
        annotator.mark(Flag::UnexpectedSex, combinations.unexpected_sex);
        annotator.mark(
            Flag::UnexpectedAgeSexCombination,
            combinations.unexpected_combination,
        );
        annotator.mark(Flag::AgeingDistance, scalar::ageing_distance(records));
        annotator.mark(
            Flag::SinglecountMissing,
            scalar::singlecount_missing(records, &focus),
        );
        annotator.mark(Flag::CountAgeMismatch, hb_mismatches);
        annotator.mark(Flag::CountAgeMismatch, bk_mismatches);
        annotator.mark(Flag::UnexpectedMorph, scalar::nonstandard_morph(records));
        annotator.mark(Flag::IncorrectTimestamp, scalar::missing_timestamp(records));
        annotator.mark(Flag::UnusualLocation, scalar::out_of_range(records));
        annotator.mark(Flag::EssentialGaps, scalar::incomplete(records));
        annotator.mark(
            Flag::ErroneousDoublecount,
            doublecount::erroneous_doublecounts(records, &self.catalog),
        );
        annotator.mark(Flag::UnusualKilledInjured, scalar::excess_kill(records));
        annotator.mark(
            Flag::UnreliableAgeing,
            combination::unreliable_juvenile_ageing(records),
        );

        Ok(annotator.into_flags())
    }

    pub fn annotate(&self, records: Vec<Observation>) -> Result<Vec<CheckedObservation>> {
        let flags = self.evaluate(&records)?;
        let checked: Vec<CheckedObservation> = records
            .into_iter()
            .zip(flags)
            .map(|(observation, check)| CheckedObservation { observation, check })
            .collect();

        let flagged = checked.iter().filter(|c| !c.check.is_empty()).count();
        tracing::info!(
            "Checked {} records, {} flagged for review",
            checked.len(),
            flagged
        );
        Ok(checked)
    }
}
