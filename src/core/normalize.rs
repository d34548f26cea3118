//! Turns a raw Trektellen CSV export into sorted canonical observations.

use crate::domain::model::{
    Age, CountType, DistanceZone, Observation, RunSelection, Sex, Station,
};
use crate::utils::error::{CheckError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

/// Columns the export must provide. Anything else (`countid`, `speciesid`,
/// `year`, `yday`, ...) is ignored.
pub const RAW_COLUMNS: [&str; 14] = [
    "date",
    "timestamp",
    "telpost",
    "speciesname",
    "count",
    "countback",
    "local",
    "age",
    "sex",
    "plumage",
    "remark",
    "location",
    "migtype",
    "counttype",
];

/// Species code renamed on import; older exports used it for aged non-juveniles.
const LEGACY_SPECIES: [(&str, &str); 1] = [("HB_AD", "HB_NONJUV")];

/// Opening hours of one station on the checked day, added to the table as
/// `START`/`END` rows.
///
/// Written as `S1=07:00-17:30` on the command line, in TOML and in the
/// `COUNT_SESSIONS` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountSession {
    pub station: Station,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl CountSession {
    fn markers(&self, date: NaiveDate) -> [Observation; 2] {
        let marker = |species: &str, time: NaiveTime| Observation {
            datetime: Some(date.and_time(time)),
            station: Some(self.station),
            species: Some(species.to_string()),
            count: Some(1),
            countback: Some(0),
            local: false,
            location: Some(DistanceZone::O),
            ..Default::default()
        };
        [marker("START", self.start), marker("END", self.end)]
    }
}

impl FromStr for CountSession {
    type Err = CheckError;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = |reason: &str| CheckError::InvalidConfigValueError {
            field: "session".to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let time = |text: &str| {
            ["%H:%M:%S", "%H:%M"]
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(text.trim(), format).ok())
                .ok_or_else(|| invalid("expected HH:MM clock times"))
        };

        let (station, hours) = value
            .split_once('=')
            .ok_or_else(|| invalid("expected STATION=START-END, e.g. S1=07:00-17:30"))?;
        let station = Station::ALL
            .into_iter()
            .find(|s| s.file_suffix().eq_ignore_ascii_case(station.trim()))
            .ok_or_else(|| invalid("station must be S1 or S2"))?;
        let (start, end) = hours
            .split_once('-')
            .ok_or_else(|| invalid("expected START-END"))?;
        let (start, end) = (time(start)?, time(end)?);
        if start > end {
            return Err(invalid("session starts after it ends"));
        }
        Ok(Self { station, start, end })
    }
}

impl TryFrom<String> for CountSession {
    type Error = CheckError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CountSession> for String {
    fn from(session: CountSession) -> Self {
        format!(
            "{}={}-{}",
            session.station.file_suffix(),
            session.start.format("%H:%M"),
            session.end.format("%H:%M")
        )
    }
}

/// Parses a comma-separated session list such as `S1=07:00-17:00,S2=07:30-16:00`.
pub fn parse_sessions(value: &str) -> Result<Vec<CountSession>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

/// Header-name to column-position lookup for one CSV table.
pub(crate) struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    pub(crate) fn require(headers: &csv::StringRecord, required: &[&str]) -> Result<Self> {
        let index: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_string(), i))
            .collect();
        if let Some(missing) = required.iter().find(|c| !index.contains_key(**c)) {
            return Err(CheckError::MissingColumnError {
                column: missing.to_string(),
            });
        }
        Ok(Self { index })
    }

    pub(crate) fn row<'a>(&'a self, record: &'a csv::StringRecord, row: usize) -> Row<'a> {
        Row {
            record,
            columns: self,
            row,
        }
    }
}

/// Typed accessors for the cells of one row. Empty cells read as `None`.
pub(crate) struct Row<'a> {
    record: &'a csv::StringRecord,
    columns: &'a Columns,
    row: usize,
}

impl<'a> Row<'a> {
    pub(crate) fn text(&self, column: &str) -> Option<&'a str> {
        let position = *self.columns.index.get(column)?;
        self.record
            .get(position)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn owned(&self, column: &str) -> Option<String> {
        self.text(column).map(str::to_string)
    }

    fn parse_error(&self, column: &str, value: &str) -> CheckError {
        CheckError::ParseError {
            row: self.row,
            field: column.to_string(),
            value: value.to_string(),
        }
    }

    /// Integers, also accepting the `3.0` spelling spreadsheets produce.
    pub(crate) fn integer(&self, column: &str) -> Result<Option<i64>> {
        let Some(value) = self.text(column) else {
            return Ok(None);
        };
        if let Ok(n) = value.parse::<i64>() {
            return Ok(Some(n));
        }
        match value.parse::<f64>() {
            Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(Some(f as i64)),
            _ => Err(self.parse_error(column, value)),
        }
    }

    pub(crate) fn count(&self, column: &str) -> Result<Option<u32>> {
        match self.integer(column)? {
            None => Ok(None),
            Some(n) => u32::try_from(n)
                .map(Some)
                .map_err(|_| self.parse_error(column, &n.to_string())),
        }
    }

    pub(crate) fn countback(&self, column: &str) -> Result<Option<i32>> {
        match self.integer(column)? {
            None => Ok(None),
            Some(n) => i32::try_from(n)
                .map(Some)
                .map_err(|_| self.parse_error(column, &n.to_string())),
        }
    }

    pub(crate) fn flag(&self, column: &str) -> Result<bool> {
        match self.text(column) {
            None => Ok(false),
            Some("1" | "1.0" | "true" | "True" | "TRUE") => Ok(true),
            Some("0" | "0.0" | "false" | "False" | "FALSE") => Ok(false),
            Some(other) => Err(self.parse_error(column, other)),
        }
    }

    pub(crate) fn datetime(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        let Some(value) = self.text(column) else {
            return Ok(None);
        };
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
            .map(Some)
            .ok_or_else(|| self.parse_error(column, value))
    }

    /// Fills the shared attribute columns of an observation.
    pub(crate) fn attributes(&self, observation: &mut Observation) -> Result<()> {
        observation.count = self.count("count")?;
        observation.countback = self.countback("countback")?;
        observation.local = self.flag("local")?;
        observation.age = self.text("age").map(Age::from_code);
        observation.sex = self.text("sex").map(Sex::from_code);
        observation.plumage = self.owned("plumage");
        observation.remark = self.owned("remark");
        observation.location = self.text("location").map(DistanceZone::from_code);
        observation.migtype = self.owned("migtype");
        observation.counttype = self.text("counttype").map(CountType::from_code);
        Ok(())
    }
}

/// Orders absent values after present ones.
fn absent_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable sort by (datetime, station), the order every check assumes.
pub fn sort_observations(observations: &mut [Observation]) {
    observations.sort_by(|a, b| {
        absent_last(&a.datetime, &b.datetime).then_with(|| absent_last(&a.station, &b.station))
    });
}

pub struct Normalizer {
    selection: RunSelection,
    sessions: Vec<CountSession>,
}

impl Normalizer {
    pub fn new(selection: RunSelection) -> Self {
        Self {
            selection,
            sessions: Vec::new(),
        }
    }

    pub fn with_sessions(mut self, sessions: Vec<CountSession>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn parse_export(&self, export: &str) -> Result<Vec<Observation>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(export.as_bytes());
        let columns = Columns::require(reader.headers()?, &RAW_COLUMNS)?;

        let mut observations = Vec::new();
        for (row_number, record) in reader.records().enumerate() {
            let record = record?;
            observations.push(self.parse_row(&columns.row(&record, row_number + 1))?);
        }
        let exported = observations.len();

        match self.selection {
            RunSelection::Day(date) => observations.extend(
                self.sessions.iter().flat_map(|session| session.markers(date)),
            ),
            RunSelection::Season { .. } if !self.sessions.is_empty() => {
                tracing::warn!("Count sessions only apply to single-day runs; ignoring them");
            }
            RunSelection::Season { .. } => {}
        }
        sort_observations(&mut observations);

        let before_selection = observations.len();
        let undated = observations.iter().filter(|o| o.datetime.is_none()).count();
        observations.retain(|o| o.datetime.is_some_and(|dt| self.selection.contains(dt)));
        if undated > 0 {
            tracing::warn!("Dropped {} undated row(s) that fit no selection", undated);
        }

        tracing::info!(
            "Normalized {} exported rows, kept {} of {} for {}",
            exported,
            observations.len(),
            before_selection,
            self.selection.file_stem()
        );
        Ok(observations)
    }

    fn parse_row(&self, row: &Row<'_>) -> Result<Observation> {
        let mut observation = Observation {
            datetime: Self::combine_date_time(row)?,
            station: match row.integer("telpost")? {
                None => None,
                Some(id) => Some(
                    u32::try_from(id)
                        .ok()
                        .and_then(Station::from_trektellen_id)
                        .ok_or_else(|| row.parse_error("telpost", &id.to_string()))?,
                ),
            },
            species: row.text("speciesname").map(|name| {
                LEGACY_SPECIES
                    .iter()
                    .find(|(legacy, _)| *legacy == name)
                    .map_or(name, |(_, current)| *current)
                    .to_string()
            }),
            ..Default::default()
        };
        row.attributes(&mut observation)?;
        Ok(observation)
    }

    /// A missing clock time becomes midnight, which the timestamp check
    /// later reports.
    fn combine_date_time(row: &Row<'_>) -> Result<Option<NaiveDateTime>> {
        let Some(date_text) = row.text("date") else {
            return Ok(None);
        };
        let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d")
            .map_err(|_| row.parse_error("date", date_text))?;

        let time = match row.text("timestamp") {
            None => NaiveTime::MIN,
            Some(text) => ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
                .ok_or_else(|| row.parse_error("timestamp", text))?,
        };
        Ok(Some(date.and_time(time)))
    }
}
