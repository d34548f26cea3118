use crate::core::normalize::{sort_observations, Columns};
use crate::domain::model::{CheckSummary, CheckedObservation, Observation, Station};
use crate::utils::error::{CheckError, Result};
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

/// Whole seconds print without a fraction; sub-second times keep theirs.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Canonical table layout. `check` is written but never read back.
pub const CANONICAL_COLUMNS: [&str; 14] = [
    "datetime",
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
    "check",
];

fn observation_fields(o: &Observation) -> Vec<String> {
    fn text(value: Option<&str>) -> String {
        value.unwrap_or_default().to_string()
    }

    vec![
        o.datetime
            .map(|dt| dt.format(DATETIME_FORMAT).to_string())
            .unwrap_or_default(),
        text(o.station.as_ref().map(Station::label)),
        text(o.species.as_deref()),
        o.count.map(|c| c.to_string()).unwrap_or_default(),
        o.countback.map(|c| c.to_string()).unwrap_or_default(),
        if o.local { "1" } else { "0" }.to_string(),
        text(o.age.as_ref().map(|a| a.code())),
        text(o.sex.as_ref().map(|s| s.code())),
        text(o.plumage.as_deref()),
        text(o.remark.as_deref()),
        text(o.location.as_ref().map(|z| z.code())),
        text(o.migtype.as_deref()),
        text(o.counttype.as_ref().map(|c| c.code())),
    ]
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer.into_inner().map_err(|e| CheckError::StorageError {
        message: format!("Failed to flush CSV buffer: {}", e),
    })
}

/// Canonical table without the `check` column.
pub fn write_observations(records: &[&Observation]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&CANONICAL_COLUMNS[..CANONICAL_COLUMNS.len() - 1])?;
    for record in records {
        writer.write_record(observation_fields(record))?;
    }
    finish(writer)
}

pub fn write_checked(records: &[&CheckedObservation]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CANONICAL_COLUMNS)?;
    for record in records {
        let mut fields = observation_fields(&record.observation);
        fields.push(record.check_label());
        writer.write_record(fields)?;
    }
    finish(writer)
}

/// Reads a canonical table, raw or annotated, back into sorted observations.
pub fn read_observations(data: &[u8]) -> Result<Vec<Observation>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
    let required = &CANONICAL_COLUMNS[..CANONICAL_COLUMNS.len() - 1];
    let columns = Columns::require(reader.headers()?, required)?;

    let mut observations = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let row = columns.row(&record, index + 1);

        let station = match row.text("telpost") {
            None => None,
            Some(label) => Some(Station::from_label(label).ok_or_else(|| {
                CheckError::ParseError {
                    row: index + 1,
                    field: "telpost".to_string(),
                    value: label.to_string(),
                }
            })?),
        };
        let mut observation = Observation {
            datetime: row.datetime("datetime")?,
            station,
            species: row.owned("speciesname"),
            ..Default::default()
        };
        row.attributes(&mut observation)?;
        observations.push(observation);
    }

    sort_observations(&mut observations);
    Ok(observations)
}

/// Station 1 rows, then every other row. Rows without a station land in the
/// Station 2 table so nothing is lost.
pub fn split_by_station<T>(
    records: &[T],
    station: impl Fn(&T) -> Option<Station>,
) -> (Vec<&T>, Vec<&T>) {
    records
        .iter()
        .partition(|record| station(*record) == Some(Station::Sakhalvasho))
}

pub fn summary_json(summary: &CheckSummary) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(summary)?)
}

/// Packs named files into an in-memory zip archive.
pub fn bundle_zip(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
