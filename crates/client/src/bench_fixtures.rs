use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, Int64Array, StringArray};
use datafusion::arrow::csv::WriterBuilder;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use fdq_common::{FdqError, Result};
use serde::{Deserialize, Serialize};

pub const FIRST_YEAR: i64 = 1987;
pub const LAST_YEAR: i64 = 2008;
/// First year whose rows carry a delay-cause breakdown; earlier cause cells are `NA`.
pub const CAUSE_BREAKDOWN_FROM: i64 = 2003;
pub const DELAY_FIXTURE_SEED: u64 = 42;
pub const DELAY_FIXTURE_FILE: &str = "delay_flights.csv";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DelayFixtureManifest {
    pub fixture: String,
    pub description: String,
    pub deterministic_seed: u64,
    pub file: String,
    pub first_year: i64,
    pub last_year: i64,
    pub rows_per_year: usize,
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DelayFixture {
    pub csv: PathBuf,
    pub manifest: DelayFixtureManifest,
}

pub fn default_delay_fixture_root() -> PathBuf {
    PathBuf::from("./tests/bench/fixtures")
}

/// Write `delay_flights.csv` plus `manifest.json` under `root`.
///
/// Output is a pure function of `rows_per_year`; reruns produce identical bytes.
pub fn generate_delay_fixture(root: &Path, rows_per_year: usize) -> Result<DelayFixture> {
    if rows_per_year == 0 {
        return Err(FdqError::InvalidConfig(
            "rows_per_year must be >= 1".to_string(),
        ));
    }
    std::fs::create_dir_all(root)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("Year", DataType::Int64, false),
        Field::new("ArrDelay", DataType::Utf8, false),
        Field::new("CarrierDelay", DataType::Utf8, false),
        Field::new("NASDelay", DataType::Utf8, false),
        Field::new("WeatherDelay", DataType::Utf8, false),
        Field::new("SecurityDelay", DataType::Utf8, false),
        Field::new("LateAircraftDelay", DataType::Utf8, false),
    ]));
    let cols = build_delay_cols(rows_per_year);
    let batch = RecordBatch::try_new(schema.clone(), cols)
        .map_err(|e| FdqError::Execution(format!("build fixture batch failed: {e}")))?;
    let rows = batch.num_rows();

    let csv = root.join(DELAY_FIXTURE_FILE);
    let file = File::create(&csv)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer
        .write(&batch)
        .map_err(|e| FdqError::Execution(format!("fixture csv write failed: {e}")))?;
    drop(writer);

    let manifest = DelayFixtureManifest {
        fixture: "delay_flights".to_string(),
        description: "Deterministic synthetic on-time performance rows, one block per year."
            .to_string(),
        deterministic_seed: DELAY_FIXTURE_SEED,
        file: DELAY_FIXTURE_FILE.to_string(),
        first_year: FIRST_YEAR,
        last_year: LAST_YEAR,
        rows_per_year,
        rows,
        columns: schema.fields().iter().map(|f| f.name().clone()).collect(),
    };
    let payload = serde_json::to_string_pretty(&manifest)
        .map_err(|e| FdqError::Execution(format!("fixture manifest encode failed: {e}")))?;
    std::fs::write(root.join("manifest.json"), payload)?;

    Ok(DelayFixture { csv, manifest })
}

#[derive(Default)]
struct DelayCols {
    year: Vec<i64>,
    arr: Vec<String>,
    carrier: Vec<String>,
    nas: Vec<String>,
    weather: Vec<String>,
    security: Vec<String>,
    late_aircraft: Vec<String>,
}

fn build_delay_cols(rows_per_year: usize) -> Vec<ArrayRef> {
    let mut c = DelayCols::default();
    for year in FIRST_YEAR..=LAST_YEAR {
        for k in 0..rows_per_year as i64 {
            let seed = year * 1_000 + k + DELAY_FIXTURE_SEED as i64;
            c.year.push(year);

            // Cancelled/diverted flights have no arrival delay at all.
            if seed % 29 == 0 {
                c.arr.push("NA".to_string());
                for col in [
                    &mut c.carrier,
                    &mut c.nas,
                    &mut c.weather,
                    &mut c.security,
                    &mut c.late_aircraft,
                ] {
                    col.push("NA".to_string());
                }
                continue;
            }

            let arr = if seed % 11 == 0 { 0 } else { 5 + (seed * 37) % 175 };
            c.arr.push(arr.to_string());

            if year < CAUSE_BREAKDOWN_FROM {
                for col in [
                    &mut c.carrier,
                    &mut c.nas,
                    &mut c.weather,
                    &mut c.security,
                    &mut c.late_aircraft,
                ] {
                    col.push("NA".to_string());
                }
                continue;
            }

            let carrier = arr * (seed % 5) / 10;
            let nas = arr * ((seed / 3) % 4) / 10;
            let weather = if seed % 7 == 0 { arr / 5 } else { 0 };
            let security = if seed % 13 == 0 && arr > 0 { 1 } else { 0 };
            let late_aircraft = (arr - carrier - nas - weather - security).max(0);
            c.carrier.push(carrier.to_string());
            c.nas.push(nas.to_string());
            c.weather.push(weather.to_string());
            c.security.push(security.to_string());
            c.late_aircraft.push(late_aircraft.to_string());
        }
    }

    vec![
        Arc::new(Int64Array::from(c.year)),
        Arc::new(StringArray::from(c.arr)),
        Arc::new(StringArray::from(c.carrier)),
        Arc::new(StringArray::from(c.nas)),
        Arc::new(StringArray::from(c.weather)),
        Arc::new(StringArray::from(c.security)),
        Arc::new(StringArray::from(c.late_aircraft)),
    ]
}
