use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, Float64Array, Int64Array};
use datafusion::arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use fdq_common::{FdqError, Result};

/// Timed runs per query template.
pub const ITERATIONS_PER_QUERY: usize = 5;

/// Fixed header of the results file.
pub const RESULTS_COLUMNS: [&str; ITERATIONS_PER_QUERY + 1] = [
    "Query_Number",
    "Time_Iteration_1",
    "Time_Iteration_2",
    "Time_Iteration_3",
    "Time_Iteration_4",
    "Time_Iteration_5",
];

/// One output row: query number plus its timings in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingRecord {
    query_number: u32,
    timings_secs: [f64; ITERATIONS_PER_QUERY],
}

impl TimingRecord {
    pub fn new(query_number: u32, timings_secs: Vec<f64>) -> Result<Self> {
        let got = timings_secs.len();
        let timings_secs: [f64; ITERATIONS_PER_QUERY] =
            timings_secs.try_into().map_err(|_| {
                FdqError::Execution(format!(
                    "query {query_number} has {got} timings, expected {ITERATIONS_PER_QUERY}"
                ))
            })?;
        if let Some(bad) = timings_secs.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(FdqError::Execution(format!(
                "query {query_number} has invalid timing {bad}"
            )));
        }
        Ok(Self {
            query_number,
            timings_secs,
        })
    }

    pub fn query_number(&self) -> u32 {
        self.query_number
    }

    pub fn timings_secs(&self) -> &[f64; ITERATIONS_PER_QUERY] {
        &self.timings_secs
    }

    pub fn mean_secs(&self) -> f64 {
        self.timings_secs.iter().sum::<f64>() / ITERATIONS_PER_QUERY as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultsTable {
    records: Vec<TimingRecord>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TimingRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TimingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn schema() -> SchemaRef {
        let mut fields = vec![Field::new(RESULTS_COLUMNS[0], DataType::Int64, false)];
        fields.extend(
            RESULTS_COLUMNS[1..]
                .iter()
                .map(|name| Field::new(*name, DataType::Float64, false)),
        );
        Arc::new(Schema::new(fields))
    }

    /// Column-major arrow view of the table, ready for the engine's writer.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let numbers = self
            .records
            .iter()
            .map(|r| i64::from(r.query_number))
            .collect::<Vec<_>>();
        let mut cols: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(numbers))];
        for iteration in 0..ITERATIONS_PER_QUERY {
            let values = self
                .records
                .iter()
                .map(|r| r.timings_secs[iteration])
                .collect::<Vec<_>>();
            cols.push(Arc::new(Float64Array::from(values)));
        }
        RecordBatch::try_new(Self::schema(), cols)
            .map_err(|e| FdqError::Engine(format!("build results batch failed: {e}")))
    }
}
