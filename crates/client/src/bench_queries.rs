/// The delay-cause ratio queries, one per cause column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchmarkQueryId {
    CarrierDelay,
    NasDelay,
    WeatherDelay,
    LateAircraftDelay,
    SecurityDelay,
}

impl BenchmarkQueryId {
    pub fn stable_id(self) -> &'static str {
        match self {
            Self::CarrierDelay => "carrier_delay_ratio",
            Self::NasDelay => "nas_delay_ratio",
            Self::WeatherDelay => "weather_delay_ratio",
            Self::LateAircraftDelay => "late_aircraft_delay_ratio",
            Self::SecurityDelay => "security_delay_ratio",
        }
    }

    /// Numerator column; the divisor is always `ArrDelay`.
    pub fn delay_column(self) -> &'static str {
        match self {
            Self::CarrierDelay => "CarrierDelay",
            Self::NasDelay => "NASDelay",
            Self::WeatherDelay => "WeatherDelay",
            Self::LateAircraftDelay => "LateAircraftDelay",
            Self::SecurityDelay => "SecurityDelay",
        }
    }

    /// Per-year average of `delay_column / ArrDelay * 100`, newest year first.
    ///
    /// Cells that do not parse as numbers (`NA`) and zero arrival delays turn
    /// into NULL and drop out of the average.
    pub fn sql(self, view: &str) -> String {
        format!(
            "SELECT Year, avg((TRY_CAST({col} AS DOUBLE) / nullif(TRY_CAST(ArrDelay AS DOUBLE), 0)) * 100) \
             AS Year_wise_carrier_delay FROM {view} GROUP BY Year ORDER BY Year DESC",
            col = self.delay_column(),
        )
    }
}

/// Execution order of the benchmark; position + 1 is the reported query number.
pub const CANONICAL_BENCHMARK_QUERIES: [BenchmarkQueryId; 5] = [
    BenchmarkQueryId::CarrierDelay,
    BenchmarkQueryId::NasDelay,
    BenchmarkQueryId::WeatherDelay,
    BenchmarkQueryId::LateAircraftDelay,
    BenchmarkQueryId::SecurityDelay,
];

/// Columns every dataset must carry for the templates to plan.
pub const REQUIRED_DATASET_COLUMNS: [&str; 7] = [
    "Year",
    "ArrDelay",
    "CarrierDelay",
    "NASDelay",
    "WeatherDelay",
    "SecurityDelay",
    "LateAircraftDelay",
];

pub fn query_number(index: usize) -> u32 {
    (index + 1) as u32
}
