#![allow(dead_code)]

use std::path::{Path, PathBuf};

use fdq_client::bench_fixtures::{generate_delay_fixture, DelayFixture};
use fdq_common::BenchConfig;

pub fn scenario_fixture(root: &Path) -> DelayFixture {
    generate_delay_fixture(&root.join("fixture"), 4).expect("generate delay fixture")
}

pub fn config_for(data_source: Option<PathBuf>, output_uri: &Path) -> BenchConfig {
    BenchConfig {
        data_source,
        output_uri: Some(output_uri.to_string_lossy().to_string()),
        target_partitions: 2,
        ..BenchConfig::default()
    }
}

/// Header plus data rows of a results csv, split on commas.
pub fn read_results_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let body = std::fs::read_to_string(path).expect("read results csv");
    let mut lines = body.lines();
    let header = lines
        .next()
        .expect("header row")
        .split(',')
        .map(str::to_string)
        .collect();
    let rows = lines
        .filter(|l| !l.is_empty())
        .map(|l| l.split(',').map(str::to_string).collect())
        .collect();
    (header, rows)
}

pub fn files_under(root: &Path) -> Vec<String> {
    let mut out = std::fs::read_dir(root)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    out.sort();
    out
}
