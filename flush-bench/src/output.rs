//! Machine-readable results, written next to the human-readable report line.

use std::{collections::HashMap, fmt, path::Path};

use itertools::Itertools;
use serde_with::serde_as;

use crate::{coordinator::RunSummary, stats::Report};

const LATENCY_PERCENTILES: [f64; 5] = [50.0, 90.0, 99.0, 99.9, 100.0];

fn latency_percentiles_serialize<S>(
    values: &[f64; LATENCY_PERCENTILES.len()],
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serde::Serialize::serialize(
        &LATENCY_PERCENTILES
            .iter()
            .map(|p| format!("p{p}"))
            .zip(values.iter().cloned())
            .collect::<HashMap<_, _>>(),
        serializer,
    )
}

/// Distribution of individual shard flush durations.
#[derive(Debug, serde::Serialize)]
pub struct FlushLatencySummary {
    pub count: u64,
    pub latency_min_us: f64,
    pub latency_mean_us: f64,
    pub latency_max_us: f64,
    #[serde(serialize_with = "latency_percentiles_serialize")]
    pub latency_percentiles_us: [f64; LATENCY_PERCENTILES.len()],
}

impl FlushLatencySummary {
    pub fn from_histogram(histo: &hdrhistogram::Histogram<u64>) -> Self {
        FlushLatencySummary {
            count: histo.len(),
            latency_min_us: histo.min() as f64 / 1000.0,
            latency_mean_us: histo.mean() / 1000.0,
            latency_max_us: histo.max() as f64 / 1000.0,
            latency_percentiles_us: {
                let mut values = [0.0; LATENCY_PERCENTILES.len()];
                for (i, value_ref) in values.iter_mut().enumerate() {
                    *value_ref = histo.value_at_percentile(LATENCY_PERCENTILES[i]) as f64 / 1000.0;
                }
                values
            },
        }
    }
}

impl fmt::Display for FlushLatencySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "flushes={} LAT(us): min={:.0} mean={:.0} max={:.0} {}",
            self.count,
            self.latency_min_us,
            self.latency_mean_us,
            self.latency_max_us,
            self.latency_percentiles_us
                .iter()
                .zip(LATENCY_PERCENTILES.iter())
                .map(|(v, p)| format!("p{p}={v:.0}"))
                .join(" "),
        )
    }
}

#[serde_as]
#[derive(serde::Serialize)]
pub struct BenchmarkOutput<'a, A: serde::Serialize> {
    pub args: &'a A,
    pub aggregates: &'a [f64],
    pub report: Option<Report>,
    pub flush_latency: FlushLatencySummary,
    #[serde_as(as = "serde_with::DurationMicroSeconds")]
    pub elapsed_us: std::time::Duration,
}

impl<'a, A: serde::Serialize> BenchmarkOutput<'a, A> {
    pub fn new(args: &'a A, summary: &'a RunSummary) -> Self {
        BenchmarkOutput {
            args,
            aggregates: &summary.aggregates,
            report: summary.report(),
            flush_latency: FlushLatencySummary::from_histogram(&summary.flush_latencies),
            elapsed_us: summary.elapsed,
        }
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
    }
}
