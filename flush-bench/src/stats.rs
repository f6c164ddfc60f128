use std::fmt;

/// Running mean and spread over `f64` samples (Welford).
#[derive(Debug, Default, Clone, Copy)]
pub struct MeanAccumulator {
    count: u64,
    mean: f64,
    // sum of squared deviations from the current mean
    m2: f64,
}

impl MeanAccumulator {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Standard error of the mean. Zero for a single sample.
    pub fn std_error(&self) -> Option<f64> {
        match self.count {
            0 => None,
            1 => Some(0.0),
            n => {
                let n = n as f64;
                Some((self.m2 / (n * (n - 1.0))).sqrt())
            }
        }
    }
}

/// The final throughput line.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Report {
    pub mean: f64,
    pub std_error: f64,
    pub iterations: u64,
    pub parallelism: usize,
}

impl Report {
    /// `None` if no samples were accumulated.
    pub fn new(acc: &MeanAccumulator, parallelism: usize) -> Option<Self> {
        Some(Report {
            mean: acc.mean()?,
            std_error: acc.std_error()?,
            iterations: acc.count(),
            parallelism,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} +- {:.2} partitions / sec ({} runs, {} concurrent ops)",
            self.mean, self.std_error, self.iterations, self.parallelism
        )
    }
}
