use std::fmt;

/// Summary statistics of a timing series, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

impl Summary {
    /// `None` for an empty series.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        let var = sorted.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        Some(Self {
            count,
            mean,
            median,
            stdev: var.sqrt(),
            min: sorted[0],
            max: sorted[count - 1],
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean={:.3e} median={:.3e} stdev={:.3e} min={:.3e} max={:.3e} n={}",
            self.mean, self.median, self.stdev, self.min, self.max, self.count
        )
    }
}

/// One line of statistics for `samples`, prefixed with `label`.
pub fn format_stats(label: &str, samples: &[f64]) -> String {
    match Summary::from_samples(samples) {
        Some(s) => format!("{label} {s}"),
        None => format!("{label} no samples"),
    }
}
