use cap_core::errors::{CapError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Regular binning along one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Number of in-range bins.
    pub bins: usize,
    /// Lower edge of the first bin.
    pub low: f64,
    /// Upper edge of the last bin.
    pub high: f64,
    /// Axis label.
    #[serde(default)]
    pub label: String,
}

impl Axis {
    /// Creates an axis; requires `bins > 0` and `low < high`.
    pub fn new(bins: usize, low: f64, high: f64) -> Result<Self, CapError> {
        if bins == 0 || !(low < high) {
            return Err(CapError::Histogram(
                ErrorInfo::new("axis-range", "axis needs at least one bin and low < high")
                    .with_context("bins", bins.to_string())
                    .with_context("low", low.to_string())
                    .with_context("high", high.to_string()),
            ));
        }
        Ok(Self {
            bins,
            low,
            high,
            label: String::new(),
        })
    }

    /// Sets the axis label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Cell index along this axis: 0 is underflow, `bins + 1` is overflow.
    pub fn locate(&self, x: f64) -> usize {
        if x.is_nan() || x < self.low {
            0
        } else if x >= self.high {
            self.bins + 1
        } else {
            let width = (self.high - self.low) / self.bins as f64;
            (((x - self.low) / width) as usize).min(self.bins - 1) + 1
        }
    }

    /// Centre of in-range bin `bin` (1-based).
    pub fn center(&self, bin: usize) -> f64 {
        let width = (self.high - self.low) / self.bins as f64;
        self.low + (bin as f64 - 0.5) * width
    }

    fn cells(&self) -> usize {
        self.bins + 2
    }
}

/// N-dimensional binned counter with under/overflow cells.
///
/// Each cell keeps the sum of weights and the sum of squared weights; the
/// error of a cell is `sqrt(sum_w2)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HistogramDocument")]
pub struct Histogram {
    name: String,
    category: usize,
    axes: Vec<Axis>,
    sum_w: Vec<f64>,
    sum_w2: Vec<f64>,
    entries: u64,
}

/// Serialized form, checked before it becomes a [`Histogram`].
#[derive(Deserialize)]
struct HistogramDocument {
    name: String,
    category: usize,
    axes: Vec<Axis>,
    sum_w: Vec<f64>,
    sum_w2: Vec<f64>,
    entries: u64,
}

impl TryFrom<HistogramDocument> for Histogram {
    type Error = CapError;

    fn try_from(document: HistogramDocument) -> Result<Self, Self::Error> {
        let HistogramDocument {
            name,
            category,
            axes,
            sum_w,
            sum_w2,
            entries,
        } = document;
        if axes.is_empty() {
            return Err(layout_error(&name, "a histogram needs at least one axis".to_owned()));
        }
        for axis in &axes {
            Axis::new(axis.bins, axis.low, axis.high)
                .map_err(|err| layout_error(&name, err.info().message.clone()))?;
        }
        let cells: usize = axes.iter().map(Axis::cells).product();
        if sum_w.len() != cells || sum_w2.len() != cells {
            return Err(layout_error(
                &name,
                format!(
                    "expected {cells} cells, found {} weights and {} squared weights",
                    sum_w.len(),
                    sum_w2.len()
                ),
            ));
        }
        Ok(Self {
            name,
            category,
            axes,
            sum_w,
            sum_w2,
            entries,
        })
    }
}

fn layout_error(name: &str, message: String) -> CapError {
    CapError::Histogram(
        ErrorInfo::new("histogram-layout", message).with_context("histogram", name),
    )
}

impl Histogram {
    /// Creates an empty histogram belonging to filter category `category`.
    pub fn new(name: impl Into<String>, category: usize, axes: Vec<Axis>) -> Result<Self, CapError> {
        let name = name.into();
        if axes.is_empty() {
            return Err(CapError::Histogram(
                ErrorInfo::new("histogram-axes", "a histogram needs at least one axis")
                    .with_context("histogram", name),
            ));
        }
        let cells = axes.iter().map(Axis::cells).product();
        Ok(Self {
            name,
            category,
            axes,
            sum_w: vec![0.0; cells],
            sum_w2: vec![0.0; cells],
            entries: 0,
        })
    }

    /// One-dimensional shorthand.
    pub fn new_1d(
        name: impl Into<String>,
        category: usize,
        bins: usize,
        low: f64,
        high: f64,
    ) -> Result<Self, CapError> {
        Self::new(name, category, vec![Axis::new(bins, low, high)?])
    }

    /// Histogram name, unique within its group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Filter category used for normalization.
    pub fn category(&self) -> usize {
        self.category
    }

    /// Axes in dimension order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Total number of cells including under/overflow.
    pub fn cells(&self) -> usize {
        self.sum_w.len()
    }

    /// Number of fill calls since the last reset.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Adds `weight` at `coords`; the coordinate count must match the axes.
    pub fn fill(&mut self, coords: &[f64], weight: f64) -> Result<(), CapError> {
        if coords.len() != self.axes.len() {
            return Err(CapError::Histogram(
                ErrorInfo::new("histogram-dimension", "coordinate count does not match axes")
                    .with_context("histogram", self.name.clone())
                    .with_context("expected", self.axes.len().to_string())
                    .with_context("actual", coords.len().to_string()),
            ));
        }
        let cell = self.linear_index(coords);
        self.sum_w[cell] += weight;
        self.sum_w2[cell] += weight * weight;
        self.entries += 1;
        Ok(())
    }

    fn linear_index(&self, coords: &[f64]) -> usize {
        let mut index = 0;
        let mut stride = 1;
        for (axis, &x) in self.axes.iter().zip(coords) {
            index += axis.locate(x) * stride;
            stride *= axis.cells();
        }
        index
    }

    /// Content of cell `cell` (linear index).
    pub fn content(&self, cell: usize) -> f64 {
        self.sum_w[cell]
    }

    /// Error of cell `cell`.
    pub fn error(&self, cell: usize) -> f64 {
        self.sum_w2[cell].sqrt()
    }

    /// All cell contents.
    pub fn contents(&self) -> &[f64] {
        &self.sum_w
    }

    /// Content of a 1-D in-range bin (1-based, as returned by [`Axis::locate`]).
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.sum_w[bin]
    }

    /// Returns true when every weight sum and squared weight sum is finite.
    pub fn is_finite(&self) -> bool {
        self.sum_w.iter().chain(&self.sum_w2).all(|value| value.is_finite())
    }

    /// Sum of in-range and out-of-range contents.
    pub fn integral(&self) -> f64 {
        self.sum_w.iter().sum()
    }

    /// Overwrites a cell with a central value and its error.
    pub fn set_cell(&mut self, cell: usize, value: f64, error: f64) {
        self.sum_w[cell] = value;
        self.sum_w2[cell] = error * error;
    }

    /// Overrides the entry count (used when rebuilding derived histograms).
    pub fn set_entries(&mut self, entries: u64) {
        self.entries = entries;
    }

    /// Multiplies every cell by `factor` (errors scale linearly).
    pub fn scale(&mut self, factor: f64) {
        let factor2 = factor * factor;
        for value in &mut self.sum_w {
            *value *= factor;
        }
        for value in &mut self.sum_w2 {
            *value *= factor2;
        }
    }

    /// Zeroes every cell and the entry count.
    pub fn reset(&mut self) {
        self.sum_w.iter_mut().for_each(|value| *value = 0.0);
        self.sum_w2.iter_mut().for_each(|value| *value = 0.0);
        self.entries = 0;
    }

    /// Returns true when name, category and binning agree.
    pub fn same_layout(&self, other: &Histogram) -> bool {
        self.name == other.name
            && self.category == other.category
            && self.axes == other.axes
            && self.sum_w.len() == other.sum_w.len()
    }

    /// Returns a zeroed copy with the same layout.
    pub fn empty_like(&self) -> Histogram {
        let mut copy = self.clone();
        copy.reset();
        copy
    }
}
