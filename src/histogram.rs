//! Fixed-width histograms with ROOT-style bin numbering.
//!
//! Bin `0` is the underflow bin and bin `n_bins + 1` the overflow bin, so the
//! addressable range of regular bins is `1..=n_bins`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub n_bins: usize,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(n_bins: usize, min: f64, max: f64) -> Self {
        Self { n_bins, min, max }
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 1.0) * self.bin_width()
    }

    pub fn bin_up_edge(&self, bin: usize) -> f64 {
        self.min + bin as f64 * self.bin_width()
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 0.5) * self.bin_width()
    }

    /// Bin number for `x`, including the flow bins.
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.min {
            0
        } else if x >= self.max || self.n_bins == 0 {
            self.n_bins + 1
        } else {
            let bin = ((x - self.min) / self.bin_width()) as usize + 1;
            bin.min(self.n_bins)
        }
    }

    /// Axis limits moved so that `center` becomes zero.
    pub fn shifted_limits(&self, center: f64) -> (f64, f64) {
        (self.min - center, self.max - center)
    }
}

/// Number of cells spanned by `axes`, flow bins included; `None` on overflow.
fn flow_len(axes: &[Axis]) -> Option<usize> {
    axes.iter()
        .try_fold(1usize, |len, axis| len.checked_mul(axis.n_bins.checked_add(2)?))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    pub axis: Axis,
    contents: Vec<f64>,
    entries: f64,
}

impl Hist1D {
    pub fn new(n_bins: usize, min: f64, max: f64) -> Self {
        Self::with_axis(Axis::new(n_bins, min, max))
    }

    pub fn with_axis(axis: Axis) -> Self {
        Self {
            axis,
            contents: vec![0.0; axis.n_bins + 2],
            entries: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0)
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        let bin = self.axis.find_bin(x);
        self.contents[bin] += weight;
        self.entries += 1.0;
    }

    pub fn content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    pub fn set_content(&mut self, bin: usize, value: f64) {
        if let Some(slot) = self.contents.get_mut(bin) {
            *slot = value;
        }
    }

    pub fn set_entries(&mut self, entries: f64) {
        self.entries = entries;
    }

    pub fn entries(&self) -> f64 {
        self.entries
    }

    pub fn n_bins(&self) -> usize {
        self.axis.n_bins
    }

    /// Whether the stored contents cover every bin of the axis, flow bins included.
    pub fn is_consistent(&self) -> bool {
        flow_len(&[self.axis]) == Some(self.contents.len())
    }

    /// Sum of the regular bins.
    pub fn integral(&self) -> f64 {
        self.contents[1..=self.axis.n_bins].iter().sum()
    }

    /// `(bin center, content)` of every regular bin.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        (1..=self.axis.n_bins).map(|bin| (self.axis.bin_center(bin), self.contents[bin]))
    }

    fn moments(&self) -> (f64, f64, f64) {
        self.bins()
            .fold((0.0, 0.0, 0.0), |(sw, swx, swx2), (x, w)| {
                (sw + w, swx + w * x, swx2 + w * x * x)
            })
    }

    /// Mean of the regular bins, weighted by content; zero for an empty histogram.
    pub fn mean(&self) -> f64 {
        let (sw, swx, _) = self.moments();
        if sw == 0.0 {
            0.0
        } else {
            swx / sw
        }
    }

    /// Standard deviation about the mean (ROOT's `GetRMS`).
    pub fn rms(&self) -> f64 {
        let (sw, swx, swx2) = self.moments();
        if sw == 0.0 {
            return 0.0;
        }
        let mean = swx / sw;
        (swx2 / sw - mean * mean).max(0.0).sqrt()
    }

    pub fn minimum(&self) -> f64 {
        self.bins().map(|(_, c)| c).fold(f64::INFINITY, f64::min)
    }

    pub fn maximum(&self) -> f64 {
        self.bins().map(|(_, c)| c).fold(f64::NEG_INFINITY, f64::max)
    }

    /// Regular bin with the largest content whose center lies in `[low, high]`.
    pub fn maximum_bin_in(&self, low: f64, high: f64) -> Option<usize> {
        (1..=self.axis.n_bins)
            .filter(|&bin| {
                let x = self.axis.bin_center(bin);
                x >= low && x <= high
            })
            .fold(None, |best: Option<usize>, bin| match best {
                Some(b) if self.contents[b] >= self.contents[bin] => Some(b),
                _ => Some(bin),
            })
    }

    /// Merges groups of `ngroup` adjacent bins.
    ///
    /// Bins left over when `n_bins` is not a multiple of `ngroup` go to the
    /// overflow bin and the upper axis edge shrinks accordingly.
    pub fn rebin(&self, ngroup: usize) -> Hist1D {
        let n = self.axis.n_bins;
        if ngroup <= 1 || n == 0 {
            return self.clone();
        }
        let ngroup = ngroup.min(n);
        let new_n = n / ngroup;
        let width = self.axis.bin_width();
        let axis = Axis::new(new_n, self.axis.min, self.axis.min + (new_n * ngroup) as f64 * width);

        let mut contents = vec![0.0; new_n + 2];
        contents[0] = self.contents[0];
        for (bin, slot) in contents.iter_mut().enumerate().take(new_n + 1).skip(1) {
            let first = (bin - 1) * ngroup + 1;
            *slot = self.contents[first..first + ngroup].iter().sum();
        }
        contents[new_n + 1] = self.contents[new_n * ngroup + 1..].iter().sum();

        Hist1D {
            axis,
            contents,
            entries: self.entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    pub x: Axis,
    pub y: Axis,
    contents: Vec<f64>,
    entries: f64,
}

impl Hist2D {
    pub fn new(x: Axis, y: Axis) -> Self {
        Self {
            x,
            y,
            contents: vec![0.0; (x.n_bins + 2) * (y.n_bins + 2)],
            entries: 0.0,
        }
    }

    fn index(&self, ix: usize, iy: usize) -> usize {
        iy * (self.x.n_bins + 2) + ix
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        self.fill_weighted(x, y, 1.0)
    }

    pub fn fill_weighted(&mut self, x: f64, y: f64, weight: f64) {
        let idx = self.index(self.x.find_bin(x), self.y.find_bin(y));
        self.contents[idx] += weight;
        self.entries += 1.0;
    }

    pub fn content(&self, ix: usize, iy: usize) -> f64 {
        if ix > self.x.n_bins + 1 || iy > self.y.n_bins + 1 {
            return 0.0;
        }
        self.contents[self.index(ix, iy)]
    }

    pub fn entries(&self) -> f64 {
        self.entries
    }

    pub fn is_consistent(&self) -> bool {
        flow_len(&[self.x, self.y]) == Some(self.contents.len())
    }

    /// Column `ix` projected on the y axis, flow bins of y included.
    pub fn projection_y(&self, ix: usize) -> Hist1D {
        let mut hist = Hist1D::with_axis(self.y);
        let mut total = 0.0;
        for iy in 0..=self.y.n_bins + 1 {
            let value = self.content(ix, iy);
            hist.set_content(iy, value);
            total += value;
        }
        hist.set_entries(total);
        hist
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist3D {
    pub x: Axis,
    pub y: Axis,
    pub z: Axis,
    contents: Vec<f64>,
    entries: f64,
}

impl Hist3D {
    pub fn new(x: Axis, y: Axis, z: Axis) -> Self {
        Self {
            x,
            y,
            z,
            contents: vec![0.0; (x.n_bins + 2) * (y.n_bins + 2) * (z.n_bins + 2)],
            entries: 0.0,
        }
    }

    fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (iz * (self.y.n_bins + 2) + iy) * (self.x.n_bins + 2) + ix
    }

    pub fn fill(&mut self, x: f64, y: f64, z: f64) {
        let idx = self.index(self.x.find_bin(x), self.y.find_bin(y), self.z.find_bin(z));
        self.contents[idx] += 1.0;
        self.entries += 1.0;
    }

    pub fn entries(&self) -> f64 {
        self.entries
    }

    pub fn is_consistent(&self) -> bool {
        flow_len(&[self.x, self.y, self.z]) == Some(self.contents.len())
    }

    /// `z` versus `x`: y is summed over, flow bins included.
    pub fn project_zx(&self) -> Hist2D {
        let mut out = Hist2D::new(self.x, self.z);
        for iz in 0..=self.z.n_bins + 1 {
            for ix in 0..=self.x.n_bins + 1 {
                let sum: f64 = (0..=self.y.n_bins + 1)
                    .map(|iy| self.contents[self.index(ix, iy, iz)])
                    .sum();
                let idx = out.index(ix, iz);
                out.contents[idx] = sum;
            }
        }
        out.entries = self.entries;
        out
    }
}
