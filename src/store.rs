//! Named histogram container persisted as a bincode file.
//!
//! The analysis step writes its histograms into one of these; plotting
//! programs read them back and write their own results into a fresh store.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::AnalysisError,
    histogram::{Hist1D, Hist2D, Hist3D},
};

pub const STRIP_INFO_PREFIX: &str = "stripBoxInfo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Histogram {
    H1(Hist1D),
    H2(Hist2D),
    H3(Hist3D),
}

impl Histogram {
    pub fn dimension(&self) -> usize {
        match self {
            Histogram::H1(_) => 1,
            Histogram::H2(_) => 2,
            Histogram::H3(_) => 3,
        }
    }

    pub fn is_consistent(&self) -> bool {
        match self {
            Histogram::H1(hist) => hist.is_consistent(),
            Histogram::H2(hist) => hist.is_consistent(),
            Histogram::H3(hist) => hist.is_consistent(),
        }
    }
}

impl From<Hist1D> for Histogram {
    fn from(hist: Hist1D) -> Self {
        Histogram::H1(hist)
    }
}

impl From<Hist2D> for Histogram {
    fn from(hist: Hist2D) -> Self {
        Histogram::H2(hist)
    }
}

impl From<Hist3D> for Histogram {
    fn from(hist: Hist3D) -> Self {
        Histogram::H3(hist)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramStore {
    histograms: BTreeMap<String, Histogram>,
}

impl HistogramStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        if !path.exists() {
            return Err(AnalysisError::BadFilePath(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let store: HistogramStore = bincode::deserialize(&bytes)?;
        if let Some((name, _)) = store.histograms.iter().find(|(_, hist)| !hist.is_consistent()) {
            return Err(AnalysisError::InconsistentHistogram(name.clone()));
        }
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<(), AnalysisError> {
        let bytes = bincode::serialize(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>, hist: impl Into<Histogram>) {
        self.histograms.insert(name.into(), hist.into());
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.histograms.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Result<&Histogram, AnalysisError> {
        self.histograms
            .get(name)
            .ok_or_else(|| AnalysisError::MissingHistogram(name.to_owned()))
    }

    fn wrong_dimension(name: &str, found: &Histogram, expected: usize) -> AnalysisError {
        AnalysisError::WrongDimension {
            name: name.to_owned(),
            found: found.dimension(),
            expected,
        }
    }

    pub fn get_th1(&self, name: &str) -> Result<&Hist1D, AnalysisError> {
        match self.get(name)? {
            Histogram::H1(hist) => Ok(hist),
            other => Err(Self::wrong_dimension(name, other, 1)),
        }
    }

    pub fn get_th2(&self, name: &str) -> Result<&Hist2D, AnalysisError> {
        match self.get(name)? {
            Histogram::H2(hist) => Ok(hist),
            other => Err(Self::wrong_dimension(name, other, 2)),
        }
    }

    pub fn get_th3(&self, name: &str) -> Result<&Hist3D, AnalysisError> {
        match self.get(name)? {
            Histogram::H3(hist) => Ok(hist),
            other => Err(Self::wrong_dimension(name, other, 3)),
        }
    }

    /// Per-strip position histograms, ordered by strip index.
    pub fn strip_info(&self) -> Vec<&Hist1D> {
        self.histograms
            .iter()
            .filter(|(name, _)| name.starts_with(STRIP_INFO_PREFIX))
            .filter_map(|(_, hist)| match hist {
                Histogram::H1(hist) => Some(hist),
                _ => None,
            })
            .collect()
    }

    /// Mean x position of the central strip.
    pub fn central_channel_position(&self) -> Result<f64, AnalysisError> {
        let strips = self.strip_info();
        if strips.is_empty() {
            return Err(AnalysisError::NoStripInfo);
        }
        Ok(strips[strips.len() / 2].mean())
    }

    /// `(low, high)` x range covered by each metal strip, moved by `-shift`.
    pub fn strip_boxes(&self, shift: f64) -> Vec<(f64, f64)> {
        self.strip_info()
            .into_iter()
            .filter_map(|hist| {
                let mut filled = (1..=hist.n_bins()).filter(|&bin| hist.content(bin) > 0.0);
                let first = filled.next()?;
                let last = filled.last().unwrap_or(first);
                Some((
                    hist.axis.bin_low_edge(first) - shift,
                    hist.axis.bin_up_edge(last) - shift,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::Axis;

    fn strip(low: f64, high: f64) -> Hist1D {
        let mut hist = Hist1D::new(100, -5.0, 5.0);
        let mut x = low + 0.05;
        while x < high {
            hist.fill(x);
            x += 0.1;
        }
        hist
    }

    fn sample_store() -> HistogramStore {
        let mut store = HistogramStore::new();
        store.insert("stripBoxInfo00", strip(-1.5, -0.5));
        store.insert("stripBoxInfo01", strip(0.0, 1.0));
        store.insert("stripBoxInfo02", strip(1.5, 2.5));
        store.insert(
            "amplitude_vs_xy",
            Hist3D::new(Axis::new(4, -2.0, 2.0), Axis::new(1, -1.0, 1.0), Axis::new(10, 0.0, 100.0)),
        );
        store
    }

    #[test]
    fn lookup_errors() {
        let store = sample_store();
        assert!(store.get_th3("amplitude_vs_xy").is_ok());
        assert!(matches!(
            store.get_th3("amplitude_vs_xy_tight"),
            Err(AnalysisError::MissingHistogram(name)) if name == "amplitude_vs_xy_tight"
        ));
        assert!(matches!(
            store.get_th2("amplitude_vs_xy"),
            Err(AnalysisError::WrongDimension { found: 3, expected: 2, .. })
        ));
    }

    #[test]
    fn strip_geometry() {
        let store = sample_store();
        assert_eq!(store.strip_info().len(), 3);

        let center = store.central_channel_position().unwrap();
        assert!((center - 0.5).abs() < 1e-9);

        let boxes = store.strip_boxes(center);
        assert_eq!(boxes.len(), 3);
        assert!((boxes[1].0 + 0.5).abs() < 1e-9);
        assert!((boxes[1].1 - 0.5).abs() < 1e-9);

        assert!(matches!(
            HistogramStore::new().central_channel_position(),
            Err(AnalysisError::NoStripInfo)
        ));
    }

    #[test]
    fn save_and_load() {
        let store = sample_store();
        let path = std::env::temp_dir().join("lgad_analysis_store_test.bin");
        store.save(&path).unwrap();
        let loaded = HistogramStore::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, store);

        assert!(matches!(
            HistogramStore::load(&path),
            Err(AnalysisError::BadFilePath(_))
        ));
    }

    #[test]
    fn load_rejects_mismatched_axes() {
        let mut th2 = Hist2D::new(Axis::new(4, -2.0, 2.0), Axis::new(10, 0.0, 100.0));
        th2.fill(0.5, 42.0);
        th2.x.n_bins = 40;
        let mut store = sample_store();
        store.insert("amplitude_vs_x", th2);

        let path = std::env::temp_dir().join("lgad_analysis_store_mismatch.bin");
        store.save(&path).unwrap();
        let loaded = HistogramStore::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(
            loaded,
            Err(AnalysisError::InconsistentHistogram(name)) if name == "amplitude_vs_x"
        ));
    }
}
