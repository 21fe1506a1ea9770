use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

pub mod cache;
pub mod error;
pub mod estimator;
pub mod histogram;
pub mod langaus;
pub mod minimize;
pub mod profiles;
pub mod render;
pub mod stats;
pub mod store;
pub mod style;

pub mod workspace;

use error::AnalysisError;

/// Sensor geometry as measured on the bench.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Geometry {
    pub sensor: String,
    /// strip length, mm
    pub length: f64,
    /// strip pitch, um
    pub pitch: f64,
    /// metal width, um
    pub width: f64,
    /// bias voltage, V
    pub voltage: f64,
}

impl Geometry {
    pub fn label(&self) -> String {
        format!(
            "{} ({} um pitch, {} um width, {} V)",
            self.sensor, self.pitch, self.width, self.voltage
        )
    }
}

/// Position resolutions obtained for one sensor configuration, um.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Resolution {
    #[serde(rename = "position_oneStripRMS")]
    pub one_strip_rms: f64,
    #[serde(rename = "position_twoStrips")]
    pub two_strips: f64,
    #[serde(rename = "position_twoStrips_E")]
    pub two_strips_err: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SensorCatalog {
    geometry: BTreeMap<String, Geometry>,
    #[serde(default)]
    resolutions: BTreeMap<String, Resolution>,
}

impl SensorCatalog {
    pub fn load(filepath: &Path) -> Result<Self, AnalysisError> {
        if !filepath.exists() {
            return Err(AnalysisError::BadFilePath(filepath.to_path_buf()));
        }
        let json = std::fs::read(filepath)?;
        Ok(serde_json::from_slice(&json)?)
    }

    pub fn geometry(&self, name: &str) -> Result<&Geometry, AnalysisError> {
        self.geometry.get(name).ok_or_else(|| AnalysisError::UnknownSensor(name.to_owned()))
    }

    pub fn resolution(&self, name: &str) -> Result<&Resolution, AnalysisError> {
        self.resolutions.get(name).ok_or_else(|| AnalysisError::UnknownSensor(name.to_owned()))
    }

    /// Label for a dataset: its geometry if known, the bare name otherwise.
    pub fn sensor_info(&self, name: &str) -> String {
        self.geometry(name).map(Geometry::label).unwrap_or_else(|_| name.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "geometry": {
            "EIC_W1_1cm_500up_200uw_255V": {
                "sensor": "EIC_W1_1cm_500up_200uw", "length": 10.0, "pitch": 500.0, "width": 200.0, "voltage": 255.0
            }
        },
        "resolutions": {
            "EIC_W1_1cm_500up_200uw_255V": {
                "position_oneStripRMS": 54.87, "position_twoStrips": 18.53, "position_twoStrips_E": 0.02
            }
        }
    }"#;

    #[test]
    fn catalog_lookup() {
        let catalog: SensorCatalog = serde_json::from_str(CATALOG).unwrap();
        let name = "EIC_W1_1cm_500up_200uw_255V";
        assert_eq!(catalog.geometry(name).unwrap().length, 10.0);
        assert_eq!(catalog.resolution(name).unwrap().two_strips, 18.53);
        assert!(catalog.sensor_info(name).starts_with("EIC_W1_1cm_500up_200uw"));
        assert_eq!(catalog.sensor_info("BNL2021"), "BNL2021");
        assert!(matches!(catalog.geometry("BNL2021"), Err(AnalysisError::UnknownSensor(_))));
    }

    #[test]
    fn bundled_catalog_is_complete() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/sensors.json");
        let catalog = SensorCatalog::load(&path).unwrap();
        for name in catalog.geometry.keys() {
            assert!(catalog.resolution(name).is_ok(), "{name} has no resolution");
        }
        assert_eq!(catalog.geometry.len(), 3);
    }
}
