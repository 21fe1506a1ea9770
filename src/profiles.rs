use std::{collections::hash_map::DefaultHasher, hash::{Hash, Hasher}, path::PathBuf, sync::Arc};

use cached::proc_macro::io_cached;
use eyre::Result;

use super::cache::CacacheBackend;
use crate::{
    estimator::{EstimatorParams, PeakEstimator, Profile},
    langaus::LanGausFit,
    store::HistogramStore,
    workspace::get_cache_root,
};

/// Fit the `zx` projection of 3D histogram `hist_name` bin by bin.
pub async fn estimate_profile(
    analysis_file: &PathBuf,
    hist_name: &str,
    params: &EstimatorParams,
) -> Result<Profile> {
    let store = HistogramStore::load(analysis_file)?;
    let th2 = Arc::new(store.get_th3(hist_name)?.project_zx());

    let estimator = Arc::new(PeakEstimator::new(*params, LanGausFit::default()));
    let profile = estimator.estimate_parallel(th2).await?;
    Ok(profile)
}

/// do estimate_profile for given histogram or get it from cache
#[io_cached(
    map_error = r##"|e| e"##,
    type = "CacacheBackend<u64, Profile>",
    create = r#"{ CacacheBackend::new(get_cache_root(), "profile") }"#,
    convert = r#"{ {
        let mut hasher = DefaultHasher::new();
        analysis_file.hash(&mut hasher);
        std::fs::metadata(analysis_file).and_then(|meta| meta.modified()).ok().hash(&mut hasher);
        hist_name.hash(&mut hasher);
        serde_json::to_string(params).unwrap_or_default().hash(&mut hasher);
        hasher.finish()
    } }"#
)]
pub async fn get_profile(analysis_file: &PathBuf, hist_name: &str, params: &EstimatorParams) -> Result<Profile> {
    estimate_profile(analysis_file, hist_name, params).await
}
