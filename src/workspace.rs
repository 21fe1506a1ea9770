// Where input analysis files live and where plots are written.
// Root is taken from LGAD_WORKSPACE, falling back to ../output/ like the
// analysis step writes it.

use std::path::{Path, PathBuf};

use crate::error::AnalysisError;

pub const WORKSPACE_ENV: &str = "LGAD_WORKSPACE";

pub fn get_workspace() -> PathBuf {
    std::env::var_os(WORKSPACE_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("../output/"))
}

/// Per-dataset directory holding `<dataset>_Analyze.bin`.
pub fn get_output_dir(dataset: &str) -> PathBuf {
    get_workspace().join(dataset)
}

pub fn get_analysis_file(outdir: &Path, dataset: &str) -> PathBuf {
    outdir.join(format!("{dataset}_Analyze.bin"))
}

pub fn get_cache_root() -> PathBuf {
    get_workspace().join("cache")
}

/// `outdir/sub`, created if missing.
pub fn create_folder(outdir: &Path, sub: &str) -> Result<PathBuf, AnalysisError> {
    let dir = outdir.join(sub);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

pub fn get_plots_dir(outdir: &Path, sub: &str) -> Result<PathBuf, AnalysisError> {
    create_folder(&outdir.join("Plots"), sub)
}

#[test]
fn test_paths() {
    let outdir = PathBuf::from("/tmp/out/EIC_W1_1cm");
    assert_eq!(
        get_analysis_file(&outdir, "EIC_W1_1cm"),
        PathBuf::from("/tmp/out/EIC_W1_1cm/EIC_W1_1cm_Analyze.bin")
    );
    assert!(get_output_dir("EIC_W1_1cm").ends_with("EIC_W1_1cm"));
}
