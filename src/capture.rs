use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::error::Result;
use crate::instruments::{Osa, OsaTrace};

pub const TRACE_HEADER: [&str; 2] = ["Wavelength (nm)", "Level (dBm)"];

/// Write a trace as two-column CSV.
pub fn export_trace<P: AsRef<Path>>(trace: &OsaTrace, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(TRACE_HEADER)?;
    for (wavelength, level) in trace.points() {
        writer.write_record([wavelength.to_string(), level.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Fetch the current trace from the analyzer and save it under `dir` as
/// `osa_trace_<unix millis>.csv`.
pub fn capture_trace<P: AsRef<Path>>(osa: &mut Osa, dir: P) -> Result<PathBuf> {
    let trace = osa.trace()?;
    fs::create_dir_all(dir.as_ref())?;
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = dir.as_ref().join(format!("osa_trace_{millis}.csv"));
    export_trace(&trace, &path)?;
    info!(path = %path.display(), points = trace.len(), "trace saved");
    Ok(path)
}
