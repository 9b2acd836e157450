/// Report export — JSON document and flat CSV table.
use crate::error::{ProcessError, Result};
use crate::model::Report;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Output format for an exported report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Pretty-printed JSON. Cyrillic labels are written as-is, not escaped.
pub fn to_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| ProcessError::Export(e.to_string()))
}

/// Write the report as `section,label,count` rows.
///
/// Sections are `quota`, `annotation` and `specialization`; metadata is
/// not part of the table.
pub fn write_csv<W: Write>(report: &Report, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let export_err = |e: csv::Error| ProcessError::Export(e.to_string());

    wtr.write_record(["section", "label", "count"])
        .map_err(export_err)?;
    for (label, count) in report.quota_counts.iter() {
        wtr.write_record(["quota", label, &count.to_string()])
            .map_err(export_err)?;
    }
    for (item, count) in &report.quota_counts.annotations {
        wtr.write_record(["annotation", item.as_str(), &count.to_string()])
            .map_err(export_err)?;
    }
    for (name, count) in &report.specialization_counts {
        wtr.write_record(["specialization", name.as_str(), &count.to_string()])
            .map_err(export_err)?;
    }
    wtr.flush()
        .map_err(|e| ProcessError::Export(e.to_string()))?;
    Ok(())
}

/// `<dir>/<stem>.report.<ext>` for the spreadsheet at `source`.
pub fn report_path(dir: &Path, source: &Path, format: ExportFormat) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_owned());
    dir.join(format!("{stem}.report.{}", format.extension()))
}

/// Render `report` in `format` and write it to `path`.
pub fn write_report(report: &Report, path: &Path, format: ExportFormat) -> Result<()> {
    let io_err = |source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    };
    match format {
        ExportFormat::Json => std::fs::write(path, to_json(report)?).map_err(io_err),
        ExportFormat::Csv => {
            let file = std::fs::File::create(path).map_err(io_err)?;
            write_csv(report, std::io::BufWriter::new(file))
        }
    }
}
