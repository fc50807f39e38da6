use crate::db::log::ttlog;
use crate::db::pool::DbPool;
use crate::db::queries::load_sessions;
use crate::errors::{AppError, AppResult};
use crate::export::ExportFormat;
use crate::export::SessionExport;
use crate::export::fs_utils::ensure_writable;
use crate::export::json_csv::{export_csv, export_json};
use crate::export::range::parse_range;
use crate::ui::messages::warning;
use chrono::NaiveDate;
use std::path::Path;

/// High-level export of archived sessions.
pub struct ExportLogic;

impl ExportLogic {
    /// Export archived sessions.
    ///
    /// - `file`: absolute output path
    /// - `range`: `None`, `"all"` or YYYY / YYYY-MM / YYYY-MM-DD, optionally
    ///   as `FROM:TO`
    ///
    /// Returns the number of exported sessions.
    pub fn export(
        pool: &DbPool,
        format: ExportFormat,
        file: &str,
        range: Option<&str>,
        force: bool,
    ) -> AppResult<usize> {
        let path = Path::new(file);

        if !path.is_absolute() {
            return Err(AppError::Export(format!(
                "Output file path must be absolute: {file}"
            )));
        }

        let bounds: Option<(NaiveDate, NaiveDate)> = match range {
            None => None,
            Some(r) if r.eq_ignore_ascii_case("all") => None,
            Some(r) => Some(parse_range(r)?),
        };

        let rows: Vec<SessionExport> = load_sessions(&pool.conn, bounds)?
            .iter()
            .map(SessionExport::from)
            .collect();

        if rows.is_empty() {
            warning("No archived sessions found for the selected range.");
            return Ok(0);
        }

        ensure_writable(path, force)?;

        match format {
            ExportFormat::Csv => export_csv(&rows, path)?,
            ExportFormat::Json => export_json(&rows, path)?,
        }

        let _ = ttlog(
            &pool.conn,
            "export",
            format.as_str(),
            &format!("{} sessions to {}", rows.len(), path.display()),
        );

        Ok(rows.len())
    }
}
