use crate::models::Session;
use crate::utils::time::format_secs;
use serde::Serialize;

/// Flat row for archived-session exports.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SessionExport {
    pub id: String,
    pub clock_in: String,
    pub clock_out: String,
    pub work: String,
    pub breaks: String,
    pub idle: String,
    pub work_secs: i64,
    pub break_secs: i64,
    pub idle_secs: i64,
    pub close_reason: String,
}

impl From<&Session> for SessionExport {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            clock_in: s.clock_in.to_rfc3339(),
            clock_out: s.clock_out.map(|t| t.to_rfc3339()).unwrap_or_default(),
            work: format_secs(s.total_work_secs),
            breaks: format_secs(s.total_break_secs),
            idle: format_secs(s.total_idle_secs),
            work_secs: s.total_work_secs,
            break_secs: s.total_break_secs,
            idle_secs: s.total_idle_secs,
            close_reason: s
                .close_reason
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
        }
    }
}
