use crate::errors::AppResult;
use crate::models::{Heartbeat, HeartbeatRead};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Single-snapshot heartbeat file, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct HeartbeatFile {
    path: PathBuf,
}

impl HeartbeatFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, heartbeat: &Heartbeat) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(heartbeat)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&data)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn read(&self) -> HeartbeatRead {
        let data = match fs::read(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return HeartbeatRead::Absent,
            Err(e) => return HeartbeatRead::Corrupt(format!("unreadable heartbeat: {}", e)),
        };

        match serde_json::from_slice::<Heartbeat>(&data) {
            Ok(hb) if hb.state.is_open() && hb.session.is_none() => HeartbeatRead::Corrupt(
                format!("heartbeat state '{}' without a session", hb.state),
            ),
            Ok(hb) => HeartbeatRead::Present(hb),
            Err(e) => HeartbeatRead::Corrupt(format!("malformed heartbeat: {}", e)),
        }
    }
}
