use crate::error::Result;
use opsdeck_alert::RuleCache;
use std::path::{Path, PathBuf};

/// File-backed last-known-good rule snapshot.
///
/// Writes go through a sibling temp file and an atomic rename, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct FileRuleCache {
    path: PathBuf,
}

impl FileRuleCache {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join("rules.cache.json"),
        })
    }

    fn read(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, snapshot: &[u8]) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, snapshot)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RuleCache for FileRuleCache {
    fn get(&self) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.read()?)
    }

    fn put(&self, snapshot: &[u8]) -> anyhow::Result<()> {
        self.write(snapshot)?;
        Ok(())
    }
}
