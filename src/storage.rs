use crate::model::Plant;
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub trait Storage {
    /// Charge le plant depuis un support.
    fn load(&self) -> anyhow::Result<Plant>;
    /// Sauvegarde de manière atomique.
    fn save(&self, plant: &Plant) -> anyhow::Result<()>;
}

pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Plant vide si le fichier n'existe pas encore.
    pub fn load_or_default(&self) -> anyhow::Result<Plant> {
        if self.path.exists() {
            self.load()
        } else {
            Ok(Plant::default())
        }
    }
}

impl Storage for JsonStorage {
    fn load(&self) -> anyhow::Result<Plant> {
        let data =
            fs::read(&self.path).with_context(|| format!("reading {}", self.path.display()))?;
        let plant: Plant = serde_json::from_slice(&data)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(plant)
    }

    fn save(&self, plant: &Plant) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(plant)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).with_context(|| "creating temp file")?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).with_context(|| "atomic rename")?;
        tracing::debug!(path = %self.path.display(), items = plant.items.len(), "plant saved");
        Ok(())
    }
}
