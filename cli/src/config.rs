use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Overrides the platform data directory (handy for tests and containers).
pub const DATA_DIR_ENV: &str = "DAYBOOK_DATA_DIR";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "daybook")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::from_data_dir(&data_dir)
    }

    pub fn from_data_dir(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            db_path: data_dir.join("daybook.db"),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if let Some(key) = read_trimmed(&path).context("Failed to read API key file")? {
            return Ok((key, false));
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        write_private(&path, &key).context("Failed to write API key file")?;
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }

    /// Owner id used by local CLI commands. Generated once per data directory.
    pub fn load_or_create_owner_id(&self) -> Result<Uuid> {
        let path = self.data_dir.join("owner_id");

        if let Some(text) = read_trimmed(&path).context("Failed to read owner id file")? {
            return Uuid::parse_str(&text)
                .with_context(|| format!("Corrupt owner id in {}", path.display()));
        }

        let owner_id = Uuid::new_v4();
        write_private(&path, &owner_id.to_string()).context("Failed to write owner id file")?;
        tracing::info!(%owner_id, "generated local owner id");
        Ok(owner_id)
    }
}

fn read_trimmed(path: &Path) -> std::io::Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
