//! `kestrel config`: configuration commands.

use std::path::Path;

use kestrel_config::AppConfig;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.to_toml());
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
    Ok(())
}

pub async fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    if write_default(&config_path, force)? {
        println!("✅ Wrote default config to {}", config_path.display());
    } else {
        println!("⚠️  {} already exists (use --force to overwrite)", config_path.display());
    }
    Ok(())
}

/// Write the default config to `path`. Returns false when a file is
/// already there and `force` is unset.
fn write_default(path: &Path, force: bool) -> std::io::Result<bool> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    tracing::info!(path = %path.display(), "Default config written");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn init_writes_loadable_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(write_default(&path, false).unwrap());
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.agent.max_iterations, 10);

        std::fs::write(&path, "[agent]\nname = \"mine\"\n").unwrap();
        assert!(!write_default(&path, false).unwrap());
        assert_eq!(AppConfig::load_from(&path).unwrap().agent.name, "mine");

        assert!(write_default(&path, true).unwrap());
        assert_eq!(AppConfig::load_from(&path).unwrap().agent.name, "agent");
    }
}
