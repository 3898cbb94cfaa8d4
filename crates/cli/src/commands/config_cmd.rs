//! `ironquill config` — Configuration management.

use anyhow::Context;
use ironquill_config::AppConfig;

pub async fn show() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load config")?;
    let toml_str = toml::to_string_pretty(&redacted(config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init() -> anyhow::Result<()> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");

    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    std::fs::write(&path, AppConfig::default_toml())
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("Wrote starter config to {}", path.display());
    println!("Edit it, then check the result with `ironquill doctor`.");
    Ok(())
}

/// Blank out secrets before the config is printed.
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.provider.api_key.is_some() {
        config.provider.api_key = Some("[REDACTED]".into());
    }
    if config.memory.api_key.is_some() {
        config.memory.api_key = Some("[REDACTED]".into());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_redacts_api_keys() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("sk-very-secret".into());
        config.memory.api_key = Some("mem-token".into());

        let shown = toml::to_string_pretty(&redacted(config)).unwrap();
        assert!(!shown.contains("sk-very-secret"));
        assert!(!shown.contains("mem-token"));
        assert!(shown.contains("[REDACTED]"));
    }

    #[test]
    fn absent_keys_stay_absent() {
        let shown = toml::to_string_pretty(&redacted(AppConfig::default())).unwrap();
        assert!(!shown.contains("[REDACTED]"));
    }

    #[test]
    fn config_path_is_under_home() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains(".ironquill"));
    }
}
