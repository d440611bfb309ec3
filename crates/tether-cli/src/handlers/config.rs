//! Configuration command handlers

use crate::cli::{ConfigAction, ConfigArgs, ConfigFormat, ConfigInitArgs, ConfigShowArgs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::OutputWriter;
use std::path::Path;

const TOML_PIN_EXAMPLE: &str = r#"
# Pins declared here are registered in the store before every fetch.
#
# [[pins]]
# host = "api.example.com"
# strategy = "public-key"   # or "certificate"
# certificate = "certs/api.example.com.der"
"#;

pub async fn handle_config(args: ConfigArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    match args.action {
        ConfigAction::Init(init_args) => handle_config_init(init_args, output),
        ConfigAction::Show(show_args) => handle_config_show(show_args, config, output),
    }
}

fn handle_config_init(args: ConfigInitArgs, output: &mut OutputWriter) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => Config::user_config_path()
            .ok_or_else(|| Error::config("Unable to determine user config directory"))?,
    };

    if path.exists() && !args.force {
        output.warning(&format!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        ))?;
        return Ok(());
    }

    write_default_config(&path)?;
    output.success(&format!("✓ Created config at {}", path.display()))?;
    output.info("Edit it to declare pins and defaults for your environment.")
}

fn write_default_config(path: &Path) -> Result<()> {
    let config = Config::default();
    config.save(path)?;

    if Config::is_toml_path(path) {
        let mut content = std::fs::read_to_string(path)?;
        content.push_str(TOML_PIN_EXAMPLE);
        std::fs::write(path, content)?;
    }
    Ok(())
}

fn handle_config_show(args: ConfigShowArgs, config: &Config, output: &mut OutputWriter) -> Result<()> {
    let content = match args.format {
        ConfigFormat::Toml => config.to_toml()?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };

    output.writeln(content.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use tempfile::TempDir;

    fn sink() -> OutputWriter {
        OutputWriter::with_writer(OutputFormat::Human, false, true, Box::new(std::io::sink()))
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tether").join("config.toml");
        let args = ConfigInitArgs {
            path: Some(path.clone()),
            force: false,
        };

        handle_config_init(args, &mut sink()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# [[pins]]"));
        assert_eq!(Config::from_file(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "retries: 9\n").unwrap();

        let args = ConfigInitArgs {
            path: Some(path.clone()),
            force: false,
        };
        handle_config_init(args, &mut sink()).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().retries, 9);

        let args = ConfigInitArgs {
            path: Some(path.clone()),
            force: true,
        };
        handle_config_init(args, &mut sink()).unwrap();
        assert_eq!(Config::from_file(&path).unwrap().retries, 0);
        assert!(!std::fs::read_to_string(&path).unwrap().contains("[[pins]]"));
    }
}
