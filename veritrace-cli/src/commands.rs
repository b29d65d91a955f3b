//! Subcommand handlers.

use crate::{Commands, ConfigAction};
use std::path::Path;

pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = veritrace_core::config::workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let written = veritrace_core::config::write_default_config(workspace)?;
            println!("Created default configuration at: {}", written.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = veritrace_core::config::load_config(Some(workspace), config_file, None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
