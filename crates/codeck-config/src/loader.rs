//! Config file discovery and layered loading.
//!
//! Implements the load algorithm:
//! 1. Parse the embedded `defaults.toml` → base
//! 2. Merge `/etc/codeck/config.toml` (system)
//! 3. Merge `~/.codeck/config.toml` (user)
//! 4. Merge `{workspace}/.codeck/config.toml` (workspace)
//! 5. Apply environment variable overrides
//! 6. Deserialize the merged tree → [`Config`]
//! 7. Validate
//! 8. Return a [`ResolvedConfig`]

use std::path::{Path, PathBuf};

use tracing::info;

use crate::env::apply_env_overrides;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{deep_merge_tracking, record_all_as};
use crate::show::{ConfigLayer, FieldSources, ResolvedConfig};
use crate::types::Config;
use crate::validate;

const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Load the unified configuration with layered file precedence.
///
/// `workspace_root` is the root of the current project; if `None`, the
/// workspace layer is skipped. `home_override` replaces `$HOME` discovery,
/// useful for tests.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed or the final
/// merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_string(),
            source: e,
        })?;

    let mut field_sources = FieldSources::new();
    record_all_as(&merged, ConfigLayer::Default, &mut field_sources);

    let mut loaded_files = Vec::new();

    let system_path = PathBuf::from("/etc/codeck/config.toml");
    merge_layer(
        &system_path,
        ConfigLayer::System,
        &mut merged,
        &mut field_sources,
        &mut loaded_files,
    )?;

    let home_dir = home_override
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from));
    if let Some(home) = home_dir {
        let user_path = home.join(".codeck").join("config.toml");
        merge_layer(
            &user_path,
            ConfigLayer::User,
            &mut merged,
            &mut field_sources,
            &mut loaded_files,
        )?;
    }

    if let Some(root) = workspace_root {
        let workspace_path = root.join(".codeck").join("config.toml");
        merge_layer(
            &workspace_path,
            ConfigLayer::Workspace,
            &mut merged,
            &mut field_sources,
            &mut loaded_files,
        )?;
    }

    let mut config: Config = merged
        .clone()
        .try_into()
        .map_err(|e| ConfigError::ParseError {
            path: "<merged>".to_string(),
            source: e,
        })?;

    let env_applied = apply_env_overrides(&mut config);
    for name in env_applied {
        field_sources.record(name, ConfigLayer::Env);
    }

    validate::validate(&config)?;

    Ok(ResolvedConfig {
        values: config,
        field_sources,
        loaded_files,
    })
}

fn merge_layer(
    path: &Path,
    layer: ConfigLayer,
    merged: &mut toml::Value,
    field_sources: &mut FieldSources,
    loaded_files: &mut Vec<String>,
) -> ConfigResult<()> {
    if let Some(overlay) = try_load_file(path)? {
        deep_merge_tracking(merged, &overlay, "", layer, field_sources);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded config layer");
    }
    Ok(())
}

fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let value: toml::Value = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}
