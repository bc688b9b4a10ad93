//! Configuration loading with layered precedence.
//!
//! Layers, lowest to highest: application defaults, configuration file,
//! environment variables, command-line arguments.
//!
//! The layers are composed with a manual `MergeComposer` rather than
//! `OrthoConfig::load()` because the `Cli` struct owns subcommand dispatch,
//! and because Figment silently ignores unparseable environment values where
//! this loader fails fast.
//!
//! # Environment Variable Handling
//!
//! String fields (e.g., `REPOBOX_ENGINE_SOCKET`) are always accepted. Numeric
//! fields (e.g., `REPOBOX_IMPORT_CONCURRENCY`) and the fetch failure policy
//! must hold valid values or loading fails with a clear error.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Unsigned integer. Invalid values return an error.
    Count,
    /// `abort` or `skip`. Other values return an error.
    FetchPolicy,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name.
    env_var: &'static str,
    /// The JSON path segments (e.g., `["import", "concurrency"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

/// Table of all environment variables and their JSON paths.
const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "REPOBOX_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "REPOBOX_IMAGE",
        path: &["image"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "REPOBOX_GITHUB_TOKEN",
        path: &["github", "token"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "REPOBOX_IMPORT_CONCURRENCY",
        path: &["import", "concurrency"],
        var_type: EnvVarType::Count,
    },
    EnvVarSpec {
        env_var: "REPOBOX_IMPORT_ON_FETCH_ERROR",
        path: &["import", "on_fetch_error"],
        var_type: EnvVarType::FetchPolicy,
    },
    EnvVarSpec {
        env_var: "REPOBOX_SANDBOX_WORKDIR",
        path: &["sandbox", "workdir"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "REPOBOX_SANDBOX_SHELL",
        path: &["sandbox", "shell"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "REPOBOX_TERMINAL_OUTPUT_BUFFER_CHUNKS",
        path: &["terminal", "output_buffer_chunks"],
        var_type: EnvVarType::Count,
    },
    EnvVarSpec {
        env_var: "REPOBOX_STORE_DIR",
        path: &["store", "dir"],
        var_type: EnvVarType::String,
    },
];

/// Returns the environment variable names recognised by the config loader.
///
/// Tests use this to clear every `REPOBOX_*` variable without keeping a
/// second list in sync.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load a configuration file and push it to the composer.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration with full layer precedence.
///
/// Sources, in increasing precedence:
/// 1. Application defaults defined in the structs
/// 2. Configuration file (`--config`, `REPOBOX_CONFIG_PATH` or discovery)
/// 3. Environment variables prefixed with `REPOBOX_`
/// 4. Command-line arguments
///
/// # Errors
///
/// Returns `ConfigError` if a configuration file is malformed, a typed
/// environment variable holds an invalid value, or the merged layers do not
/// deserialise.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    let config_path: Option<Utf8PathBuf> =
        cli.config.clone().filter(|p| p.exists()).or_else(|| {
            let discovery = ConfigDiscovery::builder("repobox")
                .env_var("REPOBOX_CONFIG_PATH")
                .config_file_name("config.toml")
                .dotfile_name(".repobox.toml")
                .build();
            discovery
                .candidates()
                .into_iter()
                .filter(|p| p.exists())
                .find_map(|p| Utf8PathBuf::try_from(p).ok())
        });

    if let Some(ref path) = config_path {
        tracing::debug!(path = %path, "loading configuration file");
        load_config_file(path, &mut composer)?;
    }

    let env_values = collect_env_vars()?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;

    Ok(config)
}

/// Collect `REPOBOX_*` environment variables into a JSON value.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed variable has an
/// unparseable value.
fn collect_env_vars() -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Ok(raw_value) = std::env::var(spec.env_var) else {
            continue;
        };
        let json_value = parse_env_value(spec, raw_value)?;
        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

fn parse_env_value(spec: &EnvVarSpec, raw_value: String) -> Result<Value> {
    match spec.var_type {
        EnvVarType::String => Ok(Value::String(raw_value)),
        EnvVarType::Count => match raw_value.parse::<u64>() {
            Ok(n) => Ok(Value::Number(n.into())),
            Err(_) => Err(ConfigError::InvalidValue {
                field: spec.env_var.to_owned(),
                reason: format!("expected unsigned integer, got '{raw_value}'"),
            }
            .into()),
        },
        EnvVarType::FetchPolicy => match raw_value.as_str() {
            "abort" | "skip" => Ok(Value::String(raw_value)),
            _ => Err(ConfigError::InvalidValue {
                field: spec.env_var.to_owned(),
                reason: format!("expected 'abort' or 'skip', got '{raw_value}'"),
            }
            .into()),
        },
    }
}

/// Insert a value at a nested path in a JSON map.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(ref socket) = cli.engine_socket {
        overrides.insert("engine_socket".to_owned(), Value::String(socket.clone()));
    }

    if let Some(ref image) = cli.image {
        overrides.insert("image".to_owned(), Value::String(image.clone()));
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
