//! CLI command implementations
//!
//! `serve` boots the service: load config, install logging, open storage,
//! warm the schema registry, then serve HTTP until stopped.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::http_server::config::{default_host, default_page_limit, default_port, max_page_limit};
use crate::http_server::{HttpServer, HttpServerConfig};
use crate::observability::{init_logging, LogConfig};
use crate::schema::{SchemaRegistry, WarehouseSchema};
use crate::storage::{MemoryEngine, StorageEngine};
use crate::warehouse::WarehouseManager;

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Storage snapshot file; purely in-memory when absent
    #[serde(default)]
    pub snapshot_path: Option<String>,

    /// Log filter used when RUST_LOG is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Page size for list requests without a limit (default: 100)
    #[serde(default = "default_page_limit")]
    pub default_page_limit: usize,

    /// Largest page size a request may ask for (default: 1000)
    #[serde(default = "max_page_limit")]
    pub max_page_limit: usize,

    /// CORS allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            snapshot_path: None,
            log_level: default_log_level(),
            default_page_limit: default_page_limit(),
            max_page_limit: max_page_limit(),
            cors_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Loads `path` if given, otherwise returns validated defaults.
    pub fn resolve(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    fn validate(&self) -> CliResult<()> {
        if self.host.trim().is_empty() {
            return Err(CliError::config_error("host must not be empty"));
        }
        if self.log_level.trim().is_empty() {
            return Err(CliError::config_error("log_level must not be empty"));
        }
        if self.default_page_limit == 0 || self.max_page_limit == 0 {
            return Err(CliError::config_error("page limits must be > 0"));
        }
        if self.default_page_limit > self.max_page_limit {
            return Err(CliError::config_error(format!(
                "default_page_limit ({}) exceeds max_page_limit ({})",
                self.default_page_limit, self.max_page_limit
            )));
        }
        if matches!(&self.snapshot_path, Some(p) if p.trim().is_empty()) {
            return Err(CliError::config_error("snapshot_path must not be empty"));
        }
        Ok(())
    }

    /// HTTP settings derived from this config.
    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            default_page_limit: self.default_page_limit,
            max_page_limit: self.max_page_limit,
        }
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config } => serve(config.as_deref()),
        Command::Compile {
            schema,
            name,
            item_name,
        } => {
            let output = compile(&schema, name.as_deref(), item_name.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
    }
}

/// Opens storage and builds a bootstrapped warehouse manager.
pub fn build_manager(config: &Config) -> CliResult<Arc<WarehouseManager>> {
    let engine: Arc<dyn StorageEngine> = match &config.snapshot_path {
        Some(path) => Arc::new(MemoryEngine::open(path)?),
        None => Arc::new(MemoryEngine::new()),
    };
    let manager = WarehouseManager::new(engine, Arc::new(SchemaRegistry::default()));
    manager.bootstrap()?;
    Ok(Arc::new(manager))
}

/// Boot the service and serve HTTP until stopped.
pub fn serve(config_path: Option<&Path>) -> CliResult<()> {
    let config = Config::resolve(config_path)?;

    init_logging(LogConfig {
        level: &config.log_level,
        ..LogConfig::default()
    })?;
    info!(
        config = %config_path.map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".into()),
        snapshot = config.snapshot_path.as_deref().unwrap_or("none"),
        "booting warehousedb"
    );

    let manager = build_manager(&config)?;
    let server = HttpServer::new(config.http_config(), manager);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

/// Compiles a schema file without touching storage.
///
/// The file holds either a bare field mapping or a warehouse declaration.
/// Names fall back to the declaration, then to the file stem.
pub fn compile(schema_path: &Path, name: Option<&str>, item_name: Option<&str>) -> CliResult<Value> {
    let content = fs::read_to_string(schema_path)?;
    let raw: Value = serde_json::from_str(&content)?;

    let declared = if raw.get("item_schema").is_some() {
        Some(serde_json::from_value::<WarehouseSchema>(raw.clone())?)
    } else {
        None
    };
    let stem = schema_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("warehouse_preview")
        .to_string();

    let name = name
        .map(str::to_string)
        .or_else(|| declared.as_ref().map(|d| d.name.clone()))
        .unwrap_or(stem);
    let item_name = item_name
        .map(str::to_string)
        .or_else(|| declared.as_ref().map(|d| d.item_name.clone()))
        .unwrap_or_else(|| format!("{}_item", name));
    let fields = declared.map(|d| d.fields).unwrap_or(raw);

    let artifacts = SchemaRegistry::default().compile(&name, &item_name, &fields)?;
    Ok(json!({
        "warehouse": artifacts.warehouse_name,
        "item_name": artifacts.item_name,
        "table": artifacts.table_def,
        "required_fields": artifacts.validator.required_fields(),
        "ddl": artifacts.table_def.to_ddl(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_defaults_without_path() {
        let config = Config::resolve(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.http_config().socket_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_partial_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 9100, "log_level": "debug"}}"#).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.max_page_limit, 1000);
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = TempDir::new().unwrap();
        let err = Config::resolve(Some(dir.path().join("absent.json").as_path())).unwrap_err();
        assert_eq!(err.code(), "CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"default_page_limit": 500, "max_page_limit": 10}}"#).unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_build_manager_with_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            snapshot_path: Some(dir.path().join("state.json").display().to_string()),
            ..Config::default()
        };
        let manager = build_manager(&config).unwrap();
        assert!(manager.list(0, 10, false).unwrap().is_empty());
    }

    #[test]
    fn test_compile_bare_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("payroll.json");
        fs::write(&path, r#"{"name": {"type": "string", "nullable": false}}"#).unwrap();
        let out = compile(&path, None, Some("employee")).unwrap();
        assert_eq!(out["warehouse"], "payroll");
        assert_eq!(out["item_name"], "employee");
        assert_eq!(out["required_fields"], json!(["name"]));
        assert!(out["ddl"].as_str().unwrap().starts_with("CREATE TABLE \"payroll\""));
    }

    #[test]
    fn test_compile_declaration_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("decl.json");
        fs::write(
            &path,
            r#"{"name": "stock", "item_name": "sku", "item_schema": {"qty": {"type": "integer"}}}"#,
        )
        .unwrap();
        let out = compile(&path, None, None).unwrap();
        assert_eq!(out["warehouse"], "stock");
        assert_eq!(out["table"]["columns"].as_array().unwrap().len(), 3);
    }
}
