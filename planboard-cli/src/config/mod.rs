//! Configuration: machine registry, workbook layouts, source and database
//!
//! Loaded once at start-up and passed explicitly to whatever needs it.
//! Resolution order: `--config`, `PLANBOARD_CONFIG`, the user config file,
//! then the built-in default.

pub mod repository;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::dashboard::ResourceMatch;
use crate::etl::{DatasetLayout, UtilizationLayout};

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

pub const CONFIG_ENV: &str = "PLANBOARD_CONFIG";
pub const DATABASE_ENV: &str = "PLANBOARD_DATABASE";
pub const CLIENT_SECRET_ENV: &str = "PLANBOARD_GRAPH_CLIENT_SECRET";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub datasets: BTreeMap<String, DatasetLayout>,
    pub utilization: Option<UtilizationConfig>,
    #[serde(default)]
    pub machines: Vec<MachineConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Path of the planning workbook inside the document library
    pub file: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(flatten)]
    pub backend: SourceBackend,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceBackend {
    /// Read workbooks from a local directory
    Local { root: PathBuf },
    /// Download from a SharePoint document library through Microsoft Graph
    Graph {
        tenant_id: String,
        client_id: String,
        site_id: String,
        /// Falls back to `PLANBOARD_GRAPH_CLIENT_SECRET`
        #[serde(default, skip_serializing)]
        client_secret: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { interval_secs: 600 }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilizationConfig {
    /// Separate workbook for utilization; defaults to `source.file`
    pub file: Option<String>,
    #[serde(flatten)]
    pub layout: UtilizationLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Contains,
}

/// One dashboard entry: a machine or a department
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// URL key, e.g. "red-cannon"
    pub slug: String,
    pub display_name: String,
    /// Name as it appears in `resource_description`; unset means the whole
    /// dataset (departments such as stores)
    pub source_name: Option<String>,
    #[serde(default)]
    pub match_mode: MatchMode,
    /// Key into `[datasets]`
    pub dataset: String,
    pub category: String,
}

impl MachineConfig {
    pub fn resource_filter(&self) -> Option<ResourceMatch> {
        let name = self.source_name.clone()?;
        Some(match self.match_mode {
            MatchMode::Exact => ResourceMatch::Exact(name),
            MatchMode::Contains => ResourceMatch::Contains(name),
        })
    }

    pub fn url(&self) -> String {
        format!("/{}", self.slug)
    }
}

impl Config {
    /// Parse a TOML document and validate it
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(text).context("Failed to parse configuration")?;
        for (name, layout) in config.datasets.iter_mut() {
            layout.name = name.clone();
        }
        config.validate()?;
        Ok(config)
    }

    /// The configuration compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG).context("Built-in configuration is invalid")
    }

    /// Resolve and load the configuration, then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_path(explicit) {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_toml(&text)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            }
            None => {
                log::info!("No configuration file found, using built-in defaults");
                Self::builtin()?
            }
        };

        if let Ok(path) = std::env::var(DATABASE_ENV) {
            config.database.path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            bail!("At least one dataset must be configured");
        }

        let mut tables = HashSet::new();
        let layouts = self
            .datasets
            .values()
            .map(|l| (l.name.as_str(), l.table.as_str()))
            .chain(self.utilization.iter().map(|u| ("utilization", u.layout.table.as_str())));
        for (name, table) in layouts {
            if !IDENTIFIER.is_match(table) {
                bail!("Dataset '{}': table name '{}' is not a valid identifier", name, table);
            }
            if table.starts_with("refresh_") || table.ends_with("__staging") {
                bail!("Dataset '{}': table name '{}' is reserved", name, table);
            }
            if !tables.insert(table.to_lowercase()) {
                bail!("Table '{}' is used by more than one dataset", table);
            }
        }

        let mut slugs = HashSet::new();
        for machine in &self.machines {
            if machine.slug.is_empty() || machine.slug != machine.slug.to_lowercase() {
                bail!("Machine slug '{}' must be non-empty and lowercase", machine.slug);
            }
            if !slugs.insert(machine.slug.as_str()) {
                bail!("Machine slug '{}' is defined twice", machine.slug);
            }
            if !self.datasets.contains_key(&machine.dataset) {
                bail!(
                    "Machine '{}' refers to unknown dataset '{}'",
                    machine.slug,
                    machine.dataset
                );
            }
        }

        if self.refresh.interval_secs == 0 {
            bail!("refresh.interval_secs must be greater than zero");
        }

        Ok(())
    }

    /// Plan datasets in a stable order
    pub fn plan_layouts(&self) -> Vec<DatasetLayout> {
        self.datasets.values().cloned().collect()
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetLayout> {
        self.datasets.get(name)
    }

    /// Look up a machine by slug, case-insensitively
    pub fn machine(&self, slug: &str) -> Option<&MachineConfig> {
        let slug = slug.trim().to_lowercase();
        self.machines.iter().find(|m| m.slug == slug)
    }

    /// Workbook path the utilization sheet is read from
    pub fn utilization_file(&self) -> Option<&str> {
        let utilization = self.utilization.as_ref()?;
        Some(utilization.file.as_deref().unwrap_or(&self.source.file))
    }

    /// Database file, falling back to the platform data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        let dir = dirs::data_dir()
            .context("Could not determine data directory; set database.path or PLANBOARD_DATABASE")?;
        Ok(dir.join("planboard").join("planboard.db"))
    }
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let user = dirs::config_dir()?.join("planboard").join("config.toml");
    user.exists().then_some(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etl::DateField;

    const MINIMAL: &str = r#"
        [source]
        kind = "local"
        root = "/srv/plans"
        file = "plan.xlsx"

        [datasets.vacuum]
        table = "vacuum_data"
        sheet = "Plan"
        header_row = 0
        columns = "A:G"

        [datasets.vacuum.headers]
        "Due Date" = "start_date"

        [[machines]]
        slug = "red-cannon"
        display_name = "Red Cannon"
        source_name = "Red Cannon"
        match_mode = "contains"
        dataset = "vacuum"
        category = "Vacuum Forming"
    "#;

    #[test]
    fn test_builtin_config_is_valid() {
        let config = Config::builtin().unwrap();
        assert_eq!(config.datasets.len(), 4);
        assert_eq!(config.machines.len(), 12);
        assert_eq!(
            config.dataset("stores_goods_in").unwrap().date_field,
            DateField::FinishDate
        );
        assert_eq!(config.dataset("trimming").unwrap().columns.to_string(), "X:AD");
        assert_eq!(config.utilization_file(), Some(config.source.file.as_str()));
        assert!(matches!(config.source.backend, SourceBackend::Graph { .. }));
    }

    #[test]
    fn test_minimal_config() {
        let config = Config::from_toml(MINIMAL).unwrap();
        let vacuum = config.dataset("vacuum").unwrap();
        assert_eq!(vacuum.name, "vacuum");
        assert_eq!(vacuum.date_field, DateField::StartDate);
        assert_eq!(
            vacuum.mapping().get("due date"),
            Some(crate::etl::CanonicalField::StartDate)
        );
        assert_eq!(config.source.timeout_secs, 120);
        assert_eq!(config.refresh.interval_secs, 600);
        assert!(config.utilization_file().is_none());

        let machine = config.machine("Red-Cannon").unwrap();
        assert_eq!(
            machine.resource_filter(),
            Some(ResourceMatch::Contains("Red Cannon".to_string()))
        );
        assert_eq!(machine.url(), "/red-cannon");
    }

    #[test]
    fn test_rejects_unknown_dataset_reference() {
        let text = MINIMAL.replace("dataset = \"vacuum\"", "dataset = \"moulding\"");
        let err = Config::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("unknown dataset 'moulding'"));
    }

    #[test]
    fn test_rejects_unsafe_table_names() {
        let text = MINIMAL.replace("vacuum_data", "vacuum; DROP TABLE x");
        assert!(Config::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_bad_column_range() {
        let text = MINIMAL.replace("A:G", "G:A");
        assert!(Config::from_toml(&text).is_err());
    }
}
