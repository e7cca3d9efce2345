use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::Duration;
use crate::functions::{ArrowKeyByFunction, KeyByFunction, WindowFunction};
use crate::lookup::{AnyLookup, LookupKind};
use crate::window::Window;

/// Window parameters as written in config files, e.g.
/// `{ every: 1mo, period: 3mo, offset: -1d }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub every: Duration,
    /// Defaults to `every`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Duration>,
    /// Defaults to zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Duration>,
}

impl WindowSpec {
    pub fn new(every: Duration) -> Self {
        Self { every, period: None, offset: None }
    }

    pub fn to_window(&self) -> crate::error::Result<Window> {
        Window::new(
            self.every,
            self.period.unwrap_or(self.every),
            self.offset.unwrap_or(Duration::ZERO),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingSpec {
    pub group_by: Vec<String>,
    pub time_column: String,
    pub window: Option<WindowSpec>,
    pub lookup: LookupKind,
}

impl Default for GroupingSpec {
    fn default() -> Self {
        Self {
            group_by: Vec::new(),
            time_column: "_time".to_string(),
            window: None,
            lookup: LookupKind::Ordered,
        }
    }
}

impl GroupingSpec {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(s).context("failed to parse grouping spec as YAML")?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(s).context("failed to parse grouping spec as JSON")?;
        spec.validate()?;
        Ok(spec)
    }

    /// Loads a spec from a `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read grouping spec {}", path.display()))?;
        let spec = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => bail!("unsupported grouping spec format: {}", path.display()),
        };
        spec.with_context(|| format!("invalid grouping spec {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.group_by {
            if !seen.insert(column.as_str()) {
                bail!("column '{}' listed twice in group_by", column);
            }
        }
        if self.time_column.is_empty() {
            bail!("time_column must not be empty");
        }
        if let Some(window) = &self.window {
            window.to_window().context("invalid window")?;
        }
        Ok(())
    }

    pub fn new_lookup<V>(&self) -> AnyLookup<V> {
        AnyLookup::new(self.lookup)
    }

    /// Windows rows when a window is configured, otherwise partitions by the
    /// `group_by` columns alone.
    pub fn key_by_function(&self) -> Result<KeyByFunction> {
        let function = match &self.window {
            Some(window) => KeyByFunction::Window(
                WindowFunction::new(window.to_window()?, self.time_column.clone())
                    .with_group_columns(self.group_by.clone())
                    .with_lookup(self.lookup),
            ),
            None => KeyByFunction::Columns(ArrowKeyByFunction::new(self.group_by.clone())),
        };
        Ok(function)
    }
}
