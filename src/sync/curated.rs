use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::db::IntrospectedTable;
use crate::models::{TableDescriptor, Tier};
use crate::vector::Metadata;

/// Hand-maintained overrides for one table. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CuratedTable {
    #[serde(deserialize_with = "de_tier")]
    pub tier: Option<Tier>,
    pub domain: Option<String>,
    /// Replaces the generated summary when present.
    pub summary: Option<String>,
    /// Any other field, stored as table metadata.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn de_tier<'de, D>(deserializer: D) -> std::result::Result<Option<Tier>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| s.parse::<Tier>().map_err(serde::de::Error::custom))
        .transpose()
}

/// Curated metadata keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CuratedMetadata {
    pub tables: HashMap<String, CuratedTable>,
}

impl CuratedMetadata {
    /// Read a `.json` file, or TOML for any other extension. A missing file
    /// is an empty map; a file that does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "curated metadata file not found, using defaults"
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read curated metadata: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&content).map_err(anyhow::Error::from)
        } else {
            toml::from_str(&content).map_err(anyhow::Error::from)
        };
        parsed.with_context(|| format!("Invalid curated metadata: {}", path.display()))
    }

    pub fn get(&self, table: &str) -> Option<&CuratedTable> {
        self.tables.get(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Where a schema sync run reads its curated metadata from.
#[derive(Debug, Clone, Default)]
pub enum CuratedSource {
    #[default]
    None,
    File(PathBuf),
    Inline(CuratedMetadata),
}

impl CuratedSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(CuratedSource::File).unwrap_or_default()
    }

    pub fn load(&self) -> Result<CuratedMetadata> {
        match self {
            CuratedSource::None => Ok(CuratedMetadata::default()),
            CuratedSource::File(path) => CuratedMetadata::load(path),
            CuratedSource::Inline(metadata) => Ok(metadata.clone()),
        }
    }
}

/// Combine an introspected table, its generated summary and any curated
/// overrides. Curated values always win; tier falls back to IRON and
/// domain to the tier label.
pub fn merge(
    table: IntrospectedTable,
    summary: String,
    curated: Option<&CuratedTable>,
) -> TableDescriptor {
    let curated = curated.cloned().unwrap_or_default();
    let tier = curated.tier.unwrap_or_default();
    let domain = curated.domain.unwrap_or_else(|| tier.to_string());
    TableDescriptor {
        name: table.name,
        schema: table.schema,
        tier,
        domain,
        summary: curated.summary.unwrap_or(summary),
        extra: stringify_extra(curated.extra),
    }
}

fn stringify_extra(extra: BTreeMap<String, serde_json::Value>) -> Metadata {
    extra
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}
