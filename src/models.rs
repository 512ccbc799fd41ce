use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::vector::Metadata;

/// Curated quality tier of a table. Higher tiers are preferred when the
/// model narrows the retrieved tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Gold,
    Silver,
    Bronze,
    #[default]
    Iron,
}

impl Tier {
    /// All tiers, most trusted first.
    pub const RANKED: [Tier; 4] = [Tier::Gold, Tier::Silver, Tier::Bronze, Tier::Iron];

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Gold => "GOLD",
            Tier::Silver => "SILVER",
            Tier::Bronze => "BRONZE",
            Tier::Iron => "IRON",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GOLD" => Ok(Tier::Gold),
            "SILVER" => Ok(Tier::Silver),
            "BRONZE" => Ok(Tier::Bronze),
            "IRON" => Ok(Tier::Iron),
            other => anyhow::bail!("Unknown table tier: {other}"),
        }
    }
}

/// A relational table as stored in the table index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    /// Ordered `column type` pairs joined with `, `.
    pub schema: String,
    pub tier: Tier,
    pub domain: String,
    pub summary: String,
    /// Additional curated fields, stored alongside the core keys.
    #[serde(default)]
    pub extra: Metadata,
}

const CORE_KEYS: [&str; 5] = ["name", "summary", "schema", "tier", "domain"];

impl TableDescriptor {
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = self.extra.clone();
        metadata.insert("name".to_string(), self.name.clone());
        metadata.insert("summary".to_string(), self.summary.clone());
        metadata.insert("schema".to_string(), self.schema.clone());
        metadata.insert("tier".to_string(), self.tier.to_string());
        metadata.insert("domain".to_string(), self.domain.clone());
        metadata
    }

    /// Rebuild a descriptor from index metadata. Entries without a name are
    /// not tables and yield `None`.
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let name = metadata.get("name")?.clone();
        let tier: Tier = metadata
            .get("tier")
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();
        let domain = metadata
            .get("domain")
            .cloned()
            .unwrap_or_else(|| tier.to_string());
        Some(Self {
            name,
            schema: metadata.get("schema").cloned().unwrap_or_default(),
            tier,
            domain,
            summary: metadata.get("summary").cloned().unwrap_or_default(),
            extra: metadata
                .iter()
                .filter(|(k, _)| !CORE_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
    }
}

/// Render ordered `(column, type)` pairs the way they are stored and
/// shown to the model.
pub fn format_columns<'a, I>(columns: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    columns
        .into_iter()
        .map(|(name, data_type)| format!("{} {}", name, data_type))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A distinct observed query pattern and the intent behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryIntentRecord {
    pub sanitized_query: String,
    pub summary: String,
}

impl QueryIntentRecord {
    pub fn new(sanitized_query: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            sanitized_query: sanitized_query.into(),
            summary: summary.into(),
        }
    }

    /// Content hash of the sanitized query, so re-syncing an unchanged
    /// query overwrites the same entry.
    pub fn id(&self) -> String {
        intent_id(&self.sanitized_query)
    }

    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("summary".to_string(), self.summary.clone());
        metadata.insert("query".to_string(), self.sanitized_query.clone());
        metadata
    }

    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        Some(Self {
            sanitized_query: metadata.get("query")?.clone(),
            summary: metadata.get("summary").cloned().unwrap_or_default(),
        })
    }
}

pub fn intent_id(sanitized_query: &str) -> String {
    hex::encode(Sha256::digest(sanitized_query.as_bytes()))
}
