//! Canonical output shapes consumed by the deployment step.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::classify::AssetType;

pub const DEFAULT_RULE_STAGE: &str = "login_success";
pub const DATABASE_STRATEGY: &str = "auth0";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    pub order: i64,
    pub stage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

/// Email template: metadata fields plus the HTML body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailTemplateRecord {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseOptions {
    pub custom_scripts: BTreeMap<String, String>,
    pub enabled_database_customization: bool,
    /// Options carried over from `settings.json`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConnectionRecord {
    pub name: String,
    pub strategy: String,
    pub options: DatabaseOptions,
    /// Remaining top-level fields of `settings.json`.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// Client, connection or resource server: merged metadata and config plus a name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedConfigRecord {
    pub name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Email provider or client grant: the parsed config as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRecord {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleConfigRecord {
    pub key: String,
    pub value: Value,
}

/// One unified asset. The variant always matches the asset type it is filed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AssetRecord {
    Rule(RuleRecord),
    DatabaseConnection(DatabaseConnectionRecord),
    Page(PageRecord),
    EmailTemplate(EmailTemplateRecord),
    EmailProvider(ConfigRecord),
    Client(NamedConfigRecord),
    ClientGrant(ConfigRecord),
    Connection(NamedConfigRecord),
    ResourceServer(NamedConfigRecord),
    RuleConfig(RuleConfigRecord),
}

impl AssetRecord {
    pub fn asset_type(&self) -> AssetType {
        match self {
            AssetRecord::Rule(_) => AssetType::Rule,
            AssetRecord::DatabaseConnection(_) => AssetType::DatabaseConnection,
            AssetRecord::Page(_) => AssetType::Page,
            AssetRecord::EmailTemplate(_) => AssetType::EmailTemplate,
            AssetRecord::EmailProvider(_) => AssetType::EmailProvider,
            AssetRecord::Client(_) => AssetType::Client,
            AssetRecord::ClientGrant(_) => AssetType::ClientGrant,
            AssetRecord::Connection(_) => AssetType::Connection,
            AssetRecord::ResourceServer(_) => AssetType::ResourceServer,
            AssetRecord::RuleConfig(_) => AssetType::RuleConfig,
        }
    }
}

/// Every asset of a tenant, keyed by asset type.
///
/// All asset types are always present; a type the tenant does not use maps to an
/// empty sequence. Sequences are logically sets and carry no meaningful order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeploymentManifest {
    records: BTreeMap<AssetType, Vec<AssetRecord>>,
}

impl Default for DeploymentManifest {
    fn default() -> Self {
        Self {
            records: AssetType::ALL.into_iter().map(|t| (t, Vec::new())).collect(),
        }
    }
}

impl DeploymentManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the records filed under `asset_type`.
    pub fn insert(&mut self, asset_type: AssetType, records: Vec<AssetRecord>) {
        self.records.insert(asset_type, records);
    }

    pub fn get(&self, asset_type: AssetType) -> &[AssetRecord] {
        self.records
            .get(&asset_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetType, &[AssetRecord])> {
        self.records.iter().map(|(t, r)| (*t, r.as_slice()))
    }

    /// Total number of records across all asset types.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleRecord> {
        self.get(AssetType::Rule).iter().filter_map(|r| match r {
            AssetRecord::Rule(rule) => Some(rule),
            _ => None,
        })
    }

    pub fn database_connections(&self) -> impl Iterator<Item = &DatabaseConnectionRecord> {
        self.get(AssetType::DatabaseConnection)
            .iter()
            .filter_map(|r| match r {
                AssetRecord::DatabaseConnection(db) => Some(db),
                _ => None,
            })
    }

    pub fn into_inner(self) -> BTreeMap<AssetType, Vec<AssetRecord>> {
        self.records
    }
}
