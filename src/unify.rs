//! Reshapes assembled records into the canonical per-type output.
//!
//! Field precedence is explicit: [`merge_layers`] applies layers in order and
//! later layers overwrite earlier ones, and fields a record sets itself (`name`,
//! `body`, ...) are removed from the merged map before it is flattened.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::assemble::AssembledRecord;
use crate::classify::{AssetType, EMAIL_PROVIDER_NAME};
use crate::download::DownloadedFile;
use crate::error::UnifyError;
use crate::manifest::{
    AssetRecord, ConfigRecord, DatabaseConnectionRecord, DatabaseOptions, EmailTemplateRecord,
    NamedConfigRecord, PageRecord, RuleConfigRecord, RuleRecord, DATABASE_STRATEGY,
    DEFAULT_RULE_STAGE,
};

#[derive(Debug, Default, Deserialize)]
struct RuleMetadata {
    #[serde(default, deserialize_with = "integral_order")]
    order: Option<i64>,
    stage: Option<String>,
    enabled: Option<bool>,
}

/// Accepts any JSON number with no fractional part, so `17` and `17.0` agree.
fn integral_order<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(order) = number.as_i64() {
        return Ok(Some(order));
    }
    match number.as_f64() {
        Some(order)
            if order.fract() == 0.0 && order >= i64::MIN as f64 && order <= i64::MAX as f64 =>
        {
            Ok(Some(order as i64))
        }
        _ => Err(serde::de::Error::custom(format!(
            "rule order must be a whole number, got {number}"
        ))),
    }
}

#[derive(Debug, Default, Deserialize)]
struct PageMetadata {
    enabled: Option<bool>,
}

/// Merges JSON objects in order; on key collision the later layer wins.
pub fn merge_layers<I>(layers: I) -> Map<String, Value>
where
    I: IntoIterator<Item = Map<String, Value>>,
{
    let mut merged = Map::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

fn without(mut fields: Map<String, Value>, reserved: &[&str]) -> Map<String, Value> {
    for key in reserved {
        fields.remove(*key);
    }
    fields
}

fn parse_value(file: &DownloadedFile) -> Result<Value, UnifyError> {
    serde_json::from_slice(&file.contents).map_err(|source| UnifyError::InvalidJson {
        path: file.path.clone(),
        source,
    })
}

/// Parses an optional JSON object file; an absent file is an empty object.
fn parse_object(file: Option<&DownloadedFile>) -> Result<Map<String, Value>, UnifyError> {
    let Some(file) = file else {
        return Ok(Map::new());
    };
    match parse_value(file)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(UnifyError::NotAnObject {
            path: file.path.clone(),
        }),
    }
}

fn parse_typed<T>(file: Option<&DownloadedFile>) -> Result<T, UnifyError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    let Some(file) = file else {
        return Ok(T::default());
    };
    serde_json::from_slice(&file.contents).map_err(|source| UnifyError::InvalidJson {
        path: file.path.clone(),
        source,
    })
}

/// Reshapes one assembled record. `Ok(None)` means the record is not emitted.
pub fn unify(
    asset_type: AssetType,
    record: &AssembledRecord,
) -> Result<Option<AssetRecord>, UnifyError> {
    if record.is_empty() {
        warn!(asset_type = %asset_type, name = %record.name, "Dropping asset without any files");
        return Ok(None);
    }

    let name = record.name.clone();
    let unified = match asset_type {
        AssetType::Rule => {
            let metadata: RuleMetadata = parse_typed(record.metadata.as_ref())?;
            AssetRecord::Rule(RuleRecord {
                script: record.body.as_ref().map(DownloadedFile::text),
                order: metadata.order.unwrap_or(0),
                stage: metadata
                    .stage
                    .unwrap_or_else(|| DEFAULT_RULE_STAGE.to_string()),
                enabled: metadata.enabled,
                name,
            })
        }
        AssetType::Page => {
            let metadata: PageMetadata = parse_typed(record.metadata.as_ref())?;
            AssetRecord::Page(PageRecord {
                html: record.body.as_ref().map(DownloadedFile::text),
                enabled: metadata.enabled,
                name,
            })
        }
        AssetType::EmailTemplate => {
            if name == EMAIL_PROVIDER_NAME {
                return Ok(None);
            }
            let metadata = parse_object(record.metadata.as_ref())?;
            AssetRecord::EmailTemplate(EmailTemplateRecord {
                body: record.body.as_ref().map(DownloadedFile::text),
                fields: without(metadata, &["name", "body"]),
                name,
            })
        }
        AssetType::EmailProvider => AssetRecord::EmailProvider(ConfigRecord {
            fields: parse_object(record.body.as_ref())?,
        }),
        AssetType::ClientGrant => AssetRecord::ClientGrant(ConfigRecord {
            fields: parse_object(record.body.as_ref())?,
        }),
        AssetType::DatabaseConnection => {
            AssetRecord::DatabaseConnection(unify_database(name, record)?)
        }
        AssetType::Client | AssetType::Connection | AssetType::ResourceServer => {
            let merged = merge_layers([
                parse_object(record.metadata.as_ref())?,
                parse_object(record.body.as_ref())?,
            ]);
            let named = NamedConfigRecord {
                fields: without(merged, &["name"]),
                name,
            };
            match asset_type {
                AssetType::Client => AssetRecord::Client(named),
                AssetType::Connection => AssetRecord::Connection(named),
                _ => AssetRecord::ResourceServer(named),
            }
        }
        AssetType::RuleConfig => {
            let Some(config) = record.body.as_ref() else {
                warn!(name = %name, "Rule config has no config file, skipping");
                return Ok(None);
            };
            let value = match parse_value(config)? {
                Value::Object(mut fields) => fields.remove("value").unwrap_or(Value::Null),
                _ => {
                    return Err(UnifyError::NotAnObject {
                        path: config.path.clone(),
                    })
                }
            };
            AssetRecord::RuleConfig(RuleConfigRecord { key: name, value })
        }
    };

    Ok(Some(unified))
}

fn unify_database(
    name: String,
    record: &AssembledRecord,
) -> Result<DatabaseConnectionRecord, UnifyError> {
    let mut settings = parse_object(record.settings.as_ref())?;

    let extra = match settings.remove("options") {
        Some(Value::Object(options)) => options,
        _ => Map::new(),
    };
    let custom_scripts: BTreeMap<String, String> = record
        .scripts
        .iter()
        .map(|(stage, file)| (stage.clone(), file.text()))
        .collect();

    Ok(DatabaseConnectionRecord {
        name,
        strategy: DATABASE_STRATEGY.to_string(),
        options: DatabaseOptions {
            custom_scripts,
            enabled_database_customization: true,
            extra: without(extra, &["customScripts", "enabledDatabaseCustomization"]),
        },
        settings: without(settings, &["name", "strategy"]),
    })
}

/// Unifies every record of one asset type, dropping those that resolve to nothing.
pub fn unify_all(
    asset_type: AssetType,
    records: &[AssembledRecord],
) -> Result<Vec<AssetRecord>, UnifyError> {
    let mut unified = Vec::with_capacity(records.len());
    for record in records {
        if let Some(asset) = unify(asset_type, record)? {
            unified.push(asset);
        }
    }
    Ok(unified)
}
