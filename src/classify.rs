//! Path classification: maps a repository-relative path to the asset it belongs to.
//!
//! Classification is total. Every path either maps to exactly one
//! `(AssetType, FileRole)` pair or is rejected with `None`; nothing here fails.

use serde::Serialize;

use crate::config::Layout;

pub const RULES_DIRECTORY: &str = "rules";
pub const DATABASE_CONNECTIONS_DIRECTORY: &str = "database-connections";
pub const PAGES_DIRECTORY: &str = "pages";
pub const EMAIL_TEMPLATES_DIRECTORY: &str = "email-templates";
pub const CLIENTS_DIRECTORY: &str = "clients";
pub const CLIENT_GRANTS_DIRECTORY: &str = "client-grants";
pub const CONNECTIONS_DIRECTORY: &str = "connections";
pub const RESOURCE_SERVERS_DIRECTORY: &str = "resource-servers";
pub const RULES_CONFIGS_DIRECTORY: &str = "rules-configs";

pub const PAGE_NAMES: &[&str] = &["login", "password_reset", "guardian_multifactor", "error_page"];

pub const EMAIL_TEMPLATE_NAMES: &[&str] = &[
    "verify_email",
    "reset_email",
    "welcome_email",
    "blocked_account",
    "stolen_credentials",
    "enrollment_email",
    "mfa_oob_code",
    "change_password",
    "password_reset",
];

pub const DATABASE_SCRIPTS: &[&str] = &[
    "login",
    "create",
    "verify",
    "change_password",
    "delete",
    "get_user",
    "change_email",
    "change_username",
];

pub const EMAIL_PROVIDER_NAME: &str = "provider";
pub const EMAIL_PROVIDER_FILE: &str = "provider.json";
pub const DATABASE_SETTINGS_FILE: &str = "settings.json";
const DATABASE_SETTINGS_NAME: &str = "settings";

pub const META_SUFFIX: &str = ".meta.json";

/// Category of tenant configuration. Serialized as the manifest key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AssetType {
    #[serde(rename = "rules")]
    Rule,
    #[serde(rename = "databases")]
    DatabaseConnection,
    #[serde(rename = "pages")]
    Page,
    #[serde(rename = "emailTemplates")]
    EmailTemplate,
    #[serde(rename = "emailProvider")]
    EmailProvider,
    #[serde(rename = "clients")]
    Client,
    #[serde(rename = "clientGrants")]
    ClientGrant,
    #[serde(rename = "connections")]
    Connection,
    #[serde(rename = "resourceServers")]
    ResourceServer,
    #[serde(rename = "ruleConfigs")]
    RuleConfig,
}

impl AssetType {
    pub const ALL: [AssetType; 10] = [
        AssetType::Rule,
        AssetType::DatabaseConnection,
        AssetType::Page,
        AssetType::EmailTemplate,
        AssetType::EmailProvider,
        AssetType::Client,
        AssetType::ClientGrant,
        AssetType::Connection,
        AssetType::ResourceServer,
        AssetType::RuleConfig,
    ];

    /// Directory (below the layout base) holding this asset type.
    pub fn directory(self) -> &'static str {
        match self {
            AssetType::Rule => RULES_DIRECTORY,
            AssetType::DatabaseConnection => DATABASE_CONNECTIONS_DIRECTORY,
            AssetType::Page => PAGES_DIRECTORY,
            AssetType::EmailTemplate | AssetType::EmailProvider => EMAIL_TEMPLATES_DIRECTORY,
            AssetType::Client => CLIENTS_DIRECTORY,
            AssetType::ClientGrant => CLIENT_GRANTS_DIRECTORY,
            AssetType::Connection => CONNECTIONS_DIRECTORY,
            AssetType::ResourceServer => RESOURCE_SERVERS_DIRECTORY,
            AssetType::RuleConfig => RULES_CONFIGS_DIRECTORY,
        }
    }

    /// Distinct asset directories, in declaration order.
    pub fn directories() -> Vec<&'static str> {
        let mut dirs: Vec<&'static str> = Vec::new();
        for asset_type in AssetType::ALL {
            let dir = asset_type.directory();
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
        }
        dirs
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AssetType::Rule => "rule",
            AssetType::DatabaseConnection => "database connection",
            AssetType::Page => "page",
            AssetType::EmailTemplate => "email template",
            AssetType::EmailProvider => "email provider",
            AssetType::Client => "client",
            AssetType::ClientGrant => "client grant",
            AssetType::Connection => "connection",
            AssetType::ResourceServer => "resource server",
            AssetType::RuleConfig => "rule config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileRole {
    /// Script, HTML or JSON config body.
    Body,
    Metadata,
    /// `settings.json` of a database connection.
    Settings,
}

/// Result of classifying one path.
///
/// `group_key` identifies the candidate the file belongs to. `name` is the file's own
/// name inside that candidate, which only differs from `group_key` for database
/// connection scripts (`group_key` = connection, `name` = script stage).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub asset_type: AssetType,
    pub role: FileRole,
    pub group_key: String,
    pub name: String,
}

impl Classification {
    fn grouped(asset_type: AssetType, role: FileRole, stem: &str) -> Self {
        Self {
            asset_type,
            role,
            group_key: stem.to_string(),
            name: stem.to_string(),
        }
    }
}

/// Classifies `path` against the default layout (asset directories at the repository root).
pub fn classify(path: &str) -> Option<Classification> {
    classify_in(&Layout::default(), path)
}

/// Classifies `path` against `layout`.
pub fn classify_in(layout: &Layout, path: &str) -> Option<Classification> {
    let relative = layout.relative(path)?;
    let segments: Vec<&str> = relative.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let (directory, rest) = segments.split_first()?;

    match *directory {
        RULES_DIRECTORY => single_file(rest).and_then(classify_rule),
        DATABASE_CONNECTIONS_DIRECTORY => classify_database_file(rest),
        PAGES_DIRECTORY => {
            single_file(rest).and_then(|f| classify_template(AssetType::Page, PAGE_NAMES, f))
        }
        EMAIL_TEMPLATES_DIRECTORY => single_file(rest).and_then(classify_email_file),
        CLIENTS_DIRECTORY => single_file(rest).and_then(|f| classify_config(AssetType::Client, f)),
        CLIENT_GRANTS_DIRECTORY => {
            single_file(rest).and_then(|f| classify_config(AssetType::ClientGrant, f))
        }
        CONNECTIONS_DIRECTORY => {
            single_file(rest).and_then(|f| classify_config(AssetType::Connection, f))
        }
        RESOURCE_SERVERS_DIRECTORY => {
            single_file(rest).and_then(|f| classify_config(AssetType::ResourceServer, f))
        }
        RULES_CONFIGS_DIRECTORY => {
            single_file(rest).and_then(|f| classify_config(AssetType::RuleConfig, f))
        }
        _ => None,
    }
}

fn single_file<'a>(rest: &[&'a str]) -> Option<&'a str> {
    match rest {
        &[file] => Some(file),
        _ => None,
    }
}

/// Case-insensitive suffix strip. The remaining stem must be non-empty.
fn strip_extension<'a>(file: &'a str, suffix: &str) -> Option<&'a str> {
    let split = file.len().checked_sub(suffix.len())?;
    let tail = file.get(split..)?;
    if split == 0 || !tail.eq_ignore_ascii_case(suffix) {
        return None;
    }
    file.get(..split)
}

fn classify_rule(file: &str) -> Option<Classification> {
    let (stem, role) = if let Some(stem) = strip_extension(file, META_SUFFIX) {
        (stem, FileRole::Metadata)
    } else if let Some(stem) = strip_extension(file, ".json") {
        (stem, FileRole::Metadata)
    } else {
        (strip_extension(file, ".js")?, FileRole::Body)
    };
    Some(Classification::grouped(AssetType::Rule, role, stem))
}

fn classify_config(asset_type: AssetType, file: &str) -> Option<Classification> {
    let (stem, role) = match strip_extension(file, META_SUFFIX) {
        Some(stem) => (stem, FileRole::Metadata),
        None => (strip_extension(file, ".json")?, FileRole::Body),
    };
    Some(Classification::grouped(asset_type, role, stem))
}

fn classify_template(asset_type: AssetType, names: &[&str], file: &str) -> Option<Classification> {
    let (stem, role) = match strip_extension(file, ".html") {
        Some(stem) => (stem, FileRole::Body),
        None => (strip_extension(file, ".json")?, FileRole::Metadata),
    };
    if !names.contains(&stem) {
        return None;
    }
    Some(Classification::grouped(asset_type, role, stem))
}

fn classify_email_file(file: &str) -> Option<Classification> {
    if file == EMAIL_PROVIDER_FILE {
        return Some(Classification::grouped(
            AssetType::EmailProvider,
            FileRole::Body,
            EMAIL_PROVIDER_NAME,
        ));
    }
    classify_template(AssetType::EmailTemplate, EMAIL_TEMPLATE_NAMES, file)
}

/// `database-connections/<connection>/<script>.js` or `.../<connection>/settings.json`.
fn classify_database_file(rest: &[&str]) -> Option<Classification> {
    let [connection, file] = rest else {
        return None;
    };

    if file.eq_ignore_ascii_case(DATABASE_SETTINGS_FILE) {
        return Some(Classification {
            asset_type: AssetType::DatabaseConnection,
            role: FileRole::Settings,
            group_key: connection.to_string(),
            name: DATABASE_SETTINGS_NAME.to_string(),
        });
    }

    let script = strip_extension(file, ".js")?;
    if !DATABASE_SCRIPTS.contains(&script) {
        return None;
    }
    Some(Classification {
        asset_type: AssetType::DatabaseConnection,
        role: FileRole::Body,
        group_key: connection.to_string(),
        name: script.to_string(),
    })
}
