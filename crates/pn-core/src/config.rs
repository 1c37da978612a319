//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. parcel-notify.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。
//!
//! The loaded [`Config`] is immutable; it is built once at process entry and
//! handed to each stage by reference.

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Config file looked up in the working directory by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "parcel-notify.toml";

/// Microsoft Graph (mailbox side) configuration
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Azure AD tenant id
    pub tenant_id: String,
    /// App registration client id
    pub client_id: String,
    /// App registration client secret
    pub client_secret: String,
    /// Mailbox that receives the daily report
    pub user_email: String,
    /// Graph REST base, e.g. `https://graph.microsoft.com/v1.0`
    pub base_url: String,
    /// Identity provider base, e.g. `https://login.microsoftonline.com`
    pub login_base_url: String,
    /// Where the cached access token is persisted
    pub token_file: PathBuf,
}

impl GraphConfig {
    /// Client-credentials token endpoint for the configured tenant
    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.login_base_url, self.tenant_id
        )
    }
}

/// WhatsApp Cloud API (messaging side) configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Static bearer token for the messaging provider
    pub token: String,
    /// Sender phone number id
    pub phone_number_id: String,
    /// API base including version, e.g. `https://graph.facebook.com/v19.0`
    pub base_url: String,
    /// Administrator number: receives the run report, and every
    /// notification while test mode is on
    pub admin_phone: String,
    /// Reroute all recipient notifications to `admin_phone`
    pub test_mode: bool,
    pub notification_template: String,
    pub report_template: String,
    /// First body parameter of the report template
    pub report_title: String,
    /// Template language code
    pub language: String,
}

/// Job-level settings: what to look for and where to put it
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Local time zone used to decide whether a message arrived "today"
    pub timezone: Tz,
    pub subject_keyword: String,
    /// Exact subject that selects a message regardless of keyword and date
    pub test_subject: String,
    /// Folder path below the mailbox root, outermost first
    pub folder_path: Vec<String>,
    pub download_dir: PathBuf,
}

impl JobConfig {
    /// Current date in the configured time zone
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

/// Main configuration for parcel-notify
#[derive(Debug, Clone)]
pub struct Config {
    pub graph: GraphConfig,
    pub whatsapp: WhatsAppConfig,
    pub job: JobConfig,
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_login_base_url() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_token_file() -> String {
    "graph_token.json".to_string()
}

fn default_whatsapp_base_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_notification_template() -> String {
    "uparcel_delivery_reminder".to_string()
}

fn default_report_template() -> String {
    "messages_report".to_string()
}

fn default_report_title() -> String {
    "Uparcel Reminder".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_subject_keyword() -> String {
    "Uparcel Integration Daily Job CSV".to_string()
}

fn default_test_subject() -> String {
    "TEST UPARCEL CSV".to_string()
}

fn default_folder_path() -> Vec<String> {
    vec!["Automation".to_string(), "Uparcel Notifications".to_string()]
}

fn default_download_dir() -> String {
    "./attachments".to_string()
}

impl Config {
    /// デフォルトパスから設定を読み込む
    ///
    /// Uses `./parcel-notify.toml` when present, otherwise the environment
    /// alone.
    pub fn load() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// Environment variables take precedence over values in the file.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content, |key| std::env::var(key).ok())
    }

    /// Build a configuration from TOML text, expanding `${VAR}` and applying
    /// overrides through `lookup`.
    pub fn from_toml_str<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_env_vars(content, &lookup);
        let mut raw: TomlConfig = toml::from_str(&expanded)?;
        raw.apply_overrides(&lookup);
        raw.build()
    }

    /// Build a configuration from a key lookup (environment-style names)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut raw = TomlConfig::default();
        raw.apply_overrides(&lookup);
        raw.build()
    }
}

/// `${VAR_NAME}` を `lookup` の値に置換する（存在しない場合は空文字列）
fn expand_env_vars<F>(value: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                if let Some(expanded) = lookup(&after[..end]) {
                    result.push_str(&expanded);
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    result.push_str(rest);
    result
}

/// Interpret an on/off flag the way `TESTMODE=1` is written in `.env` files
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `Automation/Uparcel Notifications` -> `["Automation", "Uparcel Notifications"]`
fn parse_folder_path(value: &str) -> Vec<String> {
    value
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// TOML 構造体定義（ファイル解析用）
// ============================================================================

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    graph: TomlGraphConfig,
    #[serde(default)]
    whatsapp: TomlWhatsAppConfig,
    #[serde(default)]
    job: TomlJobConfig,
}

#[derive(Debug, Deserialize, Default)]
struct TomlGraphConfig {
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    user_email: Option<String>,
    base_url: Option<String>,
    login_base_url: Option<String>,
    token_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlWhatsAppConfig {
    token: Option<String>,
    phone_number_id: Option<String>,
    base_url: Option<String>,
    admin_phone: Option<String>,
    test_mode: Option<bool>,
    notification_template: Option<String>,
    report_template: Option<String>,
    report_title: Option<String>,
    language: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlJobConfig {
    timezone: Option<String>,
    subject_keyword: Option<String>,
    test_subject: Option<String>,
    folder_path: Option<Vec<String>>,
    download_dir: Option<String>,
}

impl TomlConfig {
    /// 環境変数で設定を上書きする
    fn apply_overrides<F>(&mut self, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = var(key) {
                *slot = Some(value);
            }
        };

        set(&mut self.graph.tenant_id, "TENANT_ID");
        set(&mut self.graph.client_id, "CLIENT_ID");
        set(&mut self.graph.client_secret, "CLIENT_SECRET");
        set(&mut self.graph.user_email, "USER_EMAIL");
        set(&mut self.graph.base_url, "GRAPH_BASE_URL");
        set(&mut self.graph.login_base_url, "LOGIN_BASE_URL");
        set(&mut self.graph.token_file, "TOKEN_FILE");

        set(&mut self.whatsapp.token, "WHATSAPP_TOKEN");
        set(&mut self.whatsapp.phone_number_id, "PHONE_NUMBER_ID");
        set(&mut self.whatsapp.base_url, "WHATSAPP_BASE_URL");
        set(&mut self.whatsapp.admin_phone, "ADMIN_PHONE");
        set(
            &mut self.whatsapp.notification_template,
            "NOTIFICATION_TEMPLATE",
        );
        set(&mut self.whatsapp.report_template, "REPORT_TEMPLATE");
        set(&mut self.whatsapp.report_title, "REPORT_TITLE");
        set(&mut self.whatsapp.language, "TEMPLATE_LANGUAGE");
        if let Some(flag) = var("TESTMODE") {
            self.whatsapp.test_mode = Some(parse_flag(&flag));
        }

        set(&mut self.job.timezone, "TIMEZONE");
        set(&mut self.job.subject_keyword, "SEARCH_SUBJECT_KEYWORD");
        set(&mut self.job.test_subject, "TEST_SUBJECT");
        set(&mut self.job.download_dir, "DOWNLOAD_DIR");
        if let Some(path) = var("FOLDER_PATH") {
            self.job.folder_path = Some(parse_folder_path(&path));
        }
    }

    /// Validate and convert into the immutable [`Config`]
    fn build(self) -> Result<Config> {
        let mut missing = Vec::new();
        let mut require = |value: Option<String>, key: &str| match non_empty(value) {
            Some(value) => value,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let tenant_id = require(self.graph.tenant_id, "TENANT_ID");
        let client_id = require(self.graph.client_id, "CLIENT_ID");
        let client_secret = require(self.graph.client_secret, "CLIENT_SECRET");
        let user_email = require(self.graph.user_email, "USER_EMAIL");
        let token = require(self.whatsapp.token, "WHATSAPP_TOKEN");
        let phone_number_id = require(self.whatsapp.phone_number_id, "PHONE_NUMBER_ID");
        let admin_phone = require(self.whatsapp.admin_phone, "ADMIN_PHONE");
        let timezone = require(self.job.timezone, "TIMEZONE");

        if !missing.is_empty() {
            return Err(Error::MissingConfig(missing));
        }

        let timezone: Tz = timezone
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid TIMEZONE '{}': {}", timezone, e)))?;

        let folder_path = self.job.folder_path.unwrap_or_else(default_folder_path);
        if folder_path.is_empty() {
            return Err(Error::Config("FOLDER_PATH must name at least one folder".to_string()));
        }

        let base = |value: Option<String>, default: fn() -> String| {
            non_empty(value)
                .unwrap_or_else(default)
                .trim_end_matches('/')
                .to_string()
        };

        Ok(Config {
            graph: GraphConfig {
                tenant_id,
                client_id,
                client_secret,
                user_email,
                base_url: base(self.graph.base_url, default_graph_base_url),
                login_base_url: base(self.graph.login_base_url, default_login_base_url),
                token_file: PathBuf::from(
                    non_empty(self.graph.token_file).unwrap_or_else(default_token_file),
                ),
            },
            whatsapp: WhatsAppConfig {
                token,
                phone_number_id,
                base_url: base(self.whatsapp.base_url, default_whatsapp_base_url),
                admin_phone,
                test_mode: self.whatsapp.test_mode.unwrap_or(false),
                notification_template: non_empty(self.whatsapp.notification_template)
                    .unwrap_or_else(default_notification_template),
                report_template: non_empty(self.whatsapp.report_template)
                    .unwrap_or_else(default_report_template),
                report_title: non_empty(self.whatsapp.report_title)
                    .unwrap_or_else(default_report_title),
                language: non_empty(self.whatsapp.language).unwrap_or_else(default_language),
            },
            job: JobConfig {
                timezone,
                subject_keyword: non_empty(self.job.subject_keyword)
                    .unwrap_or_else(default_subject_keyword),
                test_subject: non_empty(self.job.test_subject)
                    .unwrap_or_else(default_test_subject),
                folder_path,
                download_dir: PathBuf::from(
                    non_empty(self.job.download_dir).unwrap_or_else(default_download_dir),
                ),
            },
        })
    }
}
