//! Effective configuration, read and validated once at startup.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::settings::{parse_bool, ConfigError, SettingsProvider};

pub const DEFAULT_CONTROLLER_PORT: u16 = 7462;
pub const DEFAULT_LOGIN_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_LOGIN_POLL_ATTEMPTS: u32 = 60;
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Which flavour of the workstation is being driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    Tws,
    Gateway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomingConnectionPolicy {
    Accept,
    Reject,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingSessionPolicy {
    Primary,
    Secondary,
    Manual,
}

fn redact<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if value.is_empty() { "" } else { "***" })
}

#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub ib_login_id: String,
    #[serde(serialize_with = "redact")]
    pub ib_password: String,
    pub fix_login_id: String,
    #[serde(serialize_with = "redact")]
    pub fix_password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ib_login_id", &self.ib_login_id)
            .field("fix_login_id", &self.fix_login_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginConfig {
    pub fix: bool,
    pub trading_mode: TradingMode,
    /// `None` leaves the "store settings on server" checkbox untouched.
    pub store_settings_on_server: Option<bool>,
    pub read_only_login: bool,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            fix: false,
            trading_mode: TradingMode::Live,
            store_settings_on_server: None,
            read_only_login: false,
            poll_interval: DEFAULT_LOGIN_POLL_INTERVAL,
            poll_attempts: DEFAULT_LOGIN_POLL_ATTEMPTS,
        }
    }
}

/// API settings applied through the configuration dialog after startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiSettings {
    /// 0 leaves the socket port as it is.
    pub force_port: u16,
    pub read_only_api: Option<bool>,
    pub allow_external_ips: Option<bool>,
}

impl ApiSettings {
    pub fn is_empty(&self) -> bool {
        self.force_port == 0 && self.read_only_api.is_none() && self.allow_external_ips.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    /// 0 disables the command server.
    pub port: u16,
    pub bind_address: IpAddr,
    pub control_from: Vec<IpAddr>,
    pub prompt: String,
    pub suppress_info: bool,
    pub command_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CONTROLLER_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_from: Vec::new(),
            prompt: String::new(),
            suppress_info: true,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Loopback peers are always allowed; others must be listed in `IbControlFrom`.
    pub fn is_peer_allowed(&self, peer: IpAddr) -> bool {
        peer.is_loopback() || self.control_from.contains(&peer)
    }
}

/// A weekly closedown slot such as `Friday 22:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedownAt {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl FromStr for ClosedownAt {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::invalid("ClosedownAt", s, "<day hh:mm>, e.g. Friday 22:00");
        let (day, time) = s.trim().split_once(char::is_whitespace).ok_or_else(invalid)?;
        let weekday = day.parse::<Weekday>().map_err(|_| invalid())?;
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| invalid())?;
        Ok(Self { weekday, time })
    }
}

impl fmt::Display for ClosedownAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.weekday, self.time.format("%H:%M"))
    }
}

impl Serialize for ClosedownAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutomationConfig {
    pub mode: AppMode,
    pub credentials: Credentials,
    pub login: LoginConfig,
    pub api: ApiSettings,
    pub server: ServerConfig,
    pub accept_incoming_connection: IncomingConnectionPolicy,
    pub existing_session: ExistingSessionPolicy,
    pub auto_closedown: bool,
    pub dismiss_password_expiry_warning: bool,
    pub dismiss_nse_compliance_notice: bool,
    pub demo_api_enable: bool,
    /// Keep the trades log open with every execution of the week shown.
    pub show_all_trades: bool,
    pub closedown_at: Option<ClosedownAt>,
    pub ib_dir: Option<PathBuf>,
}

impl AutomationConfig {
    /// Defaults for everything, with the given mode.
    pub fn new(mode: AppMode) -> Self {
        Self {
            mode,
            credentials: Credentials::default(),
            login: LoginConfig::default(),
            api: ApiSettings::default(),
            server: ServerConfig::default(),
            accept_incoming_connection: IncomingConnectionPolicy::Accept,
            existing_session: ExistingSessionPolicy::Manual,
            auto_closedown: true,
            dismiss_password_expiry_warning: false,
            dismiss_nse_compliance_notice: true,
            demo_api_enable: false,
            show_all_trades: false,
            closedown_at: None,
            ib_dir: None,
        }
    }

    pub fn from_settings(
        settings: &dyn SettingsProvider,
        mode: AppMode,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new(mode);

        config.credentials = Credentials {
            ib_login_id: settings.get_string("IbLoginId", ""),
            ib_password: settings.get_string("IbPassword", ""),
            fix_login_id: settings.get_string("FIXLoginId", ""),
            fix_password: settings.get_string("FIXPassword", ""),
        };
        for key in ["PasswordEncrypted", "FIXPasswordEncrypted"] {
            if settings.get_bool(key, false)? {
                warn!(setting = key, "encrypted passwords are not supported; using the value as given");
            }
        }

        config.login = LoginConfig {
            fix: settings.get_bool("FIX", false)?,
            trading_mode: choice(
                settings,
                "TradingMode",
                TradingMode::Live,
                &[("live", TradingMode::Live), ("paper", TradingMode::Paper)],
                "live or paper",
            )?,
            store_settings_on_server: optional_bool(settings, "StoreSettingsOnServer")?,
            read_only_login: settings.get_bool("ReadOnlyLogin", false)?,
            poll_interval: Duration::from_millis(positive(
                settings,
                "LoginPollInterval",
                DEFAULT_LOGIN_POLL_INTERVAL.as_millis() as i64,
            )?),
            poll_attempts: {
                let attempts =
                    positive(settings, "LoginPollAttempts", DEFAULT_LOGIN_POLL_ATTEMPTS as i64)?;
                u32::try_from(attempts).map_err(|_| {
                    ConfigError::invalid("LoginPollAttempts", &attempts.to_string(), "at most 4294967295")
                })?
            },
        };

        config.api = ApiSettings {
            force_port: port(settings, "ForceTwsApiPort", 0)?,
            read_only_api: optional_bool(settings, "ReadOnlyApi")?,
            allow_external_ips: optional_bool(settings, "AllowExternalIps")?,
        };

        config.server = ServerConfig {
            port: port(settings, "IbControllerPort", DEFAULT_CONTROLLER_PORT)?,
            bind_address: ip("IbBindAddress", &settings.get_string("IbBindAddress", ""))?
                .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            control_from: settings
                .get_string("IbControlFrom", "")
                .split(',')
                .filter_map(|entry| ip("IbControlFrom", entry).transpose())
                .collect::<Result<_, _>>()?,
            prompt: settings.get_string("CommandPrompt", ""),
            suppress_info: settings.get_bool("SuppressInfoMessages", true)?,
            command_timeout: Duration::from_secs(positive(
                settings,
                "CommandTimeout",
                DEFAULT_COMMAND_TIMEOUT.as_secs() as i64,
            )?),
        };

        config.accept_incoming_connection = choice(
            settings,
            "AcceptIncomingConnectionAction",
            IncomingConnectionPolicy::Accept,
            &[
                ("accept", IncomingConnectionPolicy::Accept),
                ("reject", IncomingConnectionPolicy::Reject),
                ("manual", IncomingConnectionPolicy::Manual),
            ],
            "accept, reject or manual",
        )?;
        config.existing_session = choice(
            settings,
            "ExistingSessionDetectedAction",
            ExistingSessionPolicy::Manual,
            &[
                ("primary", ExistingSessionPolicy::Primary),
                ("secondary", ExistingSessionPolicy::Secondary),
                ("manual", ExistingSessionPolicy::Manual),
            ],
            "primary, secondary or manual",
        )?;
        config.auto_closedown = settings.get_bool("IbAutoClosedown", true)?;
        config.dismiss_password_expiry_warning =
            settings.get_bool("DismissPasswordExpiryWarning", false)?;
        config.dismiss_nse_compliance_notice =
            settings.get_bool("DismissNSEComplianceNotice", true)?;
        config.demo_api_enable = choice(
            settings,
            "DemoApiEnable",
            false,
            &[("enable", true), ("disable", false)],
            "Enable or Disable",
        )?;
        config.show_all_trades = settings.get_bool("ShowAllTrades", false)?;

        let closedown = settings.get_string("ClosedownAt", "");
        config.closedown_at = match closedown.trim() {
            "" => None,
            value => Some(value.parse()?),
        };

        let ib_dir = settings.get_string("IbDir", "");
        config.ib_dir = (!ib_dir.trim().is_empty()).then(|| PathBuf::from(ib_dir.trim()));

        Ok(config)
    }

    /// Credentials the login forms treat as the IB API pair.
    pub fn ibapi_credentials(&self) -> (&str, &str) {
        (&self.credentials.ib_login_id, &self.credentials.ib_password)
    }

    pub fn fix_credentials(&self) -> (&str, &str) {
        (&self.credentials.fix_login_id, &self.credentials.fix_password)
    }
}

fn choice<T: Copy>(
    settings: &dyn SettingsProvider,
    key: &str,
    default: T,
    options: &[(&str, T)],
    expected: &'static str,
) -> Result<T, ConfigError> {
    let raw = settings.get_string(key, "");
    let value = raw.trim();
    if value.is_empty() {
        return Ok(default);
    }
    options
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(value))
        .map(|(_, option)| *option)
        .ok_or_else(|| ConfigError::invalid(key, value, expected))
}

fn optional_bool(settings: &dyn SettingsProvider, key: &str) -> Result<Option<bool>, ConfigError> {
    let raw = settings.get_string(key, "");
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    parse_bool(value)
        .map(Some)
        .ok_or_else(|| ConfigError::invalid(key, value, "yes/no or true/false"))
}

fn positive(settings: &dyn SettingsProvider, key: &str, default: i64) -> Result<u64, ConfigError> {
    let value = settings.get_int(key, default)?;
    if value <= 0 {
        return Err(ConfigError::invalid(key, &value.to_string(), "a positive integer"));
    }
    Ok(value as u64)
}

fn port(settings: &dyn SettingsProvider, key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = settings.get_int(key, default as i64)?;
    u16::try_from(value).map_err(|_| ConfigError::invalid(key, &value.to_string(), "a port number"))
}

fn ip(key: &str, raw: &str) -> Result<Option<IpAddr>, ConfigError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::invalid(key, value, "an IP address"))
}
