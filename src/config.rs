use anyhow::{Context, Result, ensure};
use std::{env, fmt, str::FromStr, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Dashboard HTTP interface configuration
    pub ui: UiConfig,

    /// Vendor API domain and credentials
    pub api: ApiConfig,

    /// Upper bounds for outbound requests
    pub timeouts: RequestTimeouts,

    /// Third-party VIN decode service
    pub vehicle_lookup: VehicleLookupConfig,
}

#[derive(Clone, Debug)]
pub struct UiConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub domain: String,
    pub credentials: ApiCredentials,
}

#[derive(Clone)]
pub struct ApiCredentials {
    pub key: String,
    pub secret: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestTimeouts {
    pub default: Duration,
    pub update: Duration,
    pub vehicle_lookup: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(10),
            update: Duration::from_secs(15),
            vehicle_lookup: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VehicleLookupConfig {
    pub base_url: String,
}

impl VehicleLookupConfig {
    pub const NHTSA_DECODE_VIN_URL: &str = "https://vpic.nhtsa.dot.gov/api/vehicles/DecodeVin";
}

impl AppConfig {
    /// Load and validate all configuration from environment variables
    ///
    /// Fails if any of the API credentials is missing. The application cannot
    /// do anything useful without them, so callers treat this as fatal.
    pub fn load() -> Result<Self> {
        Self::load_from(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn load_from(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            ui: UiConfig::load(&var)?,
            api: ApiConfig::load(&var)?,
            timeouts: RequestTimeouts::load(&var)?,
            vehicle_lookup: VehicleLookupConfig::load(&var),
        })
    }
}

impl UiConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_address = var("UI_BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(var, "UI_PORT", 8501)?;

        Ok(Self { bind_address, port })
    }
}

impl ApiConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let domain = required(var, "RAVEN_API_DOMAIN")?
            .trim_end_matches('/')
            .to_string();
        let key = required(var, "RAVEN_API_KEY")?;
        let secret = required(var, "RAVEN_API_SECRET")?;

        ensure!(
            domain.starts_with("http://") || domain.starts_with("https://"),
            "failed to parse RAVEN_API_DOMAIN: expected an http(s) URL, got {domain}"
        );

        Ok(Self {
            domain,
            credentials: ApiCredentials { key, secret },
        })
    }
}

impl RequestTimeouts {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            default: timeout(var, "REQUEST_TIMEOUT_SECS", defaults.default)?,
            update: timeout(var, "UPDATE_TIMEOUT_SECS", defaults.update)?,
            vehicle_lookup: timeout(var, "VEHICLE_LOOKUP_TIMEOUT_SECS", defaults.vehicle_lookup)?,
        })
    }
}

impl VehicleLookupConfig {
    fn load(var: &impl Fn(&str) -> Option<String>) -> Self {
        let base_url = var("VIN_DECODE_URL")
            .unwrap_or_else(|| Self::NHTSA_DECODE_VIN_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Self { base_url }
    }
}

fn required(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String> {
    var(name)
        .filter(|value| !value.trim().is_empty())
        .with_context(|| format!("failed to get {name}: API credentials are not configured"))
}

fn timeout(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    let secs = parse_or(var, name, default.as_secs())?;
    ensure!(secs > 0, "failed to parse {name}: timeout must be at least one second");

    Ok(Duration::from_secs(secs))
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("failed to parse {name}: invalid format")),
        None => Ok(default),
    }
}
