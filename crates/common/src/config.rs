/// One week, the default notification time-to-live.
const DEFAULT_NOTIFICATION_TTL_MS: u64 = 3600 * 1000 * 24 * 7;

/// A token contract whose transfers feed the payment-received channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenContract {
    pub symbol: String,
    pub address: String,
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Deployment environment label ("local", "staging", "production", ...)
    pub environment: String,

    /// Version reported by the status endpoint
    pub version: String,

    /// HTTP listen port
    pub port: u16,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 10)
    pub db_max_connections: u32,

    /// Blockscout-compatible explorer API base URL
    pub explorer_api_url: String,

    /// Per-request explorer timeout in milliseconds
    pub explorer_timeout_ms: u64,

    /// Standard polling cadence in milliseconds (payments and requests)
    pub polling_interval_ms: u64,

    /// Invite-redemption polling cadence in milliseconds
    pub invites_polling_interval_ms: u64,

    /// Transactions older than this are dropped instead of pushed
    pub notification_ttl_ms: u64,

    /// Locale used when a recipient has none registered
    pub default_locale: String,

    /// When set, notifications are rendered but never sent
    pub notifications_disabled: bool,

    /// Push backend send endpoint
    pub push_api_url: String,

    /// Bearer token for the push backend
    pub push_auth_token: Option<String>,

    /// Token contracts tracked for received payments
    pub payment_tokens: Vec<TokenContract>,

    /// Contract emitting payment-request events
    pub payment_request_address: Option<String>,

    /// Contract emitting invite-redemption events
    pub invite_escrow_address: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());
        let enforce_local = std::env::var("ENFORCE_LOCAL_NOTIFICATIONS")
            .map(|v| v == "true")
            .unwrap_or(false);

        Ok(Self {
            notifications_disabled: !enforce_local && environment == "local",
            environment,
            version: std::env::var("APP_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid u16"))?,
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            explorer_api_url: std::env::var("EXPLORER_API_URL").map_err(|_| {
                anyhow::anyhow!("EXPLORER_API_URL environment variable is required")
            })?,
            explorer_timeout_ms: std::env::var("EXPLORER_TIMEOUT_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("EXPLORER_TIMEOUT_MS must be a valid u64"))?,
            polling_interval_ms: std::env::var("POLLING_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLLING_INTERVAL_MS must be a valid u64"))?,
            invites_polling_interval_ms: std::env::var("INVITES_POLLING_INTERVAL_MS")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("INVITES_POLLING_INTERVAL_MS must be a valid u64"))?,
            notification_ttl_ms: std::env::var("NOTIFICATION_TTL_MS")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .map_err(|_| anyhow::anyhow!("NOTIFICATION_TTL_MS must be a valid u64"))?
                .unwrap_or(DEFAULT_NOTIFICATION_TTL_MS),
            default_locale: std::env::var("DEFAULT_LOCALE").unwrap_or_else(|_| "en".to_string()),
            push_api_url: std::env::var("PUSH_API_URL")
                .map_err(|_| anyhow::anyhow!("PUSH_API_URL environment variable is required"))?,
            push_auth_token: std::env::var("PUSH_AUTH_TOKEN").ok(),
            payment_tokens: parse_payment_tokens(
                &std::env::var("PAYMENT_TOKENS").unwrap_or_default(),
            )?,
            payment_request_address: non_empty(std::env::var("PAYMENT_REQUEST_ADDRESS").ok()),
            invite_escrow_address: non_empty(std::env::var("INVITE_ESCROW_ADDRESS").ok()),
        })
    }
}

/// Parse `SYMBOL=0xaddr,SYMBOL=0xaddr` into token contracts.
pub fn parse_payment_tokens(raw: &str) -> anyhow::Result<Vec<TokenContract>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (symbol, address) = entry.split_once('=').ok_or_else(|| {
                anyhow::anyhow!("PAYMENT_TOKENS entry `{entry}` must be SYMBOL=ADDRESS")
            })?;
            let address = address.trim();
            if !address.starts_with("0x") || address.len() != 42 {
                anyhow::bail!("PAYMENT_TOKENS address `{address}` is not a 20-byte hex address");
            }
            Ok(TokenContract {
                symbol: symbol.trim().to_string(),
                address: address.to_lowercase(),
            })
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_payment_tokens() {
        let tokens = parse_payment_tokens(
            "cUSD=0x765DE816845861e75A25fCA122bb6898B8B1282a, CELO=0x471EcE3750Da237f93B8E339c536989b8978a438",
        )
        .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].symbol, "cUSD");
        assert_eq!(tokens[0].address, "0x765de816845861e75a25fca122bb6898b8b1282a");
        assert_eq!(tokens[1].symbol, "CELO");
    }

    #[test]
    fn test_parse_payment_tokens_empty() {
        assert!(parse_payment_tokens("").unwrap().is_empty());
        assert!(parse_payment_tokens(" , ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_payment_tokens_rejects_garbage() {
        assert!(parse_payment_tokens("cUSD").is_err());
        assert!(parse_payment_tokens("cUSD=0x1234").is_err());
    }
}
