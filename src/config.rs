use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Upper bound (inclusive) for the "low stock" bucket of the weekly report.
    pub low_stock_threshold: i32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .filter(|h| *h > 0)
            .unwrap_or(24);
        let low_stock_threshold = env::var("LOW_STOCK_THRESHOLD")
            .ok()
            .and_then(|t| t.parse::<i32>().ok())
            .unwrap_or(10);
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            jwt_ttl_hours,
            low_stock_threshold,
        })
    }
}

/// Settings for the storefront client side.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub token_file: String,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let api_url = env::var("WHOLECART_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string());
        let token_file = env::var("WHOLECART_TOKEN_FILE")
            .unwrap_or_else(|_| ".wholecart-tokens.json".to_string());
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token_file,
        }
    }
}
