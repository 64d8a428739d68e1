use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub vnpay: VnPayConfig,
    pub sepay: SePayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// VNPay gateway credentials and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct VnPayConfig {
    /// Terminal code assigned by the gateway
    pub tmn_code: String,
    /// Shared HMAC secret for signing and callback verification
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub version: String,
    pub command: String,
    pub order_type: String,
}

/// SePay account and user-API credentials
#[derive(Debug, Clone, Deserialize)]
pub struct SePayConfig {
    pub api_key: String,
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").context("DATABASE_URL not set")?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
        };

        let vnpay = VnPayConfig {
            tmn_code: env::var("VNPAY_TMN_CODE").context("VNPAY_TMN_CODE not set")?,
            hash_secret: env::var("VNPAY_HASH_SECRET").context("VNPAY_HASH_SECRET not set")?,
            pay_url: env::var("VNPAY_PAY_URL").unwrap_or_else(|_| {
                "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string()
            }),
            return_url: env::var("VNPAY_RETURN_URL").context("VNPAY_RETURN_URL not set")?,
            version: env::var("VNPAY_VERSION").unwrap_or_else(|_| "2.1.0".to_string()),
            command: env::var("VNPAY_COMMAND").unwrap_or_else(|_| "pay".to_string()),
            order_type: env::var("VNPAY_ORDER_TYPE").unwrap_or_else(|_| "other".to_string()),
        };

        let sepay = SePayConfig {
            api_key: env::var("SEPAY_API_KEY").context("SEPAY_API_KEY not set")?,
            account_number: env::var("SEPAY_ACCOUNT_NUMBER")
                .context("SEPAY_ACCOUNT_NUMBER not set")?,
            account_name: env::var("SEPAY_ACCOUNT_NAME").context("SEPAY_ACCOUNT_NAME not set")?,
            bank_code: env::var("SEPAY_BANK_CODE").context("SEPAY_BANK_CODE not set")?,
            endpoint: env::var("SEPAY_ENDPOINT")
                .unwrap_or_else(|_| "https://my.sepay.vn".to_string()),
            timeout_secs: env::var("SEPAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("SEPAY_TIMEOUT_SECS must be a valid number")?,
        };

        let config = Config {
            server,
            database,
            vnpay,
            sepay,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.database.url.trim().is_empty() {
            return Err(anyhow!("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.vnpay.tmn_code.trim().is_empty() {
            return Err(anyhow!("VNPAY_TMN_CODE cannot be empty"));
        }

        if self.vnpay.hash_secret.trim().is_empty() {
            return Err(anyhow!("VNPAY_HASH_SECRET cannot be empty"));
        }

        if self.vnpay.return_url.trim().is_empty() {
            return Err(anyhow!("VNPAY_RETURN_URL cannot be empty"));
        }

        if self.sepay.api_key.trim().is_empty() {
            return Err(anyhow!("SEPAY_API_KEY cannot be empty"));
        }

        if self.sepay.account_number.trim().is_empty() {
            return Err(anyhow!("SEPAY_ACCOUNT_NUMBER cannot be empty"));
        }

        if self.sepay.bank_code.trim().is_empty() {
            return Err(anyhow!("SEPAY_BANK_CODE cannot be empty"));
        }

        if self.sepay.timeout_secs == 0 {
            return Err(anyhow!("SEPAY_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }
}
