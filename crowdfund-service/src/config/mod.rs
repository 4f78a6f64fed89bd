use anyhow::{Context, Result};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub app: AppConfig,
    pub donation: DonationConfig,
    pub currency: CurrencyConfig,
    pub paystack: PaystackConfig,
    pub flutterwave: FlutterwaveConfig,
    pub monnify: MonnifyConfig,
    pub stripe: StripeConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AppConfig {
    /// Platform name, shown as the payment description at the gateways.
    pub name: String,
    /// Public base URL used to build provider callback and cancel URLs.
    pub base_url: String,
}

impl AppConfig {
    /// Callback endpoint for a provider, carrying the donation id so a
    /// cancelled or failed payment can be correlated without a session.
    pub fn callback_url(&self, provider: &str, donation_id: uuid::Uuid) -> String {
        format!("{}/callbacks/{}?donation={}", self.base_url, provider, donation_id)
    }

    pub fn cancel_url(&self, donation_id: uuid::Uuid) -> String {
        format!("{}/payments/{}/cancelled", self.base_url, donation_id)
    }
}

/// Donation processing limits. All monetary values are in the base
/// currency unit.
#[derive(Deserialize, Clone, Debug)]
pub struct DonationConfig {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    /// Fixed fee added to the value charged at the gateway. Never credited
    /// to the campaign.
    pub fixed_fee: Decimal,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CurrencyConfig {
    pub code: String,
    pub symbol: String,
    pub precision: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PaystackConfig {
    pub secret_key: Secret<String>,
    pub api_base_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct FlutterwaveConfig {
    pub secret_key: Secret<String>,
    pub api_base_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MonnifyConfig {
    pub api_key: String,
    pub secret_key: Secret<String>,
    pub contract_code: String,
    pub api_base_url: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StripeConfig {
    pub secret_key: Secret<String>,
    pub api_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("CROWDFUND_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CROWDFUND_SERVICE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()?;

        let db_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 1)?,
            },
            app: AppConfig {
                name: env::var("APP_NAME").unwrap_or_else(|_| "Crowdfund".to_string()),
                base_url: env::var("APP_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            donation: DonationConfig {
                min_amount: decimal_env("DONATION_MIN_AMOUNT", "100")?,
                max_amount: decimal_env("DONATION_MAX_AMOUNT", "1000000000")?,
                fixed_fee: decimal_env("DONATION_FIXED_FEE", "50")?,
            },
            currency: CurrencyConfig {
                code: env::var("CURRENCY_CODE").unwrap_or_else(|_| "NGN".to_string()),
                symbol: env::var("CURRENCY_SYMBOL").unwrap_or_else(|_| "₦".to_string()),
                precision: env_or("CURRENCY_PRECISION", 2)?,
            },
            paystack: PaystackConfig {
                secret_key: secret_env("PAYSTACK_SECRET_KEY"),
                api_base_url: env::var("PAYSTACK_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            },
            flutterwave: FlutterwaveConfig {
                secret_key: secret_env("FLUTTERWAVE_SECRET_KEY"),
                api_base_url: env::var("FLUTTERWAVE_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.flutterwave.com/v3".to_string()),
            },
            monnify: MonnifyConfig {
                api_key: env::var("MONNIFY_API_KEY").unwrap_or_default(),
                secret_key: secret_env("MONNIFY_SECRET_KEY"),
                contract_code: env::var("MONNIFY_CONTRACT_CODE").unwrap_or_default(),
                api_base_url: env::var("MONNIFY_API_BASE_URL")
                    .unwrap_or_else(|_| "https://sandbox.monnify.com".to_string()),
            },
            stripe: StripeConfig {
                secret_key: secret_env("STRIPE_SECRET_KEY"),
                api_base_url: env::var("STRIPE_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            },
            service_name: "crowdfund-service".to_string(),
        })
    }
}

fn secret_env(name: &str) -> Secret<String> {
    Secret::new(env::var(name).unwrap_or_default())
}

fn decimal_env(name: &str, default: &str) -> Result<Decimal> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    Decimal::from_str(&raw).with_context(|| format!("{} must be a decimal number", name))
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} has an invalid value", name)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn callback_url_carries_donation_id() {
        let app = AppConfig {
            name: "Crowdfund".to_string(),
            base_url: "https://give.example.com".to_string(),
        };
        let id = Uuid::nil();
        assert_eq!(
            app.callback_url("paystack", id),
            format!("https://give.example.com/callbacks/paystack?donation={}", id)
        );
        assert_eq!(
            app.cancel_url(id),
            format!("https://give.example.com/payments/{}/cancelled", id)
        );
    }
}
