use std::{env, str::FromStr, time::Duration};

use serde::Serialize;

use crate::pricing::PricingPolicy;

/// How `POST /cart` treats a product that already has a line in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartMergePolicy {
    /// The requested quantity replaces the existing one.
    Replace,
    /// The requested quantity is added to the existing one.
    Accumulate,
}

impl FromStr for CartMergePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replace" => Ok(CartMergePolicy::Replace),
            "accumulate" => Ok(CartMergePolicy::Accumulate),
            other => Err(anyhow::anyhow!("unknown cart merge policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub currency: String,
    pub timeout: Duration,
    pub max_attempts: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub db_acquire_timeout: Duration,
    pub request_timeout: Duration,
    pub gateway: GatewayConfig,
    pub pricing: PricingPolicy,
    pub cart_merge_policy: CartMergePolicy,
    pub require_payment_before_delivery: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env_or("APP_PORT", 3000u16);

        let gateway = GatewayConfig {
            key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            key_secret: env::var("RAZORPAY_KEY_SECRET")?,
            webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
            api_base: env::var("RAZORPAY_API_BASE")
                .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "INR".to_string()),
            timeout: Duration::from_millis(env_or("GATEWAY_TIMEOUT_MS", 10_000u64)),
            max_attempts: env_or("GATEWAY_MAX_ATTEMPTS", 2usize).max(1),
        };

        let defaults = PricingPolicy::default();
        let pricing = PricingPolicy {
            free_shipping_threshold: env_or(
                "FREE_SHIPPING_THRESHOLD",
                defaults.free_shipping_threshold,
            ),
            flat_shipping_fee: env_or("FLAT_SHIPPING_FEE", defaults.flat_shipping_fee),
            tax_rate_bps: env_or("TAX_RATE_BPS", defaults.tax_rate_bps),
        };

        let cart_merge_policy = match env::var("CART_MERGE_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => CartMergePolicy::Replace,
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            db_acquire_timeout: Duration::from_millis(env_or("DB_ACQUIRE_TIMEOUT_MS", 5_000u64)),
            request_timeout: Duration::from_millis(env_or("REQUEST_TIMEOUT_MS", 30_000u64)),
            gateway,
            pricing,
            cart_merge_policy,
            require_payment_before_delivery: env_or("REQUIRE_PAYMENT_BEFORE_DELIVERY", false),
        })
    }
}

/// Parse an optional env var, falling back to `default` when it is unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}
