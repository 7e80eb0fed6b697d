use crate::error::AppError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentBackend {
    Stripe,
    Sandbox,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_file: String,
    pub public_origin: String,
    pub backend: PaymentBackend,
    // both credentials are checked where they are used, not at startup
    pub stripe_secret_key: Option<String>,
    pub stripe_publishable_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|val| !val.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|err| AppError::Config(format!("PORT must be a port number: {err}")))?,
            None => 3000,
        };

        let backend = match non_empty("PAYMENT_BACKEND").as_deref() {
            None | Some("stripe") => PaymentBackend::Stripe,
            Some("sandbox") => PaymentBackend::Sandbox,
            Some(other) => {
                return Err(AppError::Config(format!(
                    "PAYMENT_BACKEND must be `stripe` or `sandbox`, got `{other}`"
                )))
            }
        };

        let public_origin = non_empty("PUBLIC_ORIGIN")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            port,
            log_file: non_empty("LOG_FILE").unwrap_or_else(|| "app.log".to_string()),
            public_origin,
            backend,
            stripe_secret_key: non_empty("STRIPE_SECRET_KEY"),
            stripe_publishable_key: non_empty("STRIPE_PUBLISHABLE_KEY"),
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL")
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        })
    }
}
