use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" | "postgrest" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub directory_seed_path: Option<String>,
    pub server_port: u16,
    pub booking_timeout_ms: u64,
    pub booking_retry_attempts: u32,
    pub default_appointment_minutes: i64,
    pub max_appointment_minutes: i64,
    pub slot_granularity_minutes: i64,
    pub max_page_size: usize,
    pub require_end_within_hours: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            directory_seed_path: None,
            server_port: 3000,
            booking_timeout_ms: 5_000,
            booking_retry_attempts: 1,
            default_appointment_minutes: 30,
            max_appointment_minutes: 480,
            slot_granularity_minutes: 15,
            max_page_size: 100,
            require_end_within_hours: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_default(),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: parse_var("STORAGE_BACKEND", defaults.storage_backend),
            directory_seed_path: env::var("DIRECTORY_SEED_PATH").ok().filter(|p| !p.is_empty()),
            server_port: parse_var("SERVER_PORT", defaults.server_port),
            booking_timeout_ms: parse_var("BOOKING_TIMEOUT_MS", defaults.booking_timeout_ms),
            booking_retry_attempts: parse_var("BOOKING_RETRY_ATTEMPTS", defaults.booking_retry_attempts),
            default_appointment_minutes: parse_var(
                "DEFAULT_APPOINTMENT_MINUTES",
                defaults.default_appointment_minutes,
            ),
            max_appointment_minutes: parse_var("MAX_APPOINTMENT_MINUTES", defaults.max_appointment_minutes),
            slot_granularity_minutes: parse_var(
                "SLOT_GRANULARITY_MINUTES",
                defaults.slot_granularity_minutes,
            ),
            max_page_size: parse_var("MAX_PAGE_SIZE", defaults.max_page_size),
            require_end_within_hours: parse_var(
                "REQUIRE_END_WITHIN_HOURS",
                defaults.require_end_within_hours,
            ),
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_supabase_configured() {
            warn!("Supabase storage selected but SUPABASE_URL / keys are missing");
        }
        if config.supabase_jwt_secret.is_empty() {
            warn!("Application not fully configured - JWT secret missing, every request will be rejected");
        }

        config
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    /// Key used for server-side PostgREST calls; falls back to the anon key.
    pub fn supabase_api_key(&self) -> &str {
        if self.supabase_service_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_key
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
