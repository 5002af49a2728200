use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub session_ttl_hours: i64,
    pub magic_link_ttl_minutes: i64,
    /// Where the sign-in links in magic-link emails point.
    pub frontend_url: String,
    /// External base URL of this API, used to build public media URLs.
    pub public_base_url: String,
    pub media_dir: String,
    pub clinic_name: String,
    pub resend_api_key: Option<String>,
    pub from_email: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(24);
        let magic_link_ttl_minutes = env::var("MAGIC_LINK_TTL_MINUTES")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(15);
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let media_dir = env::var("MEDIA_DIR").unwrap_or_else(|_| "media".to_string());
        let clinic_name =
            env::var("CLINIC_NAME").unwrap_or_else(|_| "Clinica Orchidea".to_string());
        let resend_api_key = env::var("RESEND_API_KEY").ok().filter(|s| !s.is_empty());
        let from_email =
            env::var("FROM_EMAIL").unwrap_or_else(|_| "noreply@clinicaorchidea.it".to_string());

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl_hours,
            magic_link_ttl_minutes,
            frontend_url,
            public_base_url,
            media_dir,
            clinic_name,
            resend_api_key,
            from_email,
        })
    }
}
