use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub bind_port: u16,
    /// Fallback tenant applied when a request carries no X-Tenant-Id header.
    /// Empty means strict mode: requests without a tenant header are rejected.
    pub default_tenant_id: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            bind_address: env::var("SCHEDULING_BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port: env::var("SCHEDULING_BIND_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| {
                    warn!("SCHEDULING_BIND_PORT not set or invalid, using 3000");
                    3000
                }),
            default_tenant_id: env::var("SCHEDULING_DEFAULT_TENANT")
                .unwrap_or_else(|_| String::new()),
        };

        if config.default_tenant_id.is_empty() {
            warn!("SCHEDULING_DEFAULT_TENANT not set - requests must carry X-Tenant-Id");
        }

        config
    }

    pub fn has_default_tenant(&self) -> bool {
        !self.default_tenant_id.is_empty()
    }
}
