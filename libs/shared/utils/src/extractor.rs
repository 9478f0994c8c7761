use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use shared_config::AppConfig;
use shared_models::{AppError, TenantId};

/// Middleware resolving the tenant scope for a request.
///
/// Identity and session issuance live outside this engine; by the time a
/// request reaches us the gateway has authenticated it and stamped the
/// tenant in the X-Tenant-Id header. We only parse and propagate it.
pub async fn tenant_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header_value = request
        .headers()
        .get("X-Tenant-Id")
        .map(|v| {
            v.to_str()
                .map(str::to_owned)
                .map_err(|_| AppError::BadRequest("Invalid X-Tenant-Id header".to_string()))
        })
        .transpose()?;

    let raw = match header_value {
        Some(value) => value,
        None if config.has_default_tenant() => config.default_tenant_id.clone(),
        None => {
            return Err(AppError::BadRequest(
                "Missing X-Tenant-Id header".to_string(),
            ))
        }
    };

    let tenant: TenantId = raw
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid X-Tenant-Id header".to_string()))?;

    request.extensions_mut().insert(tenant);

    Ok(next.run(request).await)
}
