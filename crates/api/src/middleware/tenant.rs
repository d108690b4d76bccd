//! Tenant context extracted from request headers.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use serde_json::json;
use tally_shared::types::{TenantId, UserId};

/// Header carrying the tenant id.
pub const TENANT_HEADER: &str = "x-tenant-id";
/// Header carrying the acting user id.
pub const USER_HEADER: &str = "x-user-id";

/// Tenant and optional actor of a request.
///
/// ```ignore
/// async fn handler(ctx: TenantContext) -> impl IntoResponse {
///     let tenant = ctx.tenant_id;
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    /// Tenant every repository call is scoped to.
    pub tenant_id: TenantId,
    /// Acting user, recorded as `created_by`/`updated_by`.
    pub actor: Option<UserId>,
}

type Rejection = (StatusCode, Json<serde_json::Value>);

fn bad_request(error: &str, message: String) -> Rejection {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": error, "message": message })),
    )
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, Rejection> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| bad_request("invalid_header", format!("{name} is not valid ASCII")))
        })
        .transpose()
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw_tenant) = header(parts, TENANT_HEADER)? else {
            return Err(bad_request(
                "missing_tenant",
                format!("{TENANT_HEADER} header is required"),
            ));
        };
        let tenant_id = raw_tenant
            .trim()
            .parse::<TenantId>()
            .map_err(|_| bad_request("invalid_tenant", format!("{TENANT_HEADER} must be a UUID")))?;

        let actor = header(parts, USER_HEADER)?
            .map(|raw| {
                raw.trim()
                    .parse::<UserId>()
                    .map_err(|_| bad_request("invalid_user", format!("{USER_HEADER} must be a UUID")))
            })
            .transpose()?;

        Ok(Self { tenant_id, actor })
    }
}
