use crate::auth::auth::AuthUser;
use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::debug;

fn unauthorized(req: ServiceRequest, body: serde_json::Value) -> ServiceResponse<BoxBody> {
    req.into_response(HttpResponse::Unauthorized().json(body).map_into_boxed_body())
}

/// Resolves the bearer access token into an `AuthUser` for the handlers below.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let Some(config) = req.app_data::<Data<Config>>().cloned() else {
        return Err(actix_web::error::ErrorInternalServerError("App config missing"));
    };

    let header = req
        .headers()
        .get("Authorization")
        .map(|h| h.to_str().map(str::to_owned));
    let token = match header {
        None => return Ok(unauthorized(req, json!({"error": "Missing Authorization header"}))),
        Some(Err(_)) => {
            return Ok(unauthorized(req, json!({"error": "Invalid Authorization header encoding"})));
        }
        Some(Ok(value)) => match value.strip_prefix("Bearer ") {
            Some(token) => token.to_owned(),
            None => {
                return Ok(unauthorized(
                    req,
                    json!({"error": "Authorization header must start with Bearer"}),
                ));
            }
        },
    };

    let claims = match verify_token(&token, &config.jwt_secret) {
        Ok(claims) if claims.token_type == TokenType::Access => claims,
        Ok(_) => return Ok(unauthorized(req, json!({"error": "Access token required"}))),
        Err(e) => {
            debug!(error = %e, "rejected bearer token");
            return Ok(unauthorized(
                req,
                json!({"error": "Invalid or expired token", "details": e}),
            ));
        }
    };

    let Some(role) = Role::from_id(claims.role) else {
        return Ok(unauthorized(req, json!({"error": "Invalid role"})));
    };

    req.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role,
        employee_id: claims.employee_id,
    });

    next.call(req).await
}
