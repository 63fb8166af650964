use crate::model::role::Role;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    error::{ErrorForbidden, ErrorUnauthorized},
};
use futures::future::{Ready, ready};
use tracing::debug;

/// Caller identity placed in request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ErrorUnauthorized("Missing token")),
        )
    }
}

impl AuthUser {
    fn require(&self, allowed: bool, message: &'static str) -> actix_web::Result<()> {
        if allowed {
            Ok(())
        } else {
            debug!(user_id = self.user_id, email = %self.email, role = ?self.role, "{message}");
            Err(ErrorForbidden(message))
        }
    }

    pub fn require_admin(&self) -> actix_web::Result<()> {
        self.require(self.role == Role::Admin, "Admin only")
    }

    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        self.require(self.role.reads_reports(), "HR/Admin only")
    }

    /// Kiosks, system integrations and admins may submit recognition events.
    pub fn require_event_source(&self) -> actix_web::Result<()> {
        self.require(self.role.submits_events(), "Not allowed to submit attendance events")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test::TestRequest};

    fn kiosk() -> AuthUser {
        AuthUser {
            user_id: 4,
            email: "lobby-kiosk@company.test".into(),
            role: Role::Kiosk,
            employee_id: Some(12),
        }
    }

    #[actix_web::test]
    async fn extractor_returns_the_identity_set_by_the_middleware() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(kiosk());

        let user = AuthUser::extract(&req).await.unwrap();
        assert_eq!(user.email, "lobby-kiosk@company.test");
        assert_eq!(user.employee_id, Some(12));
        assert!(user.require_event_source().is_ok());
        assert!(user.require_hr_or_admin().is_err());
    }

    #[actix_web::test]
    async fn missing_identity_is_unauthorized() {
        let req = TestRequest::default().to_http_request();
        let err = AuthUser::extract(&req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}
