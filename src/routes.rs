use crate::{
    api::attendance,
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{Scope, middleware::from_fn, web};
use std::sync::Arc;

// Per-route limiter; a zero rate still lets one request through per burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    // Both values are non-zero, so the builder always yields a config.
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter)
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(attendance_scope()),
    );
}

fn attendance_scope() -> Scope {
    web::scope("/attendance")
        // /attendance/events
        .service(web::resource("/events").route(web::post().to(attendance::record_event)))
        // /attendance/records?start_date=..&end_date=..&department=..
        .service(web::resource("/records").route(web::get().to(attendance::list_records)))
        .service(web::resource("/summary").route(web::get().to(attendance::summary)))
        .service(web::resource("/today").route(web::get().to(attendance::today)))
        // /attendance/absentees/{date}
        .service(
            web::resource("/absentees/{date}").route(web::post().to(attendance::mark_absentees)),
        )
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// KIOSK
//  └─ POST /api/attendance/events { employee_id, confidence }
//       ├─ first accepted match of the day -> clock-in
//       └─ later match -> clock-out

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
