use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{admin, auth, documents, events, gateway, import, leads, media, objects, profiles};

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// The complete HTTP surface, shared by the server binary and tests.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(gateway::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/storage/{bucket}/{*key}", get(objects::serve_object))
        .route("/gateway", get(gateway::ws_upgrade));

    let protected_routes = Router::new()
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me))
        .route("/auth/is-admin", get(auth::is_admin))
        .route("/profile", get(profiles::get_profile).put(profiles::update_profile))
        .route("/profile/avatar", post(profiles::upload_avatar))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/{event_id}", get(events::get_event).put(events::update_event))
        .route(
            "/events/{event_id}/documents/{slot}",
            get(documents::download_document)
                .put(documents::upload_document)
                .delete(documents::delete_document),
        )
        .route(
            "/events/{event_id}/media",
            get(media::list_media).post(media::upload_media),
        )
        .route("/media/{media_id}", axum::routing::delete(media::delete_media))
        .route("/media/{media_id}/download", get(media::download_media))
        .route("/admin/events", get(events::admin_list_events))
        .route("/admin/events/{event_id}", put(events::admin_update_event))
        .route("/admin/users/{user_id}/events", get(events::admin_user_events))
        .route("/leads", get(leads::list_leads).post(leads::create_lead))
        .route(
            "/leads/{lead_id}",
            put(leads::update_lead).delete(leads::delete_lead),
        )
        .route(
            "/leads/{lead_id}/status",
            axum::routing::patch(leads::update_lead_status),
        )
        .route("/functions/v1/import-leads", post(import::import_leads))
        .route("/functions/v1/{name}", post(admin::run_function))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let body_limit = state.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
