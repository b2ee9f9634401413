use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{data, system};
use crate::middleware::{cors_middleware, gateway_auth_middleware};
use crate::state::AppState;

/// Build the gateway router.
///
/// Layer order, outermost first: trace, CORS (answers OPTIONS before
/// anything else), then authentication and the IP gate on the versioned
/// data surface only. Root and health stay public.
pub fn router(state: AppState) -> Router {
    let data_routes = Router::new()
        .route(
            "/:version",
            get(data::discovery_root).fallback(data::method_not_allowed),
        )
        .route(
            "/:version/:resource",
            get(data::list)
                .post(data::create)
                .fallback(data::method_not_allowed),
        )
        .route(
            "/:version/:resource/:id",
            get(data::get_one)
                .put(data::update)
                .patch(data::update)
                .delete(data::delete)
                .fallback(data::method_not_allowed),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gateway_auth_middleware,
        ));

    Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .merge(data_routes)
        .layer(middleware::from_fn_with_state(state.clone(), cors_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
