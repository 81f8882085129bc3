use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use meritx_service::{AuthService, BalanceService, OrdersService};
use meritx_storage::Db;
use meritx_token::TokenManager;

use crate::auth;
use crate::error;
use crate::handlers;

/// Everything the handlers need, cloned per request. `cancel` is the
/// process-wide scope: the storage handle races its queries against it,
/// and the boundary abandons responses once it has fired.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub orders: OrdersService,
    pub balance: BalanceService,
    pub tokens: TokenManager,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(db: Db, tokens: TokenManager, cancel: CancellationToken) -> Self {
        Self {
            auth: AuthService::new(db.clone(), tokens.clone()),
            orders: OrdersService::new(db.clone()),
            balance: BalanceService::new(db),
            tokens,
            cancel,
        }
    }
}

/// Build the `/api/user` router. All routes except `register` and `login`
/// require a valid `access_token` cookie.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/orders",
            post(handlers::upload_order).get(handlers::list_orders),
        )
        .route("/balance", get(handlers::get_balance))
        .route("/balance/withdraw", post(handlers::withdraw))
        .route("/withdrawals", get(handlers::list_withdrawals))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let public = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login));

    Router::new()
        .nest("/api/user", public.merge(protected))
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            error::abandon_cancelled,
        ))
        .with_state(state)
}
