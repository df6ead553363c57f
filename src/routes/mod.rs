use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod attendance;
pub mod booking;
pub mod class;
pub mod docs;
pub mod health;
pub mod waitlist;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(class::router())
        .merge(booking::router())
        .merge(waitlist::router())
        .merge(attendance::router())
        .merge(admin::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
