pub mod handlers;
pub mod machine;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::flow_routes()
}
