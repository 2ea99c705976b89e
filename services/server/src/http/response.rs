use axum::http::HeaderMap;

use crate::auth::Principal;
use crate::errors::Kind;
use crate::state::AppState;

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Principal, Kind> {
    let authorization = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    state.auth.validate(authorization).await
}
