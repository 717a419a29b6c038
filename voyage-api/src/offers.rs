use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use voyage_catalog::MaterializedOffer;
use voyage_offer::FetchRequest;
use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/offers/materialize-and-fetch", post(materialize_and_fetch))
}

/// POST /offers/materialize-and-fetch
/// Offset 0 rebuilds the user's offer set first; other offsets page it.
async fn materialize_and_fetch(
    State(state): State<AppState>,
    payload: Result<Json<FetchRequest>, JsonRejection>,
) -> Result<Json<Vec<MaterializedOffer>>, AppError> {
    let Json(request) = payload?;
    let page = state.retrieval.fetch(&request).await?;
    Ok(Json(page.rows))
}
