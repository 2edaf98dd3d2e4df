use axum::extract::State;
use axum::Json;

use crate::response::{ModelCard, ModelList};
use crate::state::AppState;

/// GET /v1/models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    let model = &state.config.model;
    Json(ModelList {
        object: "list",
        data: vec![ModelCard {
            id: model.alias.clone(),
            object: "model",
            created: chrono::Utc::now().timestamp(),
            owned_by: model.owner.clone(),
        }],
    })
}
