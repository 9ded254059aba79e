use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::backend::ChatMessage;
use crate::classifier::Turn;
use crate::service::{RememberOutcome, RememberRequest};

const DEFAULT_LIST_LIMIT: usize = 10;
const DEFAULT_SEARCH_LIMIT: usize = 10;

type ApiResult<T> = Result<T, ApiError>;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let service = &state.service;
    let info = &state.info;

    let classifier = match service.gate() {
        Some(gate) => json!({
            "enabled": true,
            "profile": info.classifier_profile,
            "model": gate.backend().model(),
            "base_url": info.classifier_base_url,
        }),
        None => json!({ "enabled": false }),
    };
    let embedder = service.embedder();

    Json(json!({
        "status": "ok",
        "classifier": classifier,
        "embedding": {
            "provider": info.embedding_provider,
            "model": embedder.model_name(),
            "dimensions": embedder.dimensions(),
        },
        "chat": {
            "enabled": service.chat_backend().is_some(),
            "profile": info.chat_profile,
        },
        "stats": service.stats(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub limit: Option<usize>,
}

/// GET /v1/memories/
pub async fn list_memories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let records = state
        .service
        .list(
            query.user_id.as_deref(),
            query.agent_id.as_deref(),
            query.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        )
        .await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct AddMemoryBody {
    #[serde(default)]
    pub messages: Vec<Turn>,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub metadata: Option<Value>,
}

/// POST /v1/memories/
pub async fn add_memory(
    State(state): State<AppState>,
    payload: Result<Json<AddMemoryBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = payload?;
    let outcome = state
        .service
        .remember(RememberRequest {
            turns: body.messages,
            user_id: body.user_id,
            agent_id: body.agent_id,
            metadata: body.metadata,
        })
        .await?;
    let stats = state.service.stats();

    let response = match outcome {
        RememberOutcome::Discarded { id, reason } => (
            StatusCode::OK,
            Json(json!({
                "id": id,
                "status": "discarded",
                "reason": reason,
                "stats": stats,
            })),
        ),
        RememberOutcome::Stored { result, reason } => {
            let mut body = serde_json::to_value(&result.record)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            if let Value::Object(map) = &mut body {
                map.insert("status".into(), "stored".into());
                map.insert("deduplicated".into(), result.deduplicated.into());
                if let Some(reason) = reason {
                    map.insert("reason".into(), reason.into());
                }
                map.insert("stats".into(), json!(stats));
            }
            (StatusCode::CREATED, Json(body))
        }
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    pub user_id: Option<String>,
    pub agent_id: Option<String>,
    pub limit: Option<usize>,
}

/// POST /v1/memories/search/
pub async fn search_memories(
    State(state): State<AppState>,
    payload: Result<Json<SearchBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = payload?;
    let hits = state
        .service
        .search(
            &body.query,
            body.user_id.as_deref(),
            body.agent_id.as_deref(),
            body.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        )
        .await?;

    let results: Vec<Value> = hits
        .into_iter()
        .map(|hit| {
            let mut item = json!({
                "id": hit.record.id,
                "memory": hit.record.content,
                "user_id": hit.record.user_id,
                "metadata": hit.record.metadata,
                "created_at": hit.record.created_at,
                "score": hit.score,
                "distance": hit.distance,
            });
            if let (Some(agent_id), Value::Object(map)) = (hit.record.agent_id, &mut item) {
                map.insert("agent_id".into(), agent_id.into());
            }
            item
        })
        .collect();
    Ok(Json(json!({ "results": results })))
}

/// GET /v1/memories/{id}/
pub async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.service.get(&id).await?))
}

/// DELETE /v1/memories/{id}/
pub async fn delete_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.service.delete(&id).await?;
    Ok(Json(json!({ "deleted": true, "id": id })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteAllQuery {
    pub user_id: Option<String>,
}

/// DELETE /v1/memories/?user_id=
pub async fn delete_user_memories(
    State(state): State<AppState>,
    Query(query): Query<DeleteAllQuery>,
) -> ApiResult<impl IntoResponse> {
    let user_id = query.user_id.unwrap_or_default();
    let deleted = state.service.delete_all(&user_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum EmbeddingInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingsBody {
    pub input: EmbeddingInput,
}

/// POST /v1/embeddings
pub async fn embeddings(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingsBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = payload?;
    let inputs = match body.input {
        EmbeddingInput::One(text) => vec![text],
        EmbeddingInput::Many(texts) => texts,
    };
    let vectors = state.service.embed(&inputs).await?;

    let data: Vec<Value> = vectors
        .into_iter()
        .enumerate()
        .map(|(index, embedding)| {
            json!({
                "object": "embedding",
                "embedding": embedding,
                "index": index,
            })
        })
        .collect();
    Ok(Json(json!({
        "object": "list",
        "data": data,
        "model": state.service.embedder().model_name(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// POST /v1/chat/completions
pub async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatBody>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(body) = payload?;
    let content = state
        .service
        .chat(body.messages, body.max_tokens, body.temperature)
        .await?;
    let model = state
        .service
        .chat_backend()
        .map(|b| b.model().to_string())
        .unwrap_or_default();

    Ok(Json(json!({
        "id": format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop",
        }],
    })))
}
