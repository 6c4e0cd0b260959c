use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateUser {
    pub name: String,
}

#[derive(Deserialize)]
pub struct UserFilter {
    pub prefix: Option<String>,
}

#[derive(Deserialize)]
pub struct SlowParams {
    #[serde(default)]
    pub ms: u64,
}

pub type Db = Arc<RwLock<HashMap<Uuid, User>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).delete(delete_user))
        .route("/echo", post(echo))
        .route("/text", get(text))
        .route("/status/{code}", get(status))
        .route("/slow", get(slow))
        .route("/headers", get(headers))
        .route("/query", get(query))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// `?prefix=` keeps users whose name starts with it. Sorted by name so
/// clients see a stable order.
async fn list_users(
    State(db): State<Db>,
    Query(filter): Query<UserFilter>,
) -> Json<Vec<User>> {
    let prefix = filter.prefix.unwrap_or_default();
    let mut users: Vec<User> = db
        .read()
        .await
        .values()
        .filter(|user| user.name.starts_with(&prefix))
        .cloned()
        .collect();
    users.sort_by(|a, b| a.name.cmp(&b.name));
    Json(users)
}

/// Blank names are rejected with 400. A created user comes back with its
/// `Location`.
async fn create_user(
    State(db): State<Db>,
    Json(input): Json<CreateUser>,
) -> Result<impl IntoResponse, StatusCode> {
    let name = input.name.trim();
    if name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
    };
    db.write().await.insert(user.id, user.clone());
    let location = format!("/users/{}", user.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(user)))
}

async fn get_user(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<User>, StatusCode> {
    match db.read().await.get(&id) {
        Some(user) => Ok(Json(user.clone())),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn delete_user(State(db): State<Db>, Path(id): Path<Uuid>) -> StatusCode {
    if db.write().await.remove(&id).is_some() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Echo the body back with the request's content type.
async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ([(header::CONTENT_TYPE, content_type)], body)
}

async fn text() -> &'static str {
    "hello from mock-server"
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn slow(Query(params): Query<SlowParams>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    Json(serde_json::json!({ "slept_ms": params.ms }))
}

/// Request headers as a JSON object. Repeated headers keep the last value.
async fn headers(headers: HeaderMap) -> Json<HashMap<String, String>> {
    Json(
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
    )
}

/// Query pairs in order, as `[[key, value], ...]`.
async fn query(Query(pairs): Query<Vec<(String, String)>>) -> Json<Vec<(String, String)>> {
    Json(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_serializes_to_json() {
        let user = User {
            id: Uuid::nil(),
            name: "Test".to_string(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Test");
    }

    #[test]
    fn create_user_rejects_missing_name() {
        let result: Result<CreateUser, _> = serde_json::from_str(r#"{"nick":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn slow_params_default_to_zero() {
        let params: SlowParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.ms, 0);
    }
}
