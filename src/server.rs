//! HTTP face of the local type registry.
//!
//! Serves the remote validation and representation protocol for every
//! registered type, so one deployment can act as the remote type service of
//! another.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::datatype::{Environment, Representation, TypeRegistry};

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub value: Value,
    pub size: usize,
}

#[derive(Debug, Deserialize)]
pub struct RepresentRequest {
    pub value: Value,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Serialize)]
pub struct TypeListing {
    pub types: Vec<String>,
}

pub fn router(registry: Arc<TypeRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    Router::new()
        .route("/validate", get(list))
        .route("/validate/:name", post(validate))
        .route("/repr/:name", post(represent))
        .with_state(registry)
        .layer(cors)
}

async fn list(State(registry): State<Arc<TypeRegistry>>) -> Json<TypeListing> {
    Json(TypeListing {
        types: registry.names(),
    })
}

async fn validate(
    State(registry): State<Arc<TypeRegistry>>,
    Path(name): Path<String>,
    Json(request): Json<ValidateRequest>,
) -> (StatusCode, String) {
    let Some(handler) = registry.get(&name) else {
        return (StatusCode::NOT_FOUND, format!("unknown type {}", name));
    };
    match handler.validate(&request.value, request.size) {
        Ok(()) => {
            info!(type_name = %name, "value accepted");
            (StatusCode::OK, "valid".to_string())
        }
        Err(e) => {
            warn!(type_name = %name, error = %e, "value rejected");
            (StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn represent(
    State(registry): State<Arc<TypeRegistry>>,
    Path(name): Path<String>,
    Json(request): Json<RepresentRequest>,
) -> Response {
    let Some(handler) = registry.get(&name) else {
        return (StatusCode::NOT_FOUND, format!("unknown type {}", name)).into_response();
    };
    let mimetype = request.environment.mimetype().to_string();
    match handler.render(&request.value, &request.environment) {
        Ok(Representation::Text(text)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, mimetype)], text).into_response()
        }
        Ok(Representation::Bytes(bytes)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, mimetype)], bytes).into_response()
        }
        Err(e) => {
            warn!(type_name = %name, %mimetype, error = %e, "representation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
