//! Resource registry collaborator: the analytics core only asks whether a
//! resource id exists. The in-memory registry also serves registration so
//! the binary is usable on its own.

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

#[async_trait]
pub trait ResourceRegistry: Send + Sync {
    async fn resource_exists(&self, resource_id: i64) -> bool;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateResource {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub file_url: String,
}

/// Registry holding resources in process memory, ids assigned from 1.
pub struct InMemoryRegistry {
    resources: RwLock<HashMap<i64, Resource>>,
    next_id: AtomicI64,
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn register(&self, input: CreateResource) -> Resource {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resource = Resource {
            id,
            title: input.title,
            kind: input.kind,
            file_url: input.file_url,
        };
        self.resources
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, resource.clone());
        tracing::info!(resource_id = id, title = %resource.title, "resource registered");
        resource
    }

    /// Register a resource under a caller-chosen id (fixtures, imports).
    pub fn insert(&self, resource: Resource) {
        self.next_id.fetch_max(resource.id + 1, Ordering::Relaxed);
        self.resources
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(resource.id, resource);
    }

    pub fn get(&self, resource_id: i64) -> Option<Resource> {
        self.resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&resource_id)
            .cloned()
    }
}

#[async_trait]
impl ResourceRegistry for InMemoryRegistry {
    async fn resource_exists(&self, resource_id: i64) -> bool {
        self.resources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&resource_id)
    }
}

/// POST /v1/resources - Register a new resource.
pub async fn create_resource(
    State(registry): State<Arc<InMemoryRegistry>>,
    Json(input): Json<CreateResource>,
) -> AppResult<Json<Resource>> {
    if input.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if input.kind.trim().is_empty() {
        return Err(AppError::Validation("type is required".to_string()));
    }
    if input.file_url.trim().is_empty() {
        return Err(AppError::Validation("file_url is required".to_string()));
    }
    Ok(Json(registry.register(input)))
}

/// GET /v1/resources/:id
pub async fn get_resource(
    State(registry): State<Arc<InMemoryRegistry>>,
    Path(resource_id): Path<i64>,
) -> AppResult<Json<Resource>> {
    registry
        .get(resource_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("resource {resource_id}")))
}
