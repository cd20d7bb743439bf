//! The HTTP-style collaborator surface.
//!
//! The actual HTTP server is out of scope; these functions carry the
//! semantic contract (validation, status-equivalent errors, and the
//! scheduling of the one-shot empty-room sweep) so any front can mount
//! them.

use std::sync::Arc;

use parlor_protocol::{CreateRoomRequest, CreateRoomResponse};
use parlor_room::RoomNeeds;

use crate::server::SharedCoordinator;

/// Failures of the API surface, mapped to HTTP-equivalent statuses via
/// [`status`](Self::status).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::NotFound(_) => 404,
        }
    }
}

/// Creates a room and schedules its empty-room grace check.
///
/// Fails with a 400-equivalent when the namespace is missing, when
/// `has_password` is set without a non-empty password, or when the
/// namespace is not registered.
pub async fn create_room(
    state: &SharedCoordinator,
    request: CreateRoomRequest,
) -> Result<CreateRoomResponse, ApiError> {
    if request.namespace.is_empty() {
        return Err(ApiError::BadRequest("invalid data".into()));
    }
    let password = if request.has_password {
        match request.password.as_deref() {
            Some(p) if !p.is_empty() => Some(p.to_string()),
            _ => return Err(ApiError::BadRequest("invalid data".into())),
        }
    } else {
        None
    };

    let (hash, grace) = {
        let mut coordinator = state.lock().await;
        let hash = coordinator
            .create_room(&request.namespace, password.as_deref())
            .ok_or_else(|| {
                ApiError::BadRequest(format!("namespace {} not registered", request.namespace))
            })?;
        (hash, coordinator.config().room_grace)
    };

    // One-shot check: a room nobody joined within the grace period is
    // deleted; the sweep re-checks membership at fire time.
    let state = Arc::clone(state);
    let code = hash.clone();
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        state.lock().await.sweep_room(&code);
    });

    Ok(CreateRoomResponse { hash })
}

/// 404-equivalent existence check.
pub async fn room_exists(state: &SharedCoordinator, hash: &str) -> Result<(), ApiError> {
    if state.lock().await.room_exists(hash) {
        Ok(())
    } else {
        Err(ApiError::NotFound("room not found".into()))
    }
}

/// What a client must supply to join the room: 404-equivalent if the
/// room is unknown.
pub async fn room_needs(state: &SharedCoordinator, hash: &str) -> Result<RoomNeeds, ApiError> {
    state
        .lock()
        .await
        .needs(hash)
        .ok_or_else(|| ApiError::NotFound("room not found".into()))
}
