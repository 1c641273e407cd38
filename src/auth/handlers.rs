use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, CredentialsRequest, PublicUser},
        repo_types::User,
        services::{hash_password, validate_credentials, verify_password, AuthUser, JwtKeys},
    },
    errors::internal,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

fn issue(state: &AppState, user: User) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        internal(e)
    })?;
    Ok(Json(AuthResponse {
        access_token,
        user: PublicUser {
            id: user.id,
            username: user.username,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)> {
    let username = validate_credentials(&payload.username, &payload.password).map_err(|e| {
        warn!(error = %e, "registration rejected");
        e
    })?;

    let hash = hash_password(&payload.password).map_err(internal)?;

    let user = match User::create(&state.db, &username, &hash).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%username, "username already taken");
            return Err((StatusCode::CONFLICT, "Username already taken".into()));
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            return Err(internal(e));
        }
    };

    info!(user_id = %user.id, %username, "user registered");
    let body = issue(&state, user)?;
    Ok((StatusCode::CREATED, body))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string());
    let username = payload.username.trim();

    let user = match User::find_by_username(&state.db, username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%username, "login unknown username");
            return Err(invalid());
        }
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return Err(internal(e));
        }
    };

    if !verify_password(&payload.password, &user.password_hash).map_err(internal)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    info!(user_id = %user.id, "user logged in");
    issue(&state, user)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            warn!(%user_id, "token for unknown user");
            (StatusCode::UNAUTHORIZED, "User not found".to_string())
        })?;

    Ok(Json(PublicUser {
        id: user.id,
        username: user.username,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn register_rejects_bad_credentials_before_db() {
        let err = register(
            State(AppState::fake()),
            Json(CredentialsRequest {
                username: "ab".into(),
                password: "long-enough".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_response_shape() {
        let response = AuthResponse {
            access_token: "t".into(),
            user: PublicUser {
                id: Uuid::new_v4(),
                username: "alice".into(),
            },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["accessToken"], "t");
        assert_eq!(json["user"]["username"], "alice");
        assert!(json["user"].get("password_hash").is_none());
    }
}
