//! The server-verified product update path.
//!
//! Unlike the cookie-authenticated HTML routes, the product update API
//! identifies its caller with a bearer token that is verified
//! cryptographically on every request. The target product is loaded by ID
//! and its owner compared against the token's subject before anything is
//! written, and every outcome is reported as JSON rather than HTML. A
//! companion endpoint mints tokens for the logged-in user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    auth::{TokenKeys, issue_token, verify_token},
    product::{ProductId, ProductName, get_product_by_id, update_product},
    user::UserID,
};

/// The JSON body accepted by the product update endpoint.
///
/// Omitted fields are left unchanged.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductUpdate {
    /// The new product name, if it should change.
    pub name: Option<String>,

    /// The new product description, if it should change.
    pub description: Option<String>,
}

/// The JSON reported for every outcome of the product update endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// Whether the update was applied.
    pub success: bool,

    /// A human-readable description of the outcome.
    pub message: String,
}

/// The JSON returned by the token mint endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// A signed bearer token for the logged-in user.
    pub token: String,
}

/// The state needed for the verified product update.
#[derive(Clone)]
pub struct UpdateProductEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub token_keys: TokenKeys,
}

impl FromRef<AppState> for UpdateProductEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            token_keys: state.token_keys.clone(),
        }
    }
}

/// The state needed for minting a bearer token.
#[derive(Clone)]
pub struct CreateTokenEndpointState {
    pub token_keys: TokenKeys,
}

impl FromRef<AppState> for CreateTokenEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            token_keys: state.token_keys.clone(),
        }
    }
}

fn rejected(status_code: StatusCode, message: &str) -> Response {
    (
        status_code,
        Json(UpdateOutcome {
            success: false,
            message: message.to_string(),
        }),
    )
        .into_response()
}

/// A route handler for the bearer-token verified product update.
///
/// The caller's identity comes exclusively from the verified token: a
/// missing or invalid token is rejected outright, never downgraded to an
/// unverified identity, and rejected requests never touch the store.
pub async fn update_product_endpoint(
    Path(product_id): Path<ProductId>,
    State(state): State<UpdateProductEndpointState>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    Json(update): Json<ProductUpdate>,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = authorization else {
        return rejected(StatusCode::UNAUTHORIZED, "No auth token was provided.");
    };

    let subject = match verify_token(bearer.token(), &state.token_keys) {
        Ok(user_id) => user_id,
        Err(_) => {
            return rejected(
                StatusCode::UNAUTHORIZED,
                "The auth token is invalid or expired.",
            );
        }
    };

    let new_name = match &update.name {
        Some(name) => match ProductName::new(name) {
            Ok(name) => Some(name),
            Err(error) => {
                return rejected(StatusCode::BAD_REQUEST, &error.to_string());
            }
        },
        None => None,
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return rejected(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred. Please try again later.",
            );
        }
    };

    let product = match get_product_by_id(product_id, &connection) {
        Ok(product) => product,
        Err(Error::NotFound) => {
            return rejected(StatusCode::NOT_FOUND, "The product could not be found.");
        }
        Err(error) => {
            tracing::error!("Failed to load product {product_id}: {error}");
            return rejected(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred. Please try again later.",
            );
        }
    };

    if product.user_id != subject {
        return rejected(
            StatusCode::FORBIDDEN,
            "You are not authorized to modify this product.",
        );
    }

    match update_product(
        product_id,
        new_name.as_ref(),
        update.description.as_deref(),
        subject,
        &connection,
    ) {
        Ok(_) => Json(UpdateOutcome {
            success: true,
            message: "Product updated.".to_string(),
        })
        .into_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while updating product {product_id}: {error}"
            );
            rejected(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred. Please try again later.",
            )
        }
    }
}

/// A route handler that mints a bearer token for the logged-in user.
///
/// This route sits behind the cookie auth middleware, so the user's identity
/// has already been established when it runs.
pub async fn create_token_endpoint(
    Extension(user_id): Extension<UserID>,
    State(state): State<CreateTokenEndpointState>,
) -> Response {
    match issue_token(user_id, &state.token_keys) {
        Ok(token) => Json(TokenResponse { token }).into_response(),
        Err(error) => {
            tracing::error!("Failed to issue a token for user {}: {error}", user_id.as_i64());
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
