//! Shelfrank is a web app for ranking products within user-created categories.
//!
//! Products are ranked two ways: direct numeric grading on a 1-7 point scale
//! and pairwise win/loss comparisons. A combined score orders the products in
//! each category. Every category, product, and ranking record belongs to
//! exactly one user and is never visible to anyone else.
//!
//! This library provides a REST API that directly serves HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod alert;
mod app_state;
mod auth;
mod category;
mod db;
mod endpoints;
mod html;
mod image_store;
mod internal_server_error;
mod log_in;
mod log_out;
mod logging;
mod navigation;
mod not_found;
mod product;
mod ranking;
mod register_user;
mod routing;
mod score;
mod update_product;
mod user;

pub use app_state::AppState;
pub use auth::{PasswordHash, ValidatedPassword};
pub use category::{Category, CategoryName, create_category};
pub use db::initialize as initialize_db;
pub use image_store::ImageStore;
pub use logging::logging_middleware;
pub use product::{Product, ProductName, create_product};
pub use ranking::{Grade, create_comparative_rank, create_graded_rank};
pub use routing::build_router;
pub use score::{COMPARISON_WEIGHT, REFERENCE_SCALE_MAX, RankedProduct, compute_ranked_list};
pub use user::{Email, User, UserID, create_user, get_user_by_email, get_user_by_id};

use crate::{alert::Alert, internal_server_error::InternalServerError, not_found::get_404_not_found_response};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid combination of email and password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The auth cookie is missing from the cookie jar in the request.
    #[error("no auth cookie in the cookie jar")]
    CookieMissing,

    /// The auth cookie is present but expired or could not be parsed.
    #[error("the auth cookie is expired or malformed")]
    CookieInvalid,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The string used to register a user is not a valid email address.
    #[error("\"{0}\" is not a valid email address")]
    InvalidEmail(String),

    /// The email address used to register a user is already taken.
    #[error("the email address is already registered")]
    DuplicateEmail,

    /// An empty string was used to create a category name.
    #[error("Category name cannot be empty")]
    EmptyCategoryName,

    /// An empty string was used to create a product name.
    #[error("Product name cannot be empty")]
    EmptyProductName,

    /// A grade outside the reference 1-7 scale was submitted.
    #[error("{0} is not a valid grade, grades must be between 1 and 7")]
    InvalidGrade(i64),

    /// A pairwise comparison named the same product as both winner and loser.
    #[error("a product cannot be compared against itself")]
    SelfComparison,

    /// A ranking record referenced a product outside the category it was
    /// submitted against.
    #[error("the product does not belong to this category")]
    ProductNotInCategory,

    /// Tried to delete a category that still contains products.
    #[error("the category still contains products and cannot be deleted")]
    CategoryNotEmpty,

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// A bearer token could not be signed.
    #[error("could not create an auth token")]
    TokenCreation,

    /// A request to the verified mutation path arrived without a bearer token.
    #[error("no auth token was provided")]
    NoAuthToken,

    /// A bearer token failed cryptographic verification or has expired.
    #[error("the auth token is invalid or expired")]
    InvalidAuthToken,

    /// The verified caller does not own the entity they tried to modify.
    ///
    /// Kept distinct from [Error::NotFound]: the owner-checking caller is
    /// allowed to learn whether the entity exists.
    #[error("you are not authorized to modify this resource")]
    Forbidden,

    /// The multipart form could not be parsed as an image upload.
    #[error("Could not parse multipart form: {0}")]
    MultipartError(String),

    /// The uploaded file is not an image.
    #[error("File is not an image")]
    NotAnImage,

    /// The image file could not be written to the image directory.
    #[error("could not store the image: {0}")]
    ImageWriteError(String),

    /// Tried to update a category that does not exist
    #[error("tried to update a category that is not in the database")]
    UpdateMissingCategory,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,

    /// Tried to delete a product that does not exist
    #[error("tried to delete a product that is not in the database")]
    DeleteMissingProduct,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("user.email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => get_404_not_found_response(),
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                Html(
                    html::error_view(
                        "Forbidden",
                        "403",
                        "You do not own this resource.",
                        "Check that you are logged in to the right account",
                    )
                    .into_string(),
                ),
            )
                .into_response(),
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// Convert the error into an HTML alert fragment for htmx swaps.
    pub(crate) fn into_alert_response(self) -> Response {
        let (status_code, alert) = match self {
            Error::EmptyCategoryName | Error::EmptyProductName => (
                StatusCode::BAD_REQUEST,
                Alert::ErrorSimple {
                    message: self.to_string(),
                },
            ),
            Error::InvalidGrade(grade) => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid grade".to_owned(),
                    details: format!("{grade} is outside the 1-7 grading scale."),
                },
            ),
            Error::SelfComparison => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid comparison".to_owned(),
                    details: "Pick two different products to compare.".to_owned(),
                },
            ),
            Error::ProductNotInCategory => (
                StatusCode::BAD_REQUEST,
                Alert::Error {
                    message: "Invalid product".to_owned(),
                    details: "The product does not belong to this category.".to_owned(),
                },
            ),
            Error::CategoryNotEmpty => (
                StatusCode::CONFLICT,
                Alert::Error {
                    message: "Could not delete category".to_owned(),
                    details: "Delete its products first.".to_owned(),
                },
            ),
            Error::UpdateMissingCategory => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not update category".to_owned(),
                    details: "The category could not be found.".to_owned(),
                },
            ),
            Error::DeleteMissingCategory => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not delete category".to_owned(),
                    details: "The category could not be found.".to_owned(),
                },
            ),
            Error::DeleteMissingProduct => (
                StatusCode::NOT_FOUND,
                Alert::Error {
                    message: "Could not delete product".to_owned(),
                    details: "The product could not be found.".to_owned(),
                },
            ),
            Error::NotAnImage => (
                StatusCode::BAD_REQUEST,
                Alert::ErrorSimple {
                    message: "File type must be an image.".to_owned(),
                },
            ),
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                Alert::ErrorSimple {
                    message: "The requested item could not be found.".to_owned(),
                },
            ),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Alert::ErrorSimple {
                        message: "An internal error occurred. Please try again later.".to_owned(),
                    },
                )
            }
        };

        (status_code, alert.into_html()).into_response()
    }
}
