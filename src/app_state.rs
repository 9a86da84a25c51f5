//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error, ImageStore,
    auth::{DEFAULT_COOKIE_DURATION, TokenKeys},
    db::initialize,
};

/// The state of the REST server.
///
/// The database handle, cookie key, token keys, and image store are all
/// constructed up front and passed in, so that handlers and tests can be
/// wired up with fakes instead of reaching for process-wide globals.
#[derive(Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The keys for signing and verifying bearer tokens.
    pub token_keys: TokenKeys,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// Where uploaded product images are stored and served from.
    pub image_store: ImageStore,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        image_store: ImageStore,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            token_keys: TokenKeys::from_secret(cookie_secret),
            db_connection: connection,
            image_store,
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret` string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
