//! Defines functions for handling user authentication with cookies.
//!
//! The session cookie stores the user ID and an expiry timestamp inside a
//! private (signed and encrypted) cookie jar, so the client can neither read
//! nor forge it.

use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use time::{Duration, OffsetDateTime};

use crate::{Error, user::UserID};

pub(crate) const COOKIE_TOKEN: &str = "session";

/// The default duration for which auth cookies are valid.
pub(crate) const DEFAULT_COOKIE_DURATION: Duration = Duration::minutes(30);

/// Add an auth cookie to the cookie jar, indicating that a user is logged in and authenticated.
///
/// Sets the expiry of the cookie to `duration` from the current time.
/// You can use [DEFAULT_COOKIE_DURATION] for the default duration.
///
/// Returns the cookie jar with the cookie added.
pub(crate) fn set_auth_cookie(
    jar: PrivateCookieJar,
    user_id: UserID,
    duration: Duration,
) -> PrivateCookieJar {
    let expiry = OffsetDateTime::now_utc() + duration;
    let value = format!("{}:{}", user_id.as_i64(), expiry.unix_timestamp());

    jar.add(
        Cookie::build((COOKIE_TOKEN, value))
            .expires(expiry)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Set the auth cookie to an invalid value and set its max age to zero, which should delete the cookie on the client side.
pub(crate) fn invalidate_auth_cookie(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.add(
        Cookie::build((COOKIE_TOKEN, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true),
    )
}

/// Extract the authenticated user ID from the cookie jar.
///
/// # Errors
///
/// Returns:
/// - [Error::CookieMissing] if there is no auth cookie in the jar.
/// - [Error::CookieInvalid] if the cookie could not be parsed or has expired.
pub(crate) fn get_user_id_from_cookies(jar: &PrivateCookieJar) -> Result<UserID, Error> {
    let cookie = jar.get(COOKIE_TOKEN).ok_or(Error::CookieMissing)?;

    let (raw_user_id, raw_expiry) = cookie
        .value()
        .split_once(':')
        .ok_or(Error::CookieInvalid)?;

    let user_id: i64 = raw_user_id.parse().map_err(|_| Error::CookieInvalid)?;
    let expiry: i64 = raw_expiry.parse().map_err(|_| Error::CookieInvalid)?;

    if expiry <= OffsetDateTime::now_utc().unix_timestamp() {
        return Err(Error::CookieInvalid);
    }

    Ok(UserID::new(user_id))
}
