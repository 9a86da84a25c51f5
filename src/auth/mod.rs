//! Authentication: session cookies for the browser path and bearer tokens for
//! the server-verified mutation path.

mod cookie;
mod middleware;
mod password;
mod token;

pub(crate) use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie};
pub use middleware::{auth_guard, auth_guard_hx};
pub use password::{PasswordHash, ValidatedPassword};
pub use token::{TOKEN_DURATION, TokenKeys, issue_token, verify_token};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
