//! Code for creating the user table and fetching users from the database.
//!
//! A user either registered with an email address and password, or signed in
//! as an anonymous guest. Anonymous users own their data like any other user
//! but cannot log back in once their session cookie expires.

use std::{fmt::Display, str::FromStr};

use email_address::EmailAddress;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A validated email address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Email(String);

impl Email {
    /// Create an email address, validating the string.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidEmail] if `address` is not a valid email address.
    pub fn new(address: &str) -> Result<Self, Error> {
        let address = address.trim();

        if EmailAddress::is_valid(address) {
            Ok(Self(address.to_string()))
        } else {
            Err(Error::InvalidEmail(address.to_string()))
        }
    }

    /// Create an email address without validation.
    ///
    /// The caller should ensure that the string is a valid email address.
    pub fn new_unchecked(address: &str) -> Self {
        Self(address.to_string())
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Email {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Email::new(s)
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's email address, absent for anonymous users.
    pub email: Option<Email>,
    /// The user's password hash, absent for anonymous users.
    pub password_hash: Option<PasswordHash>,
}

impl User {
    /// Whether this user signed in as an anonymous guest.
    pub fn is_anonymous(&self) -> bool {
        self.email.is_none()
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                email TEXT UNIQUE,
                password TEXT
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new registered user into the database.
///
/// # Errors
///
/// Returns a [Error::DuplicateEmail] if the email is already registered, or a
/// [Error::SqlError] if another SQL related error occurred.
pub fn create_user(
    email: Email,
    password_hash: PasswordHash,
    connection: &Connection,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (email, password) VALUES (?1, ?2)",
        (email.as_ref(), password_hash.to_string()),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        email: Some(email),
        password_hash: Some(password_hash),
    })
}

/// Create and insert an anonymous guest user into the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn create_anonymous_user(connection: &Connection) -> Result<User, Error> {
    connection.execute("INSERT INTO user (email, password) VALUES (NULL, NULL)", ())?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        email: None,
        password_hash: None,
    })
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, password FROM user WHERE id = :id")?
        .query_row(&[(":id", &user_id.as_i64())], map_row)
        .map_err(|error| error.into())
}

/// Get the user from the database with an email equal to `email`.
///
/// # Errors
///
/// This function will return an error if:
/// - `email` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, email, password FROM user WHERE email = :email")?
        .query_row(&[(":email", &email)], map_row)
        .map_err(|error| error.into())
}

fn map_row(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let id = UserID::new(row.get(0)?);
    let raw_email: Option<String> = row.get(1)?;
    let raw_password: Option<String> = row.get(2)?;

    Ok(User {
        id,
        email: raw_email.map(|email| Email::new_unchecked(&email)),
        password_hash: raw_password.map(|hash| PasswordHash::new_unchecked(&hash)),
    })
}
