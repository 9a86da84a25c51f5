//! This file defines the routes for displaying the log-in page and handling
//! log-in requests, including anonymous guest sign-in.
//! The auth module handles the lower level authentication and cookie auth logic.

use std::sync::{Arc, Mutex};

use axum::{
    Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::{
    AppState, Error,
    app_state::create_cookie_key,
    auth::{DEFAULT_COOKIE_DURATION, set_auth_cookie},
    endpoints,
    html::{BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, LINK_STYLE, email_input, log_in_register, password_input},
    user::{User, create_anonymous_user, get_user_by_email},
};

pub const INVALID_CREDENTIALS_ERROR_MSG: &str = "Incorrect email or password.";

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

fn log_in_form_view(email: &str, error_message: Option<&str>) -> Markup {
    html! {
        form
            hx-post=(endpoints::LOG_IN_API)
            class="space-y-4 md:space-y-6"
        {
            (email_input(email, None))
            (password_input("", 0, error_message))

            div class="flex items-center gap-2" {
                input id="remember_me" type="checkbox" name="remember_me";
                label for="remember_me" class="text-sm text-gray-900 dark:text-white" {
                    "Remember me"
                }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Sign in" }

            button
                type="button"
                hx-post=(endpoints::GUEST_LOG_IN_API)
                class=(BUTTON_SECONDARY_STYLE)
            {
                "Continue as guest"
            }

            p class="text-sm font-light text-gray-500 dark:text-gray-400" {
                "Don't have an account yet? "
                a href=(endpoints::REGISTER_VIEW) class=(LINK_STYLE) { "Register" }
            }
        }
    }
}

/// Display the log-in page.
pub async fn get_log_in_page() -> Response {
    log_in_register("Sign in", &log_in_form_view("", None)).into_response()
}

/// The state needed to perform a log-in.
#[derive(Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl LogInState {
    /// Create the cookie key from a string and set the default cookie duration.
    pub fn new(cookie_secret: &str, db_connection: Arc<Mutex<Connection>>) -> Self {
        Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            db_connection,
        }
    }
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the log-in form.
///
/// The email and password are stored as plain strings. There is no need for validation here since
/// they will be compared against the email and password in the database, which have been verified.
#[derive(Clone, Serialize, Deserialize)]
pub struct LogInData {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
    /// Whether to extend the initial auth cookie duration.
    ///
    /// This value comes from a checkbox, so it either has a string value or is not set
    /// (see the [MDN docs](https://developer.mozilla.org/en-US/docs/Web/HTML/Element/input/checkbox#value_2)).
    /// The `Some` variant should be interpreted as `true` irregardless of the
    /// string value, and the `None` variant should be interpreted as `false`.
    pub remember_me: Option<String>,
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in request, the auth cookie is set and the client is
/// redirected to the categories page. Otherwise, the form is returned with an
/// error message explaining the problem.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Form(user_data): Form<LogInData>,
) -> Response {
    let email = &user_data.email;

    let user: User = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return log_in_error_response(
                    email,
                    "An internal error occurred. Please try again later.",
                );
            }
        };

        match get_user_by_email(email, &connection) {
            Ok(user) => user,
            Err(Error::NotFound) => {
                return log_in_error_response(email, INVALID_CREDENTIALS_ERROR_MSG);
            }
            Err(error) => {
                tracing::error!("Unhandled error while verifying credentials: {error}");
                return log_in_error_response(
                    email,
                    "An internal error occurred. Please try again later.",
                );
            }
        }
    };

    // Anonymous guest users have no password and cannot log in by email.
    let Some(password_hash) = &user.password_hash else {
        return log_in_error_response(email, INVALID_CREDENTIALS_ERROR_MSG);
    };

    let is_password_valid = match password_hash.verify(&user_data.password) {
        Ok(is_password_valid) => is_password_valid,
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return log_in_error_response(
                email,
                "An internal error occurred. Please try again later.",
            );
        }
    };

    if !is_password_valid {
        return log_in_error_response(email, INVALID_CREDENTIALS_ERROR_MSG);
    }

    let cookie_duration = if user_data.remember_me.is_some() {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let updated_jar = set_auth_cookie(jar, user.id, cookie_duration);

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::CATEGORIES_VIEW.to_owned()),
        updated_jar,
    )
        .into_response()
}

/// Handler for anonymous guest sign-in.
///
/// Creates a fresh anonymous user, so a guest gets an empty set of categories
/// that no one else can see.
pub async fn post_guest_log_in(State(state): State<LogInState>, jar: PrivateCookieJar) -> Response {
    let user = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        match create_anonymous_user(&connection) {
            Ok(user) => user,
            Err(error) => {
                tracing::error!("Failed to create a guest user: {error}");
                return error.into_response();
            }
        }
    };

    let updated_jar = set_auth_cookie(jar, user.id, state.cookie_duration);

    (
        StatusCode::SEE_OTHER,
        HxRedirect(endpoints::CATEGORIES_VIEW.to_owned()),
        updated_jar,
    )
        .into_response()
}

fn log_in_error_response(email: &str, error_message: &str) -> Response {
    log_in_form_view(email, Some(error_message)).into_response()
}

#[cfg(test)]
mod log_in_page_tests {
    use axum::http::{StatusCode, header::CONTENT_TYPE};
    use scraper::Html;

    use crate::endpoints;

    use super::get_log_in_page;

    #[tokio::test]
    async fn log_in_page_displays_form() {
        let response = get_log_in_page().await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );

        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();
        let document = Html::parse_document(&text);
        assert!(
            document.errors.is_empty(),
            "Got HTML parsing errors: {:?}",
            document.errors
        );

        let form_selector = scraper::Selector::parse("form").unwrap();
        let forms = document.select(&form_selector).collect::<Vec<_>>();
        assert_eq!(forms.len(), 1, "want 1 form, got {}", forms.len());
        let form = forms.first().unwrap();
        assert_eq!(form.value().attr("hx-post"), Some(endpoints::LOG_IN_API));

        for selector_string in ["input[type=email]", "input[type=password]", "button[type=submit]"]
        {
            let selector = scraper::Selector::parse(selector_string).unwrap();
            let elements = form.select(&selector).collect::<Vec<_>>();
            assert_eq!(
                elements.len(),
                1,
                "want 1 element matching {selector_string}, got {}",
                elements.len()
            );
        }

        let guest_selector = scraper::Selector::parse("button[hx-post]").unwrap();
        let guest_button = form
            .select(&guest_selector)
            .find(|button| button.value().attr("hx-post") == Some(endpoints::GUEST_LOG_IN_API));
        assert!(guest_button.is_some(), "want a guest sign-in button");
    }
}

#[cfg(test)]
mod log_in_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Form, Router,
        body::Body,
        extract::State,
        http::{Response, StatusCode, header::SET_COOKIE},
        routing::post,
    };
    use axum_extra::extract::{PrivateCookieJar, cookie::Cookie};
    use axum_htmx::HX_REDIRECT;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use time::OffsetDateTime;

    use crate::{
        auth::{COOKIE_TOKEN, PasswordHash, ValidatedPassword},
        db::initialize,
        endpoints,
        user::{create_user, get_user_by_id},
    };

    use super::{
        INVALID_CREDENTIALS_ERROR_MSG, LogInData, LogInState, post_guest_log_in, post_log_in,
    };

    const TEST_EMAIL: &str = "test@test.com";
    const TEST_PASSWORD: &str = "test";

    fn get_test_app_config(create_test_user: bool) -> LogInState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        if create_test_user {
            let password_hash = PasswordHash::new(
                ValidatedPassword::new_unchecked(TEST_PASSWORD),
                PasswordHash::DEFAULT_COST,
            )
            .expect("Could not hash test password");

            create_user(
                TEST_EMAIL.parse().expect("Could not parse test email"),
                password_hash,
                &connection,
            )
            .expect("Could not create test user");
        }

        LogInState::new("foobar", Arc::new(Mutex::new(connection)))
    }

    async fn new_log_in_request(state: LogInState, log_in_form: LogInData) -> Response<Body> {
        let jar = PrivateCookieJar::new(state.cookie_key.clone());

        post_log_in(State(state), jar, Form(log_in_form)).await
    }

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let state = get_test_app_config(true);

        let response = new_log_in_request(
            state,
            LogInData {
                email: TEST_EMAIL.to_string(),
                password: TEST_PASSWORD.to_string(),
                remember_me: None,
            },
        )
        .await;

        assert_hx_redirect(&response, endpoints::CATEGORIES_VIEW);
        assert_set_cookie(&response);
    }

    #[tokio::test]
    async fn log_in_fails_with_incorrect_email() {
        let state = get_test_app_config(false);

        let response = new_log_in_request(
            state,
            LogInData {
                email: "wrong@email.com".to_string(),
                password: TEST_PASSWORD.to_string(),
                remember_me: None,
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_body_contains_message(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn log_in_fails_with_incorrect_password() {
        let state = get_test_app_config(true);

        let response = new_log_in_request(
            state,
            LogInData {
                email: TEST_EMAIL.to_string(),
                password: "wrongpassword".to_string(),
                remember_me: None,
            },
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_body_contains_message(response, INVALID_CREDENTIALS_ERROR_MSG).await;
    }

    #[tokio::test]
    async fn log_in_fails_with_missing_credentials() {
        let state = get_test_app_config(false);
        let app = Router::new()
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .with_state(state);

        let server = TestServer::new(app).expect("Could not create test server.");

        server
            .post(endpoints::LOG_IN_API)
            .content_type("application/x-www-form-urlencoded")
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn form_deserialises_without_remember_me() {
        let state = get_test_app_config(false);
        let app = Router::new()
            .route(endpoints::LOG_IN_API, post(post_log_in))
            .with_state(state);
        let server = TestServer::new(app).expect("Could not create test server.");
        let form = [("email", TEST_EMAIL), ("password", TEST_PASSWORD)];

        let response = server.post(endpoints::LOG_IN_API).form(&form).await;

        assert_ne!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn guest_log_in_creates_anonymous_user_and_sets_cookie() {
        let state = get_test_app_config(false);
        let jar = PrivateCookieJar::new(state.cookie_key.clone());
        let db_connection = state.db_connection.clone();

        let response = post_guest_log_in(State(state), jar).await;

        assert_hx_redirect(&response, endpoints::CATEGORIES_VIEW);
        assert_set_cookie(&response);

        let user = get_user_by_id(
            crate::user::UserID::new(1),
            &db_connection.lock().unwrap(),
        )
        .expect("Could not get guest user");
        assert!(user.is_anonymous());
    }

    #[track_caller]
    fn assert_hx_redirect(response: &Response<Body>, want_location: &str) {
        let redirect_location = response.headers().get(HX_REDIRECT).unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(redirect_location, want_location);
    }

    #[track_caller]
    fn assert_set_cookie(response: &Response<Body>) {
        let cookie_header = response
            .headers()
            .get(SET_COOKIE)
            .expect("Headers missing set-cookie")
            .to_str()
            .expect("Could not convert to str");
        let cookie = Cookie::parse(cookie_header).expect("Could not parse cookie");

        assert_eq!(cookie.name(), COOKIE_TOKEN);
        assert!(cookie.expires_datetime() > Some(OffsetDateTime::now_utc()));
    }

    async fn assert_body_contains_message(response: Response<Body>, message: &str) {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();

        let text = String::from_utf8_lossy(&body).to_string();

        assert!(
            text.contains(message),
            "response body should contain the text '{}' but got {}",
            message,
            text
        );
    }
}
