//! Alert fragments for displaying success and error messages to users.
//!
//! Alerts are rendered as out-of-band htmx swaps targeting the alert
//! container that the base page template places at the bottom of the screen.

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

const ALERT_SUCCESS_STYLE: &str = "flex items-start gap-3 p-4 mb-4 text-sm rounded-lg border \
    text-green-800 border-green-300 bg-green-50 dark:bg-gray-800 \
    dark:text-green-400 dark:border-green-800";

const ALERT_ERROR_STYLE: &str = "flex items-start gap-3 p-4 mb-4 text-sm rounded-lg border \
    text-red-800 border-red-300 bg-red-50 dark:bg-gray-800 \
    dark:text-red-400 dark:border-red-800";

/// A message to display to the user after an action succeeds or fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// An action succeeded, with extra details.
    Success {
        /// A short summary of what succeeded.
        message: String,
        /// Extra context, e.g., counts or timings.
        details: String,
    },
    /// An action succeeded.
    SuccessSimple {
        /// A short summary of what succeeded.
        message: String,
    },
    /// An action failed, with extra details.
    Error {
        /// A short summary of what failed.
        message: String,
        /// Extra context explaining the failure or how to fix it.
        details: String,
    },
    /// An action failed.
    ErrorSimple {
        /// A short summary of what failed.
        message: String,
    },
}

impl Alert {
    /// Render the alert as an out-of-band swap for the `#alert-container` div.
    pub fn into_html(self) -> Markup {
        let (style, message, details) = match self {
            Alert::Success { message, details } => (ALERT_SUCCESS_STYLE, message, details),
            Alert::SuccessSimple { message } => (ALERT_SUCCESS_STYLE, message, String::new()),
            Alert::Error { message, details } => (ALERT_ERROR_STYLE, message, details),
            Alert::ErrorSimple { message } => (ALERT_ERROR_STYLE, message, String::new()),
        };

        html! {
            div hx-swap-oob="innerHTML:#alert-container"
            {
                div class=(style) role="alert"
                {
                    div
                    {
                        p class="font-medium" { (message) }

                        @if !details.is_empty() {
                            p { (details) }
                        }
                    }

                    button
                        type="button"
                        class="ms-auto -mx-1.5 -my-1.5 rounded-lg p-1.5 hover:bg-gray-100 dark:hover:bg-gray-700"
                        onclick="this.closest('[role=alert]').remove()"
                        aria-label="Close"
                    {
                        "✕"
                    }
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

#[cfg(test)]
mod alert_tests {
    use super::Alert;

    #[test]
    fn success_alert_renders_message() {
        let markup = Alert::SuccessSimple {
            message: "Product deleted successfully".to_owned(),
        }
        .into_html();

        assert!(markup.0.contains("Product deleted successfully"));
        assert!(markup.0.contains("alert-container"));
    }

    #[test]
    fn error_alert_renders_details() {
        let markup = Alert::Error {
            message: "Could not delete category".to_owned(),
            details: "Delete its products first.".to_owned(),
        }
        .into_html();

        assert!(markup.0.contains("Could not delete category"));
        assert!(markup.0.contains("Delete its products first."));
    }
}
