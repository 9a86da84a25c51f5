//! Defines the view and route handler for the 404 not found page.
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::html::error_view;

/// Display the 404 not found page.
pub async fn get_404_not_found() -> Response {
    get_404_not_found_response()
}

pub(crate) fn get_404_not_found_response() -> Response {
    let content = error_view(
        "Not Found",
        "404",
        "Sorry, we could not find that page.",
        "Check the address for typos or head back to your categories",
    );

    (StatusCode::NOT_FOUND, Html(content.into_string())).into_response()
}

#[cfg(test)]
mod not_found_tests {
    use axum::http::StatusCode;

    use crate::not_found::get_404_not_found;

    #[tokio::test]
    async fn returns_404_page() {
        let response = get_404_not_found().await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8_lossy(&body);

        assert!(text.contains("404"));
    }
}
