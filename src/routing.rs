//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{auth_guard, auth_guard_hx},
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_page,
        get_edit_category_page, get_new_category_page, update_category_endpoint,
    },
    endpoints,
    internal_server_error::get_internal_server_error_page,
    log_in::{get_log_in_page, post_guest_log_in, post_log_in},
    log_out::get_log_out,
    not_found::get_404_not_found,
    product::{
        create_product_endpoint, delete_product_endpoint, get_category_page, get_new_product_page,
        upload_product_image_endpoint,
    },
    ranking::{create_comparison_endpoint, create_grade_endpoint},
    register_user::{get_register_page, register_user},
    update_product::{create_token_endpoint, update_product_endpoint},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::GUEST_LOG_IN_API, post(post_guest_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::REGISTER_VIEW, get(get_register_page))
        .route(endpoints::USERS, post(register_user))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        )
        // Authorization for this route is a bearer token checked by the
        // handler itself, not the auth cookie.
        .route(endpoints::PUT_PRODUCT, put(update_product_endpoint));

    let protected_page_routes = Router::new()
        .route(endpoints::CATEGORIES_VIEW, get(get_categories_page))
        .route(endpoints::NEW_CATEGORY_VIEW, get(get_new_category_page))
        .route(endpoints::EDIT_CATEGORY_VIEW, get(get_edit_category_page))
        .route(endpoints::CATEGORY_VIEW, get(get_category_page))
        .route(endpoints::NEW_PRODUCT_VIEW, get(get_new_product_page))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // These POST/PUT/DELETE routes need to use the HX-Redirect header for auth
    // redirects to work properly for HTMX requests.
    let protected_api_routes = Router::new()
        .route(endpoints::POST_CATEGORY, post(create_category_endpoint))
        .route(endpoints::PUT_CATEGORY, put(update_category_endpoint))
        .route(endpoints::DELETE_CATEGORY, delete(delete_category_endpoint))
        .route(endpoints::POST_PRODUCT, post(create_product_endpoint))
        .route(endpoints::DELETE_PRODUCT, delete(delete_product_endpoint))
        .route(endpoints::POST_GRADE, post(create_grade_endpoint))
        .route(endpoints::POST_COMPARISON, post(create_comparison_endpoint))
        .route(
            endpoints::POST_PRODUCT_IMAGE,
            post(upload_product_image_endpoint),
        )
        .route(endpoints::POST_TOKEN, post(create_token_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx));

    let image_dir = state.image_store.root().to_owned();

    protected_page_routes
        .merge(protected_api_routes)
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .nest_service(endpoints::IMAGES, ServeDir::new(image_dir))
        .fallback(get_404_not_found)
        .with_state(state)
}
