//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/categories/{category_id}', use [format_endpoint].

/// The root route, which lists the user's categories.
pub const CATEGORIES_VIEW: &str = "/";
/// The page for creating a new category.
pub const NEW_CATEGORY_VIEW: &str = "/categories/new";
/// The page for editing an existing category.
pub const EDIT_CATEGORY_VIEW: &str = "/categories/{category_id}/edit";
/// The page showing the ranked products in a category.
pub const CATEGORY_VIEW: &str = "/categories/{category_id}";
/// The page for adding a product to a category.
pub const NEW_PRODUCT_VIEW: &str = "/categories/{category_id}/products/new";
/// The route for getting the registration page.
pub const REGISTER_VIEW: &str = "/register";
/// The route for getting the log in page.
pub const LOG_IN_VIEW: &str = "/log_in";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";
/// The route for uploaded product images.
pub const IMAGES: &str = "/images";

/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for signing in anonymously as a guest.
pub const GUEST_LOG_IN_API: &str = "/api/guest";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register a user.
pub const USERS: &str = "/api/users";
/// The route to create a category.
pub const POST_CATEGORY: &str = "/api/categories";
/// The route to update a category.
pub const PUT_CATEGORY: &str = "/api/categories/{category_id}";
/// The route to delete a category.
pub const DELETE_CATEGORY: &str = "/api/categories/{category_id}";
/// The route to add a product to a category.
pub const POST_PRODUCT: &str = "/api/categories/{category_id}/products";
/// The route to delete a product.
pub const DELETE_PRODUCT: &str = "/api/products/{product_id}";
/// The route to record a graded ranking for a product.
pub const POST_GRADE: &str = "/api/products/{product_id}/grades";
/// The route to record a pairwise comparison within a category.
pub const POST_COMPARISON: &str = "/api/categories/{category_id}/comparisons";
/// The route to upload a product image.
pub const POST_PRODUCT_IMAGE: &str = "/api/products/{product_id}/image";
/// The route to mint a bearer token for the logged-in user.
pub const POST_TOKEN: &str = "/api/tokens";
/// The route for the bearer-token verified product update.
pub const PUT_PRODUCT: &str = "/api/products/{product_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/categories/{category_id}',
/// '{category_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
