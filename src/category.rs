//! This file defines the `Category` type, the pages and API routes for
//! managing categories, and the category store functions.
//!
//! A category groups the products a user wants to rank, e.g., 'Smartphones'
//! or 'Coffee Beans'. Every category belongs to exactly one user and every
//! query here is scoped to that user.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Form,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    alert::Alert,
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, CARD_STYLE, FORM_CONTAINER_STYLE,
        FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, base,
    },
    navigation::NavBar,
    user::UserID,
};

/// The name of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Create a category name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyCategoryName] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyCategoryName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a category name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for CategoryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CategoryName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryName::new(s)
    }
}

impl Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type CategoryId = i64;

/// A group of products that are ranked against each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,

    /// The name of the category.
    pub name: CategoryName,

    /// An optional free-text description of the category.
    pub description: Option<String>,

    /// The ID of the user who owns the category.
    pub user_id: UserID,
}

fn categories_view(categories: &[(Category, i64)]) -> Markup {
    let nav_bar = NavBar::new(endpoints::CATEGORIES_VIEW).into_html();

    let content = html! {
        (nav_bar)
        div class=(PAGE_CONTAINER_STYLE) {
            div class="flex items-center justify-between mb-4" {
                h1 class="text-2xl font-bold dark:text-white" { "Categories" }
                a href=(endpoints::NEW_CATEGORY_VIEW) class=(LINK_STYLE) { "New Category" }
            }

            @if categories.is_empty() {
                p class="text-gray-500 dark:text-gray-400" {
                    "No categories yet. Create one to start ranking products."
                }
            }

            ul class="space-y-4" {
                @for (category, product_count) in categories {
                    (category_card_view(category, *product_count))
                }
            }
        }
    };

    base("Categories", &[], &content)
}

fn category_card_view(category: &Category, product_count: i64) -> Markup {
    let category_endpoint = endpoints::format_endpoint(endpoints::CATEGORY_VIEW, category.id);
    let edit_endpoint = endpoints::format_endpoint(endpoints::EDIT_CATEGORY_VIEW, category.id);
    let delete_endpoint = endpoints::format_endpoint(endpoints::DELETE_CATEGORY, category.id);

    html! {
        li class=(CARD_STYLE) {
            div class="flex items-center justify-between" {
                a href=(category_endpoint) class=(LINK_STYLE) {
                    (category.name)
                }
                span class="text-sm text-gray-500 dark:text-gray-400" {
                    (product_count) " product" @if product_count != 1 { "s" }
                }
            }

            @if let Some(description) = &category.description {
                p class="mt-2 text-sm text-gray-600 dark:text-gray-300" { (description) }
            }

            div class="mt-4 flex gap-4" {
                a href=(edit_endpoint) class=(LINK_STYLE) { "Edit" }
                button
                    hx-delete=(delete_endpoint)
                    hx-target="closest li"
                    hx-swap="outerHTML"
                    hx-confirm="Delete this category?"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }
            }
        }
    }
}

fn category_form_fields(name: &str, description: &str) -> Markup {
    html! {
        div {
            label for="name" class=(FORM_LABEL_STYLE) { "Category Name" }

            input
                id="name"
                type="text"
                name="name"
                placeholder="Category Name"
                value=(name)
                required
                autofocus
                class=(FORM_TEXT_INPUT_STYLE);
        }

        div {
            label for="description" class=(FORM_LABEL_STYLE) { "Description (optional)" }

            input
                id="description"
                type="text"
                name="description"
                placeholder="What belongs in this category?"
                value=(description)
                class=(FORM_TEXT_INPUT_STYLE);
        }
    }
}

fn new_category_form_view(error_message: &str) -> Markup {
    html! {
        form
            hx-post=(endpoints::POST_CATEGORY)
            hx-target-error="#alert-container"
            class="w-full space-y-4 md:space-y-6"
        {
            (category_form_fields("", ""))

            @if !error_message.is_empty() {
                p class="text-red-600 dark:text-red-400" { (error_message) }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Create Category" }
        }
    }
}

fn new_category_view() -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_CATEGORY_VIEW).into_html();
    let form = new_category_form_view("");

    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE) { (form) }
    };

    base("Create Category", &[], &content)
}

fn edit_category_form_view(
    update_endpoint: &str,
    name: &str,
    description: &str,
    error_message: &str,
) -> Markup {
    html! {
        form
            hx-put=(update_endpoint)
            class="w-full space-y-4 md:space-y-6"
        {
            (category_form_fields(name, description))

            @if !error_message.is_empty() {
                p class="text-red-600 dark:text-red-400" { (error_message) }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Update Category" }
        }
    }
}

fn edit_category_view(
    edit_endpoint: &str,
    update_endpoint: &str,
    name: &str,
    description: &str,
    error_message: &str,
) -> Markup {
    let nav_bar = NavBar::new(edit_endpoint).into_html();
    let form = edit_category_form_view(update_endpoint, name, description, error_message);

    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE) { (form) }
    };

    base("Edit Category", &[], &content)
}

/// The state needed for the categories listing page.
#[derive(Debug, Clone)]
pub struct CategoriesPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoriesPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for creating a category.
#[derive(Debug, Clone)]
pub struct CreateCategoryEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateCategoryEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for the edit category page.
#[derive(Debug, Clone)]
pub struct EditCategoryPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for EditCategoryPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for updating a category.
#[derive(Debug, Clone)]
pub struct UpdateCategoryEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UpdateCategoryEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for deleting a category.
#[derive(Debug, Clone)]
pub struct DeleteCategoryEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteCategoryEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryFormData {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryFormData {
    fn description(&self) -> Option<&str> {
        let description = self.description.trim();

        if description.is_empty() {
            None
        } else {
            Some(description)
        }
    }
}

/// A route handler for the categories listing page.
pub async fn get_categories_page(
    Extension(user_id): Extension<UserID>,
    State(state): State<CategoriesPageState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let categories = match get_all_categories(user_id, &connection) {
        Ok(categories) => categories,
        Err(error) => {
            tracing::error!("Failed to retrieve categories: {error}");
            return error.into_response();
        }
    };

    let categories_with_counts: Result<Vec<(Category, i64)>, Error> = categories
        .into_iter()
        .map(|category| {
            count_products(category.id, user_id, &connection).map(|count| (category, count))
        })
        .collect();

    match categories_with_counts {
        Ok(categories) => categories_view(&categories).into_response(),
        Err(error) => {
            tracing::error!("Failed to count products: {error}");
            error.into_response()
        }
    }
}

/// A route handler for the new category page.
pub async fn get_new_category_page() -> Response {
    new_category_view().into_response()
}

/// A route handler for creating a new category.
pub async fn create_category_endpoint(
    Extension(user_id): Extension<UserID>,
    State(state): State<CreateCategoryEndpointState>,
    Form(new_category): Form<CategoryFormData>,
) -> Response {
    let name = match CategoryName::new(&new_category.name) {
        Ok(name) => name,
        Err(error) => {
            return new_category_form_view(&format!("Error: {error}")).into_response();
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_category(name, new_category.description(), user_id, &connection) {
        Ok(_) => (
            HxRedirect(endpoints::CATEGORIES_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a category: {error}");

            error.into_alert_response()
        }
    }
}

/// Route handler for the edit category page.
pub async fn get_edit_category_page(
    Path(category_id): Path<CategoryId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<EditCategoryPageState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let edit_endpoint = endpoints::format_endpoint(endpoints::EDIT_CATEGORY_VIEW, category_id);
    let update_endpoint = endpoints::format_endpoint(endpoints::PUT_CATEGORY, category_id);

    match get_category(category_id, user_id, &connection) {
        Ok(category) => Ok(edit_category_view(
            &edit_endpoint,
            &update_endpoint,
            category.name.as_ref(),
            category.description.as_deref().unwrap_or_default(),
            "",
        )
        .into_response()),
        Err(error) => {
            let error_message = match error {
                Error::NotFound => "Category not found",
                _ => {
                    tracing::error!("Failed to retrieve category {category_id}: {error}");
                    "Failed to load category"
                }
            };

            Ok(
                edit_category_view(&edit_endpoint, &update_endpoint, "", "", error_message)
                    .into_response(),
            )
        }
    }
}

/// A route handler for updating a category.
pub async fn update_category_endpoint(
    Path(category_id): Path<CategoryId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<UpdateCategoryEndpointState>,
    Form(form_data): Form<CategoryFormData>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let update_endpoint = endpoints::format_endpoint(endpoints::PUT_CATEGORY, category_id);

    let name = match CategoryName::new(&form_data.name) {
        Ok(name) => name,
        Err(error) => {
            return edit_category_form_view(
                &update_endpoint,
                &form_data.name,
                &form_data.description,
                &format!("Error: {error}"),
            )
            .into_response();
        }
    };

    match update_category(category_id, name, form_data.description(), user_id, &connection) {
        Ok(_) => (
            HxRedirect(endpoints::CATEGORIES_VIEW.to_owned()),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(Error::UpdateMissingCategory) => Error::UpdateMissingCategory.into_alert_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while updating category {category_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// A route handler for deleting a category.
///
/// Deletion is rejected while the category still contains products.
pub async fn delete_category_endpoint(
    Path(category_id): Path<CategoryId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<DeleteCategoryEndpointState>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_category(category_id, user_id, &connection) {
        Ok(_) => Alert::SuccessSimple {
            message: "Category deleted successfully".to_owned(),
        }
        .into_response(),
        Err(error @ (Error::CategoryNotEmpty | Error::DeleteMissingCategory)) => {
            error.into_alert_response()
        }
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting category {category_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// Create a category in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_category(
    name: CategoryName,
    description: Option<&str>,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection.execute(
        "INSERT INTO category (name, description, user_id) VALUES (?1, ?2, ?3);",
        (name.as_ref(), description, user_id.as_i64()),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Category {
        id,
        name,
        description: description.map(|description| description.to_string()),
        user_id,
    })
}

/// Retrieve the category with `category_id` owned by `user_id`.
///
/// # Errors
/// This function will return [Error::NotFound] if the category does not exist
/// or belongs to another user, or an error if there is an SQL error.
pub fn get_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, name, description, user_id FROM category
            WHERE id = :id AND user_id = :user_id;",
        )?
        .query_row(
            &[(":id", &category_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the categories owned by `user_id`, in creation order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_categories(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, description, user_id FROM category
            WHERE user_id = :user_id ORDER BY id ASC;",
        )?
        .query_map(&[(":user_id", &user_id.as_i64())], map_row)?
        .map(|maybe_category| maybe_category.map_err(|error| error.into()))
        .collect()
}

/// Count the products in the category with `category_id` owned by `user_id`.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn count_products(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<i64, Error> {
    connection
        .query_row(
            "SELECT COUNT(*) FROM product WHERE category_id = ?1 AND user_id = ?2;",
            (category_id, user_id.as_i64()),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Update a category's name and description in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error, or
/// [Error::UpdateMissingCategory] if the category does not exist or belongs
/// to another user.
pub fn update_category(
    category_id: CategoryId,
    new_name: CategoryName,
    new_description: Option<&str>,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE category SET name = ?1, description = ?2 WHERE id = ?3 AND user_id = ?4;",
        (new_name.as_ref(), new_description, category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingCategory);
    }

    Ok(())
}

/// Delete a category from the database.
///
/// # Errors
/// This function will return [Error::CategoryNotEmpty] if the category still
/// contains products, [Error::DeleteMissingCategory] if the category does not
/// exist or belongs to another user, or an error if there is an SQL error.
pub fn delete_category(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let product_count = count_products(category_id, user_id, connection)?;

    if product_count > 0 {
        return Err(Error::CategoryNotEmpty);
    }

    let rows_affected = connection.execute(
        "DELETE FROM category WHERE id = ?1 AND user_id = ?2;",
        (category_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingCategory);
    }

    Ok(())
}

pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            user_id INTEGER NOT NULL REFERENCES user(id)
        );

        CREATE INDEX IF NOT EXISTS idx_category_user_id ON category(user_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    let id = row.get(0)?;
    let raw_name: String = row.get(1)?;
    let name = CategoryName::new_unchecked(&raw_name);
    let description = row.get(2)?;
    let user_id = UserID::new(row.get(3)?);

    Ok(Category {
        id,
        name,
        description,
        user_id,
    })
}

#[cfg(test)]
mod category_name_tests {
    use crate::{Error, category::CategoryName};

    #[test]
    fn new_fails_on_empty_string() {
        let category_name = CategoryName::new("");

        assert_eq!(category_name, Err(Error::EmptyCategoryName));
    }

    #[test]
    fn new_fails_on_just_whitespace() {
        let category_name = CategoryName::new("\n\t \r");

        assert_eq!(category_name, Err(Error::EmptyCategoryName));
    }

    #[test]
    fn new_succeeds_on_non_empty_string() {
        let category_name = CategoryName::new("Coffee Beans");

        assert!(category_name.is_ok())
    }
}

#[cfg(test)]
mod category_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        category::{
            CategoryName, create_category, delete_category, get_all_categories, get_category,
            update_category,
        },
        db::initialize,
        product::{ProductName, create_product},
        user::{UserID, create_anonymous_user},
    };

    fn get_test_db_connection() -> (Connection, UserID) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        let user = create_anonymous_user(&connection).expect("Could not create test user");

        (connection, user.id)
    }

    #[test]
    fn create_category_succeeds() {
        let (connection, user_id) = get_test_db_connection();
        let name = CategoryName::new("Smartphones").unwrap();

        let category = create_category(name.clone(), Some("Flagship phones"), user_id, &connection);

        let category = category.expect("Could not create category");
        assert!(category.id > 0);
        assert_eq!(category.name, name);
        assert_eq!(category.description.as_deref(), Some("Flagship phones"));
        assert_eq!(category.user_id, user_id);
    }

    #[test]
    fn get_category_succeeds() {
        let (connection, user_id) = get_test_db_connection();
        let inserted_category = create_category(
            CategoryName::new_unchecked("Foo"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");

        let selected_category = get_category(inserted_category.id, user_id, &connection);

        assert_eq!(Ok(inserted_category), selected_category);
    }

    #[test]
    fn get_category_with_invalid_id_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();
        let inserted_category = create_category(
            CategoryName::new_unchecked("Foo"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");

        let selected_category = get_category(inserted_category.id + 123, user_id, &connection);

        assert_eq!(selected_category, Err(Error::NotFound));
    }

    #[test]
    fn get_category_owned_by_another_user_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();
        let other_user = create_anonymous_user(&connection).expect("Could not create test user");
        let other_users_category = create_category(
            CategoryName::new_unchecked("Theirs"),
            None,
            other_user.id,
            &connection,
        )
        .expect("Could not create test category");

        let selected_category = get_category(other_users_category.id, user_id, &connection);

        assert_eq!(selected_category, Err(Error::NotFound));
    }

    #[test]
    fn get_all_categories_only_returns_own_categories() {
        let (connection, user_id) = get_test_db_connection();
        let other_user = create_anonymous_user(&connection).expect("Could not create test user");
        let own_category = create_category(
            CategoryName::new_unchecked("Mine"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");
        create_category(
            CategoryName::new_unchecked("Theirs"),
            None,
            other_user.id,
            &connection,
        )
        .expect("Could not create test category");

        let selected_categories =
            get_all_categories(user_id, &connection).expect("Could not get categories");

        assert_eq!(selected_categories, vec![own_category]);
    }

    #[test]
    fn get_all_categories_returns_creation_order() {
        let (connection, user_id) = get_test_db_connection();
        let first = create_category(
            CategoryName::new_unchecked("First"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");
        let second = create_category(
            CategoryName::new_unchecked("Second"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");

        let selected_categories =
            get_all_categories(user_id, &connection).expect("Could not get categories");

        assert_eq!(selected_categories, vec![first, second]);
    }

    #[test]
    fn update_category_succeeds() {
        let (connection, user_id) = get_test_db_connection();
        let category = create_category(
            CategoryName::new_unchecked("Original"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");

        let new_name = CategoryName::new_unchecked("Updated");
        let result = update_category(
            category.id,
            new_name.clone(),
            Some("now with a description"),
            user_id,
            &connection,
        );

        assert!(result.is_ok());

        let updated_category =
            get_category(category.id, user_id, &connection).expect("Could not get category");
        assert_eq!(updated_category.name, new_name);
        assert_eq!(
            updated_category.description.as_deref(),
            Some("now with a description")
        );
    }

    #[test]
    fn update_category_with_invalid_id_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();

        let result = update_category(
            999999,
            CategoryName::new_unchecked("Updated"),
            None,
            user_id,
            &connection,
        );

        assert_eq!(result, Err(Error::UpdateMissingCategory));
    }

    #[test]
    fn update_category_owned_by_another_user_affects_nothing() {
        let (connection, user_id) = get_test_db_connection();
        let other_user = create_anonymous_user(&connection).expect("Could not create test user");
        let original_name = CategoryName::new_unchecked("Theirs");
        let other_users_category = create_category(
            original_name.clone(),
            None,
            other_user.id,
            &connection,
        )
        .expect("Could not create test category");

        let result = update_category(
            other_users_category.id,
            CategoryName::new_unchecked("Hijacked"),
            None,
            user_id,
            &connection,
        );

        assert_eq!(result, Err(Error::UpdateMissingCategory));
        let unchanged = get_category(other_users_category.id, other_user.id, &connection)
            .expect("Could not get category");
        assert_eq!(unchanged.name, original_name);
    }

    #[test]
    fn delete_category_succeeds() {
        let (connection, user_id) = get_test_db_connection();
        let category = create_category(
            CategoryName::new_unchecked("ToDelete"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");

        let result = delete_category(category.id, user_id, &connection);

        assert!(result.is_ok());
        assert_eq!(
            get_category(category.id, user_id, &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn delete_category_with_invalid_id_returns_not_found() {
        let (connection, user_id) = get_test_db_connection();

        let result = delete_category(999999, user_id, &connection);

        assert_eq!(result, Err(Error::DeleteMissingCategory));
    }

    #[test]
    fn delete_category_owned_by_another_user_affects_nothing() {
        let (connection, user_id) = get_test_db_connection();
        let other_user = create_anonymous_user(&connection).expect("Could not create test user");
        let other_users_category = create_category(
            CategoryName::new_unchecked("Theirs"),
            None,
            other_user.id,
            &connection,
        )
        .expect("Could not create test category");

        let result = delete_category(other_users_category.id, user_id, &connection);

        assert_eq!(result, Err(Error::DeleteMissingCategory));
        assert!(get_category(other_users_category.id, other_user.id, &connection).is_ok());
    }

    #[test]
    fn delete_category_with_products_is_rejected() {
        let (connection, user_id) = get_test_db_connection();
        let category = create_category(
            CategoryName::new_unchecked("Smartphones"),
            None,
            user_id,
            &connection,
        )
        .expect("Could not create test category");
        create_product(
            ProductName::new_unchecked("Pixelphone"),
            None,
            category.id,
            user_id,
            &connection,
        )
        .expect("Could not create test product");

        let result = delete_category(category.id, user_id, &connection);

        assert_eq!(result, Err(Error::CategoryNotEmpty));
        assert!(get_category(category.id, user_id, &connection).is_ok());
    }
}


#[cfg(test)]
mod category_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        extract::{Path, State},
        http::{StatusCode, header::CONTENT_TYPE},
        response::{IntoResponse, Response},
    };
    use rusqlite::Connection;
    use scraper::{ElementRef, Html};

    use crate::{
        category::{
            CategoriesPageState, Category, CategoryFormData, CategoryName, create_category,
            create_category_endpoint, delete_category_endpoint, get_categories_page, get_category,
        },
        db::initialize,
        endpoints,
        product::{ProductName, create_product},
        user::{UserID, create_anonymous_user},
    };

    use super::{CreateCategoryEndpointState, DeleteCategoryEndpointState};

    fn get_test_db_connection() -> (Arc<Mutex<Connection>>, UserID) {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");
        let user = create_anonymous_user(&connection).expect("Could not create test user");

        (Arc::new(Mutex::new(connection)), user.id)
    }

    #[tokio::test]
    async fn can_create_category() {
        let (db_connection, user_id) = get_test_db_connection();
        let state = CreateCategoryEndpointState {
            db_connection: db_connection.clone(),
        };
        let name = CategoryName::new_unchecked("Laptops");
        let want = Category {
            id: 1,
            name: name.clone(),
            description: None,
            user_id,
        };
        let form = CategoryFormData {
            name: name.to_string(),
            description: "".to_string(),
        };

        let response = create_category_endpoint(Extension(user_id), State(state), Form(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::CATEGORIES_VIEW);
        assert_eq!(
            Ok(want),
            get_category(1, user_id, &db_connection.lock().unwrap())
        );
    }

    #[tokio::test]
    async fn create_category_fails_on_empty_name() {
        let (db_connection, user_id) = get_test_db_connection();
        let state = CreateCategoryEndpointState { db_connection };
        let form = CategoryFormData {
            name: "".to_string(),
            description: "".to_string(),
        };

        let response = create_category_endpoint(Extension(user_id), State(state), Form(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            get_header(&response, CONTENT_TYPE.as_str()),
            "text/html; charset=utf-8"
        );
        let html = parse_fragment_html(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_error_message(&form, "Error: Category name cannot be empty");
    }

    #[tokio::test]
    async fn categories_page_lists_own_categories_with_counts() {
        let (db_connection, user_id) = get_test_db_connection();
        {
            let connection = db_connection.lock().unwrap();
            let category = create_category(
                CategoryName::new_unchecked("Smartphones"),
                None,
                user_id,
                &connection,
            )
            .expect("Could not create test category");
            create_product(
                ProductName::new_unchecked("Pixelphone"),
                None,
                category.id,
                user_id,
                &connection,
            )
            .expect("Could not create test product");
        }
        let state = CategoriesPageState { db_connection };

        let response = get_categories_page(Extension(user_id), State(state))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html(response).await;
        assert_valid_html(&html);

        let list_item = html
            .select(&scraper::Selector::parse("li").unwrap())
            .next()
            .expect("No category card found");
        let text = list_item.text().collect::<Vec<_>>().join("");
        assert!(text.contains("Smartphones"), "got {text}");
        assert!(text.contains("1 product"), "got {text}");
    }

    #[tokio::test]
    async fn delete_category_endpoint_succeeds() {
        let (db_connection, user_id) = get_test_db_connection();
        let category_id = {
            let connection = db_connection.lock().unwrap();
            create_category(
                CategoryName::new_unchecked("ToDelete"),
                None,
                user_id,
                &connection,
            )
            .expect("Could not create test category")
            .id
        };
        let state = DeleteCategoryEndpointState { db_connection };

        let response = delete_category_endpoint(Path(category_id), Extension(user_id), State(state))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn delete_category_endpoint_rejects_category_with_products() {
        let (db_connection, user_id) = get_test_db_connection();
        let category_id = {
            let connection = db_connection.lock().unwrap();
            let category = create_category(
                CategoryName::new_unchecked("Smartphones"),
                None,
                user_id,
                &connection,
            )
            .expect("Could not create test category");
            create_product(
                ProductName::new_unchecked("Pixelphone"),
                None,
                category.id,
                user_id,
                &connection,
            )
            .expect("Could not create test product");

            category.id
        };
        let state = DeleteCategoryEndpointState {
            db_connection: db_connection.clone(),
        };

        let response = delete_category_endpoint(Path(category_id), Extension(user_id), State(state))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(
            get_category(category_id, user_id, &db_connection.lock().unwrap()).is_ok(),
            "category should still exist after rejected delete"
        );
    }

    async fn parse_html(response: Response) -> Html {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();

        Html::parse_document(&text)
    }

    async fn parse_fragment_html(response: Response) -> Html {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();

        Html::parse_fragment(&text)
    }

    #[track_caller]
    fn assert_valid_html(html: &Html) {
        assert!(
            html.errors.is_empty(),
            "Got HTML parsing errors {:?} for HTML {}",
            html.errors,
            html.html()
        );
    }

    #[track_caller]
    fn must_get_form(html: &Html) -> ElementRef<'_> {
        html.select(&scraper::Selector::parse("form").unwrap())
            .next()
            .expect("No form found")
    }

    #[track_caller]
    fn assert_error_message(form: &ElementRef, want_error_message: &str) {
        let p = scraper::Selector::parse("p").unwrap();
        let error_message = form
            .select(&p)
            .next()
            .expect("No error message found")
            .text()
            .collect::<Vec<_>>()
            .join("");
        let got_error_message = error_message.trim();

        assert_eq!(want_error_message, got_error_message);
    }

    #[track_caller]
    fn assert_hx_redirect(response: &Response, endpoint: &str) {
        assert_eq!(get_header(response, "hx-redirect"), endpoint);
    }

    #[track_caller]
    fn get_header(response: &Response, header_name: &str) -> String {
        let header_error_message = format!("Headers missing {header_name}");

        response
            .headers()
            .get(header_name)
            .expect(&header_error_message)
            .to_str()
            .expect("Could not convert to str")
            .to_string()
    }
}
