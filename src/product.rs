//! This file defines the `Product` type, the category detail page that shows
//! the ranked product list, the API routes for products, and the product
//! store functions.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
};

use axum::{
    Extension, Form,
    extract::{FromRef, Multipart, Path, State},
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
    category::{Category, CategoryId, get_category},
    endpoints,
    html::{
        BUTTON_DELETE_STYLE, BUTTON_PRIMARY_STYLE, BUTTON_SECONDARY_STYLE, CARD_STYLE,
        FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_SELECT_STYLE, FORM_TEXT_INPUT_STYLE,
        LINK_STYLE, PAGE_CONTAINER_STYLE, SCORE_BADGE_STYLE, back_to_categories_link, base,
    },
    image_store::ImageStore,
    navigation::NavBar,
    ranking::{get_comparative_ranks, get_graded_ranks},
    score::{REFERENCE_SCALE_MAX, RankedProduct, compute_ranked_list},
    user::UserID,
};

/// The name of a product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct ProductName(String);

impl ProductName {
    /// Create a product name.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyProductName] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyProductName)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a product name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the non-empty invariant is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for ProductName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ProductName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductName::new(s)
    }
}

impl Display for ProductName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type ProductId = i64;

/// A product that can be graded and compared within its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Product {
    /// The ID of the product.
    pub id: ProductId,

    /// The ID of the category the product belongs to.
    pub category_id: CategoryId,

    /// The name of the product.
    pub name: ProductName,

    /// An optional free-text description of the product.
    pub description: Option<String>,

    /// The URL the product's image is served from, if one has been uploaded.
    pub image_url: Option<String>,

    /// Optional alt text for the product's image.
    pub image_hint: Option<String>,

    /// The ID of the user who owns the product.
    pub user_id: UserID,
}

fn category_page_view(category: &Category, ranked_products: &[RankedProduct]) -> Markup {
    let category_endpoint = endpoints::format_endpoint(endpoints::CATEGORY_VIEW, category.id);
    let new_product_endpoint =
        endpoints::format_endpoint(endpoints::NEW_PRODUCT_VIEW, category.id);
    let nav_bar = NavBar::new(&category_endpoint).into_html();

    let content = html! {
        (nav_bar)
        div class=(PAGE_CONTAINER_STYLE) {
            (back_to_categories_link())

            div class="flex items-center justify-between mb-4" {
                h1 class="text-2xl font-bold dark:text-white" { (category.name) }
                a href=(new_product_endpoint) class=(LINK_STYLE) { "Add Product" }
            }

            @if let Some(description) = &category.description {
                p class="mb-4 text-gray-600 dark:text-gray-300" { (description) }
            }

            (comparison_form_view(category.id, ranked_products))

            @if ranked_products.is_empty() {
                p class="text-gray-500 dark:text-gray-400" {
                    "No products yet. Add one to start ranking."
                }
            }

            ol class="space-y-4" {
                @for (position, ranked_product) in ranked_products.iter().enumerate() {
                    (product_card_view(position + 1, ranked_product))
                }
            }
        }
    };

    base(category.name.as_ref(), &[], &content)
}

fn comparison_form_view(category_id: CategoryId, ranked_products: &[RankedProduct]) -> Markup {
    // A comparison needs two products to choose from.
    if ranked_products.len() < 2 {
        return html! {};
    }

    let comparison_endpoint = endpoints::format_endpoint(endpoints::POST_COMPARISON, category_id);

    html! {
        form
            hx-post=(comparison_endpoint)
            hx-target-error="#alert-container"
            class="mb-6 flex items-end gap-4"
        {
            div class="grow" {
                label for="winner_product_id" class=(FORM_LABEL_STYLE) { "Winner" }
                select id="winner_product_id" name="winner_product_id" class=(FORM_SELECT_STYLE) {
                    @for ranked_product in ranked_products {
                        option value=(ranked_product.product.id) {
                            (ranked_product.product.name)
                        }
                    }
                }
            }

            div class="grow" {
                label for="loser_product_id" class=(FORM_LABEL_STYLE) { "Loser" }
                select id="loser_product_id" name="loser_product_id" class=(FORM_SELECT_STYLE) {
                    @for ranked_product in ranked_products {
                        option value=(ranked_product.product.id) {
                            (ranked_product.product.name)
                        }
                    }
                }
            }

            button type="submit" class=(BUTTON_SECONDARY_STYLE) { "Record Comparison" }
        }
    }
}

fn product_card_view(position: usize, ranked_product: &RankedProduct) -> Markup {
    let product = &ranked_product.product;
    let grade_endpoint = endpoints::format_endpoint(endpoints::POST_GRADE, product.id);
    let delete_endpoint = endpoints::format_endpoint(endpoints::DELETE_PRODUCT, product.id);
    let image_endpoint = endpoints::format_endpoint(endpoints::POST_PRODUCT_IMAGE, product.id);

    html! {
        li class=(CARD_STYLE) {
            div class="flex items-start gap-4" {
                span class="text-2xl font-bold text-gray-400 dark:text-gray-500" {
                    "#" (position)
                }

                @if let Some(image_url) = &product.image_url {
                    img
                        src=(image_url)
                        alt=(product.image_hint.as_deref().unwrap_or(product.name.as_ref()))
                        class="w-16 h-16 rounded object-cover";
                }

                div class="grow" {
                    h2 class="text-lg font-semibold dark:text-white" { (product.name) }

                    @if let Some(description) = &product.description {
                        p class="text-sm text-gray-600 dark:text-gray-300" { (description) }
                    }

                    p class="mt-1 text-sm text-gray-500 dark:text-gray-400" {
                        "Average grade: " (ranked_product.average_grade_display())
                        " · Wins: " (ranked_product.wins)
                        " · Losses: " (ranked_product.losses)
                    }
                }

                span class=(SCORE_BADGE_STYLE) { (ranked_product.score) }
            }

            div class="mt-4 flex flex-wrap items-center gap-2" {
                span class="text-sm text-gray-500 dark:text-gray-400" { "Grade:" }
                @for rank in 1..=REFERENCE_SCALE_MAX {
                    button
                        hx-post=(grade_endpoint)
                        hx-vals=(format!("{{\"rank\": {rank}}}"))
                        hx-target-error="#alert-container"
                        class=(LINK_STYLE)
                    {
                        (rank)
                    }
                }
            }

            div class="mt-4 flex items-center justify-between" {
                form
                    hx-post=(image_endpoint)
                    hx-encoding="multipart/form-data"
                    hx-target-error="#alert-container"
                    class="flex items-center gap-2"
                {
                    input type="file" name="image" accept="image/*" required class="text-sm";
                    button type="submit" class=(LINK_STYLE) { "Upload Image" }
                }

                button
                    hx-delete=(delete_endpoint)
                    hx-target="closest li"
                    hx-swap="outerHTML"
                    hx-confirm="Delete this product and all of its rankings?"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }
            }
        }
    }
}

fn new_product_form_view(category_id: CategoryId, error_message: &str) -> Markup {
    let create_product_endpoint =
        endpoints::format_endpoint(endpoints::POST_PRODUCT, category_id);

    html! {
        form
            hx-post=(create_product_endpoint)
            hx-target-error="#alert-container"
            class="w-full space-y-4 md:space-y-6"
        {
            div {
                label for="name" class=(FORM_LABEL_STYLE) { "Product Name" }

                input
                    id="name"
                    type="text"
                    name="name"
                    placeholder="Product Name"
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
                    placeholder="What makes this product notable?"
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            @if !error_message.is_empty() {
                p class="text-red-600 dark:text-red-400" { (error_message) }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Add Product" }
        }
    }
}

fn new_product_view(category_id: CategoryId, error_message: &str) -> Markup {
    let new_product_endpoint =
        endpoints::format_endpoint(endpoints::NEW_PRODUCT_VIEW, category_id);
    let nav_bar = NavBar::new(&new_product_endpoint).into_html();
    let form = new_product_form_view(category_id, error_message);

    let content = html! {
        (nav_bar)
        div class=(FORM_CONTAINER_STYLE) { (form) }
    };

    base("Add Product", &[], &content)
}

/// The state needed for the category detail page.
#[derive(Debug, Clone)]
pub struct CategoryPageState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProductEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateProductEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for deleting a product.
#[derive(Debug, Clone)]
pub struct DeleteProductEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DeleteProductEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for uploading a product image.
#[derive(Debug, Clone)]
pub struct UploadProductImageState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub image_store: ImageStore,
}

impl FromRef<AppState> for UploadProductImageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            image_store: state.image_store.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductFormData {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ProductFormData {
    fn description(&self) -> Option<&str> {
        let description = self.description.trim();

        if description.is_empty() {
            None
        } else {
            Some(description)
        }
    }
}

/// A route handler for the category detail page.
///
/// Scores are computed from the category's grade and comparison records on
/// every request.
pub async fn get_category_page(
    Path(category_id): Path<CategoryId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<CategoryPageState>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let category = get_category(category_id, user_id, &connection)?;
    let products = get_all_products(category_id, user_id, &connection)?;
    let graded_ranks = get_graded_ranks(category_id, user_id, &connection)?;
    let comparative_ranks = get_comparative_ranks(category_id, user_id, &connection)?;

    let ranked_products = compute_ranked_list(products, &graded_ranks, &comparative_ranks);

    Ok(category_page_view(&category, &ranked_products).into_response())
}

/// A route handler for the new product page.
pub async fn get_new_product_page(Path(category_id): Path<CategoryId>) -> Response {
    new_product_view(category_id, "").into_response()
}

/// A route handler for adding a product to a category.
pub async fn create_product_endpoint(
    Path(category_id): Path<CategoryId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<CreateProductEndpointState>,
    Form(new_product): Form<ProductFormData>,
) -> Response {
    let name = match ProductName::new(&new_product.name) {
        Ok(name) => name,
        Err(error) => {
            return new_product_form_view(category_id, &format!("Error: {error}")).into_response();
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    // The category must exist and belong to the caller before anything is
    // inserted into it.
    if let Err(error) = get_category(category_id, user_id, &connection) {
        return error.into_alert_response();
    }

    match create_product(name, new_product.description(), category_id, user_id, &connection) {
        Ok(_) => (
            HxRedirect(endpoints::format_endpoint(
                endpoints::CATEGORY_VIEW,
                category_id,
            )),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a product: {error}");

            error.into_alert_response()
        }
    }
}

/// A route handler for deleting a product.
///
/// The product's grade and comparison records are deleted with it.
pub async fn delete_product_endpoint(
    Path(product_id): Path<ProductId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<DeleteProductEndpointState>,
) -> Response {
    let mut connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_product(product_id, user_id, &mut connection) {
        Ok(_) => Alert::SuccessSimple {
            message: "Product deleted successfully".to_owned(),
        }
        .into_response(),
        Err(error @ Error::DeleteMissingProduct) => error.into_alert_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting product {product_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// A route handler for uploading a product image.
///
/// The image is written to the image store and the URL it will be served from
/// is saved on the product row.
pub async fn upload_product_image_endpoint(
    Path(product_id): Path<ProductId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<UploadProductImageState>,
    mut multipart: Multipart,
) -> Response {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut image_hint: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => {
                return Error::MultipartError(error.to_string()).into_alert_response();
            }
        };

        match field.name() {
            Some("image") => {
                let content_type = field.content_type().unwrap_or_default().to_string();

                let Some(extension) = content_type.strip_prefix("image/") else {
                    return Error::NotAnImage.into_alert_response();
                };
                let extension = extension.to_string();

                match field.bytes().await {
                    Ok(bytes) => image = Some((extension, bytes.to_vec())),
                    Err(error) => {
                        return Error::MultipartError(error.to_string()).into_alert_response();
                    }
                }
            }
            Some("hint") => match field.text().await {
                Ok(text) if !text.trim().is_empty() => image_hint = Some(text),
                Ok(_) => {}
                Err(error) => {
                    return Error::MultipartError(error.to_string()).into_alert_response();
                }
            },
            _ => {}
        }
    }

    let Some((extension, data)) = image else {
        return Error::MultipartError("no image field in the form".to_string())
            .into_alert_response();
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let product = match get_product(product_id, user_id, &connection) {
        Ok(product) => product,
        Err(error) => return error.into_alert_response(),
    };

    let file_name = format!("product_{product_id}.{extension}");
    let image_url = match state.image_store.save(&file_name, &data) {
        Ok(image_url) => image_url,
        Err(error) => {
            tracing::error!("Failed to store image for product {product_id}: {error}");
            return error.into_alert_response();
        }
    };

    match set_product_image(product_id, &image_url, image_hint.as_deref(), user_id, &connection) {
        Ok(_) => (
            HxRedirect(endpoints::format_endpoint(
                endpoints::CATEGORY_VIEW,
                product.category_id,
            )),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while saving the image URL for product \
                {product_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// Create a product in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_product(
    name: ProductName,
    description: Option<&str>,
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Product, Error> {
    connection.execute(
        "INSERT INTO product (category_id, name, description, user_id) VALUES (?1, ?2, ?3, ?4);",
        (category_id, name.as_ref(), description, user_id.as_i64()),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Product {
        id,
        category_id,
        name,
        description: description.map(|description| description.to_string()),
        image_url: None,
        image_hint: None,
        user_id,
    })
}

/// Retrieve the product with `product_id` owned by `user_id`.
///
/// # Errors
/// This function will return [Error::NotFound] if the product does not exist
/// or belongs to another user, or an error if there is an SQL error.
pub fn get_product(
    product_id: ProductId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Product, Error> {
    connection
        .prepare(
            "SELECT id, category_id, name, description, image_url, image_hint, user_id
            FROM product WHERE id = :id AND user_id = :user_id;",
        )?
        .query_row(
            &[(":id", &product_id), (":user_id", &user_id.as_i64())],
            map_row,
        )
        .map_err(|error| error.into())
}

/// Retrieve the product with `product_id` regardless of who owns it.
///
/// This exists for the bearer-token update path, which loads the product
/// first and then compares owners so that it can distinguish a missing
/// product from someone else's product. Everything else should use
/// [get_product].
///
/// # Errors
/// This function will return [Error::NotFound] if the product does not exist,
/// or an error if there is an SQL error.
pub fn get_product_by_id(
    product_id: ProductId,
    connection: &Connection,
) -> Result<Product, Error> {
    connection
        .prepare(
            "SELECT id, category_id, name, description, image_url, image_hint, user_id
            FROM product WHERE id = :id;",
        )?
        .query_row(&[(":id", &product_id)], map_row)
        .map_err(|error| error.into())
}

/// Retrieve the products in the category with `category_id` owned by
/// `user_id`, in creation order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_products(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<Product>, Error> {
    connection
        .prepare(
            "SELECT id, category_id, name, description, image_url, image_hint, user_id
            FROM product WHERE category_id = :category_id AND user_id = :user_id
            ORDER BY id ASC;",
        )?
        .query_map(
            &[(":category_id", &category_id), (":user_id", &user_id.as_i64())],
            map_row,
        )?
        .map(|maybe_product| maybe_product.map_err(|error| error.into()))
        .collect()
}

/// Update a product's name and/or description in the database.
///
/// A `None` leaves the corresponding column unchanged.
///
/// # Errors
/// This function will return [Error::NotFound] if the product does not exist
/// or belongs to another user, or an error if there is an SQL error.
pub fn update_product(
    product_id: ProductId,
    new_name: Option<&ProductName>,
    new_description: Option<&str>,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE product SET
            name = COALESCE(?1, name),
            description = COALESCE(?2, description)
        WHERE id = ?3 AND user_id = ?4;",
        (
            new_name.map(|name| name.as_ref().to_string()),
            new_description,
            product_id,
            user_id.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Save the image URL (and optional alt text) for a product.
///
/// # Errors
/// This function will return [Error::NotFound] if the product does not exist
/// or belongs to another user, or an error if there is an SQL error.
pub fn set_product_image(
    product_id: ProductId,
    image_url: &str,
    image_hint: Option<&str>,
    user_id: UserID,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE product SET
            image_url = ?1,
            image_hint = COALESCE(?2, image_hint)
        WHERE id = ?3 AND user_id = ?4;",
        (image_url, image_hint, product_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete a product and all of its grade and comparison records in one
/// transaction.
///
/// Either the product and every rank record that references it are deleted,
/// or nothing is.
///
/// # Errors
/// This function will return [Error::DeleteMissingProduct] if the product
/// does not exist or belongs to another user, or an error if there is an SQL
/// error.
pub fn delete_product(
    product_id: ProductId,
    user_id: UserID,
    connection: &mut Connection,
) -> Result<(), Error> {
    let transaction = connection.transaction()?;

    let rows_affected = transaction.execute(
        "DELETE FROM product WHERE id = ?1 AND user_id = ?2;",
        (product_id, user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        // Dropping the uncommitted transaction rolls it back.
        return Err(Error::DeleteMissingProduct);
    }

    transaction.execute(
        "DELETE FROM graded_ranking WHERE product_id = ?1 AND user_id = ?2;",
        (product_id, user_id.as_i64()),
    )?;

    transaction.execute(
        "DELETE FROM comparative_ranking
        WHERE (winner_product_id = ?1 OR loser_product_id = ?1) AND user_id = ?2;",
        (product_id, user_id.as_i64()),
    )?;

    transaction.commit()?;

    Ok(())
}

pub fn create_product_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS product (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL REFERENCES category(id),
            name TEXT NOT NULL,
            description TEXT,
            image_url TEXT,
            image_hint TEXT,
            user_id INTEGER NOT NULL REFERENCES user(id)
        );

        CREATE INDEX IF NOT EXISTS idx_product_category ON product(category_id, user_id);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Product, rusqlite::Error> {
    Ok(Product {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: ProductName::new_unchecked(&row.get::<_, String>(2)?),
        description: row.get(3)?,
        image_url: row.get(4)?,
        image_hint: row.get(5)?,
        user_id: UserID::new(row.get(6)?),
    })
}
