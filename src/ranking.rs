//! This file defines the two kinds of ranking records, the API routes for
//! recording them, and the ranking store functions.
//!
//! A graded ranking scores a product directly on the 1-7 scale. A comparative
//! ranking records a pairwise win/loss between two products in the same
//! category. Both are append-only: every record is kept and the scoring
//! engine aggregates them fresh on each request.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    AppState, Error,
    category::CategoryId,
    endpoints,
    product::{ProductId, get_product},
    score::REFERENCE_SCALE_MAX,
    user::UserID,
};

/// A grade on the 1 to [REFERENCE_SCALE_MAX] scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Grade(i64);

impl Grade {
    /// Create a grade.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidGrade] if `rank` is outside
    /// the 1 to [REFERENCE_SCALE_MAX] scale.
    pub fn new(rank: i64) -> Result<Self, Error> {
        if (1..=REFERENCE_SCALE_MAX).contains(&rank) {
            Ok(Self(rank))
        } else {
            Err(Error::InvalidGrade(rank))
        }
    }

    /// The grade as a plain integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// A direct numeric grading of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct GradedRank {
    /// The ID of the graded ranking record.
    pub id: i64,

    /// The ID of the graded product.
    pub product_id: ProductId,

    /// The ID of the category the product was graded in.
    pub category_id: CategoryId,

    /// The grade on the 1-7 scale.
    pub rank: Grade,

    /// The ID of the user who recorded the grade.
    pub user_id: UserID,
}

/// A pairwise win/loss between two products in the same category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct ComparativeRank {
    /// The ID of the comparative ranking record.
    pub id: i64,

    /// The ID of the category both products belong to.
    pub category_id: CategoryId,

    /// The ID of the product that won the comparison.
    pub winner_product_id: ProductId,

    /// The ID of the product that lost the comparison.
    pub loser_product_id: ProductId,

    /// The ID of the user who recorded the comparison.
    pub user_id: UserID,
}

/// The state needed for recording a grade.
#[derive(Debug, Clone)]
pub struct CreateGradeEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateGradeEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The state needed for recording a comparison.
#[derive(Debug, Clone)]
pub struct CreateComparisonEndpointState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CreateComparisonEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GradeFormData {
    pub rank: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComparisonFormData {
    pub winner_product_id: ProductId,
    pub loser_product_id: ProductId,
}

/// A route handler for grading a product.
pub async fn create_grade_endpoint(
    Path(product_id): Path<ProductId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<CreateGradeEndpointState>,
    Form(form_data): Form<GradeFormData>,
) -> Response {
    let grade = match Grade::new(form_data.rank) {
        Ok(grade) => grade,
        Err(error) => {
            return error.into_alert_response();
        }
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_graded_rank(product_id, grade, user_id, &connection) {
        Ok(rank) => (
            HxRedirect(endpoints::format_endpoint(
                endpoints::CATEGORY_VIEW,
                rank.category_id,
            )),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(error @ Error::NotFound) => error.into_alert_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while grading product {product_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// A route handler for recording a pairwise comparison.
pub async fn create_comparison_endpoint(
    Path(category_id): Path<CategoryId>,
    Extension(user_id): Extension<UserID>,
    State(state): State<CreateComparisonEndpointState>,
    Form(form_data): Form<ComparisonFormData>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_comparative_rank(
        category_id,
        form_data.winner_product_id,
        form_data.loser_product_id,
        user_id,
        &connection,
    ) {
        Ok(_) => (
            HxRedirect(endpoints::format_endpoint(
                endpoints::CATEGORY_VIEW,
                category_id,
            )),
            StatusCode::SEE_OTHER,
        )
            .into_response(),
        Err(
            error @ (Error::SelfComparison | Error::ProductNotInCategory | Error::NotFound),
        ) => error.into_alert_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while recording a comparison in category \
                {category_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

/// Record a grade for the product with `product_id`.
///
/// The product must exist and belong to `user_id`; its category is looked up
/// rather than trusted from the caller.
///
/// # Errors
/// This function will return [Error::NotFound] if the product does not exist
/// or belongs to another user, or an error if there is an SQL error.
pub fn create_graded_rank(
    product_id: ProductId,
    grade: Grade,
    user_id: UserID,
    connection: &Connection,
) -> Result<GradedRank, Error> {
    let product = get_product(product_id, user_id, connection)?;

    connection.execute(
        "INSERT INTO graded_ranking (product_id, category_id, rank, user_id)
        VALUES (?1, ?2, ?3, ?4);",
        (
            product.id,
            product.category_id,
            grade.as_i64(),
            user_id.as_i64(),
        ),
    )?;

    let id = connection.last_insert_rowid();

    Ok(GradedRank {
        id,
        product_id: product.id,
        category_id: product.category_id,
        rank: grade,
        user_id,
    })
}

/// Record a pairwise comparison between two products in the category with
/// `category_id`.
///
/// Both products must exist, belong to `user_id`, and belong to the given
/// category, and the winner and loser must be different products.
///
/// # Errors
/// This function will return [Error::SelfComparison] if winner and loser are
/// the same product, [Error::NotFound] if either product does not exist or
/// belongs to another user, [Error::ProductNotInCategory] if either product
/// belongs to a different category, or an error if there is an SQL error.
pub fn create_comparative_rank(
    category_id: CategoryId,
    winner_product_id: ProductId,
    loser_product_id: ProductId,
    user_id: UserID,
    connection: &Connection,
) -> Result<ComparativeRank, Error> {
    if winner_product_id == loser_product_id {
        return Err(Error::SelfComparison);
    }

    let winner = get_product(winner_product_id, user_id, connection)?;
    let loser = get_product(loser_product_id, user_id, connection)?;

    if winner.category_id != category_id || loser.category_id != category_id {
        return Err(Error::ProductNotInCategory);
    }

    connection.execute(
        "INSERT INTO comparative_ranking (category_id, winner_product_id, loser_product_id, user_id)
        VALUES (?1, ?2, ?3, ?4);",
        (
            category_id,
            winner_product_id,
            loser_product_id,
            user_id.as_i64(),
        ),
    )?;

    let id = connection.last_insert_rowid();

    Ok(ComparativeRank {
        id,
        category_id,
        winner_product_id,
        loser_product_id,
        user_id,
    })
}

/// Retrieve the grades recorded in the category with `category_id` owned by
/// `user_id`, in creation order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_graded_ranks(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<GradedRank>, Error> {
    connection
        .prepare(
            "SELECT id, product_id, category_id, rank, user_id FROM graded_ranking
            WHERE category_id = :category_id AND user_id = :user_id ORDER BY id ASC;",
        )?
        .query_map(
            &[(":category_id", &category_id), (":user_id", &user_id.as_i64())],
            map_graded_row,
        )?
        .map(|maybe_rank| maybe_rank.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the comparisons recorded in the category with `category_id` owned
/// by `user_id`, in creation order.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_comparative_ranks(
    category_id: CategoryId,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<ComparativeRank>, Error> {
    connection
        .prepare(
            "SELECT id, category_id, winner_product_id, loser_product_id, user_id
            FROM comparative_ranking
            WHERE category_id = :category_id AND user_id = :user_id ORDER BY id ASC;",
        )?
        .query_map(
            &[(":category_id", &category_id), (":user_id", &user_id.as_i64())],
            map_comparative_row,
        )?
        .map(|maybe_rank| maybe_rank.map_err(|error| error.into()))
        .collect()
}

pub fn create_graded_ranking_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS graded_ranking (
            id INTEGER PRIMARY KEY,
            product_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            rank INTEGER NOT NULL,
            user_id INTEGER NOT NULL REFERENCES user(id)
        );

        CREATE INDEX IF NOT EXISTS idx_graded_ranking_category
        ON graded_ranking(category_id, user_id);",
    )?;

    Ok(())
}

pub fn create_comparative_ranking_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS comparative_ranking (
            id INTEGER PRIMARY KEY,
            category_id INTEGER NOT NULL,
            winner_product_id INTEGER NOT NULL,
            loser_product_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL REFERENCES user(id)
        );

        CREATE INDEX IF NOT EXISTS idx_comparative_ranking_category
        ON comparative_ranking(category_id, user_id);",
    )?;

    Ok(())
}

fn map_graded_row(row: &Row) -> Result<GradedRank, rusqlite::Error> {
    Ok(GradedRank {
        id: row.get(0)?,
        product_id: row.get(1)?,
        category_id: row.get(2)?,
        // The table only ever receives validated grades.
        rank: Grade(row.get(3)?),
        user_id: UserID::new(row.get(4)?),
    })
}

fn map_comparative_row(row: &Row) -> Result<ComparativeRank, rusqlite::Error> {
    Ok(ComparativeRank {
        id: row.get(0)?,
        category_id: row.get(1)?,
        winner_product_id: row.get(2)?,
        loser_product_id: row.get(3)?,
        user_id: UserID::new(row.get(4)?),
    })
}



#[cfg(test)]
mod ranking_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use rusqlite::Connection;

    use crate::{
        category::{CategoryName, create_category},
        db::initialize,
        endpoints,
        product::{Product, ProductName, create_product},
        ranking::{
            ComparisonFormData, CreateComparisonEndpointState, CreateGradeEndpointState,
            GradeFormData, create_comparison_endpoint, create_grade_endpoint, get_graded_ranks,
        },
        user::{UserID, create_anonymous_user},
    };

    struct Fixture {
        db_connection: Arc<Mutex<Connection>>,
        user_id: UserID,
        category_id: i64,
        first_product: Product,
        second_product: Product,
    }

    fn get_fixture() -> Fixture {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");
        let user = create_anonymous_user(&connection).expect("Could not create test user");
        let category = create_category(
            CategoryName::new_unchecked("Smartphones"),
            None,
            user.id,
            &connection,
        )
        .expect("Could not create test category");
        let first_product = create_product(
            ProductName::new_unchecked("Pixelphone"),
            None,
            category.id,
            user.id,
            &connection,
        )
        .expect("Could not create test product");
        let second_product = create_product(
            ProductName::new_unchecked("Fruitphone"),
            None,
            category.id,
            user.id,
            &connection,
        )
        .expect("Could not create test product");

        Fixture {
            db_connection: Arc::new(Mutex::new(connection)),
            user_id: user.id,
            category_id: category.id,
            first_product,
            second_product,
        }
    }

    #[tokio::test]
    async fn can_grade_product() {
        let fixture = get_fixture();
        let state = CreateGradeEndpointState {
            db_connection: fixture.db_connection.clone(),
        };

        let response = create_grade_endpoint(
            Path(fixture.first_product.id),
            Extension(fixture.user_id),
            State(state),
            Form(GradeFormData { rank: 6 }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(
            &response,
            &endpoints::format_endpoint(endpoints::CATEGORY_VIEW, fixture.category_id),
        );
        let ranks = get_graded_ranks(
            fixture.category_id,
            fixture.user_id,
            &fixture.db_connection.lock().unwrap(),
        )
        .expect("Could not get graded ranks");
        assert_eq!(ranks.len(), 1);
        assert_eq!(ranks[0].rank.as_i64(), 6);
    }

    #[tokio::test]
    async fn grading_outside_scale_returns_error() {
        let fixture = get_fixture();
        let state = CreateGradeEndpointState {
            db_connection: fixture.db_connection.clone(),
        };

        let response = create_grade_endpoint(
            Path(fixture.first_product.id),
            Extension(fixture.user_id),
            State(state),
            Form(GradeFormData { rank: 9 }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let ranks = get_graded_ranks(
            fixture.category_id,
            fixture.user_id,
            &fixture.db_connection.lock().unwrap(),
        )
        .expect("Could not get graded ranks");
        assert!(ranks.is_empty());
    }

    #[tokio::test]
    async fn can_record_comparison() {
        let fixture = get_fixture();
        let state = CreateComparisonEndpointState {
            db_connection: fixture.db_connection.clone(),
        };

        let response = create_comparison_endpoint(
            Path(fixture.category_id),
            Extension(fixture.user_id),
            State(state),
            Form(ComparisonFormData {
                winner_product_id: fixture.first_product.id,
                loser_product_id: fixture.second_product.id,
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn comparing_product_against_itself_returns_error() {
        let fixture = get_fixture();
        let state = CreateComparisonEndpointState {
            db_connection: fixture.db_connection.clone(),
        };

        let response = create_comparison_endpoint(
            Path(fixture.category_id),
            Extension(fixture.user_id),
            State(state),
            Form(ComparisonFormData {
                winner_product_id: fixture.first_product.id,
                loser_product_id: fixture.first_product.id,
            }),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[track_caller]
    fn assert_hx_redirect(response: &Response, endpoint: &str) {
        let header = response
            .headers()
            .get("hx-redirect")
            .expect("Headers missing hx-redirect")
            .to_str()
            .expect("Could not convert to str");

        assert_eq!(header, endpoint);
    }
}
