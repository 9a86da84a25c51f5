//! Database initialization for the application.

use rusqlite::Connection;

use crate::{
    category::create_category_table,
    product::create_product_table,
    ranking::{create_comparative_ranking_table, create_graded_ranking_table},
    user::create_user_table,
};

/// Create the tables for the application's domain models.
///
/// Tables are created in dependency order so that foreign key references are
/// valid, and `PRAGMA foreign_keys` is switched on for the connection.
///
/// # Errors
///
/// Returns an error if the SQL queries fail.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;

    create_user_table(connection)?;
    create_category_table(connection)?;
    create_product_table(connection)?;
    create_graded_ranking_table(connection)?;
    create_comparative_ranking_table(connection)?;

    Ok(())
}
