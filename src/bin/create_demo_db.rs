use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;

use shelfrank::{
    CategoryName, Email, Grade, PasswordHash, ProductName, UserID, ValidatedPassword,
    create_category, create_comparative_rank, create_graded_rank, create_product, create_user,
    initialize_db,
};

/// A utility for creating a demo database for the shelfrank web server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let connection = Connection::open(output_path)?;

    initialize_db(&connection)?;

    println!("Creating test user...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;
    let user = create_user(
        Email::new_unchecked("test@example.com"),
        password_hash,
        &connection,
    )?;

    println!("Creating demo categories and products...");
    seed_demo_data(user.id, &connection)?;

    println!("Success!");

    Ok(())
}

fn seed_demo_data(user_id: UserID, connection: &Connection) -> Result<(), Box<dyn Error>> {
    let smartphones = create_category(
        CategoryName::new("Smartphones")?,
        Some("Phones I am considering for my next upgrade"),
        user_id,
        connection,
    )?;

    let flagship = create_product(
        ProductName::new("Flagship Phone")?,
        Some("Top of the line, top of the price range"),
        smartphones.id,
        user_id,
        connection,
    )?;
    let budget = create_product(
        ProductName::new("Budget Phone")?,
        Some("Does the basics well"),
        smartphones.id,
        user_id,
        connection,
    )?;
    let foldable = create_product(
        ProductName::new("Foldable Phone")?,
        None,
        smartphones.id,
        user_id,
        connection,
    )?;

    create_graded_rank(flagship.id, Grade::new(7)?, user_id, connection)?;
    create_graded_rank(budget.id, Grade::new(5)?, user_id, connection)?;
    create_graded_rank(foldable.id, Grade::new(4)?, user_id, connection)?;

    create_comparative_rank(smartphones.id, flagship.id, budget.id, user_id, connection)?;
    create_comparative_rank(smartphones.id, budget.id, foldable.id, user_id, connection)?;

    let coffee = create_category(
        CategoryName::new("Coffee Beans")?,
        None,
        user_id,
        connection,
    )?;

    let ethiopian = create_product(
        ProductName::new("Ethiopian Single Origin")?,
        Some("Fruity and floral"),
        coffee.id,
        user_id,
        connection,
    )?;
    create_product(
        ProductName::new("House Blend")?,
        None,
        coffee.id,
        user_id,
        connection,
    )?;

    create_graded_rank(ethiopian.id, Grade::new(6)?, user_id, connection)?;

    Ok(())
}
