//! # Seed Data Generator
//!
//! Populates a database with stores, products, parties and opening balances
//! for development.
//!
//! ## Usage
//! ```bash
//! # Two stores, default catalog
//! cargo run -p stockline-db --bin seed
//!
//! # More stores
//! cargo run -p stockline-db --bin seed -- --stores 4
//!
//! # Specify database path
//! cargo run -p stockline-db --bin seed -- --db ./data/stockline.db
//! ```
//!
//! Every product gets an opening balance in every store, so purchase
//! receiving and deliveries can be exercised right away.

use std::env;

use stockline_core::opening::OpeningBalanceInput;
use stockline_core::{NewParty, NewProduct, NewStore};
use stockline_db::{Database, DbConfig};

/// Store codes and names, in creation order.
const STORES: &[(&str, &str)] = &[
    ("NBO", "Nairobi Main"),
    ("MSA", "Mombasa Depot"),
    ("KSM", "Kisumu Branch"),
    ("NKR", "Nakuru Branch"),
];

/// Code, name, unit, cost cents, selling cents.
const PRODUCTS: &[(&str, &str, &str, i64, i64)] = &[
    ("SUG-50", "Sugar 50kg", "bag", 520_000, 610_000),
    ("RIC-25", "Rice Pishori 25kg", "bag", 410_000, 495_000),
    ("FLR-24", "Maize Flour 24x2kg", "bale", 290_000, 340_000),
    ("OIL-20", "Cooking Oil 20L", "jerrican", 480_000, 560_000),
    ("SLT-20", "Salt 20x1kg", "bale", 60_000, 78_000),
    ("WHT-12", "Wheat Flour 12x2kg", "bale", 210_000, 252_000),
    ("TEA-10", "Tea Leaves 10x500g", "carton", 150_000, 188_000),
    ("SOP-25", "Bar Soap 25x800g", "carton", 175_000, 214_000),
];

const SUPPLIERS: &[&str] = &["Mumias Millers", "Pwani Oil", "Kapa Refineries"];
const CUSTOMERS: &[&str] = &["Corner Shop Kibera", "Mama Njeri Stores", "Highway Wholesalers"];
const RIDERS: &[&str] = &["Otieno", "Wanjiku", "Hassan"];

const SEED_ACTOR: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut store_count: usize = 2;
    let mut db_path = String::from("./stockline_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stores" | "-s" => {
                if i + 1 < args.len() {
                    store_count = args[i + 1].parse().unwrap_or(2).clamp(1, STORES.len());
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --stores <N>   Number of stores to create, 1-4 (default: 2)");
                println!("  -d, --db <PATH>    Database file path (default: ./stockline_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Stockline Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Stores:   {}", store_count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let catalog = db.catalog();
    let existing = catalog.list_products().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let mut stores = Vec::new();
    for (code, name) in &STORES[..store_count] {
        let store = catalog
            .create_store(&NewStore {
                code: code.to_string(),
                name: name.to_string(),
            })
            .await?;
        stores.push(store);
    }
    println!("✓ Created {} stores", stores.len());

    let mut products = Vec::new();
    for (code, name, unit, cost, selling) in PRODUCTS {
        let product = catalog
            .create_product(&NewProduct {
                code: code.to_string(),
                name: name.to_string(),
                unit_of_measure: unit.to_string(),
                cost_price_cents: *cost,
                selling_price_cents: *selling,
                reorder_level: 10,
            })
            .await?;
        products.push(product);
    }
    println!("✓ Created {} products", products.len());

    for name in SUPPLIERS {
        catalog.create_supplier(&party(name)).await?;
    }
    for name in CUSTOMERS {
        catalog.create_customer(&party(name)).await?;
    }
    for name in RIDERS {
        catalog.create_rider(&party(name)).await?;
    }
    println!(
        "✓ Created {} suppliers, {} customers, {} riders",
        SUPPLIERS.len(),
        CUSTOMERS.len(),
        RIDERS.len()
    );

    let openings: Vec<OpeningBalanceInput> = stores
        .iter()
        .enumerate()
        .flat_map(|(s, store)| {
            products.iter().enumerate().map(move |(p, product)| OpeningBalanceInput {
                store_id: store.id.clone(),
                product_id: product.id.clone(),
                opening_quantity: (((s + 1) * 37 + p * 13) % 120) as i64,
            })
        })
        .collect();

    let recorded = db.inventory().save_opening_quantities(&openings, SEED_ACTOR).await?;
    println!("✓ Recorded {} opening balances", recorded.len());

    let summary = db.inventory().stock_summary().await?;
    println!();
    println!("Stock summary: {} product rows", summary.rows.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn party(name: &str) -> NewParty {
    NewParty {
        name: name.to_string(),
        phone: None,
        email: None,
    }
}
