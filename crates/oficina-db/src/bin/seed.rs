//! # Seed Data Generator
//!
//! Populates the database with development data: the service catalog, the
//! shop's departments, a few vehicles and one full quote → work-order flow.
//!
//! ## Usage
//! ```bash
//! # Seed the default database
//! cargo run -p oficina-db --bin seed
//!
//! # Specify database path
//! cargo run -p oficina-db --bin seed -- --db ./data/oficina.db
//! ```

use std::env;

use oficina_core::{Currency, Money};
use oficina_db::{
    Database, DbConfig, NewDepartment, NewEntry, NewQuote, NewQuoteItem, NewServiceType,
    NewVehicle,
};

/// Service catalog with default prices in centavos.
const SERVICE_TYPES: &[(&str, &str, i64)] = &[
    ("Oil change", "Engine oil and filter replacement", 18_000),
    ("Brake job", "Pads, discs and fluid check", 45_000),
    ("Wheel alignment", "Four-wheel computerized alignment", 12_000),
    ("Full detail", "Interior and exterior detailing", 25_000),
    ("Paint touch-up", "Localized paint repair", 38_000),
    ("AC service", "Air conditioning recharge and inspection", 22_000),
];

const DEPARTMENTS: &[(&str, &str)] = &[
    ("Reception", "Vehicle check-in and inspection"),
    ("Mechanical", "Engine, brakes and suspension work"),
    ("Body shop", "Structural and panel repair"),
    ("Paint booth", "Painting and finishing"),
    ("Detailing", "Cleaning and final delivery prep"),
];

const VEHICLES: &[(&str, &str)] = &[
    ("ABC1D23", "Silver hatchback"),
    ("BRA2E19", "Black sedan"),
    ("XYZ9K88", "White pickup"),
];

const SEED_USER: &str = "seed-user";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let db_path = parse_db_path().unwrap_or_else(|| "./oficina.db".to_string());
    tracing::info!(path = %db_path, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let catalog = db.catalog();

    let mut service_ids = Vec::new();
    for (name, description, price_cents) in SERVICE_TYPES {
        let st = catalog
            .create_service_type(NewServiceType {
                name: name.to_string(),
                description: Some(description.to_string()),
                default_price: Money::from_cents(*price_cents, Currency::BRL),
            })
            .await?;
        service_ids.push(st.id);
    }
    tracing::info!(count = service_ids.len(), "Service types created");

    let mut department_ids = Vec::new();
    for (name, description) in DEPARTMENTS {
        let dept = catalog
            .create_department(NewDepartment {
                name: name.to_string(),
                description: Some(description.to_string()),
            })
            .await?;
        department_ids.push(dept.id);
    }
    tracing::info!(count = department_ids.len(), "Departments created");

    let mut vehicle_ids = Vec::new();
    for (plate, description) in VEHICLES {
        let vehicle = catalog
            .create_vehicle(NewVehicle {
                license_plate: plate.to_string(),
                description: Some(description.to_string()),
            })
            .await?;
        vehicle_ids.push(vehicle.id);
    }
    tracing::info!(count = vehicle_ids.len(), "Vehicles registered");

    // One complete flow: quote with two items, approved, converted, and the
    // vehicle checked into reception.
    let quotes = db.quotes();
    let quote = quotes
        .create(NewQuote {
            vehicle_id: vehicle_ids[0].clone(),
            author_id: SEED_USER.to_string(),
            service_value: None,
            notes: Some("Customer reported squeaking brakes".to_string()),
            expires_at: None,
        })
        .await?;

    quotes
        .add_item(
            &quote.id,
            NewQuoteItem {
                service_type_id: service_ids[1].clone(), // Brake job
                description: None,
                quantity: 1,
                unit_price: None,
            },
        )
        .await?;
    quotes
        .add_item(
            &quote.id,
            NewQuoteItem {
                service_type_id: service_ids[2].clone(), // Wheel alignment
                description: None,
                quantity: 1,
                unit_price: None,
            },
        )
        .await?;

    quotes.send(&quote.id).await?;
    quotes.approve(&quote.id).await?;
    let work_order = quotes.convert_to_work_order(&quote.id, SEED_USER).await?;

    db.vehicle_statuses()
        .record_entry(NewEntry {
            vehicle_id: vehicle_ids[0].clone(),
            department_id: department_ids[0].clone(), // Reception
            work_order_id: work_order.id.clone(),
            author_id: SEED_USER.to_string(),
            notes: Some("Checked in at drop-off".to_string()),
        })
        .await?;

    tracing::info!(
        quote_id = %quote.id,
        work_order_id = %work_order.id,
        total = %work_order.total_amount(),
        "Demo flow seeded"
    );

    db.close().await;
    Ok(())
}

/// Parses `--db <path>` from the command line.
fn parse_db_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|a| a == "--db")
        .and_then(|i| args.get(i + 1))
        .cloned()
}
