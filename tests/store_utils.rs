#![allow(dead_code)]

use std::path::Path;

use docmapper::{Document, Engine, Product, StoreConfig, User};
use serde_json::json;
use tempfile::TempDir;

/// Fresh SQLite file with every table created. Keep the `TempDir` alive.
pub async fn sqlite_engine() -> anyhow::Result<(TempDir, Engine)> {
    let dir = TempDir::new()?;
    let engine = open_engine(&dir.path().join("docs.db")).await?;
    Ok((dir, engine))
}

pub async fn open_engine(path: &Path) -> anyhow::Result<Engine> {
    let mut engine = Engine::open_sqlite(path, false).await?;
    engine.create_all().await?;
    Ok(engine)
}

/// Engine on `DOCMAPPER_TEST_PG_URL`, or `None` when it is unset or unreachable.
pub async fn postgres_engine() -> Option<Engine> {
    let url = std::env::var("DOCMAPPER_TEST_PG_URL").ok()?;
    let config = StoreConfig::new(&url);
    let mut engine = Engine::connect(&config).await.ok()?;
    if engine.is_fallback() {
        return None;
    }
    engine.create_all().await.ok()?;
    Some(engine)
}

pub fn kim() -> User {
    User::new(
        "kim",
        Some(Document::new(json!({
            "age": 28,
            "email": "kim@example.com",
            "address": {"city": "Seoul", "district": "Gangnam", "zipcode": "06292"},
            "hobbies": ["reading", "movies", "coding"],
            "is_active": true
        }))),
        Some(Document::new(json!({
            "theme": "dark",
            "language": "ko",
            "notifications": {"email": true, "push": false, "sms": true}
        }))),
    )
}

pub fn lee() -> User {
    User::new(
        "lee",
        Some(Document::new(json!({
            "age": 25,
            "email": "lee@example.com",
            "address": {"city": "Busan", "district": "Haeundae", "zipcode": "48094"},
            "hobbies": ["cooking", "hiking", "photography"],
            "is_active": true
        }))),
        Some(Document::new(json!({
            "theme": "light",
            "language": "ko",
            "notifications": {"email": false, "push": true, "sms": false}
        }))),
    )
}

pub fn laptop() -> Product {
    Product::new(
        "laptop",
        Some(Document::new(json!({
            "category": "electronics",
            "price": 1500000,
            "specs": {"cpu": "Intel i7", "ram": "16GB", "storage": "512GB SSD"},
            "tags": ["performance", "work", "gaming"],
            "ratings": [5, 4, 5, 4, 5],
            "available": true
        }))),
    )
}

pub fn phone() -> Product {
    Product::new(
        "phone",
        Some(Document::new(json!({
            "category": "electronics",
            "price": 800000,
            "specs": {"screen": "6.1in", "camera": "48MP", "battery": "4000mAh"},
            "tags": ["mobile", "camera", "telecom"],
            "ratings": [4, 5, 4, 4, 5],
            "available": true
        }))),
    )
}

pub fn write_json(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(format!("{}.json", name)), content).expect("write fixture");
}
