//! # Catalog Repository
//!
//! Master data: products, stores, customers, suppliers and riders.
//!
//! Codes are unique. A duplicate insert surfaces as
//! [`DbError::UniqueViolation`] naming the code that collided.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use stockline_core::{Customer, NewParty, NewProduct, NewStore, Product, Rider, Store, Supplier};

/// Repository for master data.
///
/// ## Usage
/// ```rust,ignore
/// let store = db.catalog().create_store(&NewStore { code: "NBO".into(), name: "Nairobi".into() }).await?;
/// let products = db.catalog().list_products().await?;
/// ```
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    pub async fn create_product(&self, request: &NewProduct) -> DbResult<Product> {
        request.validate()?;

        let now = Utc::now();
        let product = Product {
            id: generate_id(),
            code: request.code.trim().to_string(),
            name: request.name.trim().to_string(),
            unit_of_measure: request.unit_of_measure.trim().to_string(),
            cost_price_cents: request.cost_price_cents,
            selling_price_cents: request.selling_price_cents,
            reorder_level: request.reorder_level,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (
                id, code, name, unit_of_measure, cost_price_cents,
                selling_price_cents, reorder_level, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.unit_of_measure)
        .bind(product.cost_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| with_code(e.into(), &product.code))?;

        info!(id = %product.id, code = %product.code, "Product created");
        Ok(product)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Active products ordered by code.
    pub async fn list_products(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Listed products");
        Ok(products)
    }

    /// Soft delete. Ledger history keeps referencing the product.
    pub async fn deactivate_product(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        info!(id = %id, "Product deactivated");
        Ok(())
    }

    // =========================================================================
    // Stores
    // =========================================================================

    pub async fn create_store(&self, request: &NewStore) -> DbResult<Store> {
        request.validate()?;

        let store = Store {
            id: generate_id(),
            code: request.code.trim().to_string(),
            name: request.name.trim().to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO stores (id, code, name, created_at) VALUES (?1, ?2, ?3, ?4)")
            .bind(&store.id)
            .bind(&store.code)
            .bind(&store.name)
            .bind(store.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| with_code(e.into(), &store.code))?;

        info!(id = %store.id, code = %store.code, "Store created");
        Ok(store)
    }

    pub async fn get_store(&self, id: &str) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>("SELECT * FROM stores WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(store)
    }

    pub async fn list_stores(&self) -> DbResult<Vec<Store>> {
        let stores = sqlx::query_as::<_, Store>("SELECT * FROM stores ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        Ok(stores)
    }

    // =========================================================================
    // Parties
    // =========================================================================

    pub async fn create_customer(&self, request: &NewParty) -> DbResult<Customer> {
        request.validate()?;

        let customer = Customer {
            id: generate_id(),
            name: request.name.trim().to_string(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO customers (id, name, phone, email, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %customer.id, "Customer created");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(customer)
    }

    pub async fn list_customers(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>("SELECT * FROM customers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(customers)
    }

    pub async fn create_supplier(&self, request: &NewParty) -> DbResult<Supplier> {
        request.validate()?;

        let supplier = Supplier {
            id: generate_id(),
            name: request.name.trim().to_string(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO suppliers (id, name, phone, email, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&supplier.id)
        .bind(&supplier.name)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(supplier.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %supplier.id, "Supplier created");
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: &str) -> DbResult<Option<Supplier>> {
        let supplier = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(supplier)
    }

    pub async fn list_suppliers(&self) -> DbResult<Vec<Supplier>> {
        let suppliers = sqlx::query_as::<_, Supplier>("SELECT * FROM suppliers ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(suppliers)
    }

    /// Riders carry no email; any given in the request is ignored.
    pub async fn create_rider(&self, request: &NewParty) -> DbResult<Rider> {
        request.validate()?;

        let rider = Rider {
            id: generate_id(),
            name: request.name.trim().to_string(),
            phone: request.phone.clone(),
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO riders (id, name, phone, is_active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&rider.id)
        .bind(&rider.name)
        .bind(&rider.phone)
        .bind(rider.is_active)
        .bind(rider.created_at)
        .execute(&self.pool)
        .await?;

        info!(id = %rider.id, "Rider created");
        Ok(rider)
    }

    pub async fn get_rider(&self, id: &str) -> DbResult<Option<Rider>> {
        let rider = sqlx::query_as::<_, Rider>("SELECT * FROM riders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rider)
    }

    pub async fn list_riders(&self) -> DbResult<Vec<Rider>> {
        let riders = sqlx::query_as::<_, Rider>("SELECT * FROM riders WHERE is_active = 1 ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(riders)
    }
}

/// Fills in the colliding code on a unique violation.
fn with_code(err: DbError, code: &str) -> DbError {
    match err {
        DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
            field,
            value: code.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use stockline_core::{CoreError, ValidationError};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn sugar() -> NewProduct {
        NewProduct {
            code: "SUG-50".to_string(),
            name: "Sugar 50kg".to_string(),
            unit_of_measure: "bag".to_string(),
            cost_price_cents: 450_000,
            selling_price_cents: 520_000,
            reorder_level: 10,
        }
    }

    #[tokio::test]
    async fn test_product_create_get_list() {
        let db = db().await;
        let created = db.catalog().create_product(&sugar()).await.unwrap();

        let fetched = db.catalog().get_product(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.code, "SUG-50");
        assert!(fetched.is_active);

        let listed = db.catalog().list_products().await.unwrap();
        assert_eq!(listed.len(), 1);

        db.catalog().deactivate_product(&created.id).await.unwrap();
        assert!(db.catalog().list_products().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_product_code_rejected() {
        let db = db().await;
        db.catalog().create_product(&sugar()).await.unwrap();

        let err = db.catalog().create_product(&sugar()).await.unwrap_err();
        match err {
            DbError::UniqueViolation { value, .. } => assert_eq!(value, "SUG-50"),
            other => panic!("expected UniqueViolation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_store_code_rejected() {
        let db = db().await;
        let err = db
            .catalog()
            .create_store(&NewStore {
                code: "bad code".to_string(),
                name: "Main".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[tokio::test]
    async fn test_parties_roundtrip() {
        let db = db().await;
        let party = NewParty {
            name: "Acme Traders".to_string(),
            phone: Some("+254700000000".to_string()),
            email: Some("orders@acme.test".to_string()),
        };

        let customer = db.catalog().create_customer(&party).await.unwrap();
        let supplier = db.catalog().create_supplier(&party).await.unwrap();
        let rider = db.catalog().create_rider(&party).await.unwrap();

        assert!(db.catalog().get_customer(&customer.id).await.unwrap().is_some());
        assert!(db.catalog().get_supplier(&supplier.id).await.unwrap().is_some());
        assert!(db.catalog().get_rider(&rider.id).await.unwrap().is_some());
        assert!(db.catalog().get_rider("missing").await.unwrap().is_none());
    }
}
