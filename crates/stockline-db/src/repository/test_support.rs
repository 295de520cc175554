//! Shared fixtures for repository tests.

use chrono::{NaiveDate, Utc};
use stockline_core::ledger::{AdjustStockRequest, MovementReason};
use stockline_core::sales::{NewSalesOrder, SalesOrderDetail};
use stockline_core::tax::{OrderLineInput, TaxType};
use stockline_core::{Customer, LedgerPolicy, NewParty, NewProduct, NewStore, Product, Rider, Store, Supplier};

use crate::pool::{Database, DbConfig};

pub(crate) const ACTOR: &str = "user-1";

/// A database with two stores, two products and one of each party.
pub(crate) struct World {
    pub db: Database,
    pub store: Store,
    pub other_store: Store,
    pub product: Product,
    pub other_product: Product,
    pub supplier: Supplier,
    pub customer: Customer,
    pub rider: Rider,
}

pub(crate) async fn world() -> World {
    world_with(LedgerPolicy::default()).await
}

pub(crate) async fn world_with(policy: LedgerPolicy) -> World {
    let db = Database::new(DbConfig::in_memory().policy(policy)).await.unwrap();
    populate(db).await
}

pub(crate) async fn populate(db: Database) -> World {
    let catalog = db.catalog();

    let store = catalog.create_store(&new_store("NBO", "Nairobi")).await.unwrap();
    let other_store = catalog.create_store(&new_store("MSA", "Mombasa")).await.unwrap();
    let product = catalog.create_product(&new_product("SUG-50", "Sugar 50kg")).await.unwrap();
    let other_product = catalog.create_product(&new_product("RIC-25", "Rice 25kg")).await.unwrap();
    let supplier = catalog.create_supplier(&new_party("Mills Ltd")).await.unwrap();
    let customer = catalog.create_customer(&new_party("Corner Shop")).await.unwrap();
    let rider = catalog.create_rider(&new_party("Otieno")).await.unwrap();

    World {
        db,
        store,
        other_store,
        product,
        other_product,
        supplier,
        customer,
        rider,
    }
}

fn new_store(code: &str, name: &str) -> NewStore {
    NewStore {
        code: code.to_string(),
        name: name.to_string(),
    }
}

fn new_product(code: &str, name: &str) -> NewProduct {
    NewProduct {
        code: code.to_string(),
        name: name.to_string(),
        unit_of_measure: "bag".to_string(),
        cost_price_cents: 1_000,
        selling_price_cents: 1_500,
        reorder_level: 5,
    }
}

fn new_party(name: &str) -> NewParty {
    NewParty {
        name: name.to_string(),
        phone: None,
        email: None,
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) fn line(product: &Product, quantity: i64, unit_price_cents: i64) -> OrderLineInput {
    OrderLineInput {
        product_id: product.id.clone(),
        quantity,
        unit_price_cents,
        tax_type: TaxType::Vat16,
    }
}

impl World {
    /// Puts `quantity` on hand through a manual correction.
    pub async fn stock(&self, store: &Store, product: &Product, quantity: i64) {
        self.db
            .inventory()
            .adjust(&AdjustStockRequest {
                store_id: store.id.clone(),
                product_id: product.id.clone(),
                delta: quantity,
                reason: MovementReason::ManualCorrection,
                allow_negative: false,
                reference_id: None,
                note: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap();
    }

    pub async fn on_hand(&self, store: &Store, product: &Product) -> i64 {
        self.db.inventory().read(&store.id, &product.id).await.unwrap()
    }

    /// An Approved sales order for `quantity` of the fixture product, shipping
    /// from the fixture store.
    pub async fn approved_order(&self, quantity: i64) -> SalesOrderDetail {
        let sales = self.db.sales();
        let detail = sales
            .create(&NewSalesOrder {
                customer_id: self.customer.id.clone(),
                store_id: self.store.id.clone(),
                order_date: today(),
                pricing_mode: None,
                lines: vec![line(&self.product, quantity, 1_500)],
                notes: None,
                actor_id: ACTOR.to_string(),
            })
            .await
            .unwrap();
        sales.approve(&detail.order.id, ACTOR).await.unwrap();
        sales.get(&detail.order.id).await.unwrap().unwrap()
    }
}
