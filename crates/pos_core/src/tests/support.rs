use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{NewSale, Product, ProductDraft, ProductId, Sale};
use storage::{InventoryStore, Storage};

use crate::{
    AlwaysConfirm, Confirm, PointOfSale, PosOptions, RecordingNotifier, SaleMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    ListProducts,
    InsertProduct,
    UpdateProduct,
    DeleteProduct,
    DecrementStock,
    ListSales,
    InsertSale,
    RecordSale,
}

/// SQLite-backed store that can be told to fail individual operations.
pub(crate) struct FlakyStore {
    pub(crate) inner: Storage,
    failing: Mutex<Vec<Op>>,
    calls: Mutex<Vec<Op>>,
}

impl FlakyStore {
    pub(crate) async fn new() -> Self {
        Self {
            inner: Storage::new("sqlite::memory:").await.expect("db"),
            failing: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail(&self, op: Op) {
        self.failing.lock().expect("lock").push(op);
    }

    pub(crate) fn calls(&self, op: Op) -> usize {
        self.calls
            .lock()
            .expect("lock")
            .iter()
            .filter(|called| **called == op)
            .count()
    }

    fn enter(&self, op: Op) -> Result<()> {
        self.calls.lock().expect("lock").push(op);
        if self.failing.lock().expect("lock").contains(&op) {
            return Err(anyhow!("simulated outage during {op:?}"));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        self.enter(Op::ListProducts)?;
        self.inner.list_products().await
    }

    async fn insert_product(&self, product: &Product) -> Result<Product> {
        self.enter(Op::InsertProduct)?;
        self.inner.insert_product(product).await
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        self.enter(Op::UpdateProduct)?;
        self.inner.update_product(product).await
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<()> {
        self.enter(Op::DeleteProduct)?;
        self.inner.delete_product(product_id).await
    }

    async fn decrement_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        self.enter(Op::DecrementStock)?;
        self.inner.decrement_stock(product_id, quantity).await
    }

    async fn list_sales(&self) -> Result<Vec<Sale>> {
        self.enter(Op::ListSales)?;
        self.inner.list_sales().await
    }

    async fn insert_sale(&self, sale: &NewSale) -> Result<Sale> {
        self.enter(Op::InsertSale)?;
        self.inner.insert_sale(sale).await
    }

    async fn record_sale(&self, sale: &NewSale) -> Result<Sale> {
        self.enter(Op::RecordSale)?;
        self.inner.record_sale(sale).await
    }
}

pub(crate) struct Harness {
    pub(crate) pos: PointOfSale,
    pub(crate) store: Arc<FlakyStore>,
    pub(crate) notifier: Arc<RecordingNotifier>,
}

pub(crate) async fn harness(mode: SaleMode) -> Harness {
    harness_with(Arc::new(AlwaysConfirm), mode).await
}

pub(crate) async fn harness_with(confirm: Arc<dyn Confirm>, mode: SaleMode) -> Harness {
    let store = Arc::new(FlakyStore::new().await);
    let notifier = Arc::new(RecordingNotifier::default());
    let pos = PointOfSale::new(
        store.clone(),
        confirm,
        notifier.clone(),
        PosOptions {
            sale_mode: mode,
            ..PosOptions::default()
        },
    );
    Harness {
        pos,
        store,
        notifier,
    }
}

pub(crate) fn funda(stock: u32) -> ProductDraft {
    ProductDraft::new("Funda Silicona", 10, stock)
}
