use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use shared::{
    domain::{Product, Sale},
    error::StoreError,
};
use storage::{InventoryStore, MissingProduct, StockShortfall};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

mod capabilities;
mod catalog;
mod ledger;

pub use capabilities::{
    AlwaysConfirm, Confirm, NeverConfirm, NoticeKind, Notify, RecordingNotifier, TracingNotifier,
};
pub use catalog::CatalogStore;
pub use ledger::{SalesLedger, SalesSummary};

pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Local mirror of the backing store. Only ever written after the
/// corresponding remote call has succeeded.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub products: Vec<Product>,
    pub sales: Vec<Sale>,
    pub loading: bool,
}

pub type SharedState = Arc<RwLock<StoreState>>;

/// How a sale reaches the backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaleMode {
    /// Sale insert and stock decrement in a single store transaction.
    #[default]
    Atomic,
    /// Sale insert followed by a separate stock decrement. A failed decrement
    /// leaves a recorded sale without a matching stock reduction.
    TwoStep,
}

impl fmt::Display for SaleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaleMode::Atomic => f.write_str("atomic"),
            SaleMode::TwoStep => f.write_str("two_step"),
        }
    }
}

impl FromStr for SaleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "atomic" => Ok(SaleMode::Atomic),
            "two_step" => Ok(SaleMode::TwoStep),
            other => Err(format!("unknown sale mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PosOptions {
    pub sale_mode: SaleMode,
    pub low_stock_threshold: u32,
}

impl Default for PosOptions {
    fn default() -> Self {
        Self {
            sale_mode: SaleMode::Atomic,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}

/// Wires one [`StoreState`] into the catalog and the ledger.
pub struct PointOfSale {
    store: Arc<dyn InventoryStore>,
    state: SharedState,
    notify: Arc<dyn Notify>,
    catalog: CatalogStore,
    ledger: SalesLedger,
}

impl PointOfSale {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        confirm: Arc<dyn Confirm>,
        notify: Arc<dyn Notify>,
        options: PosOptions,
    ) -> Self {
        let state = SharedState::default();
        let catalog = CatalogStore::new(
            store.clone(),
            state.clone(),
            confirm,
            notify.clone(),
            options.low_stock_threshold,
        );
        let ledger = SalesLedger::new(
            store.clone(),
            state.clone(),
            catalog.clone(),
            notify.clone(),
            options.sale_mode,
        );
        Self {
            store,
            state,
            notify,
            catalog,
            ledger,
        }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn ledger(&self) -> &SalesLedger {
        &self.ledger
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Replaces local state with the store's current products and sales.
    pub async fn load(&self) -> Result<(), StoreError> {
        self.state.write().await.loading = true;

        let fetched = async {
            let products = self.store.list_products().await?;
            let sales = self.store.list_sales().await?;
            anyhow::Ok((products, sales))
        }
        .await;

        let mut state = self.state.write().await;
        state.loading = false;
        match fetched {
            Ok((products, sales)) => {
                info!(
                    products = products.len(),
                    sales = sales.len(),
                    "inventory loaded"
                );
                state.products = products;
                state.sales = sales;
                Ok(())
            }
            Err(err) => {
                drop(state);
                let err = StoreError::RemoteWrite(format!("failed to load inventory: {err:#}"));
                report(self.notify.as_ref(), "load inventory", &err);
                Err(err)
            }
        }
    }
}

/// Maps a backing-store failure onto the error taxonomy.
pub(crate) fn remote_failure(err: anyhow::Error) -> StoreError {
    if let Some(shortfall) = err.downcast_ref::<StockShortfall>() {
        return StoreError::InsufficientStock {
            product_id: shortfall.product_id,
            requested: shortfall.requested,
            available: shortfall.available,
        };
    }
    if let Some(MissingProduct(product_id)) = err.downcast_ref::<MissingProduct>() {
        return StoreError::ProductNotFound(*product_id);
    }
    StoreError::RemoteWrite(format!("{err:#}"))
}

/// Logs a failed operation and, unless it is plain input validation, tells
/// the operator about it.
pub(crate) fn report(notify: &dyn Notify, action: &str, err: &StoreError) {
    match err {
        StoreError::Validation(_) => {
            debug!(action, %err, "rejected input");
        }
        StoreError::InsufficientStock { .. } => {
            warn!(action, %err, "operation refused");
            notify.notify(NoticeKind::Warning, &err.to_string());
        }
        StoreError::ProductNotFound(_) | StoreError::RemoteWrite(_) => {
            error!(action, %err, "operation failed");
            notify.notify(NoticeKind::Error, &format!("could not {action}: {err}"));
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
