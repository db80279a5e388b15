use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use shared::{
    domain::{NewSale, ProductId, Sale},
    error::StoreError,
};
use storage::InventoryStore;
use tracing::{error, info};

use crate::{remote_failure, report, CatalogStore, NoticeKind, Notify, SaleMode, SharedState};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SalesSummary {
    pub today_count: usize,
    pub today_total: f64,
    pub all_time_count: usize,
    pub all_time_total: f64,
}

/// Append-only sale history plus the sale workflow that keeps stock in step.
#[derive(Clone)]
pub struct SalesLedger {
    store: Arc<dyn InventoryStore>,
    state: SharedState,
    catalog: CatalogStore,
    notify: Arc<dyn Notify>,
    mode: SaleMode,
}

impl SalesLedger {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        state: SharedState,
        catalog: CatalogStore,
        notify: Arc<dyn Notify>,
        mode: SaleMode,
    ) -> Self {
        Self {
            store,
            state,
            catalog,
            notify,
            mode,
        }
    }

    pub fn mode(&self) -> SaleMode {
        self.mode
    }

    pub async fn record_sale(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Sale, StoreError> {
        let result = self.try_record_sale(product_id, quantity).await;
        match &result {
            Ok(sale) => self.notify.notify(
                NoticeKind::Success,
                &format!(
                    "sold {} x '{}' for {:.2}",
                    sale.quantity, sale.product_name, sale.total
                ),
            ),
            Err(err) => report(self.notify.as_ref(), "record sale", err),
        }
        result
    }

    async fn try_record_sale(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Sale, StoreError> {
        if quantity == 0 {
            return Err(StoreError::validation("quantity must be at least 1"));
        }
        let product = self
            .catalog
            .get(product_id)
            .await
            .ok_or(StoreError::ProductNotFound(product_id))?;
        if quantity > product.stock {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        let new_sale = NewSale {
            product_id,
            product_name: product.name.clone(),
            quantity,
            total: f64::from(quantity) * product.price,
            date: Utc::now(),
        };

        let sale = match self.mode {
            SaleMode::Atomic => {
                let sale = self
                    .store
                    .record_sale(&new_sale)
                    .await
                    .map_err(remote_failure)?;
                // Another writer may have sold units since our snapshot; the
                // store already enforced the floor, so only mirror our share.
                let local_stock = self
                    .catalog
                    .get(product_id)
                    .await
                    .map_or(0, |p| p.stock.saturating_sub(quantity));
                self.catalog.set_local_stock(product_id, local_stock).await;
                sale
            }
            SaleMode::TwoStep => {
                let sale = self
                    .store
                    .insert_sale(&new_sale)
                    .await
                    .map_err(remote_failure)?;
                if let Err(err) = self.catalog.try_decrement_stock(product_id, quantity).await {
                    error!(
                        sale_id = %sale.id,
                        %product_id,
                        quantity,
                        %err,
                        "sale was recorded but stock was not decremented; inventory is out of sync"
                    );
                    return Err(err);
                }
                sale
            }
        };

        self.state.write().await.sales.insert(0, sale.clone());
        info!(
            sale_id = %sale.id,
            %product_id,
            quantity,
            total = sale.total,
            "sale recorded"
        );
        Ok(sale)
    }

    pub async fn sales(&self) -> Vec<Sale> {
        self.state.read().await.sales.clone()
    }

    /// Sales whose date falls on `day` in the local time zone.
    pub async fn sales_on(&self, day: NaiveDate) -> Vec<Sale> {
        self.state
            .read()
            .await
            .sales
            .iter()
            .filter(|sale| local_day(sale) == day)
            .cloned()
            .collect()
    }

    pub async fn total_on(&self, day: NaiveDate) -> f64 {
        self.sales_on(day).await.iter().map(|sale| sale.total).sum()
    }

    pub async fn todays_sales(&self) -> Vec<Sale> {
        self.sales_on(today()).await
    }

    pub async fn todays_total(&self) -> f64 {
        self.total_on(today()).await
    }

    pub async fn all_time_total(&self) -> f64 {
        self.state
            .read()
            .await
            .sales
            .iter()
            .map(|sale| sale.total)
            .sum()
    }

    pub async fn summary(&self) -> SalesSummary {
        let day = today();
        let state = self.state.read().await;
        let (today_count, today_total) = state
            .sales
            .iter()
            .filter(|sale| local_day(sale) == day)
            .fold((0, 0.0), |(count, total), sale| (count + 1, total + sale.total));
        SalesSummary {
            today_count,
            today_total,
            all_time_count: state.sales.len(),
            all_time_total: state.sales.iter().map(|sale| sale.total).sum(),
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn local_day(sale: &Sale) -> NaiveDate {
    sale.date.with_timezone(&Local).date_naive()
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;
