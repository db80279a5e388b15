use std::sync::Arc;

use chrono::Utc;
use shared::{
    domain::{Product, ProductDraft, ProductId, ProductPatch},
    error::StoreError,
};
use storage::InventoryStore;
use tracing::info;

use crate::{remote_failure, report, Confirm, NoticeKind, Notify, SharedState};

/// Owns the product list: creation, edits, deletion and stock decrements.
#[derive(Clone)]
pub struct CatalogStore {
    store: Arc<dyn InventoryStore>,
    state: SharedState,
    confirm: Arc<dyn Confirm>,
    notify: Arc<dyn Notify>,
    low_stock_threshold: u32,
}

impl CatalogStore {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        state: SharedState,
        confirm: Arc<dyn Confirm>,
        notify: Arc<dyn Notify>,
        low_stock_threshold: u32,
    ) -> Self {
        Self {
            store,
            state,
            confirm,
            notify,
            low_stock_threshold,
        }
    }

    pub async fn add_product(&self, draft: ProductDraft) -> Result<Product, StoreError> {
        let result = self.try_add_product(draft).await;
        match &result {
            Ok(product) => self.notify.notify(
                NoticeKind::Success,
                &format!("product '{}' added", product.name),
            ),
            Err(err) => report(self.notify.as_ref(), "add product", err),
        }
        result
    }

    async fn try_add_product(&self, draft: ProductDraft) -> Result<Product, StoreError> {
        let name = required_name(&draft.name)?;
        let price = parse_price(draft.price.as_deref())?;
        let stock = parse_stock(draft.stock.as_deref())?;

        let id = self.fresh_id().await;
        let product = Product {
            id,
            code: optional_text(draft.code.as_deref()),
            name,
            model: optional_text(draft.model.as_deref()),
            category: draft.category.unwrap_or_default(),
            price,
            stock,
            created_at: Utc::now(),
        };

        let stored = self
            .store
            .insert_product(&product)
            .await
            .map_err(remote_failure)?;

        self.state.write().await.products.insert(0, stored.clone());
        info!(product_id = %stored.id, name = %stored.name, stock = stored.stock, "product added");
        Ok(stored)
    }

    pub async fn edit_product(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, StoreError> {
        let result = self.try_edit_product(product_id, patch).await;
        match &result {
            Ok(product) => self.notify.notify(
                NoticeKind::Success,
                &format!("product '{}' updated", product.name),
            ),
            Err(err) => report(self.notify.as_ref(), "update product", err),
        }
        result
    }

    async fn try_edit_product(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, StoreError> {
        let current = self
            .get(product_id)
            .await
            .ok_or(StoreError::ProductNotFound(product_id))?;
        let updated = apply_patch(current, &patch)?;

        self.store
            .update_product(&updated)
            .await
            .map_err(remote_failure)?;

        let mut state = self.state.write().await;
        if let Some(slot) = state.products.iter_mut().find(|p| p.id == product_id) {
            *slot = updated.clone();
        }
        info!(%product_id, "product updated");
        Ok(updated)
    }

    /// Returns `Ok(false)` when the operator declines the confirmation.
    pub async fn delete_product(&self, product_id: ProductId) -> Result<bool, StoreError> {
        let result = self.try_delete_product(product_id).await;
        match &result {
            Ok(true) => self
                .notify
                .notify(NoticeKind::Success, "product deleted"),
            Ok(false) => {}
            Err(err) => report(self.notify.as_ref(), "delete product", err),
        }
        result
    }

    async fn try_delete_product(&self, product_id: ProductId) -> Result<bool, StoreError> {
        let product = self
            .get(product_id)
            .await
            .ok_or(StoreError::ProductNotFound(product_id))?;

        let question = format!("Delete product '{}'? This cannot be undone.", product.name);
        if !self.confirm.confirm(&question) {
            info!(%product_id, "deletion cancelled by operator");
            return Ok(false);
        }

        self.store
            .delete_product(product_id)
            .await
            .map_err(remote_failure)?;

        self.state
            .write()
            .await
            .products
            .retain(|p| p.id != product_id);
        info!(%product_id, "product deleted");
        Ok(true)
    }

    /// Removes `quantity` units from stock and returns what is left.
    pub async fn decrement_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        let result = self.try_decrement_stock(product_id, quantity).await;
        if let Err(err) = &result {
            report(self.notify.as_ref(), "update stock", err);
        }
        result
    }

    pub(crate) async fn try_decrement_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<u32, StoreError> {
        if quantity == 0 {
            return Err(StoreError::validation("quantity must be at least 1"));
        }
        let product = self
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

        let remaining = self
            .store
            .decrement_stock(product_id, quantity)
            .await
            .map_err(remote_failure)?;

        self.set_local_stock(product_id, remaining).await;
        Ok(remaining)
    }

    /// Mirrors a stock level that the store has already committed.
    pub(crate) async fn set_local_stock(&self, product_id: ProductId, stock: u32) {
        let mut state = self.state.write().await;
        if let Some(product) = state.products.iter_mut().find(|p| p.id == product_id) {
            product.stock = stock;
        }
    }

    pub async fn products(&self) -> Vec<Product> {
        self.state.read().await.products.clone()
    }

    pub async fn get(&self, product_id: ProductId) -> Option<Product> {
        self.state
            .read()
            .await
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
    }

    /// First product whose PLU code matches exactly.
    pub async fn find_by_code(&self, code: &str) -> Option<Product> {
        self.state
            .read()
            .await
            .products
            .iter()
            .find(|p| p.code.as_deref() == Some(code))
            .cloned()
    }

    /// Products that can currently be sold.
    pub async fn available_products(&self) -> Vec<Product> {
        self.state
            .read()
            .await
            .products
            .iter()
            .filter(|p| p.stock > 0)
            .cloned()
            .collect()
    }

    pub async fn low_stock(&self) -> Vec<Product> {
        self.state
            .read()
            .await
            .products
            .iter()
            .filter(|p| p.stock < self.low_stock_threshold)
            .cloned()
            .collect()
    }

    pub fn low_stock_threshold(&self) -> u32 {
        self.low_stock_threshold
    }

    async fn fresh_id(&self) -> ProductId {
        let state = self.state.read().await;
        loop {
            let candidate = ProductId::generate();
            if state.products.iter().all(|p| p.id != candidate) {
                return candidate;
            }
        }
    }
}

fn apply_patch(mut product: Product, patch: &ProductPatch) -> Result<Product, StoreError> {
    if let Some(code) = patch.code.as_deref() {
        product.code = optional_text(Some(code));
    }
    if let Some(name) = patch.name.as_deref() {
        product.name = required_name(name)?;
    }
    if let Some(model) = patch.model.as_deref() {
        product.model = optional_text(Some(model));
    }
    if let Some(category) = patch.category {
        product.category = category;
    }
    if patch.price.is_some() {
        product.price = parse_price(patch.price.as_deref())?;
    }
    if patch.stock.is_some() {
        product.stock = parse_stock(patch.stock.as_deref())?;
    }
    Ok(product)
}

fn required_name(raw: &str) -> Result<String, StoreError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(StoreError::validation("name is required"));
    }
    Ok(name.to_string())
}

fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_price(raw: Option<&str>) -> Result<f64, StoreError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| StoreError::validation("price is required"))?;
    let price: f64 = raw
        .parse()
        .map_err(|_| StoreError::validation(format!("price '{raw}' is not a number")))?;
    if !price.is_finite() || price < 0.0 {
        return Err(StoreError::validation(format!(
            "price must be a non-negative amount, got '{raw}'"
        )));
    }
    Ok(price)
}

fn parse_stock(raw: Option<&str>) -> Result<u32, StoreError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| StoreError::validation("stock is required"))?;
    raw.parse::<u32>().map_err(|_| {
        StoreError::validation(format!(
            "stock must be a non-negative whole number, got '{raw}'"
        ))
    })
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
