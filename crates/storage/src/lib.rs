use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite, SqliteConnection,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use shared::domain::{Category, NewSale, Product, ProductId, Sale, SaleId};

/// Returned (inside the `anyhow::Error`) when a conditional stock decrement
/// finds fewer units on hand than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("product {product_id} has {available} in stock, {requested} requested")]
pub struct StockShortfall {
    pub product_id: ProductId,
    pub requested: u32,
    pub available: u32,
}

/// Returned (inside the `anyhow::Error`) when an update or delete targets an
/// id the store does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("product {0} does not exist in the store")]
pub struct MissingProduct(pub ProductId);

/// The backing store the point-of-sale core writes through. Two collections,
/// `products` (newest first by creation time) and `sales` (newest first by
/// date), each with select-all, insert-returning, update-by-id and
/// delete-by-id.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn insert_product(&self, product: &Product) -> Result<Product>;
    async fn update_product(&self, product: &Product) -> Result<()>;
    async fn delete_product(&self, product_id: ProductId) -> Result<()>;
    /// Subtracts `quantity` only if at least that many units are on hand and
    /// returns the remaining stock.
    async fn decrement_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32>;
    async fn list_sales(&self) -> Result<Vec<Sale>>;
    async fn insert_sale(&self, sale: &NewSale) -> Result<Sale>;
    /// Inserts the sale and decrements the product's stock as one unit of
    /// work. Either both happen or neither does.
    async fn record_sale(&self, sale: &NewSale) -> Result<Sale>;
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn load_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, code, name, model, category, price, stock, created_at
             FROM products WHERE id = ?",
        )
        .bind(product_id.0.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(product_from_row).transpose()
    }
}

#[async_trait]
impl InventoryStore for Storage {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            "SELECT id, code, name, model, category, price, stock, created_at
             FROM products
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list products")?;
        rows.iter().map(product_from_row).collect()
    }

    async fn insert_product(&self, product: &Product) -> Result<Product> {
        let row = sqlx::query(
            "INSERT INTO products (id, code, name, model, category, price, stock, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id, code, name, model, category, price, stock, created_at",
        )
        .bind(product.id.0.to_string())
        .bind(product.code.as_deref())
        .bind(&product.name)
        .bind(product.model.as_deref())
        .bind(product.category.as_str())
        .bind(product.price)
        .bind(i64::from(product.stock))
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to insert product {}", product.id))?;
        product_from_row(&row)
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let affected = sqlx::query(
            "UPDATE products
             SET code = ?, name = ?, model = ?, category = ?, price = ?, stock = ?
             WHERE id = ?",
        )
        .bind(product.code.as_deref())
        .bind(&product.name)
        .bind(product.model.as_deref())
        .bind(product.category.as_str())
        .bind(product.price)
        .bind(i64::from(product.stock))
        .bind(product.id.0.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update product {}", product.id))?
        .rows_affected();
        if affected == 0 {
            return Err(MissingProduct(product.id).into());
        }
        Ok(())
    }

    async fn delete_product(&self, product_id: ProductId) -> Result<()> {
        let affected = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product_id.0.to_string())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete product {product_id}"))?
            .rows_affected();
        if affected == 0 {
            return Err(MissingProduct(product_id).into());
        }
        Ok(())
    }

    async fn decrement_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let mut conn = self.pool.acquire().await?;
        decrement_stock_on(&mut *conn, product_id, quantity).await
    }

    async fn list_sales(&self) -> Result<Vec<Sale>> {
        let rows = sqlx::query(
            "SELECT id, product_id, product_name, quantity, total, date
             FROM sales
             ORDER BY date DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list sales")?;
        rows.iter().map(sale_from_row).collect()
    }

    async fn insert_sale(&self, sale: &NewSale) -> Result<Sale> {
        let mut conn = self.pool.acquire().await?;
        insert_sale_on(&mut *conn, sale).await
    }

    async fn record_sale(&self, sale: &NewSale) -> Result<Sale> {
        let mut tx = self.pool.begin().await?;

        let remaining = decrement_stock_on(&mut *tx, sale.product_id, sale.quantity).await?;
        let stored = insert_sale_on(&mut *tx, sale).await?;

        tx.commit()
            .await
            .with_context(|| format!("failed to commit sale for product {}", sale.product_id))?;
        debug!(
            sale_id = %stored.id,
            product_id = %sale.product_id,
            remaining,
            "sale committed"
        );
        Ok(stored)
    }
}

async fn decrement_stock_on(
    conn: &mut SqliteConnection,
    product_id: ProductId,
    quantity: u32,
) -> Result<u32> {
    let id = product_id.0.to_string();
    let row = sqlx::query(
        "UPDATE products SET stock = stock - ?
         WHERE id = ? AND stock >= ?
         RETURNING stock",
    )
    .bind(i64::from(quantity))
    .bind(&id)
    .bind(i64::from(quantity))
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("failed to decrement stock of product {product_id}"))?;

    if let Some(row) = row {
        return stock_from_i64(row.try_get::<i64, _>(0)?);
    }

    let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut *conn)
        .await?;
    match available {
        Some(available) => {
            let available = stock_from_i64(available)?;
            warn!(%product_id, quantity, available, "stock decrement rejected");
            Err(StockShortfall {
                product_id,
                requested: quantity,
                available,
            }
            .into())
        }
        None => Err(MissingProduct(product_id).into()),
    }
}

async fn insert_sale_on(conn: &mut SqliteConnection, sale: &NewSale) -> Result<Sale> {
    let row = sqlx::query(
        "INSERT INTO sales (product_id, product_name, quantity, total, date)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id, product_id, product_name, quantity, total, date",
    )
    .bind(sale.product_id.0.to_string())
    .bind(&sale.product_name)
    .bind(i64::from(sale.quantity))
    .bind(sale.total)
    .bind(sale.date)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to insert sale for product {}", sale.product_id))?;
    sale_from_row(&row)
}

fn product_from_row(row: &SqliteRow) -> Result<Product> {
    Ok(Product {
        id: parse_product_id(&row.try_get::<String, _>(0)?)?,
        code: row.try_get::<Option<String>, _>(1)?,
        name: row.try_get::<String, _>(2)?,
        model: row.try_get::<Option<String>, _>(3)?,
        category: Category::from_stored(&row.try_get::<String, _>(4)?),
        price: row.try_get::<f64, _>(5)?,
        stock: stock_from_i64(row.try_get::<i64, _>(6)?)?,
        created_at: row.try_get::<DateTime<Utc>, _>(7)?,
    })
}

fn sale_from_row(row: &SqliteRow) -> Result<Sale> {
    let quantity = row.try_get::<i64, _>(3)?;
    Ok(Sale {
        id: SaleId(row.try_get::<i64, _>(0)?),
        product_id: parse_product_id(&row.try_get::<String, _>(1)?)?,
        product_name: row.try_get::<String, _>(2)?,
        quantity: u32::try_from(quantity)
            .map_err(|_| anyhow!("stored sale quantity {quantity} is out of range"))?,
        total: row.try_get::<f64, _>(4)?,
        date: row.try_get::<DateTime<Utc>, _>(5)?,
    })
}

fn parse_product_id(raw: &str) -> Result<ProductId> {
    Uuid::parse_str(raw)
        .map(ProductId)
        .with_context(|| format!("stored product id '{raw}' is not a uuid"))
}

fn stock_from_i64(stock: i64) -> Result<u32> {
    u32::try_from(stock).map_err(|_| anyhow!("stored stock {stock} is out of range"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
