use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use pos_core::{PointOfSale, SalesSummary};
use serde::Serialize;
use shared::{
    domain::{Category, Product, ProductDraft, ProductId, ProductPatch, Sale},
    error::{ErrorReport, StoreError},
};
use storage::Storage;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use config::{load_settings, normalize_database_url};
use console::{ConsoleNotifier, PromptConfirm};

#[derive(Parser, Debug)]
#[command(name = "pos", about = "Inventory and sales register for the shop counter")]
struct Cli {
    /// Config file; defaults to ./pos.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Answer yes to confirmation prompts.
    #[arg(long, short = 'y', global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the inventory, newest first.
    Products {
        #[arg(long)]
        low_stock: bool,
        #[arg(long, conflicts_with = "low_stock")]
        available: bool,
    },
    /// Add a product.
    Add(ProductArgs),
    /// Change fields of a product, addressed by id or PLU code.
    Edit {
        product: String,
        #[command(flatten)]
        fields: ProductArgs,
    },
    /// Delete a product. Its sales are kept.
    Delete { product: String },
    /// Register a sale, addressed by id or PLU code.
    Sell {
        product: String,
        #[arg(long, short = 'q', default_value_t = 1)]
        quantity: u32,
    },
    /// Sale history, newest first.
    Sales {
        #[arg(long)]
        today: bool,
    },
    /// Today's and all-time takings.
    Summary,
    /// Find a product by PLU code.
    Lookup { code: String },
    /// List the accepted categories.
    Categories,
}

#[derive(Args, Debug, Default)]
struct ProductArgs {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    stock: Option<String>,
    #[arg(long)]
    code: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    category: Option<Category>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(url) = &cli.database_url {
        settings.database_url = normalize_database_url(url);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let storage = Storage::new(&settings.database_url).await.map_err(|error| {
        error!(
            database_url = %settings.database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let pos = PointOfSale::new(
        Arc::new(storage),
        Arc::new(PromptConfirm {
            assume_yes: cli.yes,
        }),
        Arc::new(ConsoleNotifier { quiet: cli.json }),
        settings.pos_options(),
    );
    pos.load().await?;

    let json = cli.json;
    match run(&pos, cli.command, json).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                if let Some(store_err) = err.downcast_ref::<StoreError>() {
                    print_json(&ErrorReport::from(store_err))?;
                }
            }
            Err(err)
        }
    }
}

async fn run(pos: &PointOfSale, command: Command, json: bool) -> Result<()> {
    let catalog = pos.catalog();
    let ledger = pos.ledger();

    match command {
        Command::Products {
            low_stock,
            available,
        } => {
            let products = if low_stock {
                catalog.low_stock().await
            } else if available {
                catalog.available_products().await
            } else {
                catalog.products().await
            };
            if json {
                print_json(&products)?;
            } else {
                print_products(&products, catalog.low_stock_threshold());
            }
        }
        Command::Add(args) => {
            let draft = ProductDraft {
                code: args.code,
                name: args.name.unwrap_or_default(),
                model: args.model,
                category: args.category,
                price: args.price,
                stock: args.stock,
            };
            let product = catalog.add_product(draft).await?;
            emit_product(&product, json)?;
        }
        Command::Edit { product, fields } => {
            let id = resolve_product(pos, &product).await?;
            let patch = ProductPatch {
                code: fields.code,
                name: fields.name,
                model: fields.model,
                category: fields.category,
                price: fields.price,
                stock: fields.stock,
            };
            if patch.is_empty() {
                bail!("nothing to change; pass at least one field");
            }
            let product = catalog.edit_product(id, patch).await?;
            emit_product(&product, json)?;
        }
        Command::Delete { product } => {
            let id = resolve_product(pos, &product).await?;
            let deleted = catalog.delete_product(id).await?;
            if json {
                print_json(&serde_json::json!({ "product_id": id, "deleted": deleted }))?;
            } else if !deleted {
                println!("cancelled");
            }
        }
        Command::Sell { product, quantity } => {
            let id = resolve_product(pos, &product).await?;
            let sale = ledger.record_sale(id, quantity).await?;
            if json {
                print_json(&sale)?;
            } else {
                print_sales(std::slice::from_ref(&sale));
            }
        }
        Command::Sales { today } => {
            let sales = if today {
                ledger.todays_sales().await
            } else {
                ledger.sales().await
            };
            if json {
                print_json(&sales)?;
            } else {
                print_sales(&sales);
            }
        }
        Command::Summary => {
            let summary = ledger.summary().await;
            if json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
        }
        Command::Lookup { code } => match catalog.find_by_code(&code).await {
            Some(product) => emit_product(&product, json)?,
            None => bail!("no product with code '{code}'"),
        },
        Command::Categories => {
            if json {
                print_json(&Category::ALL)?;
            } else {
                for category in Category::ALL {
                    println!("{category}");
                }
            }
        }
    }

    Ok(())
}

/// Accepts a product id or, failing that, a PLU code.
async fn resolve_product(pos: &PointOfSale, selector: &str) -> Result<ProductId> {
    if let Ok(id) = selector.parse::<ProductId>() {
        return Ok(id);
    }
    match pos.catalog().find_by_code(selector.trim()).await {
        Some(product) => Ok(product.id),
        None => bail!("no product with id or code '{selector}'"),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn emit_product(product: &Product, json: bool) -> Result<()> {
    if json {
        print_json(product)
    } else {
        print_products(std::slice::from_ref(product), 0);
        Ok(())
    }
}

fn print_products(products: &[Product], low_stock_threshold: u32) {
    if products.is_empty() {
        println!("no products");
        return;
    }
    println!(
        "{:<36}  {:<8}  {:<28}  {:<10}  {:>9}  {:>6}",
        "ID", "CODE", "PRODUCT", "CATEGORY", "PRICE", "STOCK"
    );
    for p in products {
        let label = match &p.model {
            Some(model) => format!("{} ({model})", p.name),
            None => p.name.clone(),
        };
        let marker = if p.stock < low_stock_threshold { " !" } else { "" };
        println!(
            "{:<36}  {:<8}  {:<28}  {:<10}  {:>9.2}  {:>6}{marker}",
            p.id,
            p.code.as_deref().unwrap_or("-"),
            label,
            p.category,
            p.price,
            p.stock,
        );
    }
}

fn print_sales(sales: &[Sale]) {
    if sales.is_empty() {
        println!("no sales");
        return;
    }
    println!(
        "{:>6}  {:<16}  {:<28}  {:>5}  {:>9}",
        "SALE", "DATE", "PRODUCT", "QTY", "TOTAL"
    );
    for s in sales {
        println!(
            "{:>6}  {:<16}  {:<28}  {:>5}  {:>9.2}",
            s.id,
            s.date.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            s.product_name,
            s.quantity,
            s.total,
        );
    }
}

fn print_summary(summary: &SalesSummary) {
    println!(
        "today:    {:>9.2}  ({} sales)",
        summary.today_total, summary.today_count
    );
    println!(
        "all time: {:>9.2}  ({} sales)",
        summary.all_time_total, summary.all_time_count
    );
}

#[cfg(test)]
mod tests {
    use pos_core::{AlwaysConfirm, PosOptions, RecordingNotifier};

    use super::*;

    async fn pos() -> PointOfSale {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        PointOfSale::new(
            Arc::new(storage),
            Arc::new(AlwaysConfirm),
            Arc::new(RecordingNotifier::default()),
            PosOptions::default(),
        )
    }

    #[test]
    fn parses_sell_with_code_and_quantity() {
        let cli = Cli::try_parse_from(["pos", "--json", "sell", "12345", "-q", "3"]).expect("parse");
        assert!(cli.json);
        match cli.command {
            Command::Sell { product, quantity } => {
                assert_eq!(product, "12345");
                assert_eq!(quantity, 3);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_add_with_category() {
        let cli = Cli::try_parse_from([
            "pos",
            "add",
            "--name",
            "Funda Silicona",
            "--price",
            "10",
            "--stock",
            "5",
            "--category",
            "cases",
        ])
        .expect("parse");
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.category, Some(Category::Cases));
                assert_eq!(args.stock.as_deref(), Some("5"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(Cli::try_parse_from(["pos", "add", "--category", "hats"]).is_err());
    }

    #[tokio::test]
    async fn resolves_products_by_id_or_code() {
        let pos = pos().await;
        let product = pos
            .catalog()
            .add_product(ProductDraft::new("Funda Silicona", 10, 5).with_code("12345"))
            .await
            .expect("add");

        let by_code = resolve_product(&pos, "12345").await.expect("code");
        let by_id = resolve_product(&pos, &product.id.to_string())
            .await
            .expect("id");
        assert_eq!(by_code, product.id);
        assert_eq!(by_id, product.id);
        assert!(resolve_product(&pos, "99999").await.is_err());
    }

    #[tokio::test]
    async fn sell_command_updates_the_register() {
        let pos = pos().await;
        pos.catalog()
            .add_product(ProductDraft::new("Funda Silicona", 10, 5).with_code("12345"))
            .await
            .expect("add");

        run(
            &pos,
            Command::Sell {
                product: "12345".into(),
                quantity: 3,
            },
            true,
        )
        .await
        .expect("sell");

        let summary = pos.ledger().summary().await;
        assert_eq!(summary.today_count, 1);
        assert_eq!(summary.today_total, 30.0);
        assert_eq!(
            pos.catalog().find_by_code("12345").await.expect("exists").stock,
            2
        );
    }

    #[tokio::test]
    async fn edit_without_fields_is_refused() {
        let pos = pos().await;
        pos.catalog()
            .add_product(ProductDraft::new("Cable", 3, 10).with_code("C1"))
            .await
            .expect("add");

        let err = run(
            &pos,
            Command::Edit {
                product: "C1".into(),
                fields: ProductArgs::default(),
            },
            false,
        )
        .await
        .expect_err("empty patch");
        assert!(err.to_string().contains("nothing to change"));
    }
}
