use chrono::Utc;
use shared::domain::{Category, NewSale, Product, ProductId};
use storage::{InventoryStore, StockShortfall, Storage};

#[tokio::test]
async fn concurrent_sales_never_oversell_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        dir.path().join("pos.db").to_string_lossy().replace('\\', "/")
    );
    let storage = Storage::new(&database_url).await.expect("db");

    let product = storage
        .insert_product(&Product {
            id: ProductId::generate(),
            code: Some("777".into()),
            name: "Funda Silicona".into(),
            model: None,
            category: Category::Cases,
            price: 10.0,
            stock: 3,
            created_at: Utc::now(),
        })
        .await
        .expect("product");

    let mut handles = Vec::new();
    for _ in 0..5 {
        let storage = storage.clone();
        let sale = NewSale {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: 1,
            total: product.price,
            date: Utc::now(),
        };
        handles.push(tokio::spawn(
            async move { storage.record_sale(&sale).await },
        ));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => committed += 1,
            Err(err) => {
                // Writers that lose the race either see the shortfall or a busy database.
                if err.downcast_ref::<StockShortfall>().is_none() {
                    eprintln!("sale rejected: {err:#}");
                }
            }
        }
    }

    let sales = storage.list_sales().await.expect("sales");
    let remaining = storage
        .load_product(product.id)
        .await
        .expect("load")
        .expect("exists")
        .stock;

    assert!(committed <= 3);
    assert_eq!(sales.len(), committed);
    assert_eq!(remaining as usize, 3 - committed);
}
