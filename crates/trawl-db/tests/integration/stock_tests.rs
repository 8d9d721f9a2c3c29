use trawl_core::models::{BatchReport, PersistOutcome, Stock};
use trawl_core::traits::{BatchStore, RecordStore};

use crate::integration::common::setup_test_db;

fn listing() -> Vec<Stock> {
    vec![
        Stock::new("BABA", "阿里巴巴", "中国"),
        Stock::new("JD", "京东", "中国"),
        Stock::new("AAPL", "苹果", "科技"),
    ]
}

#[tokio::test]
async fn fresh_batch_is_all_created() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    let report = repo.upsert_batch(&listing()).await.unwrap();

    assert_eq!(
        report,
        BatchReport {
            created: 3,
            duplicate: 0,
            failed: 0
        }
    );
    assert_eq!(repo.count().await.unwrap(), 3);
}

#[tokio::test]
async fn batch_with_existing_symbols_reports_duplicates() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    repo.upsert_batch(&listing()[..1]).await.unwrap();
    let report = repo.upsert_batch(&listing()).await.unwrap();

    assert_eq!(
        report,
        BatchReport {
            created: 2,
            duplicate: 1,
            failed: 0
        }
    );
}

#[tokio::test]
async fn repeated_batch_is_idempotent() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    repo.upsert_batch(&listing()).await.unwrap();
    let report = BatchStore::upsert_batch(&repo, &listing()).await.unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.duplicate, 3);
    assert_eq!(repo.count().await.unwrap(), 3);
}

#[tokio::test]
async fn upsert_refreshes_fields_and_updated_at() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    repo.upsert_batch(&listing()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    repo.upsert_batch(&[Stock::new("AAPL", "苹果公司", "硬件")])
        .await
        .unwrap();

    assert_eq!(
        repo.get("AAPL").await.unwrap(),
        Some(Stock::new("AAPL", "苹果公司", "硬件"))
    );

    let (refreshed,): (bool,) =
        sqlx::query_as("SELECT updated_at > created_at FROM stocks WHERE symbol = 'AAPL'")
            .fetch_one(db.pool())
            .await
            .unwrap();
    assert!(refreshed);
}

#[tokio::test]
async fn invalid_and_repeated_rows_within_a_batch() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    let report = repo
        .upsert_batch(&[
            Stock::new("NIO", "蔚来", "中国"),
            Stock::new("", "无代码", "中国"),
            Stock::new("NIO", "蔚来汽车", "中国"),
        ])
        .await
        .unwrap();

    assert_eq!(
        report,
        BatchReport {
            created: 1,
            duplicate: 0,
            failed: 1
        }
    );
    assert_eq!(repo.get("NIO").await.unwrap().unwrap().name, "蔚来汽车");
}

#[tokio::test]
async fn empty_batch_touches_nothing() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    assert_eq!(repo.upsert_batch(&[]).await.unwrap(), BatchReport::default());
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn single_upsert_reports_created_then_duplicate() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    let stock = Stock::new("TSLA", "特斯拉", "汽车");
    assert_eq!(repo.upsert(&stock).await.unwrap(), PersistOutcome::Created);
    assert_eq!(repo.upsert(&stock).await.unwrap(), PersistOutcome::Duplicate);
}

#[tokio::test]
async fn invalid_last_occurrence_drops_the_symbol() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    let report = repo
        .upsert_batch(&[
            Stock::new("BABA", "阿里巴巴", "中国"),
            Stock::new("JD", "京东", "中国"),
            Stock::new("BABA", "", "中国"),
        ])
        .await
        .unwrap();

    assert_eq!(
        report,
        BatchReport {
            created: 1,
            duplicate: 0,
            failed: 1
        }
    );
    assert_eq!(repo.get("BABA").await.unwrap(), None);
}

#[tokio::test]
async fn long_symbol_is_stored() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    let symbol = "W".repeat(64);
    let report = repo
        .upsert_batch(&[Stock::new(symbol.as_str(), "权证", "其他"), listing()[0].clone()])
        .await
        .unwrap();

    assert_eq!(report.created, 2);
    assert!(repo.get(&symbol).await.unwrap().is_some());
}

#[tokio::test]
async fn max_id_tracks_highest_row() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    assert_eq!(repo.max_id().await.unwrap(), 0);

    repo.upsert_batch(&listing()).await.unwrap();
    let after_first = repo.max_id().await.unwrap();
    assert!(after_first >= 3);

    repo.upsert(&Stock::new("NIO", "蔚来", "中国")).await.unwrap();
    assert!(repo.max_id().await.unwrap() > after_first);
}

#[tokio::test]
async fn persist_through_record_store() {
    let (db, _container) = setup_test_db().await;
    let repo = db.stock_repo();

    let stock = Stock::new("PDD", "拼多多", "中国");
    assert_eq!(RecordStore::persist(&repo, &stock).await, PersistOutcome::Created);
    assert_eq!(RecordStore::persist(&repo, &stock).await, PersistOutcome::Duplicate);
    assert!(matches!(
        RecordStore::persist(&repo, &Stock::new("PDD", "", "中国")).await,
        PersistOutcome::Failed(_)
    ));
    assert_eq!(repo.get("PDD").await.unwrap(), Some(stock));
}
