use trawl_core::models::{Movie, PersistOutcome};
use trawl_core::traits::RecordStore;

use crate::integration::common::setup_test_db;

fn movie(id: i64) -> Movie {
    Movie {
        id,
        title: format!("Movie {id}"),
        year: "2004".into(),
        director: "周星驰".into(),
        rating: Some(8.9),
        url: format!("https://movie.douban.com/subject/{id}/"),
    }
}

#[tokio::test]
async fn insert_then_read_back() {
    let (db, _container) = setup_test_db().await;
    let repo = db.movie_repo();

    assert_eq!(repo.insert(&movie(1291543)).await, PersistOutcome::Created);

    let stored = repo
        .get(1291543)
        .await
        .unwrap()
        .expect("Should find the movie");
    assert_eq!(stored, movie(1291543));
}

#[tokio::test]
async fn missing_rating_is_stored_as_null() {
    let (db, _container) = setup_test_db().await;
    let repo = db.movie_repo();

    let mut unrated = movie(42);
    unrated.rating = None;
    assert_eq!(repo.insert(&unrated).await, PersistOutcome::Created);
    assert_eq!(repo.get(42).await.unwrap().unwrap().rating, None);
}

#[tokio::test]
async fn same_id_or_url_is_duplicate() {
    let (db, _container) = setup_test_db().await;
    let repo = db.movie_repo();

    assert_eq!(repo.insert(&movie(1)).await, PersistOutcome::Created);
    assert_eq!(repo.insert(&movie(1)).await, PersistOutcome::Duplicate);

    let mut same_url = movie(2);
    same_url.url = movie(1).url;
    assert_eq!(repo.insert(&same_url).await, PersistOutcome::Duplicate);

    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn invalid_movie_fails_without_touching_the_table() {
    let (db, _container) = setup_test_db().await;
    let repo = db.movie_repo();

    let mut untitled = movie(7);
    untitled.title = String::new();

    assert!(matches!(
        repo.persist(&untitled).await,
        PersistOutcome::Failed(_)
    ));
    assert_eq!(repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn concurrent_inserts_create_exactly_once() {
    let (db, _container) = setup_test_db().await;
    let repo = db.movie_repo();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let repo = repo.clone();
        tasks.spawn(async move { repo.persist(&movie(99)).await });
    }

    let mut created = 0;
    let mut duplicate = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            PersistOutcome::Created => created += 1,
            PersistOutcome::Duplicate => duplicate += 1,
            PersistOutcome::Failed(reason) => panic!("unexpected failure: {reason}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(duplicate, 7);
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[tokio::test]
async fn max_id_tracks_highest_subject() {
    let (db, _container) = setup_test_db().await;
    let repo = db.movie_repo();

    assert_eq!(repo.max_id().await.unwrap(), 0);

    for id in [30, 10, 20] {
        repo.insert(&movie(id)).await;
    }
    assert_eq!(repo.max_id().await.unwrap(), 30);
}
