use crate::db::*;
use crate::error::{DatabaseError, Error};
use crate::types::JobId;
use tempfile::NamedTempFile;

async fn open_test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

fn sample_job(owner_id: i64, uri: &str) -> NewJob {
    NewJob {
        owner_id,
        source_uri: uri.to_string(),
        local_path: format!("/downloads/{}.bin", owner_id),
    }
}

#[tokio::test]
async fn test_insert_and_get_job() {
    let (db, _guard) = open_test_db().await;

    let id = db
        .create_job(&sample_job(1, "http://example.com/a.iso"))
        .await
        .unwrap();
    assert!(id.0 > 0);

    let job = db.get_job(id).await.unwrap().unwrap();
    assert_eq!(job.id, id);
    assert_eq!(job.owner_id, 1);
    assert_eq!(job.source_uri, "http://example.com/a.iso");
    assert_eq!(job.local_path, "/downloads/1.bin");
    assert!(!job.completed, "new jobs start incomplete");
    assert_eq!(job.last_error, "", "new jobs start with no error");
    assert!(job.created_at > 0);

    db.close().await;
}

#[tokio::test]
async fn test_get_missing_job_returns_none() {
    let (db, _guard) = open_test_db().await;

    let job = db.get_job(JobId(12345)).await.unwrap();
    assert!(job.is_none());

    db.close().await;
}

#[tokio::test]
async fn test_duplicate_submission_rejected() {
    let (db, _guard) = open_test_db().await;

    db.create_job(&sample_job(1, "http://example.com/a.iso"))
        .await
        .unwrap();

    let result = db.create_job(&sample_job(1, "http://example.com/a.iso")).await;
    match result {
        Err(Error::Database(DatabaseError::ConstraintViolation(msg))) => {
            assert!(
                msg.contains("http://example.com/a.iso"),
                "violation message should name the link, got: {}",
                msg
            );
        }
        other => panic!("expected ConstraintViolation, got: {:?}", other),
    }

    db.close().await;
}

#[tokio::test]
async fn test_same_link_different_owners_allowed() {
    let (db, _guard) = open_test_db().await;

    db.create_job(&sample_job(1, "http://example.com/a.iso"))
        .await
        .unwrap();
    let second = db
        .create_job(&sample_job(2, "http://example.com/a.iso"))
        .await;
    assert!(second.is_ok(), "uniqueness is per (owner, link), not per link");

    db.close().await;
}

#[tokio::test]
async fn test_find_job_by_owner_and_uri() {
    let (db, _guard) = open_test_db().await;

    let id = db
        .create_job(&sample_job(1, "http://example.com/a.iso"))
        .await
        .unwrap();

    let found = db
        .find_job(1, "http://example.com/a.iso")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, id);

    assert!(
        db.find_job(2, "http://example.com/a.iso")
            .await
            .unwrap()
            .is_none(),
        "another owner's lookup should not match"
    );

    db.close().await;
}

#[tokio::test]
async fn test_mark_completed() {
    let (db, _guard) = open_test_db().await;

    let id = db
        .create_job(&sample_job(1, "http://example.com/a.iso"))
        .await
        .unwrap();
    db.mark_completed(id).await.unwrap();

    let job = db.get_job(id).await.unwrap().unwrap();
    assert!(job.completed);

    db.close().await;
}

#[tokio::test]
async fn test_mark_error_overwrites_previous() {
    let (db, _guard) = open_test_db().await;

    let id = db
        .create_job(&sample_job(1, "http://example.com/a.iso"))
        .await
        .unwrap();

    db.mark_error(id, "first failure").await.unwrap();
    db.mark_error(id, "second failure").await.unwrap();

    let job = db.get_job(id).await.unwrap().unwrap();
    assert_eq!(
        job.last_error, "second failure",
        "last_error is overwritten, not appended"
    );

    db.close().await;
}

#[tokio::test]
async fn test_mark_on_missing_job_is_not_found() {
    let (db, _guard) = open_test_db().await;

    let result = db.mark_completed(JobId(999)).await;
    assert!(matches!(
        result,
        Err(Error::Database(DatabaseError::NotFound(_)))
    ));

    let result = db.mark_error(JobId(999), "boom").await;
    assert!(matches!(
        result,
        Err(Error::Database(DatabaseError::NotFound(_)))
    ));

    db.close().await;
}

#[tokio::test]
async fn test_jobs_for_owner_pagination() {
    let (db, _guard) = open_test_db().await;

    for i in 0..5 {
        db.create_job(&NewJob {
            owner_id: 1,
            source_uri: format!("http://example.com/{}.bin", i),
            local_path: format!("/downloads/{}.bin", i),
        })
        .await
        .unwrap();
    }
    // Another owner's job must not leak into the listing
    db.create_job(&sample_job(2, "http://example.com/other.bin"))
        .await
        .unwrap();

    let first_page = db.jobs_for_owner(1, 0, 2).await.unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(first_page[0].source_uri, "http://example.com/0.bin");
    assert_eq!(first_page[1].source_uri, "http://example.com/1.bin");

    let second_page = db.jobs_for_owner(1, 1, 2).await.unwrap();
    assert_eq!(second_page.len(), 2);
    assert_eq!(second_page[0].source_uri, "http://example.com/2.bin");

    let last_page = db.jobs_for_owner(1, 2, 2).await.unwrap();
    assert_eq!(last_page.len(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_reopen_preserves_jobs() {
    let temp_file = NamedTempFile::new().unwrap();

    let db = Database::new(temp_file.path()).await.unwrap();
    let id = db
        .create_job(&sample_job(1, "http://example.com/a.iso"))
        .await
        .unwrap();
    db.close().await;

    // Records survive a restart; migrations must not re-run destructively
    let db = Database::new(temp_file.path()).await.unwrap();
    let job = db.get_job(id).await.unwrap();
    assert!(job.is_some(), "job should survive close and reopen");
    db.close().await;
}
