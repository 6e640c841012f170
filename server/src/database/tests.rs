use super::*;

use crate::testing::{insert_user, test_database};
use hatch::bucket::Bucket;
use hatch::hash::Hash;
use hatch::testing::fake_token;

fn record(uploader: i64) -> UploadRecord {
    UploadRecord {
        id: UploadId::generate(),
        bucket: Bucket::Pfps,
        content_hash: Some(Hash::sha256_from_bytes(b"hello")),
        filename: "me.png".to_string(),
        mime: "image/webp".to_string(),
        uploader_id: uploader,
        upload_timestamp: Some(1_700_000_000),
        size_bytes: Some(5),
        width: Some(256),
        height: Some(128),
    }
}

#[tokio::test]
async fn test_index_and_find_upload() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_database(dir.path()).await;
    let user = insert_user(&db, "alice", false, true).await;

    let record = record(user.id);
    db.index_upload(&record).await.unwrap();

    let row = db.find_upload(&record.id).await.unwrap();
    assert_eq!(Bucket::Pfps, row.bucket().unwrap());
    assert_eq!(record, row.to_record().unwrap());

    assert!(matches!(
        db.find_upload(&UploadId::generate()).await,
        Err(ServerError::NoSuchUpload)
    ));
}

#[tokio::test]
async fn test_provisional_record_is_not_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_database(dir.path()).await;
    let user = insert_user(&db, "alice", false, true).await;

    let mut record = record(user.id);
    record.content_hash = None;
    record.size_bytes = None;

    assert!(db.index_upload(&record).await.is_err());
    assert!(matches!(
        db.find_upload(&record.id).await,
        Err(ServerError::NoSuchUpload)
    ));
}

#[tokio::test]
async fn test_find_user_by_token() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_database(dir.path()).await;
    let user = insert_user(&db, "alice", false, true).await;

    let (_, hash) = fake_token("alice");
    assert_eq!(Some(user), db.find_user_by_token(&hash).await.unwrap());

    let (_, other) = fake_token("mallory");
    assert_eq!(None, db.find_user_by_token(&other).await.unwrap());
}

#[tokio::test]
async fn test_set_project_thumbnail_checks_author() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_database(dir.path()).await;
    let alice = insert_user(&db, "alice", false, true).await;
    let bob = insert_user(&db, "bob", false, true).await;

    let thumbnail = UploadId::generate();
    let project = db
        .insert_project(
            alice.id,
            "Pong".to_string(),
            "A game".to_string(),
            &thumbnail,
            &UploadId::generate(),
        )
        .await
        .unwrap();

    assert_eq!(Some(thumbnail.as_str().to_string()), project.thumbnail);

    let replacement = UploadId::generate();
    assert!(!db
        .set_project_thumbnail(project.id, bob.id, &replacement)
        .await
        .unwrap());
    assert_eq!(
        Some(thumbnail.as_str().to_string()),
        db.find_project(project.id).await.unwrap().thumbnail
    );

    assert!(db
        .set_project_thumbnail(project.id, alice.id, &replacement)
        .await
        .unwrap());
    assert_eq!(
        Some(replacement.as_str().to_string()),
        db.find_project(project.id).await.unwrap().thumbnail
    );

    assert!(matches!(
        db.find_project(project.id + 100).await,
        Err(ServerError::NotFound)
    ));
}

#[tokio::test]
async fn test_set_profile_picture() {
    let dir = tempfile::tempdir().unwrap();
    let db = test_database(dir.path()).await;
    let user = insert_user(&db, "alice", false, true).await;
    assert_eq!(None, user.profile_picture);

    let id = UploadId::generate();
    db.set_profile_picture(user.id, &id).await.unwrap();

    let (_, hash) = fake_token("alice");
    let user = db.find_user_by_token(&hash).await.unwrap().unwrap();
    assert_eq!(Some(id.as_str().to_string()), user.profile_picture);
}
