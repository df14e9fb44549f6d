//! End-to-end flow over the store and the envelope correlation, without
//! the Telegram transport.

use savol_relay::relay;
use savol_relay::storage::{Database, RequestStatus, Role};

fn temp_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("relay.db")).expect("open db");
    (dir, db)
}

#[tokio::test]
async fn request_without_responders_stays_pending() {
    let (_dir, db) = temp_db();
    db.ensure_user(555, None, Some("Bemor".into())).await;

    let request_id = db
        .add_request(555, 1, "tizzamda og'riq bor".into())
        .await
        .unwrap();

    // Nobody to fan out to; the row simply waits.
    assert!(db.responders().await.unwrap().is_empty());
    let listed = db.user_requests(555, 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].request_id, request_id);
    assert_eq!(listed[0].status, RequestStatus::Pending);
    assert_eq!(relay::preview(&listed[0].body, 50), "tizzamda og'riq bor");
}

#[tokio::test]
async fn responder_reply_is_correlated_back_to_the_request() {
    let (_dir, db) = temp_db();
    db.ensure_user(555, None, Some("Aziza Karimova".into())).await;
    assert!(db.add_responder(777, Some("doc".into()), Some("Dr. Olim".into())).await);

    let request_id = db
        .add_request(555, 10, "bosh og'rig'i haqida savol".into())
        .await
        .unwrap();

    // What the responder pool receives.
    let envelope = relay::render_request_envelope(
        "Aziza Karimova",
        555,
        "bosh og'rig'i haqida savol",
        request_id,
    );

    // The responder replies to the envelope; the id is recovered from the
    // quoted text, never from any side channel.
    let recovered = relay::extract_request_id(&envelope).expect("token present");
    assert_eq!(recovered, request_id);

    let request = db.get_request(recovered).await.unwrap().expect("known id");
    assert_eq!(request.user_id, 555);

    db.add_response(recovered, 777, 20, "ko'proq suv iching".into())
        .await
        .unwrap();

    let request = db.get_request(recovered).await.unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Answered);
    assert_eq!(
        db.user_requests(555, 10).await.unwrap()[0].status,
        RequestStatus::Answered
    );

    let answer = relay::render_answer("Dr. Olim", &request.body, "ko'proq suv iching");
    assert!(answer.contains("Dr. Olim"));
    assert!(answer.contains("ko'proq suv iching"));
}

#[tokio::test]
async fn unknown_correlation_token_persists_nothing() {
    let (_dir, db) = temp_db();
    db.add_responder(777, None, None).await;

    // Reply quoted a message without any token.
    assert_eq!(relay::extract_request_id("shunchaki xabar"), None);

    // A token pointing at a request that does not exist is also rejected
    // before anything is written.
    let ghost = relay::extract_request_id("ID savol: 424242").unwrap();
    assert!(db.get_request(ghost).await.unwrap().is_none());
}

#[tokio::test]
async fn promoted_then_demoted_responder_loses_reply_privileges() {
    let (_dir, db) = temp_db();
    db.ensure_user(777, Some("doc".into()), None).await;

    assert!(db.add_responder(777, None, None).await);
    assert_eq!(
        db.get_user(777).await.unwrap().unwrap().role,
        Role::Responder
    );

    assert!(db.remove_responder(777).await);
    assert_eq!(db.get_user(777).await.unwrap().unwrap().role, Role::Regular);
}
