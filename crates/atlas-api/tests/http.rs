use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use atlas_api::messages::MAX_ATTACHMENT_SIZE;
use atlas_api::routes::router;
use atlas_api::state::{AppState, AppStateInner};
use atlas_api::storage::Storage;
use atlas_db::Database;

struct TestApp {
    router: Router,
    state: AppState,
    dir: PathBuf,
}

impl TestApp {
    async fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("atlas-http-{}", Uuid::new_v4()));
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            storage: Storage::new(dir.clone()).await.unwrap(),
            jwt_secret: "test-secret".into(),
            token_days: 1,
        });
        Self {
            router: router(state.clone()),
            state,
            dir,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let (status, bytes) = self.send(req).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Registers `username` and returns (user id, token).
    async fn register(&self, username: &str) -> (String, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "password": "FunGuy123!",
                    "password_confirm": "FunGuy123!",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["user_id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    fn grant(&self, username: &str) {
        assert!(self.state.db.set_can_add_mushroom(username, true).unwrap());
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[tokio::test]
async fn register_then_login() {
    let app = TestApp::new().await;
    let (user_id, _) = app.register("houbar").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "houbar", "password": "FunGuy123!" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id);
    let token = body["token"].as_str().unwrap();

    let (status, profile) = app.get("/profile", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "houbar");
    assert_eq!(profile["can_add_mushroom"], false);

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "username": "houbar", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = TestApp::new().await;
    app.register("houbar").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({
                "username": "houbar",
                "password": "FunGuy123!",
                "password_confirm": "FunGuy123!",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_registration_lists_fields() {
    let app = TestApp::new().await;
    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "username": "x", "password": "short", "password_confirm": "other" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["username"].is_array());
    assert!(body["fields"]["password"].is_array());
    assert!(body["fields"]["password_confirm"].is_array());
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;
    let (status, _) = app.get("/profile", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/messages/inbox", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The catalogue itself is public.
    let (status, body) = app.get("/mushrooms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn catalogue_writes_need_permission() {
    let app = TestApp::new().await;
    let (_, token) = app.register("houbar").await;

    let mushroom = json!({ "name_cz": "Hřib smrkový", "name_latin": "Boletus edulis", "edibility": "edible" });
    let (status, _) = app.post("/mushrooms", &token, mushroom.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.grant("houbar");

    let (status, family) = app
        .post("/families", &token, json!({ "name": "Hřibovité", "name_latin": "Boletaceae" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, habitat) = app.post("/habitats", &token, json!({ "name": "Smrčina" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut boletus = mushroom;
    boletus["family"] = family["id"].clone();
    boletus["habitats"] = json!([habitat["id"]]);
    let (status, created) = app.post("/mushrooms", &token, boletus).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["habitats"][0]["name"], "Smrčina");

    let (status, _) = app
        .post(
            "/mushrooms",
            &token,
            json!({ "name_cz": "Muchomůrka zelená", "name_latin": "Amanita phalloides", "edibility": "poisonous" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, edible) = app.get("/mushrooms?edibility=edible", None).await;
    assert_eq!(edible.as_array().unwrap().len(), 1);
    assert_eq!(edible[0]["name_latin"], "Boletus edulis");

    let uri = format!("/mushrooms?habitat={}", habitat["id"].as_str().unwrap());
    let (_, in_habitat) = app.get(&uri, None).await;
    assert_eq!(in_habitat.as_array().unwrap().len(), 1);

    let uri = format!("/families/{}", family["id"].as_str().unwrap());
    let (status, detail) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["mushrooms"].as_array().unwrap().len(), 1);

    let (_, home) = app.get("/", None).await;
    assert_eq!(home["mushrooms"], 2);
    assert_eq!(home["families"], 1);

    // Unknown references are field errors, not server errors.
    let (status, body) = app
        .post(
            "/mushrooms",
            &token,
            json!({ "name_cz": "Liška", "name_latin": "Cantharellus cibarius", "family": Uuid::new_v4() }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["family"].is_array());
}

#[tokio::test]
async fn recipes_are_rated_once_per_user() {
    let app = TestApp::new().await;
    let (_, cook) = app.register("kuchar").await;
    let (_, guest) = app.register("host").await;

    let (status, recipe) = app
        .post(
            "/recipes",
            &cook,
            json!({ "title": "Smaženice", "ingredients": "houby, vejce", "instructions": "Osmažit." }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(recipe["rating"], 0.0);
    let id = recipe["id"].as_str().unwrap();
    let ratings = format!("/recipes/{id}/ratings");

    let (status, rated) = app.post(&ratings, &cook, json!({ "value": 4 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(rated["rating"], 4.0);

    let (status, _) = app.post(&ratings, &cook, json!({ "value": 5 })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.post(&ratings, &guest, json!({ "value": 9 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, rated) = app.post(&ratings, &guest, json!({ "value": 5 })).await;
    assert_eq!(rated["rating"], 4.5);
    assert_eq!(rated["num_ratings"], 2);

    let (_, good) = app.get("/recipes?min_rating=4.5", None).await;
    assert_eq!(good.as_array().unwrap().len(), 1);
    let (_, great) = app.get("/recipes?min_rating=4.6", None).await;
    assert_eq!(great, json!([]));

    let missing = format!("/recipes/{}/ratings", Uuid::new_v4());
    let (status, _) = app.post(&missing, &guest, json!({ "value": 3 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recipe_owner_sees_and_clears_new_comments() {
    let app = TestApp::new().await;
    let (_, cook) = app.register("kuchar").await;
    let (_, guest) = app.register("host").await;

    let (_, recipe) = app
        .post(
            "/recipes",
            &cook,
            json!({ "title": "Kulajda", "ingredients": "houby, smetana", "instructions": "Uvařit." }),
        )
        .await;
    let id = recipe["id"].as_str().unwrap();

    let (status, comment) = app
        .post(&format!("/recipes/{id}/comments"), &guest, json!({ "text": "Výborné!" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, unread) = app.get("/comments/unread", Some(&cook)).await;
    assert_eq!(unread, json!({ "findings": 0, "recipes": 1 }));

    let read = format!("/comments/recipes/{}/read", comment["id"].as_str().unwrap());
    let (status, _) = app.call(Method::POST, &read, Some(&guest), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::POST, &read, Some(&cook), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, unread) = app.get("/comments/unread", Some(&cook)).await;
    assert_eq!(unread["recipes"], 0);

    let (_, detail) = app.get(&format!("/recipes/{id}"), None).await;
    assert_eq!(detail["comments"][0]["text"], "Výborné!");
    assert_eq!(detail["comments"][0]["new"], false);
    // The created response carries the stored timestamp.
    assert_eq!(detail["comments"][0]["created_at"], comment["created_at"]);
    assert_eq!(comment["author_username"], "host");
}

#[tokio::test]
async fn mailbox_trash_restore_and_purge() {
    let app = TestApp::new().await;
    let (_, alice) = app.register("alice").await;
    let (bob_id, bob) = app.register("bob").await;
    let (_, carol) = app.register("carol").await;

    let (status, sent) = app
        .post("/messages", &alice, json!({ "receiver": bob_id, "content": "Našla jsem hřiby!" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sent["subject"], "No Subject");
    let id = sent["id"].as_str().unwrap().to_string();

    let (_, inbox) = app.get("/messages/inbox", Some(&bob)).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["is_read"], false);

    let (status, detail) = app.get(&format!("/messages/{id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["is_read"], true);

    // Strangers can neither see nor touch it.
    let (status, _) = app.get(&format!("/messages/{id}"), Some(&carol)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::POST, &format!("/messages/{id}/trash"), Some(&carol), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, update) = app.call(Method::POST, &format!("/messages/{id}/trash"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(update["party"], "receiver");
    assert_eq!(update["state"], "trashed");

    let (_, inbox) = app.get("/messages/inbox", Some(&bob)).await;
    assert_eq!(inbox, json!([]));
    let (_, trash) = app.get("/messages/trash", Some(&bob)).await;
    assert_eq!(trash.as_array().unwrap().len(), 1);
    // The sender's outbox is unaffected.
    let (_, outbox) = app.get("/messages/outbox", Some(&alice)).await;
    assert_eq!(outbox.as_array().unwrap().len(), 1);

    let (_, update) = app.call(Method::POST, &format!("/messages/{id}/restore"), Some(&bob), None).await;
    assert_eq!(update["state"], "active");

    let (_, update) = app.call(Method::POST, &format!("/messages/{id}/delete"), Some(&bob), None).await;
    assert_eq!(update["state"], "deleted");
    assert_eq!(update["purged"], false);

    // Deleted is final for that party.
    let (status, _) = app.call(Method::POST, &format!("/messages/{id}/restore"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/messages/{id}"), Some(&bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&format!("/messages/{id}"), Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.call(Method::POST, &format!("/messages/{id}/read"), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, update) = app.call(Method::POST, &format!("/messages/{id}/delete"), Some(&alice), None).await;
    assert_eq!(update["purged"], true);
    assert!(app.state.db.get_message(&id).unwrap().is_none());
}

#[tokio::test]
async fn bulk_delete_trash_only_touches_trashed_messages() {
    let app = TestApp::new().await;
    let (_, alice) = app.register("alice").await;
    let (bob_id, bob) = app.register("bob").await;

    let mut ids = vec![];
    for n in 0..3 {
        let (_, sent) = app
            .post("/messages", &alice, json!({ "receiver": bob_id, "content": format!("zpráva {n}") }))
            .await;
        ids.push(sent["id"].clone());
    }

    let (_, bulk) = app
        .post("/messages/bulk/trash", &bob, json!({ "message_ids": [ids[0], ids[1]] }))
        .await;
    assert_eq!(bulk, json!({ "updated": 2, "purged": 0, "skipped": 0 }));

    let (_, bulk) = app
        .post("/messages/bulk/delete-trash", &bob, json!({ "message_ids": ids }))
        .await;
    assert_eq!(bulk, json!({ "updated": 2, "purged": 0, "skipped": 1 }));

    let (_, inbox) = app.get("/messages/inbox", Some(&bob)).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["content"], "zpráva 2");

    let (status, _) = app.post("/messages/bulk/trash", &bob, json!({ "message_ids": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sending_to_yourself_is_rejected() {
    let app = TestApp::new().await;
    let (alice_id, alice) = app.register("alice").await;

    let (status, body) = app
        .post("/messages", &alice, json!({ "receiver": alice_id, "content": "ahoj" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["receiver"].is_array());
}

#[tokio::test]
async fn attachments_upload_download_and_forward() {
    let app = TestApp::new().await;
    let (_, alice) = app.register("alice").await;
    let (bob_id, bob) = app.register("bob").await;
    let (carol_id, carol) = app.register("carol").await;

    let (_, sent) = app
        .post("/messages", &alice, json!({ "receiver": bob_id, "subject": "Mapa", "content": "Tady rostou." }))
        .await;
    let id = sent["id"].as_str().unwrap().to_string();

    let upload = |token: &str| {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/messages/{id}/attachments?filename=mapa.gpx"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(Body::from("<gpx/>"))
            .unwrap()
    };

    let (status, _) = app.send(upload(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, bytes) = app.send(upload(&alice)).await;
    assert_eq!(status, StatusCode::CREATED);
    let attachment: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(attachment["file_name"], "mapa.gpx");
    assert_eq!(attachment["size"], 6);

    let download = Request::builder()
        .uri(format!("/messages/{id}/attachments/{}", attachment["id"].as_str().unwrap()))
        .header(header::AUTHORIZATION, format!("Bearer {bob}"))
        .body(Body::empty())
        .unwrap();
    let (status, bytes) = app.send(download).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"<gpx/>");

    let (status, forwarded) = app
        .post(&format!("/messages/{id}/forward"), &bob, json!({ "receiver": carol_id }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(forwarded["subject"], "Fwd: Mapa");
    assert_eq!(forwarded["content"], "Tady rostou.");
    let copy = &forwarded["attachments"][0];
    assert_eq!(copy["sha256"], attachment["sha256"]);
    assert_ne!(copy["id"], attachment["id"]);

    let (status, reply) = app
        .post(&format!("/messages/{id}/reply"), &bob, json!({ "content": "Díky!" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["subject"], "RE: Mapa");
    assert_eq!(reply["receiver_username"], "alice");
    assert_eq!(reply["replied_to"], id);

    let (_, carol_inbox) = app.get("/messages/inbox", Some(&carol)).await;
    assert_eq!(carol_inbox.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn oversized_attachment_is_rejected_with_json_413() {
    let app = TestApp::new().await;
    let (_, alice) = app.register("alice").await;
    let (bob_id, _) = app.register("bob").await;

    let (_, sent) = app
        .post("/messages", &alice, json!({ "receiver": bob_id, "content": "Fotky." }))
        .await;
    let id = sent["id"].as_str().unwrap();

    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("/messages/{id}/attachments?filename=a.bin"))
        .header(header::AUTHORIZATION, format!("Bearer {alice}"))
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from(vec![0u8; MAX_ATTACHMENT_SIZE + 1]))
        .unwrap();
    let (status, bytes) = app.send(req).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "Payload too large");

    let (_, detail) = app.get(&format!("/messages/{id}"), Some(&alice)).await;
    assert_eq!(detail["attachments"], json!([]));
}
