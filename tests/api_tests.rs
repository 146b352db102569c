//! HTTP surface tests: routing, session extraction and error bodies

mod common;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use bartr_server::auth::SessionVerifier;
    use bartr_server::bartr::BartrDetail;
    use bartr_server::client::ChatPoller;
    use bartr_server::models::{Profile, User, UserRole};
    use bartr_server::notification::{NotificationSink, StoreNotificationSink};
    use bartr_server::store::{MarketStore, MemoryStore};
    use bartr_server::{api_router, AppState};

    use crate::common::Market;

    const SECRET: &str = "api-test-secret";
    const COOKIE: &str = "bartr_session";

    struct Harness {
        market: Market,
        router: Router,
        sessions: Arc<SessionVerifier>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let dyn_store: Arc<dyn MarketStore> = store.clone();
            let notifier: Arc<dyn NotificationSink> =
                Arc::new(StoreNotificationSink::new(dyn_store.clone()));
            let sessions = Arc::new(SessionVerifier::new(SECRET, COOKIE));

            let state = AppState::new(dyn_store, notifier.clone(), sessions.clone(), true);
            Self {
                market: Market::with_notifier(store, notifier),
                router: api_router(state),
                sessions,
            }
        }

        fn token(&self, user: &User) -> String {
            self.sessions
                .issue(user.id, user.role, chrono::Duration::hours(1))
                .unwrap()
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            read(response).await
        }
    }

    async fn read(response: axum::response::Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn listing_body(title: &str) -> Value {
        json!({
            "title": title,
            "description": "Barely used",
            "category": "Sports",
            "condition": "Good",
            "listingType": "BARTER",
        })
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let harness = Harness::new();

        let (status, body) = harness.send(Method::GET, "/bartrs", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = harness
            .send(Method::GET, "/notifications", Some("not-a-jwt"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;
        let stale = harness
            .sessions
            .issue(alice.id, alice.role, chrono::Duration::hours(-2))
            .unwrap();

        let (status, body) = harness
            .send(Method::GET, "/bartrs", Some(&stale), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Unauthorized: Session has expired");
    }

    #[tokio::test]
    async fn test_session_cookie_is_accepted() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;

        let request = Request::builder()
            .uri("/bartrs")
            .header(header::COOKIE, format!("{}={}", COOKIE, harness.token(&alice)))
            .body(Body::empty())
            .unwrap();
        let (status, body) = read(harness.router.clone().oneshot(request).await.unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_propose_and_fetch_bartr() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;
        let bea = harness.market.user("Bea").await;
        let bike = harness.market.listing(&bea, "Red Bike").await;
        let alice_token = harness.token(&alice);

        let (status, created) = harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&alice_token),
                Some(json!({ "listingId": bike.id, "message": "Swap for my guitar?" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "PENDING");
        assert_eq!(created["receiverId"], json!(bea.id));
        assert_eq!(created["initiatorConfirmed"], false);

        let id = created["id"].as_str().unwrap().to_string();
        let (status, detail) = harness
            .send(Method::GET, &format!("/bartrs/{}", id), Some(&alice_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["listing"]["title"], "Red Bike");
        assert_eq!(detail["receiver"]["name"], "Bea");
        assert_eq!(detail["messages"], json!([]));

        let (status, listed) = harness
            .send(Method::GET, "/bartrs", Some(&harness.token(&bea)), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_statuses_follow_domain_errors() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;
        let bea = harness.market.user("Bea").await;
        let stranger = harness.market.user("Sam").await;
        let bike = harness.market.listing(&bea, "Red Bike").await;
        let alice_token = harness.token(&alice);

        // Unknown bartr
        let (status, body) = harness
            .send(
                Method::GET,
                &format!("/bartrs/{}", Uuid::new_v4()),
                Some(&alice_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        // Own listing
        let (status, body) = harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&harness.token(&bea)),
                Some(json!({ "listingId": bike.id })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (_, created) = harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&alice_token),
                Some(json!({ "listingId": bike.id })),
            )
            .await;
        let id = created["id"].as_str().unwrap().to_string();

        // Not a party
        let (status, body) = harness
            .send(
                Method::GET,
                &format!("/bartrs/{}", id),
                Some(&harness.token(&stranger)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        // Initiator cannot accept
        let (status, _) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/accept", id),
                Some(&alice_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_guest_cannot_mutate() {
        let harness = Harness::new();
        let guest = harness.market.user_with_role("Gus", UserRole::Guest).await;
        let bea = harness.market.user("Bea").await;
        let bike = harness.market.listing(&bea, "Red Bike").await;
        let token = harness.token(&guest);

        let (status, _) = harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&token),
                Some(json!({ "listingId": bike.id })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = harness
            .send(Method::POST, "/listings", Some(&token), Some(listing_body("Kite")))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // Browsing stays open
        let (status, _) = harness.send(Method::GET, "/listings", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_trade_completes_over_http() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;
        let bea = harness.market.user("Bea").await;
        let bike = harness.market.listing(&bea, "Red Bike").await;
        let guitar = harness.market.listing(&alice, "Old Guitar").await;
        let (alice_token, bea_token) = (harness.token(&alice), harness.token(&bea));

        let (_, created) = harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&alice_token),
                Some(json!({ "listingId": bike.id, "offeredListingId": guitar.id })),
            )
            .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (status, accepted) = harness
            .send(Method::POST, &format!("/bartrs/{}/accept", id), Some(&bea_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "ACCEPTED");

        let (status, half) = harness
            .send(Method::POST, &format!("/bartrs/{}/complete", id), Some(&alice_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(half["status"], "ACCEPTED");
        assert_eq!(half["initiatorConfirmed"], true);

        let (status, reset) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/complete?reset=true", id),
                Some(&bea_token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reset["initiatorConfirmed"], false);

        for token in [&alice_token, &bea_token] {
            harness
                .send(Method::POST, &format!("/bartrs/{}/complete", id), Some(token), None)
                .await;
        }

        let (_, detail) = harness
            .send(Method::GET, &format!("/bartrs/{}", id), Some(&alice_token), None)
            .await;
        assert_eq!(detail["status"], "COMPLETED");
        assert!(detail["completedAt"].is_string());
        assert_eq!(detail["listing"]["status"], "TRADED");
        assert_eq!(detail["offeredListing"]["status"], "TRADED");

        let (status, profile) = harness
            .send(Method::GET, &format!("/users/{}", alice.id), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["bartrCount"], 1);

        let (status, review) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/reviews", id),
                Some(&alice_token),
                Some(json!({ "rating": 5, "comment": "Great swap" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(review["revieweeId"], json!(bea.id));

        let (status, _) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/reviews", id),
                Some(&alice_token),
                Some(json!({ "rating": 4 })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, reviews) = harness
            .send(Method::GET, &format!("/users/{}/reviews", bea.id), None, None)
            .await;
        assert_eq!(reviews.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chat_and_close_deal_over_http() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;
        let bea = harness.market.user("Bea").await;
        let bike = harness.market.listing(&bea, "Red Bike").await;
        let (alice_token, bea_token) = (harness.token(&alice), harness.token(&bea));

        let (_, created) = harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&alice_token),
                Some(json!({ "listingId": bike.id })),
            )
            .await;
        let id = created["id"].as_str().unwrap().to_string();
        harness
            .send(Method::POST, &format!("/bartrs/{}/accept", id), Some(&bea_token), None)
            .await;

        let (status, message) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/messages", id),
                Some(&alice_token),
                Some(json!({ "content": "Meet Saturday?" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(message["messageType"], "TEXT");
        assert_eq!(message["sender"]["name"], "Alice");

        let (status, _) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/messages", id),
                Some(&alice_token),
                Some(json!({ "content": "", "messageType": "TEXT" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/messages", id),
                Some(&bea_token),
                Some(json!({ "content": "Let's close it", "messageType": "CLOSE_DEAL_REQUEST" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, answered) = harness
            .send(
                Method::POST,
                &format!("/bartrs/{}/close-deal", id),
                Some(&alice_token),
                Some(json!({ "accept": true })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(answered["message"]["messageType"], "CLOSE_DEAL_ACCEPTED");
        assert_eq!(answered["bartr"]["status"], "COMPLETED");

        let (_, messages) = harness
            .send(Method::GET, &format!("/bartrs/{}/messages", id), Some(&bea_token), None)
            .await;
        let kinds: Vec<&str> = messages
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["messageType"].as_str().unwrap())
            .collect();
        assert_eq!(kinds, ["TEXT", "CLOSE_DEAL_REQUEST", "CLOSE_DEAL_ACCEPTED"]);
    }

    #[tokio::test]
    async fn test_listing_crud() {
        let harness = Harness::new();
        let bea = harness.market.user("Bea").await;
        let alice = harness.market.user("Alice").await;
        let token = harness.token(&bea);

        let (status, created) = harness
            .send(Method::POST, "/listings", Some(&token), Some(listing_body("  Red Bike ")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["title"], "Red Bike");
        assert_eq!(created["status"], "ACTIVE");
        let id = created["id"].as_str().unwrap().to_string();

        let (_, found) = harness
            .send(Method::GET, "/listings?search=bike&category=Sports", None, None)
            .await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["user"]["name"], "Bea");

        let (status, _) = harness
            .send(
                Method::PATCH,
                &format!("/listings/{}", id),
                Some(&harness.token(&alice)),
                Some(listing_body("Stolen Bike")),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, updated) = harness
            .send(
                Method::PATCH,
                &format!("/listings/{}", id),
                Some(&token),
                Some(listing_body("Blue Bike")),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Blue Bike");

        let (status, deleted) = harness
            .send(Method::DELETE, &format!("/listings/{}", id), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["status"], "INACTIVE");

        let (_, found) = harness.send(Method::GET, "/listings", None, None).await;
        assert_eq!(found, json!([]));
    }

    #[tokio::test]
    async fn test_listing_edit_keeps_clears_or_replaces_optional_fields() {
        let harness = Harness::new();
        let bea = harness.market.user("Bea").await;
        let token = harness.token(&bea);

        let mut body = listing_body("Red Bike");
        body["swapPreferences"] = json!("Camping gear");
        body["imageUrl"] = json!("https://img.example.com/bike.png");
        let (_, created) = harness
            .send(Method::POST, "/listings", Some(&token), Some(body))
            .await;
        let uri = format!("/listings/{}", created["id"].as_str().unwrap());

        // Left out: both kept
        let (status, kept) = harness
            .send(Method::PATCH, &uri, Some(&token), Some(listing_body("Red Bike")))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(kept["swapPreferences"], "Camping gear");
        assert_eq!(kept["imageUrl"], "https://img.example.com/bike.png");

        // Blank: both cleared
        let mut body = listing_body("Red Bike");
        body["swapPreferences"] = json!("");
        body["imageUrl"] = json!("");
        let (status, cleared) = harness.send(Method::PATCH, &uri, Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cleared["swapPreferences"], Value::Null);
        assert_eq!(cleared["imageUrl"], Value::Null);

        // Given: both replaced
        let mut body = listing_body("Red Bike");
        body["swapPreferences"] = json!("Books");
        body["imageUrl"] = json!("https://img.example.com/bike-2.png");
        let (_, replaced) = harness.send(Method::PATCH, &uri, Some(&token), Some(body)).await;
        assert_eq!(replaced["swapPreferences"], "Books");
        assert_eq!(replaced["imageUrl"], "https://img.example.com/bike-2.png");
    }

    #[tokio::test]
    async fn test_user_profile_includes_profile_details() {
        let harness = Harness::new();
        let bea = harness.market.user("Bea").await;
        let alice = harness.market.user("Alice").await;
        let since = bea.created_at - chrono::Duration::days(365);
        harness
            .market
            .store
            .insert_profile(Profile {
                user_id: bea.id,
                bio: Some("Fixes bikes on weekends".to_string()),
                location: Some("Leeds".to_string()),
                member_since: since,
                created_at: bea.created_at,
                updated_at: bea.created_at,
            })
            .await;

        let (status, profile) = harness
            .send(Method::GET, &format!("/users/{}", bea.id), None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["bio"], "Fixes bikes on weekends");
        assert_eq!(profile["location"], "Leeds");
        assert_eq!(profile["memberSince"], serde_json::to_value(since).unwrap());
        assert!(profile.get("email").is_none());

        // No profile row: member since signup
        let (_, profile) = harness
            .send(Method::GET, &format!("/users/{}", alice.id), None, None)
            .await;
        assert_eq!(profile["bio"], Value::Null);
        assert_eq!(
            profile["memberSince"],
            serde_json::to_value(alice.created_at).unwrap()
        );

        let (status, body) = harness
            .send(Method::GET, &format!("/users/{}", Uuid::new_v4()), None, None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Resource not found: User");
    }

    #[tokio::test]
    async fn test_invalid_listing_payload_is_rejected() {
        let harness = Harness::new();
        let bea = harness.market.user("Bea").await;

        let mut body = listing_body("Red Bike");
        body["imageUrl"] = json!("not a url");
        let (status, body) = harness
            .send(Method::POST, "/listings", Some(&harness.token(&bea)), Some(body))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_notifications_inbox() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;
        let bea = harness.market.user("Bea").await;
        let bike = harness.market.listing(&bea, "Red Bike").await;
        let bea_token = harness.token(&bea);

        harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&harness.token(&alice)),
                Some(json!({ "listingId": bike.id })),
            )
            .await;

        let (status, inbox) = harness
            .send(Method::GET, "/notifications?unread=true", Some(&bea_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(inbox[0]["type"], "BARTR_REQUEST");
        assert_eq!(inbox[0]["message"], "Someone wants to trade for your Red Bike");
        let id = inbox[0]["id"].as_str().unwrap().to_string();

        // Only the addressee can mark it read
        let (status, _) = harness
            .send(
                Method::POST,
                &format!("/notifications/{}/read", id),
                Some(&harness.token(&alice)),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, read) = harness
            .send(Method::POST, &format!("/notifications/{}/read", id), Some(&bea_token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["read"], true);

        let (_, inbox) = harness
            .send(Method::GET, "/notifications?unread=true", Some(&bea_token), None)
            .await;
        assert_eq!(inbox, json!([]));
    }

    #[tokio::test]
    async fn test_health_and_security_headers() {
        let harness = Harness::new();

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = harness.router.clone().oneshot(request).await.unwrap();

        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        let (status, body) = read(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_chat_poller_fetches_detail() {
        let harness = Harness::new();
        let alice = harness.market.user("Alice").await;
        let bea = harness.market.user("Bea").await;
        let bike = harness.market.listing(&bea, "Red Bike").await;
        let token = harness.token(&alice);

        let (_, created) = harness
            .send(
                Method::POST,
                "/bartrs",
                Some(&token),
                Some(json!({ "listingId": bike.id })),
            )
            .await;
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = harness.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let poller = ChatPoller::new(format!("http://{}", addr), token);
        let detail: BartrDetail = poller.fetch(id).await.unwrap();
        assert_eq!(detail.bartr.id, id);
        assert_eq!(detail.listing.unwrap().title, "Red Bike");

        let stranger = harness.market.user("Sam").await;
        let outsider = ChatPoller::new(format!("http://{}", addr), harness.token(&stranger));
        assert!(outsider.fetch(id).await.is_err());
    }
}
