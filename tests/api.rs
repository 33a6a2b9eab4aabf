use std::future::Future;
use std::sync::Arc;

use axum::http::{self, StatusCode};
use axum_test::TestServer;
use listing_views::api::{create_router, App, ViewResponse, SESSION_COOKIE};
use listing_views::auth::Authenticator;
use listing_views::model::{now, AccountId, Listing, ListingId, ViewCounters, ViewDelta};
use listing_views::service::{AnalyticsReport, QualityStatus, RecorderPolicy};
use listing_views::store::{self, AccountStore, ListingStore, MemoryStore, UnavailableSnafu};
use secrecy::SecretString;
use serde_json::Value;

const SECRET: &str = "integration-secret";

struct Harness {
    server: TestServer,
    store: MemoryStore,
    auth: Authenticator,
}

fn harness() -> Harness {
    let store = MemoryStore::new();
    store.insert(Listing::new("l1".into(), Some(AccountId::from("owner"))));

    let auth = Authenticator::new(SecretString::new(SECRET.to_string()));
    let app: Arc<App<MemoryStore>> = App::new(store.clone(), auth.clone(), RecorderPolicy::default());
    let server = TestServer::new(create_router(app)).expect("Failed to create test server");

    Harness { server, store, auth }
}

impl Harness {
    fn bearer(&self, account: &str, superuser: bool) -> http::HeaderValue {
        let token = self.auth.issue(account.into(), superuser).unwrap();
        http::HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    async fn view_as(&self, account: &str) -> axum_test::TestResponse {
        self.server
            .post("/listings/l1/views")
            .add_header(http::header::AUTHORIZATION, self.bearer(account, false))
            .await
    }
}

#[tokio::test]
async fn signed_in_view_is_counted_once_per_viewer() {
    let h = harness();

    let first = h.view_as("alice").await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let first: ViewResponse = first.json();
    assert!(first.accepted);
    assert!(first.is_unique_view);
    assert!(!first.is_owner_view);
    assert_eq!((first.view_count, first.unique_view_count), (1, 1));
    assert_eq!(first.reason, None);

    let second: ViewResponse = h.view_as("alice").await.json();
    assert!(second.accepted);
    assert!(!second.is_unique_view);
    assert_eq!((second.view_count, second.unique_view_count), (2, 1));
}

#[tokio::test]
async fn repeated_owner_view_is_rate_limited() {
    let h = harness();

    let first: ViewResponse = h.view_as("owner").await.json();
    assert!(first.accepted);
    assert!(first.is_owner_view);

    let second = h.view_as("owner").await;
    assert_eq!(second.status_code(), StatusCode::TOO_MANY_REQUESTS);

    let second: ViewResponse = second.json();
    assert!(!second.accepted);
    assert!(second.is_owner_view);
    assert_eq!(second.reason.as_deref(), Some("owner view rate limited"));
    assert_eq!(second.view_count, 1);
}

#[tokio::test]
async fn excessive_viewing_is_rejected() {
    let h = harness();

    for _ in 0..6 {
        assert_eq!(h.view_as("bob").await.status_code(), StatusCode::OK);
    }

    let rejected = h.view_as("bob").await;
    assert_eq!(rejected.status_code(), StatusCode::TOO_MANY_REQUESTS);

    let rejected: ViewResponse = rejected.json();
    assert_eq!(rejected.reason.as_deref(), Some("excessive viewing detected"));
    assert_eq!(rejected.view_count, 6);
}

#[tokio::test]
async fn anonymous_viewer_receives_a_session_cookie() {
    let h = harness();

    let first = h.server.post("/listings/l1/views").await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let session = first.cookie(SESSION_COOKIE);
    assert!(!session.value().is_empty());

    let first: ViewResponse = first.json();
    assert!(first.is_unique_view);

    // same session: counted, but not unique again
    let second: ViewResponse = h
        .server
        .post("/listings/l1/views")
        .add_cookie(session)
        .await
        .json();
    assert!(second.accepted);
    assert!(!second.is_unique_view);
    assert_eq!((second.view_count, second.unique_view_count), (2, 1));

    // no cookie: a fresh session, so a new unique view
    let third: ViewResponse = h.server.post("/listings/l1/views").await.json();
    assert!(third.is_unique_view);
    assert_eq!(third.unique_view_count, 2);
}

#[tokio::test]
async fn invalid_token_is_unauthorized() {
    let h = harness();

    let response = h
        .server
        .post("/listings/l1/views")
        .add_header(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer not-a-token"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(h.store.get(&"l1".into()).unwrap().view_count, 0);
}

#[tokio::test]
async fn unknown_and_deleted_listings_are_not_found() {
    let h = harness();

    let missing = h.server.post("/listings/nope/views").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    let body: Value = missing.json();
    assert_eq!(body["error"], "not_found");

    assert!(h.store.soft_delete(&"l1".into(), now()));

    assert_eq!(h.view_as("alice").await.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        h.server.get("/listings/l1/views").await.status_code(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn counters_are_public() {
    let h = harness();
    h.view_as("alice").await;
    h.view_as("alice").await;

    let response = h.server.get("/listings/l1/views").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let counters: ViewCounters = response.json();
    assert_eq!(counters.view_count, 2);
    assert_eq!(counters.unique_view_count, 1);
    assert!(counters.last_viewed_at.is_some());
}

#[tokio::test]
async fn analytics_require_owner_or_superuser() {
    let h = harness();
    h.view_as("alice").await;

    let anonymous = h.server.get("/listings/l1/analytics").await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);

    let stranger = h
        .server
        .get("/listings/l1/analytics")
        .add_header(http::header::AUTHORIZATION, h.bearer("mallory", false))
        .await;
    assert_eq!(stranger.status_code(), StatusCode::FORBIDDEN);

    let admin = h
        .server
        .get("/listings/l1/analytics")
        .add_header(http::header::AUTHORIZATION, h.bearer("admin", true))
        .await;
    assert_eq!(admin.status_code(), StatusCode::OK);

    let owner = h
        .server
        .get("/listings/l1/analytics")
        .add_header(http::header::AUTHORIZATION, h.bearer("owner", false))
        .await;
    assert_eq!(owner.status_code(), StatusCode::OK);

    let report: AnalyticsReport = owner.json();
    assert_eq!(report.listing_id.as_str(), "l1");
    assert_eq!(report.view_count, 1);
    assert_eq!(report.unique_view_count, 1);
    assert_eq!(report.view_quality_status, QualityStatus::Excellent);
    assert_eq!(report.owner_views, 0);
}

#[tokio::test]
async fn analytics_for_missing_listing_is_not_found() {
    let h = harness();

    let response = h
        .server
        .get("/listings/nope/analytics")
        .add_header(http::header::AUTHORIZATION, h.bearer("admin", true))
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

/// A backend whose counter writes always fail.
#[derive(Debug, Clone)]
struct FailingWrites(MemoryStore);

impl ListingStore for FailingWrites {
    fn find_listing(
        &self, id: &ListingId,
    ) -> impl Future<Output = store::Result<Option<Listing>>> + Send {
        self.0.find_listing(id)
    }

    fn apply_view(
        &self, _current: &Listing, _delta: &ViewDelta,
    ) -> impl Future<Output = store::Result<Option<Listing>>> + Send {
        async {
            UnavailableSnafu {
                store: "listings",
                message: "connection reset by 10.0.0.7",
            }
            .fail()
        }
    }
}

impl AccountStore for FailingWrites {
    fn increment_lifetime_views(
        &self, owner: &AccountId,
    ) -> impl Future<Output = store::Result<()>> + Send {
        self.0.increment_lifetime_views(owner)
    }
}

#[tokio::test]
async fn failed_write_is_an_internal_error_without_details() {
    let memory = MemoryStore::new();
    memory.insert(Listing::new("l1".into(), Some(AccountId::from("owner"))));

    let auth = Authenticator::new(SecretString::new(SECRET.to_string()));
    let app = App::new(FailingWrites(memory.clone()), auth, RecorderPolicy::default());
    let server = TestServer::new(create_router(app)).expect("Failed to create test server");

    let response = server.post("/listings/l1/views").await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = response.json();
    assert_eq!(body["error"], "internal");
    let message = body["message"].as_str().unwrap();
    assert!(!message.contains("10.0.0.7"));
    assert!(!message.contains("listings"));

    assert_eq!(memory.get(&"l1".into()).unwrap().view_count, 0);
}
