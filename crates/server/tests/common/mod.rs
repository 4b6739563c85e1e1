//! In-process test fixture: the real router over a temp database, a
//! controllable clock and operator-key authentication.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use queueline_core::{
    create_audit_system, testing::FixedClock, ApiKeyAuthenticator, AuditStore, AuthConfig,
    AuthMethod, Config, DatabaseConfig, QueueConfig, QueueService, ServerConfig,
    SqliteAuditStore, SqliteQueueStore,
};
use queueline_server::api::{create_router, WsBroadcaster};
use queueline_server::state::AppState;

pub const OPERATOR_KEY: &str = "test-operator-key";

pub struct TestFixture {
    pub router: Router,
    pub clock: Arc<FixedClock>,
    pub broadcaster: WsBroadcaster,
    pub audit_store: Arc<dyn AuditStore>,
    pub temp_dir: TempDir,
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Who a request is sent as.
#[derive(Debug, Clone, Copy)]
pub enum As {
    Customer,
    Operator,
    WrongKey,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let config = Config {
            auth: AuthConfig {
                method: AuthMethod::ApiKey,
                api_key: Some(OPERATOR_KEY.to_string()),
            },
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0,
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            queue: QueueConfig::default(),
        };

        let audit_store: Arc<dyn AuditStore> =
            Arc::new(SqliteAuditStore::new(&db_path).expect("Failed to create audit store"));
        let (audit_handle, audit_writer) = create_audit_system(Arc::clone(&audit_store), 100);
        tokio::spawn(audit_writer.run());

        let clock = Arc::new(FixedClock::on(2026, 10, 19));
        let store = SqliteQueueStore::with_config(&db_path, &config.queue)
            .expect("Failed to create queue store");
        let queue = QueueService::new(Arc::new(store), clock.clone())
            .with_audit(audit_handle);

        let broadcaster = WsBroadcaster::default();
        let state = Arc::new(AppState::new(
            config,
            Arc::new(ApiKeyAuthenticator::new(OPERATOR_KEY.to_string())),
            queue,
            Arc::clone(&audit_store),
            broadcaster.clone(),
        ));

        Self {
            router: create_router(state),
            clock,
            broadcaster,
            audit_store,
            temp_dir,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, As::Customer, None).await
    }

    pub async fn get_as(&self, path: &str, who: As) -> TestResponse {
        self.request("GET", path, who, None).await
    }

    pub async fn post_as(&self, path: &str, who: As) -> TestResponse {
        self.request("POST", path, who, None).await
    }

    pub async fn post_json_as(&self, path: &str, who: As, body: &str) -> TestResponse {
        self.request("POST", path, who, Some(body)).await
    }

    pub async fn take_ticket(&self) -> Value {
        let response = self.post_as("/api/v1/queue/tickets", As::Customer).await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body
    }

    pub async fn advance(&self, mark_completed: bool) -> TestResponse {
        let body = format!(r#"{{"mark_completed": {}}}"#, mark_completed);
        self.post_json_as("/api/v1/queue/advance", As::Operator, &body)
            .await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        who: As,
        body: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        builder = match who {
            As::Customer => builder,
            As::Operator => builder.header("Authorization", format!("Bearer {}", OPERATOR_KEY)),
            As::WrongKey => builder.header("X-API-Key", "not-the-key"),
        };

        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

#[macro_export]
macro_rules! assert_status {
    ($response:expr, $expected:expr) => {
        assert_eq!(
            $response.status, $expected,
            "unexpected status, body: {}",
            $response.body
        );
    };
}
