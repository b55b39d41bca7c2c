use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use rds_data_api::{
    BatchOptions, ClientOptions, DataApi, DataApiConfig, DataApiError, EndOptions,
    ExecuteOptions, HttpTransport, Params, Value,
};
use serde_json::{json, Value as JsonValue};

#[derive(Clone)]
struct MockResponse {
    status: StatusCode,
    body: JsonValue,
    delay: Duration,
}

impl MockResponse {
    fn ok(body: JsonValue) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: Duration::from_millis(0),
        }
    }

    fn status(status: StatusCode, body: JsonValue) -> Self {
        Self {
            status,
            body,
            delay: Duration::from_millis(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone, Default)]
struct MockState {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    requests: Arc<Mutex<Vec<(String, JsonValue)>>>,
}

async fn operation_handler(
    State(state): State<MockState>,
    Path(operation): Path<String>,
    Json(body): Json<JsonValue>,
) -> impl IntoResponse {
    state
        .requests
        .lock()
        .expect("request log mutex must not be poisoned")
        .push((operation, body));

    let response = {
        let mut queue = state
            .responses
            .lock()
            .expect("response queue mutex must not be poisoned");
        queue.pop_front().unwrap_or_else(|| {
            MockResponse::status(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"message": "no mock response available"}),
            )
        })
    };

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    (response.status, Json(response.body))
}

struct TestServer {
    base_url: String,
    state: MockState,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl TestServer {
    fn requests(&self) -> Vec<(String, JsonValue)> {
        self.state
            .requests
            .lock()
            .expect("request log mutex must not be poisoned")
            .clone()
    }

    fn api(&self) -> DataApi<HttpTransport> {
        let config = DataApiConfig::new("dummy")
            .resource_arn("arn:aws:rds:dummy")
            .database("test");
        DataApi::new(HttpTransport::new(&self.base_url), config).expect("valid config")
    }
}

async fn spawn_server(responses: Vec<MockResponse>) -> TestServer {
    let state = MockState {
        responses: Arc::new(Mutex::new(responses.into())),
        ..MockState::default()
    };

    let app = Router::new()
        .route("/:operation", post(operation_handler))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("must bind test listener");
    let address = listener.local_addr().expect("must have local addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("mock server must run");
    });

    TestServer {
        base_url: format!("http://{address}"),
        state,
        task,
    }
}

fn select_body() -> JsonValue {
    json!({
        "numberOfRecordsUpdated": 0,
        "records": [
            [{"longValue": 1}, {"stringValue": "cat"}],
            [{"longValue": 2}, {"blobValue": "Ynl0ZXM="}]
        ],
        "columnMetadata": [
            {"label": "id", "name": "id", "tableName": "pets", "type": 4, "typeName": "INT"},
            {"label": "name", "name": "name", "tableName": "pets", "type": 12, "typeName": "VARCHAR"}
        ]
    })
}

#[tokio::test]
async fn execute_sends_wire_request_and_decodes_records() {
    let server = spawn_server(vec![MockResponse::ok(select_body())]).await;
    let api = server.api();

    let result = api
        .execute(
            "SELECT id, name FROM pets WHERE id > :id",
            Params::new().bind("id", 0_i64),
        )
        .await
        .expect("execute must succeed");

    assert_eq!(result.len(), 2);
    assert_eq!(result.headers(), ["id", "name"]);
    assert_eq!(
        result.get(0).expect("row 0"),
        [Value::Long(1), Value::string("cat")]
    );
    assert_eq!(result.rows()[1][1], Value::bytes(b"bytes".to_vec()));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "Execute");
    assert_eq!(
        requests[0].1,
        json!({
            "resourceArn": "arn:aws:rds:dummy",
            "secretArn": "dummy",
            "sql": "SELECT id, name FROM pets WHERE id > :id",
            "database": "test",
            "parameters": [{"name": "id", "value": {"longValue": 0}}],
            "continueAfterTimeout": true,
            "includeResultMetadata": true
        })
    );
}

#[tokio::test]
async fn transaction_calls_hit_their_endpoints() {
    let server = spawn_server(vec![
        MockResponse::ok(json!({"transactionId": "abc"})),
        MockResponse::ok(json!({
            "numberOfRecordsUpdated": 1,
            "generatedFields": [{"longValue": 7}]
        })),
        MockResponse::ok(json!({"transactionStatus": "Transaction Committed"})),
    ])
    .await;
    let mut api = server.api();

    assert_eq!(api.begin().await.expect("begin"), "abc");
    let inserted = api
        .execute("INSERT INTO pets (name) VALUES ('dog')", ())
        .await
        .expect("insert");
    assert_eq!(inserted.number_of_records_updated(), 1);
    assert_eq!(inserted.generated_fields_first(), Some(&Value::Long(7)));
    assert_eq!(api.commit().await.expect("commit"), "Transaction Committed");
    assert_eq!(api.transaction_status(), Some("Transaction Committed"));
    assert!(api.transaction_id().is_none());

    let requests = server.requests();
    let operations: Vec<&str> = requests.iter().map(|(op, _)| op.as_str()).collect();
    assert_eq!(operations, ["BeginTransaction", "Execute", "CommitTransaction"]);
    assert_eq!(
        requests[0].1,
        json!({"resourceArn": "arn:aws:rds:dummy", "secretArn": "dummy", "database": "test"})
    );
    assert_eq!(requests[1].1["transactionId"], "abc");
    assert_eq!(
        requests[2].1,
        json!({"resourceArn": "arn:aws:rds:dummy", "secretArn": "dummy", "transactionId": "abc"})
    );
}

#[tokio::test]
async fn batch_execute_wraps_in_transaction() {
    let server = spawn_server(vec![
        MockResponse::ok(json!({"transactionId": "12345"})),
        MockResponse::ok(json!({"updateResults": [
            {"generatedFields": [{"longValue": 3}]},
            {"generatedFields": [{"longValue": 4}]}
        ]})),
        MockResponse::ok(json!({"transactionStatus": "Transaction Committed"})),
    ])
    .await;
    let mut api = server.api();

    let results = api
        .batch_execute(
            "INSERT INTO pets VALUES (:id, :name)",
            [
                Params::new().bind("id", 3_i64).bind("name", "bird"),
                Params::new().bind("id", 4_i64).bind("name", "lion"),
            ],
        )
        .await
        .expect("batch must succeed");

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].first(), Some(&Value::Long(3)));
    assert_eq!(results[1].first(), Some(&Value::Long(4)));

    let requests = server.requests();
    assert_eq!(requests[1].0, "BatchExecute");
    assert_eq!(
        requests[1].1,
        json!({
            "resourceArn": "arn:aws:rds:dummy",
            "secretArn": "dummy",
            "sql": "INSERT INTO pets VALUES (:id, :name)",
            "database": "test",
            "transactionId": "12345",
            "parameterSets": [
                [{"name": "id", "value": {"longValue": 3}}, {"name": "name", "value": {"stringValue": "bird"}}],
                [{"name": "id", "value": {"longValue": 4}}, {"name": "name", "value": {"stringValue": "lion"}}]
            ]
        })
    );
    assert_eq!(requests[2].0, "CommitTransaction");
}

#[tokio::test]
async fn service_error_surfaces_http_status() {
    let server = spawn_server(vec![MockResponse::status(
        StatusCode::BAD_REQUEST,
        json!({"message": "Table 'test.nope' doesn't exist"}),
    )])
    .await;
    let api = server.api();

    let err = api
        .execute("SELECT * FROM nope", ())
        .await
        .expect_err("execute must fail");

    match err {
        DataApiError::Http { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("doesn't exist"));
        }
        other => panic!("expected http error, got {other:?}"),
    }
}

#[tokio::test]
async fn retries_on_retryable_http_status() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::SERVICE_UNAVAILABLE, json!({"message": "busy"})),
        MockResponse::ok(json!({"numberOfRecordsUpdated": 2})),
    ])
    .await;

    let transport = HttpTransport::new(&server.base_url).with_options(ClientOptions {
        timeout_ms: 1_000,
        max_retries: 1,
        retry_backoff_ms: 1,
    });
    let api = DataApi::new(
        transport,
        DataApiConfig::new("dummy").resource_arn("arn:aws:rds:dummy"),
    )
    .expect("valid config");

    let result = api
        .execute("UPDATE pets SET name = 'renamed'", ())
        .await
        .expect("request must succeed after retry");

    assert_eq!(result.number_of_records_updated(), 2);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn request_timeout_surfaces_transport_error() {
    let server = spawn_server(vec![MockResponse::ok(json!({"numberOfRecordsUpdated": 1}))
        .with_delay(Duration::from_millis(150))])
    .await;

    let transport = HttpTransport::new(&server.base_url).with_options(ClientOptions {
        timeout_ms: 20,
        max_retries: 0,
        retry_backoff_ms: 1,
    });
    let api = DataApi::new(
        transport,
        DataApiConfig::new("dummy").resource_arn("arn:aws:rds:dummy"),
    )
    .expect("valid config");

    let err = api
        .execute("DELETE FROM pets", ())
        .await
        .expect_err("request must timeout");

    match err {
        DataApiError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_response_is_decode_error() {
    let server =
        spawn_server(vec![MockResponse::ok(json!({"records": [[{"mystery": 1}]]}))]).await;
    let api = server.api();

    let err = api
        .execute("SELECT 1", ())
        .await
        .expect_err("decode must fail");
    assert!(matches!(err, DataApiError::Decode(_)));
}

#[tokio::test]
async fn timed_out_batch_chunk_is_not_resubmitted() {
    let server = spawn_server(vec![
        MockResponse::ok(json!({"transactionId": "12345"})),
        MockResponse::ok(json!({"updateResults": [{"generatedFields": [{"longValue": 1}]}]}))
            .with_delay(Duration::from_millis(200)),
        MockResponse::ok(json!({"transactionStatus": "Rollback Complete"})),
    ])
    .await;

    let transport = HttpTransport::new(&server.base_url).with_options(ClientOptions {
        timeout_ms: 50,
        max_retries: 1,
        retry_backoff_ms: 1,
    });
    let mut api = DataApi::new(
        transport,
        DataApiConfig::new("dummy").resource_arn("arn:aws:rds:dummy"),
    )
    .expect("valid config");

    let err = api
        .batch_execute(
            "INSERT INTO pets (name) VALUES (:name)",
            [Params::new().bind("name", "bird")],
        )
        .await
        .expect_err("timed out chunk must fail the batch");
    match err {
        DataApiError::Transport(inner) => assert!(inner.is_timeout()),
        other => panic!("expected transport timeout error, got {other:?}"),
    }

    let requests = server.requests();
    let operations: Vec<&str> = requests.iter().map(|(op, _)| op.as_str()).collect();
    assert_eq!(
        operations,
        ["BeginTransaction", "BatchExecute", "RollbackTransaction"]
    );
    assert!(api.transaction_id().is_none());
}

#[tokio::test]
async fn internal_server_error_is_not_retried() {
    let server = spawn_server(vec![
        MockResponse::status(StatusCode::INTERNAL_SERVER_ERROR, json!({"message": "boom"})),
        MockResponse::ok(json!({"numberOfRecordsUpdated": 1})),
    ])
    .await;

    let transport = HttpTransport::new(&server.base_url).with_options(ClientOptions {
        timeout_ms: 1_000,
        max_retries: 3,
        retry_backoff_ms: 1,
    });
    let api = DataApi::new(
        transport,
        DataApiConfig::new("dummy").resource_arn("arn:aws:rds:dummy"),
    )
    .expect("valid config");

    let err = api
        .execute("UPDATE pets SET name = 'renamed'", ())
        .await
        .expect_err("500 must surface");

    assert!(matches!(err, DataApiError::Http { status: 500, .. }));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn per_call_identity_overrides_reach_every_request() {
    let server = spawn_server(vec![
        MockResponse::ok(json!({"numberOfRecordsUpdated": 0})),
        MockResponse::ok(json!({"transactionId": "other-tx"})),
        MockResponse::ok(json!({"updateResults": []})),
        MockResponse::ok(json!({"transactionStatus": "Transaction Committed"})),
        MockResponse::ok(json!({"transactionStatus": "Rollback Complete"})),
    ])
    .await;
    let mut api = server.api();

    api.execute_with(
        "SELECT 1",
        (),
        ExecuteOptions::default()
            .resource_arn("arn:aws:rds:other")
            .secret_arn("other-secret"),
    )
    .await
    .expect("execute");
    api.batch_execute_with(
        "INSERT INTO pets (name) VALUES (:name)",
        Vec::<Params>::new(),
        BatchOptions::default()
            .resource_arn("arn:aws:rds:other")
            .secret_arn("other-secret"),
    )
    .await
    .expect("batch");
    api.rollback_with(
        EndOptions::default()
            .transaction_id("stale")
            .resource_arn("arn:aws:rds:other"),
    )
    .await
    .expect("rollback");

    let requests = server.requests();
    let operations: Vec<&str> = requests.iter().map(|(op, _)| op.as_str()).collect();
    assert_eq!(
        operations,
        [
            "Execute",
            "BeginTransaction",
            "BatchExecute",
            "CommitTransaction",
            "RollbackTransaction"
        ]
    );
    for (_, body) in &requests[..4] {
        assert_eq!(body["resourceArn"], "arn:aws:rds:other");
        assert_eq!(body["secretArn"], "other-secret");
    }
    assert_eq!(requests[3].1["transactionId"], "other-tx");
    assert_eq!(requests[4].1["resourceArn"], "arn:aws:rds:other");
    assert_eq!(requests[4].1["secretArn"], "dummy");
    assert_eq!(requests[4].1["transactionId"], "stale");
}
