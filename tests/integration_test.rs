use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use flight_surety::oracle::testing::MockOracleContract;
use flight_surety::oracle::RegistrationPolicy;
use flight_surety::storage::{checkpoint_key, Checkpoint, CheckpointStore, MemoryCheckpointStore};
use flight_surety::types::{Address, OracleRequest, U256};
use flight_surety::{router, ApiState, Config, RelayNode};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_address() -> Address {
    Address::from_bytes([0xee; 20])
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.api.enabled = false;
    config.storage.in_memory = true;
    config.relay.pool_size = 3;
    config.relay.poll_interval_ms = 10;
    config.relay.batch_blocks = 10;
    config.relay.shutdown_grace = 5;
    config.relay.seed = Some(7);
    config
}

fn scripted_contract() -> MockOracleContract {
    MockOracleContract::with_accounts(4)
        .indexes_for(0, [1, 2, 3])
        .indexes_for(1, [4, 5, 6])
        .indexes_for(2, [1, 7, 8])
}

fn request(index: u8, flight: &str) -> OracleRequest {
    OracleRequest {
        index,
        airline: Address::from_bytes([0xaa; 20]),
        flight: flight.to_string(),
        timestamp: U256::from(1_700_000_000u64),
    }
}

fn key() -> String {
    checkpoint_key("localhost", &format!("{:x}", app_address()))
}

async fn wait_for_submissions(mock: &MockOracleContract, count: usize) {
    for _ in 0..500 {
        if mock.submissions().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} submissions, saw {}", count, mock.submissions().len());
}

#[tokio::test]
async fn test_relay_node_answers_requests() {
    let mock = Arc::new(scripted_contract());
    mock.push_request(3, 0, request(1, "ND1309"));
    mock.push_request(12, 0, request(5, "ND1310"));
    let store = Arc::new(MemoryCheckpointStore::new());

    let node = RelayNode::with_contract(test_config(), mock.clone(), app_address(), store.clone());
    let shutdown = node.shutdown_handle();
    let handle = tokio::spawn(node.run());

    // index 1 -> oracles 0 and 2, index 5 -> oracle 1
    wait_for_submissions(&mock, 3).await;
    shutdown.send(()).unwrap();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.requests, 2);
    assert_eq!(summary.submissions, 3);
    assert_eq!(summary.failed_submissions, 0);

    // only the first three accounts joined the pool
    assert_eq!(mock.registrations(), mock.accounts_slice()[..3].to_vec());
    assert!(mock
        .paid_fees()
        .iter()
        .all(|fee| *fee == U256::exp10(18)));

    // one status code per event
    let submissions = mock.submissions();
    let first: Vec<_> = submissions
        .iter()
        .filter(|s| s.request.flight == "ND1309")
        .collect();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].status, first[1].status);

    assert_eq!(store.load(&key()).unwrap().unwrap().next_block, 13);
}

#[tokio::test]
async fn test_relay_node_resumes_from_checkpoint() {
    let mock = Arc::new(scripted_contract());
    mock.push_request(2, 0, request(1, "ALREADY_SEEN"));
    mock.push_request(7, 0, request(4, "NEW"));
    let store = Arc::new(MemoryCheckpointStore::new());
    store.save(&key(), Checkpoint::new(5)).unwrap();

    let node = RelayNode::with_contract(test_config(), mock.clone(), app_address(), store.clone());
    let shutdown = node.shutdown_handle();
    let handle = tokio::spawn(node.run());

    wait_for_submissions(&mock, 1).await;
    shutdown.send(()).unwrap();
    let summary = handle.await.unwrap().unwrap();

    assert_eq!(summary.requests, 1);
    assert_eq!(mock.log_queries()[0], (5, 7));
    assert!(mock
        .submissions()
        .iter()
        .all(|s| s.request.flight == "NEW"));
    assert_eq!(summary.next_block, Some(8));
}

#[tokio::test]
async fn test_registration_failure_aborts_startup() {
    let mock = Arc::new(scripted_contract().fail_registration(1));
    let store = Arc::new(MemoryCheckpointStore::new());

    let node = RelayNode::with_contract(test_config(), mock.clone(), app_address(), store);
    let err = node.run().await.unwrap_err();
    assert!(format!("{:#}", err).contains("Oracle bootstrap failed"));
    assert!(mock.submissions().is_empty());
}

#[tokio::test]
async fn test_registration_failure_can_be_skipped() {
    let mock = Arc::new(scripted_contract().fail_registration(1));
    mock.push_request(1, 0, request(4, "ND1309"));
    let store = Arc::new(MemoryCheckpointStore::new());

    let mut config = test_config();
    config.relay.registration_policy = RegistrationPolicy::Skip;

    let node = RelayNode::with_contract(config, mock.clone(), app_address(), store);
    let shutdown = node.shutdown_handle();
    let handle = tokio::spawn(node.run());

    // account 1 held index 4 but never registered
    for _ in 0..50 {
        if !mock.log_queries().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.send(()).unwrap();

    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.requests, 1);
    assert_eq!(summary.submissions, 0);
    assert_eq!(mock.registrations().len(), 2);
}

#[tokio::test]
async fn test_metrics_are_served_by_the_api() {
    let mock = Arc::new(scripted_contract());
    mock.push_request(1, 0, request(1, "ND1309"));
    let store = Arc::new(MemoryCheckpointStore::new());

    let node = RelayNode::with_contract(test_config(), mock.clone(), app_address(), store);
    let registry = node.registry().clone();
    let shutdown = node.shutdown_handle();
    let handle = tokio::spawn(node.run());

    wait_for_submissions(&mock, 2).await;
    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let response = router(ApiState::new(registry))
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("oracles_registered 3"));
    assert!(text.contains("oracle_requests_total 1"));
    assert!(text.contains("oracle_responses_submitted_total 2"));
}
