//! 端到端管线测试：接收 -> 队列 -> 持久化worker -> 广播
//!
//! 用内存队列/广播替身和Mock存储验证各组件拼装后的整体行为。

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use signalfire_domain::ingestion::IngestionService;
use signalfire_domain::ports::{EventBroadcaster, EventQueue, MockEventStore};
use signalfire_infrastructure::{InMemoryBroadcaster, InMemoryEventQueue};
use signalfire_worker::PersistenceWorker;

fn raw_event(source: &str, message: &str) -> Value {
    json!({
        "timestamp": "2024-06-01T12:00:00Z",
        "source": source,
        "status_type": "normal",
        "log_level": "INFO",
        "message": message,
    })
}

#[tokio::test]
async fn test_ingested_event_flows_through_queue_to_store_and_stream() {
    let queue = Arc::new(InMemoryEventQueue::new());
    let broadcaster = Arc::new(InMemoryBroadcaster::new());
    let ingestion = IngestionService::new(queue.clone(), broadcaster.clone());

    let mut store = MockEventStore::new();
    store
        .expect_insert()
        .times(1)
        .withf(|row| row.source == "custom_app" && row.message == "pipeline test")
        .returning(|_| Ok(1));

    let worker = PersistenceWorker::new(
        queue.clone(),
        Arc::new(store),
        broadcaster.clone(),
        Duration::from_millis(50),
        Duration::ZERO,
    );

    // 订阅必须在事件进入管线之前，广播没有历史回放
    let mut stream = broadcaster.subscribe().await.unwrap();

    ingestion
        .ingest_one(&raw_event("custom_app", "pipeline test"))
        .await
        .unwrap();
    assert_eq!(queue.size().await.unwrap(), 1);

    // 接收路径本身也广播了一次（落库前的即时信号）
    let first = stream.next().await.unwrap();
    let first: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["message"], json!("pipeline test"));

    // worker消费队列：落库后再次广播
    let payload = queue.pop(Duration::from_millis(50)).await.unwrap().unwrap();
    worker.process_entry(&payload).await.unwrap();
    assert_eq!(queue.size().await.unwrap(), 0);

    let second = stream.next().await.unwrap();
    let second: Value = serde_json::from_str(&second).unwrap();
    assert_eq!(second["message"], json!("pipeline test"));
}

#[tokio::test]
async fn test_batch_isolation_survives_end_to_end() {
    let queue = Arc::new(InMemoryEventQueue::new());
    let broadcaster = Arc::new(InMemoryBroadcaster::new());
    let ingestion = IngestionService::new(queue.clone(), broadcaster.clone());

    let raws = vec![
        raw_event("custom_app", "first"),
        json!({"source": "broken", "message": "缺公共字段"}),
        raw_event("custom_app", "third"),
    ];
    let outcome = ingestion.ingest_batch(&raws).await;

    assert_eq!(outcome.failed, vec![1]);
    assert_eq!(outcome.event_ids.len(), 2);
    assert_eq!(queue.size().await.unwrap(), 2);

    // 队列保持FIFO顺序
    let first = queue.pop(Duration::from_millis(50)).await.unwrap().unwrap();
    let first: Value = serde_json::from_str(&first).unwrap();
    assert_eq!(first["message"], json!("first"));
}

#[tokio::test]
async fn test_worker_loop_drains_queue_and_stops_on_shutdown() {
    let queue = Arc::new(InMemoryEventQueue::new());
    let broadcaster = Arc::new(InMemoryBroadcaster::new());
    let ingestion = IngestionService::new(queue.clone(), broadcaster.clone());

    for i in 0..3 {
        ingestion
            .ingest_one(&raw_event("custom_app", &format!("event {i}")))
            .await
            .unwrap();
    }

    let mut store = MockEventStore::new();
    store.expect_insert().times(3).returning(|_| Ok(1));

    let worker = PersistenceWorker::new(
        queue.clone(),
        Arc::new(store),
        broadcaster,
        Duration::from_millis(20),
        Duration::ZERO,
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(queue.size().await.unwrap(), 0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn test_typed_airflow_event_keeps_variant_through_pipeline() {
    let queue = Arc::new(InMemoryEventQueue::new());
    let broadcaster = Arc::new(InMemoryBroadcaster::new());
    let ingestion = IngestionService::new(queue.clone(), broadcaster.clone());

    let raw = json!({
        "timestamp": "2024-06-01T12:00:00Z",
        "source": "airflow_failed_dag",
        "status_type": "failure",
        "log_level": "ERROR",
        "message": "DAG failed: etl_daily",
        "dag_id": "etl_daily",
        "execution_date": "2024-06-01T00:00:00Z",
        "try_number": 1,
    });
    let outcome = ingestion.ingest_one(&raw).await.unwrap();
    assert!(outcome.warnings.is_empty());

    let mut store = MockEventStore::new();
    store
        .expect_insert()
        .times(1)
        .withf(|row| {
            row.source == "airflow_failed_dag"
                && row.payload["dag_id"] == json!("etl_daily")
                && row.payload.get("message").is_none()
        })
        .returning(|_| Ok(7));

    let worker = PersistenceWorker::new(
        queue.clone(),
        Arc::new(store),
        broadcaster,
        Duration::from_millis(50),
        Duration::ZERO,
    );

    let payload = queue.pop(Duration::from_millis(50)).await.unwrap().unwrap();
    worker.process_entry(&payload).await.unwrap();
}
