//! Point lookups and paginated listings through the server handlers.

use metafeed::wire::{
    self, GetMetadataByMethodSignatureRequest, GetMetadataByTopicRequest, GetMetadataRequest,
    ListMetadataRequest,
};
use metafeed::{
    CallContext, Code, MemoryStorage, Metadata, MetadataStorage, Page, QueryContext, Server,
    ServerConfig, ServerError, SortOrder, StorageError, StorageResult,
};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TRANSFER: &str = "transfer(address,uint256)";

fn seeded_storage(count: u64) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    for id in 1..=count {
        let mut record = Metadata::new(id, format!("0x{:04x}", id))
            .with_payload(json!({"name": format!("Contract{}", id)}));
        if id % 2 == 0 {
            record = record.with_signatures(vec![TRANSFER.to_string()]);
        }
        if id % 5 == 0 {
            record = record.with_topics(vec!["Approval".to_string()]);
        }
        storage.save(record);
    }
    storage
}

fn server_with(storage: Arc<dyn MetadataStorage>, config: ServerConfig) -> Server {
    Server::new(config, storage).unwrap()
}

fn page(limit: u64, offset: u64, order: wire::SortOrder) -> Option<wire::Page> {
    Some(wire::Page::new(limit, offset, order))
}

#[test]
fn test_list_metadata_desc_matches_storage() {
    let storage = seeded_storage(30);
    let server = server_with(storage.clone(), ServerConfig::default());
    let (ctx, _call) = CallContext::detached();

    let response = server
        .list_metadata(
            &ctx,
            &ListMetadataRequest {
                page: page(10, 0, wire::SortOrder::Desc),
            },
        )
        .unwrap();

    let expected = storage
        .list(
            &QueryContext::background(),
            &Page::new(10, 0, SortOrder::Desc),
        )
        .unwrap();

    assert_eq!(response.metadata.len(), 10);
    let ids: Vec<u64> = response.metadata.iter().map(|m| m.id).collect();
    assert_eq!(ids, (21..=30).rev().collect::<Vec<_>>());
    assert_eq!(
        response.metadata,
        expected.into_iter().map(wire::Metadata::from).collect::<Vec<_>>()
    );
}

#[test]
fn test_list_metadata_without_page_is_ascending() {
    let storage = seeded_storage(3);
    let server = server_with(storage, ServerConfig::default());
    let (ctx, _call) = CallContext::detached();

    let response = server
        .list_metadata(&ctx, &ListMetadataRequest { page: None })
        .unwrap();
    let ids: Vec<u64> = response.metadata.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_get_metadata() {
    let storage = seeded_storage(3);
    let server = server_with(storage, ServerConfig::default());
    let (ctx, _call) = CallContext::detached();

    let found = server
        .get_metadata(
            &ctx,
            &GetMetadataRequest {
                address: "0x0002".to_string(),
            },
        )
        .unwrap();
    assert_eq!(found.id, 2);
    assert_eq!(found.payload, r#"{"name":"Contract2"}"#);
}

#[test]
fn test_get_metadata_not_found() {
    let server = server_with(seeded_storage(3), ServerConfig::default());
    let (ctx, _call) = CallContext::detached();

    let err = server
        .get_metadata(
            &ctx,
            &GetMetadataRequest {
                address: "0xdead".to_string(),
            },
        )
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.code(), Code::NotFound);
    assert!(matches!(err, ServerError::Storage(StorageError::NotFound(ref a)) if a == "0xdead"));
}

#[test]
fn test_get_metadata_requires_address() {
    let server = server_with(seeded_storage(1), ServerConfig::default());
    let (ctx, _call) = CallContext::detached();

    let err = server
        .get_metadata(&ctx, &GetMetadataRequest::default())
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[test]
fn test_filtered_listings() {
    let server = server_with(seeded_storage(20), ServerConfig::default());
    let (ctx, _call) = CallContext::detached();

    let by_signature = server
        .get_metadata_by_method_signature(
            &ctx,
            &GetMetadataByMethodSignatureRequest {
                signature: TRANSFER.to_string(),
                page: page(3, 1, wire::SortOrder::Asc),
            },
        )
        .unwrap();
    let ids: Vec<u64> = by_signature.metadata.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![4, 6, 8]);

    let by_topic = server
        .get_metadata_by_topic(
            &ctx,
            &GetMetadataByTopicRequest {
                topic: "Approval".to_string(),
                page: page(10, 0, wire::SortOrder::Desc),
            },
        )
        .unwrap();
    let ids: Vec<u64> = by_topic.metadata.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![20, 15, 10, 5]);

    let none = server
        .get_metadata_by_topic(
            &ctx,
            &GetMetadataByTopicRequest {
                topic: "Unknown".to_string(),
                page: None,
            },
        )
        .unwrap();
    assert!(none.metadata.is_empty());
}

/// Storage whose address and topic lookups never answer until cancelled,
/// and whose other listings fail outright.
struct StalledStorage;

impl MetadataStorage for StalledStorage {
    fn get_by_address(&self, ctx: &QueryContext, _address: &str) -> StorageResult<Metadata> {
        loop {
            ctx.check()?;
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn list(&self, _ctx: &QueryContext, _page: &Page) -> StorageResult<Vec<Metadata>> {
        Err(StorageError::Transient("connection pool exhausted".to_string()))
    }

    fn get_by_method_signature(
        &self,
        _ctx: &QueryContext,
        _signature: &str,
        _page: &Page,
    ) -> StorageResult<Vec<Metadata>> {
        Err(StorageError::Fatal("relation does not exist".to_string()))
    }

    fn get_by_topic(
        &self,
        ctx: &QueryContext,
        _topic: &str,
        _page: &Page,
    ) -> StorageResult<Vec<Metadata>> {
        loop {
            ctx.check()?;
            thread::sleep(Duration::from_millis(5));
        }
    }
}

#[test]
fn test_get_metadata_times_out() {
    let config = ServerConfig {
        lookup_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let server = server_with(Arc::new(StalledStorage), config);
    let (ctx, _call) = CallContext::detached();

    let start = Instant::now();
    let err = server
        .get_metadata(
            &ctx,
            &GetMetadataRequest {
                address: "0x01".to_string(),
            },
        )
        .unwrap_err();

    assert!(matches!(err, ServerError::Timeout(d) if d == Duration::from_millis(50)));
    assert_eq!(err.code(), Code::DeadlineExceeded);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_finished_call_abandons_lookup() {
    let config = ServerConfig {
        lookup_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let server = server_with(Arc::new(StalledStorage), config);
    let (ctx, call) = CallContext::detached();
    call.finish();

    let start = Instant::now();
    let err = server
        .get_metadata(
            &ctx,
            &GetMetadataRequest {
                address: "0x01".to_string(),
            },
        )
        .unwrap_err();

    assert!(matches!(err, ServerError::Storage(StorageError::Cancelled)));
    assert_eq!(err.code(), Code::Cancelled);
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_client_cancel_stops_listing() {
    let server = Arc::new(server_with(Arc::new(StalledStorage), ServerConfig::default()));
    let (ctx, call) = CallContext::detached();

    let worker = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            server.get_metadata_by_topic(
                &ctx,
                &GetMetadataByTopicRequest {
                    topic: "Transfer".to_string(),
                    page: None,
                },
            )
        })
    };

    thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    call.finish();

    let err = worker.join().unwrap().unwrap_err();
    assert_eq!(err.code(), Code::Cancelled);
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_storage_errors_propagate_unchanged() {
    let server = server_with(Arc::new(StalledStorage), ServerConfig::default());
    let (ctx, _call) = CallContext::detached();

    let err = server
        .list_metadata(&ctx, &ListMetadataRequest::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ServerError::Storage(StorageError::Transient(ref msg)) if msg == "connection pool exhausted"
    ));
    assert_eq!(err.code(), Code::Unavailable);

    let err = server
        .get_metadata_by_method_signature(
            &ctx,
            &GetMetadataByMethodSignatureRequest {
                signature: TRANSFER.to_string(),
                page: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = ServerConfig {
        channel_capacity: 0,
        ..Default::default()
    };
    let result = Server::new(config, Arc::new(MemoryStorage::new()));
    assert!(matches!(result, Err(ServerError::Config(_))));
}
