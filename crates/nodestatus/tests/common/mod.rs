//! A stand-in producer: one actix server answering discovery, bp.json,
//! on-chain table and per-service requests from canned data.

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::{http::StatusCode, web, App, HttpResponse, HttpServer};
use chrono::Utc;
use serde_json::{json, Value};

use nodestatus::ChainInfo;

pub const CHAIN_ID: &str = "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906";

#[derive(Debug, Clone)]
pub struct MockNode {
    /// Chain id reported by `get_info`.
    pub chain_id: String,
    pub head_age_secs: i64,
    pub manifest: Value,
    pub manifest_status: u16,
    pub manifest_body: String,
    /// `get_producers` pages, served in order by `lower_bound`.
    pub pages: Vec<Value>,
    /// Number of leading `get_producers` calls answered with 502.
    pub discovery_failures: usize,
    pub discovery_calls: Arc<AtomicUsize>,
    /// Body of `/chains.json`; `None` answers 404.
    pub redirect_table: Option<Value>,
    /// Document stored in the on-chain table; `None` returns no rows.
    pub stored_manifest: Option<Value>,
    pub history_status: u16,
    pub proxy_shim: bool,
    pub indexer_missing_blocks: i64,
}

impl MockNode {
    pub fn new(manifest: Value) -> Self {
        Self {
            chain_id: CHAIN_ID.to_string(),
            head_age_secs: 10,
            manifest,
            manifest_status: 200,
            manifest_body: String::new(),
            pages: Vec::new(),
            discovery_failures: 0,
            discovery_calls: Arc::new(AtomicUsize::new(0)),
            redirect_table: None,
            stored_manifest: None,
            history_status: 200,
            proxy_shim: false,
            indexer_missing_blocks: 0,
        }
    }
}

/// Reserve a local port and return the listener with its base url.
pub fn bind() -> std::io::Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let base = format!("http://{}", listener.local_addr()?);
    Ok((listener, base))
}

/// A `host:port` nobody listens on.
pub fn refused_addr() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?.to_string();
    drop(listener);
    Ok(addr)
}

/// A `host:port` that accepts TCP connections for the rest of the test.
pub async fn p2p_listener() -> std::io::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    actix_rt::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    Ok(addr)
}

pub fn serve(listener: TcpListener, node: MockNode) -> std::io::Result<()> {
    let data = web::Data::new(node);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/v1/chain/get_producers", web::post().to(get_producers))
            .route("/v1/chain/get_info", web::get().to(get_info))
            .route("/bp.json", web::get().to(bp_json))
            .route("/redirected/bp.json", web::get().to(redirected_bp_json))
            .route("/chains.json", web::get().to(chains_json))
            .route("/v1/chain/get_table_rows", web::post().to(get_table_rows))
            .route("/v1/chain/get_account", web::post().to(get_account))
            .route(
                "/v1/chain/get_accounts_by_authorizers",
                web::post().to(get_accounts_by_authorizers),
            )
            .route("/v1/history/get_actions", web::post().to(history_get_actions))
            .route("/v2/history/get_actions", web::get().to(indexer_get_actions))
            .route("/v2/health", web::get().to(indexer_health))
            .route("/health", web::get().to(asset_health))
            .route("/ipfs/{cid}", web::get().to(ipfs_object))
            .route("/api/status", web::get().to(light_api_status))
    })
    .workers(1)
    .disable_signals()
    .listen(listener)?
    .run();
    actix_rt::spawn(server);
    Ok(())
}

/// Chain config pointing at `api_node` with every pause removed.
pub fn chain(api_node: &str) -> ChainInfo {
    let mut chain = ChainInfo::new("TEST", CHAIN_ID, api_node);
    chain.timeout_secs = 2;
    chain.throttle_ms = 0;
    chain.retry_delay_ms = 0;
    chain
}

/// One query+seed node, as most small producers publish it.
pub fn single_node_manifest(api_url: &str, p2p: &str) -> Value {
    json!({
        "producer_account_name": "bpa",
        "org": {"candidate_name": "BP Alpha", "github_user": "bpalpha"},
        "nodes": [{
            "node_type": ["query", "seed"],
            "features": ["chain-api"],
            "ssl_endpoint": api_url,
            "p2p_endpoint": p2p
        }]
    })
}

/// A query+seed node declaring every optional service.
pub fn full_feature_manifest(api_url: &str, p2p: &str) -> Value {
    json!({
        "producer_account_name": "bpa",
        "org": {"candidate_name": "BP Alpha", "github_user": "bpalpha"},
        "nodes": [{
            "node_type": ["query", "seed"],
            "features": [
                "chain-api", "account-query", "history-v1", "hyperion-v2",
                "atomic-assets-api", "ipfs", "light-api"
            ],
            "ssl_endpoint": api_url,
            "p2p_endpoint": p2p
        }]
    })
}

fn chain_time(age_secs: i64) -> String {
    (Utc::now() - chrono::Duration::seconds(age_secs))
        .format("%Y-%m-%dT%H:%M:%S%.3f")
        .to_string()
}

async fn get_producers(node: web::Data<MockNode>, body: web::Json<Value>) -> HttpResponse {
    if node.discovery_calls.fetch_add(1, Ordering::SeqCst) < node.discovery_failures {
        return HttpResponse::BadGateway().body("upstream unavailable");
    }
    let lower_bound = body.get("lower_bound").and_then(Value::as_str);
    let page = match lower_bound {
        None => node.pages.first(),
        Some(bound) => node
            .pages
            .iter()
            .find(|p| p.pointer("/rows/0/owner").and_then(Value::as_str) == Some(bound)),
    };
    match page {
        Some(page) => HttpResponse::Ok().json(page),
        None => HttpResponse::Ok().json(json!({"rows": [], "more": ""})),
    }
}

async fn get_info(node: web::Data<MockNode>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .json(json!({
            "server_version": "d1bc8d3",
            "chain_id": node.chain_id,
            "head_block_num": 1000,
            "head_block_time": chain_time(node.head_age_secs),
        }))
}

async fn bp_json(node: web::Data<MockNode>) -> HttpResponse {
    if node.manifest_status == 200 {
        return HttpResponse::Ok().json(&node.manifest);
    }
    let status = StatusCode::from_u16(node.manifest_status).unwrap_or(StatusCode::NOT_FOUND);
    HttpResponse::build(status).body(node.manifest_body.clone())
}

async fn redirected_bp_json(node: web::Data<MockNode>) -> HttpResponse {
    HttpResponse::Ok().json(&node.manifest)
}

async fn chains_json(node: web::Data<MockNode>) -> HttpResponse {
    match &node.redirect_table {
        Some(table) => HttpResponse::Ok().json(table),
        None => HttpResponse::NotFound().finish(),
    }
}

async fn get_table_rows(node: web::Data<MockNode>, body: web::Json<Value>) -> HttpResponse {
    let owner = body.get("lower_bound").and_then(Value::as_str).unwrap_or_default();
    let rows = match &node.stored_manifest {
        Some(stored) => json!([{"owner": owner, "data": {"owner": owner, "json": stored.to_string()}}]),
        None => json!([]),
    };
    HttpResponse::Ok().json(json!({"rows": rows, "more": false, "next_key": ""}))
}

async fn get_account(node: web::Data<MockNode>) -> HttpResponse {
    if node.proxy_shim {
        return HttpResponse::BadRequest().json(json!({"code": 400, "message": "INVALID_JSON"}));
    }
    HttpResponse::Ok().json(json!({"account_name": "ledgerwiseio"}))
}

async fn get_accounts_by_authorizers() -> HttpResponse {
    HttpResponse::Ok().json(json!({"accounts": []}))
}

async fn history_get_actions(node: web::Data<MockNode>) -> HttpResponse {
    if node.history_status != 200 {
        let status = StatusCode::from_u16(node.history_status).unwrap_or(StatusCode::NOT_FOUND);
        return HttpResponse::build(status).body("history plugin not enabled");
    }
    HttpResponse::Ok().json(json!({
        "actions": [{"global_action_seq": 1, "block_time": chain_time(5)}],
        "last_irreversible_block": 990
    }))
}

async fn indexer_get_actions() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "total": {"value": 1, "relation": "eq"},
        "actions": [{"timestamp": chain_time(5), "block_num": 999}]
    }))
}

async fn indexer_health(node: web::Data<MockNode>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "version": "3.3.9",
        "health": [
            {"service": "RabbitMq", "status": "OK"},
            {"service": "NodeosRPC", "status": "OK", "service_data": {"head_block_num": 1000}},
            {
                "service": "Elasticsearch",
                "status": "OK",
                "service_data": {"last_indexed_block": 999, "missing_blocks": node.indexer_missing_blocks}
            }
        ]
    }))
}

async fn asset_health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "data": {
            "version": "1.3.21",
            "postgres": {"status": "OK", "readers": [{"name": "atomic-1", "block_num": "995"}]},
            "redis": {"status": "OK"},
            "chain": {"status": "OK", "head_block": 1000, "head_time": 1}
        }
    }))
}

async fn ipfs_object() -> HttpResponse {
    HttpResponse::Ok().body("hello")
}

async fn light_api_status() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}
