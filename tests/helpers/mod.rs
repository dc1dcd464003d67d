//! Builds an in-memory application for router tests.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, Response, StatusCode};
use axum::routing::post;
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use gold_workflow::{
    app_state::AppState,
    db::MemoryStore,
    routes,
    services::{
        dispatch::{DispatchSettings, JdfDispatcher},
        jdf::HotFolder,
        jmf::JmfGateway,
        job_storage::JobStorage,
    },
};

use crate::fixtures::{job, TEST_ITEMS};

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub hotfolder: PathBuf,
}

/// Nothing listens here; JMF submissions fail fast.
const UNREACHABLE_GATEWAY: &str = "http://127.0.0.1:9/JDFP/JMF/";

pub async fn test_app(dir: &Path) -> TestApp {
    test_app_with_gateway(dir, UNREACHABLE_GATEWAY).await
}

pub async fn test_app_with_gateway(dir: &Path, gateway_url: &str) -> TestApp {
    let store = MemoryStore::new();
    store.insert_job(job()).await;
    for fixture in TEST_ITEMS {
        store.insert_item(fixture.item()).await;
    }

    let hotfolder = dir.join("jdf");
    std::fs::create_dir_all(&hotfolder).unwrap();

    let dispatcher = JdfDispatcher::new(
        Arc::new(store.clone()),
        HotFolder::new(&hotfolder),
        JobStorage::new(dir.join("JobStorage")),
        JmfGateway::new(gateway_url).unwrap(),
        DispatchSettings {
            fs_server_host: "gcmaster".to_string(),
            webserver_host: "http://gold.test".to_string(),
            jmf_return_url: "http://gold.test/xml/echo".to_string(),
        },
    );

    TestApp {
        router: routes::create_router().with_state(AppState::new(dispatcher)),
        store,
        hotfolder,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn hotfolder_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// A request seen by [`spawn_gateway`].
#[derive(Debug, Clone)]
pub struct Received {
    pub content_type: String,
    pub body: String,
}

/// Serve a stand-in JMF gateway on a free loopback port that answers every
/// post with `status`. Returns its URL and the requests it has seen.
pub async fn spawn_gateway(status: StatusCode) -> (String, Arc<Mutex<Vec<Received>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();
    let app = Router::new().route(
        "/JDFP/JMF/",
        post(move |headers: HeaderMap, body: String| {
            let log = log.clone();
            async move {
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                log.lock().unwrap().push(Received { content_type, body });
                (status, "<JMF/>")
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}/JDFP/JMF/"), received)
}
