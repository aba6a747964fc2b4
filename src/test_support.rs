use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::maven::coordinates::ArtifactCoordinate;
use crate::repository::memory_repo::MemoryRepository;
use crate::repository::RepositoryId;

static INIT_LOGGING: Once = Once::new();

/// routes `tracing` output to the test harness' captured output
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .try_init();
    });
}

pub fn coord(s: &str) -> ArtifactCoordinate {
    s.parse().unwrap()
}

/// A remote-flavored in-memory repository with the given artifacts. Each entry is a GAV and its
///  declared dependencies.
pub fn memory_repo(id: &str, artifacts: &[(&str, &[&str])]) -> MemoryRepository {
    let repo = MemoryRepository::new(RepositoryId(id.to_string()));
    for (gav, deps) in artifacts {
        repo.add_dependencies(&coord(gav), deps.iter().map(|d| coord(d)).collect());
    }
    repo
}

/// Serves the given files (relative path -> content) via HTTP on an ephemeral port. Returns the
///  base URI and a counter of the requests served.
pub async fn serve_files(files: Vec<(String, Vec<u8>)>) -> (String, Arc<AtomicUsize>) {
    let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(files.into_iter().collect());
    let request_count = Arc::new(AtomicUsize::new(0));

    let counter = request_count.clone();
    let app = Router::new()
        .route("/repo/*path", get(move |Path(path): Path<String>| {
            let files = files.clone();
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                match files.get(path.trim_start_matches('/')) {
                    Some(data) => (StatusCode::OK, data.clone()).into_response(),
                    None => StatusCode::NOT_FOUND.into_response(),
                }
            }
        }));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener).unwrap()
        .serve(app.into_make_service());
    tokio::spawn(server);

    (format!("http://{}/repo/", addr), request_count)
}
