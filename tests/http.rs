//! HTTP tests driving the full router in-process

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use farnsworth_server::{
    db,
    library::{Catalog, FilesystemCatalog, StoreCatalog},
    routes, AppState, Config,
};

const USER: &str = "professor";
const KEY: &str = "good-news";
const BOUNDARY: &str = "farnsworth-test-boundary";

// ============================================================================
// Harness
// ============================================================================

fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.auth.username = USER.to_string();
    config.auth.key = KEY.to_string();
    config.storage.media_root = root.join("media");
    config.storage.staging_root = root.join("chunks");
    config.server.client_dir = root.join("client");
    config.server.ffmpeg_dir = root.join("ffmpeg");
    config
}

async fn build_app(config: Config, catalog: Arc<dyn Catalog>) -> Router {
    let state = AppState::new(config, catalog);
    state.library().ensure_layout().await.unwrap();
    routes::router(state)
}

async fn fs_app(temp_dir: &TempDir) -> Router {
    let config = test_config(temp_dir.path());
    let catalog = Arc::new(FilesystemCatalog::new(config.storage.media_root.clone()));
    build_app(config, catalog).await
}

async fn store_app(temp_dir: &TempDir) -> Router {
    let config = test_config(temp_dir.path());
    let url = format!("sqlite://{}", temp_dir.path().join("catalog.db").display());
    let pool = db::create_pool(&url).await.unwrap();
    build_app(config, Arc::new(StoreCatalog::new(pool))).await
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn basic(user: &str, key: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", user, key)))
}

async fn login(app: &Router) -> String {
    let response = send(
        app,
        Request::post("/login/")
            .header(header::AUTHORIZATION, basic(USER, KEY))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    response.headers()["token"].to_str().unwrap().to_string()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn zip_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// One upload request as a hand-built multipart body
fn upload_request(token: &str, metadata: &Value, chunk: &[u8], index: usize, total: usize) -> Request<Body> {
    let mut body = Vec::new();
    let mut text_field = |name: &str, value: &str| {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    };
    text_field("metadata", &metadata.to_string());
    text_field("chunkIndex", &index.to_string());
    text_field("totalChunks", &total.to_string());

    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"blob\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(chunk);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::post("/upload/")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Send `archive` in `parts` chunks, returning each response body
async fn upload(app: &Router, token: &str, metadata: &Value, archive: &[u8], parts: usize) -> Vec<String> {
    let size = archive.len().div_ceil(parts);
    let mut bodies = Vec::new();
    for (index, chunk) in archive.chunks(size).enumerate() {
        let response = send(app, upload_request(token, metadata, chunk, index, parts)).await;
        assert_eq!(response.status(), StatusCode::OK);
        bodies.push(String::from_utf8(body_bytes(response).await).unwrap());
    }
    bodies
}

fn movie_metadata(title: &str) -> Value {
    json!({
        "Title": title,
        "Description": "A film",
        "Genre": ["scifi", ""],
        "Tags": ["x", "y"],
        "Directory": "films",
        "MediaType": "video",
    })
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_login_issues_usable_token() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;

    let response = send(
        &app,
        Request::get("/login/")
            .header(header::AUTHORIZATION, basic(USER, KEY))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/");
    let token = response.headers()["token"].to_str().unwrap().to_string();
    assert_eq!(token.len(), 40);
    assert_eq!(
        response.headers()[header::SET_COOKIE].to_str().unwrap(),
        format!("auth-token={}; Path=/", token)
    );

    let response = send(&app, get("/dir/?mType=video", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        get("/dir/?mType=video", "0123456789abcdef0123456789abcdef01234567"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_redirects_back_to_dev_client() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;

    let response = send(
        &app,
        Request::post("/login/")
            .header(header::AUTHORIZATION, basic(USER, KEY))
            .header(header::REFERER, "http://localhost:3000/")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "http://localhost:3000/");
}

#[tokio::test]
async fn test_bad_credentials_are_challenged() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;

    for authorization in [Some(basic(USER, "bad-news")), Some("Basic %%%".to_string()), None] {
        let mut request = Request::post("/login/");
        if let Some(value) = authorization {
            request = request.header(header::AUTHORIZATION, value);
        }
        let response = send(&app, request.body(Body::empty()).unwrap()).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            r#"Basic realm="restricted", charset="UTF-8""#
        );
        assert!(response.headers().get("token").is_none());
    }
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;

    for uri in ["/dir/?mType=video", "/delete/?mType=video&title=x", "/media/video/x/a.mp4"] {
        let response = send(&app, Request::get(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let response = send(
        &app,
        Request::get("/dir/?mType=video")
            .header(header::AUTHORIZATION, basic(USER, KEY))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Upload, listing, serving, deletion
// ============================================================================

#[tokio::test]
async fn test_chunked_upload_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let movie = vec![7u8; 4096];
    let archive = zip_archive(&[("movie.mp4", &movie), ("extras/notes.txt", b"notes")]);
    let bodies = upload(&app, &token, &movie_metadata("Movie"), &archive, 2).await;
    assert_eq!(bodies, vec!["Chunk received", "Upload complete"]);

    let response = send(&app, get("/dir/?mType=video", &token)).await;
    assert_eq!(body_json(response).await, json!(["Movie"]));

    let response = send(&app, get("/dir/?mType=audio", &token)).await;
    assert_eq!(body_json(response).await, json!([]));

    let response = send(&app, get("/media/video/Movie/movie.mp4", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, movie);

    let response = send(&app, get("/media/video/Movie/extras/notes.txt", &token)).await;
    assert_eq!(body_bytes(response).await, b"notes");

    // Archive and staging chunks are gone
    assert!(!temp_dir.path().join("media/video/Movie.zip").exists());
    assert!(!temp_dir.path().join("chunks/video/Movie").exists());

    let response = send(&app, get("/delete/?mType=video&title=Movie", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!temp_dir.path().join("media/video/Movie").exists());

    let response = send(&app, get("/dir/?mType=video", &token)).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_upload_existing_title_conflicts() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let archive = zip_archive(&[("a.mp4", b"first")]);
    upload(&app, &token, &movie_metadata("Movie"), &archive, 1).await;

    let response = send(
        &app,
        upload_request(&token, &movie_metadata("Movie"), &archive, 0, 1),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app, get("/media/video/Movie/a.mp4", &token)).await;
    assert_eq!(body_bytes(response).await, b"first");
}

#[tokio::test]
async fn test_upload_rejects_bad_requests() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let mut bad_type = movie_metadata("Movie");
    bad_type["MediaType"] = json!("image");
    let response = send(&app, upload_request(&token, &bad_type, b"data", 0, 1)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        upload_request(&token, &movie_metadata("../escape"), b"data", 0, 1),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        upload_request(&token, &movie_metadata("Movie"), b"data", 3, 2),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Request::post("/upload/")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(format!("--{}--\r\n", BOUNDARY)))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corrupt_archive_is_not_listed() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let response = send(
        &app,
        upload_request(&token, &movie_metadata("Broken"), b"not a zip archive", 0, 1),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = send(&app, get("/dir/?mType=video", &token)).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_delete_decodes_title_twice() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let archive = zip_archive(&[("a.mp4", b"data")]);
    upload(&app, &token, &movie_metadata("My Movie"), &archive, 1).await;

    let response = send(&app, get("/delete/?mType=video&title=My%2520Movie", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!temp_dir.path().join("media/video/My Movie").exists());
}

#[tokio::test]
async fn test_delete_errors() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let response = send(&app, get("/delete/?mType=video", &token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/delete/?mType=book&title=Movie", &token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/delete/?mType=video&title=..", &token)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, get("/delete/?mType=video&title=Missing", &token)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_dir_requires_media_type() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    for uri in ["/dir/", "/dir/?mType=", "/dir/?mType=VIDEO"] {
        let response = send(&app, get(uri, &token)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
    }
}

// ============================================================================
// Document store
// ============================================================================

#[tokio::test]
async fn test_store_catalog_lists_and_updates_entries() {
    let temp_dir = TempDir::new().unwrap();
    let app = store_app(&temp_dir).await;
    let token = login(&app).await;

    let archive = zip_archive(&[("a.mp4", b"data")]);
    upload(&app, &token, &movie_metadata("Movie"), &archive, 1).await;

    let response = send(&app, get("/dir/?mType=video", &token)).await;
    let listing = body_json(response).await;
    let entry = &listing[0];
    assert_eq!(entry["title"], "Movie");
    assert_eq!(entry["genre"], json!(["scifi"]));
    assert_eq!(entry["tags"], json!(["x", "y"]));
    assert_eq!(entry["mediaType"], "video");
    let location = entry["location"].clone();
    assert!(location.as_str().unwrap().ends_with("Movie"));

    let update = json!({
        "title": "Movie",
        "update": {
            "title": "Movie (Director's Cut)",
            "description": "Longer",
            "genre": ["scifi"],
            "tags": ["z"],
            "directory": "films",
        }
    });
    let response = send(
        &app,
        Request::post("/update/?mType=video")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(update.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"modified": 1}));

    let response = send(&app, get("/dir/?mType=video", &token)).await;
    let listing = body_json(response).await;
    assert_eq!(listing[0]["title"], "Movie (Director's Cut)");
    assert_eq!(listing[0]["tags"], json!(["z"]));
    assert_eq!(listing[0]["location"], location);

    let response = send(
        &app,
        Request::post("/update/?mType=video")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(update.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await, json!({"modified": 0}));
}

#[tokio::test]
async fn test_store_catalog_delete() {
    let temp_dir = TempDir::new().unwrap();
    let app = store_app(&temp_dir).await;
    let token = login(&app).await;

    let archive = zip_archive(&[("a.mp3", b"data")]);
    let mut metadata = movie_metadata("Album");
    metadata["MediaType"] = json!("audio");
    upload(&app, &token, &metadata, &archive, 1).await;

    let response = send(&app, get("/delete/?mType=audio&title=Album", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!temp_dir.path().join("media/audio/Album").exists());

    let response = send(&app, get("/dir/?mType=audio", &token)).await;
    assert_eq!(body_json(response).await, json!([]));

    let response = send(&app, get("/delete/?mType=audio&title=Album", &token)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_update_without_store_is_unsupported() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let response = send(
        &app,
        Request::post("/update/?mType=video")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"title": "Movie", "update": {"title": "Other"}}).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
}

// ============================================================================
// CORS, static assets, health
// ============================================================================

#[tokio::test]
async fn test_dev_cors_preflight() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(temp_dir.path());
    config.server.dev_cors = true;
    let catalog = Arc::new(FilesystemCatalog::new(config.storage.media_root.clone()));
    let app = build_app(config, catalog).await;

    let response = send(
        &app,
        Request::options("/dir/?mType=video")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );

    let token = login(&app).await;
    let response = send(
        &app,
        Request::get("/dir/?mType=video")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}

#[tokio::test]
async fn test_no_cors_headers_without_dev_flag() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;
    let token = login(&app).await;

    let response = send(
        &app,
        Request::get("/dir/?mType=video")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_static_client_and_ffmpeg_are_public() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::create_dir_all(temp_dir.path().join("client")).unwrap();
    std::fs::create_dir_all(temp_dir.path().join("ffmpeg")).unwrap();
    std::fs::write(temp_dir.path().join("client/index.html"), "<html>farnsworth</html>").unwrap();
    std::fs::write(temp_dir.path().join("ffmpeg/ffmpeg-core.js"), "core").unwrap();
    let app = fs_app(&temp_dir).await;

    let response = send(&app, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<html>farnsworth</html>");

    let response = send(
        &app,
        Request::get("/ffmpeg/ffmpeg-core.js").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"core");
}

#[tokio::test]
async fn test_health() {
    let temp_dir = TempDir::new().unwrap();
    let app = fs_app(&temp_dir).await;

    let response = send(&app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["catalog"], "filesystem");
}
