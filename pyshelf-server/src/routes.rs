//! HTTP surface: simple-index pages, uploads, and downloads.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{debug, info, warn};

use pyshelf_core::config::IndexConfig;
use pyshelf_core::index::PackageIndex;
use pyshelf_core::store::{PackageStore, StoreError};

use crate::auth::{validate_auth, BasicAuth};

/// Shared server state.
pub struct AppState {
    pub index: PackageIndex,
    pub store: Arc<dyn PackageStore>,
    pub config: IndexConfig,
    pub auth: BasicAuth,
}

/// Upload size cap. Source distributions with bundled data and binary
/// wheels routinely run tens of megabytes.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_landing).post(handle_upload))
        .route("/simple/", get(handle_simple_index))
        .route("/simple/:package/", get(handle_package_links))
        .route("/packages/:filename", get(handle_download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

fn store_error_to_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(key) => {
            debug!("Not found: {key}");
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
        other => {
            warn!("Storage error: {other}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Storage error").into_response()
        }
    }
}

fn unauthorized(message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"pyshelf\"")],
        message,
    )
        .into_response()
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

async fn handle_landing() -> Html<&'static str> {
    Html(
        "<html><head><title>pyshelf</title></head><body>\
         <h1>Welcome to pyshelf!</h1>\
         <p>To browse the package index, go to <a href=\"/simple/\">/simple/</a>.</p>\
         </body></html>",
    )
}

/// Distutils-style upload endpoint.
///
/// Expects a multipart form with `:action` set to `file_upload` and the
/// archive in a `content` file field, as sent by `twine` and
/// `python setup.py upload`.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if let Err(message) = validate_auth(&state.auth, authorization) {
        return unauthorized(message);
    }

    let mut action: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!("Malformed upload body: {e}");
                return (StatusCode::BAD_REQUEST, "malformed multipart body").into_response();
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(":action") => match field.text().await {
                Ok(text) => action = Some(text),
                Err(e) => {
                    debug!("Malformed :action field: {e}");
                    return (StatusCode::BAD_REQUEST, "malformed multipart body").into_response();
                }
            },
            Some("content") => {
                filename = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => content = Some(bytes.to_vec()),
                    Err(e) => {
                        debug!("Malformed content field: {e}");
                        return (StatusCode::BAD_REQUEST, "malformed multipart body")
                            .into_response();
                    }
                }
            }
            // Distutils sends metadata fields (name, version, md5_digest, ...)
            // alongside the archive; the index stores only the file.
            _ => {}
        }
    }

    match action.as_deref() {
        Some("file_upload") => {}
        Some(other) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("action not supported: {other}"),
            )
                .into_response();
        }
        None => {
            return (StatusCode::BAD_REQUEST, ":action field not found").into_response();
        }
    }

    let (filename, content) = match (filename, content) {
        (Some(filename), Some(content)) => (filename, content),
        _ => {
            return (StatusCode::BAD_REQUEST, "content file field not found").into_response();
        }
    };

    if filename.contains('/') {
        return (StatusCode::BAD_REQUEST, "bad filename").into_response();
    }

    match state.store.exists(&state.config.bucket, &filename).await {
        Ok(true) if !state.config.overwrite => {
            debug!("Upload rejected, file exists: {filename}");
            return (StatusCode::CONFLICT, "file already exists").into_response();
        }
        Ok(_) => {}
        Err(e) => return store_error_to_response(e),
    }

    info!("Uploading {} ({} bytes)", filename, content.len());
    match state
        .store
        .write(&state.config.bucket, &filename, content)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => store_error_to_response(e),
    }
}

async fn handle_simple_index(State(state): State<Arc<AppState>>) -> Response {
    let names = match state.index.list_package_names(&state.config.bucket).await {
        Ok(names) => names,
        Err(e) => return store_error_to_response(e),
    };

    let mut body = String::from("<html><head><title>Simple Index</title></head><body>\n");
    for name in &names {
        let escaped = escape_html(name);
        body.push_str(&format!("<a href=\"{escaped}/\">{escaped}</a><br/>\n"));
    }
    body.push_str("</body></html>");
    Html(body).into_response()
}

async fn handle_package_links(
    State(state): State<Arc<AppState>>,
    Path(package): Path<String>,
) -> Response {
    // Path parameters arrive percent-decoded, so an encoded slash would
    // otherwise reach the store layer. No stored name contains one.
    if package.contains('/') {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let files = match state
        .index
        .list_package_files(&state.config.bucket, &package)
        .await
    {
        Ok(files) => files,
        Err(e) => return store_error_to_response(e),
    };

    if files.is_empty() {
        if state.config.redirect_to_fallback {
            let target = format!(
                "{}/{}/",
                state.config.fallback_url.trim_end_matches('/'),
                package
            );
            debug!("No files for {package}, redirecting to fallback");
            // 302, the status installers have historically been sent.
            return (StatusCode::FOUND, [(header::LOCATION, target)]).into_response();
        }
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let title = escape_html(&package);
    let mut body = format!("<html><head><title>Links for {title}</title></head><body>\n");
    body.push_str(&format!("<h1>Links for {title}</h1>\n"));
    for file in &files {
        let escaped = escape_html(file);
        body.push_str(&format!(
            "<a href=\"/packages/{escaped}\">{escaped}</a><br/>\n"
        ));
    }
    body.push_str("</body></html>");
    Html(body).into_response()
}

async fn handle_download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    // Same encoded-slash guard as the package listing.
    if filename.contains('/') {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    match state.store.read(&state.config.bucket, &filename).await {
        Ok(data) => {
            let disposition = format!("attachment; filename=\"{filename}\"");
            (
                [
                    (header::CONTENT_TYPE, "application/x-gzip".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                Body::from(data),
            )
                .into_response()
        }
        Err(e) => store_error_to_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use base64::Engine;
    use pyshelf_core::store::memory::MemoryPackageStore;
    use tower::ServiceExt;

    fn test_router_with(config: IndexConfig, auth: BasicAuth, files: &[&str]) -> Router {
        let store: Arc<dyn PackageStore> =
            Arc::new(MemoryPackageStore::with_files(&config.bucket, files));
        let state = AppState {
            index: PackageIndex::new(store.clone()),
            store,
            config,
            auth,
        };
        create_router(Arc::new(state))
    }

    fn test_router(files: &[&str]) -> Router {
        test_router_with(
            IndexConfig::default(),
            BasicAuth::from_credentials(None, None),
            files,
        )
    }

    async fn get_body(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    const BOUNDARY: &str = "pyshelf-test-boundary";

    fn upload_request(filename: &str, data: &str, authorization: Option<&str>) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\":action\"\r\n\r\n\
             file_upload\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"content\"; filename=\"{filename}\"\r\n\r\n\
             {data}\r\n\
             --{BOUNDARY}--\r\n"
        );
        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            );
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn landing_page_links_to_simple_index() {
        let (status, body) = get_body(test_router(&[]), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/simple/"));
    }

    #[tokio::test]
    async fn simple_index_lists_package_names() {
        let router = test_router(&["pytz-2012b.zip", "pytz-2012b.tar.bz2", "pep8-0.6.0.zip"]);
        let (status, body) = get_body(router, "/simple/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"pep8/\">pep8</a>"));
        assert!(body.contains("<a href=\"pytz/\">pytz</a>"));
        // Two pytz archives, one name.
        assert_eq!(body.matches("pytz/").count(), 1);
    }

    #[tokio::test]
    async fn package_page_links_every_file() {
        let router = test_router(&["pytz-2012b.zip", "pytz-2012b.tar.bz2", "pep8-0.6.0.zip"]);
        let (status, body) = get_body(router, "/simple/pytz/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"/packages/pytz-2012b.zip\">pytz-2012b.zip</a>"));
        assert!(body.contains("<a href=\"/packages/pytz-2012b.tar.bz2\">pytz-2012b.tar.bz2</a>"));
        assert!(!body.contains("pep8"));
    }

    #[tokio::test]
    async fn missing_package_redirects_to_fallback() {
        let router = test_router(&["pep8-0.6.0.zip"]);
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/simple/requests/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://pypi.org/simple/requests/"
        );
    }

    #[tokio::test]
    async fn missing_package_is_404_when_fallback_disabled() {
        let config = IndexConfig {
            redirect_to_fallback: false,
            ..IndexConfig::default()
        };
        let router = test_router_with(config, BasicAuth::from_credentials(None, None), &[]);
        let (status, _) = get_body(router, "/simple/requests/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_serves_stored_bytes() {
        let router = test_router(&[]);
        let response = router
            .clone()
            .oneshot(upload_request("pep8-0.6.0.zip", "archive bytes", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/packages/pep8-0.6.0.zip")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/x-gzip");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"pep8-0.6.0.zip\""
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"archive bytes");
    }

    #[tokio::test]
    async fn download_missing_file_is_404() {
        let (status, _) = get_body(test_router(&[]), "/packages/nope-1.0.zip").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_encoded_slash_is_404() {
        // %2F decodes to '/' before the handler sees it; must not reach
        // the store layer.
        let router = test_router(&["pep8-0.6.0.zip"]);
        let (status, _) = get_body(router, "/packages/a%2Fpep8-0.6.0.zip").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn package_page_encoded_slash_is_404() {
        let config = IndexConfig {
            redirect_to_fallback: false,
            ..IndexConfig::default()
        };
        let router = test_router_with(
            config,
            BasicAuth::from_credentials(None, None),
            &["pep8-0.6.0.zip"],
        );
        let (status, _) = get_body(router, "/simple/a%2Fb/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn package_page_encoded_slash_never_redirects() {
        // Fallback redirect stays off for names no index can hold.
        let (status, _) = get_body(test_router(&[]), "/simple/a%2Fb/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_accepts_multi_megabyte_archive() {
        let router = test_router(&[]);
        let archive = "x".repeat(3 * 1024 * 1024);
        let response = router
            .clone()
            .oneshot(upload_request("bigpkg-1.0.tar.gz", &archive, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/packages/bigpkg-1.0.tar.gz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.len(), 3 * 1024 * 1024);
    }

    #[tokio::test]
    async fn upload_then_listed_under_derived_name() {
        let router = test_router(&[]);
        let response = router
            .clone()
            .oneshot(upload_request("pytz-2012b.tar.bz2", "bytes", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (_, body) = get_body(router, "/simple/pytz/").await;
        assert!(body.contains("pytz-2012b.tar.bz2"));
    }

    #[tokio::test]
    async fn upload_existing_file_conflicts() {
        let router = test_router(&["pep8-0.6.0.zip"]);
        let response = router
            .oneshot(upload_request("pep8-0.6.0.zip", "new bytes", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn upload_existing_file_allowed_with_overwrite() {
        let config = IndexConfig {
            overwrite: true,
            ..IndexConfig::default()
        };
        let router = test_router_with(
            config,
            BasicAuth::from_credentials(None, None),
            &["pep8-0.6.0.zip"],
        );
        let response = router
            .oneshot(upload_request("pep8-0.6.0.zip", "new bytes", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_rejects_filename_with_separator() {
        let router = test_router(&[]);
        let response = router
            .oneshot(upload_request("evil/pep8-0.6.0.zip", "bytes", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_rejects_unknown_action() {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\":action\"\r\n\r\n\
             submit\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = test_router(&[]).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_rejects_missing_content_field() {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\":action\"\r\n\r\n\
             file_upload\r\n\
             --{BOUNDARY}--\r\n"
        );
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = test_router(&[]).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn credentialed_router() -> Router {
        test_router_with(
            IndexConfig::default(),
            BasicAuth::from_credentials(Some("admin".to_string()), Some("secret".to_string())),
            &[],
        )
    }

    #[tokio::test]
    async fn upload_requires_credentials_when_configured() {
        let response = credentialed_router()
            .oneshot(upload_request("pep8-0.6.0.zip", "bytes", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"pyshelf\""
        );
    }

    #[tokio::test]
    async fn upload_accepts_valid_credentials() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("admin:secret");
        let header_value = format!("Basic {encoded}");
        let response = credentialed_router()
            .oneshot(upload_request(
                "pep8-0.6.0.zip",
                "bytes",
                Some(&header_value),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reads_stay_open_when_auth_is_configured() {
        let (status, _) = get_body(credentialed_router(), "/simple/").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[test]
    fn escape_html_covers_link_injection() {
        assert_eq!(
            escape_html("<a href=\"x\">&"),
            "&lt;a href=&quot;x&quot;&gt;&amp;"
        );
    }
}
