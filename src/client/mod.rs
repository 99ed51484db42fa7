use hyper::header::USER_AGENT;
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use hyper_tls::HttpsConnector;

use crate::error::RequestError;

pub type HttpsClient = Client<HttpsConnector<hyper::client::HttpConnector>>;

const AGENT: &str = concat!("storefront-loadforge/", env!("CARGO_PKG_VERSION"));

pub fn build_client() -> HttpsClient {
    let https = HttpsConnector::new();
    Client::builder().build::<_, Body>(https)
}

/// 2xx and 3xx count as success.
pub fn is_success(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

/// Issues a GET and drains the body. The caller bounds it with a timeout.
pub async fn send_get(client: &HttpsClient, url: &str) -> Result<StatusCode, RequestError> {
    let uri: Uri = url
        .parse::<Uri>()
        .map_err(|e| RequestError::Network(format!("invalid uri {url}: {e}")))?;

    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(USER_AGENT, AGENT)
        .body(Body::empty())
        .map_err(|e| RequestError::Network(e.to_string()))?;

    let response = client.request(request).await.map_err(describe)?;
    let status = response.status();

    hyper::body::to_bytes(response.into_body())
        .await
        .map_err(describe)?;

    Ok(status)
}

fn describe(e: hyper::Error) -> RequestError {
    let msg = if e.is_connect() {
        "Connection refused or host unreachable"
    } else if e.is_timeout() {
        "Timeout"
    } else if e.is_closed() || e.is_incomplete_message() {
        "Connection closed unexpectedly"
    } else {
        "Unknown network error"
    };
    RequestError::Network(msg.to_string())
}
