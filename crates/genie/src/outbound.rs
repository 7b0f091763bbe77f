use http::{Request, Response};
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

use crate::error::LLMError;

/// A single, global client, built once
pub static CLIENT: Lazy<Client> = Lazy::new(Client::new);

/// Executes a prepared request. Non-success statuses are returned as
/// responses so the provider's parser can decode the error body.
pub async fn call_outbound(
    req: Request<Vec<u8>>,
    timeout: Option<Duration>,
) -> Result<Response<Vec<u8>>, LLMError> {
    let (parts, body) = req.into_parts();

    let mut rb = CLIENT
        .request(parts.method, parts.uri.to_string())
        .headers(parts.headers)
        .body(body);
    if let Some(timeout) = timeout {
        rb = rb.timeout(timeout);
    }

    let resp = rb.send().await?;

    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = resp.bytes().await?.to_vec();

    let mut builder = Response::builder().status(status.as_u16());
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    Ok(builder.body(bytes)?)
}
