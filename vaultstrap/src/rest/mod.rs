//! REST-backed collaborators.
//!
//! JSON over HTTP against a Chef-server style inventory (`/clients`,
//! `/nodes`, `/search/node`, `/data`) and a generic instance API
//! (`/instances`). Request authentication is delegated to a
//! [`RequestSigner`].

mod cloud;
mod inventory;
mod secrets;
mod signer;
#[cfg(test)]
mod test_server;

pub use cloud::RestCloud;
pub use inventory::RestInventory;
pub use secrets::RestSecretStore;
pub use signer::{HeaderSigner, Principal, RequestSigner};

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use vaultstrap_shared::errors::{VaultstrapError, VaultstrapResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one base URL and signer.
#[derive(Clone)]
pub(crate) struct RestClient {
    base: String,
    client: Client,
    signer: Arc<dyn RequestSigner>,
}

impl RestClient {
    pub(crate) fn new(base: &str, signer: Arc<dyn RequestSigner>) -> VaultstrapResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| VaultstrapError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            client,
            signer,
        })
    }

    /// Signed request for `path` (which starts with `/`).
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        principal: &Principal,
    ) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        let mut builder = self
            .client
            .request(method.clone(), url)
            .header("Accept", "application/json");
        for (name, value) in self.signer.sign(principal, &method, path) {
            builder = builder.header(name, value);
        }
        builder
    }
}

/// Status and body of a failed response, for error messages.
pub(crate) async fn describe_failure(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("{} {}", status, body.trim())
}

pub(crate) fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}
