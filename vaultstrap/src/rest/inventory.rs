//! Chef-server style inventory over REST.

use super::{Principal, RequestSigner, RestClient, describe_failure, is_not_found};
use crate::identity::{ClientCredential, ClientKey, InventoryServer, NodeRecord};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vaultstrap_shared::errors::{
    IssuanceError, RegistrationError, VaultstrapError, VaultstrapResult,
};

const DEFAULT_ENVIRONMENT: &str = "_default";

#[derive(Serialize)]
struct CreateClientRequest<'a> {
    name: &'a str,
    create_key: bool,
}

#[derive(Deserialize)]
struct ChefKey {
    private_key: String,
}

/// Older servers return `private_key` at the top level, newer ones nest it.
#[derive(Deserialize)]
struct CreateClientResponse {
    #[serde(default)]
    private_key: Option<String>,
    #[serde(default)]
    chef_key: Option<ChefKey>,
}

impl CreateClientResponse {
    fn into_private_key(self) -> Option<String> {
        self.chef_key.map(|k| k.private_key).or(self.private_key)
    }
}

#[derive(Serialize)]
struct NodeBody<'a> {
    name: &'a str,
    json_class: &'static str,
    chef_type: &'static str,
    chef_environment: &'a str,
    run_list: &'a [String],
    normal: &'a serde_json::Map<String, serde_json::Value>,
}

impl<'a> NodeBody<'a> {
    fn from_record(node: &'a NodeRecord) -> Self {
        Self {
            name: &node.name,
            json_class: "Chef::Node",
            chef_type: "node",
            chef_environment: node.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT),
            run_list: node.run_list.entries(),
            normal: &node.normal_attributes,
        }
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    rows: Vec<serde_json::Value>,
}

impl SearchResponse {
    fn names(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get("name").and_then(|n| n.as_str()))
            .map(str::to_string)
            .collect()
    }
}

/// Inventory server reached over HTTP.
///
/// Client creation, search and deletion are made as the administrator;
/// node creation as the node's own client.
pub struct RestInventory {
    client: RestClient,
    admin: Principal,
}

impl RestInventory {
    pub fn new(
        server_url: &str,
        admin: Principal,
        signer: Arc<dyn RequestSigner>,
    ) -> VaultstrapResult<Self> {
        Ok(Self {
            client: RestClient::new(server_url, signer)?,
            admin,
        })
    }

    async fn delete(&self, path: &str) -> VaultstrapResult<()> {
        let resp = self
            .client
            .request(Method::DELETE, path, &self.admin)
            .send()
            .await
            .map_err(|e| VaultstrapError::Inventory(e.to_string()))?;

        let status = resp.status();
        if status.is_success() || is_not_found(status) {
            Ok(())
        } else {
            Err(VaultstrapError::Inventory(describe_failure(resp).await))
        }
    }
}

#[async_trait]
impl InventoryServer for RestInventory {
    async fn create_client(&self, name: &str) -> Result<ClientKey, IssuanceError> {
        let resp = self
            .client
            .request(Method::POST, "/clients", &self.admin)
            .json(&CreateClientRequest {
                name,
                create_key: true,
            })
            .send()
            .await
            .map_err(|e| IssuanceError::Server(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => {
                let body: CreateClientResponse = resp
                    .json()
                    .await
                    .map_err(|e| IssuanceError::Server(format!("invalid response: {}", e)))?;
                let private_key = body.into_private_key().ok_or_else(|| {
                    IssuanceError::Server("response carries no private key".into())
                })?;
                Ok(ClientKey {
                    name: name.to_string(),
                    private_key,
                })
            }
            StatusCode::CONFLICT => Err(IssuanceError::AlreadyExists(name.to_string())),
            _ => Err(IssuanceError::Server(describe_failure(resp).await)),
        }
    }

    async fn create_node(
        &self,
        auth: &ClientCredential,
        node: &NodeRecord,
    ) -> Result<(), RegistrationError> {
        let principal = Principal::with_key(auth.name(), auth.key_path());
        let resp = self
            .client
            .request(Method::POST, "/nodes", &principal)
            .json(&NodeBody::from_record(node))
            .send()
            .await
            .map_err(|e| RegistrationError::Server(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(RegistrationError::Conflict(node.name.clone())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(RegistrationError::Unauthorized(describe_failure(resp).await))
            }
            _ => Err(RegistrationError::Server(describe_failure(resp).await)),
        }
    }

    async fn search_nodes(&self, query: &str) -> VaultstrapResult<Vec<String>> {
        let path = format!("/search/node?q={}", urlencoding::encode(query));
        let resp = self
            .client
            .request(Method::GET, &path, &self.admin)
            .send()
            .await
            .map_err(|e| VaultstrapError::Inventory(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(VaultstrapError::Inventory(describe_failure(resp).await));
        }
        let body: SearchResponse = resp
            .json()
            .await
            .map_err(|e| VaultstrapError::Inventory(format!("invalid search response: {}", e)))?;
        Ok(body.names())
    }

    async fn delete_node(&self, name: &str) -> VaultstrapResult<()> {
        self.delete(&format!("/nodes/{}", urlencoding::encode(name)))
            .await
    }

    async fn delete_client(&self, name: &str) -> VaultstrapResult<()> {
        self.delete(&format!("/clients/{}", urlencoding::encode(name)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::HeaderSigner;
    use crate::rest::test_server::{StubRequest, serve};
    use crate::run_list::RunList;

    fn inventory(url: &str) -> RestInventory {
        RestInventory::new(url, Principal::new("admin"), Arc::new(HeaderSigner::new())).unwrap()
    }

    fn node(name: &str) -> NodeRecord {
        NodeRecord {
            name: name.into(),
            normal_attributes: serde_json::Map::new(),
            run_list: RunList::parse("role[base]").unwrap(),
            environment: None,
        }
    }

    async fn register(status: u16) -> Result<(), RegistrationError> {
        let server = serve(move |_req: StubRequest| async move { (status, String::new()) }).await;
        inventory(&server.url)
            .create_node(&ClientCredential::new("i-abc", "/tmp/i-abc.pem"), &node("i-abc"))
            .await
    }

    #[test]
    fn test_node_body() {
        let node = NodeRecord {
            name: "i-abc".into(),
            normal_attributes: serde_json::json!({"tier": "db"})
                .as_object()
                .cloned()
                .unwrap(),
            run_list: RunList::parse("role[base]").unwrap(),
            environment: None,
        };

        let body = serde_json::to_value(NodeBody::from_record(&node)).unwrap();
        assert_eq!(body["name"], "i-abc");
        assert_eq!(body["chef_environment"], "_default");
        assert_eq!(body["run_list"], serde_json::json!(["role[base]"]));
        assert_eq!(body["normal"]["tier"], "db");
    }

    #[test]
    fn test_client_key_shapes() {
        let nested: CreateClientResponse =
            serde_json::from_str(r#"{"uri":"x","chef_key":{"private_key":"K1"}}"#).unwrap();
        assert_eq!(nested.into_private_key().as_deref(), Some("K1"));

        let flat: CreateClientResponse =
            serde_json::from_str(r#"{"private_key":"K2"}"#).unwrap();
        assert_eq!(flat.into_private_key().as_deref(), Some("K2"));
    }

    #[test]
    fn test_search_names() {
        let resp: SearchResponse = serde_json::from_str(
            r#"{"total":2,"start":0,"rows":[{"name":"i-abc"},{"name":"web-1","chef_type":"node"}]}"#,
        )
        .unwrap();
        assert_eq!(resp.names(), vec!["i-abc", "web-1"]);
    }

    #[tokio::test]
    async fn test_create_client_returns_key() {
        let server = serve(|req: StubRequest| async move {
            assert_eq!(req.header("X-Ops-UserId"), Some("admin"));
            assert_eq!(req.json()["name"], "i-abc");
            (201, r#"{"chef_key":{"private_key":"PEM"}}"#.to_string())
        })
        .await;

        let key = inventory(&server.url).create_client("i-abc").await.unwrap();
        assert_eq!(key.name, "i-abc");
        assert_eq!(key.private_key, "PEM");
    }

    #[tokio::test]
    async fn test_existing_client_is_already_exists() {
        let server = serve(|_req: StubRequest| async { (409, String::new()) }).await;

        let err = inventory(&server.url).create_client("i-abc").await.unwrap_err();
        assert!(matches!(err, IssuanceError::AlreadyExists(ref name) if name == "i-abc"));
    }

    #[tokio::test]
    async fn test_create_node_signed_as_node_client() {
        let server = serve(|req: StubRequest| async move {
            assert_eq!(req.path, "/nodes");
            assert_eq!(req.header("X-Ops-UserId"), Some("i-abc"));
            (201, String::new())
        })
        .await;

        inventory(&server.url)
            .create_node(&ClientCredential::new("i-abc", "/tmp/i-abc.pem"), &node("i-abc"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_node_status_mapping() {
        assert!(matches!(
            register(409).await,
            Err(RegistrationError::Conflict(ref n)) if n == "i-abc"
        ));
        assert!(matches!(register(401).await, Err(RegistrationError::Unauthorized(_))));
        assert!(matches!(register(403).await, Err(RegistrationError::Unauthorized(_))));
        assert!(matches!(register(500).await, Err(RegistrationError::Server(_))));
    }

    #[tokio::test]
    async fn test_search_encodes_query() {
        let server = serve(|req: StubRequest| async move {
            assert_eq!(req.path, "/search/node?q=name%3Ai-abc");
            (200, r#"{"rows":[{"name":"i-abc"}]}"#.to_string())
        })
        .await;

        let names = inventory(&server.url).search_nodes("name:i-abc").await.unwrap();
        assert_eq!(names, vec!["i-abc"]);
    }

    #[tokio::test]
    async fn test_delete_treats_missing_as_done() {
        let server = serve(|req: StubRequest| async move {
            match req.path.as_str() {
                "/nodes/gone" | "/clients/gone" => (404, String::new()),
                "/nodes/locked" => (403, "forbidden".to_string()),
                _ => (200, String::new()),
            }
        })
        .await;
        let inventory = inventory(&server.url);

        inventory.delete_node("gone").await.unwrap();
        inventory.delete_client("gone").await.unwrap();
        inventory.delete_node("web-1").await.unwrap();
        assert!(inventory.delete_node("locked").await.is_err());
    }
}
