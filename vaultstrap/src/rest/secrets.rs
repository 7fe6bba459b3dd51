//! Vault access metadata stored as data bag items.
//!
//! An item `db-password` in vault `vault` keeps its access metadata in
//! `/data/vault/db-password_keys`: the authorized `search_query`, the
//! `clients` holding a copy, and one encrypted key per client. Only the
//! first two are interpreted here; everything else is carried through.

use super::{Principal, RequestSigner, RestClient, describe_failure, is_not_found};
use crate::runtime::constants::vault::KEYS_SUFFIX;
use crate::vault::{SecretItem, SecretStore};
use async_trait::async_trait;
use reqwest::header::IF_MATCH;
use reqwest::{Method, StatusCode};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use vaultstrap_shared::errors::{GrantError, VaultstrapResult};

const SEARCH_QUERY: &str = "search_query";
const CLIENTS: &str = "clients";
const VERSION: &str = "version";

/// Secret store reached over HTTP.
///
/// The item's `version` field provides optimistic concurrency: `save` sends
/// the version it loaded as an `If-Match` precondition, then reads the item
/// back and reports a conflict unless every selector it wrote is present.
pub struct RestSecretStore {
    client: RestClient,
    admin: Principal,
}

impl RestSecretStore {
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

    fn path(vault: &str, item: &str) -> String {
        format!(
            "/data/{}/{}{}",
            urlencoding::encode(vault),
            urlencoding::encode(item),
            KEYS_SUFFIX
        )
    }

    async fn fetch(&self, vault: &str, item: &str) -> Result<Map<String, Value>, GrantError> {
        let resp = self
            .client
            .request(Method::GET, &Self::path(vault, item), &self.admin)
            .send()
            .await
            .map_err(|e| GrantError::Store(e.to_string()))?;

        if is_not_found(resp.status()) {
            return Err(GrantError::NotFound {
                vault: vault.to_string(),
                item: item.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(GrantError::Store(describe_failure(resp).await));
        }
        resp.json()
            .await
            .map_err(|e| GrantError::Store(format!("invalid item {}/{}: {}", vault, item, e)))
    }
}

/// Parse a keys item. `search_query` may be a single string or a list.
fn from_document(vault: &str, item: &str, mut doc: Map<String, Value>) -> SecretItem {
    let selectors = match doc.remove(SEARCH_QUERY) {
        Some(Value::String(q)) if !q.is_empty() => BTreeSet::from([q]),
        Some(Value::Array(qs)) => strings(qs),
        _ => BTreeSet::new(),
    };
    let clients = match doc.remove(CLIENTS) {
        Some(Value::Array(cs)) => strings(cs),
        _ => BTreeSet::new(),
    };
    let version = doc.remove(VERSION).and_then(|v| v.as_u64()).unwrap_or(0);

    SecretItem {
        vault: vault.to_string(),
        name: item.to_string(),
        selectors,
        clients,
        version,
        extra: doc,
    }
}

/// Serialize with the version bumped.
fn to_document(item: &SecretItem) -> Map<String, Value> {
    let mut doc = item.extra.clone();
    doc.insert("id".into(), Value::from(format!("{}{}", item.name, KEYS_SUFFIX)));
    doc.insert(
        SEARCH_QUERY.into(),
        Value::from(item.selectors.iter().cloned().collect::<Vec<_>>()),
    );
    doc.insert(
        CLIENTS.into(),
        Value::from(item.clients.iter().cloned().collect::<Vec<_>>()),
    );
    doc.insert(VERSION.into(), Value::from(item.version + 1));
    doc
}

fn strings(values: Vec<Value>) -> BTreeSet<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl SecretStore for RestSecretStore {
    async fn load(&self, vault: &str, item: &str) -> Result<SecretItem, GrantError> {
        let doc = self.fetch(vault, item).await?;
        Ok(from_document(vault, item, doc))
    }

    async fn save(&self, item: &SecretItem) -> Result<(), GrantError> {
        let conflict = || GrantError::VersionConflict {
            vault: item.vault.clone(),
            item: item.name.clone(),
        };

        let resp = self
            .client
            .request(Method::PUT, &Self::path(&item.vault, &item.name), &self.admin)
            .header(IF_MATCH, item.version.to_string())
            .json(&to_document(item))
            .send()
            .await
            .map_err(|e| GrantError::Store(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => {}
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => return Err(conflict()),
            _ => return Err(GrantError::Store(describe_failure(resp).await)),
        }

        // A server that ignores the precondition can still drop our write
        let stored = self.fetch(&item.vault, &item.name).await?;
        let stored = from_document(&item.vault, &item.name, stored);
        if !item.selectors.is_subset(&stored.selectors) {
            return Err(conflict());
        }
        Ok(())
    }
}
