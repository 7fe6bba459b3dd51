//! Cloud instances over a JSON instance API.

use super::{Principal, RequestSigner, RestClient, describe_failure};
use crate::provision::{
    CloudProvider, InstanceDescription, InstanceId, InstanceState, ServerDefinition,
};
use crate::runtime::options::CloudCredentials;
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use vaultstrap_shared::errors::{ProvisionError, VaultstrapResult};

#[derive(Deserialize)]
struct CreateInstanceResponse {
    id: String,
}

#[derive(Deserialize)]
struct DescribeInstanceResponse {
    state: InstanceState,
    #[serde(default)]
    public_ip_address: Option<String>,
    #[serde(default)]
    private_ip_address: Option<String>,
}

impl From<DescribeInstanceResponse> for InstanceDescription {
    fn from(resp: DescribeInstanceResponse) -> Self {
        InstanceDescription {
            state: resp.state,
            address: non_empty(resp.public_ip_address).or(non_empty(resp.private_ip_address)),
        }
    }
}

fn non_empty(address: Option<String>) -> Option<String> {
    address.filter(|a| !a.is_empty())
}

/// Definition as sent to the API, with the default region filled in.
fn create_body(
    definition: &ServerDefinition,
    region: Option<&str>,
) -> Result<serde_json::Value, ProvisionError> {
    let mut body = serde_json::to_value(definition)
        .map_err(|e| ProvisionError::Api(format!("failed to encode definition: {}", e)))?;
    if definition.region().is_none()
        && let (Some(region), Some(obj)) = (region, body.as_object_mut())
    {
        obj.insert("region".into(), serde_json::Value::from(region));
    }
    Ok(body)
}

/// Cloud provider reached over HTTP.
///
/// Requests are made as the access key id, with the secret access key on the
/// principal for the signer to use.
pub struct RestCloud {
    client: RestClient,
    principal: Principal,
    region: Option<String>,
}

impl RestCloud {
    pub fn new(
        endpoint: &str,
        credentials: &CloudCredentials,
        region: Option<String>,
        signer: Arc<dyn RequestSigner>,
    ) -> VaultstrapResult<Self> {
        let (access_key_id, secret_access_key) = credentials.access_keys()?;
        Ok(Self {
            client: RestClient::new(endpoint, signer)?,
            principal: Principal::new(access_key_id).with_secret(secret_access_key),
            region,
        })
    }

    fn instance_path(id: &InstanceId) -> String {
        format!("/instances/{}", urlencoding::encode(id.as_str()))
    }
}

#[async_trait]
impl CloudProvider for RestCloud {
    async fn create_instance(
        &self,
        definition: &ServerDefinition,
    ) -> Result<InstanceId, ProvisionError> {
        let body = create_body(definition, self.region.as_deref())?;
        let resp = self
            .client
            .request(Method::POST, "/instances", &self.principal)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProvisionError::Api(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            // Quota, auth or invalid image: retrying will not help
            return Err(ProvisionError::Rejected(describe_failure(resp).await));
        }
        if !status.is_success() {
            return Err(ProvisionError::Api(describe_failure(resp).await));
        }

        let created: CreateInstanceResponse = resp
            .json()
            .await
            .map_err(|e| ProvisionError::Api(format!("invalid response: {}", e)))?;
        Ok(InstanceId::new(created.id))
    }

    async fn describe_instance(&self, id: &InstanceId) -> Result<InstanceDescription, ProvisionError> {
        let resp = self
            .client
            .request(Method::GET, &Self::instance_path(id), &self.principal)
            .send()
            .await
            .map_err(|e| ProvisionError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ProvisionError::Api(describe_failure(resp).await));
        }
        let described: DescribeInstanceResponse = resp
            .json()
            .await
            .map_err(|e| ProvisionError::Api(format!("invalid response: {}", e)))?;
        Ok(described.into())
    }

    async fn terminate_instance(&self, id: &InstanceId) -> Result<(), ProvisionError> {
        let resp = self
            .client
            .request(Method::DELETE, &Self::instance_path(id), &self.principal)
            .send()
            .await
            .map_err(|e| ProvisionError::Api(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ProvisionError::Api(describe_failure(resp).await));
        }
        Ok(())
    }
}
