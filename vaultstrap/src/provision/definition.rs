//! Declarative server definition.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vaultstrap_shared::errors::ConfigError;

/// Desired compute instance. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    image: String,
    flavor: String,
    region: Option<String>,
    availability_zone: Option<String>,
    subnet_id: Option<String>,
    security_groups: Vec<String>,
    security_group_ids: Vec<String>,
    ssh_key_name: Option<String>,
    tags: BTreeMap<String, String>,
}

impl ServerDefinition {
    pub fn builder(image: impl Into<String>, flavor: impl Into<String>) -> ServerDefinitionBuilder {
        ServerDefinitionBuilder::new(image, flavor)
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn flavor(&self) -> &str {
        &self.flavor
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn availability_zone(&self) -> Option<&str> {
        self.availability_zone.as_deref()
    }

    pub fn subnet_id(&self) -> Option<&str> {
        self.subnet_id.as_deref()
    }

    pub fn security_groups(&self) -> &[String] {
        &self.security_groups
    }

    pub fn security_group_ids(&self) -> &[String] {
        &self.security_group_ids
    }

    pub fn ssh_key_name(&self) -> Option<&str> {
        self.ssh_key_name.as_deref()
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

/// Builder for [`ServerDefinition`].
///
/// Non-consuming, so one builder can stamp out several similar definitions.
#[derive(Debug, Clone)]
pub struct ServerDefinitionBuilder {
    inner: ServerDefinition,
}

impl ServerDefinitionBuilder {
    pub fn new(image: impl Into<String>, flavor: impl Into<String>) -> Self {
        Self {
            inner: ServerDefinition {
                image: image.into(),
                flavor: flavor.into(),
                region: None,
                availability_zone: None,
                subnet_id: None,
                security_groups: Vec::new(),
                security_group_ids: Vec::new(),
                ssh_key_name: None,
                tags: BTreeMap::new(),
            },
        }
    }

    pub fn region(&mut self, region: impl Into<String>) -> &mut Self {
        self.inner.region = Some(region.into());
        self
    }

    pub fn availability_zone(&mut self, zone: impl Into<String>) -> &mut Self {
        self.inner.availability_zone = Some(zone.into());
        self
    }

    /// Place the instance in a VPC subnet.
    pub fn subnet_id(&mut self, subnet: impl Into<String>) -> &mut Self {
        self.inner.subnet_id = Some(subnet.into());
        self
    }

    pub fn security_groups(&mut self, groups: Vec<String>) -> &mut Self {
        self.inner.security_groups = groups;
        self
    }

    pub fn security_group_ids(&mut self, ids: Vec<String>) -> &mut Self {
        self.inner.security_group_ids = ids;
        self
    }

    pub fn ssh_key_name(&mut self, key: impl Into<String>) -> &mut Self {
        self.inner.ssh_key_name = Some(key.into());
        self
    }

    pub fn tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.inner.tags.insert(key.into(), value.into());
        self
    }

    /// Validate and build.
    pub fn build(&self) -> Result<ServerDefinition, ConfigError> {
        let def = &self.inner;

        if def.image.trim().is_empty() {
            return Err(ConfigError::Missing("image".into()));
        }
        if def.flavor.trim().is_empty() {
            return Err(ConfigError::Missing("flavor".into()));
        }
        // VPC placement only accepts group ids
        if def.subnet_id.is_some() && !def.security_groups.is_empty() {
            return Err(ConfigError::MutuallyExclusive(
                "Security group names are not allowed when using a subnet; use security group ids"
                    .into(),
            ));
        }

        Ok(def.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_minimal() {
        let def = ServerDefinition::builder("ami-123", "m1.small").build().unwrap();
        assert_eq!(def.image(), "ami-123");
        assert_eq!(def.flavor(), "m1.small");
        assert!(def.region().is_none());
        assert!(def.security_groups().is_empty());
    }

    #[test]
    fn test_build_requires_image_and_flavor() {
        assert_eq!(
            ServerDefinition::builder("", "m1.small").build().unwrap_err(),
            ConfigError::Missing("image".into())
        );
        assert_eq!(
            ServerDefinition::builder("ami-123", " ").build().unwrap_err(),
            ConfigError::Missing("flavor".into())
        );
    }

    #[test]
    fn test_subnet_rejects_group_names() {
        let mut builder = ServerDefinition::builder("ami-123", "m1.small");
        builder
            .subnet_id("subnet-1")
            .security_groups(vec!["default".into()]);
        assert!(matches!(
            builder.build(),
            Err(ConfigError::MutuallyExclusive(_))
        ));

        builder
            .security_groups(Vec::new())
            .security_group_ids(vec!["sg-1".into()]);
        let def = builder.build().unwrap();
        assert_eq!(def.security_group_ids(), &["sg-1"]);
    }

    #[test]
    fn test_builder_non_consuming() {
        let mut builder = ServerDefinition::builder("ami-123", "m1.small");
        builder.region("us-east-1");

        let first = builder.build().unwrap();
        let second = builder.availability_zone("us-east-1a").build().unwrap();

        assert!(first.availability_zone().is_none());
        assert_eq!(second.availability_zone(), Some("us-east-1a"));
        assert_eq!(second.region(), Some("us-east-1"));
    }
}
