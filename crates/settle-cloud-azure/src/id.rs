//! Azure resource IDs
//!
//! Only the `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`
//! shape is supported; nested child resources are out of scope.

use crate::error::{AzureError, Result};
use std::fmt;

/// ID of a top-level resource in a resource group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    /// Resource provider namespace (e.g. "Microsoft.Cache")
    pub namespace: String,
    /// Resource type within the namespace (e.g. "redis")
    pub resource_type: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        namespace: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            namespace: namespace.into(),
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Parse an ARM ID, matching segment keys case-insensitively
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = || AzureError::InvalidResourceId(id.to_string());
        let segments: Vec<&str> = id.trim_matches('/').split('/').collect();

        match segments.as_slice() {
            [subs, subscription_id, groups, resource_group, providers, namespace, resource_type, name]
                if subs.eq_ignore_ascii_case("subscriptions")
                    && groups.eq_ignore_ascii_case("resourceGroups")
                    && providers.eq_ignore_ascii_case("providers")
                    && segments.iter().all(|s| !s.is_empty()) =>
            {
                Ok(Self::new(
                    *subscription_id,
                    *resource_group,
                    *namespace,
                    *resource_type,
                    *name,
                ))
            }
            _ => Err(invalid()),
        }
    }

    /// Same as `parse`, but also checks the namespace and type
    pub fn parse_as(id: &str, namespace: &str, resource_type: &str) -> Result<Self> {
        let parsed = Self::parse(id)?;
        if !parsed.namespace.eq_ignore_ascii_case(namespace)
            || !parsed.resource_type.eq_ignore_ascii_case(resource_type)
        {
            return Err(AzureError::InvalidResourceId(format!(
                "{} is not a {}/{} ID",
                id, namespace, resource_type
            )));
        }
        Ok(parsed)
    }

    /// Request path relative to the ARM endpoint
    pub fn path(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id, self.resource_group, self.namespace, self.resource_type, self.name
        )
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REDIS_ID: &str =
        "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Cache/redis/cache1";

    #[test]
    fn test_parse_and_format() {
        let id = ResourceId::parse(REDIS_ID).unwrap();
        assert_eq!(id.subscription_id, "0000");
        assert_eq!(id.resource_group, "rg1");
        assert_eq!(id.namespace, "Microsoft.Cache");
        assert_eq!(id.resource_type, "redis");
        assert_eq!(id.name, "cache1");
        assert_eq!(id.to_string(), REDIS_ID);
    }

    #[test]
    fn test_parse_is_case_insensitive_on_keys() {
        let id = ResourceId::parse(
            "/subscriptions/0000/resourcegroups/rg1/providers/Microsoft.Cache/Redis/cache1",
        )
        .unwrap();
        assert_eq!(id.resource_group, "rg1");
        assert!(ResourceId::parse_as(&id.path(), "microsoft.cache", "redis").is_ok());
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(ResourceId::parse("cache1").is_err());
        assert!(ResourceId::parse("/subscriptions/0000/resourceGroups/rg1").is_err());
        assert!(
            ResourceId::parse("/subscriptions//resourceGroups/rg1/providers/Microsoft.Cache/redis/cache1")
                .is_err()
        );
        assert!(ResourceId::parse_as(REDIS_ID, "Microsoft.DocumentDB", "databaseAccounts").is_err());
    }
}
