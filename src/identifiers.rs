// Copyright 2025 Cowboy AI, LLC.

//! Structural names for definitional entities
//!
//! Data objects and data elements can be addressed by a URN built from the
//! owning entity, the owning path and the local name. Identity is always the
//! opaque [`EntityId`](crate::EntityId); the URN is a naming convenience.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::TradeError;

const URN_PREFIX: &str = "urn:";
const LOCAL_SEPARATOR: &str = "$/:";

/// Structural name `urn:<namespace>:<owning-path>$/:<local-name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelUrn {
    namespace: String,
    owning_path: String,
    local_name: String,
}

impl ModelUrn {
    /// Build a URN from its parts
    pub fn new(
        namespace: impl Into<String>,
        owning_path: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            owning_path: owning_path.into(),
            local_name: local_name.into(),
        }
    }

    /// URN of a data object: the entity is the namespace and the object has
    /// no owning path
    pub fn for_data_object(entity: &str, object_name: &str) -> Self {
        Self::new(entity, "", object_name)
    }

    /// URN of a data element, owned by its data object
    pub fn for_data_element(entity: &str, object_name: &str, element_name: &str) -> Self {
        Self::new(entity, object_name, element_name)
    }

    /// Namespace part
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Owning path part
    pub fn owning_path(&self) -> &str {
        &self.owning_path
    }

    /// Local name part
    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl fmt::Display for ModelUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{URN_PREFIX}{}:{}{LOCAL_SEPARATOR}{}",
            self.namespace, self.owning_path, self.local_name
        )
    }
}

impl FromStr for ModelUrn {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(URN_PREFIX)
            .ok_or_else(|| TradeError::Serialization(format!("'{s}' is not a URN")))?;
        let (qualified, local_name) = body
            .rsplit_once(LOCAL_SEPARATOR)
            .ok_or_else(|| TradeError::Serialization(format!("'{s}' has no local name")))?;
        let (namespace, owning_path) = qualified
            .split_once(':')
            .ok_or_else(|| TradeError::Serialization(format!("'{s}' has no namespace")))?;
        Ok(Self::new(namespace, owning_path, local_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_element_urn_format() {
        let urn = ModelUrn::for_data_element("teamA", "orderData", "amount");
        assert_eq!(urn.to_string(), "urn:teamA:orderData$/:amount");
    }

    #[test]
    fn test_urn_parse() {
        let urn: ModelUrn = "urn:teamA:orderData$/:amount".parse().unwrap();
        assert_eq!(urn.namespace(), "teamA");
        assert_eq!(urn.owning_path(), "orderData");
        assert_eq!(urn.local_name(), "amount");

        let object: ModelUrn = ModelUrn::for_data_object("teamA", "orderData")
            .to_string()
            .parse()
            .unwrap();
        assert_eq!(object.owning_path(), "");
        assert_eq!(object.local_name(), "orderData");
    }

    #[test]
    fn test_urn_parse_rejects_garbage() {
        assert!("teamA:orderData".parse::<ModelUrn>().is_err());
        assert!("urn:teamA".parse::<ModelUrn>().is_err());
        assert!("urn:$/:x".parse::<ModelUrn>().is_err());
    }
}
