use serde::{Deserialize, Serialize};

use crate::data::{Error, DEFAULT_ID_ATTR, SURROGATE_KEY};
use crate::Result;

fn default_id_attr() -> String {
    DEFAULT_ID_ATTR.to_string()
}

/// Construction options for an entity store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Resource name, also the key of the backing collection
    pub name: String,
    /// Business-key field of the resource's records
    #[serde(rename = "idAttr", default = "default_id_attr")]
    pub id_attr: String,
    /// Foreign-key field name. Carried for callers, not used by the store itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fk: Option<String>,
}

impl StoreConfig {
    pub fn new(name: impl Into<String>) -> Self {
        StoreConfig {
            name: name.into(),
            id_attr: default_id_attr(),
            fk: None,
        }
    }

    pub fn with_id_attr(mut self, id_attr: impl Into<String>) -> Self {
        self.id_attr = id_attr.into();
        self
    }

    pub fn with_fk(mut self, fk: impl Into<String>) -> Self {
        self.fk = Some(fk.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig("name must not be empty".into()));
        }
        if self.id_attr.trim().is_empty() {
            return Err(Error::InvalidConfig("idAttr must not be empty".into()));
        }
        if self.id_attr == SURROGATE_KEY {
            return Err(Error::InvalidConfig(format!(
                "idAttr cannot be the reserved field {}",
                SURROGATE_KEY
            )));
        }
        Ok(())
    }
}
