use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CommonConfig, PathSet};
use crate::types::method::Method;

use super::capability::CapabilityRegistry;
use super::matrix::{GrantTable, PermissionMatrix};

/// resource -> method -> 0/1
pub type GrantConfig = BTreeMap<String, BTreeMap<String, u8>>;

/// Authorization related configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthzConfig {
    /// The permission matrix: role name -> resource -> method -> 0/1.
    /// Missing entries never grant.
    #[serde(default = "AuthzConfig::default_roles")]
    pub roles: BTreeMap<String, GrantConfig>,

    /// Static api keys for machine clients, keyed by the key itself.
    /// Defaults to empty (api key authentication disabled).
    #[serde(default = "AuthzConfig::default_apikeys")]
    pub apikeys: BTreeMap<String, ApiKeyConfig>,

    /// Capability descriptor of every served resource. Requests for
    /// resources not listed here are answered with 404.
    #[serde(default = "AuthzConfig::default_resources")]
    pub resources: BTreeMap<String, ResourceConfig>,

    /// Fields of `users` that are synchronized from the directory and can
    /// only be changed by admins.
    #[serde(default = "AuthzConfig::default_directory_fields")]
    pub directory_fields: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiKeyConfig {
    pub name: String,

    #[serde(default)]
    pub permissions: GrantConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ResourceConfig {
    /// Methods anybody can call, without authentication.
    #[serde(default)]
    pub public_methods: Vec<Method>,

    /// Methods any authenticated user can call.
    #[serde(default)]
    pub registered_methods: Vec<Method>,

    /// Methods that require the caller to own the object, unless a role
    /// grants them.
    #[serde(default)]
    pub owner_methods: Vec<Method>,

    /// Field paths proving ownership, e.g. `user` or `event.organizer`.
    /// Any one matching is enough.
    #[serde(default)]
    pub owner_fields: Vec<String>,

    /// Relations usable as the non-final segments of owner field paths.
    #[serde(default)]
    pub relations: BTreeMap<String, RelationConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelationConfig {
    /// Related resource.
    pub resource: String,

    /// Foreign key columns: `local` on this resource equals `remote` on the
    /// related one.
    pub keys: Vec<KeyPairConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KeyPairConfig {
    pub local: String,
    pub remote: String,
}

impl CommonConfig for AuthzConfig {
    fn default() -> Self {
        Self {
            roles: Self::default_roles(),
            apikeys: Self::default_apikeys(),
            resources: Self::default_resources(),
            directory_fields: Self::default_directory_fields(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        PermissionMatrix::from_config(&self.roles).context("validate roles")?;
        for (key, apikey) in self.apikeys.iter() {
            GrantTable::from_config(&apikey.permissions)
                .with_context(|| format!("validate api key '{}'", apikey.name))?;
            if key.trim().is_empty() {
                anyhow::bail!("api key '{}' is empty", apikey.name);
            }
        }
        CapabilityRegistry::compile(&self.resources).context("validate resources")?;
        Ok(())
    }
}

impl AuthzConfig {
    pub fn default_roles() -> BTreeMap<String, GrantConfig> {
        let mut grants = GrantConfig::new();
        for resource in ["users", "sessions", "permissions", "events", "signups"] {
            let methods = Method::ALL
                .iter()
                .map(|m| (m.to_string(), 1))
                .collect::<BTreeMap<_, _>>();
            grants.insert(resource.to_string(), methods);
        }
        BTreeMap::from([(String::from("admin"), grants)])
    }

    pub fn default_apikeys() -> BTreeMap<String, ApiKeyConfig> {
        BTreeMap::new()
    }

    pub fn default_resources() -> BTreeMap<String, ResourceConfig> {
        use Method::*;

        let mut resources = BTreeMap::new();
        resources.insert(
            String::from("users"),
            ResourceConfig {
                registered_methods: vec![Get],
                owner_methods: vec![Patch],
                owner_fields: vec![String::from("id")],
                ..Default::default()
            },
        );
        resources.insert(
            String::from("sessions"),
            ResourceConfig {
                public_methods: vec![Post],
                owner_methods: vec![Get, Delete],
                owner_fields: vec![String::from("user")],
                ..Default::default()
            },
        );
        resources.insert(
            String::from("permissions"),
            ResourceConfig {
                owner_methods: vec![Get],
                owner_fields: vec![String::from("user")],
                ..Default::default()
            },
        );
        resources.insert(
            String::from("events"),
            ResourceConfig {
                public_methods: vec![Get],
                ..Default::default()
            },
        );
        resources.insert(
            String::from("signups"),
            ResourceConfig {
                owner_methods: vec![Get, Post, Put, Patch, Delete],
                owner_fields: vec![String::from("user"), String::from("event.organizer")],
                relations: BTreeMap::from([(
                    String::from("event"),
                    RelationConfig {
                        resource: String::from("events"),
                        keys: vec![KeyPairConfig {
                            local: String::from("event"),
                            remote: String::from("id"),
                        }],
                    },
                )]),
                ..Default::default()
            },
        );
        resources.insert(
            String::from("roles"),
            ResourceConfig {
                registered_methods: vec![Get],
                ..Default::default()
            },
        );
        resources
    }

    pub fn default_directory_fields() -> Vec<String> {
        [
            "username",
            "firstname",
            "lastname",
            "birthday",
            "legi",
            "nethz",
            "department",
            "phone",
            "ldap_address",
            "gender",
            "membership",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let mut cfg = AuthzConfig::default();
        let ps = PathSet {
            config_path: std::env::temp_dir(),
            data_path: std::env::temp_dir(),
            pki_path: std::env::temp_dir(),
        };
        cfg.complete(&ps).unwrap();
    }

    #[test]
    fn test_parse_toml() {
        let raw = r#"
            [roles.board.events]
            POST = 1
            PATCH = 1

            [apikeys.k-1]
            name = "reporting"
            permissions = { events = { GET = 1 } }

            [resources.signups]
            owner_methods = ["GET", "PATCH"]
            owner_fields = ["user", "event.organizer"]
            relations = { event = { resource = "events", keys = [{ local = "event", remote = "id" }] } }

            [resources.events]
            public_methods = ["GET"]
        "#;
        let cfg: AuthzConfig = toml::from_str(raw).unwrap();
        assert_eq!(cfg.roles["board"]["events"]["POST"], 1);
        assert_eq!(cfg.apikeys["k-1"].name, "reporting");
        assert_eq!(
            cfg.resources["signups"].owner_methods,
            vec![Method::Get, Method::Patch]
        );
        assert_eq!(cfg.resources["signups"].relations["event"].resource, "events");
        assert!(cfg.resources["events"].owner_fields.is_empty());
        // Unset sections keep their defaults
        assert_eq!(cfg.directory_fields.len(), 11);
    }
}
