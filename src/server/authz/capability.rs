use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{bail, Result};
use log::error;

use crate::types::document::is_field_name;
use crate::types::method::Method;
use crate::types::owner::{KeyPair, OwnerPath, OwnerStep};

use super::config::ResourceConfig;
use super::AuthzError;

/// Visibility tier a method falls into on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Public,
    Registered,
    Owner,
}

/// Static per-resource metadata, compiled from [`ResourceConfig`].
#[derive(Debug, Clone)]
pub struct ResourceCapability {
    pub name: String,
    pub public: BTreeSet<Method>,
    pub registered: BTreeSet<Method>,
    pub owner: BTreeSet<Method>,
    /// Owner field paths, pre-compiled into lookup steps. Any one matching
    /// proves ownership.
    pub owner_paths: Vec<OwnerPath>,
}

impl ResourceCapability {
    /// `None` means the method is admin-only on this resource.
    pub fn tier(&self, method: Method) -> Option<Tier> {
        if self.public.contains(&method) {
            Some(Tier::Public)
        } else if self.registered.contains(&method) {
            Some(Tier::Registered)
        } else if self.owner.contains(&method) {
            Some(Tier::Owner)
        } else {
            None
        }
    }
}

/// Every served resource's capability, keyed by resource name.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    resources: HashMap<String, ResourceCapability>,
}

impl CapabilityRegistry {
    /// Validates and compiles the configured resources. Fails on a method
    /// listed in more than one tier and on owner paths that can not be
    /// walked.
    pub fn compile(cfg: &BTreeMap<String, ResourceConfig>) -> Result<Self> {
        let mut resources = HashMap::with_capacity(cfg.len());
        for (name, resource) in cfg.iter() {
            if !is_field_name(name) {
                bail!("invalid resource name '{name}'");
            }

            let mut public = BTreeSet::new();
            let mut registered = BTreeSet::new();
            let mut owner = BTreeSet::new();
            let tiers = [
                (&resource.public_methods, &mut public),
                (&resource.registered_methods, &mut registered),
                (&resource.owner_methods, &mut owner),
            ];
            let mut seen = BTreeSet::new();
            for (methods, set) in tiers {
                for method in methods.iter() {
                    if !seen.insert(*method) {
                        bail!("method {method} of resource '{name}' is listed in more than one tier");
                    }
                    set.insert(*method);
                }
            }

            let mut owner_paths = Vec::with_capacity(resource.owner_fields.len());
            for raw in resource.owner_fields.iter() {
                owner_paths.push(compile_path(cfg, name, raw)?);
            }
            if !owner.is_empty() && owner_paths.is_empty() {
                error!(
                    "Resource '{name}' has owner methods but no owner fields, these methods will always be denied"
                );
            }

            resources.insert(
                name.clone(),
                ResourceCapability {
                    name: name.clone(),
                    public,
                    registered,
                    owner,
                    owner_paths,
                },
            );
        }
        Ok(Self { resources })
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.resources.contains_key(resource)
    }

    pub fn get(&self, resource: &str) -> Result<&ResourceCapability, AuthzError> {
        match self.resources.get(resource) {
            Some(capability) => Ok(capability),
            None => Err(AuthzError::ConfigurationGap(format!(
                "resource '{resource}' is not registered"
            ))),
        }
    }
}

fn compile_path(
    cfg: &BTreeMap<String, ResourceConfig>,
    resource: &str,
    raw: &str,
) -> Result<OwnerPath> {
    let segments: Vec<&str> = raw.split('.').collect();
    for segment in segments.iter() {
        if !is_field_name(segment) {
            bail!("invalid owner field '{raw}' of resource '{resource}'");
        }
    }

    let (field, relations) = match segments.split_last() {
        Some(parts) => parts,
        None => bail!("empty owner field of resource '{resource}'"),
    };

    let mut steps = Vec::with_capacity(segments.len());
    let mut current = resource;
    for name in relations.iter() {
        let relation = match cfg.get(current).and_then(|r| r.relations.get(*name)) {
            Some(relation) => relation,
            None => bail!(
                "owner field '{raw}' of resource '{resource}': '{current}' has no relation '{name}'"
            ),
        };
        if !cfg.contains_key(&relation.resource) {
            bail!(
                "relation '{name}' of '{current}' points to unregistered resource '{}'",
                relation.resource
            );
        }
        if relation.keys.is_empty() {
            bail!("relation '{name}' of '{current}' has no keys");
        }

        let mut keys = Vec::with_capacity(relation.keys.len());
        for key in relation.keys.iter() {
            if !is_field_name(&key.local) || !is_field_name(&key.remote) {
                bail!("relation '{name}' of '{current}' has an invalid key");
            }
            keys.push(KeyPair {
                local: key.local.clone(),
                remote: key.remote.clone(),
            });
        }

        steps.push(OwnerStep::Relation {
            name: name.to_string(),
            resource: relation.resource.clone(),
            keys,
        });
        current = &relation.resource;
    }
    steps.push(OwnerStep::Field(field.to_string()));

    Ok(OwnerPath::new(raw, steps))
}

#[cfg(test)]
mod tests {
    use crate::config::CommonConfig;
    use crate::server::authz::config::{AuthzConfig, KeyPairConfig, RelationConfig};

    use super::*;

    #[test]
    fn test_compile_default() {
        let registry = CapabilityRegistry::compile(&AuthzConfig::default().resources).unwrap();

        let signups = registry.get("signups").unwrap();
        assert_eq!(signups.tier(Method::Patch), Some(Tier::Owner));
        assert_eq!(signups.owner_paths.len(), 2);
        assert_eq!(
            signups.owner_paths[0].steps(),
            &[OwnerStep::Field("user".to_string())]
        );
        assert_eq!(signups.owner_paths[1].raw(), "event.organizer");
        assert_eq!(
            signups.owner_paths[1].steps(),
            &[
                OwnerStep::Relation {
                    name: "event".to_string(),
                    resource: "events".to_string(),
                    keys: vec![KeyPair {
                        local: "event".to_string(),
                        remote: "id".to_string(),
                    }],
                },
                OwnerStep::Field("organizer".to_string()),
            ]
        );

        let events = registry.get("events").unwrap();
        assert_eq!(events.tier(Method::Get), Some(Tier::Public));
        assert_eq!(events.tier(Method::Post), None);

        let users = registry.get("users").unwrap();
        assert_eq!(users.tier(Method::Get), Some(Tier::Registered));

        assert!(!registry.contains("files"));
        assert!(matches!(
            registry.get("files"),
            Err(AuthzError::ConfigurationGap(_))
        ));
    }

    #[test]
    fn test_compile_errors() {
        let mut cfg = BTreeMap::new();
        cfg.insert(
            "events".to_string(),
            ResourceConfig {
                public_methods: vec![Method::Get],
                owner_methods: vec![Method::Get],
                owner_fields: vec!["organizer".to_string()],
                ..Default::default()
            },
        );
        assert!(CapabilityRegistry::compile(&cfg).is_err());

        // Relation not declared
        let mut cfg = BTreeMap::new();
        cfg.insert(
            "signups".to_string(),
            ResourceConfig {
                owner_methods: vec![Method::Get],
                owner_fields: vec!["event.organizer".to_string()],
                ..Default::default()
            },
        );
        assert!(CapabilityRegistry::compile(&cfg).is_err());

        // Relation to an unregistered resource
        let mut signups = ResourceConfig {
            owner_methods: vec![Method::Get],
            owner_fields: vec!["event.organizer".to_string()],
            ..Default::default()
        };
        signups.relations.insert(
            "event".to_string(),
            RelationConfig {
                resource: "events".to_string(),
                keys: vec![KeyPairConfig {
                    local: "event".to_string(),
                    remote: "id".to_string(),
                }],
            },
        );
        let mut cfg = BTreeMap::new();
        cfg.insert("signups".to_string(), signups.clone());
        assert!(CapabilityRegistry::compile(&cfg).is_err());

        cfg.insert("events".to_string(), ResourceConfig::default());
        assert!(CapabilityRegistry::compile(&cfg).is_ok());

        // Malformed path segments
        signups.owner_fields = vec!["event..organizer".to_string()];
        cfg.insert("signups".to_string(), signups.clone());
        assert!(CapabilityRegistry::compile(&cfg).is_err());

        // Owner methods without owner fields are accepted
        signups.owner_fields.clear();
        cfg.insert("signups".to_string(), signups);
        let registry = CapabilityRegistry::compile(&cfg).unwrap();
        assert!(registry.get("signups").unwrap().owner_paths.is_empty());
    }
}
