use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::server::authn::ROOT_ID;
use crate::server::db::Transaction;
use crate::types::method::Method;
use crate::types::role::MethodGrants;

use super::config::GrantConfig;

/// resource -> granted methods. Only explicit `1` entries grant.
#[derive(Debug, Clone, Default)]
pub struct GrantTable {
    grants: HashMap<String, HashSet<Method>>,
}

impl GrantTable {
    pub fn from_config(cfg: &GrantConfig) -> Result<Self> {
        let mut grants = HashMap::with_capacity(cfg.len());
        for (resource, methods) in cfg.iter() {
            let granted: &mut HashSet<Method> = grants.entry(resource.clone()).or_default();
            for (method, value) in methods.iter() {
                let method = Method::from_str(method)
                    .with_context(|| format!("invalid grant for resource '{resource}'"))?;
                match value {
                    0 => {}
                    1 => {
                        granted.insert(method);
                    }
                    _ => bail!("grant of {method} on '{resource}' should be 0 or 1, found {value}"),
                }
            }
        }
        Ok(Self { grants })
    }

    pub fn grants(&self, resource: &str, method: Method) -> bool {
        self.grants
            .get(resource)
            .map(|methods| methods.contains(&method))
            .unwrap_or(false)
    }

    /// Every resource of the table with all five methods spelled out.
    pub fn expand(&self) -> BTreeMap<String, MethodGrants> {
        self.grants
            .iter()
            .map(|(resource, methods)| {
                let mut expanded = MethodGrants::default();
                for method in methods.iter() {
                    expanded.set(*method, 1);
                }
                (resource.clone(), expanded)
            })
            .collect()
    }
}

/// Role name -> grant table. Immutable once built.
pub struct PermissionMatrix {
    roles: HashMap<String, GrantTable>,
}

impl PermissionMatrix {
    pub fn new(roles: HashMap<String, GrantTable>) -> Self {
        Self { roles }
    }

    pub fn from_config(cfg: &BTreeMap<String, GrantConfig>) -> Result<Self> {
        let mut roles = HashMap::with_capacity(cfg.len());
        for (role, table) in cfg.iter() {
            let table =
                GrantTable::from_config(table).with_context(|| format!("invalid role '{role}'"))?;
            roles.insert(role.clone(), table);
        }
        Ok(Self::new(roles))
    }

    pub fn role_grants(&self, role: &str, resource: &str, method: Method) -> bool {
        self.roles
            .get(role)
            .map(|table| table.grants(resource, method))
            .unwrap_or(false)
    }

    /// Whether any role assigned to `user` grants `method` on `resource`.
    /// Root holds every grant without a lookup.
    pub fn has_role_grant(
        &self,
        tx: &dyn Transaction,
        user: i64,
        resource: &str,
        method: Method,
    ) -> Result<bool> {
        if user == ROOT_ID {
            return Ok(true);
        }

        let roles = tx.list_user_roles(user)?;
        Ok(roles
            .iter()
            .any(|role| self.role_grants(role, resource, method)))
    }

    pub fn introspect(&self) -> BTreeMap<String, BTreeMap<String, MethodGrants>> {
        self.roles
            .iter()
            .map(|(role, table)| (role.clone(), table.expand()))
            .collect()
    }
}
