use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::server::authn::password::CredentialVerifier;

use super::apikey::ApiKeyAuthorizer;
use super::capability::CapabilityRegistry;
use super::chain::ChainAuthorizer;
use super::config::AuthzConfig;
use super::guard::RequestAuthorizer;
use super::matrix::{GrantTable, PermissionMatrix};
use super::redact::FieldRedactor;
use super::role::RoleAuthorizer;
use super::root::RootAuthorizer;
use super::tier::TierAuthorizer;
use super::union::UnionAuthorizer;

/// Builds the authorization chain, in this order:
/// 1. Api key grants (if any key is configured)
/// 2. Root
/// 3. Role grants from the permission matrix
/// 4. Resource visibility tiers
pub struct AuthzFactory<'a> {
    cfg: &'a AuthzConfig,
}

impl<'a> AuthzFactory<'a> {
    pub fn new(cfg: &'a AuthzConfig) -> Self {
        Self { cfg }
    }

    pub fn build_authorizer(&self) -> Result<RequestAuthorizer> {
        let registry = CapabilityRegistry::compile(&self.cfg.resources)
            .context("compile resource capabilities")?;
        let registry = Arc::new(registry);

        let matrix =
            PermissionMatrix::from_config(&self.cfg.roles).context("build permission matrix")?;
        let matrix = Arc::new(matrix);
        if self.cfg.roles.is_empty() {
            warn!("No role configured, only root can manage resources");
        }

        let mut authorizers = vec![];

        if !self.cfg.apikeys.is_empty() {
            let mut keys = HashMap::with_capacity(self.cfg.apikeys.len());
            for (key, apikey) in self.cfg.apikeys.iter() {
                let table = GrantTable::from_config(&apikey.permissions)
                    .with_context(|| format!("build grants of api key '{}'", apikey.name))?;
                keys.insert(key.clone(), table);
            }
            info!("Loaded {} api key(s)", keys.len());
            authorizers.push(UnionAuthorizer::ApiKey(ApiKeyAuthorizer::new(keys)));
        }

        authorizers.push(UnionAuthorizer::Root(RootAuthorizer::new()));
        authorizers.push(UnionAuthorizer::Role(RoleAuthorizer::new(matrix.clone())));
        authorizers.push(UnionAuthorizer::Tier(TierAuthorizer::new(registry.clone())));

        let chain = ChainAuthorizer::new(authorizers);
        Ok(RequestAuthorizer::new(chain, registry, matrix))
    }

    pub fn build_redactor(&self, verifier: CredentialVerifier) -> FieldRedactor {
        FieldRedactor::new(self.cfg.directory_fields.iter().cloned(), verifier)
    }

    /// Configured api keys mapped to their names, for authentication.
    pub fn api_keys(&self) -> HashMap<String, String> {
        self.cfg
            .apikeys
            .iter()
            .map(|(key, apikey)| (key.clone(), apikey.name.clone()))
            .collect()
    }
}
