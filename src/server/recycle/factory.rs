use std::sync::Arc;

use log::warn;

use crate::server::authn::token::config::{TokenConfig, TokenScheme};
use crate::server::db::Database;

use super::config::RecycleConfig;
use super::Recycler;

pub struct RecyclerFactory;

impl RecyclerFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn build_recycler(
        &self,
        cfg: &RecycleConfig,
        token: &TokenConfig,
        db: Arc<Database>,
    ) -> Option<Recycler> {
        if !cfg.enable {
            warn!("Recycle sessions is disabled");
            return None;
        }
        if token.scheme != TokenScheme::Session {
            return None;
        }
        if token.expiry == 0 {
            warn!("Tokens never expire, sessions will not be recycled");
            return None;
        }

        Some(Recycler::new(db, cfg.interval_secs, token.expiry))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::CommonConfig;

    use super::*;

    #[test]
    fn test_factory() {
        let db = Arc::new(Database::new_test());
        let factory = RecyclerFactory::new();

        let cfg = RecycleConfig::default();
        let mut token = TokenConfig::default();
        assert!(factory.build_recycler(&cfg, &token, db.clone()).is_some());

        token.expiry = 0;
        assert!(factory.build_recycler(&cfg, &token, db.clone()).is_none());

        let mut cfg = RecycleConfig::default();
        cfg.enable = false;
        let token = TokenConfig::default();
        assert!(factory.build_recycler(&cfg, &token, db).is_none());
    }
}
