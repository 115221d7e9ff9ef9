use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use openssl::ssl::{SslAcceptor, SslAcceptorBuilder, SslMethod};
use serde_json::Value;

use crate::server::authn::factory::AuthnFactory;
use crate::server::authn::password::CredentialVerifier;
use crate::server::authn::token::factory::TokenFactory;
use crate::server::authn::{ANONYMOUS_ID, ROOT_ID};
use crate::server::authz::factory::AuthzFactory;
use crate::server::authz::redact::PASSWORD_FIELD;
use crate::server::db::factory::DbFactory;
use crate::server::db::{Transaction, USERS};
use crate::server::handlers::api::ApiHandler;
use crate::server::handlers::healthz::HealthzHandler;
use crate::server::handlers::sessions::LoginHandler;
use crate::types::document::Document;

use super::config::ServerConfig;
use super::db::Database;
use super::recycle::factory::RecyclerFactory;
use super::recycle::Recycler;
use super::restful::{RestfulContext, RestfulServer};

pub struct ServerFactory {
    db: Arc<Database>,
    cfg: ServerConfig,
}

impl ServerFactory {
    /// Opens the database and makes sure the root and anonymous identities
    /// exist. The root password is reset to the configured one every time.
    pub fn new(cfg: ServerConfig) -> Result<Self> {
        let db_factory = DbFactory::new();
        let db = db_factory.build_db(&cfg.db).context("init database")?;

        let verifier = CredentialVerifier::new(cfg.authn.password_rounds);
        let root_hash = verifier.hash(&cfg.authn.root_password);
        db.with_transaction(|tx| Self::bootstrap(tx, &root_hash))
            .context("bootstrap users")?;

        Ok(Self { cfg, db })
    }

    fn bootstrap(tx: &dyn Transaction, root_hash: &str) -> Result<()> {
        if tx.is_document_exists(USERS, ROOT_ID)? {
            tx.update_user_password(ROOT_ID, root_hash)?;
        } else {
            let mut root = Document::new();
            root.insert(String::from("username"), Value::from("root"));
            root.insert(String::from(PASSWORD_FIELD), Value::from(root_hash));
            tx.create_document_with_id(USERS, ROOT_ID, &root)?;
            info!("Created root user");
        }

        if !tx.is_document_exists(USERS, ANONYMOUS_ID)? {
            let mut anonymous = Document::new();
            anonymous.insert(String::from("username"), Value::from("anonymous"));
            tx.create_document_with_id(USERS, ANONYMOUS_ID, &anonymous)?;
            info!("Created anonymous user");
        }

        Ok(())
    }

    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    pub fn build_server(&self) -> Result<RestfulServer> {
        let ssl = self.build_ssl()?;
        let ctx = self.build_context()?;

        let mut srv =
            RestfulServer::new(self.cfg.bind.clone(), ssl, ctx, self.cfg.payload_limit_mib);
        if self.cfg.keep_alive_secs > 0 {
            srv.set_keep_alive_secs(self.cfg.keep_alive_secs);
        }
        if self.cfg.workers > 0 {
            srv.set_workers(self.cfg.workers);
        }

        Ok(srv)
    }

    pub fn build_ssl(&self) -> Result<Option<SslAcceptorBuilder>> {
        if !self.cfg.ssl {
            return Ok(None);
        }

        let mut builder =
            SslAcceptor::mozilla_intermediate(SslMethod::tls()).context("init ssl acceptor")?;

        builder
            .set_private_key_file(&self.cfg.key_path, openssl::ssl::SslFiletype::PEM)
            .context("load ssl key file")?;
        builder
            .set_certificate_chain_file(&self.cfg.cert_path)
            .context("load ssl cert file")?;

        Ok(Some(builder))
    }

    pub fn build_context(&self) -> Result<Arc<RestfulContext>> {
        let token_factory = TokenFactory::new(&self.cfg.authn.token).context("init token")?;

        let authz_factory = AuthzFactory::new(&self.cfg.authz);
        let authz = authz_factory
            .build_authorizer()
            .context("init authorizer")?;

        let authn_factory = AuthnFactory::new(&self.cfg.authn);
        let verifier = authn_factory.build_verifier();
        let authn = authn_factory.build_authenticator(
            authz_factory.api_keys(),
            token_factory.build_token().context("init authn token")?,
            self.db.clone(),
        );

        let redactor = authz_factory.build_redactor(verifier.clone());
        let api_handler = ApiHandler::new(authn, authz, redactor, self.db.clone());

        let login_handler = LoginHandler::new(
            token_factory.build_token().context("init login token")?,
            verifier,
            self.db.clone(),
        );
        let healthz_handler = HealthzHandler::new(self.db.clone());

        let ctx = RestfulContext {
            api_handler,
            healthz_handler,
            login_handler,
        };
        Ok(Arc::new(ctx))
    }

    pub fn build_recycler(&self) -> Option<Recycler> {
        let factory = RecyclerFactory::new();
        factory.build_recycler(&self.cfg.recycle, &self.cfg.authn.token, self.db.clone())
    }

    pub fn payload_limit_mib(&self) -> usize {
        self.cfg.payload_limit_mib
    }
}
