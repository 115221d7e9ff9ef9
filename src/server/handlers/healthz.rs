use std::sync::Arc;
use std::time::Instant;

use actix_web::HttpRequest;
use chrono::Local;
use log::error;

use crate::server::authn::ROOT_ID;
use crate::server::db::{Database, USERS};
use crate::server::response::Response;
use crate::types::healthz::HealthzResponse;

use super::Handler;

/// Liveness probe. Touches the store once so that a broken database shows up
/// as 503 instead of a healthy server.
pub struct HealthzHandler {
    db: Arc<Database>,
    started: Instant,
}

impl HealthzHandler {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            started: Instant::now(),
        }
    }
}

impl Handler for HealthzHandler {
    fn handle(&self, _path: &str, req: HttpRequest, _body: Option<Vec<u8>>) -> Response {
        let bootstrapped = match self
            .db
            .with_transaction(|tx| tx.is_document_exists(USERS, ROOT_ID))
        {
            Ok(exists) => exists,
            Err(e) => {
                error!("Healthz store check failed: {e:#}");
                return Response::unavailable("store is not reachable");
            }
        };

        let local = Local::now();
        Response::json(HealthzResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            now: local.timestamp() as u64,
            time_zone: format!("{}", local.offset()),
            uptime_secs: self.started.elapsed().as_secs(),
            client_ip: req.connection_info().peer_addr().map(|a| a.to_string()),
            bootstrapped,
        })
    }
}
