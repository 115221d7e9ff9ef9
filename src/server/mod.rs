pub mod authn;
pub mod authz;
pub mod db;
mod handlers;
mod response;

pub mod config;
pub mod factory;
pub mod recycle;
pub mod restful;
