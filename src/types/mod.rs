pub mod document;
pub mod healthz;
pub mod method;
pub mod owner;
pub mod response;
pub mod role;
pub mod session;
