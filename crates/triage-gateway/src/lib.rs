//! HTTP surface of the triage service.

mod server;
mod types;


pub use server::{build_gateway_router, run_gateway_server, GatewayServerConfig, GatewayState};
