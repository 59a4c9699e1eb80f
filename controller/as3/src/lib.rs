//! Compiles terminating gateway topologies into F5 AS3 declarations and
//! applies them to a BIG-IP.
//!
//! Each snapshot compiles to a complete declaration of one tenant holding one
//! application:
//!
//! - `TG_Vserver` listens on the gateway's address, terminates TLS with
//!   `webtls` and routes on SNI with `SNIrouting`.
//! - Each service contributes a `<service>-pool` of its instances, a
//!   `<service>-cert` presented for its name, and a `forward_to_<service>`
//!   routing rule.
//! - `cabundle` holds the mesh roots that client certificates must chain to.
//! - `intentionRule` authorizes each connection by looking up
//!   `<source>:<destination>` in the `target-dg` data group.

#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod agent;
mod compile;
pub mod declaration;

#[cfg(test)]
mod tests;

pub use self::{
    agent::{Agent, AgentConfig},
    compile::{Compiler, DEFAULT_SCHEMA, DEFAULT_SCHEMA_VERSION},
    declaration::{As3Request, Rendered, TENANT},
};
