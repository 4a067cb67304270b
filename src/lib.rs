//! Educational MCP reference server over a simulated public-library domain:
//! books, authors, patrons, and circulation (checkouts, reservations,
//! fines), exposed as JSON-RPC 2.0 resources, tools, and prompts.

pub mod cancellation;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod outbound;
pub mod output_budget;
pub mod prompts;
pub mod protocol;
pub mod recommendations;
pub mod resources;
pub mod sampling;
pub mod server;
pub mod session;
pub mod store;
pub mod tools;
