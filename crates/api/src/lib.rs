//! Host process for the polling core: operational HTTP endpoints and
//! scheduler lifecycle hooks.

pub mod routes;
pub mod state;
