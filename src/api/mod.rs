// API module
//
// HTTP surface over the ledger: routing, JSON marshalling and error mapping

pub mod handlers;
pub mod routes;
pub mod schema;

// Re-export main components for easier access
pub use routes::configure_routes;
