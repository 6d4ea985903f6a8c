pub mod cookies;
pub mod errors;
pub mod guard;
pub mod metrics;
pub mod openapi;
pub mod routes;
pub mod startup;
pub mod state;
pub mod throttle;

pub use startup::run;
