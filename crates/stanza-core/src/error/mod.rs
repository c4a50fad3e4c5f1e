//! Domain and routing errors

mod domain_error;
mod route_error;

pub use domain_error::DomainError;
pub use route_error::RouteError;
