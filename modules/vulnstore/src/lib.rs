pub mod error;
pub mod service;

pub use error::Error;
pub use service::{GetOpts, MatchConstraint, StoreService};
