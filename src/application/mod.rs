// Application layer: balance operations, approval workflow and their errors.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
