//! Core types shared across the resolver: the error taxonomy and the
//! result value returned from every resolution call.

pub mod error;
pub mod result;

pub use error::ResolverError;
pub use result::ResolutionResult;
