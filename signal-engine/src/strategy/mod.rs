//! Strategy engine module
//!
//! Directional decision logic, optional multi-timeframe confirmation and
//! the validator every emitted signal passes.

pub mod consensus;
pub mod decision;
pub mod validator;

pub use consensus::*;
pub use decision::*;
pub use validator::*;
