//! Write-side guards
//!
//! - `WriteGuard`: write rule re-evaluation before insert/replace/patch/delete
//! - `CountEnforcer`: per-bucket document limits on insert

mod count;
mod write;

pub use count::CountEnforcer;
pub use write::{WriteGuard, WriteOperation};
