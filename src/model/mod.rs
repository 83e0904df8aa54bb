pub mod artifact;
pub mod branch;
pub mod common;
pub mod composite_id;
pub mod element;
pub mod filter;
pub mod org;
pub mod user_context;

pub use artifact::*;
pub use branch::*;
pub use common::*;
pub use composite_id::{BranchScope, ProjectScope};
pub use element::*;
pub use filter::*;
pub use org::*;
pub use user_context::*;
