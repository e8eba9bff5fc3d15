//! Command implementations for the oxitar CLI.

pub mod cat;
pub mod create;
pub mod extract;
pub mod info;
pub mod list;

pub use cat::cmd_cat;
pub use create::{CreateOptions, cmd_append, cmd_create};
pub use extract::{ExtractArgs, cmd_extract};
pub use info::cmd_info;
pub use list::{ListOptions, cmd_list};
