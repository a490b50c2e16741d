mod build;
mod inspect;
mod status;

pub use build::cmd_build;
pub use inspect::cmd_inspect;
pub use status::cmd_status;
