//! CLI command implementations.

mod all;
mod config;
mod doctor;
mod init;
mod list;
mod run;
mod stage;
mod status;

pub use all::run_all;
pub use config::run_config;
pub use doctor::run_doctor;
pub use init::run_init;
pub use list::run_list;
pub use run::run_story;
pub use stage::run_stage;
pub use status::run_status;
