pub mod daemon;
pub mod init;
pub mod status;
pub mod utils;

pub use daemon::{check_now, run};
pub use init::init;
pub use status::status;
