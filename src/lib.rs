pub mod cli;
pub mod dns;
pub mod e2e;
pub mod input;
pub mod network;
pub mod report;
pub mod scanner;
pub mod utils;

pub use dns::*;
pub use e2e::*;
pub use input::*;
pub use network::*;
pub use report::*;
pub use scanner::*;
pub use utils::*;
