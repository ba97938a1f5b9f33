/// Race Detection Domain Models
pub mod access;
pub mod lock;
pub mod race;
pub mod report;

pub use access::*;
pub use lock::*;
pub use race::*;
pub use report::*;
