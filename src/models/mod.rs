pub mod appointment;
pub mod audit;
pub mod enums;
pub mod patient;
pub mod report;
pub mod user;

pub use appointment::*;
pub use audit::*;
pub use enums::*;
pub use patient::*;
pub use report::*;
pub use user::*;
