pub mod assertion;
pub mod browser;
pub mod report;
pub mod result;
pub mod runner;
pub mod scenario;
pub mod session;
pub mod target;
pub mod wait;
