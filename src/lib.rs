pub mod batch;
pub mod cli;
pub mod driver;
pub mod error;
pub mod job;
pub mod label;
pub mod scheduler;
pub mod single;
pub mod toolchain;
pub mod unit;

pub use driver::run;
