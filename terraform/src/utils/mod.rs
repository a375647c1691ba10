pub mod ftext;
pub mod lgp;
pub mod tracing;
