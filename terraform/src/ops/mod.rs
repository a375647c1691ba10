pub mod terraform_compile;
pub mod terraform_extract;
