pub mod ast;
pub mod execute;
pub mod redirect;
pub mod worker;
