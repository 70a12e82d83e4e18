pub mod domains;
pub mod hosts;
pub mod ports;
pub mod probe;
