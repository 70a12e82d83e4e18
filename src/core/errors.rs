use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpscoutError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("hosts file not writable: {0}")]
    HostsPermission(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
