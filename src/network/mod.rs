use std::net::IpAddr;

pub mod icmp;

pub use icmp::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Address family of a literal IP target; `None` for anything else.
    pub fn of(target: &str) -> Option<Self> {
        match target.parse::<IpAddr>().ok()? {
            IpAddr::V4(_) => Some(IpVersion::V4),
            IpAddr::V6(_) => Some(IpVersion::V6),
        }
    }
}
