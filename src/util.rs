use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::ingest::protocol::DEFAULT_PORT;

const NETSERVICE_PORT: &str = "NETSERVICE_PORT";

pub fn get_default_port() -> u16 {
    DEFAULT_PORT
}

pub fn get_port() -> Option<u16> {
    let port_from_env = std::env::var(NETSERVICE_PORT);
    port_from_env.ok().and_then(|res| res.parse().ok())
}

const NETSERVICE_ADDR: &str = "NETSERVICE_ADDR";

const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

pub fn get_default_addr() -> IpAddr {
    DEFAULT_ADDR
}

pub fn get_addr() -> Option<IpAddr> {
    let addr_from_env = std::env::var(NETSERVICE_ADDR);
    addr_from_env.ok().and_then(|res| res.parse().ok())
}

const NETSERVICE_LOG: &str = "NETSERVICE_LOG";

pub fn get_log_path() -> Option<PathBuf> {
    std::env::var(NETSERVICE_LOG).ok().map(PathBuf::from)
}
