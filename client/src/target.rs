// target.rs

use std::{fmt, str::FromStr};

use crate::error::TargetError;

/// Where the client dials. Built once from `host:port` and never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    host: String,
    port: u16,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, TargetError> {
        let host = host.into();
        if host.is_empty() {
            return Err(TargetError::MissingHost);
        }
        if port == 0 {
            return Err(TargetError::InvalidPort);
        }
        Ok(ConnectionTarget { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for ConnectionTarget {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TargetError::MissingPort);
        };
        let port = port.parse::<u16>().map_err(|_| TargetError::InvalidPort)?;
        ConnectionTarget::new(host, port)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
