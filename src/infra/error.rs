use std::{io, net::SocketAddr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("http server stopped unexpectedly: {0}")]
    Serve(#[source] io::Error),
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[source] io::Error),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn bind(addr: SocketAddr, source: io::Error) -> Self {
        Self::Bind { addr, source }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_error_names_the_address() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
        let error = InfraError::bind(addr, io::Error::from(io::ErrorKind::AddrInUse));
        assert!(error.to_string().starts_with("failed to bind listener on 127.0.0.1:3000"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
