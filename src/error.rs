//! Errors surfaced to the caller.
//!
//! Only startup problems end up here. Send/receive failures, timeouts and
//! mismatched responses are absorbed by the workers and only logged.

/// Configuration or startup failure.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A numeric parameter is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Host name lookup failed.
    #[error("cannot find host {host:?}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Host name lookup succeeded but returned nothing usable.
    #[error("host {host:?} resolved to no address")]
    NoAddress { host: String },

    /// The responder socket could not be bound.
    #[error("cannot bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be created.
    #[error("cannot start worker pool: {0}")]
    Runtime(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Crate-level result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_input() {
        let err = Error::NoAddress { host: "example".into() };
        assert_eq!(err.to_string(), "host \"example\" resolved to no address");

        let err = Error::Bind {
            port: 10000,
            source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
        };
        assert!(err.to_string().starts_with("cannot bind UDP port 10000: "));

        let err = Error::invalid("thread count must be positive");
        assert_eq!(err.to_string(), "invalid configuration: thread count must be positive");
    }
}
