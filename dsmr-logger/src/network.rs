use std::{
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("cannot resolve {0}")]
    Resolve(String),
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end the scheduler loop.
#[derive(thiserror::Error, Debug)]
pub enum FatalError {
    #[error("network link not up within {timeout:?}: {source}")]
    NetworkTimeout {
        timeout: Duration,
        #[source]
        source: NetworkError,
    },
}

pub trait NetworkLink {
    fn is_up(&mut self) -> bool;

    /// Blocks for at most `timeout`.
    fn connect(&mut self, timeout: Duration) -> Result<(), NetworkError>;
}

/// Treats the link as up when a TCP connection to `probe_addr` succeeds.
pub struct TcpProbeLink {
    probe_addr: String,
}

/// Bound on the housekeeping check; `connect` uses the configured timeout.
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

impl TcpProbeLink {
    pub fn new(probe_addr: impl Into<String>) -> Self {
        Self {
            probe_addr: probe_addr.into(),
        }
    }

    fn resolve(&self) -> Result<SocketAddr, NetworkError> {
        self.probe_addr
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| NetworkError::Resolve(self.probe_addr.clone()))
    }

    fn probe(&self, timeout: Duration) -> Result<(), NetworkError> {
        let addr = self.resolve()?;
        TcpStream::connect_timeout(&addr, timeout)
            .map(drop)
            .map_err(|source| NetworkError::Connect {
                addr: self.probe_addr.clone(),
                source,
            })
    }
}

impl NetworkLink for TcpProbeLink {
    fn is_up(&mut self) -> bool {
        self.probe(CHECK_TIMEOUT).is_ok()
    }

    fn connect(&mut self, timeout: Duration) -> Result<(), NetworkError> {
        self.probe(timeout)
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    use super::*;

    /// Link whose connect attempts succeed or fail from a shared script.
    /// An empty script means success.
    #[derive(Clone, Default)]
    pub struct ScriptedLink {
        pub up: Rc<RefCell<bool>>,
        pub outcomes: Rc<RefCell<VecDeque<bool>>>,
        pub attempts: Rc<RefCell<u32>>,
    }

    impl NetworkLink for ScriptedLink {
        fn is_up(&mut self) -> bool {
            *self.up.borrow()
        }

        fn connect(&mut self, _timeout: Duration) -> Result<(), NetworkError> {
            *self.attempts.borrow_mut() += 1;
            let ok = self.outcomes.borrow_mut().pop_front().unwrap_or(true);
            *self.up.borrow_mut() = ok;
            if ok {
                Ok(())
            } else {
                Err(NetworkError::Connect {
                    addr: "scripted".to_string(),
                    source: std::io::ErrorKind::TimedOut.into(),
                })
            }
        }
    }
}
