//! Listening socket setup
//!
//! Turns each configured bind spec into a bound, listening socket registered
//! with the runtime, plus the pool counters its acceptors share. Any failure
//! aborts the whole setup; there is no partial listener set.

use socket2::{Domain, Protocol, Socket, Type};
use sparepool_core::log_info;
use sparepool_core::{BindSpec, Config, Error, PoolCounters, Result};
use std::fmt;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::pin::Pin;
use std::rc::Rc;
use tokio::net::{TcpListener, TcpStream};

/// Pending result of [`AcceptSource::accept`]
pub type AcceptFuture<'a> =
    Pin<Box<dyn Future<Output = io::Result<(TcpStream, SocketAddr)>> + 'a>>;

/// Supplier of accepted connections for one listener
pub trait AcceptSource: fmt::Debug {
    /// Wait for the next connection
    fn accept(&self) -> AcceptFuture<'_>;
}

impl AcceptSource for TcpListener {
    fn accept(&self) -> AcceptFuture<'_> {
        Box::pin(TcpListener::accept(self))
    }
}

/// One listening socket and the live state of its acceptor pool
#[derive(Debug)]
pub struct ListenerRecord {
    index: usize,
    spec: BindSpec,
    local_addr: SocketAddr,
    source: Box<dyn AcceptSource>,
    counters: PoolCounters,
}

/// All listeners, indexed by listener index
pub type ListenerTable = Vec<Rc<ListenerRecord>>;

impl ListenerRecord {
    /// Bind and listen on `addr`, then register the socket with the runtime
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(index: usize, spec: BindSpec, addr: SocketAddr, backlog: u32) -> Result<Self> {
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
            .map_err(Error::Socket)?;
        socket.set_reuse_address(true).map_err(Error::ReuseAddr)?;
        socket
            .bind(&addr.into())
            .map_err(|source| Error::Bind { addr, source })?;
        socket
            .listen(i32::try_from(backlog).unwrap_or(i32::MAX))
            .map_err(|source| Error::Listen { addr, source })?;

        let socket = register(socket, addr)?;
        let local_addr = socket.local_addr()?;

        Ok(Self::from_source(index, spec, local_addr, socket))
    }

    /// Build a record around an already listening source
    pub fn from_source(
        index: usize,
        spec: BindSpec,
        local_addr: SocketAddr,
        source: impl AcceptSource + 'static,
    ) -> Self {
        Self {
            index,
            spec,
            local_addr,
            source: Box::new(source),
            counters: PoolCounters::new(),
        }
    }

    /// Position in the listener table
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bind spec this listener was created from
    pub fn spec(&self) -> &BindSpec {
        &self.spec
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Pool counters shared by this listener's acceptors
    pub fn counters(&self) -> &PoolCounters {
        &self.counters
    }

    /// Wait for the next connection
    ///
    /// Any number of tasks may wait here at once; each connection is handed
    /// to exactly one of them.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.source.accept().await
    }
}

/// Hand a listening socket over to the runtime's reactor
fn register(socket: Socket, addr: SocketAddr) -> Result<TcpListener> {
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(Error::Register {
            addr,
            source: io::Error::new(io::ErrorKind::Other, "no tokio runtime entered"),
        });
    }

    socket
        .set_nonblocking(true)
        .map_err(|source| Error::Register { addr, source })?;
    TcpListener::from_std(socket.into()).map_err(|source| Error::Register { addr, source })
}

/// Resolve a bind spec to an IPv4 socket address
///
/// Dotted-decimal hosts are used as-is; anything else goes through the
/// system resolver, which blocks. Only called during startup.
pub fn resolve(spec: &BindSpec) -> Result<SocketAddr> {
    if let Ok(ip) = spec.host.parse::<Ipv4Addr>() {
        return Ok(SocketAddr::from((ip, spec.port)));
    }

    let resolve_error = |source| Error::Resolve {
        host: spec.host.clone(),
        source,
    };

    (spec.host.as_str(), spec.port)
        .to_socket_addrs()
        .map_err(resolve_error)?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            resolve_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no IPv4 address for host",
            ))
        })
}

/// Resolve and open one listener
pub fn open_listener(index: usize, spec: BindSpec, backlog: u32) -> Result<ListenerRecord> {
    let addr = resolve(&spec)?;
    ListenerRecord::bind(index, spec, addr, backlog)
}

/// Open every configured listener
pub fn create_listeners(config: &Config) -> Result<ListenerTable> {
    let specs = config.bind_specs()?;
    if specs.len() > config.server.max_bind_addresses {
        return Err(Error::config(format!(
            "Too many bind addresses: {} (maximum {})",
            specs.len(),
            config.server.max_bind_addresses
        )));
    }

    let mut table = Vec::with_capacity(specs.len());
    for (index, spec) in specs.into_iter().enumerate() {
        let record = open_listener(index, spec, config.server.listen_backlog)?;
        log_info!(
            "Listener {} bound to {} ({})",
            record.index(),
            record.local_addr(),
            record.spec()
        );
        table.push(Rc::new(record));
    }

    Ok(table)
}
