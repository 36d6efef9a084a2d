//! TCP listener and stream adapters over the reactor.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::os::fd::RawFd;

use crate::error::{Error, Result};
use crate::fd::AsyncFd;
use crate::metrics;
use crate::reactor::{Interest, ReactorHandle, wait_event};

pub(crate) fn sockaddr_to_socket_addr(
    addr: &libc::sockaddr_storage,
    len: u32,
) -> Option<SocketAddr> {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
    match addr.ss_family as libc::c_int {
        libc::AF_INET if len >= std::mem::size_of::<libc::sockaddr_in>() as u32 => {
            let sa = unsafe { &*(addr as *const _ as *const libc::sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(sa.sin_addr.s_addr));
            let port = u16::from_be(sa.sin_port);
            Some(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }
        libc::AF_INET6 if len >= std::mem::size_of::<libc::sockaddr_in6>() as u32 => {
            let sa = unsafe { &*(addr as *const _ as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(sa.sin6_addr.s6_addr);
            let port = u16::from_be(sa.sin6_port);
            Some(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                sa.sin6_flowinfo,
                sa.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

/// Write a SocketAddr into a sockaddr_storage, returning the address length.
pub(crate) fn socket_addr_to_sockaddr(
    addr: SocketAddr,
    storage: &mut libc::sockaddr_storage,
) -> u32 {
    // Zero the storage to avoid uninitialised padding bytes.
    unsafe {
        std::ptr::write_bytes(
            storage as *mut _ as *mut u8,
            0,
            std::mem::size_of::<libc::sockaddr_storage>(),
        );
    }
    match addr {
        SocketAddr::V4(v4) => {
            let sa = storage as *mut _ as *mut libc::sockaddr_in;
            unsafe {
                (*sa).sin_family = libc::AF_INET as libc::sa_family_t;
                (*sa).sin_port = v4.port().to_be();
                (*sa).sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            }
            std::mem::size_of::<libc::sockaddr_in>() as u32
        }
        SocketAddr::V6(v6) => {
            let sa = storage as *mut _ as *mut libc::sockaddr_in6;
            unsafe {
                (*sa).sin6_family = libc::AF_INET6 as libc::sa_family_t;
                (*sa).sin6_port = v6.port().to_be();
                (*sa).sin6_flowinfo = v6.flowinfo();
                (*sa).sin6_addr.s6_addr = v6.ip().octets();
                (*sa).sin6_scope_id = v6.scope_id();
            }
            std::mem::size_of::<libc::sockaddr_in6>() as u32
        }
    }
}

fn new_tcp_socket(family: libc::c_int) -> Result<AsyncFd> {
    let fd = unsafe {
        libc::socket(
            family,
            libc::SOCK_STREAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
            0,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // Already non-blocking; adopt only for the close-on-drop contract.
    AsyncFd::adopt(fd)
}

fn family_of(addr: SocketAddr) -> libc::c_int {
    match addr {
        SocketAddr::V4(_) => libc::AF_INET,
        SocketAddr::V6(_) => libc::AF_INET6,
    }
}

fn local_addr_of(fd: RawFd) -> Result<SocketAddr> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockname(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
    };
    if rc < 0 {
        return Err(io::Error::last_os_error().into());
    }
    sockaddr_to_socket_addr(&storage, len)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown address family").into())
}

/// A listening TCP socket.
#[derive(Debug)]
pub struct TcpListener {
    fd: AsyncFd,
    local: SocketAddr,
}

impl TcpListener {
    /// Bind and listen on `addr` with the platform-maximum backlog.
    /// Port 0 asks the kernel for any free port; the chosen address is
    /// available via [`local_addr`](Self::local_addr).
    pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
        let sock = new_tcp_socket(family_of(addr))?;
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let len = socket_addr_to_sockaddr(addr, &mut storage);
        let rc = unsafe {
            libc::bind(
                sock.raw(),
                &storage as *const _ as *const libc::sockaddr,
                len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let rc = unsafe { libc::listen(sock.raw(), libc::SOMAXCONN) };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let local = local_addr_of(sock.raw())?;
        Ok(TcpListener { fd: sock, local })
    }

    /// Bind to the first free port in `lo..=hi` on `ip`.
    pub fn bind_range(ip: IpAddr, lo: u16, hi: u16) -> Result<TcpListener> {
        for port in lo..=hi {
            match Self::bind(SocketAddr::new(ip, port)) {
                Ok(listener) => return Ok(listener),
                Err(Error::Io(err)) if err.kind() == io::ErrorKind::AddrInUse => continue,
                Err(err) => return Err(err),
            }
        }
        Err(Error::PortRangeExhausted { lo, hi })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn fd(&self) -> &AsyncFd {
        &self.fd
    }

    /// Accept one connection: wait for the listener to become readable,
    /// then `accept4` — the client fd arrives already non-blocking.
    pub async fn accept(&self, reactor: &ReactorHandle) -> Result<(TcpStream, SocketAddr)> {
        loop {
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let fd = unsafe {
                libc::accept4(
                    self.fd.raw(),
                    &mut storage as *mut _ as *mut libc::sockaddr,
                    &mut len,
                    libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                )
            };
            if fd >= 0 {
                metrics::CONNECTIONS_ACCEPTED.increment();
                let peer = sockaddr_to_socket_addr(&storage, len).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "unknown address family")
                })?;
                return Ok((
                    TcpStream {
                        fd: AsyncFd::adopt(fd)?,
                        peer,
                    },
                    peer,
                ));
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => {
                    wait_event(reactor, self.fd.raw(), Interest::READABLE).await?;
                }
                Some(libc::EINTR) => continue,
                _ => return Err(err.into()),
            }
        }
    }
}

/// A connected TCP socket.
pub struct TcpStream {
    fd: AsyncFd,
    peer: SocketAddr,
}

impl TcpStream {
    /// Connect to `addr`: issue the non-blocking connect, wait for
    /// writability, then read back `SO_ERROR` for the verdict.
    pub async fn connect(reactor: &ReactorHandle, addr: SocketAddr) -> Result<TcpStream> {
        let sock = new_tcp_socket(family_of(addr))?;
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let len = socket_addr_to_sockaddr(addr, &mut storage);
        let rc = unsafe {
            libc::connect(
                sock.raw(),
                &storage as *const _ as *const libc::sockaddr,
                len,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINPROGRESS) {
                return Err(err.into());
            }
            wait_event(reactor, sock.raw(), Interest::WRITABLE).await?;
            let pending = so_error(sock.raw())?;
            if pending != 0 {
                return Err(io::Error::from_raw_os_error(pending).into());
            }
        }
        metrics::CONNECTIONS_CONNECTED.increment();
        Ok(TcpStream { fd: sock, peer: addr })
    }

    /// Adopt an already-connected fd (e.g. one half of a socketpair).
    pub fn from_fd(fd: AsyncFd, peer: SocketAddr) -> TcpStream {
        TcpStream { fd, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn fd(&self) -> &AsyncFd {
        &self.fd
    }
}

/// A bound UDP socket.
pub struct UdpSocket {
    fd: AsyncFd,
    local: SocketAddr,
}

impl UdpSocket {
    /// Bind a non-blocking datagram socket. Port 0 asks the kernel for
    /// any free port.
    pub fn bind(addr: SocketAddr) -> Result<UdpSocket> {
        let fd = unsafe {
            libc::socket(
                family_of(addr),
                libc::SOCK_DGRAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                0,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let sock = AsyncFd::adopt(fd)?;
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let len = socket_addr_to_sockaddr(addr, &mut storage);
        let rc = unsafe {
            libc::bind(
                sock.raw(),
                &storage as *const _ as *const libc::sockaddr,
                len,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let local = local_addr_of(sock.raw())?;
        Ok(UdpSocket { fd: sock, local })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn fd(&self) -> &AsyncFd {
        &self.fd
    }

    /// Send one datagram to `addr`.
    pub async fn send_to(
        &self,
        reactor: &ReactorHandle,
        buf: &[u8],
        addr: SocketAddr,
    ) -> Result<usize> {
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let len = socket_addr_to_sockaddr(addr, &mut storage);
        loop {
            let rc = unsafe {
                libc::sendto(
                    self.fd.raw(),
                    buf.as_ptr() as *const libc::c_void,
                    buf.len(),
                    0,
                    &storage as *const _ as *const libc::sockaddr,
                    len,
                )
            };
            if rc >= 0 {
                metrics::BYTES_SENT.add(rc as u64);
                return Ok(rc as usize);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => {
                    wait_event(reactor, self.fd.raw(), Interest::WRITABLE).await?;
                }
                Some(libc::EINTR) => continue,
                _ => return Err(err.into()),
            }
        }
    }

    /// Receive one datagram, yielding the byte count and sender.
    pub async fn recv_from(
        &self,
        reactor: &ReactorHandle,
        buf: &mut [u8],
    ) -> Result<(usize, SocketAddr)> {
        loop {
            let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
            let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
            let rc = unsafe {
                libc::recvfrom(
                    self.fd.raw(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    0,
                    &mut storage as *mut _ as *mut libc::sockaddr,
                    &mut len,
                )
            };
            if rc >= 0 {
                metrics::BYTES_RECEIVED.add(rc as u64);
                let sender = sockaddr_to_socket_addr(&storage, len).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "unknown address family")
                })?;
                return Ok((rc as usize, sender));
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EAGAIN) => {
                    wait_event(reactor, self.fd.raw(), Interest::READABLE).await?;
                }
                Some(libc::EINTR) => continue,
                _ => return Err(err.into()),
            }
        }
    }
}

fn so_error(fd: RawFd) -> Result<i32> {
    let mut value: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let rc = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut value as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(value)
}
