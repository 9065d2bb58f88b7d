use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignis_registry::{Destructible, RegistryError, UsagePool};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::Notify;

use crate::error::ListenerError;
use crate::key::{ListenKey, Network};

fn bind_error_for(address: &str, source: std::io::Error) -> ListenerError {
    ListenerError::Bind { address: address.to_string(), source }
}

struct SharedDatagramEntry {
    socket: UdpSocket,
}

impl Destructible for SharedDatagramEntry {
    fn destroy(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

fn bind_reuse_udp(address: &str) -> Result<UdpSocket, ListenerError> {
    let addr: SocketAddr = address.parse().map_err(|_| {
        bind_error_for(address, std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid socket address"))
    })?;
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(|e| bind_error_for(address, e))?;
    socket.set_reuse_address(true).map_err(|e| bind_error_for(address, e))?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(|e| bind_error_for(address, e))?;
    socket.set_nonblocking(true).map_err(|e| bind_error_for(address, e))?;
    socket.bind(&addr.into()).map_err(|e| bind_error_for(address, e))?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(|e| bind_error_for(address, e))
}

fn to_registry_error(err: ListenerError) -> RegistryError {
    RegistryError::factory("udp-socket", err)
}

/// The datagram counterpart to [`crate::tcp::ListenerPool`]: shares one
/// `UdpSocket` across consumers keyed by `udp/<address>`, with the same
/// fake-close semantics applied to `recv_from` instead of `accept`.
pub struct DatagramPool {
    pool: Arc<UsagePool<SharedDatagramEntry>>,
}

impl Default for DatagramPool {
    fn default() -> Self {
        Self { pool: Arc::new(UsagePool::new()) }
    }
}

impl DatagramPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&self, address: &str) -> Result<FakeCloseDatagram, ListenerError> {
        let key = ListenKey::new(Network::Udp, address).pool_key();
        let (entry, _existed) = self
            .pool
            .load_or_new(&key, || Ok(SharedDatagramEntry { socket: bind_reuse_udp(address).map_err(to_registry_error)? }))?;
        Ok(FakeCloseDatagram {
            entry,
            pool: Arc::clone(&self.pool),
            key,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }
}

pub struct FakeCloseDatagram {
    entry: Arc<SharedDatagramEntry>,
    pool: Arc<UsagePool<SharedDatagramEntry>>,
    key: String,
    closed: AtomicBool,
    notify: Notify,
}

impl FakeCloseDatagram {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.entry.socket.local_addr()
    }

    pub async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), ListenerError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ListenerError::Closed);
        }
        let outcome = tokio::select! {
            res = self.entry.socket.recv_from(buf) => Ok(res),
            _ = self.notify.notified() => Err(()),
        };
        match outcome {
            Err(()) => Err(ListenerError::Closed),
            Ok(Ok(read)) => Ok(read),
            Ok(Err(io_err)) => {
                if self.closed.load(Ordering::SeqCst) {
                    Err(ListenerError::Closed)
                } else {
                    Err(ListenerError::Accept(io_err))
                }
            }
        }
    }

    pub fn close(&self) {
        if self.closed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            self.notify.notify_waiters();
            if let Err(err) = self.pool.delete(&self.key) {
                tracing::warn!(key = %self.key, error = %err, "releasing shared udp socket failed");
            }
        }
    }
}

impl Drop for FakeCloseDatagram {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn close_unblocks_recv_from_without_affecting_siblings() {
        let pool = DatagramPool::new();
        let d1 = Arc::new(pool.listen("127.0.0.1:0").unwrap());
        let addr = d1.local_addr().unwrap();
        let d2 = pool.listen(&addr.to_string()).unwrap();

        let receiving = Arc::clone(&d1);
        let recv_fut = tokio::spawn(async move {
            let mut buf = [0u8; 16];
            receiving.recv_from(&mut buf).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        d1.close();
        let joined = tokio::time::timeout(Duration::from_millis(100), recv_fut)
            .await
            .expect("recv_from should resolve once close() fires")
            .unwrap();
        assert!(matches!(joined.unwrap_err(), ListenerError::Closed));

        // d2 still works: the shared socket was not torn down since d2
        // still holds a reference.
        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"ping", addr).await.unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = tokio::time::timeout(Duration::from_millis(200), d2.recv_from(&mut buf)).await.unwrap().unwrap();
        assert_eq!(&buf[..n], b"ping");
    }
}
