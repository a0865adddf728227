// src/interception/winsock.rs
//! Winsock surface: socket constants and per-thread error state
//!
//! Emulated links never touch the real socket, so the error the client reads
//! back through `WSAGetLastError` is kept here, per thread, next to the last
//! socket the thread used.

use std::cell::Cell;

/// Socket handle as passed to the intercepted functions
pub type RawSocket = usize;

pub const INVALID_SOCKET: RawSocket = !0;
pub const SOCKET_ERROR: i32 = -1;
pub const WSAEWOULDBLOCK: i32 = 10035;
pub const MSG_PEEK: i32 = 0x2;

/// Offset of the big-endian port in both `sockaddr_in` and `sockaddr_in6`
const PORT_OFFSET: usize = 2;

thread_local! {
    static LAST_SOCKET: Cell<RawSocket> = const { Cell::new(INVALID_SOCKET) };
    static LAST_ERROR: Cell<i32> = const { Cell::new(0) };
}

/// Record `socket` as the thread's current socket and clear its error
pub fn reset_last_error(socket: RawSocket) {
    LAST_SOCKET.with(|s| s.set(socket));
    LAST_ERROR.with(|e| e.set(0));
}

pub fn set_last_error(error: i32) {
    LAST_ERROR.with(|e| e.set(error));
}

pub fn last_error() -> i32 {
    LAST_ERROR.with(|e| e.get())
}

pub fn last_socket() -> RawSocket {
    LAST_SOCKET.with(|s| s.get())
}

/// Destination port of a raw socket address, host byte order
pub fn destination_port(name: &[u8]) -> Option<u16> {
    let bytes = name.get(PORT_OFFSET..PORT_OFFSET + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Encode an IPv4 `sockaddr_in`
pub fn sockaddr_in(ip: std::net::Ipv4Addr, port: u16) -> [u8; 16] {
    const AF_INET: u16 = 2;

    let mut raw = [0u8; 16];
    raw[..2].copy_from_slice(&AF_INET.to_ne_bytes());
    raw[2..4].copy_from_slice(&port.to_be_bytes());
    raw[4..8].copy_from_slice(&ip.octets());
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_destination_port() {
        let raw = sockaddr_in(Ipv4Addr::new(127, 0, 0, 1), 9958);
        assert_eq!(destination_port(&raw), Some(9958));
        assert_eq!(destination_port(&raw[..3]), None);
    }

    #[test]
    fn test_error_state_is_per_thread() {
        reset_last_error(5);
        set_last_error(WSAEWOULDBLOCK);

        std::thread::spawn(|| {
            assert_eq!(last_socket(), INVALID_SOCKET);
            assert_eq!(last_error(), 0);
        })
        .join()
        .unwrap();

        assert_eq!(last_socket(), 5);
        assert_eq!(last_error(), WSAEWOULDBLOCK);
        reset_last_error(6);
        assert_eq!(last_error(), 0);
    }
}
