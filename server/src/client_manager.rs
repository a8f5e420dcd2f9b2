//! Session registry for the datagram transport.
//!
//! Maps remote addresses to named sessions, enforces the capacity limit and
//! name uniqueness, and tracks activity for the timeout sweep. The world
//! itself knows nothing about addresses; it only sees session ids.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::entity::SessionId;
use crate::error::ConnectError;

/// A connected session and where to reach it.
#[derive(Debug)]
pub struct Client {
    pub id: SessionId,
    pub addr: SocketAddr,
    /// Last time any datagram arrived from this address.
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: SessionId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

pub struct ClientManager {
    clients: HashMap<SessionId, Client>,
    next_guest: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_guest: 1,
            max_clients,
        }
    }

    /// Admits a session for `addr`.
    ///
    /// A named session keeps its name so a later reconnect resumes the same
    /// player; unnamed ones get a fresh `guest-<n>`. Connecting again from an
    /// address that already holds a session returns that session.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        name: Option<String>,
    ) -> Result<SessionId, ConnectError> {
        if let Some(existing) = self.find_client_by_addr(addr) {
            self.touch(&existing);
            return Ok(existing);
        }
        if self.clients.len() >= self.max_clients {
            return Err(ConnectError::ServerFull);
        }

        let id = match name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            Some(name) if self.clients.contains_key(&name) => {
                return Err(ConnectError::NameTaken(name));
            }
            Some(name) => name,
            None => self.next_guest_name(),
        };

        info!("Session {} connected from {}", id, addr);
        self.clients.insert(id.clone(), Client::new(id.clone(), addr));
        Ok(id)
    }

    fn next_guest_name(&mut self) -> SessionId {
        loop {
            let name = format!("guest-{}", self.next_guest);
            self.next_guest += 1;
            if !self.clients.contains_key(&name) {
                return name;
            }
        }
    }

    pub fn remove_client(&mut self, id: &str) -> bool {
        match self.clients.remove(id) {
            Some(client) => {
                info!("Session {} disconnected", client.id);
                true
            }
            None => false,
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<SessionId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id.clone())
    }

    pub fn addr_of(&self, id: &str) -> Option<SocketAddr> {
        self.clients.get(id).map(|client| client.addr)
    }

    /// Records activity for a session. Returns false if it is unknown.
    pub fn touch(&mut self, id: &str) -> bool {
        match self.clients.get_mut(id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Removes and returns every session silent for longer than `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<SessionId> {
        let timed_out: Vec<SessionId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id.clone())
            .collect();

        for id in &timed_out {
            self.remove_client(id);
        }
        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(SessionId, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.id.clone(), client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new("ana".to_string(), addr(9000));
        assert!(!client.is_timed_out(Duration::from_secs(1)));

        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));
        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_named_and_guest_sessions() {
        let mut manager = ClientManager::new(4);
        assert!(manager.is_empty());

        let ana = manager.add_client(addr(9000), Some("ana".to_string())).unwrap();
        let guest = manager.add_client(addr(9001), None).unwrap();
        let blank = manager.add_client(addr(9002), Some("  ".to_string())).unwrap();

        assert_eq!(ana, "ana");
        assert_eq!(guest, "guest-1");
        assert_eq!(blank, "guest-2");
        assert_eq!(manager.len(), 3);
        assert_eq!(manager.addr_of("ana"), Some(addr(9000)));
    }

    #[test]
    fn test_name_collision_rejected() {
        let mut manager = ClientManager::new(4);
        manager.add_client(addr(9000), Some("ana".to_string())).unwrap();

        assert_eq!(
            manager.add_client(addr(9001), Some("ana".to_string())),
            Err(ConnectError::NameTaken("ana".to_string()))
        );
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_reconnect_from_same_address() {
        let mut manager = ClientManager::new(1);
        let first = manager.add_client(addr(9000), None).unwrap();
        let again = manager.add_client(addr(9000), Some("ignored".to_string())).unwrap();
        assert_eq!(first, again);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_capacity_limit() {
        let mut manager = ClientManager::new(1);
        manager.add_client(addr(9000), None).unwrap();
        assert_eq!(
            manager.add_client(addr(9001), None),
            Err(ConnectError::ServerFull)
        );
    }

    #[test]
    fn test_guest_names_skip_taken_ones() {
        let mut manager = ClientManager::new(4);
        manager
            .add_client(addr(9000), Some("guest-1".to_string()))
            .unwrap();
        assert_eq!(manager.add_client(addr(9001), None).unwrap(), "guest-2");
    }

    #[test]
    fn test_remove_and_lookup() {
        let mut manager = ClientManager::new(2);
        let id = manager.add_client(addr(9000), None).unwrap();

        assert_eq!(manager.find_client_by_addr(addr(9000)), Some(id.clone()));
        assert_eq!(manager.find_client_by_addr(addr(9999)), None);
        assert!(manager.remove_client(&id));
        assert!(!manager.remove_client(&id));
        assert!(manager.is_empty());
        assert!(!manager.touch(&id));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(2);
        manager.add_client(addr(9000), Some("ana".to_string())).unwrap();
        manager.add_client(addr(9001), Some("bob".to_string())).unwrap();
        manager.clients.get_mut("ana").unwrap().last_seen =
            Instant::now() - Duration::from_secs(6);

        let timed_out = manager.check_timeouts(Duration::from_secs(5));
        assert_eq!(timed_out, vec!["ana".to_string()]);
        assert_eq!(manager.get_client_addrs(), vec![("bob".to_string(), addr(9001))]);
    }
}
