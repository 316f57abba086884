use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, close_code};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Which server a socket is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// The karaoke display.
    Karaoke,
    /// A phone or browser remote control.
    Remote,
}

/// Handle used to push messages to a connected socket.
#[derive(Clone)]
pub struct ClientConnection {
    pub id: Uuid,
    pub kind: ClientKind,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Registry of live sockets across both servers.
#[derive(Default)]
pub struct ClientRegistry {
    clients: DashMap<Uuid, ClientConnection>,
}

impl ClientRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new socket and return its id.
    pub fn register(&self, kind: ClientKind, tx: mpsc::UnboundedSender<Message>) -> Uuid {
        let id = Uuid::new_v4();
        self.clients.insert(id, ClientConnection { id, kind, tx });
        id
    }

    /// Forget a socket once its connection ends.
    pub fn unregister(&self, id: &Uuid) {
        self.clients.remove(id);
    }

    /// Number of sockets of the given kind.
    pub fn count(&self, kind: ClientKind) -> usize {
        self.clients
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Send `payload` to every socket whose kind is accepted by `filter`.
    ///
    /// Sockets whose writer is gone are dropped from the registry. Returns the
    /// number of sockets the payload was queued for.
    pub fn broadcast(&self, filter: impl Fn(ClientKind) -> bool, payload: Utf8Bytes) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in self.clients.iter() {
            if !filter(entry.kind) {
                continue;
            }
            if entry.tx.send(Message::Text(payload.clone())).is_ok() {
                delivered += 1;
            } else {
                dead.push(entry.id);
            }
        }
        for id in dead {
            debug!(client_id = %id, "dropping closed socket");
            self.clients.remove(&id);
        }
        delivered
    }

    /// Ask every socket to close and forget them all.
    pub fn close_all(&self) {
        for entry in self.clients.iter() {
            let _ = entry.tx.send(Message::Close(Some(CloseFrame {
                code: close_code::AWAY,
                reason: Utf8Bytes::from_static("Server shutting down"),
            })));
        }
        self.clients.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_respects_filter() {
        let registry = ClientRegistry::new();
        let (karaoke_tx, mut karaoke_rx) = mpsc::unbounded_channel();
        let (remote_tx, mut remote_rx) = mpsc::unbounded_channel();
        registry.register(ClientKind::Karaoke, karaoke_tx);
        registry.register(ClientKind::Remote, remote_tx);

        let sent = registry.broadcast(|kind| kind == ClientKind::Karaoke, "hello".into());

        assert_eq!(sent, 1);
        assert!(matches!(karaoke_rx.try_recv(), Ok(Message::Text(text)) if text.as_str() == "hello"));
        assert!(remote_rx.try_recv().is_err());
    }

    #[test]
    fn dead_sockets_are_pruned() {
        let registry = ClientRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(ClientKind::Remote, tx);
        drop(rx);

        assert_eq!(registry.broadcast(|_| true, "x".into()), 0);
        assert_eq!(registry.count(ClientKind::Remote), 0);
    }

    #[test]
    fn close_all_sends_close_frames() {
        let registry = ClientRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.register(ClientKind::Karaoke, tx);
        assert_eq!(registry.count(ClientKind::Karaoke), 1);

        registry.close_all();

        assert!(matches!(rx.try_recv(), Ok(Message::Close(Some(frame))) if frame.code == close_code::AWAY));
        registry.unregister(&id);
        assert_eq!(registry.count(ClientKind::Karaoke), 0);
    }
}
