use tokio::sync::broadcast;
use tracing::debug;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    WalletLogin { address: String },
    WalletLoginRejected,
    GoogleLogin { sub: String },
    WalletLinked { sub: String, wallet_address: String },
    WalletUnlinked { deleted: u64 },
    Logout,
}

impl AuthEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthEvent::WalletLogin { .. } => "wallet_login",
            AuthEvent::WalletLoginRejected => "wallet_login_rejected",
            AuthEvent::GoogleLogin { .. } => "google_login",
            AuthEvent::WalletLinked { .. } => "wallet_linked",
            AuthEvent::WalletUnlinked { .. } => "wallet_unlinked",
            AuthEvent::Logout => "logout",
        }
    }
}

/// Fan-out of authentication outcomes to whoever subscribed.
#[derive(Debug, Clone)]
pub struct AuthEventBus {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AuthEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Never fails; events published with no subscriber are dropped.
    pub fn publish(&self, event: AuthEvent) {
        debug!(kind = event.kind(), "auth event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }
}
