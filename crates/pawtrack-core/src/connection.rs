// ── Push connection lifecycle ──
//
// One push-channel connection per observed pet. Opening joins the pet's
// room after every handshake; closing is synchronous and also happens
// on drop, so a torn-down view never leaves a room subscription behind.

use std::sync::Arc;
use std::time::Duration;

use pawtrack_api::{
    BearerSource, ConnectivityState, PushChannel, PushConfig, PushEvent, ReconnectConfig,
};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::config::TrackerConfig;
use crate::error::CoreError;
use crate::model::PetId;
use crate::session::SessionContext;

/// Opens push connections scoped to one pet each.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    push_url: Url,
    handshake_timeout: Duration,
    reconnect: Option<ReconnectConfig>,
    session: SessionContext,
}

impl ConnectionManager {
    pub fn new(config: &TrackerConfig, session: SessionContext) -> Self {
        Self {
            push_url: config.push_url.clone(),
            handshake_timeout: config.handshake_timeout,
            reconnect: config.reconnect.clone(),
            session,
        }
    }

    /// `open(pet) → handle`. Returns immediately; the handshake runs in
    /// the background and connectivity reads `false` until it is acked.
    pub fn open(&self, pet: &PetId) -> Result<ConnectionHandle, CoreError> {
        let mut config = PushConfig::new(self.push_url.clone());
        config.room = Some(pet.to_string());
        config.handshake_timeout = self.handshake_timeout;
        config.reconnect.clone_from(&self.reconnect);
        config.auth = self.session.bearer_token();

        let cancel = CancellationToken::new();
        let channel = PushChannel::connect(config, cancel.clone())?;
        info!(pet = %pet, url = %self.push_url, "push connection opened");

        Ok(ConnectionHandle {
            pet: pet.clone(),
            channel,
            cancel,
        })
    }
}

/// A live push connection for one pet.
pub struct ConnectionHandle {
    pet: PetId,
    channel: PushChannel,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn pet(&self) -> &PetId {
        &self.pet
    }

    /// Typed inbound events, in arrival order.
    pub fn events(&self) -> broadcast::Receiver<Arc<PushEvent>> {
        self.channel.subscribe()
    }

    pub fn connectivity(&self) -> watch::Receiver<ConnectivityState> {
        self.channel.connectivity()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.connectivity().borrow().connected()
    }

    /// Disconnect unconditionally. Idempotent.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            info!(pet = %self.pet, "push connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}
