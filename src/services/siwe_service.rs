use std::sync::Arc;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    config::SiweConfig,
    db_persistence::DbError,
    models::nonce::format_issued_at,
    repositories::nonce::NonceStore,
    services::signature_service::{SignatureError, SignatureService},
};

#[derive(Debug, thiserror::Error)]
pub enum SiweError {
    #[error("No live nonce for this address")]
    NonceNotFound,
    #[error("Signature does not match the SIWE message")]
    InvalidSignature,
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),
    #[error("Nonce storage error: {0}")]
    Storage(#[from] DbError),
}

/// Fields of an EIP-4361 message this service signs in with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub domain: String,
    pub address: Address,
    pub statement: String,
    pub uri: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
}

impl SiweMessage {
    pub fn render(&self) -> String {
        let mut message = format!(
            "{} wants you to sign in with your Ethereum account:\n{}\n\n",
            self.domain,
            self.address.to_checksum(None)
        );

        if !self.statement.is_empty() {
            message.push_str(&self.statement);
            message.push_str("\n\n");
        }

        message.push_str(&format!(
            "URI: {}\nVersion: 1\nChain ID: {}\nNonce: {}\nIssued At: {}",
            self.uri,
            self.chain_id,
            self.nonce,
            format_issued_at(&self.issued_at)
        ));

        message
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweChallenge {
    pub nonce: String,
    pub issued_at: String,
    pub message: String,
}

pub struct SiweService {
    settings: SiweConfig,
    nonces: Arc<dyn NonceStore>,
    signatures: SignatureService,
}

impl SiweService {
    pub fn new(settings: SiweConfig, nonces: Arc<dyn NonceStore>, signatures: SignatureService) -> Self {
        Self {
            settings,
            nonces,
            signatures,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    pub fn message_for(&self, address: Address, chain_id: u64, nonce: &str, issued_at: DateTime<Utc>) -> SiweMessage {
        SiweMessage {
            domain: self.settings.domain.clone(),
            address,
            statement: self.settings.statement.clone(),
            uri: self.settings.uri.clone(),
            chain_id,
            nonce: nonce.to_string(),
            issued_at,
        }
    }

    /// Issues a fresh nonce and returns the exact message the wallet must sign.
    pub async fn prepare(&self, address: Address) -> Result<SiweChallenge, SiweError> {
        let checksummed = address.to_checksum(None);
        let record = self.nonces.issue(&checksummed).await?;
        let message = self.message_for(address, self.settings.chain_id, &record.nonce, record.issued_at);

        debug!("Issued SIWE nonce for {}", checksummed);

        Ok(SiweChallenge {
            issued_at: record.issued_at_rfc3339(),
            nonce: record.nonce,
            message: message.render(),
        })
    }

    /// Verifies `signature` over the stored challenge and consumes the nonce on success.
    pub async fn validate(&self, address: Address, signature: &str, chain_id: u64) -> Result<(), SiweError> {
        let checksummed = address.to_checksum(None);
        let record = self
            .nonces
            .find(&checksummed)
            .await?
            .ok_or(SiweError::NonceNotFound)?;

        let message = self.message_for(address, chain_id, &record.nonce, record.issued_at).render();

        if !self.signatures.verify_message(address, &message, signature).await? {
            return Err(SiweError::InvalidSignature);
        }

        // A concurrent login may have consumed it between find and here
        if !self.nonces.consume(&checksummed, &record.nonce).await? {
            return Err(SiweError::NonceNotFound);
        }

        info!("SIWE login verified for {}", checksummed);
        Ok(())
    }
}
