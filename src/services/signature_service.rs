use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{eip191_hash_message, Address, Bytes, FixedBytes, Signature, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    sol,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::metrics::track_provider_call;

/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`
pub const EIP1271_MAGIC_VALUE: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];

sol! {
    #[sol(rpc)]
    interface IERC1271 {
        function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("Signature is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),
    #[error("Contract call failed: {0}")]
    ContractCall(String),
    #[error("Contract call timed out")]
    Timeout,
}

/// EIP-1271 check against a deployed contract wallet.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractWalletVerifier: Send + Sync {
    async fn is_valid_signature(&self, wallet: Address, hash: B256, signature: Bytes) -> Result<bool, SignatureError>;
}

pub struct RpcContractVerifier {
    provider: DynProvider,
    timeout: Duration,
}

impl RpcContractVerifier {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self, SignatureError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| SignatureError::InvalidRpcUrl(e.to_string()))?;

        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self { provider, timeout })
    }
}

#[async_trait]
impl ContractWalletVerifier for RpcContractVerifier {
    async fn is_valid_signature(&self, wallet: Address, hash: B256, signature: Bytes) -> Result<bool, SignatureError> {
        let contract = IERC1271::new(wallet, self.provider.clone());
        let call = contract.isValidSignature(hash, signature);

        let magic: FixedBytes<4> = track_provider_call("eip1271_call", async {
            tokio::time::timeout(self.timeout, call.call())
                .await
                .map_err(|_| SignatureError::Timeout)?
                .map_err(|e: alloy::contract::Error| SignatureError::ContractCall(e.to_string()))
        })
        .await?;

        Ok(magic.0 == EIP1271_MAGIC_VALUE)
    }
}

/// Personal-sign verification for EOAs with an optional EIP-1271 fallback.
#[derive(Clone, Default)]
pub struct SignatureService {
    contract_verifier: Option<Arc<dyn ContractWalletVerifier>>,
}

impl SignatureService {
    pub fn new(contract_verifier: Option<Arc<dyn ContractWalletVerifier>>) -> Self {
        Self { contract_verifier }
    }

    pub fn recover_signer(message: &str, signature: &[u8]) -> Option<Address> {
        let signature = Signature::from_raw(signature).ok()?;
        signature.recover_address_from_msg(message.as_bytes()).ok()
    }

    /// Whether `signature_hex` is a valid signature of `message` by `address`.
    pub async fn verify_message(
        &self,
        address: Address,
        message: &str,
        signature_hex: &str,
    ) -> Result<bool, SignatureError> {
        let signature = hex::decode(signature_hex.strip_prefix("0x").unwrap_or(signature_hex))?;

        if signature.len() == 65 {
            match Self::recover_signer(message, &signature) {
                Some(recovered) if recovered == address => return Ok(true),
                Some(recovered) => debug!("Recovered {} while expecting {}", recovered, address),
                None => debug!("Signature could not be recovered for {}", address),
            }
        }

        let Some(verifier) = &self.contract_verifier else {
            return Ok(false);
        };

        let hash = eip191_hash_message(message.as_bytes());
        match verifier.is_valid_signature(address, hash, Bytes::from(signature)).await {
            Ok(valid) => Ok(valid),
            Err(e) => {
                warn!("EIP-1271 check for {} failed: {}", address, e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use mockall::predicate::eq;

    fn sign(signer: &PrivateKeySigner, message: &str) -> String {
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();
        format!("0x{}", hex::encode(signature.as_bytes()))
    }

    #[tokio::test]
    async fn accepts_eoa_signature() {
        let signer = PrivateKeySigner::random();
        let service = SignatureService::new(None);
        let signature = sign(&signer, "hello");

        assert!(service.verify_message(signer.address(), "hello", &signature).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_signature_from_another_key() {
        let signer = PrivateKeySigner::random();
        let other = PrivateKeySigner::random();
        let service = SignatureService::new(None);
        let signature = sign(&other, "hello");

        assert!(!service.verify_message(signer.address(), "hello", &signature).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_signature_over_a_different_message() {
        let signer = PrivateKeySigner::random();
        let service = SignatureService::new(None);
        let signature = sign(&signer, "hello");

        assert!(!service.verify_message(signer.address(), "hello!", &signature).await.unwrap());
    }

    #[tokio::test]
    async fn falls_back_to_contract_wallet() {
        let wallet = Address::repeat_byte(0x42);
        let message = "contract wallet login";
        let signature = sign(&PrivateKeySigner::random(), message);

        let mut verifier = MockContractWalletVerifier::new();
        verifier
            .expect_is_valid_signature()
            .with(eq(wallet), eq(eip191_hash_message(message.as_bytes())), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Ok(true));

        let service = SignatureService::new(Some(Arc::new(verifier)));
        assert!(service.verify_message(wallet, message, &signature).await.unwrap());
    }

    #[tokio::test]
    async fn contract_failure_counts_as_invalid() {
        let wallet = Address::repeat_byte(0x42);
        let mut verifier = MockContractWalletVerifier::new();
        verifier
            .expect_is_valid_signature()
            .returning(|_, _, _| Err(SignatureError::Timeout));

        let service = SignatureService::new(Some(Arc::new(verifier)));
        assert!(!service.verify_message(wallet, "msg", "0xdeadbeef").await.unwrap());
    }

    #[tokio::test]
    async fn non_hex_signature_is_an_error() {
        let service = SignatureService::new(None);
        assert!(service
            .verify_message(Address::ZERO, "msg", "0xnothex")
            .await
            .is_err());
    }
}
