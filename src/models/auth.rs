use serde::{Deserialize, Serialize};

use crate::{
    errors::{AppError, ValidationErrors},
    utils::eth_address_validator::{normalize_eth_address, AddressError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Identity attached to a request by the bearer-token middleware.
#[derive(Debug, Clone)]
pub struct WalletIdentity {
    pub address: String,
    pub token: String,
    pub claims: TokenClaims,
}

#[derive(Debug, Deserialize)]
pub struct NonceRequest {
    pub address: String,
}
impl NonceRequest {
    /// Returns the checksummed address.
    pub fn validate(&self) -> Result<String, AppError> {
        let mut errors = ValidationErrors::new();
        let address = validate_address_field(&self.address, &mut errors);
        collect(address, errors)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub nonce: String,
    pub issued_at: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub address: String,
    pub signature: String,
}
impl LoginRequest {
    /// Returns the checksummed address.
    pub fn validate(&self) -> Result<String, AppError> {
        let mut errors = ValidationErrors::new();
        let address = validate_address_field(&self.address, &mut errors);

        if !is_hex_signature(&self.signature) {
            errors.add("signature", "Signature must be 0x-prefixed hex");
        }

        collect(address, errors)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateTokenResponse {
    pub user: TokenClaims,
}

fn validate_address_field(input: &str, errors: &mut ValidationErrors) -> Option<String> {
    match normalize_eth_address(input) {
        Ok(address) => Some(address),
        Err(AddressError::BadChecksum) => {
            errors.add("address", "Address checksum is invalid");
            None
        }
        Err(AddressError::Malformed) => {
            errors.add("address", "Invalid Ethereum address");
            None
        }
    }
}

fn collect(address: Option<String>, errors: ValidationErrors) -> Result<String, AppError> {
    match address {
        Some(address) if errors.is_empty() => Ok(address),
        _ => Err(AppError::Validation(errors)),
    }
}

fn is_hex_signature(signature: &str) -> bool {
    match signature.strip_prefix("0x") {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}
