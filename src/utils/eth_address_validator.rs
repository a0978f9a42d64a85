use alloy::primitives::Address;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid Ethereum address")]
    Malformed,
    #[error("Invalid EIP-55 checksum")]
    BadChecksum,
}

/// Validates a string as an Ethereum address and returns the parsed address.
///
/// This function performs the following checks:
/// 1.  Checks for the "0x" prefix.
/// 2.  Validates the length is exactly 42 characters.
/// 3.  Ensures all characters are valid hexadecimal digits.
/// 4.  Validates the EIP-55 mixed-case checksum if present. If the address
///     is all lowercase or all uppercase, it is accepted without a checksum.
pub fn parse_eth_address(address: &str) -> Result<Address, AddressError> {
    if address.len() != 42 {
        return Err(AddressError::Malformed);
    }

    let Some(addr_part) = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) else {
        return Err(AddressError::Malformed);
    };

    if !addr_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::Malformed);
    }

    let parsed: Address = addr_part.parse().map_err(|_| AddressError::Malformed)?;

    let is_all_lowercase = addr_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_uppercase = addr_part.chars().all(|c| !c.is_ascii_lowercase());
    if is_all_lowercase || is_all_uppercase {
        return Ok(parsed);
    }

    // Mixed case must match the EIP-55 encoding exactly
    let checksummed = parsed.to_checksum(None);
    if &checksummed[2..] != addr_part {
        return Err(AddressError::BadChecksum);
    }

    Ok(parsed)
}

/// Parses any accepted form and returns the EIP-55 checksummed string.
pub fn normalize_eth_address(address: &str) -> Result<String, AddressError> {
    parse_eth_address(address).map(|a| a.to_checksum(None))
}

pub fn is_valid_eth_address(address: &str) -> bool {
    parse_eth_address(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correctly_validate_eth_address() {
        let addresses_to_test = vec![
            // Checksummed
            ("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", true),
            // Same address, lowercase
            ("0xd8da6bf26964af9d7eed9e03e53415d37aa96045", true),
            // Same address, uppercase
            ("0XD8DA6BF26964AF9D7EED9E03E53415D37AA96045", true),
            ("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359", true),
            // Invalid checksum
            ("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA9604f", false),
            // Too short
            ("0xd8da6bf26964af9d7eed9e03e53415d37aa9604", false),
            // Too long
            ("0xd8da6bf26964af9d7eed9e03e53415d37aa960455", false),
            // Missing prefix
            ("d8da6bf26964af9d7eed9e03e53415d37aa96045", false),
            // Non-hex
            ("0xd8da6bf26964af9d7eed9e03e53415d37aa9604g", false),
            ("", false),
        ];

        for (address, expected) in addresses_to_test {
            assert_eq!(
                is_valid_eth_address(address),
                expected,
                "Validation failed for address: {}",
                address
            );
        }
    }

    #[test]
    fn normalizes_every_casing_to_the_checksummed_form() {
        let checksummed = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045";
        for input in [
            checksummed,
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045",
            "0XD8DA6BF26964AF9D7EED9E03E53415D37AA96045",
        ] {
            assert_eq!(normalize_eth_address(input).unwrap(), checksummed);
        }
    }

    #[test]
    fn reports_bad_checksum_separately() {
        assert_eq!(
            normalize_eth_address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA9604f"),
            Err(AddressError::BadChecksum)
        );
        assert_eq!(normalize_eth_address("0x1234"), Err(AddressError::Malformed));
    }
}
