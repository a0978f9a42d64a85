pub mod crypto;
pub mod eth_address_validator;
pub mod jwt;

#[cfg(test)]
pub mod test_app_state;
#[cfg(test)]
pub mod test_db;
#[cfg(test)]
pub mod test_keys;
