pub mod google;
pub mod wallet;
pub mod wallet_link;
