//! Identifier helpers

use bech32::Bech32m;
use uuid7::uuid7;

/// Construct a unique id from a fresh uuid7, bech32m-encoded under `hrp`.
///
/// Order ids use `order_`, users `user_` and parts requests `parts_`.
pub fn new_bech32_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encoded = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encoded)
}
