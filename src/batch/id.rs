//! Batch id generation

use crate::constants::BATCH_ID_BYTES;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;

/// Random URL-safe batch id carrying 128 bits from the OS CSPRNG
pub fn generate_batch_id() -> String {
    let mut bytes = [0u8; BATCH_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
