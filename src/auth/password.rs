use crate::error::AppResult;

/// bcrypt hash for storage.
pub fn hash_password(plaintext: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(plaintext, cost)?)
}

/// Constant-time check of a plaintext against a stored hash. A malformed
/// hash counts as a mismatch.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}
