/// External AEAD collaborator for encryption at rest.
///
/// WalnutDB's core never picks a cipher; it depends on this trait so the
/// embedding application can plug in whatever AEAD primitive it trusts.
/// `table` and `pk` MUST be bound into the authenticated data so that
/// ciphertext from one table/row cannot be replayed into another (ciphertext
/// swapping across rows would otherwise go undetected).
///
/// When no `Encryptor` is configured, stored values are the plaintext bytes
/// staged by the caller.
pub trait Encryptor: Send + Sync {
    /// Encrypts `plaintext`, binding `table` and `pk` into the AAD.
    fn encrypt(&self, plaintext: &[u8], table: &str, pk: &[u8]) -> Vec<u8>;

    /// Decrypts `ciphertext` previously produced by [`Encryptor::encrypt`]
    /// with the same `table`/`pk`.
    ///
    /// Returns `None` if authentication fails (wrong key, tampered bytes,
    /// or `table`/`pk` mismatch).
    fn decrypt(&self, ciphertext: &[u8], table: &str, pk: &[u8]) -> Option<Vec<u8>>;
}
