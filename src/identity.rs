use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signature, Signer, Verifier};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::errors::{VoucherError, VoucherResult};
use crate::types::AccountId;

/// Process-wide keypair that signs every voucher-management extrinsic and
/// whose on-chain balance funds the issued vouchers. Built once at startup
/// and read-only afterward.
pub struct SigningIdentity {
    keypair: Keypair,
    address: AccountId,
}

impl SigningIdentity {
    /// Constructs the identity from a hex-encoded 32-byte seed. Malformed
    /// seeds abort startup rather than producing a degraded identity.
    pub fn from_seed_hex(seed: &str) -> VoucherResult<Self> {
        let stripped = seed.trim().strip_prefix("0x").unwrap_or(seed.trim());
        let bytes = hex::decode(stripped)
            .map_err(|err| VoucherError::Crypto(format!("invalid seed encoding: {err}")))?;
        let secret = SecretKey::from_bytes(&bytes)
            .map_err(|err| VoucherError::Crypto(format!("invalid seed bytes: {err}")))?;
        let public = PublicKey::from(&secret);
        let address = AccountId(public.to_bytes());
        Ok(Self {
            keypair: Keypair { secret, public },
            address,
        })
    }

    /// Address of the voucher account, derived from the public key.
    pub fn address(&self) -> &AccountId {
        &self.address
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.keypair.sign(message)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> VoucherResult<()> {
        self.keypair
            .public
            .verify(message, signature)
            .map_err(|err| VoucherError::Crypto(format!("signature verification failed: {err}")))
    }
}

/// Generates a fresh hex-encoded seed suitable for `from_seed_hex`.
pub fn generate_seed_hex() -> String {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    hex::encode(seed)
}
