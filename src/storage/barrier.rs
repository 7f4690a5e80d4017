//! Defines the `SecurityBarrier` trait for different barrier types.
//!
//! A barrier starts out sealed and can only hand out plaintext through the value returned by
//! [`SecurityBarrier::unseal`], so reading through a sealed barrier does not type check.

use zeroize::Zeroizing;

use super::Storage;
use crate::errors::RvError;

pub trait SecurityBarrier: Send + Sync {
    type Unsealed: Storage;

    fn inited(&self) -> Result<bool, RvError>;
    fn init(&self, key: &[u8]) -> Result<(), RvError>;
    fn generate_key(&self) -> Result<Zeroizing<Vec<u8>>, RvError>;
    fn key_length_range(&self) -> (usize, usize);
    /// Verifies `key` against the bootstrap entry and returns the unsealed view. The sealed
    /// barrier is left untouched when the key is wrong.
    fn unseal(&self, key: &[u8]) -> Result<Self::Unsealed, RvError>;
}
