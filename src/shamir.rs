//! Shamir secret sharing over GF(2^8), compatible with the share layout used by Hashicorp Vault.
//!
//! A share is the y value for every secret byte followed by one trailing byte holding the
//! x-coordinate. Reconstruction interpolates each byte position independently at x = 0.
//!
//! The combiner cannot tell a sufficient quorum from an insufficient one: any structurally valid
//! set of shares yields *some* bytes. A wrong key is only detected when the barrier refuses to
//! unseal with it.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{thread_rng, RngCore};
use zeroize::Zeroizing;

use crate::errors::RvError;

static GF256_EXP: [u8; 256] = [
    0x01, 0xe5, 0x4c, 0xb5, 0xfb, 0x9f, 0xfc, 0x12, 0x03, 0x34, 0xd4, 0xc4, 0x16, 0xba, 0x1f, 0x36, 0x05, 0x5c, 0x67,
    0x57, 0x3a, 0xd5, 0x21, 0x5a, 0x0f, 0xe4, 0xa9, 0xf9, 0x4e, 0x64, 0x63, 0xee, 0x11, 0x37, 0xe0, 0x10, 0xd2, 0xac,
    0xa5, 0x29, 0x33, 0x59, 0x3b, 0x30, 0x6d, 0xef, 0xf4, 0x7b, 0x55, 0xeb, 0x4d, 0x50, 0xb7, 0x2a, 0x07, 0x8d, 0xff,
    0x26, 0xd7, 0xf0, 0xc2, 0x7e, 0x09, 0x8c, 0x1a, 0x6a, 0x62, 0x0b, 0x5d, 0x82, 0x1b, 0x8f, 0x2e, 0xbe, 0xa6, 0x1d,
    0xe7, 0x9d, 0x2d, 0x8a, 0x72, 0xd9, 0xf1, 0x27, 0x32, 0xbc, 0x77, 0x85, 0x96, 0x70, 0x08, 0x69, 0x56, 0xdf, 0x99,
    0x94, 0xa1, 0x90, 0x18, 0xbb, 0xfa, 0x7a, 0xb0, 0xa7, 0xf8, 0xab, 0x28, 0xd6, 0x15, 0x8e, 0xcb, 0xf2, 0x13, 0xe6,
    0x78, 0x61, 0x3f, 0x89, 0x46, 0x0d, 0x35, 0x31, 0x88, 0xa3, 0x41, 0x80, 0xca, 0x17, 0x5f, 0x53, 0x83, 0xfe, 0xc3,
    0x9b, 0x45, 0x39, 0xe1, 0xf5, 0x9e, 0x19, 0x5e, 0xb6, 0xcf, 0x4b, 0x38, 0x04, 0xb9, 0x2b, 0xe2, 0xc1, 0x4a, 0xdd,
    0x48, 0x0c, 0xd0, 0x7d, 0x3d, 0x58, 0xde, 0x7c, 0xd8, 0x14, 0x6b, 0x87, 0x47, 0xe8, 0x79, 0x84, 0x73, 0x3c, 0xbd,
    0x92, 0xc9, 0x23, 0x8b, 0x97, 0x95, 0x44, 0xdc, 0xad, 0x40, 0x65, 0x86, 0xa2, 0xa4, 0xcc, 0x7f, 0xec, 0xc0, 0xaf,
    0x91, 0xfd, 0xf7, 0x4f, 0x81, 0x2f, 0x5b, 0xea, 0xa8, 0x1c, 0x02, 0xd1, 0x98, 0x71, 0xed, 0x25, 0xe3, 0x24, 0x06,
    0x68, 0xb3, 0x93, 0x2c, 0x6f, 0x3e, 0x6c, 0x0a, 0xb8, 0xce, 0xae, 0x74, 0xb1, 0x42, 0xb4, 0x1e, 0xd3, 0x49, 0xe9,
    0x9c, 0xc8, 0xc6, 0xc7, 0x22, 0x6e, 0xdb, 0x20, 0xbf, 0x43, 0x51, 0x52, 0x66, 0xb2, 0x76, 0x60, 0xda, 0xc5, 0xf3,
    0xf6, 0xaa, 0xcd, 0x9a, 0xa0, 0x75, 0x54, 0x0e, 0x01,
];

static GF256_LOG: [u8; 256] = [
    0x00, 0xff, 0xc8, 0x08, 0x91, 0x10, 0xd0, 0x36, 0x5a, 0x3e, 0xd8, 0x43, 0x99, 0x77, 0xfe, 0x18, 0x23, 0x20, 0x07,
    0x70, 0xa1, 0x6c, 0x0c, 0x7f, 0x62, 0x8b, 0x40, 0x46, 0xc7, 0x4b, 0xe0, 0x0e, 0xeb, 0x16, 0xe8, 0xad, 0xcf, 0xcd,
    0x39, 0x53, 0x6a, 0x27, 0x35, 0x93, 0xd4, 0x4e, 0x48, 0xc3, 0x2b, 0x79, 0x54, 0x28, 0x09, 0x78, 0x0f, 0x21, 0x90,
    0x87, 0x14, 0x2a, 0xa9, 0x9c, 0xd6, 0x74, 0xb4, 0x7c, 0xde, 0xed, 0xb1, 0x86, 0x76, 0xa4, 0x98, 0xe2, 0x96, 0x8f,
    0x02, 0x32, 0x1c, 0xc1, 0x33, 0xee, 0xef, 0x81, 0xfd, 0x30, 0x5c, 0x13, 0x9d, 0x29, 0x17, 0xc4, 0x11, 0x44, 0x8c,
    0x80, 0xf3, 0x73, 0x42, 0x1e, 0x1d, 0xb5, 0xf0, 0x12, 0xd1, 0x5b, 0x41, 0xa2, 0xd7, 0x2c, 0xe9, 0xd5, 0x59, 0xcb,
    0x50, 0xa8, 0xdc, 0xfc, 0xf2, 0x56, 0x72, 0xa6, 0x65, 0x2f, 0x9f, 0x9b, 0x3d, 0xba, 0x7d, 0xc2, 0x45, 0x82, 0xa7,
    0x57, 0xb6, 0xa3, 0x7a, 0x75, 0x4f, 0xae, 0x3f, 0x37, 0x6d, 0x47, 0x61, 0xbe, 0xab, 0xd3, 0x5f, 0xb0, 0x58, 0xaf,
    0xca, 0x5e, 0xfa, 0x85, 0xe4, 0x4d, 0x8a, 0x05, 0xfb, 0x60, 0xb7, 0x7b, 0xb8, 0x26, 0x4a, 0x67, 0xc6, 0x1a, 0xf8,
    0x69, 0x25, 0xb3, 0xdb, 0xbd, 0x66, 0xdd, 0xf1, 0xd2, 0xdf, 0x03, 0x8d, 0x34, 0xd9, 0x92, 0x0d, 0x63, 0x55, 0xaa,
    0x49, 0xec, 0xbc, 0x95, 0x3c, 0x84, 0x0b, 0xf5, 0xe6, 0xe7, 0xe5, 0xac, 0x7e, 0x6e, 0xb9, 0xf9, 0xda, 0x8e, 0x9a,
    0xc9, 0x24, 0xe1, 0x0a, 0x15, 0x6b, 0x3a, 0xa0, 0x51, 0xf4, 0xea, 0xb2, 0x97, 0x9e, 0x5d, 0x22, 0x88, 0x94, 0xce,
    0x19, 0x01, 0x71, 0x4c, 0xa5, 0xe3, 0xc5, 0x31, 0xbb, 0xcc, 0x1f, 0x2d, 0x3b, 0x52, 0x6f, 0xf6, 0x2e, 0x89, 0xf7,
    0xc0, 0x68, 0x1b, 0x64, 0x04, 0x06, 0xbf, 0x83, 0x38,
];

pub const SHAMIR_OVERHEAD: usize = 1;

/// A set of raw shares, decoded from their transport encoding but not yet combined.
#[derive(Default)]
pub struct ShareSet {
    shares: Vec<Zeroizing<Vec<u8>>>,
}

impl ShareSet {
    /// Decodes a whitespace separated list of standard base64 shares.
    ///
    /// The x-coordinate of each decoded share is its last byte, not its first, as in the shares
    /// Vault hands out at init.
    pub fn decode(raw: &str) -> Result<Self, RvError> {
        let mut shares = Vec::new();
        for (index, s) in raw.split_whitespace().enumerate() {
            let share = STANDARD.decode(s).map_err(|source| RvError::ErrShareDecode { index, source })?;
            shares.push(Zeroizing::new(share));
        }

        if shares.is_empty() {
            return Err(RvError::ErrConfigInvalid("no master key shares specified".into()));
        }

        log::debug!("decoded {} key shares", shares.len());

        Ok(Self { shares })
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }

    pub fn combine(&self) -> Result<Zeroizing<Vec<u8>>, RvError> {
        let shares: Vec<&[u8]> = self.shares.iter().map(|s| s.as_slice()).collect();
        ShamirSecret::combine(&shares)
    }
}

// Share bytes never reach logs or panic messages.
impl fmt::Debug for ShareSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareSet").field("len", &self.shares.len()).finish_non_exhaustive()
    }
}

pub struct ShamirSecret {
    pub coefficients: Vec<Vec<u8>>,
}

impl ShamirSecret {
    /// Draws a random polynomial of degree `threshold - 1` per secret byte. `split` validates the
    /// threshold before getting here.
    fn with_secret(secret: &[u8], threshold: u8) -> ShamirSecret {
        let mut coefficients: Vec<Vec<u8>> = vec![];
        let mut rng = thread_rng();
        let mut rand_container = vec![0u8; usize::from(threshold.saturating_sub(1))];
        for c in secret {
            rng.fill_bytes(&mut rand_container);
            let mut coef: Vec<u8> = vec![*c];
            coef.extend_from_slice(&rand_container);
            coefficients.push(coef);
        }

        ShamirSecret { coefficients }
    }

    pub fn get_share(&self, id: u8) -> Result<Vec<u8>, RvError> {
        if id == 0 {
            return Err(RvError::ErrShamirShareCountInvalid);
        }

        let mut share_bytes: Vec<u8> = self.coefficients.iter().map(|c| Self::evaluate(c, id)).collect();
        share_bytes.push(id);
        Ok(share_bytes)
    }

    pub fn split(secret: &[u8], parts: u8, threshold: u8) -> Result<Vec<Vec<u8>>, RvError> {
        if parts < threshold || threshold < 2 || secret.is_empty() {
            return Err(RvError::ErrShamirShareCountInvalid);
        }

        let secret_data = ShamirSecret::with_secret(secret, threshold);
        (1..=parts).map(|i| secret_data.get_share(i)).collect()
    }

    /// Reconstructs the secret from `shares`.
    ///
    /// Only structural problems are reported: shares shorter than two bytes, shares of different
    /// lengths and repeated x-coordinates. A single share is accepted and interpolates to its own
    /// y values.
    pub fn combine(shares: &[&[u8]]) -> Result<Zeroizing<Vec<u8>>, RvError> {
        let first = match shares.first() {
            Some(first) => first,
            None => return Err(RvError::ErrShamirShareCountInvalid),
        };

        let share_len = first.len();
        let mut xs: Vec<u8> = Vec::with_capacity(shares.len());
        for (index, share) in shares.iter().enumerate() {
            if share.len() < 2 {
                return Err(RvError::ErrShareInvalid { index, reason: "share must be at least two bytes".into() });
            }

            if share.len() != share_len {
                return Err(RvError::ErrShareInvalid { index, reason: "all shares must be the same length".into() });
            }

            let x = share[share_len - 1];
            if xs.contains(&x) {
                return Err(RvError::ErrShareInvalid { index, reason: "duplicate share detected".into() });
            }
            xs.push(x);
        }

        let mut secret = Zeroizing::new(vec![0u8; share_len - SHAMIR_OVERHEAD]);
        let mut ys = Zeroizing::new(vec![0u8; shares.len()]);
        for (idx, byte) in secret.iter_mut().enumerate() {
            for (i, share) in shares.iter().enumerate() {
                ys[i] = share[idx];
            }
            *byte = ShamirSecret::interpolate(&xs, &ys, 0);
        }

        Ok(secret)
    }

    /// Horner evaluation of the polynomial with `coefficients` (constant term first) at `x`.
    fn evaluate(coefficients: &[u8], x: u8) -> u8 {
        coefficients.iter().rev().fold(0u8, |acc, c| ShamirSecret::gf256_add(ShamirSecret::gf256_mul(acc, x), *c))
    }

    fn interpolate(xs: &[u8], ys: &[u8], x: u8) -> u8 {
        let mut result = 0u8;
        for i in 0..xs.len() {
            let mut basis = 1u8;
            for j in 0..xs.len() {
                if i == j {
                    continue;
                }

                let num = ShamirSecret::gf256_add(x, xs[j]);
                let denom = ShamirSecret::gf256_sub(xs[i], xs[j]);
                // xs are distinct, so denom is never zero
                let term = ShamirSecret::gf256_checked_div(num, denom).unwrap_or(0);
                basis = ShamirSecret::gf256_mul(basis, term);
            }
            result = ShamirSecret::gf256_add(result, ShamirSecret::gf256_mul(ys[i], basis));
        }
        result
    }

    #[inline]
    fn gf256_add(a: u8, b: u8) -> u8 {
        a ^ b
    }

    #[inline]
    fn gf256_sub(a: u8, b: u8) -> u8 {
        ShamirSecret::gf256_add(a, b)
    }

    #[inline]
    fn gf256_mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            0
        } else {
            GF256_EXP[((u16::from(GF256_LOG[a as usize]) + u16::from(GF256_LOG[b as usize])) % 255) as usize]
        }
    }

    #[inline]
    fn gf256_checked_div(a: u8, b: u8) -> Option<u8> {
        if b == 0 {
            None
        } else if a == 0 {
            Some(0)
        } else {
            let a_log = i16::from(GF256_LOG[a as usize]);
            let b_log = i16::from(GF256_LOG[b as usize]);

            let mut diff = a_log - b_log;

            if diff < 0 {
                diff += 255;
            }
            Some(GF256_EXP[(diff % 255) as usize])
        }
    }
}
