//! Homomorphic aggregation over exponential ElGamal ciphertexts.

use num_bigint_dig::BigUint;
use num_traits::One;

use crate::crypto::elgamal::Ciphertext;
use crate::group::GroupParams;

/// Pointwise product of ciphertexts; decrypts to the sum of the plaintexts.
/// An empty input yields the multiplicative identity `(1, 1)`, a valid
/// encryption of zero with randomness zero.
pub fn combine<'a, I>(group: &GroupParams, ciphertexts: I) -> Ciphertext
where
    I: IntoIterator<Item = &'a Ciphertext>,
{
    let mut alpha = BigUint::one();
    let mut beta = BigUint::one();
    for ct in ciphertexts {
        alpha = group.mul(&alpha, &ct.alpha);
        beta = group.mul(&beta, &ct.beta);
    }
    Ciphertext { alpha, beta }
}

/// Add the public constant `k` to the plaintext: `(alpha, beta * g^k)`.
pub fn shift(group: &GroupParams, ciphertext: &Ciphertext, k: u64) -> Ciphertext {
    Ciphertext {
        alpha: ciphertext.alpha.clone(),
        beta: group.mul(&ciphertext.beta, &group.pow_g(&BigUint::from(k))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::elgamal::{decrypt, encrypt, recover_exponent};
    use crate::test_utils::test_keys;

    #[test]
    fn product_of_ciphertexts_sums_plaintexts() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();

        let plaintexts = [3u64, 0, 11, 1];
        let cts: Vec<_> = plaintexts
            .iter()
            .map(|m| encrypt(&keys.group, &keys.y, *m, &mut rng).expect("encrypt").1)
            .collect();

        let sum_ct = combine(&keys.group, &cts);
        let g_m = decrypt(&keys.group, keys.secret(), &sum_ct).expect("decrypt");
        assert_eq!(
            recover_exponent(&keys.group, &g_m, 100).expect("recover"),
            plaintexts.iter().sum::<u64>()
        );
    }

    #[test]
    fn empty_aggregate_is_identity() {
        let keys = test_keys();
        let identity = combine(&keys.group, &Vec::new());
        assert_eq!(identity.alpha, BigUint::one());
        assert_eq!(identity.beta, BigUint::one());

        let g_m = decrypt(&keys.group, keys.secret(), &identity).expect("decrypt");
        assert_eq!(recover_exponent(&keys.group, &g_m, 10).expect("recover"), 0);
    }

    #[test]
    fn scalar_shift_adds_constant() {
        let mut rng = rand::thread_rng();
        let keys = test_keys();

        let (_, ct) = encrypt(&keys.group, &keys.y, 4, &mut rng).expect("encrypt");
        let shifted = shift(&keys.group, &ct, 6);
        let g_m = decrypt(&keys.group, keys.secret(), &shifted).expect("decrypt");
        assert_eq!(recover_exponent(&keys.group, &g_m, 100).expect("recover"), 10);
    }
}
