use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::Rng;
use sha2::Sha256;
use std::io;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// Failure inside the hashing engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HashError(pub String);

/// Turns secrets into self-describing digests and checks secrets against them
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// `Ok(false)` is a mismatch; `Err` means the digest could not be checked at all
    fn verify(&self, digest: &str, secret: &str) -> Result<bool, HashError>;
}

/// PBKDF2-HMAC-SHA256 with `2^cost` rounds.
///
/// Digest layout: `$pbkdf2-sha256$<cost>$<salt hex>$<hash hex>`. The cost is
/// stored per digest, so changing the configured cost only affects new hashes.
#[derive(Debug, Clone, Copy)]
pub struct Pbkdf2Hasher {
    cost: u32,
}

impl Pbkdf2Hasher {
    pub fn new(cost: u32) -> Result<Self, HashError> {
        check_cost(cost)?;
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

fn check_cost(cost: u32) -> Result<(), HashError> {
    if (MIN_COST..=MAX_COST).contains(&cost) {
        Ok(())
    } else {
        Err(HashError(format!(
            "cost {} outside allowed range {}-{}",
            cost, MIN_COST, MAX_COST
        )))
    }
}

/// Function to generate a random salt for PBKDF2
fn generate_random_salt() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..SALT_LEN).map(|_| rng.gen()).collect()
}

fn derive(secret: &str, salt: &[u8], cost: u32) -> Vec<u8> {
    let mut key = vec![0u8; HASH_LEN];
    pbkdf2::<HmacSha256>(secret.as_bytes(), salt, 1u32 << cost, &mut key);
    key
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl PasswordHasher for Pbkdf2Hasher {
    fn hash(&self, secret: &str) -> Result<String, HashError> {
        let salt = generate_random_salt();
        let key = derive(secret, &salt, self.cost);
        Ok(format!(
            "${}${}${}${}",
            SCHEME,
            self.cost,
            hex::encode(&salt),
            hex::encode(key)
        ))
    }

    fn verify(&self, digest: &str, secret: &str) -> Result<bool, HashError> {
        let parts: Vec<&str> = digest.split('$').collect();
        // leading '$' yields an empty first part
        if parts.len() != 5 || !parts[0].is_empty() || parts[1] != SCHEME {
            return Err(HashError("unrecognised digest format".to_string()));
        }
        let cost: u32 = parts[2]
            .parse()
            .map_err(|_| HashError(format!("bad cost field {:?}", parts[2])))?;
        check_cost(cost)?;
        let salt = hex::decode(parts[3]).map_err(|e| HashError(format!("bad salt: {}", e)))?;
        let expected = hex::decode(parts[4]).map_err(|e| HashError(format!("bad hash: {}", e)))?;
        if expected.len() != HASH_LEN {
            return Err(HashError("hash has wrong length".to_string()));
        }

        Ok(constant_time_eq(&derive(secret, &salt, cost), &expected))
    }
}

/// Helper function to read a password from the terminal without echo
pub fn read_password(prompt: &str) -> io::Result<String> {
    rpassword::prompt_password(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = Pbkdf2Hasher::new(MIN_COST).unwrap();
        let digest = hasher.hash("secret1").unwrap();

        assert!(digest.starts_with("$pbkdf2-sha256$4$"));
        assert!(hasher.verify(&digest, "secret1").unwrap());
        assert!(!hasher.verify(&digest, "wrong").unwrap());
    }

    #[test]
    fn test_salts_differ_per_hash() {
        let hasher = Pbkdf2Hasher::new(MIN_COST).unwrap();
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
        assert!(hasher.verify(&a, "same").unwrap());
        assert!(hasher.verify(&b, "same").unwrap());
    }

    #[test]
    fn test_digest_carries_its_own_cost() {
        let old = Pbkdf2Hasher::new(5).unwrap();
        let digest = old.hash("pw").unwrap();

        let new = Pbkdf2Hasher::new(6).unwrap();
        assert!(new.verify(&digest, "pw").unwrap());
    }

    #[test]
    fn test_cost_bounds() {
        assert!(Pbkdf2Hasher::new(3).is_err());
        assert!(Pbkdf2Hasher::new(32).is_err());
        assert_eq!(Pbkdf2Hasher::new(31).unwrap().cost(), 31);
    }

    #[test]
    fn test_malformed_digest_is_an_engine_error() {
        let hasher = Pbkdf2Hasher::new(MIN_COST).unwrap();
        assert!(hasher.verify("not-a-digest", "pw").is_err());
        assert!(hasher.verify("$pbkdf2-sha256$x$00$00", "pw").is_err());
        assert!(hasher.verify("$pbkdf2-sha256$4$zz$00", "pw").is_err());
        assert!(hasher.verify("$pbkdf2-sha256$4$00$00", "pw").is_err());
    }

    #[test]
    fn test_hash_error_displays_its_message() {
        let err = HashError("bad salt: odd length".to_string());
        assert_eq!(err.to_string(), "bad salt: odd length");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }
}
