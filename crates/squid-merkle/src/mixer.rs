//! Pluggable hardware-influenced hash mixing.
//!
//! A mixer perturbs the bytes fed to the tree hash with a host-bound seed.
//! Trees built with a mixer only verify against the same mixer; trees built
//! without one use plain hashing. Correctness never depends on its presence.

use crate::hash::sha256;

/// Strategy that blends a seed into bytes before they are hashed.
pub trait HashMixer: Send + Sync {
    /// Seed tied to the executing host.
    fn seed(&self) -> u64;

    /// Mix `input` with `seed`. Must be deterministic for a given host.
    fn mix(&self, input: &[u8], seed: u64) -> Vec<u8>;
}

/// Pure-software mixer: `SHA-256(input || seed_be || host_descriptor)`.
#[derive(Debug, Clone)]
pub struct HostHashMixer {
    descriptor: Vec<u8>,
}

impl HostHashMixer {
    /// Mixer bound to the current host's OS, architecture and CPU count.
    pub fn from_host() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let descriptor = format!(
            "{}|{}|{}|{}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::FAMILY,
            cpus
        );
        Self::with_descriptor(descriptor.into_bytes())
    }

    /// Mixer with an explicit descriptor, for reproducible tests.
    pub fn with_descriptor(descriptor: impl Into<Vec<u8>>) -> Self {
        Self {
            descriptor: descriptor.into(),
        }
    }
}

impl HashMixer for HostHashMixer {
    fn seed(&self) -> u64 {
        let digest = sha256(&[&self.descriptor]);
        let mut first = [0u8; 8];
        first.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_be_bytes(first)
    }

    fn mix(&self, input: &[u8], seed: u64) -> Vec<u8> {
        sha256(&[input, &seed.to_be_bytes(), &self.descriptor]).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixer_is_deterministic_per_descriptor() {
        let a = HostHashMixer::with_descriptor("linux|x86_64|unix|8");
        let b = HostHashMixer::with_descriptor("linux|x86_64|unix|8");
        let c = HostHashMixer::with_descriptor("macos|aarch64|unix|10");

        assert_eq!(a.seed(), b.seed());
        assert_ne!(a.seed(), c.seed());
        assert_eq!(a.mix(b"leaf", a.seed()), b.mix(b"leaf", b.seed()));
        assert_ne!(a.mix(b"leaf", a.seed()), c.mix(b"leaf", c.seed()));
        assert_eq!(a.mix(b"leaf", 7).len(), 32);
    }
}
