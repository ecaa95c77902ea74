use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::Digest as _;

use crate::error::TypeError;

/// Hash algorithm a [`Digest`] was computed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Sha256,
    Sha512,
    Blake3,
}

impl Algorithm {
    /// The algorithm used for blobs stored without an explicit choice.
    pub const CANONICAL: Self = Self::Sha256;

    /// Name as it appears in the digest prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Length of the hex-encoded hash for this algorithm.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 | Self::Blake3 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "blake3" => Ok(Self::Blake3),
            other => Err(TypeError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Content identity of a blob.
///
/// A `Digest` is the pair of a hash [`Algorithm`] and the lowercase hex
/// encoding of the hash, written `<algorithm>:<hex>`. Two digests are equal
/// only if both parts are equal; the same bytes hashed with different
/// algorithms produce different digests.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: Algorithm,
    hex: String,
}

impl Digest {
    /// Parse and validate a digest string such as `sha256:e3b0c4...`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (alg, hex) = s.split_once(':').ok_or_else(|| TypeError::InvalidDigest {
            value: s.to_string(),
            reason: "missing algorithm separator ':'".into(),
        })?;
        let algorithm: Algorithm = alg.parse()?;
        if hex.len() != algorithm.hex_len() {
            return Err(TypeError::InvalidDigest {
                value: s.to_string(),
                reason: format!(
                    "expected {} hex characters for {algorithm}, got {}",
                    algorithm.hex_len(),
                    hex.len()
                ),
            });
        }
        if !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(TypeError::InvalidDigest {
                value: s.to_string(),
                reason: "hash must be lowercase hex".into(),
            });
        }
        Ok(Self {
            algorithm,
            hex: hex.to_string(),
        })
    }

    /// Digest of `data` using the canonical algorithm.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::compute(Algorithm::CANONICAL, data)
    }

    /// Digest of `data` using the given algorithm.
    pub fn compute(algorithm: Algorithm, data: &[u8]) -> Self {
        let mut digester = Digester::new(algorithm);
        digester.update(data);
        digester.finish()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The hex-encoded hash without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Short hex representation (first 12 characters), for logs.
    pub fn short_hex(&self) -> &str {
        &self.hex[..12]
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{})", self.algorithm, self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}

enum HashState {
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

/// Incremental hasher producing a [`Digest`].
///
/// Also implements [`io::Write`] so it can sit at the end of `io::copy`.
pub struct Digester {
    state: HashState,
    bytes_hashed: u64,
}

impl Digester {
    pub fn new(algorithm: Algorithm) -> Self {
        let state = match algorithm {
            Algorithm::Sha256 => HashState::Sha256(sha2::Sha256::new()),
            Algorithm::Sha512 => HashState::Sha512(sha2::Sha512::new()),
            Algorithm::Blake3 => HashState::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self {
            state,
            bytes_hashed: 0,
        }
    }

    /// Digester for the canonical algorithm.
    pub fn canonical() -> Self {
        Self::new(Algorithm::CANONICAL)
    }

    pub fn algorithm(&self) -> Algorithm {
        match self.state {
            HashState::Sha256(_) => Algorithm::Sha256,
            HashState::Sha512(_) => Algorithm::Sha512,
            HashState::Blake3(_) => Algorithm::Blake3,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            HashState::Sha256(h) => h.update(data),
            HashState::Sha512(h) => h.update(data),
            HashState::Blake3(h) => {
                h.update(data);
            }
        }
        self.bytes_hashed += data.len() as u64;
    }

    /// Total number of bytes fed into this digester.
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }

    /// Digest of everything hashed so far, without consuming the digester.
    pub fn digest(&self) -> Digest {
        let (algorithm, hex) = match &self.state {
            HashState::Sha256(h) => (Algorithm::Sha256, hex::encode(h.clone().finalize())),
            HashState::Sha512(h) => (Algorithm::Sha512, hex::encode(h.clone().finalize())),
            HashState::Blake3(h) => (Algorithm::Blake3, hex::encode(h.finalize().as_bytes())),
        };
        Digest { algorithm, hex }
    }

    pub fn finish(self) -> Digest {
        self.digest()
    }
}

impl io::Write for Digester {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for Digester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Digester")
            .field("algorithm", &self.algorithm())
            .field("bytes_hashed", &self.bytes_hashed)
            .finish()
    }
}
