use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

// https://github.com/opencontainers/image-spec/blob/main/descriptor.md#digests
//
// Only the string form is checked here; blob content is never hashed during an import.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OciDigest {
    algorithm: Algorithm,
    encoded: String,
}

impl TryFrom<&str> for OciDigest {
    type Error = Error;
    fn try_from(s: &str) -> Result<Self> {
        let i = match s.find(':') {
            Some(i) => i,
            None => return Err(Error::InvalidDigest(s.to_string())),
        };
        let algo: &str = match s.get(..i) {
            Some(a) if is_algorithm(a) => a,
            _ => return Err(Error::InvalidDigest(s.to_string())),
        };
        let encoded: &str = match s.get(i + 1..) {
            Some(e) if is_encoded(e) => e,
            _ => return Err(Error::InvalidDigest(s.to_string())),
        };

        Ok(Self {
            algorithm: Algorithm::from(algo),
            encoded: encoded.to_string(),
        })
    }
}

impl FromStr for OciDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OciDigest::try_from(s)
    }
}

impl From<OciDigest> for String {
    fn from(d: OciDigest) -> String {
        d.to_string()
    }
}

impl From<&OciDigest> for String {
    fn from(d: &OciDigest) -> String {
        d.to_string()
    }
}

impl fmt::Display for OciDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.encoded)
    }
}

impl OciDigest {
    /// The algorithm portion, eg `sha256`.
    pub fn algorithm(&self) -> &str {
        self.algorithm.as_str()
    }

    /// The encoded portion following the `:`.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Whether the algorithm is one registered by the OCI image spec.
    pub fn is_registered(&self) -> bool {
        !matches!(self.algorithm, Algorithm::Unregistered(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Algorithm {
    Sha256,
    Sha512,
    Unregistered(String),
}

impl From<&str> for Algorithm {
    fn from(a: &str) -> Self {
        match a {
            "sha256" => Algorithm::Sha256,
            "sha512" => Algorithm::Sha512,
            s => Algorithm::Unregistered(s.to_string()),
        }
    }
}

impl Algorithm {
    fn as_str(&self) -> &str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
            Algorithm::Unregistered(s) => s.as_str(),
        }
    }
}

// algorithm-component ::= [a-z0-9]+
// algorithm-separator ::= [+._-]
fn is_algorithm(s: &str) -> bool {
    !s.is_empty()
        && s.split(|c| matches!(c, '+' | '.' | '_' | '-'))
            .all(|component| {
                !component.is_empty()
                    && component
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            })
}

// encoded ::= [a-zA-Z0-9=_-]+
fn is_encoded(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '=' | '_' | '-'))
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::sha256("sha256:meow", Ok(OciDigest {
        algorithm: Algorithm::Sha256,
        encoded: String::from("meow"),
    }))]
    #[case::sha512("sha512:meow", Ok(OciDigest {
        algorithm: Algorithm::Sha512,
        encoded: String::from("meow"),
    }))]
    #[case::unregistered("multihash+base58:QmRZxt2b1FVZPNqd8hsiykDL3TdBDeTSPX9Kv46HmX4Gx8", Ok(OciDigest {
        algorithm: Algorithm::Unregistered(String::from("multihash+base58")),
        encoded: String::from("QmRZxt2b1FVZPNqd8hsiykDL3TdBDeTSPX9Kv46HmX4Gx8"),
    }))]
    #[case::no_separator("sha256meow", Err(Error::InvalidDigest(String::from("sha256meow"))))]
    #[case::empty_encoded("sha256:", Err(Error::InvalidDigest(String::from("sha256:"))))]
    #[case::empty_algorithm(":meow", Err(Error::InvalidDigest(String::from(":meow"))))]
    #[case::uppercase_algorithm("SHA256:meow", Err(Error::InvalidDigest(String::from("SHA256:meow"))))]
    #[case::dangling_separator("sha256+:meow", Err(Error::InvalidDigest(String::from("sha256+:meow"))))]
    #[case::slash_in_encoded("sha256:me/ow", Err(Error::InvalidDigest(String::from("sha256:me/ow"))))]
    fn validate_try_from(#[case] input: &str, #[case] expected: Result<OciDigest>) {
        let actual: Result<OciDigest> = input.try_into();
        match (expected, actual) {
            (Ok(exp), Ok(act)) => {
                assert_eq!(exp, act);
            }
            (Ok(s), Err(e)) => {
                panic!("expected Ok( {s:?} ) got Err( {e:?} )");
            }
            (Err(exp), Err(act)) => {
                let exp = format!("{exp}");
                let act = format!("{act}");
                assert_eq!(exp, act);
            }
            (Err(e), Ok(s)) => {
                panic!("expected Err( {e:?} ) got Ok( {s:?} )");
            }
        }
    }

    #[test]
    fn display_round_trips_the_input() {
        let d: OciDigest = "sha256:aaa".parse().unwrap();
        assert_eq!(d.to_string(), "sha256:aaa");
        assert_eq!(d.algorithm(), "sha256");
        assert_eq!(d.encoded(), "aaa");
        assert!(d.is_registered());
    }
}
