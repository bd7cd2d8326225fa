//! Security policies and the algorithm URIs they imply.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Signature algorithm URIs carried in SignatureData.
pub mod algorithm {
    /// RSA PKCS#1 v1.5 with SHA-1.
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    /// RSA PKCS#1 v1.5 with SHA-256.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    /// RSA PSS with SHA-256.
    pub const RSA_PSS_SHA256: &str = "http://opcfoundation.org/UA/security/rsa-pss-sha2-256";
    /// RSA PKCS#1 v1.5 key wrap.
    pub const RSA_15_KEY_WRAP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-1_5";
    /// RSA OAEP (SHA-1) key wrap.
    pub const RSA_OAEP_KEY_WRAP: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep";
    /// RSA OAEP (SHA-256) key wrap.
    pub const RSA_OAEP_SHA256_KEY_WRAP: &str =
        "http://opcfoundation.org/UA/security/rsa-oaep-sha2-256";
}

/// The asymmetric signature scheme a policy prescribes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    /// No signature.
    None,
    /// PKCS#1 v1.5 over SHA-1.
    Pkcs1Sha1,
    /// PKCS#1 v1.5 over SHA-256.
    Pkcs1Sha256,
    /// PSS over SHA-256.
    PssSha256,
}

/// The password-encryption scheme a policy prescribes for user tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionScheme {
    /// No encryption; the password travels in the clear inside the channel.
    None,
    /// RSA PKCS#1 v1.5.
    Pkcs1,
    /// RSA OAEP with SHA-1.
    OaepSha1,
    /// RSA OAEP with SHA-256.
    OaepSha256,
}

/// An OPC UA security policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecurityPolicy {
    /// No security.
    #[default]
    None,
    /// Basic128Rsa15 (legacy).
    Basic128Rsa15,
    /// Basic256 (legacy).
    Basic256,
    /// Basic256Sha256.
    Basic256Sha256,
    /// Aes128-Sha256-RsaOaep.
    Aes128Sha256RsaOaep,
    /// Aes256-Sha256-RsaPss.
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// The policy URI.
    pub const fn uri(self) -> &'static str {
        match self {
            Self::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            Self::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            Self::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            Self::Basic256Sha256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256",
            Self::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            Self::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }

    /// The short display name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Basic128Rsa15 => "Basic128Rsa15",
            Self::Basic256 => "Basic256",
            Self::Basic256Sha256 => "Basic256Sha256",
            Self::Aes128Sha256RsaOaep => "Aes128Sha256RsaOaep",
            Self::Aes256Sha256RsaPss => "Aes256Sha256RsaPss",
        }
    }

    /// Resolves a policy URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            u if u == Self::None.uri() => Some(Self::None),
            u if u == Self::Basic128Rsa15.uri() => Some(Self::Basic128Rsa15),
            u if u == Self::Basic256.uri() => Some(Self::Basic256),
            u if u == Self::Basic256Sha256.uri() => Some(Self::Basic256Sha256),
            u if u == Self::Aes128Sha256RsaOaep.uri() => Some(Self::Aes128Sha256RsaOaep),
            u if u == Self::Aes256Sha256RsaPss.uri() => Some(Self::Aes256Sha256RsaPss),
            _ => None,
        }
    }

    /// Session signatures use SHA-1 for the legacy policies and SHA-256
    /// otherwise; Aes256Sha256RsaPss switches PKCS#1 v1.5 to PSS.
    pub const fn signature_scheme(self) -> SignatureScheme {
        match self {
            Self::None => SignatureScheme::None,
            Self::Basic128Rsa15 | Self::Basic256 => SignatureScheme::Pkcs1Sha1,
            Self::Basic256Sha256 | Self::Aes128Sha256RsaOaep => SignatureScheme::Pkcs1Sha256,
            Self::Aes256Sha256RsaPss => SignatureScheme::PssSha256,
        }
    }

    /// The signature algorithm URI for SignatureData.
    pub const fn signature_algorithm(self) -> &'static str {
        match self.signature_scheme() {
            SignatureScheme::None => "",
            SignatureScheme::Pkcs1Sha1 => algorithm::RSA_SHA1,
            SignatureScheme::Pkcs1Sha256 => algorithm::RSA_SHA256,
            SignatureScheme::PssSha256 => algorithm::RSA_PSS_SHA256,
        }
    }

    /// The password-decryption scheme for user-name identity tokens.
    pub const fn encryption_scheme(self) -> EncryptionScheme {
        match self {
            Self::None => EncryptionScheme::None,
            Self::Basic128Rsa15 => EncryptionScheme::Pkcs1,
            Self::Basic256 | Self::Basic256Sha256 | Self::Aes128Sha256RsaOaep => {
                EncryptionScheme::OaepSha1
            }
            Self::Aes256Sha256RsaPss => EncryptionScheme::OaepSha256,
        }
    }

    /// The key-wrap algorithm URI a user-name token must declare.
    pub const fn encryption_algorithm(self) -> &'static str {
        match self.encryption_scheme() {
            EncryptionScheme::None => "",
            EncryptionScheme::Pkcs1 => algorithm::RSA_15_KEY_WRAP,
            EncryptionScheme::OaepSha1 => algorithm::RSA_OAEP_KEY_WRAP,
            EncryptionScheme::OaepSha256 => algorithm::RSA_OAEP_SHA256_KEY_WRAP,
        }
    }

    /// Returns `true` for policies that require certificates and nonces.
    #[inline]
    pub const fn is_secure(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SecurityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(policy) = Self::from_uri(s) {
            return Ok(policy);
        }
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "none" => Ok(Self::None),
            "basic128rsa15" => Ok(Self::Basic128Rsa15),
            "basic256" => Ok(Self::Basic256),
            "basic256sha256" => Ok(Self::Basic256Sha256),
            "aes128sha256rsaoaep" => Ok(Self::Aes128Sha256RsaOaep),
            "aes256sha256rsapss" => Ok(Self::Aes256Sha256RsaPss),
            _ => Err(format!("unknown security policy '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trip() {
        for policy in [
            SecurityPolicy::None,
            SecurityPolicy::Basic128Rsa15,
            SecurityPolicy::Basic256,
            SecurityPolicy::Basic256Sha256,
            SecurityPolicy::Aes128Sha256RsaOaep,
            SecurityPolicy::Aes256Sha256RsaPss,
        ] {
            assert_eq!(SecurityPolicy::from_uri(policy.uri()), Some(policy));
            assert_eq!(policy.uri().parse::<SecurityPolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn legacy_policies_sign_with_sha1() {
        assert_eq!(SecurityPolicy::Basic128Rsa15.signature_scheme(), SignatureScheme::Pkcs1Sha1);
        assert_eq!(SecurityPolicy::Basic256.signature_scheme(), SignatureScheme::Pkcs1Sha1);
        assert_eq!(
            SecurityPolicy::Basic256Sha256.signature_scheme(),
            SignatureScheme::Pkcs1Sha256
        );
        assert_eq!(
            SecurityPolicy::Aes256Sha256RsaPss.signature_scheme(),
            SignatureScheme::PssSha256
        );
    }

    #[test]
    fn basic128_wraps_with_pkcs1() {
        assert_eq!(SecurityPolicy::Basic128Rsa15.encryption_scheme(), EncryptionScheme::Pkcs1);
        assert_eq!(SecurityPolicy::Basic256.encryption_scheme(), EncryptionScheme::OaepSha1);
        assert_eq!(
            SecurityPolicy::Aes256Sha256RsaPss.encryption_scheme(),
            EncryptionScheme::OaepSha256
        );
    }
}
