//! JWK set container and construction of josekit signers, verifiers,
//! encrypters and decrypters from individual keys.

use std::collections::HashSet;

use josekit::{
    jwe::{
        alg::{
            aeskw::AeskwJweAlgorithm, aesgcmkw::AesgcmkwJweAlgorithm, direct::DirectJweAlgorithm,
            ecdh_es::EcdhEsJweAlgorithm, rsaes::RsaesJweAlgorithm,
        },
        JweDecrypter, JweEncrypter,
    },
    jwk::Jwk,
    jws::{
        alg::{
            ecdsa::EcdsaJwsAlgorithm, eddsa::EddsaJwsAlgorithm, hmac::HmacJwsAlgorithm,
            rsassa::RsassaJwsAlgorithm, rsassa_pss::RsassaPssJwsAlgorithm,
        },
        JwsSigner, JwsVerifier,
    },
    jwt::alg::unsecured::UnsecuredJwsAlgorithm,
};
use serde::{Deserialize, Serialize};

use crate::types::{OidcError, OidcReturn};

pub(crate) trait CustomJwk {
    fn algorithms(&self) -> HashSet<String>;

    fn is_private_key(&self) -> bool;

    fn to_signer(&self) -> OidcReturn<Box<dyn JwsSigner>>;

    fn to_verifier(&self) -> OidcReturn<Box<dyn JwsVerifier>>;

    fn to_jwe_encrypter(&self) -> OidcReturn<Box<dyn JweEncrypter>>;

    fn to_jwe_decrypter(&self) -> OidcReturn<Box<dyn JweDecrypter>>;
}

impl CustomJwk for Jwk {
    fn algorithms(&self) -> HashSet<String> {
        let mut algs: HashSet<String> = HashSet::new();

        if let Some(alg) = self.algorithm() {
            algs.insert(alg.to_string());
            return algs;
        }

        match self.key_type() {
            "EC" => {
                let key_use = self.key_use();
                if key_use == Some("enc") || key_use.is_none() {
                    algs.insert("ECDH-ES".to_string());
                    algs.insert("ECDH-ES+A128KW".to_string());
                    algs.insert("ECDH-ES+A192KW".to_string());
                    algs.insert("ECDH-ES+A256KW".to_string());
                }

                if key_use == Some("sig") || key_use.is_none() {
                    match self.curve() {
                        Some("P-256") => algs.insert("ES256".to_string()),
                        Some("secp256k1") => algs.insert("ES256K".to_string()),
                        Some("P-384") => algs.insert("ES384".to_string()),
                        Some("P-521") => algs.insert("ES512".to_string()),
                        _ => false,
                    };
                }
                algs
            }
            "RSA" => {
                let key_use = self.key_use();
                if key_use == Some("enc") || key_use.is_none() {
                    algs.insert("RSA-OAEP".to_string());
                    algs.insert("RSA-OAEP-256".to_string());
                    algs.insert("RSA-OAEP-384".to_string());
                    algs.insert("RSA-OAEP-512".to_string());
                    algs.insert("RSA1_5".to_string());
                }

                if key_use == Some("sig") || key_use.is_none() {
                    algs.insert("PS256".to_string());
                    algs.insert("PS384".to_string());
                    algs.insert("PS512".to_string());
                    algs.insert("RS256".to_string());
                    algs.insert("RS384".to_string());
                    algs.insert("RS512".to_string());
                }
                algs
            }
            "OKP" => {
                let key_use = self.key_use();
                if key_use == Some("enc") || key_use.is_none() {
                    algs.insert("ECDH-ES".to_string());
                    algs.insert("ECDH-ES+A128KW".to_string());
                    algs.insert("ECDH-ES+A192KW".to_string());
                    algs.insert("ECDH-ES+A256KW".to_string());
                }

                if key_use == Some("sig") || key_use.is_none() {
                    algs.insert("EdDSA".to_string());
                }
                algs
            }
            _ => algs,
        }
    }

    fn is_private_key(&self) -> bool {
        self.key_type() == "oct" || self.parameter("d").is_some()
    }

    fn to_signer(&self) -> OidcReturn<Box<dyn JwsSigner>> {
        let alg = self.algorithm().ok_or(OidcError::new_rp_error(
            "jwk does not have an algorithm",
            None,
        ))?;

        let error = |_| OidcError::new_rp_error("error when creating a jws signer", None);

        match alg {
            "HS256" => Ok(Box::new(
                HmacJwsAlgorithm::Hs256.signer_from_jwk(self).map_err(error)?,
            )),
            "HS384" => Ok(Box::new(
                HmacJwsAlgorithm::Hs384.signer_from_jwk(self).map_err(error)?,
            )),
            "HS512" => Ok(Box::new(
                HmacJwsAlgorithm::Hs512.signer_from_jwk(self).map_err(error)?,
            )),
            "RS256" => Ok(Box::new(
                RsassaJwsAlgorithm::Rs256
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "RS384" => Ok(Box::new(
                RsassaJwsAlgorithm::Rs384
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "RS512" => Ok(Box::new(
                RsassaJwsAlgorithm::Rs512
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "PS256" => Ok(Box::new(
                RsassaPssJwsAlgorithm::Ps256
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "PS384" => Ok(Box::new(
                RsassaPssJwsAlgorithm::Ps384
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "PS512" => Ok(Box::new(
                RsassaPssJwsAlgorithm::Ps512
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES256" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es256
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES384" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es384
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES512" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es512
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES256K" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es256k
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "EdDSA" => Ok(Box::new(
                EddsaJwsAlgorithm::Eddsa
                    .signer_from_jwk(self)
                    .map_err(error)?,
            )),
            "none" => Ok(Box::new(UnsecuredJwsAlgorithm::None.signer())),
            _ => Err(OidcError::new_rp_error(
                "invalid algorithm for creating a signer",
                None,
            )),
        }
    }

    fn to_verifier(&self) -> OidcReturn<Box<dyn JwsVerifier>> {
        let alg = self.algorithm().ok_or(OidcError::new_rp_error(
            "jwk does not have an algorithm",
            None,
        ))?;

        let error = |_| OidcError::new_rp_error("error when creating a jws verifier", None);

        match alg {
            "HS256" => Ok(Box::new(
                HmacJwsAlgorithm::Hs256
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "HS384" => Ok(Box::new(
                HmacJwsAlgorithm::Hs384
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "HS512" => Ok(Box::new(
                HmacJwsAlgorithm::Hs512
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "RS256" => Ok(Box::new(
                RsassaJwsAlgorithm::Rs256
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "RS384" => Ok(Box::new(
                RsassaJwsAlgorithm::Rs384
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "RS512" => Ok(Box::new(
                RsassaJwsAlgorithm::Rs512
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "PS256" => Ok(Box::new(
                RsassaPssJwsAlgorithm::Ps256
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "PS384" => Ok(Box::new(
                RsassaPssJwsAlgorithm::Ps384
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "PS512" => Ok(Box::new(
                RsassaPssJwsAlgorithm::Ps512
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES256" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es256
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES384" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es384
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES512" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es512
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "ES256K" => Ok(Box::new(
                EcdsaJwsAlgorithm::Es256k
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            "EdDSA" => Ok(Box::new(
                EddsaJwsAlgorithm::Eddsa
                    .verifier_from_jwk(self)
                    .map_err(error)?,
            )),
            _ => Err(OidcError::new_rp_error(
                "invalid algorithm for creating a verifier",
                None,
            )),
        }
    }

    fn to_jwe_encrypter(&self) -> OidcReturn<Box<dyn JweEncrypter>> {
        let alg = self.algorithm().ok_or(OidcError::new_rp_error(
            "jwk does not have an algorithm",
            None,
        ))?;

        let error = |_| OidcError::new_rp_error("error when creating a jwe encrypter", None);

        match alg {
            "RSA1_5" => Ok(Box::new(
                RsaesJweAlgorithm::Rsa1_5
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "RSA-OAEP" => Ok(Box::new(
                RsaesJweAlgorithm::RsaOaep
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "RSA-OAEP-256" => Ok(Box::new(
                RsaesJweAlgorithm::RsaOaep256
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEs
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES+A128KW" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEsA128kw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES+A192KW" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEsA192kw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES+A256KW" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEsA256kw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A128KW" => Ok(Box::new(
                AeskwJweAlgorithm::A128kw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A192KW" => Ok(Box::new(
                AeskwJweAlgorithm::A192kw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A256KW" => Ok(Box::new(
                AeskwJweAlgorithm::A256kw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A128GCMKW" => Ok(Box::new(
                AesgcmkwJweAlgorithm::A128gcmkw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A192GCMKW" => Ok(Box::new(
                AesgcmkwJweAlgorithm::A192gcmkw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A256GCMKW" => Ok(Box::new(
                AesgcmkwJweAlgorithm::A256gcmkw
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "dir" => Ok(Box::new(
                DirectJweAlgorithm::Dir
                    .encrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            _ => Err(OidcError::new_rp_error(
                "invalid algorithm for creating an encrypter",
                None,
            )),
        }
    }

    fn to_jwe_decrypter(&self) -> OidcReturn<Box<dyn JweDecrypter>> {
        let alg = self.algorithm().ok_or(OidcError::new_rp_error(
            "jwk does not have an algorithm",
            None,
        ))?;

        let error = |_| OidcError::new_rp_error("error when creating a jwe decrypter", None);

        match alg {
            "RSA1_5" => Ok(Box::new(
                RsaesJweAlgorithm::Rsa1_5
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "RSA-OAEP" => Ok(Box::new(
                RsaesJweAlgorithm::RsaOaep
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "RSA-OAEP-256" => Ok(Box::new(
                RsaesJweAlgorithm::RsaOaep256
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEs
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES+A128KW" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEsA128kw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES+A192KW" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEsA192kw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "ECDH-ES+A256KW" => Ok(Box::new(
                EcdhEsJweAlgorithm::EcdhEsA256kw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A128KW" => Ok(Box::new(
                AeskwJweAlgorithm::A128kw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A192KW" => Ok(Box::new(
                AeskwJweAlgorithm::A192kw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A256KW" => Ok(Box::new(
                AeskwJweAlgorithm::A256kw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A128GCMKW" => Ok(Box::new(
                AesgcmkwJweAlgorithm::A128gcmkw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A192GCMKW" => Ok(Box::new(
                AesgcmkwJweAlgorithm::A192gcmkw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "A256GCMKW" => Ok(Box::new(
                AesgcmkwJweAlgorithm::A256gcmkw
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            "dir" => Ok(Box::new(
                DirectJweAlgorithm::Dir
                    .decrypter_from_jwk(self)
                    .map_err(error)?,
            )),
            _ => Err(OidcError::new_rp_error(
                "invalid algorithm for creating a decrypter",
                None,
            )),
        }
    }
}

/// A set of JSON Web Keys
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Jwks {
    keys: Vec<Jwk>,
}

impl From<Vec<Jwk>> for Jwks {
    fn from(value: Vec<Jwk>) -> Self {
        Self { keys: value }
    }
}

impl Jwks {
    /// Returns candidate keys matching `alg`, `key_use` and `kid`, most
    /// specific first. Keys carrying an explicit `alg` or `use` outrank keys
    /// that merely could serve the algorithm.
    pub(crate) fn get(
        &self,
        alg: Option<&str>,
        key_use: Option<&str>,
        kid: Option<&str>,
        kty: Option<&str>,
    ) -> Vec<&Jwk> {
        let mut keys: Vec<&Jwk> = self
            .keys
            .iter()
            .filter(|key| {
                if let Some(kty) = kty {
                    if key.key_type() != kty {
                        return false;
                    }
                }

                if kid.is_some() && key.key_id() != kid {
                    return false;
                }

                if let (Some(wanted), Some(present)) = (key_use, key.key_use()) {
                    if wanted != present {
                        return false;
                    }
                }

                if let Some(alg) = alg {
                    if let Some(present) = key.algorithm() {
                        if present != alg {
                            return false;
                        }
                    } else if !key.algorithms().contains(alg) {
                        return false;
                    }
                }

                true
            })
            .collect();

        keys.sort_by(|first, second| {
            let first_score = key_score(first, alg.is_some(), key_use.is_some());
            let second_score = key_score(second, alg.is_some(), key_use.is_some());
            second_score.cmp(&first_score)
        });

        keys
    }

    pub(crate) fn is_only_private_keys(&self) -> bool {
        self.keys.iter().all(|k| k.is_private_key())
    }

    pub(crate) fn has_oct_keys(&self) -> bool {
        self.keys.iter().any(|k| k.key_type() == "oct")
    }

    /// Exports the public halves of the contained keys
    pub fn get_public_jwks(&self) -> Self {
        Self {
            keys: self
                .keys
                .iter()
                .filter_map(|k| k.to_public_key().ok())
                .collect(),
        }
    }

    pub(crate) fn get_keys(&self) -> Vec<Jwk> {
        self.keys.clone()
    }

    /// Number of keys in the set
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn key_score(key: &Jwk, alg_requested: bool, use_requested: bool) -> i8 {
    let mut score = 0;

    if alg_requested && key.algorithm().is_some() {
        score += 1;
    }

    if use_requested && key.key_use().is_some() {
        score += 1;
    }

    score
}
