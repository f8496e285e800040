//! SCRAM-SHA-256 client (RFC 5802, RFC 7677) as used by PostgreSQL's SASL
//! authentication. Channel binding is not offered.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// GS2 header for "no channel binding, no authzid", and its base64 form as
/// sent back in the `c=` attribute.
const GS2_HEADER: &str = "n,,";
const GS2_HEADER_B64: &str = "biws";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScramError {
    #[error("server message is not valid UTF-8")]
    NotUtf8,
    #[error("server message lacks the {0} attribute")]
    MissingAttribute(char),
    #[error("server message has a malformed {0} attribute")]
    MalformedAttribute(char),
    #[error("server nonce does not extend the client nonce")]
    ForeignNonce,
    #[error("server signature does not match")]
    BadServerSignature,
    #[error("server message arrived out of order")]
    OutOfOrder,
    #[error("key derivation failed")]
    KeyDerivation,
}

/// `server-first-message`: `r=<nonce>,s=<salt>,i=<iterations>`.
#[derive(Debug, PartialEq, Eq)]
struct ServerFirst<'a> {
    nonce: &'a str,
    salt: Vec<u8>,
    iterations: u32,
}

impl<'a> ServerFirst<'a> {
    fn parse(message: &'a str) -> Result<Self, ScramError> {
        let nonce = attribute(message, 'r')?;
        let salt = BASE64
            .decode(attribute(message, 's')?)
            .map_err(|_| ScramError::MalformedAttribute('s'))?;
        let iterations = attribute(message, 'i')?
            .parse::<u32>()
            .ok()
            .filter(|&i| i > 0)
            .ok_or(ScramError::MalformedAttribute('i'))?;
        Ok(Self {
            nonce,
            salt,
            iterations,
        })
    }
}

enum State {
    /// `client-first-message` sent.
    Started,
    /// `client-final-message` sent; the server must prove it knows the key.
    ProofSent { server_signature: [u8; 32] },
}

pub struct ScramClient {
    password: String,
    /// `client-first-message-bare`
    first_bare: String,
    nonce: String,
    state: State,
}

impl ScramClient {
    pub fn new(username: &str, password: &str) -> Self {
        let nonce: [u8; 18] = rand::thread_rng().gen();
        Self::with_nonce(username, password, BASE64.encode(nonce))
    }

    fn with_nonce(username: &str, password: &str, nonce: String) -> Self {
        Self {
            password: password.to_string(),
            first_bare: format!("n={},r={}", sasl_name(username), nonce),
            nonce,
            state: State::Started,
        }
    }

    pub fn client_first_message(&self) -> Vec<u8> {
        format!("{}{}", GS2_HEADER, self.first_bare).into_bytes()
    }

    /// Answer the server challenge with the client proof.
    pub fn process_server_first(&mut self, message: &[u8]) -> Result<Vec<u8>, ScramError> {
        if !matches!(self.state, State::Started) {
            return Err(ScramError::OutOfOrder);
        }
        let message = std::str::from_utf8(message).map_err(|_| ScramError::NotUtf8)?;
        let server = ServerFirst::parse(message)?;
        if server.nonce.len() <= self.nonce.len() || !server.nonce.starts_with(&self.nonce) {
            return Err(ScramError::ForeignNonce);
        }

        let salted = salted_password(&self.password, &server.salt, server.iterations)?;
        let client_key = hmac(&salted, b"Client Key")?;
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();

        let final_bare = format!("c={},r={}", GS2_HEADER_B64, server.nonce);
        let auth_message = format!("{},{},{}", self.first_bare, message, final_bare);

        let client_signature = hmac(&stored_key, auth_message.as_bytes())?;
        let proof: [u8; 32] = std::array::from_fn(|i| client_key[i] ^ client_signature[i]);

        let server_key = hmac(&salted, b"Server Key")?;
        self.state = State::ProofSent {
            server_signature: hmac(&server_key, auth_message.as_bytes())?,
        };

        Ok(format!("{},p={}", final_bare, BASE64.encode(proof)).into_bytes())
    }

    /// Check the `v=` signature in the server's final message.
    pub fn verify_server_final(&self, message: &[u8]) -> Result<(), ScramError> {
        let State::ProofSent { server_signature } = &self.state else {
            return Err(ScramError::OutOfOrder);
        };
        let message = std::str::from_utf8(message).map_err(|_| ScramError::NotUtf8)?;
        let received = BASE64
            .decode(attribute(message, 'v')?)
            .map_err(|_| ScramError::MalformedAttribute('v'))?;

        if received.as_slice() != server_signature.as_slice() {
            return Err(ScramError::BadServerSignature);
        }
        Ok(())
    }
}

/// Value of the `<name>=` attribute of a comma-separated SCRAM message.
fn attribute(message: &str, name: char) -> Result<&str, ScramError> {
    message
        .split(',')
        .find_map(|part| {
            let mut chars = part.chars();
            (chars.next() == Some(name) && chars.next() == Some('=')).then(|| &part[2..])
        })
        .ok_or(ScramError::MissingAttribute(name))
}

/// `Hi()`: PBKDF2 with HMAC-SHA-256.
fn salted_password(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; 32], ScramError> {
    let mut out = [0u8; 32];
    pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut out)
        .map_err(|_| ScramError::KeyDerivation)?;
    Ok(out)
}

fn hmac(key: &[u8], data: &[u8]) -> Result<[u8; 32], ScramError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| ScramError::KeyDerivation)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// RFC 5802 `saslname` escaping. PostgreSQL takes the user from the startup
/// message, so no SASLprep is applied.
fn sasl_name(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7677 section 3
    const NONCE: &str = "rOprNGfwEbeRWgbNEkqO";
    const SERVER_FIRST: &str =
        "r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,s=W22ZaJ0SNY7soEsUEjb6gQ==,i=4096";
    const CLIENT_FINAL: &str = "c=biws,r=rOprNGfwEbeRWgbNEkqO%hvYDpWUa2RaTCAfuxFIlj)hNlF$k0,\
                                p=dHzbZapWIk4jUhN+Ute9ytag9zjfMHgsqmmiz7AndVQ=";
    const SERVER_FINAL: &str = "v=6rriTRBi23WpRR/wcq1h1nS8ieAD1Ebpwkzxa+pQ4I4=";

    fn rfc_client() -> ScramClient {
        ScramClient::with_nonce("user", "pencil", NONCE.to_string())
    }

    #[test]
    fn test_rfc7677_exchange() {
        let mut client = rfc_client();
        assert_eq!(client.client_first_message(), b"n,,n=user,r=rOprNGfwEbeRWgbNEkqO");

        let client_final = client.process_server_first(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(String::from_utf8(client_final).unwrap(), CLIENT_FINAL);
        client.verify_server_final(SERVER_FINAL.as_bytes()).unwrap();
    }

    #[test]
    fn test_forged_server_signature() {
        let mut client = rfc_client();
        client.process_server_first(SERVER_FIRST.as_bytes()).unwrap();

        let forged = format!("v={}", BASE64.encode([0u8; 32]));
        assert_eq!(
            client.verify_server_final(forged.as_bytes()),
            Err(ScramError::BadServerSignature)
        );
    }

    #[test]
    fn test_server_first_validation() {
        let salt = BASE64.encode(b"salt");
        for (message, expected) in [
            (format!("r=someone-else,s={},i=4096", salt), ScramError::ForeignNonce),
            (format!("r={},s={},i=4096", NONCE, salt), ScramError::ForeignNonce),
            (format!("r={}x,i=4096", NONCE), ScramError::MissingAttribute('s')),
            (format!("r={}x,s={},i=0", NONCE, salt), ScramError::MalformedAttribute('i')),
            (format!("r={}x,s=***,i=1", NONCE), ScramError::MalformedAttribute('s')),
        ] {
            assert_eq!(
                rfc_client().process_server_first(message.as_bytes()),
                Err(expected),
                "{}",
                message
            );
        }
    }

    #[test]
    fn test_messages_out_of_order() {
        let mut client = rfc_client();
        assert_eq!(
            client.verify_server_final(SERVER_FINAL.as_bytes()),
            Err(ScramError::OutOfOrder)
        );
        client.process_server_first(SERVER_FIRST.as_bytes()).unwrap();
        assert_eq!(
            client.process_server_first(SERVER_FIRST.as_bytes()),
            Err(ScramError::OutOfOrder)
        );
    }

    #[test]
    fn test_random_nonces_differ() {
        let a = ScramClient::new("user", "pw").client_first_message();
        let b = ScramClient::new("user", "pw").client_first_message();
        assert_ne!(a, b);
    }

    #[test]
    fn test_sasl_name_escaping() {
        assert_eq!(sasl_name("a,b=c"), "a=2Cb=3Dc");
    }
}
