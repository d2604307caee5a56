//! Authorization header computation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fauna_types::Secret;
use std::fmt;

/// The fixed authorization header of a connection.
///
/// Computed once at construction as `"Basic " + base64(secret + ":")` and
/// reused byte-for-byte on every request. `Debug` redacts the encoded value,
/// since it is trivially reversible to the secret.
#[derive(Clone)]
pub struct AuthHeader(String);

impl AuthHeader {
    pub fn new(secret: &Secret) -> Self {
        let encoded = STANDARD.encode(format!("{}:", secret.expose_secret()));
        Self(format!("Basic {}", encoded))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthHeader(\"Basic ...\")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_secret_with_trailing_colon() {
        let header = AuthHeader::new(&Secret::from("secret"));
        // base64("secret:")
        assert_eq!(header.value(), "Basic c2VjcmV0Og==");
    }

    #[test]
    fn debug_never_contains_the_encoded_value() {
        let header = AuthHeader::new(&Secret::from("super-secret-key"));
        let debug = format!("{:?}", header);
        assert_eq!(debug, "AuthHeader(\"Basic ...\")");
    }
}
