//! Bearer token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::debug;

use crate::error::AuthError;
use crate::models::{Claims, Identity};

/// Verifies HS256-signed bearer tokens against the shared secret.
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is exact; no grace period
        validation.leeway = 0;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Checks an `Authorization` header value and pulls out the caller identity.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        let header = match header {
            Some(h) if !h.is_empty() => h,
            _ => return Err(AuthError::MissingToken),
        };

        // exactly "Bearer <token>", single space
        let mut parts = header.split(' ');
        let token = match (parts.next(), parts.next(), parts.next()) {
            (Some("Bearer"), Some(token), None) => token,
            _ => return Err(AuthError::MalformedHeader),
        };

        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            AuthError::InvalidToken
        })?;

        data.claims.into_identity().ok_or_else(|| {
            debug!("token names no subject");
            AuthError::InvalidToken
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn now() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    fn token(user_id: &str, exp: u64, secret: &str) -> String {
        let claims = Claims::for_user(user_id, &format!("{user_id}@example.com"), exp);
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_yields_identity() {
        let validator = TokenValidator::new(SECRET);
        let header = format!("Bearer {}", token("u-42", now() + 3600, SECRET));

        let identity = validator.authenticate(Some(&header)).unwrap();
        assert_eq!(identity.user_id, "u-42");
        assert_eq!(identity.email, "u-42@example.com");
    }

    #[test]
    fn missing_header() {
        let validator = TokenValidator::new(SECRET);
        assert_eq!(validator.authenticate(None), Err(AuthError::MissingToken));
        assert_eq!(validator.authenticate(Some("")), Err(AuthError::MissingToken));
    }

    #[test]
    fn wrong_scheme_or_shape() {
        let validator = TokenValidator::new(SECRET);
        let good = token("u", now() + 3600, SECRET);

        for header in [
            "Basic xyz".to_string(),
            "Bearer".to_string(),
            format!("bearer {good}"),
            format!("Bearer {good} extra"),
            format!("Bearer  {good}"),
        ] {
            assert_eq!(
                validator.authenticate(Some(&header)),
                Err(AuthError::MalformedHeader),
                "{header}"
            );
        }
    }

    #[test]
    fn expired_token_is_invalid() {
        let validator = TokenValidator::new(SECRET);
        let header = format!("Bearer {}", token("u", now() - 3600, SECRET));
        assert_eq!(validator.authenticate(Some(&header)), Err(AuthError::InvalidToken));
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let validator = TokenValidator::new(SECRET);
        let header = format!("Bearer {}", token("u", now() + 3600, "other-secret"));
        assert_eq!(validator.authenticate(Some(&header)), Err(AuthError::InvalidToken));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let validator = TokenValidator::new(SECRET);
        assert_eq!(
            validator.authenticate(Some("Bearer abc.def.ghi")),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn user_id_and_sub_together() {
        let validator = TokenValidator::new(SECRET);
        let claims = serde_json::json!({
            "user_id": "u-1",
            "sub": "subject-1",
            "email": "a@b.c",
            "exp": now() + 600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let identity = validator.authenticate(Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(identity.user_id, "u-1");
        assert_eq!(identity.email, "a@b.c");
    }

    #[test]
    fn token_without_subject_is_invalid() {
        let validator = TokenValidator::new(SECRET);
        let claims = serde_json::json!({ "email": "a@b.c", "exp": now() + 600 });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            validator.authenticate(Some(&format!("Bearer {token}"))),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn accepts_standard_sub_claim() {
        let validator = TokenValidator::new(SECRET);
        let claims = serde_json::json!({ "sub": "u-7", "exp": now() + 60 });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let identity = validator.authenticate(Some(&format!("Bearer {token}"))).unwrap();
        assert_eq!(identity.user_id, "u-7");
        assert!(identity.email.is_empty());
    }
}
