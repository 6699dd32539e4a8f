use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// JWT claims issued to xapi users
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64, // user id
    pub username: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct AuthService;

impl AuthService {
    /// Issue a token for a user
    pub fn generate_token(user_id: i64, username: &str, config: &Config) -> AppResult<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + Duration::hours(config.jwt_expiration_hours);

        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            exp: exp.unix_timestamp(),
            iat: now.unix_timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify a token and return its claims
    pub fn verify_token(token: &str, config: &Config) -> AppResult<Claims> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;

    fn config(secret: &str) -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: secret.to_string(),
            jwt_expiration_hours: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            log_format: LogFormat::Text,
            request_timeout: None,
            rewrite_loopback_host: false,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let config = config("secret");
        let token = AuthService::generate_token(7, "alice", &config).unwrap();

        let claims = AuthService::verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = AuthService::generate_token(7, "alice", &config("one")).unwrap();
        assert!(matches!(
            AuthService::verify_token(&token, &config("two")),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let mut config = config("secret");
        config.jwt_expiration_hours = -2;
        let token = AuthService::generate_token(7, "alice", &config).unwrap();
        assert!(matches!(
            AuthService::verify_token(&token, &config),
            Err(AppError::TokenExpired)
        ));
    }
}
