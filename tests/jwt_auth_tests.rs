// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication tests.
//!
//! These tests verify that session tokens created by `create_jwt` can be
//! decoded with the claims and algorithm the auth middleware expects.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tac_broker::middleware::auth::{create_jwt, Claims};

#[test]
fn test_jwt_roundtrip() {
    let signing_key = b"test_signing_key_32_bytes_long!!";

    let token = create_jwt("user-7f3a", signing_key).unwrap();

    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(&token, &key, &validation)
        .expect("Failed to decode JWT - check Claims struct compatibility");

    assert_eq!(token_data.claims.sub, "user-7f3a");
    assert!(token_data.claims.exp > token_data.claims.iat);
    assert_eq!(token_data.claims.exp - token_data.claims.iat, 7 * 24 * 60 * 60);
}

#[test]
fn test_jwt_wrong_key_fails() {
    let token = create_jwt("user-7f3a", b"test_signing_key_32_bytes_long!!").unwrap();

    let key = DecodingKey::from_secret(b"different_key_32_bytes_long!!!!!");
    let validation = Validation::new(Algorithm::HS256);

    assert!(decode::<Claims>(&token, &key, &validation).is_err());
}

#[test]
fn test_jwt_expired_token_fails() {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let signing_key = b"test_signing_key_32_bytes_long!!";
    let claims = Claims {
        sub: "user-7f3a".to_string(),
        exp: 1_000_000,
        iat: 999_000,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap();

    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    assert!(decode::<Claims>(&token, &key, &validation).is_err());
}
