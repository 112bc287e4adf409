use super::*;
use jsonwebtoken::{EncodingKey, Header, encode};

const SECRET: &str = "supersecretjwtsecretforunittesting123";

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    role: &'a str,
    aud: &'a str,
    email: Option<&'a str>,
    exp: usize,
}

fn token(secret: &str, sub: &str, aud: &str, exp: usize) -> String {
    let claims = TestClaims {
        sub,
        role: "authenticated",
        aud,
        email: Some("test@example.com"),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

const USER: &str = "123e4567-e89b-12d3-a456-426614174000";
const FAR_FUTURE: usize = 9_999_999_999;

#[test]
fn test_validate_supabase_jwt_success() {
    let verifier = SupabaseJwt::new(SECRET);

    let claims = verifier
        .validate(&token(SECRET, USER, "authenticated", FAR_FUTURE))
        .expect("Valid token should pass");

    assert_eq!(claims.sub, USER);
    assert_eq!(claims.email.as_deref(), Some("test@example.com"));
}

#[test]
fn test_validate_supabase_jwt_expired() {
    let verifier = SupabaseJwt::new(SECRET);

    let result = verifier.validate(&token(SECRET, USER, "authenticated", 1));

    assert!(matches!(result, Err(AuthError::InvalidToken(_))));
}

#[test]
fn test_validate_supabase_jwt_invalid_signature() {
    let verifier = SupabaseJwt::new(SECRET);

    let result = verifier.validate(&token("wrongsecret", USER, "authenticated", FAR_FUTURE));

    assert!(result.is_err());
}

#[test]
fn test_validate_supabase_jwt_wrong_audience() {
    let verifier = SupabaseJwt::new(SECRET);

    let result = verifier.validate(&token(SECRET, USER, "anon", FAR_FUTURE));

    assert!(result.is_err());
}

#[tokio::test]
async fn extractor_rejects_non_uuid_subject() {
    let request = axum::http::Request::builder()
        .header(
            "authorization",
            format!("Bearer {}", token(SECRET, "not-a-uuid", "authenticated", FAR_FUTURE)),
        )
        .extension(Arc::new(SupabaseJwt::new(SECRET)))
        .body(())
        .unwrap();
    let (mut parts, _) = request.into_parts();

    let result = AuthUser::from_request_parts(&mut parts, &()).await;

    assert!(matches!(result, Err(AuthError::InvalidSubject)));
}

#[tokio::test]
async fn extractor_requires_bearer_scheme() {
    let request = axum::http::Request::builder()
        .header("authorization", "Basic dXNlcjpwYXNz")
        .extension(Arc::new(SupabaseJwt::new(SECRET)))
        .body(())
        .unwrap();
    let (mut parts, _) = request.into_parts();

    let result = AuthUser::from_request_parts(&mut parts, &()).await;

    assert!(matches!(result, Err(AuthError::InvalidHeader)));
}
