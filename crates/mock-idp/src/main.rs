use axum::{
    extract::{Form, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::{pkcs1::EncodeRsaPrivateKey, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::OnceLock;

const ISSUER: &str = "http://localhost:4011";

// Global Keys
struct IdpKeys {
    encoding_key: EncodingKey,
    public_jwk: Value,
}

static KEYS: OnceLock<IdpKeys> = OnceLock::new();

#[tokio::main]
async fn main() {
    // 1. Generate RSA Key Pair on Startup
    println!("MOCK-IDP: Generating RSA-2048 keys...");
    let mut rng = rand::thread_rng();
    let bits = 2048;
    let priv_key = RsaPrivateKey::new(&mut rng, bits).expect("Failed to generate private key");
    let pub_key = RsaPublicKey::from(&priv_key);

    // jsonwebtoken EncodingKey::from_rsa_pem expects PKCS#1 or PKCS#8.
    let priv_pem = priv_key.to_pkcs1_pem(rsa::pkcs8::LineEnding::LF).unwrap();
    let encoding_key = EncodingKey::from_rsa_pem(priv_pem.as_bytes()).unwrap();

    // JWK needs Modulus (n) and Exponent (e) in Base64URL
    use rsa::traits::PublicKeyParts;
    let n = URL_SAFE_NO_PAD.encode(pub_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(pub_key.e().to_bytes_be());

    let public_jwk = json!({
        "kty": "RSA",
        "alg": "RS256",
        "use": "sig",
        "kid": "mock-key-1",
        "n": n,
        "e": e
    });

    KEYS.set(IdpKeys { encoding_key, public_jwk }).ok().unwrap();

    // 2. Setup Routes
    // The portal resolves discovery documents per organization, so the
    // same document is served both at the root and under /{org}/.
    let app = Router::new()
        .route("/.well-known/openid-configuration", get(default_configuration))
        .route(
            "/{org}/.well-known/openid-configuration",
            get(org_configuration),
        )
        .route("/jwks", get(jwks))
        .route("/authorize", get(authorize)) // Dummy
        .route("/token", post(token))
        .route("/logout", post(revoke).get(front_channel_logout));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:4011").await.unwrap();
    println!("MOCK-IDP: Listening on {ISSUER}");
    axum::serve(listener, app).await.unwrap();
}

// --- Endpoints ---

fn configuration(issuer: &str) -> Value {
    json!({
        "issuer": issuer,
        "authorization_endpoint": format!("{ISSUER}/authorize"),
        "token_endpoint": format!("{ISSUER}/token"),
        "end_session_endpoint": format!("{ISSUER}/logout"),
        "jwks_uri": format!("{ISSUER}/jwks"),
        "response_types_supported": ["code", "token", "id_token"],
        "subject_types_supported": ["public"],
        "id_token_signing_alg_values_supported": ["RS256"]
    })
}

async fn default_configuration() -> Json<Value> {
    Json(configuration(ISSUER))
}

async fn org_configuration(Path(org): Path<String>) -> Json<Value> {
    println!("MOCK-IDP: Discovery request for org={org}");
    Json(configuration(&format!("{ISSUER}/{org}")))
}

async fn jwks() -> Json<Value> {
    let keys = KEYS.get().unwrap();
    Json(json!({
        "keys": [keys.public_jwk.clone()]
    }))
}

#[derive(Deserialize)]
struct AuthorizeParams {
    client_id: Option<String>,
    redirect_uri: String,
    state: Option<String>,
}

async fn authorize(Query(params): Query<AuthorizeParams>) -> impl IntoResponse {
    println!(
        "MOCK-IDP: Authorize request for client_id={:?}",
        params.client_id
    );

    // Auto-approve: redirect straight back with a fixed code.
    let code = "DEVELOPER";
    let state = params.state.unwrap_or_default();

    let separator = if params.redirect_uri.contains('?') { '&' } else { '?' };
    let target = format!("{}{separator}code={code}&state={state}", params.redirect_uri);

    Redirect::to(&target)
}

#[derive(Deserialize)]
struct TokenRequest {
    code: String,
    #[serde(default)]
    client_id: Option<String>,
}

#[derive(Serialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    aud: String,
    exp: i64,
    iat: i64,
    name: String,
    email: String,
}

async fn token(Form(req): Form<TokenRequest>) -> Json<Value> {
    println!("MOCK-IDP: Token request code='{}'", req.code);

    // Map code to identity; any unknown code becomes its own user, so
    // tests can mint tokens for arbitrary subjects.
    let (sub, name, email) = match req.code.as_str() {
        "DEVELOPER" => (
            "100000".to_string(),
            "Dana Developer".to_string(),
            "dana@platform-mesh.dev".to_string(),
        ),
        other => (
            other.to_string(),
            format!("User {other}"),
            format!("{}@platform-mesh.dev", other.to_lowercase()),
        ),
    };

    let now = Utc::now();
    let exp = now + Duration::hours(1);

    let claims = IdTokenClaims {
        iss: ISSUER.to_string(),
        sub: sub.clone(),
        aud: req.client_id.unwrap_or_else(|| "portal".to_string()),
        exp: exp.timestamp(),
        iat: now.timestamp(),
        name,
        email,
    };

    let keys = KEYS.get().unwrap();
    let header = Header {
        kid: Some("mock-key-1".to_string()),
        alg: Algorithm::RS256,
        ..Default::default()
    };

    let id_token = encode(&header, &claims, &keys.encoding_key).unwrap();

    Json(json!({
        "access_token": id_token,
        "id_token": id_token,
        "refresh_token": format!("refresh-{sub}"),
        "token_type": "Bearer",
        "expires_in": 3600
    }))
}

#[derive(Deserialize)]
struct RevokeRequest {
    #[serde(default)]
    client_id: Option<String>,
    refresh_token: String,
}

/// Back-channel revocation: accepts any refresh token.
async fn revoke(Form(req): Form<RevokeRequest>) -> StatusCode {
    println!(
        "MOCK-IDP: Revoking refresh token '{}' for client_id={:?}",
        req.refresh_token, req.client_id
    );
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct FrontChannelParams {
    #[serde(default)]
    id_token_hint: Option<String>,
    #[serde(default)]
    post_logout_redirect_uri: Option<String>,
}

/// Front-channel logout: redirect back to the portal.
async fn front_channel_logout(Query(params): Query<FrontChannelParams>) -> impl IntoResponse {
    println!(
        "MOCK-IDP: Front-channel logout, id_token_hint present: {}",
        params.id_token_hint.is_some()
    );
    let target = params
        .post_logout_redirect_uri
        .unwrap_or_else(|| "/".to_string());
    Redirect::to(&target)
}
