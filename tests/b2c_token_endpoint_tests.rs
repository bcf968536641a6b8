mod common;

use axum::http::StatusCode;

use b2c_desktop_auth::identity::{code_challenge, AuthorizeParams, B2cProvider, IdentityProvider, Prompt, RefreshParams};
use b2c_desktop_auth::secret::Secret;

use common::fake_b2c::{FakeB2c, Reply};
use common::{BrowserOutcome, ScriptedSurface, API_SCOPE, REDIRECT};

fn params(policy: &str) -> AuthorizeParams {
    AuthorizeParams {
        scopes: vec![API_SCOPE.to_string()],
        policy: policy.to_string(),
        prompt: Some(Prompt::SelectAccount),
        parent: None,
        login_hint: Some("jane@example.com".to_string()),
    }
}

#[tokio::test]
async fn authorization_code_is_redeemed_with_pkce_verifier() -> anyhow::Result<()> {
    let fake = FakeB2c::new();
    let (server, base) = common::serve(fake.router()).await?;
    fake.tokens("at-1", Some("rt-1"), &common::jane(), 3600);
    let surface = ScriptedSurface::new(vec![BrowserOutcome::Code("code-1".to_string())]);
    let provider = B2cProvider::with_surface(common::config_for(&base), surface.clone())?;

    let tokens = provider.authorize_interactive(&params("b2c_1_susi")).await?;
    assert_eq!(tokens.access_token.expose(), "at-1");
    assert_eq!(tokens.refresh_token.as_ref().map(|s| s.expose()), Some("rt-1"));

    let url = surface.seen.lock()[0].clone();
    assert!(url.path().ends_with("/tfp/fabrikamb2c.onmicrosoft.com/b2c_1_susi/oauth2/v2.0/authorize"));
    assert_eq!(surface.query(0, "prompt").as_deref(), Some("select_account"));
    assert_eq!(surface.query(0, "login_hint").as_deref(), Some("jane@example.com"));

    let call = fake.calls.lock()[0].clone();
    assert_eq!(call.tenant, "fabrikamb2c.onmicrosoft.com");
    assert_eq!(call.policy, "b2c_1_susi");
    assert_eq!(call.form["grant_type"], "authorization_code");
    assert_eq!(call.form["code"], "code-1");
    assert_eq!(call.form["redirect_uri"], REDIRECT);
    assert_eq!(call.form["scope"], format!("{API_SCOPE} openid offline_access"));
    // verifier sent to the token endpoint must hash to the challenge sent to the browser
    assert_eq!(Some(code_challenge(&call.form["code_verifier"])), surface.query(0, "code_challenge"));
    server.abort();
    Ok(())
}

#[tokio::test]
async fn refresh_token_grant_targets_account_policy() -> anyhow::Result<()> {
    let fake = FakeB2c::new();
    let (server, base) = common::serve(fake.router()).await?;
    fake.reply(Reply::Json(StatusCode::OK, serde_json::json!({"access_token": "at-2", "expires_in": "1800"})));
    let provider = B2cProvider::with_surface(common::config_for(&base), ScriptedSurface::new(vec![]))?;

    let tokens = provider
        .redeem_refresh_token(&RefreshParams { scopes: vec![API_SCOPE.to_string()], policy: "b2c_1_edit_profile".to_string(), refresh_token: Secret::new("rt-1") })
        .await?;
    assert_eq!(tokens.access_token.expose(), "at-2");
    assert!(tokens.id_token.is_empty());

    let call = fake.calls.lock()[0].clone();
    assert_eq!(call.policy, "b2c_1_edit_profile");
    assert_eq!(call.form["grant_type"], "refresh_token");
    assert_eq!(call.form["refresh_token"], "rt-1");
    server.abort();
    Ok(())
}

#[tokio::test]
async fn token_endpoint_errors_are_classified() -> anyhow::Result<()> {
    let fake = FakeB2c::new();
    let (server, base) = common::serve(fake.router()).await?;
    let provider = B2cProvider::with_surface(common::config_for(&base), ScriptedSurface::new(vec![]))?;
    let refresh = RefreshParams { scopes: vec![API_SCOPE.to_string()], policy: "b2c_1_susi".to_string(), refresh_token: Secret::new("rt") };

    fake.error(StatusCode::BAD_REQUEST, "invalid_grant", "AADB2C90080: The provided grant has expired.");
    let err = provider.redeem_refresh_token(&refresh).await.unwrap_err();
    assert!(err.is_ui_required());
    assert_eq!(err.message(), "AADB2C90080: The provided grant has expired.");

    fake.error(StatusCode::BAD_REQUEST, "access_denied", "AADB2C90118: The user has forgotten their password.");
    assert!(provider.redeem_refresh_token(&refresh).await.unwrap_err().is_password_reset());

    fake.reply(Reply::Text(StatusCode::BAD_GATEWAY, "<html>upstream down</html>".to_string()));
    let err = provider.redeem_refresh_token(&refresh).await.unwrap_err();
    assert_eq!(err.code_str(), "http_502");
    assert!(err.message().contains("upstream down"));
    server.abort();
    Ok(())
}

#[tokio::test]
async fn browser_error_redirect_never_reaches_token_endpoint() -> anyhow::Result<()> {
    let fake = FakeB2c::new();
    let (server, base) = common::serve(fake.router()).await?;
    let surface = ScriptedSurface::new(vec![BrowserOutcome::Error {
        error: "access_denied".to_string(),
        description: "AADB2C90118: The user has forgotten their password.".to_string(),
    }]);
    let provider = B2cProvider::with_surface(common::config_for(&base), surface)?;

    let err = provider.authorize_interactive(&params("b2c_1_susi")).await.unwrap_err();
    assert!(err.is_password_reset());
    assert!(fake.calls.lock().is_empty());
    server.abort();
    Ok(())
}

#[tokio::test]
async fn unreachable_token_endpoint_is_a_transport_error() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await?;
    let base = format!("http://{}", listener.local_addr()?);
    drop(listener);
    let provider = B2cProvider::with_surface(common::config_for(&base), ScriptedSurface::new(vec![]))?;
    let err = provider
        .redeem_refresh_token(&RefreshParams { scopes: vec![], policy: "b2c_1_susi".to_string(), refresh_token: Secret::new("rt") })
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "transport_error");
    Ok(())
}

#[tokio::test]
async fn bad_authority_fails_before_the_browser_opens() -> anyhow::Result<()> {
    let mut cfg = common::config_for("http://127.0.0.1:1");
    cfg.authority_base = Some("not a url".to_string());
    let surface = ScriptedSurface::new(vec![BrowserOutcome::Code("never".to_string())]);
    let provider = B2cProvider::with_surface(cfg, surface.clone())?;

    let err = provider.authorize_interactive(&params("b2c_1_susi")).await.unwrap_err();
    assert_eq!(err.code_str(), "invalid_authority");
    assert!(surface.seen.lock().is_empty());
    Ok(())
}
