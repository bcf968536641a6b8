//!
//! b2c-desktop
//! -----------
//! Terminal host for the sign-in core: one command per user action, with the orchestrator's
//! screen printed after each. Sign-in and profile edits open the system browser.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use b2c_desktop_auth::identity::{B2cProvider, MemorySessionCache, TokenAcquirer};
use b2c_desktop_auth::resource::ResourceClient;
use b2c_desktop_auth::{AuthConfig, AuthOrchestrator, Screen, SignInState};

const HELP: &str = "Commands:\n  signin        sign in through the browser\n  callapi       call the protected API\n  editprofile   edit the signed-in profile\n  signout       remove all cached accounts\n  status        show the current screen\n  help          show this help\n  quit | exit   leave";

fn render(screen: &Screen) {
    let state = match screen.state {
        SignInState::SignedIn => "signed in",
        SignInState::SignedOut => "signed out",
    };
    println!("[{}]", state);
    if !screen.result_text.is_empty() {
        println!("{}", screen.result_text);
    }
    if !screen.token_info_text.is_empty() {
        println!("{}", screen.token_info_text.trim_end());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cfg = AuthConfig::from_env().context("invalid B2C configuration")?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "b2c-desktop starting: RUST_LOG='{}', authority='{}', client_id='{}', api='{}'",
        rust_log, cfg.authority_sign_up_sign_in(), cfg.client_id, cfg.api_endpoint
    );

    let provider = Arc::new(B2cProvider::new(cfg.clone())?);
    let cache = Arc::new(MemorySessionCache::new());
    let acquirer = TokenAcquirer::new(provider, cache, &cfg);
    let orch = AuthOrchestrator::new(acquirer, Arc::new(ResourceClient::new()), cfg);

    render(&orch.on_startup().await);
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break; };
        let screen = match line.trim().to_ascii_lowercase().as_str() {
            "" => continue,
            "quit" | "exit" => break,
            "help" => { println!("{}", HELP); continue; }
            "signin" => orch.sign_in().await,
            "callapi" => orch.call_api().await,
            "editprofile" => orch.edit_profile().await,
            "signout" => orch.sign_out().await,
            "status" => orch.screen(),
            other => { eprintln!("unknown command '{}'; type 'help'", other); continue; }
        };
        render(&screen);
    }
    Ok(())
}
