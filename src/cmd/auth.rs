//! Session commands: `login`, `register`, `logout`.

use anyhow::{Context, Result};
use console::style;

use metritask::config::Config;
use metritask::models::{AuthResponse, LoginRequest, RegisterRequest};

use super::connect;

fn print_welcome(auth: &AuthResponse) {
    match &auth.user {
        Some(user) => println!(
            "{} Logged in as {} <{}>",
            style("✓").green().bold(),
            style(&user.name).bold(),
            user.email
        ),
        None => println!("{} Logged in", style("✓").green().bold()),
    }
}

pub async fn cmd_login(config: &Config, email: &str, password: &str) -> Result<()> {
    let gateway = connect(config)?;
    let auth = gateway
        .login(&LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .context("Login failed")?;
    print_welcome(&auth);
    Ok(())
}

pub async fn cmd_register(config: &Config, name: &str, email: &str, password: &str) -> Result<()> {
    let gateway = connect(config)?;
    let auth = gateway
        .register(&RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        })
        .await
        .context("Registration failed")?;
    print_welcome(&auth);
    Ok(())
}

pub async fn cmd_logout(config: &Config) -> Result<()> {
    let gateway = connect(config)?;
    gateway.logout().await.context("Logout failed")?;
    println!("{} Logged out", style("✓").green().bold());
    Ok(())
}
