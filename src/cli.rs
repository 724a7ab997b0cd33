// ABOUTME: Command line interface for the webssh client
// Flags override the loaded config and optionally describe a remote login

use crate::config::ClientConfig;
use crate::transport::ConnectRequest;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "webssh")]
#[command(about = "Terminal client for web-SSH gateways, with resilient multiplexed sessions")]
#[command(version)]
pub struct Cli {
    /// WebSocket URL of the gateway's STOMP endpoint
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// Remote SSH host to log into once connected
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Remote SSH port
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    #[arg(short, long, value_name = "USER")]
    pub username: Option<String>,

    #[arg(long, env = "WEBSSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Config file to use instead of the per-user one
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Stay failed after a connection loss instead of counting down to a retry
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_reconnect: bool,
}

impl Cli {
    /// Apply flag overrides on top of `config`
    pub fn apply_to(&self, config: &mut ClientConfig) {
        if let Some(url) = &self.url {
            config.server.url = url.clone();
        }
        if let Some(host) = &self.host {
            config.connect.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            config.connect.port = port;
        }
        if let Some(username) = &self.username {
            config.connect.username = Some(username.clone());
        }
        if self.no_reconnect {
            config.reconnect.enabled = false;
        }
    }

    /// Login to send once the channel opens. Needs a host and a username.
    pub fn login_request(&self, config: &ClientConfig) -> Option<ConnectRequest> {
        let host = config.connect.host.clone()?;
        let username = config.connect.username.clone()?;
        Some(ConnectRequest {
            host,
            port: config.connect.port,
            username,
            password: self.password.clone().unwrap_or_default(),
        })
    }
}
