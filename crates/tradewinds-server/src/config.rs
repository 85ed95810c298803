//! Server configuration from the environment.

use anyhow::{bail, Context};
use std::net::SocketAddr;
use tradewinds_core::{GameConfig, TurnOrder};

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Rules every new match in this server starts with
    pub game: GameConfig,
}

impl ServerConfig {
    /// Read `SERVER_ADDR`, `TURN_ORDER` and `FREE_SETUP_BUILDS`.
    ///
    /// Setup builds are free unless `FREE_SETUP_BUILDS=false`: players start
    /// with empty hands, so paid setup leaves nobody able to place anything.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let mut game = GameConfig {
            free_setup_builds: true,
            ..GameConfig::default()
        };
        if let Some(order) = lookup("TURN_ORDER") {
            game.turn_order = match order.as_str() {
                "join" => TurnOrder::JoinOrder,
                "random" => TurnOrder::Random,
                other => bail!("TURN_ORDER must be join or random, got {other}"),
            };
        }
        if let Some(free) = lookup("FREE_SETUP_BUILDS") {
            game.free_setup_builds = free
                .parse()
                .with_context(|| format!("FREE_SETUP_BUILDS must be true or false, got {free}"))?;
        }

        Ok(Self { addr, game })
    }
}
