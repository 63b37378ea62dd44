use crate::config::CooldownSettings;
use crate::error::{CommandError, ConfigError};
use crate::models::cooldown::{CooldownRegistry, Rate};
use crate::utils::clock::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Who is running a command, as far as cooldowns care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Invoker {
    /// Moderators and sub-mods skip cooldowns entirely.
    pub privileged: bool,
}

impl Invoker {
    pub fn member() -> Self {
        Self { privileged: false }
    }

    pub fn moderator() -> Self {
        Self { privileged: true }
    }
}

/// Cooldowns for the spammable commands: `/meme` per meme name and
/// `/neural_net` per guild.
#[derive(Debug)]
pub struct CommandCooldowns {
    memes: CooldownRegistry<String>,
    meme_rate: Rate,
    neural_net: CooldownRegistry<String>,
    neural_net_rate: Rate,
    sweep_idle_windows: u32,
}

impl CommandCooldowns {
    pub fn new(settings: &CooldownSettings) -> Result<Self, ConfigError> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    pub fn with_clock(settings: &CooldownSettings, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        Ok(Self {
            memes: CooldownRegistry::with_clock(Arc::clone(&clock)),
            meme_rate: settings.meme.rate()?,
            neural_net: CooldownRegistry::with_clock(clock),
            neural_net_rate: settings.neural_net.rate()?,
            sweep_idle_windows: settings.sweep_idle_windows,
        })
    }

    pub fn meme(&self, name: &str, invoker: Invoker) -> Result<(), CommandError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CommandError::InvalidInput("Please name a meme.".to_string()));
        }
        guard(&self.memes, self.meme_rate, name.to_lowercase(), invoker)
    }

    pub fn neural_net(&self, guild: &str, invoker: Invoker) -> Result<(), CommandError> {
        guard(&self.neural_net, self.neural_net_rate, guild.to_string(), invoker)
    }

    /// Buckets currently tracked across both commands.
    pub fn bucket_count(&self) -> usize {
        self.memes.len() + self.neural_net.len()
    }

    /// Drops buckets idle for the configured number of windows.
    pub fn sweep(&self) -> usize {
        let memes = self.memes.sweep_idle(self.memes.now(), self.sweep_idle_windows);
        let guilds = self
            .neural_net
            .sweep_idle(self.neural_net.now(), self.sweep_idle_windows);
        memes + guilds
    }

    /// Runs [`sweep`](Self::sweep) every `interval` until the handle is aborted.
    ///
    /// Returns `None` for a zero interval.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if interval.is_zero() {
            return None;
        }
        let cooldowns = Arc::clone(self);
        info!(?interval, "Starting cooldown sweeper");
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cooldowns.sweep();
                debug!(removed, "Cooldown sweep finished");
            }
        }))
    }
}

fn guard(
    registry: &CooldownRegistry<String>,
    rate: Rate,
    key: String,
    invoker: Invoker,
) -> Result<(), CommandError> {
    if invoker.privileged {
        debug!(%key, "Privileged invoker, skipping cooldown");
        return Ok(());
    }

    let now = registry.now();
    if registry.check_and_consume(key.clone(), rate.limit(), rate.period(), now)? {
        return Ok(());
    }

    let retry_after = registry.retry_after(&key, now).unwrap_or(rate.period());
    Err(CommandError::OnCooldown { retry_after })
}
