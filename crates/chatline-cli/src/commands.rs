//! Command handlers for the chatline CLI

use std::path::Path;

use chatline_core::timeline::date_in_zone;
use chatline_core::{TimelineConfig, Timestamp, UserId};
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::render::render_snapshot;
use crate::replay::{replay_file, ReplayReport};

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Replay {
                file,
                local_user,
                with,
                utc_offset,
                json,
            } => {
                Self::handle_replay_command(config, &file, local_user, with, utc_offset, json)
                    .await
            }
            Commands::Config => Self::handle_config_command(&config),
        }
    }

    async fn handle_replay_command(
        mut config: AppConfig,
        file: &Path,
        local_user: Option<String>,
        with: Option<String>,
        utc_offset: Option<i32>,
        json: bool,
    ) -> Result<()> {
        let local = local_user
            .or_else(|| config.identity.local_user.clone())
            .map(UserId::from)
            .ok_or_else(|| {
                CliError::Config(
                    "No local user: pass --as or set identity.local_user".to_string(),
                )
            })?;

        if let Some(hours) = utc_offset {
            config.chatline.timeline = TimelineConfig::with_offset_hours(hours);
        }
        config.validate()?;

        info!("Replaying {} as {}", file.display(), local);
        let report = replay_file(
            file,
            config.chatline.clone(),
            local,
            with.map(UserId::from),
        )
        .await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print!("{}", Self::render_report(&report, &config));
        }
        Ok(())
    }

    fn render_report(report: &ReplayReport, config: &AppConfig) -> String {
        let zone = config.chatline.timeline.zone();
        let today = date_in_zone(Timestamp::now(), zone);

        let mut out = String::new();
        for snapshot in &report.snapshots {
            out.push_str(&render_snapshot(
                snapshot,
                &report.local_user,
                zone,
                today,
                &config.display,
            ));
            out.push('\n');
        }

        let summary = &report.summary;
        out.push_str(&format!(
            "{} events: {} drafts, {} accepted, {} duplicates, {} ignored, {} rejected, {} failures\n",
            summary.events,
            summary.drafts,
            summary.accepted,
            summary.duplicates,
            summary.ignored,
            summary.rejected,
            summary.failures,
        ));
        out
    }

    fn handle_config_command(config: &AppConfig) -> Result<()> {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}
