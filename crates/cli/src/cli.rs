//! Command-line arguments.

use chrono::FixedOffset;
use chrono_tz::Tz;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "lockkeeper")]
#[command(author, version, about = "Project lock service operator tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Authenticated user on whose behalf the command runs
    #[arg(short, long, global = true)]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply database migrations
    Migrate,

    /// Acquire a project lock, optionally revoking the current holder
    Acquire {
        #[command(flatten)]
        key: KeyArgs,
        /// Ask the current holder to give the lock up
        #[arg(long)]
        revoke: bool,
        /// Seconds to wait for a revoked lock to clear
        #[arg(long, allow_negative_numbers = true)]
        timeout: Option<i64>,
    },

    /// Release a lock by id
    Release { office: String, lock_id: String },

    /// Forcibly remove the lock on a key
    Revoke {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// Report whether a key is locked
    Status {
        #[command(flatten)]
        key: KeyArgs,
    },

    /// List locks
    Locks {
        #[command(flatten)]
        filter: FilterArgs,
        /// Time zone for acquire times: an IANA name such as
        /// `America/Los_Angeles`, or a UTC offset such as `+01:00`
        #[arg(
            long,
            alias = "utc-offset",
            default_value = "UTC",
            allow_hyphen_values = true,
            value_parser = parse_time_zone
        )]
        time_zone: CatalogZone,
    },

    /// Show a lock and any pending revocation request
    LockInfo { office: String, lock_id: String },

    /// Manage lock revoker rights
    Rights {
        #[command(subcommand)]
        action: RightsAction,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct KeyArgs {
    pub office: String,
    pub project: String,
    pub application: String,
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct FilterArgs {
    /// Project mask (`*` and `?` wildcards)
    #[arg(long)]
    pub project: Option<String>,
    /// Application mask
    #[arg(long)]
    pub application: Option<String>,
    /// Office mask
    #[arg(long)]
    pub office: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum RightsAction {
    /// Grant a user revoker rights
    Allow {
        office: String,
        grantee: String,
        /// Office mask, applied within the owning office (defaults to it)
        #[arg(long)]
        office_mask: Option<String>,
        #[arg(long, default_value = "*")]
        project_mask: String,
        #[arg(long, default_value = "*")]
        application_mask: String,
    },

    /// Ensure a grant exists, or remove it with `--allow false`
    Update {
        office: String,
        grantee: String,
        #[arg(long, default_value = "*")]
        project_mask: String,
        #[arg(long, default_value = "*")]
        application_mask: String,
        #[arg(long)]
        office_mask: Option<String>,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        allow: bool,
    },

    /// Remove every matching grant a user holds in an office
    RemoveAll {
        office: String,
        grantee: String,
        #[arg(long)]
        office_mask: Option<String>,
        #[arg(long)]
        application_mask: Option<String>,
    },

    /// Check whether a user may revoke the lock on a key
    Check {
        #[command(flatten)]
        key: KeyArgs,
        grantee: String,
    },

    /// List grants
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Zone in which the lock catalog renders acquire times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatalogZone {
    /// IANA zone; the offset follows daylight saving per row.
    Named(Tz),
    Fixed(FixedOffset),
}

/// Parse an IANA zone name, `Z`, or `+HH:MM` / `-HH:MM`.
pub fn parse_time_zone(value: &str) -> Result<CatalogZone, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") {
        return Ok(CatalogZone::Named(Tz::UTC));
    }
    if let Ok(tz) = value.parse::<Tz>() {
        return Ok(CatalogZone::Named(tz));
    }
    value
        .parse::<FixedOffset>()
        .map(CatalogZone::Fixed)
        .map_err(|_| format!("unknown time zone '{value}' (use an IANA name or +HH:MM)"))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("lockkeeper").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn acquire_with_revoke() {
        let cli = parse(&[
            "acquire", "SPK", "lockRelease", "test_release", "--revoke", "--timeout", "5",
            "--user", "q0hecxyz",
        ]);
        assert_eq!(cli.user.as_deref(), Some("q0hecxyz"));
        assert_matches!(
            cli.command,
            Commands::Acquire { key, revoke: true, timeout: Some(5) }
                if key.office == "SPK" && key.project == "lockRelease"
        );
    }

    #[test]
    fn acquire_accepts_negative_timeout_for_validation_downstream() {
        let cli = parse(&["acquire", "SPK", "p", "a", "--revoke", "--timeout", "-1"]);
        assert_matches!(cli.command, Commands::Acquire { timeout: Some(-1), .. });
    }

    #[test]
    fn global_format_flag() {
        let cli = parse(&["status", "SPK", "p", "a", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.json_logs);
    }

    #[test]
    fn locks_parses_offset_and_masks() {
        let cli = parse(&["locks", "--project", "lock*", "--utc-offset", "-08:00"]);
        assert_matches!(
            cli.command,
            Commands::Locks { filter, time_zone: CatalogZone::Fixed(offset) }
                if filter.project.as_deref() == Some("lock*")
                    && offset.local_minus_utc() == -8 * 3600
        );
    }

    #[test]
    fn locks_parses_named_zone_and_defaults_to_utc() {
        let cli = parse(&["locks", "--time-zone", "America/Los_Angeles"]);
        assert_matches!(
            cli.command,
            Commands::Locks { time_zone: CatalogZone::Named(tz), .. }
                if tz == chrono_tz::America::Los_Angeles
        );

        let cli = parse(&["locks"]);
        assert_matches!(
            cli.command,
            Commands::Locks { time_zone: CatalogZone::Named(tz), .. } if tz == Tz::UTC
        );
    }

    #[test]
    fn rights_update_can_deny() {
        let cli = parse(&[
            "rights", "update", "SPK", "q0hecxyz", "--project-mask", "updIT", "--allow", "false",
        ]);
        assert_matches!(
            cli.command,
            Commands::Rights { action: RightsAction::Update { allow: false, project_mask, .. } }
                if project_mask == "updIT"
        );
    }

    #[test]
    fn rights_allow_defaults_masks() {
        let cli = parse(&["rights", "allow", "SPK", "q0hecxyz"]);
        assert_matches!(
            cli.command,
            Commands::Rights {
                action: RightsAction::Allow { office_mask: None, project_mask, application_mask, .. }
            } if project_mask == "*" && application_mask == "*"
        );
    }

    #[test]
    fn missing_key_parts_are_rejected() {
        assert!(Cli::try_parse_from(["lockkeeper", "acquire", "SPK", "p"]).is_err());
    }

    #[test]
    fn time_zone_parsing() {
        assert_eq!(parse_time_zone("Z").unwrap(), CatalogZone::Named(Tz::UTC));
        assert_eq!(parse_time_zone("UTC").unwrap(), CatalogZone::Named(Tz::UTC));
        assert_eq!(
            parse_time_zone("Europe/Berlin").unwrap(),
            CatalogZone::Named(chrono_tz::Europe::Berlin)
        );
        assert_matches!(
            parse_time_zone("+05:30").unwrap(),
            CatalogZone::Fixed(offset) if offset.local_minus_utc() == 5 * 3600 + 1800
        );
        assert!(parse_time_zone("nowhere").is_err());
    }
}
