use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jpatchctl::cmd_apply::{self, ApplyArgs};
use jpatchctl::cmd_devices;
use jpatchctl::cmd_locate;
use jpatchctl::cmd_merge;
use jpatchctl::cmd_scan;

#[derive(Parser, Debug)]
#[command(name = "jpatchctl", version, about = "J-Flash device patch installer")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Output JSON where applicable
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Find the J-Flash installation directory
    Locate,
    /// List patch bundles and the folder each would install
    Scan {
        #[arg(long)]
        patches: Option<PathBuf>,
    },
    /// Install patch bundles into the J-Flash directory
    Apply {
        /// Installation directory (default: located automatically)
        #[arg(long)]
        jflash: Option<PathBuf>,
        /// Directory holding the patch bundles
        #[arg(long)]
        patches: Option<PathBuf>,
        /// Only apply the named bundle (repeatable)
        #[arg(long, value_name = "NAME")]
        only: Vec<String>,
        /// Do not create JLinkDevices.xml.bak
        #[arg(long)]
        no_backup: bool,
        /// Replace updated devices where they are instead of moving them last
        #[arg(long)]
        keep_position: bool,
        /// Ask which folder to install for every bundle
        #[arg(long, short)]
        interactive: bool,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Merge one device XML file into another
    MergeXml {
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        no_backup: bool,
        #[arg(long)]
        keep_position: bool,
    },
    /// List the device names of a JLinkDevices.xml file
    Devices { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { verbose, json, cmd } = Cli::parse();

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cmd {
        Cmd::Locate => cmd_locate::run(json)?,
        Cmd::Scan { patches } => cmd_scan::run(patches, json)?,
        Cmd::Apply {
            jflash,
            patches,
            only,
            no_backup,
            keep_position,
            interactive,
            yes,
        } => {
            let args = ApplyArgs {
                jflash,
                patches,
                only,
                no_backup,
                keep_position,
                interactive,
                yes,
            };
            cmd_apply::run(args, json).await?
        }
        Cmd::MergeXml {
            target,
            source,
            no_backup,
            keep_position,
        } => cmd_merge::run(target, source, no_backup, keep_position, json)?,
        Cmd::Devices { file } => cmd_devices::run(file, json)?,
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_apply_defaults() {
        let cli = Cli::parse_from(["jpatchctl", "apply"]);
        match cli.cmd {
            Cmd::Apply {
                jflash,
                only,
                no_backup,
                keep_position,
                interactive,
                yes,
                ..
            } => {
                assert_eq!(jflash, None);
                assert!(only.is_empty());
                assert!(!no_backup && !keep_position && !interactive && !yes);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parse_apply_filters() {
        let cli = Cli::parse_from([
            "jpatchctl",
            "-vv",
            "apply",
            "--jflash",
            "/opt/SEGGER/JLink",
            "--only",
            "GD32",
            "--only",
            "AT32",
            "--keep-position",
            "-y",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.cmd {
            Cmd::Apply {
                jflash,
                only,
                keep_position,
                yes,
                ..
            } => {
                assert_eq!(jflash, Some(PathBuf::from("/opt/SEGGER/JLink")));
                assert_eq!(only, ["GD32", "AT32"]);
                assert!(keep_position && yes);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parse_merge_xml_paths() {
        let cli = Cli::parse_from([
            "jpatchctl",
            "--json",
            "merge-xml",
            "--target",
            "JLinkDevices.xml",
            "--source",
            "patch.xml",
            "--no-backup",
        ]);
        assert!(cli.json);
        match cli.cmd {
            Cmd::MergeXml {
                target,
                source,
                no_backup,
                keep_position,
            } => {
                assert_eq!(target, PathBuf::from("JLinkDevices.xml"));
                assert_eq!(source, PathBuf::from("patch.xml"));
                assert!(no_backup && !keep_position);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn merge_xml_requires_both_files() {
        assert!(Cli::try_parse_from(["jpatchctl", "merge-xml", "--target", "a.xml"]).is_err());
    }
}
