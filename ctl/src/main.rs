//! Command-line client for fingerprint enrollment and connection settings.
//!
//! Talks to the fingerprint daemon on the system bus and to
//! connection-settings session objects on the session bus, driving the same
//! controller and mirror components the desktop panels use.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;
use tokio::sync::broadcast;

use fprint_settings::confd;
use fprint_settings::enroll::{
    self, stage_prompt, EnrollStage, EnrollStatus, EnrollmentController, EnrollmentModel,
    ModelEvent, RetryReason, StagePrompt, StartOutcome,
};
use fprint_settings::fingerd;
use fprint_settings::mirror::{ConfigMirror, ConfigStore, ConfigValue};
use fprint_settings::util::display_finger_name;
use fprint_settings::ServiceError;

/// Command line interface definition
#[derive(Debug, Parser)]
#[command(
    name = "fprint-settings-ctl",
    version,
    about = "Manage fingerprint enrollment and connection settings"
)]
struct Cli {
    /// Act for this user identity (defaults to the calling uid)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Emit machine-readable JSON where applicable
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
enum Command {
    /// List enrolled fingers
    List,
    /// Enroll a finger and follow progress until completion
    Enroll { finger: String },
    /// Restart enrollment for a finger
    ReEnroll { finger: String },
    /// Delete one enrolled finger
    Delete { finger: String },
    /// Delete all enrolled fingers
    DeleteAll,
    /// Read or change connection settings through an edit session
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the current value of one key
    Get {
        #[arg(long, default_value = confd::SERVICE)]
        dest: String,
        /// Object path of the settings session
        #[arg(long)]
        path: String,
        section: String,
        key: String,
    },
    /// Write a new value to one key
    Set {
        #[arg(long, default_value = confd::SERVICE)]
        dest: String,
        /// Object path of the settings session
        #[arg(long)]
        path: String,
        section: String,
        key: String,
        value: String,
        /// Push the write even when the cached value already matches
        #[arg(long)]
        force: bool,
    },
    /// List the allowed values of an enumerated key
    Values {
        #[arg(long, default_value = confd::SERVICE)]
        dest: String,
        /// Object path of the settings session
        #[arg(long)]
        path: String,
        section: String,
        key: String,
    },
}

#[tokio::main]
async fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .unwrap();

    let cli = Cli::parse();
    let user = cli.user.clone().unwrap_or_else(caller_uid);

    if let Err(e) = run(cli, user).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// The daemon keys enrollments by uid, not by login name.
fn caller_uid() -> String {
    let uid = unsafe { libc::getuid() };
    uid.to_string()
}

async fn run(cli: Cli, user: String) -> Result<(), Box<dyn std::error::Error>> {
    match cli.cmd {
        Command::List => {
            let (controller, _, _) = setup_enrollment(&user).await?;
            controller.refresh_enroll_list(&user).await;
            let thumbs = controller.model().thumbs(&user);

            if cli.json {
                println!("{}", serde_json::to_string(&thumbs)?);
            } else if thumbs.is_empty() {
                println!("No enrolled fingers for user {}.", user);
            } else {
                for thumb in &thumbs {
                    println!("{}", display_finger_name(thumb));
                }
            }
        }

        Command::Enroll { finger } => {
            validate_finger(&finger)?;
            let (controller, model, client) = setup_enrollment(&user).await?;

            if !model.is_valid() {
                println!("No fingerprint devices available.");
                return Ok(());
            }

            let events = model.subscribe();
            enroll::spawn_signal_forwarders(client, Arc::clone(&model));

            match controller.start_enroll(&user, &finger).await? {
                StartOutcome::NoDevice => {
                    println!("No fingerprint devices available.");
                    return Ok(());
                }
                StartOutcome::Started => {}
            }

            println!(
                "Place your {} on the reader, then lift it when told to.",
                display_finger_name(&finger).to_lowercase()
            );
            follow_enrollment(events).await;

            controller.stop_enroll().await?;
            controller.refresh_enroll_list(&user).await;
        }

        Command::ReEnroll { finger } => {
            validate_finger(&finger)?;
            let (controller, model, client) = setup_enrollment(&user).await?;

            let events = model.subscribe();
            enroll::spawn_signal_forwarders(client, Arc::clone(&model));

            let restarted = controller.re_enroll(&finger).await?;
            if !restarted {
                return Err(Box::new(ServiceError::CallFailed(
                    "could not restart enrollment".to_string(),
                )));
            }

            println!(
                "Enrollment restarted. Place your {} on the reader.",
                display_finger_name(&finger).to_lowercase()
            );
            follow_enrollment(events).await;

            controller.stop_enroll().await?;
            controller.refresh_enroll_list(&user).await;
        }

        Command::Delete { finger } => {
            validate_finger(&finger)?;
            let (controller, _, _) = setup_enrollment(&user).await?;

            controller.delete_finger(&user, &finger).await?;
            info!("deleted '{}' for user {}", finger, user);
            println!(
                "Deleted {}. {} finger(s) remain enrolled.",
                display_finger_name(&finger).to_lowercase(),
                controller.model().thumbs(&user).len()
            );
        }

        Command::DeleteAll => {
            let (controller, _, _) = setup_enrollment(&user).await?;

            controller.delete_all_fingers(&user).await?;
            println!("Deleted all enrolled fingers for user {}.", user);
        }

        Command::Config(config) => run_config(config, cli.json).await?,
    }

    Ok(())
}

async fn run_config(cmd: ConfigCommand, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Get {
            dest,
            path,
            section,
            key,
        } => {
            let mirror = setup_mirror(&dest, &path, &section, &key).await?;

            if !mirror.visible().await {
                eprintln!("Warning: {}/{} is not currently advertised.", section, key);
            }

            let value = mirror.refresh().await?;
            if json {
                println!("{}", serde_json::to_string(&value)?);
            } else {
                println!("{}", value);
            }
        }

        ConfigCommand::Set {
            dest,
            path,
            section,
            key,
            value,
            force,
        } => {
            let mut mirror = setup_mirror(&dest, &path, &section, &key).await?;
            mirror.set_force_write(force);

            // Warm the cache so the dirty check compares against the
            // remote value instead of the initial null.
            mirror.refresh().await?;
            mirror.write(parse_value(&value)).await?;
            println!("Set {}/{} = {}", section, key, value);
        }

        ConfigCommand::Values {
            dest,
            path,
            section,
            key,
        } => {
            let mirror = setup_mirror(&dest, &path, &section, &key).await?;
            mirror.refresh().await?;
            let choices = mirror.available_values().await?;

            if json {
                println!("{}", serde_json::to_string(&choices)?);
            } else {
                let current = mirror.cached_index(&choices);
                for (i, choice) in choices.iter().enumerate() {
                    let marker = if current == Some(i) { "*" } else { " " };
                    println!("{} {}\t{}", marker, choice.value, choice.text);
                }
            }
        }
    }

    Ok(())
}

fn validate_finger(finger: &str) -> Result<(), Box<dyn std::error::Error>> {
    if fingerd::FINGERS.contains(&finger) {
        return Ok(());
    }
    Err(format!(
        "unknown finger '{}'; expected one of: {}",
        finger,
        fingerd::FINGERS.join(", ")
    )
    .into())
}

async fn setup_enrollment(
    user: &str,
) -> Result<
    (EnrollmentController, Arc<EnrollmentModel>, fingerd::Client),
    Box<dyn std::error::Error>,
> {
    let client = fingerd::Client::system()
        .await
        .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;
    let model = Arc::new(EnrollmentModel::new());
    let controller =
        EnrollmentController::new(Arc::new(client.clone()), Arc::clone(&model), user).await;
    Ok((controller, model, client))
}

async fn setup_mirror(
    dest: &str,
    path: &str,
    section: &str,
    key: &str,
) -> Result<ConfigMirror, Box<dyn std::error::Error>> {
    let session = confd::Session::connect(dest, path)
        .await
        .map_err(|e| ServiceError::ConnectionFailed(e.to_string()))?;
    let store: Arc<dyn ConfigStore> = Arc::new(session);
    Ok(ConfigMirror::new(store, section, key))
}

/// Config values are strings or integers on the wire; decimal text is
/// treated as an integer.
fn parse_value(raw: &str) -> ConfigValue {
    match raw.parse::<i64>() {
        Ok(n) => ConfigValue::Integer(n),
        Err(_) => ConfigValue::String(raw.to_string()),
    }
}

/// Print enrollment feedback until the session completes or fails.
async fn follow_enrollment(mut events: broadcast::Receiver<ModelEvent>) {
    loop {
        match events.recv().await {
            Ok(ModelEvent::StageChanged(stage)) => {
                if print_stage(stage) {
                    break;
                }
            }
            Ok(ModelEvent::StatusChanged(EnrollStatus::Finished)) => {
                println!("Fingerprint added.");
                break;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Render one diagnostic stage. Returns true when the session is over.
fn print_stage(stage: EnrollStage) -> bool {
    match stage {
        EnrollStage::Default => false,
        EnrollStage::Failed => {
            println!("Enrollment failed. Please try again.");
            true
        }
        EnrollStage::StagePassed { progress } => match stage_prompt(progress) {
            StagePrompt::LiftAndPressAgain => {
                println!("[{:>3}%] Lift your finger, then press again.", progress);
                false
            }
            StagePrompt::AdjustEdgePlacement => {
                println!(
                    "[{:>3}%] Lift your finger and adjust the pressed area to capture the edges.",
                    progress
                );
                false
            }
            StagePrompt::Completed => {
                println!("[100%] Fingerprint enrolled.");
                true
            }
        },
        EnrollStage::Retry { reason } => {
            println!("{}", retry_text(reason));
            false
        }
    }
}

fn retry_text(reason: RetryReason) -> &'static str {
    match reason {
        RetryReason::SmudgedScan => {
            "Could not read the print. Clean your finger or adjust the touch position, then press again."
        }
        RetryReason::TouchTooShort => {
            "Keep your finger on the reader until you are told to lift it."
        }
        RetryReason::HighRepetition => {
            "Adjust the pressed area to capture more of your fingerprint."
        }
        RetryReason::ThumbRepeated => {
            "This fingerprint already exists. Enroll a different finger."
        }
    }
}
