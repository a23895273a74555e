use clap::{Parser, Subcommand, ValueEnum};
use consult_core::{
    presence_fallback_from_env_value, retrieval_top_k_from_env_value,
    review_policy_from_env_value, ClinicalActions, ConsultResult, CoreConfig, EmrStore,
    GuidelineRetriever, LexicalRetriever, Orchestrator, PharmacyStore, PresenceOutcome, Session,
};
use consult_types::PatientId;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "consult")]
#[command(about = "Consultation pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StoreKind {
    Emr,
    Pharmacy,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline on a note and print the resulting state
    Run {
        #[arg(long)]
        patient_id: String,
        /// Consultation note or transcript text
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Run, review and record a consultation in one go
    Consult {
        #[arg(long)]
        patient_id: String,
        #[arg(long, default_value = "")]
        note: String,
        /// Camera frame used for the presence check before any record is written
        #[arg(long)]
        face_image: Option<PathBuf>,
        /// Approve the draft
        #[arg(long, conflicts_with = "reject")]
        approve: bool,
        /// Reject the draft
        #[arg(long)]
        reject: bool,
        /// Clinician comments for the review decision
        #[arg(long, default_value = "")]
        comments: String,
        /// Send the approved draft prescription to the pharmacy after the EMR write
        #[arg(long, requires = "approve")]
        send_to_pharmacy: bool,
    },
    /// List stored records for a patient, newest first
    Records {
        #[arg(long, value_enum)]
        store: StoreKind,
        #[arg(long)]
        patient_id: String,
    },
    /// Show what the built-in guideline retriever returns for a query
    Guidelines {
        #[arg(long)]
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
}

/// Configuration from the same environment variables the server reads.
fn config_from_env() -> ConsultResult<CoreConfig> {
    let data_dir = std::env::var("CONSULT_DATA_DIR")
        .unwrap_or_else(|_| consult_core::constants::DEFAULT_DATA_DIR.into());
    CoreConfig::new(
        PathBuf::from(data_dir),
        retrieval_top_k_from_env_value(std::env::var("CONSULT_RETRIEVAL_TOP_K").ok())?,
        presence_fallback_from_env_value(std::env::var("CONSULT_PRESENCE_FALLBACK").ok())?,
        review_policy_from_env_value(std::env::var("CONSULT_REVIEW_POLICY").ok())?,
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout stays machine-readable JSON.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("consult=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = Arc::new(config_from_env()?);

    match cli.command {
        Some(Commands::Run { patient_id, note }) => {
            let orchestrator = Orchestrator::new(cfg, Arc::new(LexicalRetriever::builtin()));
            let state = orchestrator.start(PatientId::new(&patient_id)?, note);
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Some(Commands::Consult {
            patient_id,
            note,
            face_image,
            approve,
            reject,
            comments,
            send_to_pharmacy,
        }) => {
            let patient_id = PatientId::new(&patient_id)?;
            let session = Arc::new(Session::new(cfg.presence_fallback()));
            let actions = ClinicalActions::new(&cfg, Arc::clone(&session));
            let orchestrator =
                Orchestrator::new(Arc::clone(&cfg), Arc::new(LexicalRetriever::builtin()));

            session.select_patient(&patient_id);
            if let Some(path) = face_image {
                let image = std::fs::read(&path)?;
                // No detector ships with the CLI; the configured fallback decides.
                match session.verify_presence(&patient_id, &image, None) {
                    PresenceOutcome::Fallback { authorized: true } => {
                        eprintln!("Presence accepted by fail-open fallback")
                    }
                    outcome if !outcome.authorized() => eprintln!(
                        "Presence not verified; records will not be written (see CONSULT_PRESENCE_FALLBACK)"
                    ),
                    _ => {}
                }
            }

            let mut state = orchestrator.start(patient_id, note);
            if approve || reject {
                state = orchestrator.apply_review_decision(state, approve, &comments)?;
            }

            if approve {
                match actions.commit_to_emr(&mut state) {
                    Ok(record) => eprintln!("Wrote EMR record {}", record.record_id),
                    Err(e) => eprintln!("Error writing EMR record: {}", e),
                }
            }
            if approve && send_to_pharmacy {
                match actions.send_to_pharmacy(&mut state) {
                    Ok(order) => eprintln!("Sent pharmacy order {}", order.record_id),
                    Err(e) => eprintln!("Error sending pharmacy order: {}", e),
                }
            }
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Some(Commands::Records { store, patient_id }) => {
            let patient_id = PatientId::new(&patient_id)?;
            let json = match store {
                StoreKind::Emr => serde_json::to_string_pretty(&EmrStore::emr(&cfg).query(&patient_id))?,
                StoreKind::Pharmacy => {
                    serde_json::to_string_pretty(&PharmacyStore::pharmacy(&cfg).query(&patient_id))?
                }
            };
            println!("{}", json);
        }
        Some(Commands::Guidelines { query, k }) => {
            let k = k.unwrap_or(cfg.retrieval_top_k());
            let hits = LexicalRetriever::builtin().retrieve(&query, k)?;
            if hits.is_empty() {
                println!("No guidelines matched.");
            }
            for hit in hits {
                println!("[{:.2}] {}: {}", hit.score, hit.source, hit.text);
            }
        }
        None => {
            println!("Use 'consult --help' for commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pharmacy_send_requires_approval() {
        let args = |extra: &[&'static str]| {
            let mut args = vec!["consult", "consult", "--patient-id", "P001", "--send-to-pharmacy"];
            args.extend_from_slice(extra);
            args
        };
        assert!(Cli::try_parse_from(args(&[])).is_err());
        assert!(Cli::try_parse_from(args(&["--reject"])).is_err());
        assert!(Cli::try_parse_from(args(&["--approve"])).is_ok());
    }
}
