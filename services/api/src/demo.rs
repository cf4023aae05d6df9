use crate::infra::{FixtureRoster, InMemoryEnrollmentStore, InMemoryStateStorage, RosterBackend, StoreBackend};
use clap::Args;
use immersion_enroll::error::AppError;
use immersion_enroll::workflows::enrollment::{
    AdminConsole, AdminCredentials, EnrollmentPolicy, ReceiptRenderer, ReceiptView,
    RosterDirectory, TextReceipt, TrackCatalog, TrackId, VerificationStatus, WizardSession,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Student number to enroll; must match a fixture roster row.
    #[arg(long, default_value = "12345")]
    pub(crate) student_number: String,
    /// School email paired with the student number.
    #[arg(long, default_value = "maria.santos@school.edu")]
    pub(crate) email: String,
    /// Track to choose on the selection step.
    #[arg(long, default_value = "ai")]
    pub(crate) track: String,
    /// Debounce window for the scripted keystrokes, in milliseconds.
    #[arg(long, default_value_t = 50)]
    pub(crate) debounce_ms: u64,
    /// Skip the admin console portion of the demo.
    #[arg(long)]
    pub(crate) skip_admin: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Work immersion enrollment demo");

    let policy = EnrollmentPolicy {
        verify_debounce: Duration::from_millis(args.debounce_ms),
        ..EnrollmentPolicy::default()
    };
    let catalog = TrackCatalog::standard();
    let roster = Arc::new(RosterDirectory::new(
        RosterBackend::Fixture(FixtureRoster),
        policy.roster_cache_ttl,
    ));
    let store = Arc::new(StoreBackend::InMemory(InMemoryEnrollmentStore::default()));
    let storage = InMemoryStateStorage::default();

    let mut session = WizardSession::restore(
        storage.clone(),
        catalog.clone(),
        policy,
        Arc::clone(&roster),
        Arc::clone(&store),
    )?;

    println!("\nStep 1: credentials");
    // Type the student number in two bursts so the debounce coalesces them
    // into a single roster lookup for the final pair.
    let partial: String = args.student_number.chars().take(3).collect();
    session.edit_student_number(&partial).await?;
    session.edit_student_number(&args.student_number).await?;
    session.edit_email(&args.email).await?;
    println!("- entered {} / {}", args.student_number, args.email);

    tokio::time::sleep(Duration::from_millis(args.debounce_ms + 200)).await;

    match session.status().await {
        VerificationStatus::Verified => {
            let draft = session.draft().await;
            println!(
                "- verified as {} ({})",
                draft.profile.full_name, draft.profile.section
            );
        }
        VerificationStatus::NotFound => {
            println!("- no roster match for that pair; demo cannot continue");
            return Ok(());
        }
        VerificationStatus::Failed(message) => {
            println!("- verification failed: {message}");
            return Ok(());
        }
        other => {
            println!("- verification still {other:?}; demo cannot continue");
            return Ok(());
        }
    }
    if session.already_enrolled().await {
        println!("- student already has a submitted enrollment; demo cannot continue");
        return Ok(());
    }

    println!("\nStep 2: track selection");
    let tracks = session.advance_to_track_selection().await?;
    for entry in &tracks {
        let note = if entry.is_own_section {
            "own section"
        } else if entry.is_full {
            "full"
        } else {
            "open"
        };
        println!(
            "- {:<12} {:>2}/{} | {} [{}]",
            entry.track.id.to_string(),
            entry.enrolled,
            entry.ceiling,
            entry.track.title,
            note
        );
    }

    let choice = TrackId::new(args.track.clone());
    if session.select_track(&choice).await? {
        println!("- selected {choice}");
    } else {
        println!("- track {choice} is closed for this student; demo cannot continue");
        return Ok(());
    }

    println!("\nStep 3: review and submit");
    session.advance_to_review().await?;
    session.set_affirmed(true).await;
    let record = match session.submit().await {
        Ok(record) => record,
        Err(err) => {
            println!("- submission failed: {err}");
            return Ok(());
        }
    };
    println!(
        "- stored record {} at {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    println!("\nStep 4: receipt");
    let draft = session.draft().await;
    let Some(track) = catalog.get(&choice) else {
        println!("- track {choice} missing from the catalog");
        return Ok(());
    };
    match ReceiptView::compose(&draft, track).and_then(|view| TextReceipt.render(&view)) {
        Ok(artifact) => {
            println!("- {} ({} bytes)", artifact.file_name, artifact.bytes.len());
            println!("{}", String::from_utf8_lossy(&artifact.bytes));
        }
        Err(err) => println!("- receipt unavailable: {err}"),
    }

    if args.skip_admin {
        return Ok(());
    }

    println!("\nAdmin console");
    let credentials = AdminCredentials {
        username: "registrar".to_string(),
        password: "demo".to_string(),
    };
    let mut console = AdminConsole::restore(Arc::clone(&store), storage, Some(credentials))?;
    if let Err(err) = console.login("registrar", "demo") {
        println!("- login failed: {err}");
        return Ok(());
    }
    println!("- signed in as registrar");

    match console.refresh().await {
        Ok(records) => {
            for record in records {
                println!(
                    "- {} | {} | {} | {}",
                    record.student_number,
                    record.name,
                    record.section,
                    record.immersion_program.humanized()
                );
            }
        }
        Err(err) => {
            println!("- enrollment list unavailable: {err}");
            return Ok(());
        }
    }

    match console.export() {
        Ok(export) => {
            println!("- export {}:", export.file_name);
            print!("{}", String::from_utf8_lossy(&export.bytes));
        }
        Err(err) => println!("- export unavailable: {err}"),
    }

    match console.delete(record.id).await {
        Ok(()) => println!("- deleted record {}", record.id),
        Err(err) => println!("- delete failed: {err}"),
    }
    console.logout()?;
    println!("- signed out");

    Ok(())
}
