use crate::infra::{demo_user_id, Deployment, SHOWCASE_PROPERTY};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use lucky_draw::config::DrawPolicy;
use lucky_draw::draws::{
    picker_for_seed, LuckyDrawError, LuckyDrawService, PropertyId, RegistrantExport, RegistryId,
    WinnerAnnouncement,
};
use lucky_draw::error::AppError;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of users registering for the scripted draw.
    #[arg(long, default_value_t = 8)]
    pub(crate) registrants: usize,
    /// Seed for reproducible winner selection.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// Skip printing the CSV export.
    #[arg(long)]
    pub(crate) skip_export: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            registrants: 8,
            seed: None,
            skip_export: false,
        }
    }
}

pub(crate) struct DemoOutcome {
    pub(crate) registry_id: RegistryId,
    pub(crate) property_title: String,
    pub(crate) opens_at: DateTime<Utc>,
    pub(crate) closes_at: DateTime<Utc>,
    pub(crate) early_selection: Option<LuckyDrawError>,
    pub(crate) duplicate_attempt: Option<LuckyDrawError>,
    pub(crate) repeat_selection: Option<LuckyDrawError>,
    pub(crate) winner: WinnerAnnouncement,
    pub(crate) export: RegistrantExport,
}

fn demo_phone(index: usize) -> String {
    format!("9{:09}", index)
}

/// Enroll, register, try the usual mistakes, pick a winner, export. All on simulated time.
pub(crate) fn script_draw(args: &DemoArgs, start: DateTime<Utc>) -> Result<DemoOutcome, AppError> {
    let deployment = Deployment::seeded(args.registrants)?;
    let service = LuckyDrawService::new(
        deployment.repository.clone(),
        deployment.catalog.clone(),
        deployment.directory.clone(),
        DrawPolicy::default(),
    )
    .with_picker(picker_for_seed(args.seed));

    let opens_at = start;
    let closes_at = start + Duration::days(7);

    let receipt = service.enroll_property(
        &PropertyId(SHOWCASE_PROPERTY.to_string()),
        opens_at,
        closes_at,
        start,
    )?;
    let registry_id = receipt.registry_id;

    for index in 1..=args.registrants {
        let at = start + Duration::minutes(index as i64);
        service.register(&registry_id, &demo_user_id(index), &demo_phone(index), at)?;
    }

    let duplicate_attempt = if args.registrants > 0 {
        service
            .register(
                &registry_id,
                &demo_user_id(1),
                &demo_phone(1),
                start + Duration::days(1),
            )
            .err()
    } else {
        None
    };
    let early_selection = service
        .select_winner(&registry_id, start + Duration::days(2))
        .err();

    let winner = service.select_winner(&registry_id, closes_at + Duration::hours(1))?;
    let repeat_selection = service
        .select_winner(&registry_id, closes_at + Duration::hours(2))
        .err();
    let export = service.export_registrants(&registry_id, closes_at + Duration::hours(2))?;

    Ok(DemoOutcome {
        registry_id,
        property_title: receipt.property.title,
        opens_at,
        closes_at,
        early_selection,
        duplicate_attempt,
        repeat_selection,
        winner,
        export,
    })
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let outcome = script_draw(&args, Utc::now())?;

    println!("Lucky draw demo");
    println!(
        "- Draw {} for {} ({} -> {})",
        outcome.registry_id, outcome.property_title, outcome.opens_at, outcome.closes_at
    );
    println!("- {} registrants entered", outcome.winner.registrant_count);
    if let Some(err) = &outcome.duplicate_attempt {
        println!("- Repeat registration refused: {}", err);
    }
    if let Some(err) = &outcome.early_selection {
        println!("- Selection before close refused: {}", err);
    }
    println!(
        "- Winner: {} <{}> ({})",
        outcome.winner.name, outcome.winner.email, outcome.winner.user_id
    );
    if let Some(err) = &outcome.repeat_selection {
        println!("- Second selection refused: {}", err);
    }

    if args.skip_export {
        return Ok(());
    }

    println!(
        "\nExport {} ({} rows)",
        outcome.export.file_name, outcome.export.row_count
    );
    print!("{}", String::from_utf8_lossy(&outcome.export.bytes));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lucky_draw::draws::IneligibleReason;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn scripted_draw_records_mistakes_and_winner() {
        let args = DemoArgs {
            registrants: 4,
            seed: Some(11),
            skip_export: false,
        };

        let outcome = script_draw(&args, start()).expect("demo runs");

        assert!(matches!(
            outcome.duplicate_attempt,
            Some(LuckyDrawError::DuplicateRegistration)
        ));
        assert!(matches!(
            outcome.early_selection,
            Some(LuckyDrawError::NotEligible(
                IneligibleReason::RegistrationNotClosed { .. }
            ))
        ));
        assert!(matches!(
            outcome.repeat_selection,
            Some(LuckyDrawError::NotEligible(IneligibleReason::AlreadyCompleted))
        ));
        assert_eq!(outcome.winner.registrant_count, 4);
        assert_eq!(outcome.export.row_count, 4);
        let csv = String::from_utf8(outcome.export.bytes).expect("utf8");
        assert_eq!(csv.lines().filter(|line| line.ends_with(",Yes")).count(), 1);
    }

    #[test]
    fn same_seed_same_winner() {
        let args = DemoArgs {
            registrants: 6,
            seed: Some(5),
            skip_export: true,
        };
        let first = script_draw(&args, start()).expect("first run");
        let second = script_draw(&args, start()).expect("second run");
        assert_eq!(first.winner.user_id, second.winner.user_id);
    }

    #[test]
    fn empty_draw_reports_no_registrants() {
        let args = DemoArgs {
            registrants: 0,
            ..DemoArgs::default()
        };
        match script_draw(&args, start()) {
            Err(AppError::Draw(LuckyDrawError::NoRegistrants)) => {}
            Err(other) => panic!("expected no registrants, got {other}"),
            Ok(_) => panic!("expected no registrants"),
        }
    }
}
