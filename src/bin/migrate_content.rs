use content_migrate::{run, validate, BackupOutcome, Config, MigrationOptions};
use structopt::StructOpt;

/// Migrate experiences, travels, services and blog posts into the unified ContentItem table.
///
/// The database is named by `DATABASE_URL`. `BACKUP_DIR`, `SQLITE3_PATH` and `ON_CONFLICT`
/// (`fail` or `upsert`) are optional, as is a TOML file of the same settings named by
/// `CONTENT_MIGRATE_CONFIG`.
#[derive(Debug, StructOpt)]
struct Opt {
    /// Run the whole migration, then roll it back and report what would have been migrated
    #[structopt(long)]
    dry_run: bool,
}

fn main() -> Result<(), anyhow::Error> {
    content_migrate::init_logging();
    let opt = Opt::from_args();

    let config = Config::load()?;
    let mut conn = config.open_database()?;
    let options = MigrationOptions {
        dry_run: opt.dry_run,
        on_conflict: config.on_conflict,
    };
    log::info!(
        "starting {} migration of {} (on conflict: {:?})",
        if options.dry_run { "dry-run" } else { "live" },
        config.database_path().display(),
        options.on_conflict,
    );

    let report = run(&mut conn, &options, Some(&config.backup()))?;
    if report.backup == Some(BackupOutcome::Failed) {
        eprintln!("WARNING: no backup of the source tables could be written");
    }
    println!("{}", report);

    if options.dry_run {
        return Ok(());
    }

    match validate(&conn, &report.stats) {
        Ok(validation) => {
            println!("{}", validation);
            if !validation.is_ok() {
                eprintln!("!!! VALIDATION FAILED: the migration was committed, but the");
                eprintln!("!!! ContentItem table does not match the source tables.");
                eprintln!("!!! Inspect the report above and remediate by hand.");
            }
        }
        Err(err) => {
            log::error!("could not validate the migration: {}", err);
            eprintln!("!!! VALIDATION DID NOT RUN; the migration was committed");
        }
    }

    Ok(())
}
