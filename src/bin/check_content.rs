use content_migrate::{validate::source_counts, validate, Config};
use structopt::StructOpt;

/// Compare the ContentItem table against the source tables without migrating anything.
#[derive(Debug, StructOpt)]
struct Opt {
    /// Print the report as json
    #[structopt(long)]
    json: bool,
}

fn main() -> Result<(), anyhow::Error> {
    content_migrate::init_logging();
    let opt = Opt::from_args();

    let config = Config::load()?;
    let conn = config.open_database_read_only()?;
    let expected = source_counts(&conn)?;
    let report = validate(&conn, &expected)?;

    if opt.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if !report.is_ok() {
        anyhow::bail!("ContentItem does not match the source tables");
    }
    Ok(())
}
