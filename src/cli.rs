use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::data::aggregate::{aggregate, GroupKey, ValueKey};
use crate::data::export::{self, Download};
use crate::data::loader::{parse_date, LoadSource};
use crate::report;
use crate::session::{Geography, Session};

/// Fallback dataset used when no file is given.
pub const DEFAULT_DATA_FILE: &str = "Sample - Superstore.xls";

#[derive(Parser, Debug)]
#[command(
    name = "superstore-dash",
    about = "Filter and summarise the Superstore sales dataset."
)]
pub struct Cli {
    /// Dataset to load (.csv, .txt, .xlsx, .xls, .json, .parquet)
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// Dataset used when --file is not given
    #[arg(
        long = "default-file",
        env = "SUPERSTORE_DEFAULT_FILE",
        default_value = DEFAULT_DATA_FILE,
        global = true
    )]
    pub default_file: PathBuf,

    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Start date, inclusive (default: earliest order date)
    #[arg(long, global = true, value_parser = parse_date_arg)]
    pub from: Option<NaiveDate>,

    /// End date, inclusive (default: latest order date)
    #[arg(long, global = true, value_parser = parse_date_arg)]
    pub to: Option<NaiveDate>,

    /// Keep only this region (repeatable)
    #[arg(long = "region", global = true)]
    pub regions: Vec<String>,

    /// Keep only this state (repeatable)
    #[arg(long = "state", global = true)]
    pub states: Vec<String>,

    /// Keep only this city (repeatable)
    #[arg(long = "city", global = true)]
    pub cities: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the earliest and latest order date.
    Bounds,
    /// List the region, state and city values available for filtering.
    Options,
    /// Print totals and the category, region, segment and monthly tables.
    Summary,
    /// Print Region / Category / Sub-Category sales.
    Hierarchy,
    /// Sum one value per group.
    Group {
        /// Column to group by
        #[arg(long, value_enum, default_value_t = GroupArg::Category)]
        by: GroupArg,
        /// Column to sum
        #[arg(long, value_enum, default_value_t = ValueArg::Sales)]
        value: ValueArg,
        /// Print CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
    /// Write Category.csv, Region.csv, FilteredData.csv and Data.csv.
    Export {
        /// Output directory
        #[arg(long = "out-dir", default_value = ".")]
        out_dir: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupArg {
    Category,
    SubCategory,
    Region,
    State,
    City,
    Segment,
}

impl From<GroupArg> for GroupKey {
    fn from(arg: GroupArg) -> Self {
        match arg {
            GroupArg::Category => GroupKey::Category,
            GroupArg::SubCategory => GroupKey::SubCategory,
            GroupArg::Region => GroupKey::Region,
            GroupArg::State => GroupKey::State,
            GroupArg::City => GroupKey::City,
            GroupArg::Segment => GroupKey::Segment,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueArg {
    Sales,
    Profit,
    Quantity,
}

impl From<ValueArg> for ValueKey {
    fn from(arg: ValueArg) -> Self {
        match arg {
            ValueArg::Sales => ValueKey::Sales,
            ValueArg::Profit => ValueKey::Profit,
            ValueArg::Quantity => ValueKey::Quantity,
        }
    }
}

fn parse_date_arg(raw: &str) -> std::result::Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("invalid date '{raw}' (expected YYYY-MM-DD)"))
}

/// An explicit `--file` is read as an upload; otherwise the fallback path.
pub fn source_for(cli: &Cli) -> Result<LoadSource> {
    match &cli.file {
        Some(path) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(LoadSource::Upload { name, bytes })
        }
        None => Ok(LoadSource::Path(cli.default_file.clone())),
    }
}

/// Apply command-line filters on top of the session's default criteria.
pub fn apply_filter_args(session: &mut Session, args: &FilterArgs) {
    let defaults = session.criteria();
    let start = args.from.unwrap_or(defaults.date_start);
    let end = args.to.unwrap_or(defaults.date_end);
    session.set_date_range(start, end);

    let selections = [
        (Geography::Region, &args.regions),
        (Geography::State, &args.states),
        (Geography::City, &args.cities),
    ];
    for (geography, values) in selections {
        for value in values {
            session.select(geography, value);
        }
    }
}

fn write_download(dir: &Path, download: &Download) -> Result<PathBuf> {
    let path = dir.join(&download.file_name);
    std::fs::write(&path, &download.data)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn run(cli: Cli) -> Result<()> {
    let source = source_for(&cli)?;
    let mut session = Session::new();
    session
        .load(&source)
        .with_context(|| format!("loading {}", source.name()))?;
    if let Some(msg) = &session.status_message {
        eprintln!("{msg}");
    }

    apply_filter_args(&mut session, &cli.filters);

    let Some(view) = session.view() else {
        bail!("No dataset loaded");
    };
    log::info!(
        "{} of {} records match the current filters",
        view.len(),
        view.dataset().len()
    );
    if view.is_empty() {
        eprintln!("No records match the current filters");
    }

    match cli.command {
        Commands::Bounds => match view.dataset().bounds() {
            Some((start, end)) => println!("{start} .. {end}"),
            None => println!("Dataset is empty"),
        },
        Commands::Options => {
            let ds = view.dataset();
            for (label, values) in [
                ("Region", ds.regions()),
                ("State", ds.states()),
                ("City", ds.cities()),
            ] {
                let joined: Vec<&str> = values.iter().map(String::as_str).collect();
                println!("{label}: {}", joined.join(", "));
            }
        }
        Commands::Summary => print!("{}", report::format_summary(&view)),
        Commands::Hierarchy => println!("{}", report::format_hierarchy(&view)),
        Commands::Group { by, value, csv } => {
            let result = aggregate(&view, by.into(), value.into());
            if csv {
                let download = export::aggregate_csv(&result, "Group.csv")?;
                print!("{}", String::from_utf8_lossy(&download.data));
            } else {
                println!("{}", report::format_aggregate(&result));
            }
        }
        Commands::Export { out_dir } => {
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            let downloads = [
                export::category_csv(&view)?,
                export::region_csv(&view)?,
                export::filtered_extract_csv(&view)?,
                export::dataset_csv(view.dataset())?,
            ];
            for download in &downloads {
                let path = write_download(&out_dir, download)?;
                println!("Wrote {} ({})", path.display(), download.mime);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::date;

    const CSV: &str = "Order Date,Region,State,City,Category,Sub-Category,Segment,Sales,Profit,Quantity\n\
                       2021-01-05,East,Ohio,Akron,Technology,Phones,Consumer,100,10,1\n\
                       2021-02-10,West,Oregon,Salem,Furniture,Chairs,Corporate,200,20,2\n\
                       2021-03-15,East,Ohio,Akron,Furniture,Tables,Consumer,300,-5,3\n";

    #[test]
    fn test_parse_filters() {
        let cli = Cli::try_parse_from([
            "superstore-dash",
            "summary",
            "--from",
            "2021-01-01",
            "--to",
            "2/28/2021",
            "--region",
            "East",
            "--region",
            "West",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Summary));
        assert_eq!(cli.filters.from, Some(date("2021-01-01")));
        assert_eq!(cli.filters.to, Some(date("2021-02-28")));
        assert_eq!(cli.filters.regions, vec!["East", "West"]);
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(Cli::try_parse_from(["superstore-dash", "bounds", "--from", "soon"]).is_err());
    }

    #[test]
    fn test_filter_args_keep_defaults() {
        let mut session = Session::new();
        session.set_dataset(crate::data::model::Dataset::from_records(vec![
            crate::data::model::tests::record("2021-01-05", "East", "Furniture", 1.0),
            crate::data::model::tests::record("2021-03-15", "West", "Furniture", 1.0),
        ]));
        let args = FilterArgs {
            to: Some(date("2021-02-28")),
            cities: vec!["East City".to_string(), "East City".to_string()],
            ..Default::default()
        };
        apply_filter_args(&mut session, &args);
        let criteria = session.criteria();
        assert_eq!(criteria.date_start, date("2021-01-05"));
        assert_eq!(criteria.date_end, date("2021-02-28"));
        assert_eq!(criteria.cities.len(), 1);
        assert!(criteria.regions.is_empty());
        assert_eq!(session.view().unwrap().indices(), &[0]);
    }

    #[test]
    fn test_parse_group_command() {
        let cli = Cli::try_parse_from([
            "superstore-dash",
            "group",
            "--by",
            "sub-category",
            "--value",
            "profit",
            "--csv",
        ])
        .unwrap();
        match cli.command {
            Commands::Group { by, value, csv } => {
                assert_eq!(GroupKey::from(by), GroupKey::SubCategory);
                assert_eq!(ValueKey::from(value), ValueKey::Profit);
                assert!(csv);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_source_prefers_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.csv");
        std::fs::write(&path, CSV).unwrap();

        let cli = Cli::try_parse_from([
            "superstore-dash",
            "--file",
            path.to_str().unwrap(),
            "bounds",
        ])
        .unwrap();
        match source_for(&cli).unwrap() {
            LoadSource::Upload { name, bytes } => {
                assert_eq!(name, "mine.csv");
                assert_eq!(bytes, CSV.as_bytes());
            }
            other => panic!("expected upload, got {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "superstore-dash",
            "--default-file",
            "fallback.xlsx",
            "bounds",
        ])
        .unwrap();
        assert!(matches!(source_for(&cli).unwrap(), LoadSource::Path(p) if p == Path::new("fallback.xlsx")));
    }

    #[test]
    fn test_export_writes_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.csv");
        std::fs::write(&data, CSV).unwrap();
        let out = dir.path().join("out");

        let cli = Cli::try_parse_from([
            "superstore-dash",
            "export",
            "--out-dir",
            out.to_str().unwrap(),
            "--file",
            data.to_str().unwrap(),
            "--region",
            "East",
        ])
        .unwrap();
        run(cli).unwrap();

        let category = std::fs::read_to_string(out.join("Category.csv")).unwrap();
        assert_eq!(category, "Category,Sales\nTechnology,100\nFurniture,300\n");
        let region = std::fs::read_to_string(out.join("Region.csv")).unwrap();
        assert_eq!(region, "Region,Sales\nEast,400\n");
        assert!(out.join("FilteredData.csv").exists());
        let full = std::fs::read_to_string(out.join("Data.csv")).unwrap();
        assert_eq!(full.lines().count(), 4);
    }

    #[test]
    fn test_run_fails_without_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "superstore-dash",
            "--default-file",
            dir.path().join("nope.csv").to_str().unwrap(),
            "summary",
        ])
        .unwrap();
        assert!(run(cli).is_err());
    }
}
