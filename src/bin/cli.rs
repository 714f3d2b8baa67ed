#![cfg(not(tarpaulin_include))]

use csrd_archive::click_log::ClickLogger;
use csrd_archive::config::{Config, SHEET_EDIT_URL};
use csrd_archive::fetcher::{self, PublicIp};
use csrd_archive::graph;
use csrd_archive::state::{self, Action, ViewState};
use csrd_archive::table;
use csrd_archive::{HeatmapOutcome, ReportRecord, ScalingMode, Selection, downloader};

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const NOT_ANALYZED: &str = "We have not analyzed this company yet but will do so very soon!";

fn print_help() {
    println!("Commands:");
    println!("  q: Quit");
    println!("  table: Show the filtered reports");
    println!("  heatmap: Show topic references of the filtered reports");
    println!("  countries <a,b,...|all>: Filter by country");
    println!("  sectors <a,b,...|all>: Filter by sector");
    println!("  company <name|none>: Select one company");
    println!("  companies: List companies for the current countries and sectors");
    println!("  options: List countries and sectors");
    println!("  scale on|off: Scale references by statement length");
    println!("  mode within-firm|overall: Heatmap color scaling");
    println!("  open <n>: Open the n-th report of the table");
    println!("  export <path.csv|path.xlsx>: Save the filtered table");
    println!("  reset: Clear all filters");
    println!("  refresh: Fetch the sheet again");
    println!("  disable_output / enable_output: Toggle the table after each command");
}

fn parse_list(arg: &str) -> Selection {
    Selection::from_values(arg.split(','))
}

fn parse_switch(arg: &str) -> Option<bool> {
    match arg {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

async fn load(file: Option<&Path>, config: &Config, client: &reqwest::Client) -> Option<Vec<ReportRecord>> {
    let loaded = match file {
        Some(path) => fetcher::load_records_from_file(path),
        None => fetcher::load_records(client, &config.sheet_url).await,
    };
    match loaded {
        Ok(records) => Some(records),
        Err(e) => {
            log::error!("{}", e);
            eprintln!("🚨 Error encountered. Check Google Sheet for updates: {}", SHEET_EDIT_URL);
            None
        }
    }
}

fn export(path: &str, records: &[ReportRecord], view: &ViewState) -> Result<(), Box<dyn std::error::Error>> {
    let rows = state::derive(records, view).rows;
    if path.ends_with(".xlsx") {
        #[cfg(feature = "web")]
        {
            std::fs::write(path, downloader::to_xlsx(&rows)?)?;
            return Ok(());
        }
        #[cfg(not(feature = "web"))]
        return Err("Excel export requires the 'web' feature".into());
    }
    std::fs::write(path, downloader::to_csv(&rows)?)?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().collect();
    let file: Option<PathBuf> = match args.get(1).map(String::as_str) {
        Some("--file") => match args.get(2) {
            Some(path) => Some(PathBuf::from(path)),
            None => {
                eprintln!("Usage: {} [--file <export.csv>]", args[0]);
                return Ok(());
            }
        },
        Some(_) => {
            eprintln!("Usage: {} [--file <export.csv>]", args[0]);
            return Ok(());
        }
        None => None,
    };

    let config = Config::from_env()?;
    let client = fetcher::http_client(config.http_timeout)?;
    let ip = Arc::new(PublicIp::new(client.clone(), config.ip_url.clone()));
    let logger = ClickLogger::new(client.clone(), config.webhook_url.clone(), ip);

    let Some(mut records) = load(file.as_deref(), &config, &client).await else {
        return Ok(());
    };
    println!("{} CSRD reports so far", records.len());

    let mut view = ViewState::default();
    let mut status = String::from("ok");
    let mut show = true;
    let mut redraw = true;
    let mut start_time = Instant::now();

    loop {
        if show && redraw {
            let views = state::derive(&records, &view);
            print!("{}", table::render_text(&views.rows));
            println!("{} of {} reports", views.rows.len(), views.total);
        }
        redraw = false;

        print!("[{:.1}] ({}) > ", start_time.elapsed().as_secs_f64(), status);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();

        let (name, arg) = match command.split_once(' ') {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        let action = match name {
            "" => {
                status = String::from("invalid command");
                continue;
            }
            "q" => break,
            "help" => {
                print_help();
                continue;
            }
            "disable_output" => {
                show = false;
                status = String::from("ok");
                continue;
            }
            "enable_output" => {
                show = true;
                status = String::from("ok");
                continue;
            }
            "countries" => Action::SelectCountries(parse_list(arg)),
            "sectors" => Action::SelectSectors(parse_list(arg)),
            "company" => match arg {
                "" => {
                    status = String::from("missing company");
                    continue;
                }
                "none" => Action::SelectCompany(None),
                name => Action::SelectCompany(Some(name.to_string())),
            },
            "scale" => match parse_switch(arg) {
                Some(on) => Action::SetScaleByPages(on),
                None => {
                    status = String::from("expected on|off");
                    continue;
                }
            },
            "mode" => match arg.parse::<ScalingMode>() {
                Ok(mode) => Action::SetScaling(mode),
                Err(e) => {
                    status = e;
                    continue;
                }
            },
            "reset" => Action::Reset,
            "table" => {
                redraw = true;
                let views = state::derive(&records, &view);
                print!("{}", table::render_text(&views.rows));
                status = String::from("ok");
                continue;
            }
            "heatmap" => {
                match state::derive(&records, &view).heatmap {
                    HeatmapOutcome::Ready(heatmap) => {
                        println!("Scaling: {}", heatmap.mode);
                        print!("{}", graph::render_text(&heatmap));
                    }
                    HeatmapOutcome::NotYetAnalyzed => println!("🚨 {}", NOT_ANALYZED),
                }
                status = String::from("ok");
                continue;
            }
            "companies" => {
                for company in state::filter_options(&records, &view).companies {
                    println!("  {}", company);
                }
                status = String::from("ok");
                continue;
            }
            "options" => {
                let options = state::filter_options(&records, &view);
                println!("Countries: All, {}", options.countries.join(", "));
                println!("Sectors: All, {}", options.sectors.join(", "));
                status = String::from("ok");
                continue;
            }
            "open" => {
                let rows = state::derive(&records, &view).rows;
                match arg.parse::<usize>().ok().and_then(|n| n.checked_sub(1)).and_then(|i| rows.get(i)) {
                    Some(row) => {
                        let outcome = logger.record_click(&row.link, &row.company).await;
                        if let Some(warning) = &outcome.warning {
                            println!("⚠ {}", warning);
                        }
                        println!("Opening {}: {}", row.company, outcome.open);
                        status = String::from("ok");
                    }
                    None => status = String::from("invalid row"),
                }
                continue;
            }
            "export" => {
                status = match export(arg, &records, &view) {
                    Ok(()) => format!("saved {}", arg),
                    Err(e) => format!("export failed: {}", e),
                };
                continue;
            }
            "refresh" => {
                if let Some(fresh) = load(file.as_deref(), &config, &client).await {
                    records = fresh;
                    view.dispatch(Action::Reset, &records);
                    redraw = true;
                    status = String::from("ok");
                } else {
                    status = String::from("refresh failed");
                }
                continue;
            }
            _ => {
                status = String::from("invalid command");
                continue;
            }
        };

        view.dispatch(action, &records);
        status = String::from("ok");
        redraw = true;
    }

    Ok(())
}
