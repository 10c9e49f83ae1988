use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use covid_stats::config::{Settings, StoreTarget};
use covid_stats::dates::parse_day;
use covid_stats::format::{
    day_label, fmt_count, fmt_equation, fmt_opt_count, fmt_percent, fmt_rounded, map_locale,
};
use covid_stats::query::{
    CountriesView, CycleView, Dashboard, HistoryView, QueryContext, QueryTicket, RegionsView,
    ViewState, load_countries, load_cycle, load_history, load_regions, within,
};
use covid_stats::series::{ForwardHandle, Forwarder};
use covid_stats::stats::{Summary, grouped_summary};
use covid_stats::{Client, Day, RegionId, storage};
use num_format::Locale;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[command(
    name = "covid-stats",
    version,
    about = "Fetch, persist & analyze pandemic case/death statistics"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Base URL of the reporting API.
    #[arg(long, env = "COVID_API_BASE", default_value = covid_stats::api::DEFAULT_BASE_URL, global = true)]
    api_base: String,
    /// Base URL of the persistence service (POST /api/save, GET /api/data/{iso}).
    #[arg(long, env = "COVID_STORE_URL", global = true, conflicts_with = "store_file")]
    store_url: Option<String>,
    /// Append fetched history to a local JSON-lines file instead.
    #[arg(long, env = "COVID_STORE_FILE", global = true)]
    store_file: Option<PathBuf>,
    /// Number formatting locale (en, de, fr, es, it, pt, nl).
    #[arg(long, default_value = "en", global = true)]
    locale: String,
    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30, global = true)]
    timeout_secs: u64,
    /// Earliest day a history range may start on (YYYY-MM-DD).
    #[arg(long, default_value = "2020-01-22", global = true)]
    min_day: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Current totals per subdivision of a country, with top lists and statistics.
    Regions(RegionArgs),
    /// Daily history of a country with trend lines (and optionally export it).
    History(HistoryArgs),
    /// Current totals of every country.
    Countries,
    /// Countries ranked by death-to-confirmed ratio.
    Ratios(RatioArgs),
    /// Records previously persisted for a country.
    Stored(StoredArgs),
    /// Interactive dashboard: `iso XXX`, `range START END`, `quit` on stdin.
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct RegionArgs {
    /// Country code (e.g., USA)
    #[arg(short, long, default_value = "USA")]
    iso: String,
    /// Length of the top lists.
    #[arg(long, default_value_t = 10)]
    top: usize,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutFormat {
    Csv,
    Json,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    /// Country code (e.g., USA)
    #[arg(short, long, default_value = "USA")]
    iso: String,
    /// First day (YYYY-MM-DD); clamped to --min-day.
    #[arg(short, long, default_value = "2020-01-22")]
    start: String,
    /// Last day (YYYY-MM-DD), inclusive.
    #[arg(short, long, default_value = "2020-02-01")]
    end: String,
    /// Save the indexed series to file (format inferred by --format or extension).
    #[arg(long)]
    out: Option<PathBuf>,
    /// Output format (csv or json). If omitted, inferred from --out extension.
    #[arg(long, value_enum)]
    format: Option<OutFormat>,
}

#[derive(Args, Debug)]
struct RatioArgs {
    #[arg(long, default_value_t = 20)]
    top: usize,
}

#[derive(Args, Debug)]
struct StoredArgs {
    /// Country code (e.g., USA)
    #[arg(short, long, default_value = "USA")]
    iso: String,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[arg(short, long, default_value = "USA")]
    iso: String,
    #[arg(short, long, default_value = "2020-01-22")]
    start: String,
    #[arg(short, long, default_value = "2020-02-01")]
    end: String,
    #[arg(long, default_value_t = 10)]
    top: usize,
}

fn settings_from(g: &GlobalArgs) -> Result<Settings> {
    let store = match (&g.store_url, &g.store_file) {
        (Some(url), _) => StoreTarget::Http(url.clone()),
        (None, Some(path)) => StoreTarget::File(path.clone()),
        (None, None) => StoreTarget::None,
    };
    Ok(Settings {
        api_base: g.api_base.clone(),
        store,
        locale: g.locale.clone(),
        timeout: Duration::from_secs(g.timeout_secs),
        min_day: parse_day(&g.min_day).context("invalid --min-day")?,
        ..Settings::default()
    })
}

fn parse_region(s: &str) -> Result<RegionId> {
    s.parse().with_context(|| format!("invalid --iso {s:?}"))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = settings_from(&cli.global)?;
    match cli.cmd {
        Command::Regions(args) => cmd_regions(&settings, args).await,
        Command::History(args) => cmd_history(&settings, args).await,
        Command::Countries => cmd_countries(&settings, None).await,
        Command::Ratios(args) => cmd_countries(&settings, Some(args.top)).await,
        Command::Stored(args) => cmd_stored(&settings, args).await,
        Command::Watch(args) => cmd_watch(&settings, args).await,
    }
}

async fn cmd_regions(settings: &Settings, args: RegionArgs) -> Result<()> {
    let region = parse_region(&args.iso)?;
    let client = settings.client();
    let view = within(
        settings.cycle_timeout,
        "regions",
        load_regions(&client, &region, args.top),
    )
    .await?;
    print_regions(&view, map_locale(&settings.locale));
    Ok(())
}

async fn cmd_history(settings: &Settings, args: HistoryArgs) -> Result<()> {
    let context = QueryContext {
        min_day: settings.min_day,
        ..QueryContext::new(
            parse_region(&args.iso)?,
            parse_day(&args.start)?,
            parse_day(&args.end)?,
        )
    };
    let client = settings.client();
    let forwarder = settings.gateway().map(Forwarder::spawn);
    let handle = forwarder.as_ref().map(Forwarder::handle);

    let loaded = within(
        settings.cycle_timeout,
        "history",
        load_history(&client, &context, handle.as_ref()),
    )
    .await;
    drop(handle);

    // Drain pending saves even if the series failed, then surface the error.
    if let Some(f) = forwarder {
        let report = f.finish().await;
        if report.saved + report.failed > 0 {
            eprintln!(
                "Forwarded {} point(s) to store ({} failed)",
                report.saved, report.failed
            );
        }
    }
    let view = loaded?;

    print_history(&view, map_locale(&settings.locale));

    if let Some(path) = args.out.as_ref() {
        let fmt = match args.format {
            Some(OutFormat::Csv) => "csv",
            Some(OutFormat::Json) => "json",
            None => path.extension().and_then(|e| e.to_str()).unwrap_or("csv"),
        }
        .to_ascii_lowercase();
        match fmt.as_str() {
            "csv" => storage::save_csv(&context.region, &view.series, path)?,
            "json" => storage::save_json(&view.series, path)?,
            other => anyhow::bail!("unsupported format: {}", other),
        }
        eprintln!(
            "Saved {} rows to {}",
            view.series.points.len(),
            path.display()
        );
    }
    Ok(())
}

async fn cmd_countries(settings: &Settings, ratio_top: Option<usize>) -> Result<()> {
    let client = settings.client();
    let view = within(
        settings.cycle_timeout,
        "countries",
        load_countries(&client, ratio_top.unwrap_or(20)),
    )
    .await?;
    let locale = map_locale(&settings.locale);
    match ratio_top {
        Some(_) => print_ratios(&view, locale),
        None => print_countries(&view, locale),
    }
    Ok(())
}

async fn cmd_stored(settings: &Settings, args: StoredArgs) -> Result<()> {
    let region = parse_region(&args.iso)?;
    let gateway = settings
        .gateway()
        .context("no store configured; pass --store-url or --store-file")?;
    let mut records = gateway.retrieve(&region).await?;
    records.sort_by_key(|r| r.date);

    let locale = map_locale(&settings.locale);
    println!("{:<12} {:>14} {:>12}", "Date", "Confirmed", "Deaths");
    for r in &records {
        println!(
            "{:<12} {:>14} {:>12}",
            r.date.to_string(),
            fmt_opt_count(r.confirmed, locale),
            fmt_opt_count(r.deaths, locale)
        );
    }
    for s in grouped_summary(&records) {
        println!();
        println!("{} - {} stored day(s)", s.region, s.days);
        print_summary_pair(&s.confirmed, &s.deaths, locale);
    }
    Ok(())
}

enum WatchCommand {
    Iso(RegionId),
    Range(Day, Day),
    Quit,
}

fn parse_watch_command(line: &str) -> Result<Option<WatchCommand>> {
    let mut parts = line.split_whitespace();
    let cmd = match parts.next() {
        None => return Ok(None),
        Some(c) => c.to_ascii_lowercase(),
    };
    let cmd = match cmd.as_str() {
        "iso" => {
            let code = parts.next().context("usage: iso XXX")?;
            WatchCommand::Iso(parse_region(code)?)
        }
        "range" => {
            let start = parts.next().context("usage: range START END")?;
            let end = parts.next().context("usage: range START END")?;
            WatchCommand::Range(parse_day(start)?, parse_day(end)?)
        }
        "quit" | "exit" | "q" => WatchCommand::Quit,
        other => anyhow::bail!("unknown command {other:?} (iso, range, quit)"),
    };
    Ok(Some(cmd))
}

type Completion = (QueryTicket, covid_stats::Result<CycleView>);

fn start_cycle(
    client: &Arc<Client>,
    ticket: QueryTicket,
    top: usize,
    limit: Option<Duration>,
    forward: Option<ForwardHandle>,
    done: &mpsc::UnboundedSender<Completion>,
) -> JoinHandle<()> {
    let client = Arc::clone(client);
    let done = done.clone();
    tokio::spawn(async move {
        let outcome = within(
            limit,
            "query cycle",
            load_cycle(client.as_ref(), &ticket.context, top, forward.as_ref()),
        )
        .await;
        let _ = done.send((ticket, outcome));
    })
}

async fn cmd_watch(settings: &Settings, args: WatchArgs) -> Result<()> {
    let client = Arc::new(settings.client());
    let forwarder = settings.gateway().map(Forwarder::spawn);
    let locale = map_locale(&settings.locale);
    let mut context = QueryContext {
        min_day: settings.min_day,
        ..QueryContext::new(
            parse_region(&args.iso)?,
            parse_day(&args.start)?,
            parse_day(&args.end)?,
        )
    };

    let mut dashboard = Dashboard::new();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let ticket = dashboard.begin(context.clone());
    let mut in_flight = Some(start_cycle(
        &client,
        ticket,
        args.top,
        settings.cycle_timeout,
        forwarder.as_ref().map(Forwarder::handle),
        &done_tx,
    ));
    eprintln!("Loading {} ...", context.region);

    let mut quit = false;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let cmd = match parse_watch_command(&line) {
                    Ok(Some(cmd)) => cmd,
                    Ok(None) => continue,
                    Err(e) => {
                        eprintln!("{e:#}");
                        continue;
                    }
                };
                match cmd {
                    WatchCommand::Quit => {
                        quit = true;
                        break;
                    }
                    WatchCommand::Iso(region) => context.region = region,
                    WatchCommand::Range(start, end) => {
                        context.start = start;
                        context.end = end;
                    }
                }
                if let Some(prev) = in_flight.take() {
                    prev.abort();
                }
                let ticket = dashboard.begin(context.clone());
                in_flight = Some(start_cycle(
                    &client,
                    ticket,
                    args.top,
                    settings.cycle_timeout,
                    forwarder.as_ref().map(Forwarder::handle),
                    &done_tx,
                ));
                eprintln!("Loading {} {}..{} ...", context.region, context.start, context.end);
            }
            Some((ticket, outcome)) = done_rx.recv() => {
                if dashboard.complete(&ticket, outcome) {
                    in_flight = None;
                    render_state(dashboard.state(), locale);
                }
            }
        }
    }

    if quit {
        if let Some(prev) = in_flight.take() {
            prev.abort();
        }
    } else if in_flight.is_some() {
        // Input closed: show the cycle already under way before leaving.
        drop(done_tx);
        while let Some((ticket, outcome)) = done_rx.recv().await {
            if dashboard.complete(&ticket, outcome) {
                render_state(dashboard.state(), locale);
                break;
            }
        }
    }
    if let Some(f) = forwarder {
        let report = f.finish().await;
        eprintln!(
            "Forwarded {} point(s) to store ({} failed)",
            report.saved, report.failed
        );
    }
    Ok(())
}

fn render_state(state: &ViewState, locale: &Locale) {
    match state {
        ViewState::Idle => {}
        ViewState::Loading { .. } => println!("Loading historical data, please wait..."),
        ViewState::Ready { view, .. } => {
            print_regions(&view.regions, locale);
            println!();
            print_history(&view.history, locale);
        }
        ViewState::Unavailable { reason, .. } => println!("Data unavailable: {reason}"),
    }
}

fn print_summary_pair(confirmed: &Summary, deaths: &Summary, locale: &Locale) {
    println!("{:<20} {:>16} {:>16}", "", "Confirmed", "Deaths");
    let rows: [(&str, fn(&Summary) -> Option<f64>); 4] = [
        ("Average", |s: &Summary| s.average),
        ("Max", |s: &Summary| s.max),
        ("Min", |s: &Summary| s.min),
        ("Standard Deviation", |s: &Summary| s.std_dev),
    ];
    for (label, get) in rows {
        println!(
            "{:<20} {:>16} {:>16}",
            label,
            fmt_rounded(get(confirmed), locale),
            fmt_rounded(get(deaths), locale)
        );
    }
}

fn print_regions(view: &RegionsView, locale: &Locale) {
    println!("Current by subdivision - {}", view.region);
    println!("{:<32} {:>14} {:>12}", "Region", "Confirmed", "Deaths");
    for s in &view.snapshots {
        println!(
            "{:<32} {:>14} {:>12}",
            s.label(),
            fmt_count(s.confirmed, locale),
            fmt_count(s.deaths, locale)
        );
    }

    println!();
    println!("Top {} by confirmed cases", view.top_confirmed.len());
    for (i, s) in view.top_confirmed.iter().enumerate() {
        println!("{:>3}. {}: {}", i + 1, s.label(), fmt_count(s.confirmed, locale));
    }
    println!("Top {} by deaths", view.top_deaths.len());
    for (i, s) in view.top_deaths.iter().enumerate() {
        println!("{:>3}. {}: {}", i + 1, s.label(), fmt_count(s.deaths, locale));
    }

    println!();
    println!("Descriptive statistics");
    print_summary_pair(&view.confirmed, &view.deaths, locale);
}

fn print_history(view: &HistoryView, locale: &Locale) {
    let series = &view.series;
    println!(
        "History - {} - {} day(s)",
        view.context.region,
        series.points.len()
    );
    println!(
        "{:<8} {:>12} {:>12} {:>16} {:>14}",
        "Day", "Confirmed", "Deaths", "Confirmed trend", "Deaths trend"
    );
    for p in &series.points {
        println!(
            "{:<8} {:>12} {:>12} {:>16} {:>14}",
            day_label(p.day),
            fmt_opt_count(p.confirmed, locale),
            fmt_opt_count(p.deaths, locale),
            fmt_rounded(p.confirmed_trend, locale),
            fmt_rounded(p.deaths_trend, locale)
        );
    }
    println!();
    println!("Confirmed Trend: {}", fmt_equation(series.confirmed_trend.as_ref()));
    println!("Deaths Trend: {}", fmt_equation(series.deaths_trend.as_ref()));
    println!();
    print_summary_pair(&view.confirmed, &view.deaths, locale);
}

fn print_countries(view: &CountriesView, locale: &Locale) {
    println!(
        "{:<32} {:<6} {:>14} {:>12} {:>14}",
        "Country", "ISO", "Confirmed", "Deaths", "Active"
    );
    for c in &view.countries {
        println!(
            "{:<32} {:<6} {:>14} {:>12} {:>14}",
            c.name,
            c.region.as_str(),
            fmt_count(c.confirmed, locale),
            fmt_count(c.deaths, locale),
            fmt_opt_count(c.active, locale)
        );
    }
}

fn print_ratios(view: &CountriesView, locale: &Locale) {
    println!(
        "{:<32} {:<6} {:>14} {:>12} {:>12}",
        "Country", "ISO", "Confirmed", "Deaths", "Death Ratio"
    );
    for r in &view.by_ratio {
        let c = &r.snapshot;
        println!(
            "{:<32} {:<6} {:>14} {:>12} {:>12}",
            c.name,
            c.region.as_str(),
            fmt_count(c.confirmed, locale),
            fmt_count(c.deaths, locale),
            fmt_percent(r.ratio)
        );
    }
}
