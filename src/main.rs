//! Command-line front end: runs a full range of chain lengths on worker
//! threads and prints the quantiles.
//!
//! ```text
//! radar_sim --chainMax 20 --sampleSize 30000 --pkmnWildrate 12.5 --unit hr
//! ```
//!
//! `--workers 0` runs every chain length serially on the main thread.
//! Log output is controlled with `RUST_LOG` (default `warn`).

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    cli::init_logging();
    if let Err(e) = cli::run(std::env::args().skip(1).collect()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    console_error_panic_hook::set_once();
    radar_sim::utils::init_logging();
}

#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::cell::Cell;
    use std::rc::Rc;

    use log::info;
    use radar_sim::native::NativeConductor;
    use radar_sim::protocol::ConductorEvent;
    use radar_sim::report::{ReportRow, TimeUnit};
    use radar_sim::utils::{detected_parallelism, validate_numeric_input, worker_count};
    use radar_sim::{ComputeEngine, RadarEngine, ResultRecord, Settings, SettingsKey};

    const USAGE: &str = "usage: radar_sim [--chainStart N] [--chainMax N] [--sampleSize N] \
        [--totalShinies N] [--pkmnWildrate PCT] [--timeForCatch S] [--timeForRun S] \
        [--timeForReroll S] [--workers N] [--seed N] [--unit min|hr|days] [--json]";

    /// Install the stderr logger; `RUST_LOG` overrides the default level.
    pub fn init_logging() {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .try_init();
    }

    struct Options {
        settings: Settings,
        workers: usize,
        seed: Option<u64>,
        unit: TimeUnit,
        json: bool,
    }

    fn parse(args: Vec<String>) -> Result<Options, String> {
        let mut opts = Options {
            settings: Settings::default(),
            workers: worker_count(detected_parallelism()),
            seed: None,
            unit: TimeUnit::default(),
            json: false,
        };

        let mut args = args.into_iter();
        while let Some(flag) = args.next() {
            let name = flag
                .strip_prefix("--")
                .ok_or_else(|| format!("unexpected argument '{}'\n{}", flag, USAGE))?;
            match name {
                "json" => {
                    opts.json = true;
                    continue;
                }
                "help" => return Err(USAGE.to_string()),
                _ => {}
            }

            let value = args
                .next()
                .ok_or_else(|| format!("missing value for {}", flag))?;
            match name {
                "workers" => opts.workers = validate_numeric_input(&value, Some(0), None, "Workers")?,
                "seed" => opts.seed = Some(validate_numeric_input(&value, None, None, "Seed")?),
                "unit" => opts.unit = value.parse()?,
                _ => {
                    let key: SettingsKey = name.parse()?;
                    let val = validate_numeric_input::<f64>(&value, Some(0.0), None, key.as_str())?;
                    opts.settings.set(key, val).map_err(|e| e.to_string())?;
                }
            }
        }

        Ok(opts)
    }

    /// Compute every chain length on the calling thread.
    fn run_serial<E: ComputeEngine>(
        engine: &E,
        settings: &Settings,
    ) -> Result<Vec<ResultRecord>, String> {
        let config = settings.engine_config().map_err(|e| e.to_string())?;
        let raw = engine.run_range(&config).map_err(|e| e.to_string())?;
        ResultRecord::batch_from_raw(&raw, config.chain_start).map_err(|e| e.to_string())
    }

    fn run_threaded(
        engine: RadarEngine,
        settings: &Settings,
        workers: usize,
    ) -> Result<Vec<ResultRecord>, String> {
        let finished = Rc::new(Cell::new(0usize));
        let listener = {
            let finished = finished.clone();
            Box::new(move |event: ConductorEvent| match event {
                ConductorEvent::FinishedChain { data } => {
                    finished.set(finished.get() + 1);
                    eprintln!("chain {} done ({} finished)", data.chain_len, finished.get());
                }
                ConductorEvent::ChainFailed { chain_len, reason } => {
                    eprintln!("chain {} failed: {}", chain_len, reason);
                }
                ConductorEvent::RunComplete { elapsed_secs, .. } => {
                    eprintln!("Simulation completed in {:.2} seconds", elapsed_secs);
                }
                _ => {}
            })
        };

        let mut conductor =
            NativeConductor::new(engine, workers, listener).map_err(|e| e.to_string())?;
        for key in SettingsKey::ALL {
            conductor.orchestrator_mut().set(key.as_str(), settings.get(key));
        }
        conductor.run_blocking().map_err(|e| e.to_string())?;

        Ok(conductor.orchestrator().results().iter().copied().collect())
    }

    pub fn run(args: Vec<String>) -> Result<(), String> {
        let opts = parse(args)?;
        let engine = match opts.seed {
            Some(seed) => RadarEngine::seeded(seed),
            None => RadarEngine::new(),
        };

        let settings = &opts.settings;
        eprintln!(
            "starting run of {} iterations up to chain of {} @ {:.1}% encounter rate for {} shin{} on {} workers",
            settings.sample_size,
            settings.chain_max,
            settings.pkmn_wildrate,
            settings.total_shinies,
            if settings.total_shinies > 1 { "ies" } else { "y" },
            opts.workers,
        );

        let records = if opts.workers == 0 {
            info!("running serially");
            run_serial(&engine, settings)?
        } else {
            run_threaded(engine, settings, opts.workers)?
        };

        let rows: Vec<ReportRow> = records
            .iter()
            .map(|record| ReportRow::new(record, opts.unit))
            .collect();

        if opts.json {
            let out = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
            println!("{}", out);
        } else {
            let u = opts.unit.short();
            println!("chain\tmedian ({u})\t|q09---[q25 to q75]---q91|\tiqr");
            for row in &rows {
                println!(
                    "{}\t{:.2}\t|{:.2}---[{:.2} to {:.2}]---{:.2}|\t{:.2}",
                    row.chain_len, row.median, row.q09, row.q25, row.q75, row.q91, row.iqr
                );
            }
        }

        Ok(())
    }

}
