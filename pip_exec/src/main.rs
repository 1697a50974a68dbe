//! Main PipBot executable entry point.
//!
//! # Usage
//!
//! ```text
//! pip_exec [--device <path>] [--baud <rate>] [--tip-start <n>] <SUBCOMMAND>
//!
//!     home                                    home and strip any tip left on the head
//!     run <recipe.json>                       run every transfer in a recipe
//!     transfer <source> <dest> <volume>       run a single transfer
//! ```
//!
//! Parameters are loaded from `$PIPBOT_SW_ROOT/params/pip_exec.toml`, and the deck layout from
//! the layout file it names.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use comms_if::tc::transfer::{Recipe, TransferRequest, TransferResponse};
use pip_lib::{
    delay::ThreadDelay,
    layout::LayoutParams,
    params::PipExecParams,
    transfer::{Bot, RunReport},
    transport::{Transport, TransportOptions},
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(name = "pip_exec", about = "Drive the PipBot liquid handling robot")]
struct Opts {
    /// Serial device of the controller, overrides the parameter file.
    #[structopt(long)]
    device: Option<String>,

    /// Baud rate of the serial link, overrides the parameter file.
    #[structopt(long)]
    baud: Option<u32>,

    /// Number of tips already used from the tip rack, overrides the parameter file.
    #[structopt(long)]
    tip_start: Option<usize>,

    /// Log every line sent to and received from the controller.
    #[structopt(short, long)]
    verbose: bool,

    #[structopt(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, StructOpt)]
enum Cmd {
    /// Home the gantry, then strip any tip left on the head.
    #[structopt(name = "home")]
    Home,

    /// Run every transfer in a recipe file.
    #[structopt(name = "run")]
    Run {
        /// Path to the recipe JSON file.
        #[structopt(parse(from_os_str))]
        recipe: PathBuf,
    },

    /// Run a single transfer.
    #[structopt(name = "transfer")]
    Transfer(TransferRequest),
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("pip_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    let link_level = match opts.verbose {
        true => LevelFilter::Trace,
        false => LevelFilter::Info,
    };
    logger_init(LevelFilter::Trace, link_level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("PipBot Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: PipExecParams =
        util::params::load("pip_exec.toml").wrap_err("Could not load exec params")?;

    if let Some(device) = opts.device {
        params.device = device;
    }
    if let Some(baud) = opts.baud {
        params.baud = baud;
    }
    if let Some(tip_start) = opts.tip_start {
        params.tip_start = tip_start;
    }

    let layout_params: LayoutParams = util::params::load(&params.layout_file)
        .wrap_err_with(|| format!("Could not load the layout from {}", params.layout_file))?;
    let layout = layout_params.build();

    info!("Parameters loaded, layout has {} matrices", layout.len());

    // ---- OPEN THE BOT ----

    let transport = Transport::open_serial(&params.device, params.baud, TransportOptions::default())
        .wrap_err("Failed to open the serial link")?;
    info!("Connected to {} at {} baud", params.device, params.baud);

    let mut bot = Bot::new(transport, layout, &params, ThreadDelay);

    match Archiver::from_path(&session, "motion.csv") {
        Ok(a) => bot.set_motion_archiver(a),
        Err(e) => warn!("Moves will not be archived: {}", e),
    }

    // ---- EXECUTE ----

    let result = execute(&mut bot, opts.cmd, params.tip_start, &session);

    bot.close();
    session.exit();

    result
}

/// Run the requested command on the bot.
fn execute(
    bot: &mut Bot<ThreadDelay>,
    cmd: Cmd,
    tip_start: usize,
    session: &Session,
) -> Result<(), Report> {
    let requests = match cmd {
        Cmd::Home => {
            info!("Homing");
            return bot.home_and_park().wrap_err("Homing failed");
        }
        Cmd::Run { recipe } => {
            let recipe = Recipe::load(&recipe)
                .wrap_err_with(|| format!("Could not load recipe {:?}", recipe))?;
            info!(
                "Loaded recipe {:?} with {} transfers",
                recipe.name,
                recipe.transfers.len()
            );
            recipe.transfers
        }
        Cmd::Transfer(req) => vec![req],
    };

    bot.init(tip_start).wrap_err("Failed to initialise the bot")?;

    let report = bot.run(&requests);
    print_report(&requests, &report);
    session.save("run_report.json", report.clone());

    match report.fatal_error {
        Some(e) => Err(eyre!(
            "Run stopped after {} of {} transfers: {}",
            report.responses.len(),
            requests.len(),
            e
        )),
        None => Ok(()),
    }
}

fn print_report(requests: &[TransferRequest], report: &RunReport) {
    for (req, response) in requests.iter().zip(report.responses.iter()) {
        match response {
            TransferResponse::Done => println!("done      {}", req),
            TransferResponse::Rejected { reason } => println!("rejected  {}: {}", req, reason),
        }
    }

    println!(
        "{} done, {} rejected, {} not run, next tip {}",
        report.num_done(),
        report.num_rejected(),
        requests.len() - report.responses.len(),
        report.tip_cursor
    );
}
