use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use gmmkctl::config::Config;
use gmmkctl::device::Device;
use gmmkctl::protocol::Direction;
use gmmkctl::source::read_key_colors;
use gmmkctl::transaction::{DryRun, Transport};
use gmmkctl::{KeyColorRequest, Keyboard, Rgb, Setting};

#[derive(Parser)]
#[command(name = "gmmkctl")]
#[command(about = "Control the RGB lighting of a GMMK keyboard", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(flatten)]
    Action(Action),

    /// Print the frames an action would send, without opening the device
    Dump {
        #[command(subcommand)]
        action: Action,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand, Clone)]
enum Action {
    /// Set the mode (1-20)
    #[command(short_flag = 'm', long_flag = "mode")]
    Mode { mode: u8 },

    /// Set the brightness (0-4)
    #[command(short_flag = 'b', long_flag = "brightness")]
    Brightness { brightness: u8 },

    /// Set the delay between animation frames (0-255, smaller is faster)
    #[command(short_flag = 'd', long_flag = "delay")]
    Delay { delay: u8 },

    /// Animate towards the left
    #[command(short_flag = 'l', long_flag = "left")]
    Left,

    /// Animate towards the right
    #[command(short_flag = 'r', long_flag = "right")]
    Right,

    /// Turn on colorful mode
    #[command(short_flag = 'f', long_flag = "colorful")]
    Colorful,

    /// Turn on single color (not colorful) mode
    #[command(short_flag = 's', long_flag = "single")]
    Single,

    /// Set the polling rate: 0=125Hz, 1=250Hz, 2=500Hz, 3=1000Hz
    #[command(short_flag = 'z', long_flag = "rate")]
    Rate { rate: u8 },

    /// Set the color for single color mode
    #[command(short_flag = 'c', long_flag = "color")]
    Color { r: u8, g: u8, b: u8 },

    /// Set individual key colors from FILE ("-" for stdin)
    #[command(short_flag = 'k', long_flag = "keys")]
    Keys { file: PathBuf },
}

/// Work for one transaction, resolved before the device is opened
enum Job {
    Setting(Setting),
    Keys(KeyColorRequest),
}

impl Action {
    fn resolve(self) -> Result<Job> {
        let setting = match self {
            Action::Mode { mode } => Setting::Mode(mode),
            Action::Brightness { brightness } => Setting::Brightness(brightness),
            Action::Delay { delay } => Setting::Delay(delay),
            Action::Left => Setting::Direction(Direction::Left),
            Action::Right => Setting::Direction(Direction::Right),
            Action::Colorful => Setting::Colorful(true),
            Action::Single => Setting::Colorful(false),
            Action::Rate { rate } => Setting::Rate(rate),
            Action::Color { r, g, b } => Setting::Color(Rgb::new(r, g, b)),
            Action::Keys { file } => return Ok(Job::Keys(read_key_colors(&file)?)),
        };
        Ok(Job::Setting(setting))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Command::Action(action) => {
            let job = action.resolve()?;
            let device = Device::open(&config)?;
            run_job(Keyboard::new(device, config.timeout()), &job)?;
        }
        Command::Dump { action } => {
            let job = action.resolve()?;
            let mut dry = DryRun::new();
            run_job(Keyboard::new(&mut dry, config.timeout()), &job)?;
            for frame in dry.frames() {
                println!("{}", frame.to_hex());
            }
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Run one transaction; the keyboard (and its device) is released on return
fn run_job<T: Transport>(mut keyboard: Keyboard<T>, job: &Job) -> Result<()> {
    match job {
        Job::Setting(setting) => keyboard.apply(*setting)?,
        Job::Keys(request) => keyboard.set_keys(request)?,
    }
    Ok(())
}
