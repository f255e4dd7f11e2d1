use clap::Parser;

use demos::solve_rate::{fields, solve_rate};
use demos::{timer_ticks::timer_ticks, uart_echo::uart_echo};
use periphcore::{Family, Rate};

use log::Level;

#[derive(Clone, Copy, clap::ValueEnum, Debug)]
enum FamilyArg {
    Ccp,
    Spi,
    Uart,
    Qei,
    Timer,
    Oc,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Ccp => Family::Ccp,
            FamilyArg::Spi => Family::Spi,
            FamilyArg::Uart => Family::Uart,
            FamilyArg::Qei => Family::Qei,
            FamilyArg::Timer => Family::Timer,
            FamilyArg::Oc => Family::Oc,
        }
    }
}

#[derive(Clone, clap::Subcommand, Debug)]
enum Mode {
    /// Solve the clock dividers for a rate
    Solve(SolveConfig),
    /// Echo text through a looped back UART
    UartEcho {
        #[arg(short, long, default_value = "hello")]
        text: String,
        #[arg(short, long, default_value_t = 115_200)]
        baud: u32,
    },
    /// Run a timer for a number of periods
    Timer {
        #[arg(long, default_value_t = 1_000)]
        period_us: u32,
        #[arg(short = 'k', long, default_value_t = 10)]
        ticks: usize,
    },
}

#[derive(Parser, Clone, Debug)]
struct SolveConfig {
    #[arg(short, long, value_enum)]
    family: FamilyArg,

    /// frequency in Hz
    #[arg(short, long, conflicts_with_all = ["period_us", "period_ms"])]
    rate: Option<u32>,

    #[arg(long, conflicts_with = "period_ms")]
    period_us: Option<u32>,

    #[arg(long)]
    period_ms: Option<u32>,
}

impl SolveConfig {
    fn rate(&self) -> Option<Rate> {
        match (self.rate, self.period_us, self.period_ms) {
            (Some(hz), _, _) => Some(Rate::Hertz(hz)),
            (_, Some(us), _) => Some(Rate::PeriodUs(us)),
            (_, _, Some(ms)) => Some(Rate::PeriodMs(ms)),
            _ => None,
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    /// Peripheral clock in Hz
    #[arg(short, long, global = true, default_value_t = 16_000_000)]
    clock: u32,
}

#[derive(Debug)]
enum LocalErrors {
    Periph(periphcore::Error),
    MissingRate,
}

impl From<periphcore::Error> for LocalErrors {
    fn from(err: periphcore::Error) -> Self {
        LocalErrors::Periph(err)
    }
}

fn main() -> Result<(), LocalErrors> {
    let cli = Cli::parse();

    let log_level = match cli.debug {
        1 => Level::Info,
        2 => Level::Debug,
        3 => Level::Trace,
        _ => Level::Warn,
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.to_string()),
    )
    .init();
    log::info!("Starting peripheral simulation");

    match cli.mode {
        Mode::Solve(config) => {
            let rate = config.rate().ok_or(LocalErrors::MissingRate)?;
            let family = config.family.into();
            let d = solve_rate(family, cli.clock, rate)?;
            println!(
                "{}x{} -> {} Hz ({} us)",
                d.primary,
                d.secondary,
                d.effective_hz,
                d.period_us()
            );
            if let Some(fields) = fields(family, &d) {
                println!("{}", fields);
            }
        }
        Mode::UartEcho { text, baud } => {
            let mut out = vec![0u8; text.len()];
            let n = uart_echo(cli.clock, baud, text.as_bytes(), &mut out)?;
            println!("{}", String::from_utf8_lossy(&out[..n]));
        }
        Mode::Timer { period_us, ticks } => {
            let (count, achieved) = timer_ticks(cli.clock, period_us, ticks)?;
            println!("callback ran {} times, period {} us", count, achieved);
        }
    }
    Ok(())
}
