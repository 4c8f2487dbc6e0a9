use anyhow::{anyhow, Context as _, Result};
use clap::Parser as _;
use mynacard::{BasicInfo, Error, PcscTransport, Pin, Session};
use owo_colors::OwoColorize;
use pcsc::Context;
use std::io::{BufRead, Write};
use tap::TapFallible;
use tracing::{debug, error, trace, trace_span};
use zeroize::Zeroizing;

#[derive(clap::Parser, Debug)]
#[command(about = "Reads the basic four info off a My Number card")]
struct Args {
    /// Increase log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease log level.
    #[arg(short, long, action=clap::ArgAction::Count)]
    quiet: u8,

    /// Use a specific reader (from list-readers).
    #[arg(short, long)]
    reader: Option<String>,

    /// Command.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// List connected readers.
    ListReaders,

    /// Read name, address, birth date and gender. Needs the 4 digit profile PIN.
    BasicInfo {
        /// Profile PIN; prompted for if not given.
        #[arg(long, env = "MYNACARD_PIN", hide_env_values = true)]
        pin: Option<String>,
    },
}

impl Command {
    pub fn run(&self, args: &Args) -> Result<()> {
        match self {
            Self::ListReaders => self.list_readers(args),
            Self::BasicInfo { pin } => self.basic_info(args, pin.as_deref()),
        }
    }

    fn list_readers(&self, _args: &Args) -> Result<()> {
        let span = trace_span!("list_readers");
        let _enter = span.enter();

        let ctx = Context::establish(pcsc::Scope::User)?;
        let mut readers_buf = [0; 2048];
        for name in ctx.list_readers(&mut readers_buf)? {
            println!("{}", name.to_str()?);
        }
        Ok(())
    }

    fn basic_info(&self, args: &Args, pin: Option<&str>) -> Result<()> {
        let span = trace_span!("basic_info");
        let _enter = span.enter();

        let ctx = Context::establish(pcsc::Scope::User)?;
        let card = select_card(&ctx, &args.reader)?;
        let pin = match pin {
            Some(pin) => Pin::from_ascii(pin)?,
            None => prompt_pin()?,
        };

        let mut transport = PcscTransport::new(card);
        let info = Session::new(&mut transport)
            .read_basic_info(pin)
            .tap_err(|err| {
                if let Error::AuthenticationFailed { retries, .. } = err {
                    match retries {
                        Some(0) => eprintln!("{}", "The profile PIN is locked.".red()),
                        Some(n) => eprintln!("{} {} attempt(s) left.", "Wrong PIN.".red(), n),
                        None => eprintln!("{}", "Wrong PIN.".red()),
                    }
                }
            })
            .context("Couldn't read the basic four info")?;
        print_basic_info(&info);
        Ok(())
    }
}

fn print_basic_info(info: &BasicInfo) {
    println!("{:>10}  {}", "Name".bold(), info.name);
    println!("{:>10}  {}", "Address".bold(), info.address);
    match info.birth_date_ymd() {
        Some(date) => println!(
            "{:>10}  {} ({})",
            "Birth date".bold(),
            info.birth_date,
            date.format("%Y-%m-%d").dimmed()
        ),
        None => println!("{:>10}  {}", "Birth date".bold(), info.birth_date),
    }
    println!("{:>10}  {}", "Gender".bold(), info.gender);
}

fn prompt_pin() -> Result<Pin> {
    eprint!("Profile PIN: ");
    std::io::stderr().flush()?;

    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Couldn't read PIN from stdin")?;
    Ok(Pin::from_ascii(line.trim_end_matches(['\r', '\n']))?)
}

fn select_card(ctx: &Context, name_: &Option<String>) -> Result<pcsc::Card> {
    let span = trace_span!("select_card", name = ?name_);
    let _enter = span.enter();

    Ok(if let Some(name) = name_ {
        debug!(%name, "Connecting to named reader");
        // If the --reader flag is passed, use the reader name verbatim.
        ctx.connect(
            std::ffi::CString::new(name.clone())?.as_c_str(),
            pcsc::ShareMode::Shared,
            pcsc::Protocols::ANY,
        )
        .tap_err(|err| error!(%err, %name, "Couldn't connect"))?
    } else {
        // If not, use the first available reader.
        let mut readers_buf = [0; 2048];
        debug!("Listing available readers");
        let name = ctx
            .list_readers(&mut readers_buf)?
            .next()
            .ok_or(anyhow!("No supported reader connected"))?;

        debug!(?name, "Connecting to first available reader");
        ctx.connect(name, pcsc::ShareMode::Shared, pcsc::Protocols::ANY)?
    })
}

fn init_logging(args: &Args) {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_max_level(match 2 + args.verbose as i16 - args.quiet as i16 {
            i16::MIN..=0 => tracing::Level::ERROR,
            1 => tracing::Level::WARN,
            2 => tracing::Level::INFO,
            3 => tracing::Level::DEBUG,
            4.. => tracing::Level::TRACE,
        })
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);
    trace!(verbose = args.verbose, quiet = args.quiet, "Starting up");
    args.command.run(&args)
}
