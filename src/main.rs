use failure::{bail, format_err, Fallible};
use log::warn;
use meetplan::{
    dal::DB,
    logic::{auth::Tokens, Config, Context},
    router::serve_on,
    util::log_err,
};
use std::{
    net::{SocketAddr, ToSocketAddrs},
    process::exit,
};
use structopt::StructOpt;
use tokio::runtime::Builder;

fn main() {
    dotenv::dotenv().ok();

    let options = Options::from_args();
    if let Err(err) = options.start_logger() {
        warn!("Logging couldn't start: {}", err);
    }

    if let Err(err) = run(options) {
        log_err(&err);
        exit(1);
    }
}

fn run(options: Options) -> Fallible<()> {
    let serve_addr = options.serve_addr()?;
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let db = DB::connect(&options.database_url)?;
    let ctx = Context::new(
        db,
        Tokens::for_mode(options.debug),
        Config {
            block_registrations: options.block_registrations,
            parent_view_absences: options.parent_view_absences,
            parent_view_grades: options.parent_view_grades,
            school_name: options.school_name.clone(),
        },
    );
    runtime.block_on(serve_on(serve_addr, ctx))
}

#[derive(Debug, StructOpt)]
#[structopt(setting = structopt::clap::AppSettings::ColoredHelp)]
pub struct Options {
    /// Turns off message output. Passing once prevents logging to syslog. Passing twice or more
    /// disables all logging.
    #[structopt(short = "q", long = "quiet", parse(from_occurrences))]
    quiet: usize,

    /// Increases the verbosity. Default verbosity is warnings and higher to syslog, info and
    /// higher to the console.
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// The path of the SQLite database. Created if it doesn't exist.
    #[structopt(long = "db", env = "DATABASE_URL", default_value = "meetplan.db")]
    pub database_url: String,

    /// The host to serve on.
    #[structopt(short = "H", long = "host", env = "HOST", default_value = "::")]
    host: String,

    /// The port to serve on.
    #[structopt(short = "P", long = "port", env = "PORT", default_value = "8000")]
    port: u16,

    /// Only lets administrators register new users.
    #[structopt(
        long = "block-registrations",
        env = "BLOCK_REGISTRATIONS",
        default_value = "false",
        parse(try_from_str)
    )]
    pub block_registrations: bool,

    /// Lets parents see their children's absences.
    #[structopt(
        long = "parent-view-absences",
        env = "PARENT_VIEW_ABSENCES",
        default_value = "true",
        parse(try_from_str)
    )]
    pub parent_view_absences: bool,

    /// Lets parents see their children's grades.
    #[structopt(
        long = "parent-view-grades",
        env = "PARENT_VIEW_GRADES",
        default_value = "true",
        parse(try_from_str)
    )]
    pub parent_view_grades: bool,

    /// The school's name, as printed on certificates.
    #[structopt(long = "school-name", env = "SCHOOL_NAME", default_value = "")]
    pub school_name: String,

    /// Signs tokens with a fixed, well-known key, so they survive restarts. Never use this in
    /// production.
    #[structopt(long = "debug", env = "DEBUG", parse(try_from_str), default_value = "false")]
    pub debug: bool,

    /// The syslog server to send logs to.
    #[structopt(short = "s", long = "syslog-server", env = "SYSLOG_SERVER")]
    syslog_server: Option<String>,
}

impl Options {
    /// Get the address to serve on.
    pub fn serve_addr(&self) -> Fallible<SocketAddr> {
        let addrs = (&self.host as &str, self.port)
            .to_socket_addrs()?
            .collect::<Vec<_>>();
        if addrs.is_empty() {
            bail!("No matching address exists")
        } else {
            Ok(addrs[0])
        }
    }

    /// Sets up logging as specified by the `-q`, `-s`, and `-v` flags.
    pub fn start_logger(&self) -> Fallible<()> {
        use fern::Dispatch;
        use log::LevelFilter;

        if self.quiet >= 2 {
            return Ok(());
        }

        let (console_ll, syslog_ll) = match self.verbose {
            0 => (LevelFilter::Info, LevelFilter::Warn),
            1 => (LevelFilter::Debug, LevelFilter::Info),
            2 => (LevelFilter::Trace, LevelFilter::Debug),
            _ => (LevelFilter::Trace, LevelFilter::Trace),
        };

        let fern = Dispatch::new().chain(
            Dispatch::new()
                .level(console_ll)
                .format(move |out, message, record| {
                    out.finish(format_args!("[{}] {}", record.level(), message))
                })
                .chain(std::io::stderr()),
        );

        let fern = if self.quiet == 0 {
            let formatter = syslog::Formatter3164 {
                facility: syslog::Facility::LOG_DAEMON,
                hostname: hostname::get().ok().and_then(|h| h.into_string().ok()),
                process: "meetplan".to_owned(),
                pid: std::process::id(),
            };

            let syslog = if let Some(ref server) = self.syslog_server {
                syslog::tcp(formatter, server.as_str())
                    .map_err(|err| format_err!("Couldn't connect to syslog: {}", err))?
            } else {
                syslog::unix(formatter.clone())
                    .or_else(|_| syslog::tcp(formatter.clone(), ("127.0.0.1", 601)))
                    .or_else(|_| {
                        syslog::udp(formatter.clone(), ("127.0.0.1", 0), ("127.0.0.1", 514))
                    })
                    .map_err(|err| format_err!("Couldn't connect to syslog: {}", err))?
            };

            fern.chain(Dispatch::new().level(syslog_ll).chain(syslog))
        } else {
            fern
        };

        fern.apply()?;
        Ok(())
    }
}
