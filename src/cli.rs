use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use getopts::{Matches, Options};
use tokio::time::Duration;

use eios_schedule::portal::DEFAULT_ORIGIN;

pub struct Args {
    pub address: SocketAddr,
    pub enable_cache: bool,
    pub cache_ttl: Duration,
    pub coalesce: bool,
    pub timeout: Duration,
    pub portal: String,
    pub rules: Option<PathBuf>,
    pub reject_overlaps: bool,
}

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "a",
        "address",
        "Socket address (IP and port) to listen on [Default: 127.0.0.1:8080]",
        "SOCKET_ADDRESS",
    );
    opts.optflag(
        "c",
        "disable-cache",
        "Disable caching of fetched schedules [Default: false]",
    );
    opts.optopt(
        "t",
        "cache-ttl",
        "Time-to-live for cached schedules [Default: 86400]",
        "SECONDS",
    );
    opts.optflag(
        "",
        "coalesce",
        "Share one portal fetch between concurrent requests for the same schedule",
    );
    opts.optopt(
        "",
        "timeout",
        "Timeout for each request to the portal [Default: 30]",
        "SECONDS",
    );
    opts.optopt(
        "",
        "portal",
        "Origin of the EIOS portal [Default: https://eios.linguanet.ru]",
        "URL",
    );
    opts.optopt(
        "",
        "rules",
        "JSON file with custom weekly events per account",
        "FILE",
    );
    opts.optflag(
        "",
        "reject-overlaps",
        "Refuse custom events whose slots overlap on the same day",
    );
    opts
}

fn get_or_exit<T>(matches: &Matches, name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match matches.opt_get_default(name, default) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Provided value for option '{name}' is invalid: {err}");
            process::exit(1);
        }
    }
}

pub fn parse(args: Vec<String>) -> Args {
    let opts = opts();

    let matches = match opts.parse(args) {
        Ok(matches) => matches,
        Err(fail) => {
            eprintln!("{fail}");
            process::exit(1);
        }
    };

    if matches.opt_present("help") {
        println!("{}", opts.usage(&opts.short_usage(env!("CARGO_PKG_NAME"))));
        process::exit(0);
    }

    let address = get_or_exit(&matches, "address", SocketAddr::from(([127, 0, 0, 1], 8080)));
    let cache_ttl = Duration::from_secs(get_or_exit(&matches, "cache-ttl", 24 * 60 * 60));
    let timeout = Duration::from_secs(get_or_exit(&matches, "timeout", 30));

    Args {
        address,
        enable_cache: !matches.opt_present("disable-cache"),
        cache_ttl,
        coalesce: matches.opt_present("coalesce"),
        timeout,
        portal: matches
            .opt_str("portal")
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
        rules: matches.opt_str("rules").map(PathBuf::from),
        reject_overlaps: matches.opt_present("reject-overlaps"),
    }
}
