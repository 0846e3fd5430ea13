use clap::Parser;

/// Sunnyboy Bridge - polls SMA Sunnyboy inverters over SWR-NET
#[derive(Debug, Parser)]
#[clap(author)]
pub struct Options {
    /// Inverter bus endpoint: HOST:PORT or a serial device path
    pub device: String,

    /// Poll interval in seconds
    #[clap(short = 'i', long = "interval")]
    pub interval: Option<u64>,

    /// Close the transport between poll cycles
    #[clap(short = 'c', long = "close-between-cycles")]
    pub close_between_cycles: bool,

    /// Log raw inbound/outbound frames under this directory
    #[clap(short = 'l', long = "frame-log")]
    pub frame_log: Option<String>,

    /// Write the process id to this file
    #[clap(short = 'p', long = "pid-file")]
    pub pid_file: Option<String>,

    /// Log at debug level
    #[clap(short = 'v')]
    pub verbose: bool,

    /// Log at trace level
    #[clap(short = 'V')]
    pub very_verbose: bool,

    /// Optional YAML config file
    #[clap(short = 'f', long = "config")]
    pub config_file: Option<String>,

    /// Database URL (overrides the config file)
    #[clap(short = 'd', long = "database")]
    pub database: Option<String>,
}

impl Options {
    /// Parses the command line. Usage errors exit with status 1; help
    /// output exits with status 0.
    pub fn new() -> Self {
        match Self::try_parse() {
            Ok(options) => options,
            Err(err) if err.use_stderr() => {
                let _ = err.print();
                std::process::exit(1);
            }
            Err(err) => {
                let _ = err.print();
                std::process::exit(0);
            }
        }
    }
}
