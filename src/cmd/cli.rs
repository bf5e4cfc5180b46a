use std::fs::File;
use std::io::{BufReader, IsTerminal, stdin};

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tokio_stream::StreamExt;
use tracing_appender::rolling;

use dnskraken::core::common::{LogLevel, LoggingOptions, ResolveOptions, ResolveResult, Transport};
use dnskraken::core::config::Config;
use dnskraken::core::konst::{
    APP_NAME, CLI_HEADER_MSG, CONFIG_FILE, CURRENT_DIR, LOG_ENV_VAR, LOGFILE_NAME, LOGGING_JSON, LOGGING_QUIET,
    RESOLVE_CONCURRENCY, RESOLVE_DELAY, RESOLVE_DELAY_JITTER, RESOLVE_TIMEOUT,
};
use dnskraken::dns::resolvers::fetch_default_resolvers;
use dnskraken::dns::runner::Runner;
use dnskraken::util::message::{result_json_msg, result_msg, results_table_msg, round_msg, summary_msg};
use dnskraken::util::parser::read_hosts;

#[derive(Debug, Subcommand, PartialEq, Clone)]
pub enum ConfigCommand {
    /// Create configuration
    Create {
        /// Config filename.
        /// Search Path: $CWD/dk.toml
        #[clap(short, long, default_value = CONFIG_FILE)]
        file: String,

        /// Warning: Overwrites existing file if found in path.
        #[clap(long, default_value_t = false)]
        force: bool,
    },
}

#[derive(Debug, Subcommand, PartialEq)]
pub enum Command {
    /// Generate a DNSKraken configuration
    Config {
        #[clap(subcommand)]
        command: ConfigCommand,
    },

    /// Resolve hostnames to IPv4 and IPv6 addresses
    #[command(after_help = format_examples(&[
        "dk resolve example.com github.com        # Resolve two hosts",
        "dk resolve -i hosts.txt -c 50 --stream   # Stream results for a host list",
        "cat hosts.txt | dk resolve -r 9.9.9.9    # Read hosts from stdin",
    ]))]
    Resolve {
        /// Hostnames to resolve, optionally suffixed with `:port`
        #[clap(display_order = 1)]
        hosts: Vec<String>,

        /// Read hostnames from a file, one per line
        #[clap(short, long, display_order = 2)]
        input: Option<String>,

        /// Print results as they arrive instead of as a table at the end
        #[clap(short, long, default_value_t = false, display_order = 3)]
        stream: bool,

        #[clap(flatten)]
        resolve_args: ResolveArgs,
    },
}

#[derive(Clone, Debug, Args, PartialEq)]
pub struct ResolveArgs {
    /// Max hosts resolved at once
    #[clap(short, long, default_value_t = RESOLVE_CONCURRENCY, display_order = 120)]
    pub concurrency: usize,

    /// Per query timeout (in seconds)
    #[clap(short, long, default_value_t = RESOLVE_TIMEOUT, display_order = 121)]
    pub timeout: u64,

    /// Delay between dispatches (in milliseconds)
    #[clap(short, long, default_value_t = RESOLVE_DELAY, display_order = 122)]
    pub delay: u64,

    /// Random jitter added to the delay (in milliseconds)
    #[clap(short = 'j', long, default_value_t = RESOLVE_DELAY_JITTER, display_order = 123)]
    pub delay_jitter: u64,

    /// Resolver address, tried in the order given. Repeatable.
    #[clap(short, long = "resolver", display_order = 124)]
    pub resolvers: Vec<String>,

    /// Fetch the trusted public resolver list
    #[clap(long, default_value_t = false, display_order = 125, conflicts_with = "resolvers")]
    pub fetch_resolvers: bool,

    /// Transport protocol
    #[clap(short = 'T', long, default_value_t = Transport::default(), display_order = 126)]
    pub transport: Transport,

    /// Config filename.
    /// Search Path: $CWD/dk.toml
    #[clap(long, default_value = CONFIG_FILE, display_order = 127)]
    pub config: String,

    // Logging options
    // --------------
    /// Verbose logging (same as --log-level debug)
    #[clap(short, long, default_value_t = false, display_order = 320)]
    pub verbose: bool,

    /// Logging level
    #[clap(long, default_value_t = LogLevel::default(), display_order = 321)]
    pub log_level: LogLevel,

    /// Logging directory
    #[clap(long, default_value = CURRENT_DIR, display_order = 322)]
    pub log_dir: String,

    /// Logging filename
    #[clap(long, default_value = LOGFILE_NAME, display_order = 323)]
    pub log_file: String,

    /// Output results as JSON, and log to file in JSON format
    #[clap(long, default_value_t = false, display_order = 324)]
    pub json: bool,

    /// Silence everything but the results
    #[clap(short, long, default_value_t = false, display_order = 325)]
    pub quiet: bool,
}

impl Default for ResolveArgs {
    fn default() -> Self {
        Self {
            concurrency: RESOLVE_CONCURRENCY,
            timeout: RESOLVE_TIMEOUT,
            delay: RESOLVE_DELAY,
            delay_jitter: RESOLVE_DELAY_JITTER,
            resolvers: vec![],
            fetch_resolvers: false,
            transport: Transport::default(),
            config: CONFIG_FILE.to_owned(),
            verbose: false,
            log_level: LogLevel::default(),
            log_dir: CURRENT_DIR.to_owned(),
            log_file: LOGFILE_NAME.to_owned(),
            json: LOGGING_JSON,
            quiet: LOGGING_QUIET,
        }
    }
}

impl ResolveArgs {
    /// CLI options override config file options.
    /// If a CLI option is NOT the same as the default,
    /// the option was set from the CLI. Therefore we should
    /// use the CLI option. Otherwise use the config file option.
    #[rustfmt::skip]
    fn merge(&self, config: Config) -> (ResolveOptions, LoggingOptions) {
        let file = config.resolve_options;
        let resolve_options = ResolveOptions {
            concurrency: if self.concurrency != RESOLVE_CONCURRENCY { self.concurrency } else { file.concurrency },
            timeout: if self.timeout != RESOLVE_TIMEOUT { self.timeout } else { file.timeout },
            delay: if self.delay != RESOLVE_DELAY { self.delay } else { file.delay },
            delay_jitter: if self.delay_jitter != RESOLVE_DELAY_JITTER { self.delay_jitter } else { file.delay_jitter },
            resolvers: if !self.resolvers.is_empty() { self.resolvers.clone() } else { file.resolvers },
            transport: if self.transport != Transport::default() { self.transport } else { file.transport },
            verbose: self.verbose || file.verbose,
            log_level: if self.log_level != LogLevel::default() { self.log_level } else { file.log_level },
        };

        let file = config.logging_options;
        let logging_options = LoggingOptions {
            dir: if self.log_dir != CURRENT_DIR { self.log_dir.clone() } else { file.dir },
            file: if self.log_file != LOGFILE_NAME { self.log_file.clone() } else { file.file },
            json: if self.json != LOGGING_JSON { self.json } else { file.json },
            quiet: if self.quiet != LOGGING_QUIET { self.quiet } else { file.quiet },
        };

        (resolve_options, logging_options)
    }
}

#[derive(Debug, Parser)]
#[command(name = "dk")]
#[command(bin_name = "dk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "DNSKraken - Bulk DNS resolution against a pool of resolvers", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    command: Command,
}

impl Cli {
    pub fn init() -> Cli {
        Cli::parse()
    }

    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Config { command } => {
                match command {
                    ConfigCommand::Create { file, force } => {
                        Config::generate(&file, force)?;
                    }
                }
                Ok(())
            }
            Command::Resolve {
                hosts,
                input,
                stream,
                resolve_args,
            } => resolve(hosts, input, stream, resolve_args).await,
        }
    }
}

async fn resolve(hosts: Vec<String>, input: Option<String>, stream: bool, args: ResolveArgs) -> Result<()> {
    let (config, config_msg) = match Config::load(&args.config) {
        Ok(config) => (config, format!("Using configuration file `{}`.\n", args.config)),
        Err(_) => (
            Config::default(),
            format!(
                "Configuration file `{}` not found. Using default configuration.\n",
                args.config
            ),
        ),
    };
    let (mut resolve_options, logging_options) = args.merge(config);

    // The guard flushes the log file when dropped.
    let _guard = init_logging(&logging_options, resolve_options.effective_log_level());

    let chatty = is_chatty(&logging_options);
    if chatty {
        println!("{CLI_HEADER_MSG}");
        println!("{config_msg}");
    }

    if args.fetch_resolvers {
        resolve_options.resolvers = fetch_default_resolvers().await;
    }

    let hosts = collect_hosts(hosts, input)?;
    if hosts.is_empty() {
        bail!("no hostnames given")
    }

    let runner = Runner::new(resolve_options)?;
    let json = logging_options.json;
    if chatty {
        println!("{}", round_msg(runner.options(), hosts.len()));
    }

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    if stream {
        let mut results = runner.resolve_all_stream(&hosts);
        loop {
            tokio::select! {
                next = results.next() => match next {
                    Some(result) => print_result(&result, json)?,
                    None => break,
                },
                _ = &mut ctrl_c => bail!("interrupted"),
            }
        }
        return Ok(());
    }

    let results = tokio::select! {
        results = runner.resolve_all(&hosts) => results,
        _ = &mut ctrl_c => bail!("interrupted"),
    };

    if json {
        for result in &results {
            print_result(result, json)?;
        }
    } else {
        println!("{}", results_table_msg(&results));
    }
    if chatty {
        println!("{}", summary_msg(&results));
    }

    Ok(())
}

/// Whether banner and summary lines go to stdout. JSON output stays
/// one object per line.
fn is_chatty(logging_options: &LoggingOptions) -> bool {
    !logging_options.quiet && !logging_options.json
}

fn init_logging(logging_options: &LoggingOptions, level: LogLevel) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = rolling::never(&logging_options.dir, &logging_options.file);
    let (logfile, guard) = tracing_appender::non_blocking(file_appender);

    let tracer = tracing_subscriber::fmt()
        .with_env_filter(std::env::var(LOG_ENV_VAR).unwrap_or_else(|_| format!("{APP_NAME}={level}")))
        .with_writer(logfile)
        .with_ansi(false)
        .with_target(true);

    if logging_options.json {
        tracer.json().init()
    } else {
        tracer.init()
    }
    guard
}

/// Hosts from the command line, then the input file. Stdin is read
/// only when neither is given and it is not a terminal.
fn collect_hosts(mut hosts: Vec<String>, input: Option<String>) -> Result<Vec<String>> {
    if let Some(path) = input {
        let file = File::open(&path)?;
        hosts.extend(read_hosts(BufReader::new(file))?);
    }
    if hosts.is_empty() && !stdin().is_terminal() {
        hosts.extend(read_hosts(stdin().lock())?);
    }
    Ok(hosts)
}

fn print_result(result: &ResolveResult, json: bool) -> Result<()> {
    match json {
        true => println!("{}", result_json_msg(result)?),
        false => println!("{}", result_msg(result)),
    }
    Ok(())
}

/// Format example commands
fn format_examples(examples: &[&str]) -> String {
    let mut result = String::from("\x1B[1;4mExamples:\x1B[0m\n");
    for example in examples {
        result.push_str(&format!("  {}\n", example));
    }
    // Forces visible blank new line.
    // Otherwise, clap strips out raw trailing whitespace.
    result.push_str("\x1B[0m\n");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_override_config() {
        let args = ResolveArgs {
            concurrency: 50,
            resolvers: vec!["9.9.9.9".to_owned()],
            ..Default::default()
        };
        let config = Config {
            resolve_options: ResolveOptions {
                concurrency: 3,
                timeout: 2,
                resolvers: vec!["1.1.1.1".to_owned()],
                ..Default::default()
            },
            ..Default::default()
        };

        let (resolve_options, _) = args.merge(config);

        assert_eq!(resolve_options.concurrency, 50);
        assert_eq!(resolve_options.timeout, 2);
        assert_eq!(resolve_options.resolvers, vec!["9.9.9.9"]);
    }

    #[test]
    fn default_cli_values_keep_config() {
        let config = Config {
            resolve_options: ResolveOptions {
                transport: Transport::Tcp,
                delay: 20,
                ..Default::default()
            },
            logging_options: LoggingOptions {
                json: true,
                ..Default::default()
            },
        };

        let (resolve_options, logging_options) = ResolveArgs::default().merge(config);

        assert_eq!(resolve_options.transport, Transport::Tcp);
        assert_eq!(resolve_options.delay, 20);
        assert!(logging_options.json);
    }

    #[test]
    fn resolve_command_parses() {
        let cli = Cli::try_parse_from([
            "dk", "resolve", "example.com", "github.com", "-c", "5", "-r", "8.8.8.8", "-r", "1.1.1.1", "-T", "tcp",
            "--stream",
        ])
        .unwrap();

        match cli.command {
            Command::Resolve {
                hosts,
                stream,
                resolve_args,
                ..
            } => {
                assert_eq!(hosts, vec!["example.com", "github.com"]);
                assert!(stream);
                assert_eq!(resolve_args.concurrency, 5);
                assert_eq!(resolve_args.resolvers, vec!["8.8.8.8", "1.1.1.1"]);
                assert_eq!(resolve_args.transport, Transport::Tcp);
            }
            _ => panic!("expected resolve command"),
        }
    }

    #[test]
    fn json_output_suppresses_banner() {
        let json = LoggingOptions {
            json: true,
            ..Default::default()
        };
        let quiet = LoggingOptions {
            quiet: true,
            ..Default::default()
        };

        assert!(!is_chatty(&json));
        assert!(!is_chatty(&quiet));
        assert!(is_chatty(&LoggingOptions::default()));
    }

    #[test]
    fn runner_keeps_merged_options() {
        let args = ResolveArgs {
            concurrency: 7,
            transport: Transport::Tcp,
            ..Default::default()
        };
        let (resolve_options, _) = args.merge(Config::default());

        let runner = Runner::new(resolve_options.clone()).unwrap();

        assert_eq!(runner.options(), &resolve_options);
        assert!(round_msg(runner.options(), 2).contains("over tcp (concurrency 7"));
    }

    #[test]
    fn format_examples_lists_each_line() {
        let examples = format_examples(&["dk resolve a.com", "dk resolve b.com"]);
        assert!(examples.contains("  dk resolve a.com\n"));
        assert!(examples.contains("  dk resolve b.com\n"));
    }
}
