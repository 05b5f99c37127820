use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rustdis_client::{Client, Command, Config, Error, Frame};
use tracing::{debug, Level};

const HOST: &str = "127.0.0.1";
const PORT: u16 = 6379;

#[derive(Parser, Debug)]
#[command(name = "rustdis-cli", about = "Send commands to a Redis compatible server")]
struct Args {
    /// Server hostname
    #[arg(long, env = "REDIS_HOST", default_value = HOST)]
    host: String,

    /// Server port
    #[arg(short, long, env = "REDIS_PORT", default_value_t = PORT)]
    port: u16,

    /// Username sent along the password, for servers with ACLs
    #[arg(long, env = "REDIS_USERNAME")]
    username: Option<String>,

    /// Password sent with AUTH right after connecting
    #[arg(short = 'a', long, env = "REDIS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Read and write timeout in milliseconds, 0 waits forever
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,

    /// Run the commands, separated by `;`, as a single MULTI/EXEC transaction
    #[arg(long)]
    multi: bool,

    /// Log connection and frame details to stderr
    #[arg(short, long)]
    verbose: bool,

    /// The command and its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Args {
    fn config(&self) -> Config {
        let timeout = match self.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let config = Config::new(format!("{}:{}", self.host, self.port))
            .with_timeout(timeout)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms));

        match &self.password {
            Some(password) => config.with_auth(self.username.clone(), password),
            None => config,
        }
    }

    fn commands(&self) -> Vec<Command> {
        self.args
            .split(|arg| arg == ";")
            .filter(|args| !args.is_empty())
            .map(Command::from_args)
            .collect()
    }
}

fn run(args: &Args) -> Result<Vec<Frame>, Error> {
    let mut client = Client::new(args.config());
    let commands = args.commands();

    if args.multi {
        for command in commands {
            client.enqueue(command)?;
        }
        return client.execute_transaction();
    }

    commands
        .into_iter()
        .map(|command| match client.execute(command) {
            // Server errors are printed like any other reply.
            Err(Error::Server(msg)) => Ok(Frame::Error(msg)),
            result => result,
        })
        .collect()
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    match run(&args) {
        Ok(replies) => {
            for reply in replies {
                println!("{}", reply);
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}
