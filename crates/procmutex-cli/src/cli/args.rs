//! CLI argument definitions and command builders
//!
//! Each function returns a configured `clap::Command` for a subcommand.

use clap::{Arg, Command};

fn arg_name() -> Arg {
    Arg::new("name")
        .long("name")
        .short('n')
        .required(true)
        .value_name("NAME")
        .help("Name of the mutex to acquire")
}

fn arg_prefix() -> Arg {
    Arg::new("prefix")
        .long("prefix")
        .short('p')
        .value_name("PREFIX")
        .help("Scope prefix, at most 7 characters; different prefixes never contend")
}

fn arg_timeout() -> Arg {
    Arg::new("timeout")
        .long("timeout")
        .short('t')
        .value_name("SECONDS")
        .value_parser(clap::value_parser!(u64).range(1..))
        .help("Give up after this many seconds of waiting (default: wait forever)")
}

fn arg_delay() -> Arg {
    Arg::new("delay")
        .long("delay")
        .value_name("MILLIS")
        .value_parser(clap::value_parser!(u64).range(1..))
        .help("Poll interval in milliseconds on platforms without a blocking lock")
}

pub fn cmd_run() -> Command {
    Command::new("run")
        .about("Run a command while holding a named mutex")
        .long_about(
            "Run a Command Under a Named Mutex\n\
             \n\
             WHAT IT DOES:\n  \
             1. Acquires the named cross-process mutex\n  \
             2. Runs the given command\n  \
             3. Releases the mutex when the command exits\n  \
             4. Exits with the command's exit code\n\
             \n\
             Pressing Ctrl-C while waiting cancels the acquisition and\n\
             exits without running the command.",
        )
        .arg(arg_name())
        .arg(arg_prefix())
        .arg(arg_timeout())
        .arg(arg_delay())
        .arg(
            Arg::new("command")
                .required(true)
                .num_args(1..)
                .value_name("COMMAND")
                .trailing_var_arg(true)
                .allow_hyphen_values(true)
                .help("Command (and arguments) to run while the mutex is held"),
        )
        .after_help(
            "EXAMPLES:\n  \
             # Serialize database migrations across processes\n  \
             procmutex run --name migrations -- ./migrate.sh\n\
             \n  \
             # Give up after 30 seconds\n  \
             procmutex run --name deploys --timeout 30 -- make deploy\n\
             \n  \
             # Scope the lock so unrelated tools never contend\n  \
             procmutex run --name cache --prefix ci -- ./warm-cache.sh",
        )
}

pub fn cmd_hold() -> Command {
    Command::new("hold")
        .about("Acquire a named mutex and hold it until interrupted")
        .long_about(
            "Hold a Named Mutex\n\
             \n\
             Acquires the mutex, prints the backing lock file path, and\n\
             holds the mutex until Ctrl-C. Useful for inspecting contention\n\
             and for testing how other processes behave while the lock is\n\
             taken.",
        )
        .arg(arg_name())
        .arg(arg_prefix())
        .arg(arg_timeout())
        .arg(arg_delay())
        .after_help(
            "EXAMPLES:\n  \
             # Block all 'migrations' runs until Ctrl-C\n  \
             procmutex hold --name migrations",
        )
}

/// Build the root CLI command with all subcommands
pub fn build_cli() -> Command {
    Command::new("procmutex")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Procmutex Contributors")
        .about("Procmutex - named cross-process mutual exclusion")
        .long_about(
            "Procmutex - Named Cross-Process Mutual Exclusion\n\
             \n\
             Exactly one process on this machine holds a given named mutex\n\
             at a time. Locks are backed by advisory file locks on files in\n\
             the system temporary directory, so they cost nothing to create\n\
             and disappear with the machine, not with the process.\n\
             \n\
             TYPICAL WORKFLOW:\n  \
             procmutex run --name <lock> -- <command>   # serialized command\n  \
             procmutex hold --name <lock>               # manual testing",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(cmd_run())
        .subcommand(cmd_hold())
}
