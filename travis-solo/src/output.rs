// Output formatting helpers for the CLI

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

/// Print an info message
pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Print a dim success message
pub fn dim_success(message: &str) {
    eprintln!("\x1b[32m{}\x1b[0m", message);
}

/// Print a dim failure message
pub fn dim_failure(message: &str) {
    eprintln!("\x1b[31m{}\x1b[0m", message);
}

/// Print the banner of a configuration build
pub fn configuration_header(name: &str) {
    println!();
    println!("\x1b[1mBuild configuration {} running\x1b[0m", name);
}

/// Echo a command before it runs: "$ command"
pub fn command(prefix: &str, command: &str) {
    println!("{}$ \x1b[1m{}\x1b[0m", prefix, command);
}

/// Print command output
pub fn step_output(prefix: &str, line: &str) {
    println!("{}{}", prefix, line);
}

/// Print command error output (red)
pub fn step_error(prefix: &str, line: &str) {
    eprintln!("{}\x1b[31m{}\x1b[0m", prefix, line);
}

/// Print one line of the build summary, green when it passed
pub fn summary_line(message: &str, passed: bool) {
    if passed {
        println!("\x1b[32m{}\x1b[0m", message);
    } else {
        println!("\x1b[31m{}\x1b[0m", message);
    }
}

/// Print a header line
pub fn header(message: &str) {
    println!("\x1b[1m==> {}\x1b[0m", message);
}
