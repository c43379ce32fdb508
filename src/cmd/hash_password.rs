use std::io::{self, BufRead};

use crate::{auth::password, prelude::*};


/// Reads a single line from stdin and prints the password hash of it.
pub(crate) fn run() -> Result<()> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("could not read from stdin")?;
    let password = strip_newline(&line);
    if password.is_empty() {
        bail!("no password given on stdin");
    }

    println!("{}", password::hash(password));
    Ok(())
}

/// Only the line terminator is removed, other whitespace is part of the
/// password.
fn strip_newline(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}


#[cfg(test)]
mod tests {
    use super::strip_newline;

    #[test]
    fn keeps_inner_whitespace() {
        assert_eq!(strip_newline("hunter2\n"), "hunter2");
        assert_eq!(strip_newline("hunter2\r\n"), "hunter2");
        assert_eq!(strip_newline(" spaced out \n"), " spaced out ");
        assert_eq!(strip_newline("no newline"), "no newline");
    }
}
