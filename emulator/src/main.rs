mod grid;
mod scheduler;
mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use crossterm::style::{Stylize, style};
use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    let profile = parse_profile().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!(
            "Usage: sync-emulator [--profile <slip|matched|jammed>] | sync-emulator <slip|matched|jammed>"
        );
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(profile)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Sync Check Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(
                writer,
                "Session closed after {} commands.",
                session.command_count()
            )?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            write_response(&mut writer, &response)?;
        }
    }

    Ok(())
}

fn write_response<W: Write>(writer: &mut W, response: &str) -> io::Result<()> {
    if response.starts_with("OK") {
        writeln!(writer, "{}", style(response).green())
    } else if response.starts_with("WARN") {
        writeln!(writer, "{}", style(response).yellow())
    } else if response.starts_with("ERR") {
        writeln!(writer, "{}", style(response).red())
    } else {
        writeln!(writer, "{response}")
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_profile() -> Result<TranscriptProfile, String> {
    let mut args = env::args().skip(1);
    if let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            TranscriptProfile::from_tag(value)
        } else if arg == "--profile" {
            if let Some(value) = args.next() {
                TranscriptProfile::from_tag(&value)
            } else {
                Err("Expected value after --profile".to_string())
            }
        } else {
            TranscriptProfile::from_tag(&arg)
        }
    } else {
        Ok(TranscriptProfile::Slip)
    }
}
