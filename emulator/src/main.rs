mod session;

use std::io::{self, BufRead, Write};

use anyhow::Result;
use session::Session;

fn main() -> Result<()> {
    env_logger::init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&mut stdin.lock(), &mut stdout.lock())?;
    Ok(())
}

fn run(reader: &mut impl BufRead, writer: &mut impl Write) -> io::Result<()> {
    let mut session = Session::new();
    let mut line = String::new();

    writeln!(
        writer,
        "Actuator rig emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        write!(writer, "> ")?;
        writer.flush()?;

        line.clear();
        if reader.read_line(&mut line)? == 0 {
            writeln!(writer)?;
            return Ok(());
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            writeln!(writer, "Session closed.")?;
            return Ok(());
        }

        for response in session.handle_command(input) {
            writeln!(writer, "{response}")?;
        }
    }
}
