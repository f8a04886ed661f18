//! smevx CLI — apply the SMEV transform to an XML fragment.

use clap::Parser;
use smevx::canonicalize;
use std::io::{IsTerminal, Read, Write};
use std::process;

#[derive(Parser)]
#[command(name = "smevx", about = "SMEV3 XML-DSig transform (urn://smev-gov-ru/xmldsig/transform)")]
struct Cli {
    /// Input file (- for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Output file (- for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,
}

fn read_input(path: &str) -> Result<Vec<u8>, String> {
    if path == "-" {
        if std::io::stdin().is_terminal() {
            eprintln!("Lese von stdin (Ctrl+D zum Beenden)...");
        }
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .map_err(|e| format!("Lesefehler (stdin): {e}"))?;
        Ok(buf)
    } else {
        std::fs::read(path).map_err(|e| format!("Lesefehler '{}': {e}", path))
    }
}

/// Schreibt Output entweder nach stdout ("-") oder atomar in eine Datei
/// (tmp+rename), damit bei Abbruch keine halbe Ausgabedatei liegen bleibt.
fn write_output(path: &str, bytes: &[u8]) -> Result<(), String> {
    if path == "-" {
        std::io::stdout()
            .write_all(bytes)
            .map_err(|e| format!("Schreibfehler (stdout): {e}"))?;
        return Ok(());
    }
    let tmp_path = format!("{path}.tmp");
    std::fs::write(&tmp_path, bytes).map_err(|e| format!("Schreibfehler '{tmp_path}': {e}"))?;
    std::fs::rename(&tmp_path, path)
        .map_err(|e| format!("Umbenennen '{tmp_path}' -> '{path}': {e}"))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Fehler: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let input = read_input(&cli.input)?;

    let mut canonical = Vec::new();
    canonicalize(input.as_slice(), &mut canonical)
        .map_err(|e| format!("Transform fehlgeschlagen: {e}"))?;

    write_output(&cli.output, &canonical)
}
