//! Cat command implementation.

use oxitar::{ArchiveSession, SessionMode, SessionOptions};
use std::io::{self, Write};
use std::path::Path;

/// Print entries to stdout. With an encoding, payloads are decoded and
/// re-emitted as UTF-8; otherwise the raw bytes are streamed.
pub fn cmd_cat(
    archive: &Path,
    names: &[String],
    encoding: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = ArchiveSession::open_path(archive, SessionMode::Read, SessionOptions::default())?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_entries(&mut session, names, encoding, &mut out)?;
    out.flush()?;
    Ok(())
}

fn write_entries<W: Write>(
    session: &mut ArchiveSession,
    names: &[String],
    encoding: Option<&str>,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    for name in names {
        match encoding {
            Some(_) => out.write_all(session.read_text(name, encoding)?.as_bytes())?,
            None => {
                let mut stream = session.open_input_stream(name)?;
                io::copy(&mut stream, out)?;
                stream.close();
            }
        }
    }
    Ok(())
}
