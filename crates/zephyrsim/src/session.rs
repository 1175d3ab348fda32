use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::{info, warn};
use zephyr_command::Sent;
use zephyr_frame::{Envelope, Telemetry};

use crate::exit::{io_error, CliResult};

const TM_DIRECTORY: &str = "TM";
const MAX_TM_SUFFIX: usize = 1000;

/// Append-only record of one simulator session.
///
/// Write failures are logged and swallowed so that a full disk never stops
/// the stream from being parsed.
pub struct SessionFiles {
    instrument: String,
    log: File,
    xml: File,
    cmd: File,
    tm_dir: PathBuf,
}

impl SessionFiles {
    /// Create `<stamp>.<instrument>.{log,xml,cmd}` and the `TM/` directory
    /// under `dir`.
    pub fn create(dir: &Path, instrument: &str, started: DateTime<Local>) -> CliResult<Self> {
        let tm_dir = dir.join(TM_DIRECTORY);
        std::fs::create_dir_all(&tm_dir)
            .map_err(|err| io_error(&format!("failed creating {}", tm_dir.display()), err))?;

        let stamp = started.format("%Y-%m-%dT%H-%M-%S");
        let open = |ext: &str| -> CliResult<File> {
            let path = dir.join(format!("{stamp}.{instrument}.{ext}"));
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))
        };

        let files = Self {
            instrument: instrument.to_string(),
            log: open("log")?,
            xml: open("xml")?,
            cmd: open("cmd")?,
            tm_dir,
        };
        info!(dir = %dir.display(), %stamp, "session files created");
        Ok(files)
    }

    pub fn record_log_line(&mut self, ts: &str, text: &str) {
        if let Err(err) = writeln!(self.log, "[{ts}] {text}") {
            warn!(error = %err, "failed writing log file");
        }
    }

    pub fn record_envelope(&mut self, ts: &str, envelope: &Envelope) {
        if let Err(err) = writeln!(self.xml, "[{ts}]  (FROM){}", envelope.rendered) {
            warn!(error = %err, "failed writing xml file");
        }
    }

    pub fn record_sent(&mut self, ts: &str, sent: &Sent) {
        if let Err(err) = writeln!(self.cmd, "[{ts}] Sending {}", sent.summary) {
            warn!(error = %err, "failed writing cmd file");
        }
    }

    /// Write one capture to its own `.dat` file: header, newline, binary.
    ///
    /// Captures landing in the same second get a `-N` suffix instead of
    /// replacing an earlier file.
    pub fn record_telemetry(&mut self, now: DateTime<Local>, tm: &Telemetry) -> Option<PathBuf> {
        let stem = format!("TM_{}", now.format("%Y-%m-%dT%H-%M-%S"));

        let result = self.create_tm_file(&stem).and_then(|(path, mut file)| {
            file.write_all(tm.header.as_bytes())?;
            file.write_all(b"\n")?;
            file.write_all(&tm.payload)?;
            file.flush()?;
            Ok(path)
        });
        match result {
            Ok(path) => {
                info!(path = %path.display(), bytes = tm.payload.len(), "telemetry saved");
                Some(path)
            }
            Err(err) => {
                warn!(error = %err, %stem, "failed writing telemetry file");
                None
            }
        }
    }

    fn create_tm_file(&self, stem: &str) -> io::Result<(PathBuf, File)> {
        for attempt in 0..MAX_TM_SUFFIX {
            let name = match attempt {
                0 => format!("{stem}.{}.dat", self.instrument),
                n => format!("{stem}-{n}.{}.dat", self.instrument),
            };
            let path = self.tm_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{MAX_TM_SUFFIX} telemetry files already named {stem}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "zephyrsim-session-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 8, 15, 9, 5, 7).unwrap()
    }

    #[test]
    fn creates_named_files() {
        let dir = temp_dir("names");
        let mut files = SessionFiles::create(&dir, "LPC", started()).unwrap();

        files.record_log_line("09:05:08.001", "booted");
        files.record_envelope(
            "09:05:09.002",
            &Envelope {
                kind: "IMR".to_string(),
                rendered: r#"{"IMR":{}}"#.to_string(),
                text: String::new(),
            },
        );

        let log = std::fs::read_to_string(dir.join("2024-08-15T09-05-07.LPC.log")).unwrap();
        assert_eq!(log, "[09:05:08.001] booted\n");
        let xml = std::fs::read_to_string(dir.join("2024-08-15T09-05-07.LPC.xml")).unwrap();
        assert_eq!(xml, "[09:05:09.002]  (FROM){\"IMR\":{}}\n");
        assert!(dir.join("2024-08-15T09-05-07.LPC.cmd").exists());
        assert!(dir.join("TM").is_dir());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn telemetry_file_holds_header_and_binary() {
        let dir = temp_dir("tm");
        let mut files = SessionFiles::create(&dir, "LPC", started()).unwrap();
        let tm = Telemetry {
            header: "<TM><Length>1</Length></TM><CRC>1</CRC>".to_string(),
            payload: b"STARTx\x00\x01END".to_vec().into(),
        };

        let path = files.record_telemetry(started(), &tm).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "TM_2024-08-15T09-05-07.LPC.dat"
        );
        let mut expected = tm.header.as_bytes().to_vec();
        expected.push(b'\n');
        expected.extend_from_slice(&tm.payload);
        assert_eq!(std::fs::read(path).unwrap(), expected);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn telemetry_in_same_second_keeps_both_files() {
        let dir = temp_dir("tm-same-second");
        let mut files = SessionFiles::create(&dir, "LPC", started()).unwrap();
        let first = Telemetry {
            header: "<TM><Length>1</Length></TM><CRC>1</CRC>".to_string(),
            payload: b"STARTa\x00\x01END".to_vec().into(),
        };
        let second = Telemetry {
            header: "<TM><Length>1</Length></TM><CRC>2</CRC>".to_string(),
            payload: b"STARTb\x00\x02END".to_vec().into(),
        };

        let first_path = files.record_telemetry(started(), &first).unwrap();
        let second_path = files.record_telemetry(started(), &second).unwrap();
        assert_eq!(
            second_path.file_name().unwrap().to_str().unwrap(),
            "TM_2024-08-15T09-05-07-1.LPC.dat"
        );
        assert!(std::fs::read(&first_path).unwrap().ends_with(b"STARTa\x00\x01END"));
        assert!(std::fs::read(&second_path).unwrap().ends_with(b"STARTb\x00\x02END"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
