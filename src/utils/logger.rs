//! Console logging through `simple_logger`, copied line by line to a file.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

use log::{LevelFilter, Log, Metadata, Record};
use simple_logger::SimpleLogger;

use crate::utils::{debug::unique_path, helpers::unix_millis};

pub struct TeeLogger {
    console: SimpleLogger,
    file: Option<Mutex<File>>,
    level: LevelFilter,
}

impl TeeLogger {
    /// Log at `level`, also appending to `file` when given
    ///
    /// # Errors
    /// If the log file can't be opened
    pub fn new(level: LevelFilter, file: Option<&Path>) -> io::Result<Self> {
        let file = file
            .map(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(unique_path(path, true)?)
            })
            .transpose()?
            .map(Mutex::new);

        Ok(Self {
            console: SimpleLogger::new().with_level(level),
            file,
            level,
        })
    }

    /// Install as the global logger
    ///
    /// # Errors
    /// A logger is already installed
    pub fn init(self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(self.level);
        log::set_boxed_logger(Box::new(self))
    }
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        self.console.log(record);

        if let Some(Ok(mut file)) = self.file.as_ref().map(Mutex::lock) {
            // write failures are dropped
            let _ = writeln!(
                file,
                "{} {:<5} [{}] {}",
                unix_millis(),
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(Ok(mut file)) = self.file.as_ref().map(Mutex::lock) {
            let _ = file.flush();
        }
    }
}
