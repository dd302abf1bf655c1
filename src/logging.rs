use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use crate::errors::ConfigError;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l})} {t} - {m}{n}";

/// Sets up logging to file and optionally to stdout
///
/// # Arguments
///
/// * 'log_path' - path to the log file
/// * 'log_level' - level filter for all appenders
/// * 'log_to_stdout' - whether to also log to stdout
pub fn setup_logger(
    log_path: &str,
    log_level: LevelFilter,
    log_to_stdout: bool,
) -> Result<Handle, ConfigError> {
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(log_path)?;

    let mut config_builder =
        Config::builder().appender(Appender::builder().build("logfile", Box::new(logfile)));
    let mut root_builder = Root::builder().appender("logfile");

    if log_to_stdout {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();
        config_builder =
            config_builder.appender(Appender::builder().build("stdout", Box::new(stdout)));
        root_builder = root_builder.appender("stdout");
    }

    let config = config_builder.build(root_builder.build(log_level))?;
    let handle = log4rs::init_config(config)?;

    Ok(handle)
}
