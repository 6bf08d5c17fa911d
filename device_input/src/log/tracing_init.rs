// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::{DisplayPreference, TracingConfig, WriterConfig, rolling_file_appender_impl};
use tracing::dispatcher::DefaultGuard;
use tracing_core::LevelFilter;
use tracing_subscriber::{Layer, registry::LookupSpan};

/// Avoid gnarly type annotations by using a macro to create the `fmt` layer.
#[macro_export]
macro_rules! create_fmt {
    () => {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
    };
}

/// Type alias for a boxed layer.
pub type DynLayer<S> = dyn Layer<S> + Send + Sync + 'static;

/// Installs the global subscriber described by `config`. Does nothing if the level filter
/// is [`LevelFilter::OFF`].
///
/// # Errors
///
/// See [`TracingConfig::install_global`].
pub fn try_initialize_logging_global(config: TracingConfig) -> miette::Result<()> {
    if config.get_level_filter() == LevelFilter::OFF {
        return Ok(());
    }
    config.install_global()
}

/// Installs a thread local subscriber described by `config`, which is handy in tests.
/// Returns [`None`] if the level filter is [`LevelFilter::OFF`].
///
/// # Errors
///
/// See [`TracingConfig::install_thread_local`].
pub fn try_initialize_logging_thread_local(
    config: TracingConfig,
) -> miette::Result<Option<DefaultGuard>> {
    if config.get_level_filter() == LevelFilter::OFF {
        return Ok(None);
    }
    config.install_thread_local().map(Some)
}

/// Returns the layers without installing them. The first one is the level filter.
///
/// # Errors
///
/// The log file can't be created.
pub fn try_create_layers(
    config: &TracingConfig,
) -> miette::Result<Vec<Box<DynLayer<tracing_subscriber::Registry>>>> {
    let mut layers: Vec<Box<DynLayer<tracing_subscriber::Registry>>> = vec![];
    layers.push(Box::new(config.get_level_filter()));

    if let Some(layer) =
        try_create_display_layer(config.get_level_filter(), &config.writer_config)
    {
        layers.push(layer);
    }

    if let Some(layer) =
        try_create_file_layer(config.get_level_filter(), &config.writer_config)?
    {
        layers.push(layer);
    }

    Ok(layers)
}

#[must_use]
pub fn try_create_display_layer<S>(
    level_filter: LevelFilter,
    writer_config: &WriterConfig,
) -> Option<Box<DynLayer<S>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let fmt_layer = create_fmt!();
    match writer_config {
        WriterConfig::DisplayAndFile(display_pref, _) | WriterConfig::Display(display_pref) => {
            match display_pref {
                DisplayPreference::Stdout => Some(Box::new(
                    fmt_layer
                        .with_writer(std::io::stdout)
                        .with_filter(level_filter),
                )),
                DisplayPreference::Stderr => Some(Box::new(
                    fmt_layer
                        .with_writer(std::io::stderr)
                        .with_filter(level_filter),
                )),
            }
        }
        WriterConfig::None | WriterConfig::File(_) => None,
    }
}

/// # Errors
///
/// The log file can't be created.
pub fn try_create_file_layer<S>(
    level_filter: LevelFilter,
    writer_config: &WriterConfig,
) -> miette::Result<Option<Box<DynLayer<S>>>>
where
    S: tracing_core::Subscriber,
    for<'a> S: LookupSpan<'a>,
{
    let fmt_layer = create_fmt!().with_ansi(false);
    Ok(match writer_config {
        WriterConfig::DisplayAndFile(_, log_file_path) | WriterConfig::File(log_file_path) => {
            let file = rolling_file_appender_impl::try_create(log_file_path)?;
            Some(Box::new(
                fmt_layer.with_writer(file).with_filter(level_filter),
            ))
        }
        WriterConfig::None | WriterConfig::Display(_) => None,
    })
}
