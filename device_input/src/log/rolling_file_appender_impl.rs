// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::path::PathBuf;

/// A file appender that never rolls over, writing to `path_str`.
///
/// Wrapping this in [`tracing_appender::non_blocking`] loses the output of short lived
/// processes, so it is used as is.
///
/// # Errors
///
/// The path has no parent directory or no file name.
pub fn try_create(
    path_str: &str,
) -> miette::Result<tracing_appender::rolling::RollingFileAppender> {
    let path = PathBuf::from(path_str);

    let parent = path.parent().ok_or_else(|| {
        miette::miette!(
            "Can't access the folder of {}. It might not exist, or it isn't accessible.",
            path.display()
        )
    })?;

    let file_name = path.file_name().ok_or_else(|| {
        miette::miette!("{} doesn't name a log file.", path.display())
    })?;

    Ok(tracing_appender::rolling::never(parent, file_name))
}
