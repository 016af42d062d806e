// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use std::io::Write as _;

fn label(level: Level) -> (&'static str, Color) {
    match level {
        Level::Error => ("ERROR", Color::Red),
        Level::Warn => ("WARN", Color::Yellow),
        Level::Info => ("", Color::Cyan),
        // `debug!` is used for checks that passed
        Level::Debug => ("OKAY", Color::Green),
        Level::Trace => ("", Color::Blue),
    }
}

/// Initializes a logger that prints the `MRC:` lines in a boot-console style
///
/// `verbose` adds the trace output (digests, file paths).  `RUST_LOG` is
/// applied on top of that.
pub fn init_logger(verbose: bool) {
    env_logger::Builder::new()
        .format(|buf, record| {
            let (text, color) = label(record.level());
            let mut style = buf.style();
            style.set_color(color);
            writeln!(
                buf,
                "{: <5} | {}",
                style.value(text),
                record.args().to_string().replace('\n', "\n      | ")
            )
        })
        .filter(
            None,
            if verbose {
                LevelFilter::Trace
            } else {
                LevelFilter::Debug
            },
        )
        .parse_env("RUST_LOG")
        .init();
}
