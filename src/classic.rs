// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

//! `getopt(3)` style functions backed by a per-thread default [Scanner].
//!
//! Prefer creating a [Scanner] explicitly; these functions exist for code
//! that wants the traditional calling convention.

use std::cell::RefCell;
use std::env;
use std::path::Path;

use crate::scanner::{Scanner, Settings};
use crate::table::{LongOpt, Table};

thread_local! {
    static SCANNER: RefCell<Scanner> = RefCell::new(Scanner::default());
}

/// Get a list of all command-line arguments specified to the program with
/// the program name (the first argument) removed.
pub fn get_args() -> Vec<String> {
    env::args().skip(1).collect()
}

/// The base name of the running program, used to prefix diagnostics.
pub fn prog_name() -> String {
    env::args()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn scan(argv: &mut [String], table: Table) -> i32 {
    SCANNER.with(|scanner| {
        let mut scanner = scanner.borrow_mut();

        scanner.set_table(table);
        scanner.getopt(argv)
    })
}

/// Scan the next short option (`getopt(3)`).
///
/// Returns the option character, `-1` when there are no more options, `'?'`
/// for an error, or `':'` for a missing value if `optstring` starts with
/// `:`. See [optind()], [optarg()] and [optopt()].
pub fn getopt(argv: &mut [String], optstring: &str) -> i32 {
    scan(argv, Table::new(optstring))
}

/// Scan the next short or `--long` option (`getopt_long(3)`).
///
/// In addition to the [getopt()] codes, `0` is returned when a long option
/// stored its code in its flag. See [longind()].
pub fn getopt_long(argv: &mut [String], optstring: &str, longopts: &[LongOpt]) -> i32 {
    scan(argv, Table::new(optstring).longs(longopts.to_vec()))
}

/// Like [getopt_long()], but long options may also start with a single dash
/// (`getopt_long_only(3)`).
pub fn getopt_long_only(argv: &mut [String], optstring: &str, longopts: &[LongOpt]) -> i32 {
    scan(
        argv,
        Table::new(optstring)
            .longs(longopts.to_vec())
            .long_only(true),
    )
}

/// Index of the next element to scan; once scanning has finished, the index
/// of the first positional argument.
pub fn optind() -> usize {
    SCANNER.with(|scanner| scanner.borrow().optind())
}

/// Move the scan position. `0` restarts scanning from scratch.
pub fn set_optind(optind: usize) {
    SCANNER.with(|scanner| scanner.borrow_mut().set_optind(optind))
}

/// Value of the last option found.
pub fn optarg() -> Option<String> {
    SCANNER.with(|scanner| scanner.borrow().optarg().map(String::from))
}

/// Code of the last offending option.
pub fn optopt() -> i32 {
    SCANNER.with(|scanner| scanner.borrow().optopt())
}

/// Long table index of the last long option found.
pub fn longind() -> Option<usize> {
    SCANNER.with(|scanner| scanner.borrow().longind())
}

/// Enable or disable diagnostics (`getopt(3)`'s `opterr`).
pub fn set_opterr(enabled: bool) {
    SCANNER.with(|scanner| {
        let mut scanner = scanner.borrow_mut();

        let settings = if enabled {
            Settings::new()
        } else {
            Settings::new().quiet()
        };

        let current = std::mem::take(&mut *scanner);
        *scanner = current.settings(settings);
    })
}

/// Forget all scan state so a new argument vector can be scanned.
pub fn reset() {
    SCANNER.with(|scanner| scanner.borrow_mut().reset())
}
