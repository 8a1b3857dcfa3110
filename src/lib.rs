// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

#![deny(missing_docs)]
#![forbid(unsafe_code)]

//! Command-line argument scanning in the `getopt(3)` / `getopt_long(3)`
//! tradition.
//!
//! If you want lots of extra features, you should consider the excellent
//! [`clap`](https://crates.io/crates/clap) crate instead.
//!
//! ---
//!
//! Table of contents:
//!
//! * [Overview](#overview)
//! * [Quickstart](#quickstart)
//! * [Examples](#examples)
//! * [Details](#details)
//! * [Terminology](#terminology)
//! * [Summary of features and behaviour](#summary-of-features-and-behaviour)
//! * [Limitations](#limitations)
//!
//! ---
//!
//! # Overview
//!
//! This crate classifies each command-line argument as an option, an option
//! with a value, an unknown or ambiguous option, or a positional argument.
//! While doing so it reorders the arguments so that all options come before
//! all positional arguments, exactly like the GNU `getopt(3)` family.
//!
//! There are two ways to use it:
//!
//! - The [Parser] is given a set of [Opt]s and produces a [History] of
//!   [Node]s (or a live [Stream] of them).
//! - The [Scanner] is the underlying engine. It returns one [Scan] per
//!   call and can also give you the classic integer codes
//!   ([Scanner::getopt()]).
//!
//! # Quickstart
//!
//! > **Note:** If you are not familiar with command-line handling,
//! > see the [terminology](#terminology) section.
//!
//! 1. Create a [Parser] and register an [Opt] for each option you wish to
//!    support.
//!
//!    As a minimum, an option needs a short name or a long name.
//!
//!    By default, options are "flags" (see the [Terminology section](#terminology)).
//!
//!    ```rust
//!    use optscan::{Need, Opt, Parser};
//!
//!    let mut parser = Parser::new("prog");
//!
//!    // Support "-n" and "--name" flag option.
//!    parser.add(Opt::new('n').long("name"));
//!
//!    // Support "-t <value>" and "--time <value>" option.
//!    parser.add(Opt::new('t').long("time").needs(Need::Argument));
//!    ```
//!
//! 1. Parse the command-line. [get_args()] returns the program's arguments
//!    without the program name.
//!
//!    ```rust
//!    # use optscan::{Need, Opt, Parser};
//!    #
//!    # let mut parser = Parser::new("prog");
//!    # parser.add(Opt::new('n').long("name"));
//!    # parser.add(Opt::new('t').long("time").needs(Need::Argument));
//!    #
//!    let argv: Vec<String> = vec!["-n", "--time", "37", "effie"]
//!        .into_iter()
//!        .map(String::from)
//!        .collect();
//!
//!    let history = parser.parse_all(argv).unwrap();
//!
//!    assert_eq!(history.lookup('n').len(), 1);
//!
//!    let time = history.lookup("time");
//!    assert_eq!(time[0].opt().and_then(|m| m.value.as_deref()), Some("37"));
//!
//!    assert_eq!(history.args(), vec!["effie"]);
//!    ```
//!
//! # Examples
//!
//! ## Classic scanning loop
//!
//! ```rust
//! use optscan::{LongOpt, Need, Scan, Scanner, Table};
//!
//! let table = Table::new("nt:").longs(vec![
//!     LongOpt::new("name", Need::Nothing, 'n'),
//!     LongOpt::new("time", Need::Argument, 't'),
//! ]);
//!
//! let mut argv: Vec<String> = vec!["effie", "--ti", "37", "-n"]
//!     .into_iter()
//!     .map(String::from)
//!     .collect();
//!
//! let mut scanner = Scanner::new(table);
//!
//! loop {
//!     match scanner.next(&mut argv) {
//!         Scan::End => break,
//!         Scan::Option(found) => println!("option {:?}: {:?}", found.opt(), found.value),
//!         Scan::Error(err) => eprintln!("{}", err),
//!         other => println!("{:?}", other),
//!     }
//! }
//!
//! // Options were moved in front of the positional arguments.
//! assert_eq!(scanner.positional(&argv), &["effie".to_string()]);
//! ```
//!
//! ## Streaming with cancellation
//!
//! ```rust
//! use optscan::{CancelToken, Opt, Parser};
//!
//! let mut parser = Parser::new("prog").capacity(4);
//! parser.add(Opt::new('v'));
//!
//! let token = CancelToken::new();
//! let argv = vec!["-v".to_string(); 100];
//!
//! let mut stream = parser.parse_with_cancel(argv, token.clone()).unwrap();
//!
//! assert!(stream.next().is_some());
//!
//! token.cancel();
//! assert!(stream.next().is_none());
//! ```
//!
//! # Details
//!
//! ## Ordering
//!
//! The [Ordering] is decided by the first scan:
//!
//! - A leading `+` in the option string selects [Ordering::RequireOrder]:
//!   scanning stops at the first positional argument.
//! - A leading `-` selects [Ordering::ReturnInOrder]: positional arguments
//!   are returned in place.
//! - Otherwise [Settings::ordering()] is used if set, then
//!   [Ordering::RequireOrder] if "posixly correct" behaviour was requested
//!   (or the `POSIXLY_CORRECT` environment variable is set), then
//!   [Ordering::Permute].
//!
//! In all modes, the special argument `--` ends option processing and is
//! consumed.
//!
//! ## Long options
//!
//! - `--name value` and `--name=value` are equivalent for options needing a
//!   value. Options with an optional value only accept the `=` form.
//! - Unique abbreviations are accepted: `--ti` for `--time`. An exact match
//!   always wins. Abbreviations matching several options that behave
//!   differently are ambiguous.
//! - If the option string contains `W;`, `-W name` and `-Wname` are
//!   equivalent to `--name`.
//! - In "long only" mode, `-name` is also accepted.
//!
//! ## Errors
//!
//! Errors are reported for the current argument only; the next call carries
//! on with the argument that follows. Unless the option string starts with
//! `:` (or [Settings::quiet()] is set) a message prefixed with the program
//! name is written to standard error (or the sink given to
//! [Scanner::err_stream()]).
//!
//! # Terminology
//!
//! > **Note:** For further details, see `getopt(3)`.
//!
//! - An "argument" is a value passed to a program on the command-line.
//!
//!   Arguments can be "options" or "positional arguments".
//!
//! - An "option" is an argument starting with a dash (`-n`) or two
//!   dashes (`--name`).
//!
//!   Options are either "flags" (which need no value) or options needing
//!   a value, which may be required or optional.
//!
//! - A "positional argument" is an argument that is not an option
//!   (including a lone `-`).
//!
//! - "Permutation" is the reordering of the argument vector so that options
//!   precede positional arguments.
//!
//! # Summary of features and behaviour
//!
//! - Short options can be bundled (`-nt37`) and values can be attached
//!   (`-t37`) or separate (`-t 37`). Values may start with a dash.
//! - Options can be specified multiple times. Each [Matched] option records
//!   its occurrence index.
//! - Long options with target flags ([LongOpt::flag()]).
//! - `getopt(3)` style functions for existing code ([getopt()],
//!   [getopt_long()], [getopt_long_only()]).
//! - Internal tracing via the [`tracing`](https://crates.io/crates/tracing)
//!   crate.
//!
//! # Limitations
//!
//! - Option semantics (numeric ranges, mandatory options, ...) are not
//!   validated.
//! - Response files (`@file`) are not supported.
//! - No help text is generated, but each [Opt] implements `Display`.

mod classic;
mod error;
mod parser;
mod scanner;
mod stream;
mod table;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

pub use classic::{
    get_args, getopt, getopt_long, getopt_long_only, longind, optarg, optind, optopt,
    prog_name, reset, set_opterr, set_optind,
};

pub use parser::{Opt, OptKey, Parser, DEFAULT_CAPACITY, LONG_CODE_BASE};

pub use scanner::{
    exchange, stderr_sink, Found, Ordering, Scan, Scanner, Settings, Sink, BAD_OPTION, END,
    FLAG_SET, IN_ORDER_ARG, MISSING_VALUE, POSIXLY_CORRECT_ENV,
};

pub use stream::{CancelToken, Cursor, History, Matched, Node, Stream, Value};

pub use table::{LongOpt, Need, OptString, Short, Table, LONG_ALIAS_OPT};
