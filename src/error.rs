// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

use thiserror::Error;

/// The error type.
///
/// With the exception of [Error::EmptyArgList], every variant describes a
/// _recoverable_ condition: the scanner reports it for the current step and
/// carries on with the next argument on the following call.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    //------------------------------
    // Runtime errors (user error)
    //------------------------------
    /// User specified an option that matches no short or long option.
    ///
    /// `code` is the offending short option character, or `0` for an
    /// unknown long option. `option` is the text as the user typed it
    /// (for example `-f`, `--hello` or `-W hello`).
    #[error("{}", unrecognized(.code, .option))]
    UnrecognizedOption {
        /// Offending option code (`0` for long options).
        code: i32,
        /// Option text including its prefix.
        option: String,
    },

    /// User specified a non-exact prefix of two or more materially
    /// different long options.
    #[error("option '{option}' is ambiguous; possibilities:{}", quote_all(.candidates))]
    AmbiguousOption {
        /// Option text including its prefix.
        option: String,
        /// Candidate long options (with prefix), tentative match first.
        candidates: Vec<String>,
    },

    /// Option requires a value but none was supplied.
    #[error("{}", missing_value(.option))]
    MissingValue {
        /// Code of the option that needed a value.
        code: i32,
        /// Option text including its prefix.
        option: String,
    },

    /// A value was supplied (`--name=value`) to an option that does not
    /// accept one.
    #[error("option '{option}' doesn't allow an argument")]
    ForbiddenValue {
        /// Code of the option that was given a value.
        code: i32,
        /// Option text including its prefix.
        option: String,
    },

    //------------------------------
    // Incorrect API usage errors (programmer error)
    //------------------------------
    /// Nothing to parse.
    #[error("empty argument list")]
    EmptyArgList,
}

impl Error {
    /// The code of the option the error relates to (`getopt(3)`'s `optopt`).
    pub fn code(&self) -> i32 {
        match self {
            Error::UnrecognizedOption { code, .. }
            | Error::MissingValue { code, .. }
            | Error::ForbiddenValue { code, .. } => *code,
            Error::AmbiguousOption { .. } | Error::EmptyArgList => 0,
        }
    }

    /// Convenience accessor returning [Error::code()] as a character, if
    /// it represents one.
    pub fn opt(&self) -> Option<char> {
        match self.code() {
            0 => None,
            code => std::char::from_u32(code as u32),
        }
    }

    /// The option text the error relates to, including its prefix.
    pub fn option(&self) -> Option<&str> {
        match self {
            Error::UnrecognizedOption { option, .. }
            | Error::AmbiguousOption { option, .. }
            | Error::MissingValue { option, .. }
            | Error::ForbiddenValue { option, .. } => Some(option),
            Error::EmptyArgList => None,
        }
    }
}

/// Returns the option character if `option` is a single short option
/// such as `-t`.
fn short_name(option: &str) -> Option<char> {
    let mut chars = option.strip_prefix('-')?.chars();

    match (chars.next(), chars.next()) {
        (Some(c), None) if c != '-' => Some(c),
        _ => None,
    }
}

fn unrecognized(code: &i32, option: &str) -> String {
    let code = *code;

    match std::char::from_u32(code as u32).filter(|_| code > 0) {
        Some(c) => format!("invalid option -- '{}'", c),
        None => format!("unrecognized option '{}'", option),
    }
}

fn missing_value(option: &str) -> String {
    match short_name(option) {
        Some(c) => format!("option requires an argument -- '{}'", c),
        None => format!("option '{}' requires an argument", option),
    }
}

fn quote_all(candidates: &[String]) -> String {
    candidates.iter().map(|c| format!(" '{}'", c)).collect()
}

/// Convenience type that allows a function to be defined as returning a
/// [Result], but which only requires the success type to be specified,
/// defaulting the error type to this crates `Error` type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
