// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

//! The scanning engine: one classified result per call, permuting the
//! argument vector in place as it goes.

use std::env;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Error;
use crate::table::{split_long, LongMatch, Need, Table};

const OPT_PREFIX: char = '-';

/// Special argument that is silently consumed and used to denote the end of
/// all options; all arguments that follow are considered to be positional
/// arguments (even if they start with `-`!)
///
/// See: `getopt(3)`.
const END_OF_OPTIONS: &str = "--";
const LONG_OPT_PREFIX: &str = END_OF_OPTIONS;
const SHORT_OPT_PREFIX: &str = "-";
const LONG_ALIAS_PREFIX: &str = "-W ";

/// If this environment variable is set, [Ordering::RequireOrder] is used
/// unless the option string asks for something else.
pub const POSIXLY_CORRECT_ENV: &str = "POSIXLY_CORRECT";

/// Classic return code: a long option stored its code in a flag.
pub const FLAG_SET: i32 = 0;

/// Classic return code: a positional argument in [Ordering::ReturnInOrder]
/// mode.
pub const IN_ORDER_ARG: i32 = 1;

/// Classic return code: no more options.
pub const END: i32 = -1;

/// Classic return code: unknown/ambiguous option or unexpected value.
pub const BAD_OPTION: i32 = '?' as i32;

/// Classic return code: missing value when the option string starts
/// with `:`.
pub const MISSING_VALUE: i32 = ':' as i32;

/// Where diagnostics are written.
pub type Sink = Arc<Mutex<dyn Write + Send>>;

/// Creates a [Sink] for the standard error stream.
pub fn stderr_sink() -> Sink {
    Arc::new(Mutex::new(io::stderr()))
}

/// How options that follow positional arguments are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ordering {
    /// Stop option processing at the first positional argument.
    ///
    /// Selected by a leading `+` in the option string or by
    /// "posixly correct" behaviour.
    RequireOrder,
    /// Permute the argument vector as it is scanned so that eventually all
    /// positional arguments are at the end (the default).
    Permute,
    /// Report each positional argument in place, as if it were the value
    /// of an option with code [IN_ORDER_ARG].
    ///
    /// Selected by a leading `-` in the option string.
    ReturnInOrder,
}

impl Default for Ordering {
    fn default() -> Self {
        Ordering::Permute
    }
}

/// Settings used to control the scanners behaviour.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Settings {
    /// Allow long options to be introduced by a single dash.
    long_only: bool,

    /// Behave as if `POSIXLY_CORRECT` was set.
    posixly_correct: bool,

    /// Never write diagnostics, even if the option string doesn't start
    /// with `:`.
    quiet: bool,

    /// Ordering to use unless the option string specifies one.
    ordering: Option<Ordering>,
}

impl Settings {
    /// Create a new settings object.
    pub fn new() -> Self {
        Settings::default()
    }

    /// Allow long options to be specified with a single dash
    /// (`-name` as well as `--name`), like `getopt_long_only(3)`.
    ///
    /// A single dash argument whose first character is a registered short
    /// option, and which does not match any long option, is still scanned
    /// as short options.
    pub fn long_only(self) -> Self {
        Settings {
            long_only: true,
            ..self
        }
    }

    /// Stop at the first positional argument, as if `POSIXLY_CORRECT` was
    /// set in the environment.
    pub fn posixly_correct(self) -> Self {
        Settings {
            posixly_correct: true,
            ..self
        }
    }

    /// Suppress all diagnostics. The scan results are unaffected.
    pub fn quiet(self) -> Self {
        Settings {
            quiet: true,
            ..self
        }
    }

    /// Specify the ordering. A leading `+` or `-` in the option string
    /// still takes precedence.
    pub fn ordering(self, ordering: Ordering) -> Self {
        Settings {
            ordering: Some(ordering),
            ..self
        }
    }

    /// Returns true if single dash long options are allowed.
    pub fn is_long_only(&self) -> bool {
        self.long_only
    }
}

/// A recognised option.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Found {
    /// Short option character, or the long option's code.
    pub code: i32,
    /// Value specified for this option (`getopt(3)`'s `optarg`).
    pub value: Option<String>,
    /// Index into the long option table if a long option matched.
    pub long_index: Option<usize>,
}

impl Found {
    /// Returns [Found::code] as a character, if it represents one.
    pub fn opt(&self) -> Option<char> {
        std::char::from_u32(self.code as u32).filter(|_| self.code > 0)
    }
}

/// The outcome of a single scan step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Scan {
    /// An option, possibly with a value.
    Option(Found),
    /// A long option with a target flag: the flag now holds its code.
    Flag(Found),
    /// A positional argument ([Ordering::ReturnInOrder] only).
    Positional(String),
    /// A recoverable error; scanning continues with the next call.
    Error(Error),
    /// No more options. [Scanner::optind()] is the index of the first
    /// positional argument.
    End,
}

impl Scan {
    /// Convert to the classic `getopt(3)` return value.
    ///
    /// `silent` is [crate::OptString::silent()]: a missing value is then
    /// reported as `':'` rather than `'?'`.
    pub fn code(&self, silent: bool) -> i32 {
        match self {
            Scan::Option(found) => found.code,
            Scan::Flag(_) => FLAG_SET,
            Scan::Positional(_) => IN_ORDER_ARG,
            Scan::Error(Error::MissingValue { .. }) if silent => MISSING_VALUE,
            Scan::Error(_) => BAD_OPTION,
            Scan::End => END,
        }
    }

    /// True for [Scan::End].
    pub fn is_end(&self) -> bool {
        *self == Scan::End
    }
}

/// Exchange two adjacent blocks of `argv`: `[bottom, middle)` and
/// `[middle, top)`.
///
/// The shorter block is swapped with the far end of the longer one, which
/// puts it in its final place and leaves the longer block in two parts
/// that need swapping next. Repeat until both parts are in place.
pub fn exchange<T>(argv: &mut [T], bottom: usize, middle: usize, top: usize) {
    let mut bottom = bottom;
    let mut top = top;

    while top > middle && middle > bottom {
        if top - middle > middle - bottom {
            // Bottom segment is the short one.
            let len = middle - bottom;

            for i in 0..len {
                argv.swap(bottom + i, top - len + i);
            }

            top -= len;
        } else {
            // Top segment is the short one.
            let len = top - middle;

            for i in 0..len {
                argv.swap(bottom + i, middle + i);
            }

            bottom += len;
        }
    }
}

/// A positional argument is one that doesn't start with a dash, or is a
/// lone dash.
fn is_nonopt(arg: &str) -> bool {
    !arg.starts_with(OPT_PREFIX) || arg.len() == 1
}

/// Scans an argument vector, one option per call.
///
/// The argument vector does _not_ include the program name. The scanner
/// relies on the vector only being modified by itself between calls.
pub struct Scanner {
    table: Table,
    settings: Settings,
    prog_name: String,
    sink: Sink,

    initialized: bool,
    done: bool,
    ordering: Ordering,

    /// Index of the next element to scan (`getopt(3)`'s `optind`).
    optind: usize,

    /// Byte offset of the next short option character in `argv[optind]`.
    /// `None` means advance to the next element.
    next_char: Option<usize>,

    /// Skipped positional arguments not yet permuted:
    /// `[first_nonopt, last_nonopt)`.
    first_nonopt: usize,
    last_nonopt: usize,

    optarg: Option<String>,
    optopt: i32,
    longind: Option<usize>,
}

// Sink does not implement Debug
impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("table", &self.table)
            .field("settings", &self.settings)
            .field("prog_name", &self.prog_name)
            .field("initialized", &self.initialized)
            .field("done", &self.done)
            .field("ordering", &self.ordering)
            .field("optind", &self.optind)
            .field("next_char", &self.next_char)
            .field("first_nonopt", &self.first_nonopt)
            .field("last_nonopt", &self.last_nonopt)
            .field("optarg", &self.optarg)
            .field("optopt", &self.optopt)
            .field("longind", &self.longind)
            .finish()
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new(Table::default())
    }
}

impl Scanner {
    /// Create a new scanner for the specified option table.
    pub fn new(table: Table) -> Self {
        Scanner {
            table,
            settings: Settings::default(),
            prog_name: crate::prog_name(),
            sink: stderr_sink(),
            initialized: false,
            done: false,
            ordering: Ordering::default(),
            optind: 0,
            next_char: None,
            first_nonopt: 0,
            last_nonopt: 0,
            optarg: None,
            optopt: BAD_OPTION,
            longind: None,
        }
    }

    /// Specify any settings for the scanner.
    pub fn settings(self, settings: Settings) -> Self {
        Scanner { settings, ..self }
    }

    /// Specify the program name used to prefix diagnostics.
    pub fn prog_name(self, prog_name: &str) -> Self {
        Scanner {
            prog_name: prog_name.into(),
            ..self
        }
    }

    /// Specify where diagnostics are written (standard error by default).
    pub fn err_stream(self, sink: Sink) -> Self {
        Scanner { sink, ..self }
    }

    /// Replace the option table without disturbing the scan state.
    pub fn set_table(&mut self, table: Table) {
        self.table = table;
    }

    /// The option table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Forget all scan state so the scanner can be used for a new
    /// argument vector.
    pub fn reset(&mut self) {
        self.initialized = false;
        self.done = false;
        self.ordering = Ordering::default();
        self.optind = 0;
        self.next_char = None;
        self.first_nonopt = 0;
        self.last_nonopt = 0;
        self.optarg = None;
        self.optopt = BAD_OPTION;
        self.longind = None;
    }

    /// Index of the next element to be scanned. Once the scan is over,
    /// the index of the first positional argument.
    pub fn optind(&self) -> usize {
        self.optind
    }

    /// Move the scan position, for example to step over a positional
    /// argument in [Ordering::RequireOrder] mode and resume scanning.
    /// Setting `0` restarts the scan from scratch.
    pub fn set_optind(&mut self, optind: usize) {
        if optind == 0 {
            self.reset();
            return;
        }

        self.optind = optind;
        self.next_char = None;
        self.done = false;
    }

    /// Value of the last option found (`getopt(3)`'s `optarg`).
    pub fn optarg(&self) -> Option<&str> {
        self.optarg.as_deref()
    }

    /// Code of the last offending option (`getopt(3)`'s `optopt`).
    pub fn optopt(&self) -> i32 {
        self.optopt
    }

    /// Long table index of the last long option found.
    pub fn longind(&self) -> Option<usize> {
        self.longind
    }

    /// The ordering in effect (established by the first call).
    pub fn ordering(&self) -> Ordering {
        self.ordering
    }

    /// True once the scan has returned [Scan::End].
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The positional arguments left for the caller once the scan is over.
    pub fn positional<'a>(&self, argv: &'a [String]) -> &'a [String] {
        &argv[self.optind.min(argv.len())..]
    }

    /// Classic interface: scan the next option and return its `getopt(3)`
    /// code. Details are available from [Scanner::optarg()],
    /// [Scanner::optopt()], [Scanner::longind()] and [Scanner::optind()].
    pub fn getopt(&mut self, argv: &mut [String]) -> i32 {
        let scan = self.next(argv);

        scan.code(self.table.shorts().silent())
    }

    /// Scan the next option.
    ///
    /// Exactly one result is produced per call. Once [Scan::End] has been
    /// returned, every further call returns it again without touching
    /// `argv`.
    pub fn next(&mut self, argv: &mut [String]) -> Scan {
        if self.done {
            return Scan::End;
        }

        if argv.is_empty() {
            return self.finish();
        }

        self.optarg = None;
        self.longind = None;

        if !self.initialized {
            self.init();
        }

        self.clamp(argv);

        if self.next_char.is_none() {
            if let Some(scan) = self.advance(argv) {
                return scan;
            }
        }

        self.decode_short(argv)
    }

    fn init(&mut self) {
        self.first_nonopt = self.optind;
        self.last_nonopt = self.optind;
        self.next_char = None;

        let posixly_correct =
            self.settings.posixly_correct || env::var_os(POSIXLY_CORRECT_ENV).is_some();

        self.ordering = match (self.table.shorts().ordering(), self.settings.ordering) {
            (Some(ordering), _) => ordering,
            (None, Some(ordering)) => ordering,
            (None, None) if posixly_correct => Ordering::RequireOrder,
            (None, None) => Ordering::Permute,
        };

        self.initialized = true;

        debug!(ordering = ?self.ordering, "scan initialised");
    }

    /// Bring a position set by the caller (or left over from another
    /// vector) back inside `argv`.
    fn clamp(&mut self, argv: &[String]) {
        let argc = argv.len();

        if self.optind > argc {
            debug!(optind = self.optind, argc, "optind beyond end of arguments");

            self.optind = argc;
            self.next_char = None;
        }

        if let Some(offset) = self.next_char {
            let valid = argv
                .get(self.optind)
                .map_or(false, |arg| offset < arg.len() && arg.is_char_boundary(offset));

            if !valid {
                debug!(optind = self.optind, offset, "discarding stale position");

                self.next_char = None;
            }
        }
    }

    fn finish(&mut self) -> Scan {
        self.done = true;
        self.next_char = None;

        debug!(optind = self.optind, "scan exhausted");

        Scan::End
    }

    fn long_only(&self) -> bool {
        self.table.is_long_only() || self.settings.long_only
    }

    fn print_errors(&self) -> bool {
        !self.settings.quiet && !self.table.shorts().silent()
    }

    /// Report a recoverable error.
    fn fail(&self, err: Error) -> Scan {
        debug!(error = %err, optind = self.optind, "scan error");

        if self.print_errors() {
            let mut sink = self.sink.lock();

            // Diagnostics are best effort.
            let _ = writeln!(sink, "{}: {}", self.prog_name, err);
        }

        Scan::Error(err)
    }

    /// Exchange the skipped positional arguments with the options that
    /// followed them.
    fn permute(&mut self, argv: &mut [String]) {
        trace!(
            bottom = self.first_nonopt,
            middle = self.last_nonopt,
            top = self.optind,
            "exchanging"
        );

        exchange(argv, self.first_nonopt, self.last_nonopt, self.optind);

        self.first_nonopt += self.optind - self.last_nonopt;
        self.last_nonopt = self.optind;
    }

    /// Move on to the next element. Returns `None` if it holds short
    /// options to decode.
    fn advance(&mut self, argv: &mut [String]) -> Option<Scan> {
        let argc = argv.len();

        // The caller may have moved optind back.
        if self.last_nonopt > self.optind {
            self.last_nonopt = self.optind;
        }
        if self.first_nonopt > self.optind {
            self.first_nonopt = self.optind;
        }

        if self.ordering == Ordering::Permute {
            if self.first_nonopt != self.last_nonopt && self.last_nonopt != self.optind {
                self.permute(argv);
            } else if self.last_nonopt != self.optind {
                self.first_nonopt = self.optind;
            }

            while self.optind < argc && is_nonopt(&argv[self.optind]) {
                self.optind += 1;
            }

            self.last_nonopt = self.optind;
        }

        // Skip "--" like an option, move it in front of the skipped
        // positional arguments, then treat everything else as positional.
        if self.optind != argc && argv[self.optind] == END_OF_OPTIONS {
            self.optind += 1;

            if self.first_nonopt != self.last_nonopt && self.last_nonopt != self.optind {
                self.permute(argv);
            } else if self.first_nonopt == self.last_nonopt {
                self.first_nonopt = self.optind;
            }

            self.last_nonopt = argc;
            self.optind = argc;
        }

        if self.optind == argc {
            // Point at the positional arguments we skipped.
            if self.first_nonopt != self.last_nonopt {
                self.optind = self.first_nonopt;
            }

            return Some(self.finish());
        }

        if is_nonopt(&argv[self.optind]) {
            if self.ordering == Ordering::RequireOrder {
                return Some(self.finish());
            }

            let value = argv[self.optind].clone();
            self.optind += 1;
            self.optarg = Some(value.clone());

            return Some(Scan::Positional(value));
        }

        trace!(optind = self.optind, arg = %argv[self.optind], "option element");

        if self.table.has_longs() {
            let arg = &argv[self.optind];

            let long_only = self.long_only();

            if arg.starts_with(LONG_OPT_PREFIX) {
                return Some(self.decode_long(
                    argv,
                    LONG_OPT_PREFIX.len(),
                    LONG_OPT_PREFIX,
                    long_only,
                ));
            }

            if long_only {
                // "-f" where 'f' is a short option is always the short
                // option, but "-fu" may abbreviate a long "fubar".
                let text = &arg[SHORT_OPT_PREFIX.len()..];
                let mut chars = text.chars();
                let first_is_short = chars
                    .next()
                    .map_or(false, |c| self.table.shorts().lookup(c).is_some());
                let single = chars.next().is_none();

                let (name, _) = split_long(text);
                let unknown = self.table.match_long(name, true) == LongMatch::NotFound;

                if !first_is_short || !(single || unknown) {
                    return Some(self.decode_long(
                        argv,
                        SHORT_OPT_PREFIX.len(),
                        SHORT_OPT_PREFIX,
                        true,
                    ));
                }
            }
        }

        self.next_char = Some(SHORT_OPT_PREFIX.len());

        None
    }

    /// Resolve the long option in `argv[optind]` starting at byte `offset`.
    fn decode_long(&mut self, argv: &[String], offset: usize, prefix: &str, long_only: bool) -> Scan {
        let argc = argv.len();
        let text = &argv[self.optind][offset..];
        let (name, value) = split_long(text);

        let index = match self.table.match_long(name, long_only) {
            LongMatch::Found(index) => index,
            LongMatch::Ambiguous(candidates) => {
                let candidates = candidates
                    .iter()
                    .filter_map(|&i| self.table.long(i))
                    .map(|l| format!("{}{}", prefix, l.name()))
                    .collect();

                self.next_char = None;
                self.optind += 1;
                self.optopt = 0;

                return self.fail(Error::AmbiguousOption {
                    option: format!("{}{}", prefix, text),
                    candidates,
                });
            }
            LongMatch::NotFound => {
                self.next_char = None;
                self.optind += 1;
                self.optopt = 0;

                return self.fail(Error::UnrecognizedOption {
                    code: 0,
                    option: format!("{}{}", prefix, text),
                });
            }
        };

        let (needs, code, flag, option) = match self.table.long(index) {
            Some(l) => (
                l.needs(),
                l.code(),
                l.target().cloned(),
                format!("{}{}", prefix, l.name()),
            ),
            None => return self.finish(),
        };

        trace!(%option, index, "long option");

        self.optind += 1;
        self.next_char = None;

        if let Some(value) = value {
            if needs == Need::Nothing {
                self.optopt = code;

                return self.fail(Error::ForbiddenValue { code, option });
            }

            self.optarg = Some(value.into());
        } else if needs == Need::Argument {
            if self.optind < argc {
                self.optarg = Some(argv[self.optind].clone());
                self.optind += 1;
            } else {
                self.optopt = code;

                return self.fail(Error::MissingValue { code, option });
            }
        }

        self.longind = Some(index);

        let found = Found {
            code,
            value: self.optarg.clone(),
            long_index: Some(index),
        };

        match flag {
            Some(flag) => {
                flag.store(code, atomic::Ordering::SeqCst);
                Scan::Flag(found)
            }
            None => Scan::Option(found),
        }
    }

    /// Decode the next short option character of `argv[optind]`.
    fn decode_short(&mut self, argv: &[String]) -> Scan {
        let argc = argv.len();

        let offset = match self.next_char {
            Some(offset) => offset,
            None => return self.finish(),
        };

        let arg = match argv.get(self.optind) {
            Some(arg) => arg,
            None => return self.finish(),
        };

        let c = match arg.get(offset..).and_then(|s| s.chars().next()) {
            Some(c) => c,
            None => return self.finish(),
        };

        let rest = offset + c.len_utf8();
        let at_end = rest >= arg.len();

        // Increment optind when we start to process the last character.
        if at_end {
            self.next_char = None;
            self.optind += 1;
        } else {
            self.next_char = Some(rest);
        }

        let code = c as i32;
        let option = format!("{}{}", OPT_PREFIX, c);

        let short = match self.table.shorts().lookup(c) {
            Some(short) => *short,
            None => {
                self.optopt = code;

                return self.fail(Error::UnrecognizedOption { code, option });
            }
        };

        trace!(%option, "short option");

        // "-W name" is "--name".
        if short.long_alias && self.table.has_longs() {
            if !at_end {
                // "-Wname": optind still points at this element.
                return self.decode_long(argv, rest, LONG_ALIAS_PREFIX, false);
            }

            if self.optind == argc {
                self.optopt = code;

                return self.fail(Error::MissingValue { code, option });
            }

            // "-W name": optind already points at the name.
            return self.decode_long(argv, 0, LONG_ALIAS_PREFIX, false);
        }

        match short.needs {
            Need::Nothing => (),
            Need::Optional => {
                if !at_end {
                    self.optarg = Some(arg[rest..].into());
                    self.optind += 1;
                }

                self.next_char = None;
            }
            Need::Argument => {
                if !at_end {
                    // The rest of this element is the value.
                    self.optarg = Some(arg[rest..].into());
                    self.optind += 1;
                } else if self.optind == argc {
                    self.next_char = None;
                    self.optopt = code;

                    return self.fail(Error::MissingValue { code, option });
                } else {
                    // We already incremented optind once; increment it
                    // again when taking the next element as the value.
                    self.optarg = Some(argv[self.optind].clone());
                    self.optind += 1;
                }

                self.next_char = None;
            }
        }

        Scan::Option(Found {
            code,
            value: self.optarg.clone(),
            long_index: None,
        })
    }
}
