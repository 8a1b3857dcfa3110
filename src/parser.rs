// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

use std::fmt;
use std::sync::mpsc;
use std::thread;

use tracing::debug;

use crate::error::{Error, Result};
use crate::scanner::{stderr_sink, Found, Scan, Scanner, Settings, Sink};
use crate::stream::{CancelToken, History, Matched, Node, Stream, Value};
use crate::table::{LongOpt, Need, Table, LONG_ALIAS_OPT};

const OPT_PREFIX: char = '-';
const LONG_OPT_PREFIX: &str = "--";

/// Codes reported for options registered without a short name start here
/// (one past the largest `char`).
pub const LONG_CODE_BASE: i32 = 0x11_0000;

/// Default number of nodes buffered between the streaming worker and its
/// consumer.
pub const DEFAULT_CAPACITY: usize = 1;

/// Characters that can never be short options.
const RESERVED_SHORTS: &[char] = &[OPT_PREFIX, '+', ':', ';'];

const DEFAULT_VALUE_NAME: &str = "value";

/// Identifies a registered [Opt], either by short or long name.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum OptKey {
    /// Short option character.
    Short(char),
    /// Long option name (without leading dashes).
    Long(String),
}

impl From<char> for OptKey {
    fn from(c: char) -> Self {
        OptKey::Short(c)
    }
}

impl From<&str> for OptKey {
    fn from(name: &str) -> Self {
        OptKey::Long(name.trim_start_matches(OPT_PREFIX).into())
    }
}

/// A registered option.
///
/// An option has a short name, a long name, or both.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Opt {
    /// Single character short option name.
    pub short: Option<char>,
    /// Long option name (without leading dashes).
    pub long: Option<String>,
    /// Type of option.
    pub needs: Need,
    /// Name of the value shown by [fmt::Display].
    pub value_name: Option<String>,
    /// Description of the option.
    pub help: Option<String>,
}

impl Opt {
    /// Create a new option with a short name.
    pub fn new(short: char) -> Self {
        Opt {
            short: Some(short),
            ..Default::default()
        }
    }

    /// Create a new option that only has a long name.
    pub fn named(long: &str) -> Self {
        Opt::default().long(long)
    }

    /// Specify the long name for the option.
    pub fn long(self, long: &str) -> Self {
        Opt {
            long: Some(long.into()),
            ..self
        }
    }

    /// Specify the requirement for the option.
    pub fn needs(self, needs: Need) -> Self {
        Opt { needs, ..self }
    }

    /// Specify the name of the value shown in usage output.
    pub fn value_name(self, value_name: &str) -> Self {
        Opt {
            value_name: Some(value_name.into()),
            ..self
        }
    }

    /// Specify the help text for the option.
    pub fn help(self, help: &str) -> Self {
        Opt {
            help: Some(help.into()),
            ..self
        }
    }

    /// Returns true if `key` names this option.
    pub fn matches(&self, key: &OptKey) -> bool {
        match key {
            OptKey::Short(c) => self.short == Some(*c),
            OptKey::Long(name) => self.long.as_deref() == Some(name.as_str()),
        }
    }
}

impl fmt::Display for Opt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<String> = self
            .short
            .map(|c| format!("{}{}", OPT_PREFIX, c))
            .into_iter()
            .chain(self.long.iter().map(|l| format!("{}{}", LONG_OPT_PREFIX, l)))
            .collect();

        let value_name = self.value_name.as_deref().unwrap_or(DEFAULT_VALUE_NAME);

        let value = match self.needs {
            Need::Nothing => "".into(),
            Need::Argument => format!(" <{}>", value_name),
            Need::Optional => format!(" [<{}>]", value_name),
        };

        let help: String = match &self.help {
            Some(help) => format!(" # {}", help),
            _ => "".into(),
        };

        write!(f, "{}{}{}", names.join(", "), value, help)
    }
}

/// The registry as seen by the streaming worker: the scan table plus the
/// mapping from scan results back to registered options.
#[derive(Debug, Clone)]
struct Registry {
    opts: Vec<Opt>,
    table: Table,
    /// Registry index of each long table entry.
    long_owner: Vec<usize>,
}

impl Registry {
    fn new(opts: &[Opt], settings: &Settings) -> Self {
        let mut optstring = String::new();
        let mut longs = Vec::<LongOpt>::new();
        let mut long_owner = Vec::<usize>::new();

        for (i, opt) in opts.iter().enumerate() {
            let short = opt.short.filter(|c| !RESERVED_SHORTS.contains(c));

            if let Some(c) = short {
                optstring.push(c);

                match opt.needs {
                    Need::Nothing => (),
                    Need::Argument => optstring.push(':'),
                    Need::Optional => optstring.push_str("::"),
                }
            }

            if let Some(name) = &opt.long {
                let long = match short {
                    Some(c) => LongOpt::new(name, opt.needs, c),
                    None => LongOpt::with_code(name, opt.needs, LONG_CODE_BASE + i as i32),
                };

                longs.push(long);
                long_owner.push(i);
            }
        }

        let w_registered = opts.iter().any(|o| o.short == Some(LONG_ALIAS_OPT));

        if !longs.is_empty() && !w_registered {
            optstring.push(LONG_ALIAS_OPT);
            optstring.push(';');
        }

        let table = Table::new(&optstring)
            .longs(longs)
            .long_only(settings.is_long_only());

        Registry {
            opts: opts.to_vec(),
            table,
            long_owner,
        }
    }

    /// Registry index of the option behind a scan result.
    fn resolve(&self, found: &Found) -> Option<usize> {
        if let Some(index) = found.long_index {
            return self.long_owner.get(index).copied();
        }

        let c = found.opt()?;

        self.opts.iter().position(|o| o.short == Some(c))
    }
}

/// The main object used to represent the program's options.
pub struct Parser {
    name: String,
    settings: Settings,
    opts: Vec<Opt>,
    sink: Sink,
    capacity: usize,
}

// Sink does not implement Debug
impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Parser")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("opts", &self.opts)
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new(&crate::prog_name())
    }
}

impl Parser {
    /// Create a new parser. `name` prefixes all diagnostics.
    pub fn new(name: &str) -> Self {
        Parser {
            name: name.into(),
            settings: Settings::default(),
            opts: Vec::new(),
            sink: stderr_sink(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Specify any settings for the parser.
    pub fn settings(self, settings: Settings) -> Self {
        Parser { settings, ..self }
    }

    /// Specify where diagnostics are written (standard error by default).
    pub fn err_stream(self, sink: Sink) -> Self {
        Parser { sink, ..self }
    }

    /// Specify how many nodes the streaming worker may buffer ahead of
    /// its consumer. `0` hands over each node as it is produced.
    pub fn capacity(self, capacity: usize) -> Self {
        Parser { capacity, ..self }
    }

    /// Returns the streaming channel bound.
    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    /// Register a single option.
    ///
    /// Registration order is significant: it is the order in which long
    /// option abbreviations are resolved.
    pub fn add(&mut self, opt: Opt) {
        self.opts.push(opt);
    }

    /// Returns all registered options, in registration order.
    pub fn opts(&self) -> &[Opt] {
        &self.opts
    }

    /// Returns the registered option for `key`.
    pub fn get(&self, key: impl Into<OptKey>) -> Option<&Opt> {
        let key = key.into();

        self.opts.iter().find(|o| o.matches(&key))
    }

    /// The option table derived from the registered options.
    pub fn table(&self) -> Table {
        Registry::new(&self.opts, &self.settings).table
    }

    /// Parse the arguments (without the program name) on a worker thread,
    /// returning the results as they are produced.
    pub fn parse(&self, argv: Vec<String>) -> Result<Stream> {
        self.parse_with_cancel(argv, CancelToken::new())
    }

    /// Like [Parser::parse()], but the worker stops as soon as `cancel` is
    /// triggered.
    pub fn parse_with_cancel(&self, argv: Vec<String>, cancel: CancelToken) -> Result<Stream> {
        if argv.is_empty() {
            return Err(Error::EmptyArgList);
        }

        let registry = Registry::new(&self.opts, &self.settings);

        let scanner = Scanner::new(registry.table.clone())
            .settings(self.settings)
            .prog_name(&self.name)
            .err_stream(self.sink.clone());

        let (tx, rx) = mpsc::sync_channel(self.capacity);

        let token = cancel.clone();

        let handle = thread::spawn(move || produce(scanner, registry, argv, tx, token));

        Ok(Stream::new(rx, handle, cancel))
    }

    /// Parse all the arguments (without the program name).
    pub fn parse_all(&self, argv: Vec<String>) -> Result<History> {
        Ok(self.parse(argv)?.collect())
    }
}

/// Worker thread body: scan to the end, sending a node per step.
fn produce(
    mut scanner: Scanner,
    registry: Registry,
    mut argv: Vec<String>,
    tx: mpsc::SyncSender<Node>,
    cancel: CancelToken,
) {
    let mut index = 0;
    let mut occurrences = vec![0usize; registry.opts.len()];

    while !cancel.is_cancelled() {
        let value = match scanner.next(&mut argv) {
            Scan::Option(found) | Scan::Flag(found) => {
                let i = match registry.resolve(&found) {
                    Some(i) => i,
                    None => {
                        debug!(code = found.code, "unregistered option code");
                        continue;
                    }
                };

                let occurrence = occurrences[i];
                occurrences[i] += 1;

                Value::Opt(Matched {
                    opt: registry.opts[i].clone(),
                    value: found.value,
                    occurrence,
                })
            }
            Scan::Positional(arg) => Value::Arg(arg),
            Scan::Error(err) => Value::Error(err),
            Scan::End => {
                let rest = scanner.positional(&argv);

                if !rest.is_empty() {
                    let _ = tx.send(Node {
                        index,
                        value: Value::Args(rest.to_vec()),
                    });
                }

                break;
            }
        };

        // The consumer has gone away.
        if tx.send(Node { index, value }).is_err() {
            break;
        }

        index += 1;
    }

    debug!(nodes = index, cancelled = cancel.is_cancelled(), "worker done");
}
