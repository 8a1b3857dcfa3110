// Copyright (c) 2021 James O. D. Hunt.
//
// SPDX-License-Identifier: Apache-2.0
//

//! Option tables: the short option string and the long option list, plus
//! the matching rules used by the scanner.

use std::fmt;
use std::sync::atomic::AtomicI32;
use std::sync::Arc;

use crate::scanner::Ordering;

/// Option string prefix selecting [Ordering::RequireOrder].
const REQUIRE_ORDER_PREFIX: char = '+';

/// Option string prefix selecting [Ordering::ReturnInOrder].
const RETURN_IN_ORDER_PREFIX: char = '-';

/// Marks a value requirement in the option string. As the first character
/// (after any ordering prefix) it also silences diagnostics.
pub(crate) const VALUE_MARKER: char = ':';

/// Follows `W` in the option string to enable the `-W name` long option form.
const LONG_ALIAS_MARKER: char = ';';

/// The short option that introduces the `-W name` form.
pub const LONG_ALIAS_OPT: char = 'W';

/// Separates a long option name from its value (`--name=value`).
const LONG_VALUE_SEPARATOR: char = '=';

/// Used to specify whether an option is a "stand-alone" flag option
/// (needs no value), whether it requires an option argument, or whether the
/// argument is optional.
#[derive(Debug, PartialEq, PartialOrd, Eq, Ord, Clone, Copy, Hash)]
pub enum Need {
    /// Option is stand-alone (no argument allowed).
    Nothing,
    /// Option needs an argument.
    Argument,
    /// Option accepts an argument, but only when attached to the option
    /// itself (`-xvalue` or `--name=value`).
    Optional,
}

impl Default for Need {
    fn default() -> Self {
        Need::Nothing
    }
}

/// A single entry of an [OptString].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Short {
    /// Option character.
    pub name: char,
    /// Value requirement.
    pub needs: Need,
    /// Set for the `W;` entry: the value is resolved as a long option name.
    pub long_alias: bool,
}

/// A parsed `getopt(3)` option string such as `"+:ab:c::W;"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptString {
    raw: String,
    ordering: Option<Ordering>,
    silent: bool,
    entries: Vec<Short>,
}

impl OptString {
    /// Parse an option string.
    ///
    /// Stray `:` and `;` characters are skipped; they are never options.
    pub fn new(raw: &str) -> Self {
        let mut chars = raw.chars().peekable();

        let ordering = match chars.peek() {
            Some(&REQUIRE_ORDER_PREFIX) => Some(Ordering::RequireOrder),
            Some(&RETURN_IN_ORDER_PREFIX) => Some(Ordering::ReturnInOrder),
            _ => None,
        };

        if ordering.is_some() {
            chars.next();
        }

        let silent = chars.peek() == Some(&VALUE_MARKER);

        let mut entries = Vec::<Short>::new();

        while let Some(c) = chars.next() {
            if c == VALUE_MARKER || c == LONG_ALIAS_MARKER {
                continue;
            }

            // "W;" needs a value. With no long table to resolve it against,
            // the scanner reports it as plain option 'W' with that value
            // (the older glibc convention).
            if c == LONG_ALIAS_OPT && chars.peek() == Some(&LONG_ALIAS_MARKER) {
                chars.next();

                entries.push(Short {
                    name: c,
                    needs: Need::Argument,
                    long_alias: true,
                });
                continue;
            }

            let mut needs = Need::Nothing;

            if chars.peek() == Some(&VALUE_MARKER) {
                chars.next();
                needs = Need::Argument;

                if chars.peek() == Some(&VALUE_MARKER) {
                    chars.next();
                    needs = Need::Optional;
                }
            }

            entries.push(Short {
                name: c,
                needs,
                long_alias: false,
            });
        }

        OptString {
            raw: raw.into(),
            ordering,
            silent,
            entries,
        }
    }

    /// Returns the raw option string.
    pub fn as_raw(&self) -> &str {
        &self.raw
    }

    /// Ordering requested by a leading `+` or `-`, if any.
    pub fn ordering(&self) -> Option<Ordering> {
        self.ordering
    }

    /// True if the option string starts with `:` (after any ordering
    /// prefix), meaning the caller formats its own diagnostics.
    pub fn silent(&self) -> bool {
        self.silent
    }

    /// Look up a short option. The first registration of a character wins.
    pub fn lookup(&self, c: char) -> Option<&Short> {
        if c == VALUE_MARKER || c == LONG_ALIAS_MARKER {
            return None;
        }

        self.entries.iter().find(|s| s.name == c)
    }

    /// Returns all short option entries in declaration order.
    pub fn entries(&self) -> &[Short] {
        &self.entries
    }
}

impl From<&str> for OptString {
    fn from(raw: &str) -> Self {
        OptString::new(raw)
    }
}

/// A long option table entry (`getopt_long(3)`'s `struct option`).
#[derive(Debug, Clone)]
pub struct LongOpt {
    name: String,
    needs: Need,
    code: i32,
    flag: Option<Arc<AtomicI32>>,
}

impl LongOpt {
    /// Create a long option that reports `code` as its short equivalent.
    pub fn new(name: &str, needs: Need, code: char) -> Self {
        LongOpt::with_code(name, needs, code as i32)
    }

    /// Create a long option that reports an arbitrary integer code.
    pub fn with_code(name: &str, needs: Need, code: i32) -> Self {
        LongOpt {
            name: name.into(),
            needs,
            code,
            flag: None,
        }
    }

    /// When the option is found, store its code in `flag` and report
    /// [crate::Scan::Flag] rather than [crate::Scan::Option].
    pub fn flag(self, flag: Arc<AtomicI32>) -> Self {
        LongOpt {
            flag: Some(flag),
            ..self
        }
    }

    /// Long option name (without the leading dashes).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value requirement.
    pub fn needs(&self) -> Need {
        self.needs
    }

    /// Result code.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Target flag, if any.
    pub fn target(&self) -> Option<&Arc<AtomicI32>> {
        self.flag.as_ref()
    }

    /// Two entries are "materially different" if matching either would
    /// behave differently.
    fn differs_from(&self, other: &LongOpt) -> bool {
        let same_flag = match (&self.flag, &other.flag) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };

        self.needs != other.needs || self.code != other.code || !same_flag
    }
}

impl fmt::Display for LongOpt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.needs {
            Need::Nothing => "",
            Need::Argument => "=<value>",
            Need::Optional => "[=<value>]",
        };

        write!(f, "--{}{}", self.name, value)
    }
}

/// Outcome of resolving a long option name against a [Table].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LongMatch {
    /// Exact match or unambiguous abbreviation (index into the long table).
    Found(usize),
    /// Candidate indices: the tentative match first, then the rest in
    /// table order.
    Ambiguous(Vec<usize>),
    /// No long option starts with the name.
    NotFound,
}

/// Split `name=value` at the first `=`.
pub(crate) fn split_long(text: &str) -> (&str, Option<&str>) {
    match text.find(LONG_VALUE_SEPARATOR) {
        Some(pos) => (&text[..pos], Some(&text[pos + 1..])),
        None => (text, None),
    }
}

/// The complete option specification used by a scan.
#[derive(Debug, Clone, Default)]
pub struct Table {
    shorts: OptString,
    longs: Vec<LongOpt>,
    long_only: bool,
}

impl Table {
    /// Create a table from a short option string alone (`getopt(3)`).
    pub fn new(optstring: &str) -> Self {
        Table {
            shorts: OptString::new(optstring),
            ..Default::default()
        }
    }

    /// Specify the long options (`getopt_long(3)`).
    pub fn longs(self, longs: Vec<LongOpt>) -> Self {
        Table { longs, ..self }
    }

    /// Allow single dash long options (`getopt_long_only(3)`).
    pub fn long_only(self, long_only: bool) -> Self {
        Table { long_only, ..self }
    }

    /// The short option table.
    pub fn shorts(&self) -> &OptString {
        &self.shorts
    }

    /// The long option at `index`.
    pub fn long(&self, index: usize) -> Option<&LongOpt> {
        self.longs.get(index)
    }

    /// True if any long options are registered.
    pub fn has_longs(&self) -> bool {
        !self.longs.is_empty()
    }

    /// True if single dash long options are allowed.
    pub fn is_long_only(&self) -> bool {
        self.long_only
    }

    /// Resolve `name` (already split from any `=value`).
    ///
    /// An exact match always wins. Otherwise the first prefix match is
    /// selected, unless a later prefix match is materially different (or
    /// `long_only` is set), in which case the result is ambiguous.
    pub(crate) fn match_long(&self, name: &str, long_only: bool) -> LongMatch {
        if let Some(index) = self.longs.iter().position(|l| l.name == name) {
            return LongMatch::Found(index);
        }

        let mut found: Option<usize> = None;
        let mut ambiguous = Vec::<usize>::new();

        for (i, long) in self.longs.iter().enumerate() {
            if !long.name.starts_with(name) {
                continue;
            }

            match found {
                None => found = Some(i),
                Some(first) => {
                    if long_only || self.longs[first].differs_from(long) {
                        ambiguous.push(i);
                    }
                }
            }
        }

        match found {
            None => LongMatch::NotFound,
            Some(first) if ambiguous.is_empty() => LongMatch::Found(first),
            Some(first) => {
                ambiguous.insert(0, first);
                LongMatch::Ambiguous(ambiguous)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_time_table() -> Table {
        Table::new(":W;nt:").longs(vec![
            LongOpt::new("name", Need::Nothing, 'n'),
            LongOpt::new("time", Need::Argument, 't'),
        ])
    }

    #[test]
    fn test_need() {
        assert_eq!(Need::default(), Need::Nothing);
    }

    #[test]
    fn test_optstring() {
        #[derive(Debug)]
        struct TestData<'a> {
            raw: &'a str,
            ordering: Option<Ordering>,
            silent: bool,
            entries: Vec<Short>,
        }

        let flag = |name| Short {
            name,
            needs: Need::Nothing,
            long_alias: false,
        };
        let needs = |name, needs| Short {
            name,
            needs,
            long_alias: false,
        };

        let tests = &[
            TestData {
                raw: "",
                ordering: None,
                silent: false,
                entries: vec![],
            },
            TestData {
                raw: "ab",
                ordering: None,
                silent: false,
                entries: vec![flag('a'), flag('b')],
            },
            TestData {
                raw: ":a:b::c",
                ordering: None,
                silent: true,
                entries: vec![
                    needs('a', Need::Argument),
                    needs('b', Need::Optional),
                    flag('c'),
                ],
            },
            TestData {
                raw: "+:nt:",
                ordering: Some(Ordering::RequireOrder),
                silent: true,
                entries: vec![flag('n'), needs('t', Need::Argument)],
            },
            TestData {
                raw: "-n",
                ordering: Some(Ordering::ReturnInOrder),
                silent: false,
                entries: vec![flag('n')],
            },
            TestData {
                raw: "W;x",
                ordering: None,
                silent: false,
                entries: vec![
                    Short {
                        name: 'W',
                        needs: Need::Argument,
                        long_alias: true,
                    },
                    flag('x'),
                ],
            },
            TestData {
                // No ordering prefix, so ':' after '+' is not required.
                raw: "a+",
                ordering: None,
                silent: false,
                entries: vec![flag('a'), flag('+')],
            },
        ];

        for (i, d) in tests.iter().enumerate() {
            let msg = format!("test[{}]: {:?}", i, d);

            let optstring = OptString::new(d.raw);

            assert_eq!(optstring.as_raw(), d.raw, "{}", msg);
            assert_eq!(optstring.ordering(), d.ordering, "{}", msg);
            assert_eq!(optstring.silent(), d.silent, "{}", msg);
            assert_eq!(optstring.entries(), d.entries.as_slice(), "{}", msg);
        }
    }

    #[test]
    fn test_optstring_lookup() {
        let optstring = OptString::from(":ab:a::");

        assert_eq!(optstring.lookup('a').map(|s| s.needs), Some(Need::Nothing));
        assert_eq!(optstring.lookup('b').map(|s| s.needs), Some(Need::Argument));
        assert!(optstring.lookup('c').is_none());
        assert!(optstring.lookup(':').is_none());
        assert!(optstring.lookup(';').is_none());
    }

    #[test]
    fn test_split_long() {
        assert_eq!(split_long("hello=world"), ("hello", Some("world")));
        assert_eq!(split_long("hello"), ("hello", None));
        assert_eq!(split_long("hello="), ("hello", Some("")));
        assert_eq!(split_long("a=b=c"), ("a", Some("b=c")));
        assert_eq!(split_long("=x"), ("", Some("x")));
    }

    #[test]
    fn test_match_long() {
        #[derive(Debug)]
        struct TestData<'a> {
            name: &'a str,
            long_only: bool,
            result: LongMatch,
        }

        let table = Table::new("").longs(vec![
            LongOpt::new("name", Need::Nothing, 'n'),
            LongOpt::new("time", Need::Argument, 't'),
            LongOpt::new("tail", Need::Nothing, 'T'),
            LongOpt::new("timeout", Need::Argument, 'o'),
            // Same behaviour as "name": never ambiguous with it.
            LongOpt::new("named", Need::Nothing, 'n'),
        ]);

        let tests = &[
            TestData {
                name: "name",
                long_only: false,
                result: LongMatch::Found(0),
            },
            TestData {
                name: "na",
                long_only: false,
                result: LongMatch::Found(0),
            },
            TestData {
                name: "named",
                long_only: false,
                result: LongMatch::Found(4),
            },
            TestData {
                name: "na",
                long_only: true,
                result: LongMatch::Ambiguous(vec![0, 4]),
            },
            TestData {
                // Exact match wins over the later, longer "timeout".
                name: "time",
                long_only: false,
                result: LongMatch::Found(1),
            },
            TestData {
                name: "ti",
                long_only: false,
                result: LongMatch::Ambiguous(vec![1, 3]),
            },
            TestData {
                name: "t",
                long_only: false,
                result: LongMatch::Ambiguous(vec![1, 2, 3]),
            },
            TestData {
                name: "timeo",
                long_only: false,
                result: LongMatch::Found(3),
            },
            TestData {
                name: "ta",
                long_only: false,
                result: LongMatch::Found(2),
            },
            TestData {
                name: "fubar",
                long_only: false,
                result: LongMatch::NotFound,
            },
            TestData {
                name: "names",
                long_only: false,
                result: LongMatch::NotFound,
            },
        ];

        for (i, d) in tests.iter().enumerate() {
            let msg = format!("test[{}]: {:?}", i, d);

            let result = table.match_long(d.name, d.long_only);

            assert_eq!(result, d.result, "{}", msg);
        }
    }

    #[test]
    fn test_match_long_abbreviations() {
        let table = name_time_table();

        for name in &["t", "ti", "tim", "time"] {
            assert_eq!(table.match_long(name, false), LongMatch::Found(1), "{}", name);
        }

        for name in &["n", "na", "nam", "name"] {
            assert_eq!(table.match_long(name, false), LongMatch::Found(0), "{}", name);
        }
    }

    #[test]
    fn test_match_long_flags() {
        let flag_a = Arc::new(AtomicI32::new(0));
        let flag_b = Arc::new(AtomicI32::new(0));

        let table = Table::new("").longs(vec![
            LongOpt::with_code("verbose", Need::Nothing, 1).flag(flag_a.clone()),
            LongOpt::with_code("verbosity", Need::Nothing, 1).flag(flag_a),
            LongOpt::with_code("version", Need::Nothing, 1).flag(flag_b),
        ]);

        // Same flag, same code, same requirement: an alias.
        assert_eq!(table.match_long("verbo", false), LongMatch::Found(0));

        // Different target flag.
        assert_eq!(
            table.match_long("ver", false),
            LongMatch::Ambiguous(vec![0, 2])
        );
    }

    #[test]
    fn test_long_opt_display() {
        assert_eq!(
            LongOpt::new("name", Need::Nothing, 'n').to_string(),
            "--name"
        );
        assert_eq!(
            LongOpt::new("time", Need::Argument, 't').to_string(),
            "--time=<value>"
        );
        assert_eq!(
            LongOpt::new("xist", Need::Optional, 'x').to_string(),
            "--xist[=<value>]"
        );
    }
}
